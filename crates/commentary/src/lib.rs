//! In-character commentary for the pieces of a running game.
//!
//! `CommentaryEngine` turns an applied move into zero or more
//! `CommentaryEvent`s. Text comes from a `TextGenerationClient` when one is
//! configured and from trait-driven templates otherwise; generation failures
//! are absorbed here and never reach the match loop.

pub mod client;
pub mod engine;
pub mod error;
pub mod event;
pub mod fallback;
pub mod policy;
pub mod prompt;

pub use client::{ClientSettings, CompletionRequest, OpenAiCompatClient, Provider, TextGenerationClient};
pub use engine::{CommentaryConfig, CommentaryEngine};
pub use error::LlmError;
pub use event::{CommentaryEvent, CommentaryKind, CommentarySource};
pub use fallback::TemplateFamily;
pub use policy::CommentaryFrequency;
