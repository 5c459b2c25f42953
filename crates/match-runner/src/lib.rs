//! Runs chess matches between humans, Stockfish and language models, with
//! the pieces commenting on the game as it goes.

pub mod config;
pub mod error;
pub mod events;
pub mod mode;
pub mod orchestrator;
pub mod players;
pub mod setup;
pub mod stockfish;
pub mod teaching;

pub use config::{AppConfig, EngineSettings};
pub use error::MatchError;
pub use events::{MatchEvent, PlayerInfo};
pub use mode::{GameMode, LlmStyle, ModeDefaults, PlayerKind};
pub use orchestrator::{ControlSignal, Match, MatchControl, MatchSettings, MatchSummary};
pub use players::{MoveSource, Proposal, TurnContext};
pub use setup::{build_match, MatchSetup};
pub use teaching::{AnalysedLine, CandidateMove, PositionAnalyser, TeachingAdvice, TeachingAdvisor};
