//! Chess state for a match of talking pieces.
//!
//! `shakmaty` owns the rules; this crate adds what the rules crate doesn't
//! know about: stable piece identities, the personality each piece speaks
//! with, the move history and the match status machine.

pub mod error;
pub mod game;
pub mod personality;
pub mod pgn;
pub mod piece;
pub mod record;

pub use error::GameError;
pub use game::{GameResult, GameState, MatchStatus, Termination, DEFAULT_MAX_PLIES};
pub use personality::{Personality, PersonalityRegistry, Traits};
pub use pgn::{PgnHeaders, PlyComment};
pub use piece::{Piece, PieceId, PieceKind, Side};
pub use record::MoveRecord;
