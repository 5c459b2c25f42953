//! Game error types

use thiserror::Error;

use crate::game::MatchStatus;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// Rejected move text, with the legal moves (SAN) of the unchanged position.
    #[error("Illegal move '{input}' ({} legal moves available)", legal.len())]
    IllegalMove { input: String, legal: Vec<String> },

    #[error("Cannot {action} while the game is {state}")]
    InvalidState {
        action: &'static str,
        state: MatchStatus,
    },

    #[error("Invalid FEN: {0}")]
    InvalidFen(String),

    #[error("No piece tracked on {0}")]
    UntrackedSquare(String),
}

impl GameError {
    pub fn legal_moves(&self) -> Option<&[String]> {
        match self {
            GameError::IllegalMove { legal, .. } => Some(legal),
            _ => None,
        }
    }
}
