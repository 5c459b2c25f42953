//! Match error types

use chess_core::GameError;
use commentary::LlmError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Game error: {0}")]
    Game(#[from] GameError),

    #[error("Player error: {0}")]
    Player(String),

    #[error("Text generation error: {0}")]
    Llm(#[from] LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MatchError {
    /// Errors that end the match instead of costing the player an attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MatchError::Config(_) | MatchError::EngineUnavailable(_))
    }
}
