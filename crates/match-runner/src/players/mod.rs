//! Move sources. Humans, Stockfish and LLMs all answer the same question:
//! what do you play in this position?

pub mod engine;
pub mod human;
pub mod llm;

use async_trait::async_trait;
use chess_core::{GameError, GameState, MoveRecord, Side};

use crate::error::MatchError;
use crate::mode::PlayerKind;

pub use engine::EnginePlayer;
pub use human::{HumanPlayer, LineSource, StdinLines};
pub use llm::LlmPlayer;

/// What a player wants to do on its turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proposal {
    /// SAN or UCI move text
    Move(String),
    Resign,
    OfferDraw,
}

/// What a player sees when asked for a move.
pub struct TurnContext<'a> {
    pub state: &'a GameState,
    pub side: Side,
    /// Previous rejected attempts this ply
    pub attempt: u32,
    pub last_error: Option<&'a GameError>,
}

#[async_trait]
pub trait MoveSource: Send {
    fn name(&self) -> &str;

    fn kind(&self) -> PlayerKind;

    async fn propose_move(&mut self, ctx: &TurnContext<'_>) -> Result<Proposal, MatchError>;

    /// Answer an opponent's draw offer. Declines unless overridden.
    async fn accept_draw(&mut self, _state: &GameState) -> bool {
        false
    }

    async fn on_game_start(&mut self, _state: &GameState) -> Result<(), MatchError> {
        Ok(())
    }

    async fn on_opponent_move(&mut self, _state: &GameState, _record: &MoveRecord) {}

    async fn on_game_end(&mut self, _state: &GameState) {}
}
