use std::fmt;

use chess_core::{PieceId, PieceKind, Side};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentaryKind {
    Move,
    Capture,
    Reaction,
    GameStart,
    GameEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentarySource {
    Generated,
    Fallback,
}

/// One line spoken by one piece. Speaker fields are snapshots taken when the
/// line was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentaryEvent {
    /// 0 for game-start commentary
    pub move_number: u32,
    pub ply: Option<usize>,
    pub piece: PieceId,
    pub piece_kind: PieceKind,
    pub side: Side,
    pub personality_name: String,
    pub text: String,
    pub kind: CommentaryKind,
    pub source: CommentarySource,
}

impl fmt::Display for CommentaryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: \"{}\"", self.personality_name, self.text)
    }
}
