use serde::{Deserialize, Serialize};

use crate::piece::{PieceId, PieceKind, Side};

/// One applied ply. Created once, never modified, appended in play order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// 1-based half-move index
    pub ply: usize,
    /// Full-move number the ply belongs to
    pub move_number: u32,
    pub side: Side,
    /// SAN including the check / mate suffix
    pub san: String,
    pub uci: String,
    pub from: String,
    /// Destination square; for castling, the king's destination
    pub to: String,
    pub piece: PieceId,
    /// Moving piece type before the move (a promoting pawn is still a pawn here)
    pub piece_kind: PieceKind,
    pub captured: Option<PieceId>,
    pub captured_kind: Option<PieceKind>,
    pub is_check: bool,
    pub is_checkmate: bool,
    pub is_castling: bool,
    pub is_en_passant: bool,
    pub promotion: Option<PieceKind>,
    pub fen_after: String,
}

impl MoveRecord {
    pub fn is_capture(&self) -> bool {
        self.captured.is_some()
    }

    pub fn is_promotion(&self) -> bool {
        self.promotion.is_some()
    }

    /// Capture, check, mate, promotion or castling.
    pub fn is_key_moment(&self) -> bool {
        self.is_capture()
            || self.is_check
            || self.is_checkmate
            || self.is_promotion()
            || self.is_castling
    }
}
