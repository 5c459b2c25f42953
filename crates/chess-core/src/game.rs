//! Match state on top of the `shakmaty` rules oracle: piece tracking, move
//! history, captures and the WAITING / PLAYING / PAUSED / FINISHED machine.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Move, Position, Square};
use tracing::debug;

use crate::error::GameError;
use crate::personality::{Personality, PersonalityRegistry};
use crate::piece::{Piece, PieceId, PieceKind, Side};
use crate::record::MoveRecord;

/// Hard ply ceiling; reaching it ends the game as a draw.
pub const DEFAULT_MAX_PLIES: usize = 500;
/// Halfmove clock at which the game is drawn without a claim.
const SEVENTY_FIVE_MOVE_HALFMOVES: u32 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Waiting,
    Playing,
    Paused,
    Finished,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchStatus::Waiting => "waiting",
            MatchStatus::Playing => "playing",
            MatchStatus::Paused => "paused",
            MatchStatus::Finished => "finished",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    SeventyFiveMoveRule,
    Resignation,
    DrawAgreement,
    MoveLimit,
    Aborted,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Termination::Checkmate => "checkmate",
            Termination::Stalemate => "stalemate",
            Termination::InsufficientMaterial => "insufficient material",
            Termination::SeventyFiveMoveRule => "the seventy-five-move rule",
            Termination::Resignation => "resignation",
            Termination::DrawAgreement => "agreement",
            Termination::MoveLimit => "move limit",
            Termination::Aborted => "abort",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub winner: Option<Side>,
    pub termination: Termination,
}

impl GameResult {
    pub fn win(winner: Side, termination: Termination) -> Self {
        Self {
            winner: Some(winner),
            termination,
        }
    }

    pub fn draw(termination: Termination) -> Self {
        Self {
            winner: None,
            termination,
        }
    }

    pub fn aborted() -> Self {
        Self::draw(Termination::Aborted)
    }

    /// PGN result token.
    pub fn pgn_token(&self) -> &'static str {
        match (self.winner, self.termination) {
            (_, Termination::Aborted) => "*",
            (Some(Side::White), _) => "1-0",
            (Some(Side::Black), _) => "0-1",
            (None, _) => "1/2-1/2",
        }
    }

    pub fn is_draw(&self) -> bool {
        self.winner.is_none() && self.termination != Termination::Aborted
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.winner, self.termination) {
            (_, Termination::Aborted) => f.write_str("game aborted"),
            (Some(side), termination) => write!(f, "{} wins by {termination}", side.as_str()),
            (None, termination) => write!(f, "draw by {termination}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GameState {
    position: Chess,
    pieces: Vec<Piece>,
    squares: HashMap<Square, PieceId>,
    personalities: PersonalityRegistry,
    history: Vec<MoveRecord>,
    captured_white: Vec<PieceId>,
    captured_black: Vec<PieceId>,
    status: MatchStatus,
    result: Option<GameResult>,
    max_plies: usize,
    initial_fen: Option<String>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    /// Standard starting position with the stock personalities.
    pub fn new() -> Self {
        Self::build(Chess::default(), None, PersonalityRegistry::standard())
    }

    pub fn with_registry(personalities: PersonalityRegistry) -> Self {
        Self::build(Chess::default(), None, personalities)
    }

    /// Start from an arbitrary legal position.
    pub fn from_fen(fen: &str) -> Result<Self, GameError> {
        let parsed: Fen = fen
            .trim()
            .parse()
            .map_err(|e| GameError::InvalidFen(format!("{fen}: {e}")))?;
        let position: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| GameError::InvalidFen(format!("{fen}: {e}")))?;
        Ok(Self::build(
            position,
            Some(fen.trim().to_string()),
            PersonalityRegistry::standard(),
        ))
    }

    pub fn with_max_plies(mut self, max_plies: usize) -> Self {
        self.max_plies = max_plies.max(1);
        self
    }

    fn build(position: Chess, initial_fen: Option<String>, personalities: PersonalityRegistry) -> Self {
        let mut pieces = Vec::with_capacity(32);
        let mut squares = HashMap::with_capacity(32);

        for sq in Square::ALL {
            if let Some(p) = position.board().piece_at(sq) {
                let id = PieceId(pieces.len());
                let kind = PieceKind::from(p.role);
                let side = Side::from(p.color);
                pieces.push(Piece {
                    id,
                    kind,
                    side,
                    square: Some(sq),
                    personality: personalities.get(kind, side).clone(),
                    captured: false,
                    moves_made: 0,
                    captures_made: 0,
                });
                squares.insert(sq, id);
            }
        }

        Self {
            position,
            pieces,
            squares,
            personalities,
            history: Vec::new(),
            captured_white: Vec::new(),
            captured_black: Vec::new(),
            status: MatchStatus::Waiting,
            result: None,
            max_plies: DEFAULT_MAX_PLIES,
            initial_fen,
        }
    }

    // ---- Queries ----

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn result(&self) -> Option<GameResult> {
        self.result
    }

    pub fn is_finished(&self) -> bool {
        self.status == MatchStatus::Finished
    }

    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }

    pub fn last_move(&self) -> Option<&MoveRecord> {
        self.history.last()
    }

    pub fn ply_count(&self) -> usize {
        self.history.len()
    }

    pub fn max_plies(&self) -> usize {
        self.max_plies
    }

    pub fn turn(&self) -> Side {
        Side::from(self.position.turn())
    }

    pub fn fullmove_number(&self) -> u32 {
        self.position.fullmoves().get()
    }

    pub fn fen(&self) -> String {
        Fen::from_position(&self.position, EnPassantMode::Legal).to_string()
    }

    pub fn initial_fen(&self) -> Option<&str> {
        self.initial_fen.as_deref()
    }

    /// Read access to the oracle's position.
    pub fn position(&self) -> &Chess {
        &self.position
    }

    pub fn is_check(&self) -> bool {
        self.position.is_check()
    }

    pub fn is_checkmate(&self) -> bool {
        self.position.is_checkmate()
    }

    pub fn is_stalemate(&self) -> bool {
        self.position.is_stalemate()
    }

    pub fn legal_moves_san(&self) -> Vec<String> {
        self.position
            .legal_moves()
            .into_iter()
            .map(|mv| San::from_move(&self.position, mv).to_string())
            .collect()
    }

    pub fn legal_moves_uci(&self) -> Vec<String> {
        self.position
            .legal_moves()
            .into_iter()
            .map(|mv| mv.to_uci(CastlingMode::Standard).to_string())
            .collect()
    }

    /// Whether `input` (SAN or UCI) names a legal move in the current position.
    pub fn is_legal(&self, input: &str) -> bool {
        self.parse_move(input).is_some()
    }

    /// Normalise SAN or UCI input to canonical SAN, if legal.
    pub fn to_san(&self, input: &str) -> Option<String> {
        self.parse_move(input)
            .map(|mv| San::from_move(&self.position, mv).to_string())
    }

    pub fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.get(id.0)
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn piece_at(&self, square: &str) -> Option<&Piece> {
        let sq: Square = square.parse().ok()?;
        self.squares.get(&sq).and_then(|id| self.pieces.get(id.0))
    }

    /// Pieces of `side` still on the board.
    pub fn pieces_of(&self, side: Side) -> impl Iterator<Item = &Piece> {
        self.pieces
            .iter()
            .filter(move |p| p.side == side && !p.captured)
    }

    pub fn king_of(&self, side: Side) -> Option<&Piece> {
        self.pieces_of(side).find(|p| p.kind == PieceKind::King)
    }

    /// Captured pieces belonging to `side`, in capture order.
    pub fn captured(&self, side: Side) -> Vec<&Piece> {
        let ids = match side {
            Side::White => &self.captured_white,
            Side::Black => &self.captured_black,
        };
        ids.iter().filter_map(|id| self.pieces.get(id.0)).collect()
    }

    pub fn personalities(&self) -> &PersonalityRegistry {
        &self.personalities
    }

    pub fn personality(&self, kind: PieceKind, side: Side) -> &Arc<Personality> {
        self.personalities.get(kind, side)
    }

    // ---- Transitions ----

    fn require(&self, allowed: &[MatchStatus], action: &'static str) -> Result<(), GameError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(GameError::InvalidState {
                action,
                state: self.status,
            })
        }
    }

    /// Swap in a custom personality for its (piece, side) pair. Only allowed
    /// before the game starts.
    pub fn set_personality(&mut self, personality: Personality) -> Result<(), GameError> {
        self.require(&[MatchStatus::Waiting], "change a personality")?;
        let shared = self.personalities.set(personality);
        for piece in self
            .pieces
            .iter_mut()
            .filter(|p| p.kind == shared.piece_kind && p.side == shared.side)
        {
            piece.personality = shared.clone();
        }
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), GameError> {
        self.require(&[MatchStatus::Waiting], "start the game")?;
        self.status = MatchStatus::Playing;
        // A custom start position may already be decided.
        self.evaluate_termination(self.turn().opposite());
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), GameError> {
        self.require(&[MatchStatus::Playing], "pause")?;
        self.status = MatchStatus::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), GameError> {
        self.require(&[MatchStatus::Paused], "resume")?;
        self.status = MatchStatus::Playing;
        Ok(())
    }

    pub fn resign(&mut self, side: Side) -> Result<GameResult, GameError> {
        self.require(&[MatchStatus::Playing, MatchStatus::Paused], "resign")?;
        Ok(self.finish(GameResult::win(side.opposite(), Termination::Resignation)))
    }

    pub fn agree_draw(&mut self) -> Result<GameResult, GameError> {
        self.require(&[MatchStatus::Playing, MatchStatus::Paused], "agree a draw")?;
        Ok(self.finish(GameResult::draw(Termination::DrawAgreement)))
    }

    /// Tear the game down without a chess result.
    pub fn abort(&mut self) -> Result<GameResult, GameError> {
        self.require(
            &[MatchStatus::Waiting, MatchStatus::Playing, MatchStatus::Paused],
            "abort",
        )?;
        Ok(self.finish(GameResult::aborted()))
    }

    fn finish(&mut self, result: GameResult) -> GameResult {
        debug!(%result, plies = self.history.len(), "Game finished");
        self.status = MatchStatus::Finished;
        self.result = Some(result);
        result
    }

    /// Apply a move given in SAN or UCI. Atomic: on error nothing changes.
    pub fn apply_move(&mut self, input: &str) -> Result<&MoveRecord, GameError> {
        self.require(&[MatchStatus::Playing], "apply a move")?;

        let mv = self.parse_move(input).ok_or_else(|| GameError::IllegalMove {
            input: input.to_string(),
            legal: self.legal_moves_san(),
        })?;

        let idx = self.commit(mv)?;
        Ok(&self.history[idx])
    }

    fn parse_move(&self, input: &str) -> Option<Move> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }

        // SAN, tolerating annotation suffixes and zero-style castling.
        let san_text = trimmed
            .trim_end_matches(|c| matches!(c, '+' | '#' | '!' | '?'))
            .replace('0', "O");
        if let Ok(san) = san_text.parse::<San>() {
            if let Ok(mv) = san.to_move(&self.position) {
                return Some(mv);
            }
        }

        let uci: UciMove = trimmed.to_ascii_lowercase().parse().ok()?;
        uci.to_move(&self.position).ok()
    }

    fn tracked(&self, sq: Square) -> Result<PieceId, GameError> {
        self.squares
            .get(&sq)
            .copied()
            .ok_or_else(|| GameError::UntrackedSquare(sq.to_string()))
    }

    /// Play a legal move and update piece tracking. Every lookup that can fail
    /// happens before the first mutation.
    fn commit(&mut self, mv: Move) -> Result<usize, GameError> {
        let turn = self.position.turn();
        let side = Side::from(turn);
        let from = mv
            .from()
            .ok_or_else(|| GameError::UntrackedSquare(mv.to().to_string()))?;

        // Castling is encoded as king-takes-rook; resolve real destinations.
        let castle = match &mv {
            Move::Castle { rook, .. } => mv
                .castling_side()
                .map(|cs| (*rook, cs.rook_to(turn), cs.king_to(turn))),
            _ => None,
        };
        let to = castle.map(|(_, _, king_to)| king_to).unwrap_or_else(|| mv.to());

        let victim_square = if mv.is_en_passant() {
            Some(Square::from_coords(mv.to().file(), from.rank()))
        } else if mv.is_capture() {
            Some(mv.to())
        } else {
            None
        };

        let mover_id = self.tracked(from)?;
        let victim_id = victim_square.map(|sq| self.tracked(sq)).transpose()?;
        let rook_id = castle
            .map(|(rook_from, _, _)| self.tracked(rook_from))
            .transpose()?;

        let san = San::from_move(&self.position, mv.clone()).to_string();
        let uci = mv.to_uci(CastlingMode::Standard).to_string();
        let move_number = self.position.fullmoves().get();
        let mover_kind = self.pieces[mover_id.0].kind;
        let promotion = mv.promotion().map(PieceKind::from);

        self.position.play_unchecked(mv.clone());

        self.squares.remove(&from);
        let mut captured_kind = None;
        if let (Some(id), Some(sq)) = (victim_id, victim_square) {
            self.squares.remove(&sq);
            let victim = &mut self.pieces[id.0];
            victim.captured = true;
            victim.square = None;
            captured_kind = Some(victim.kind);
            match victim.side {
                Side::White => self.captured_white.push(id),
                Side::Black => self.captured_black.push(id),
            }
        }
        if let (Some(id), Some((rook_from, rook_to, _))) = (rook_id, castle) {
            self.squares.remove(&rook_from);
            self.squares.insert(rook_to, id);
            let rook = &mut self.pieces[id.0];
            rook.square = Some(rook_to);
            rook.moves_made += 1;
        }
        self.squares.insert(to, mover_id);

        let mover = &mut self.pieces[mover_id.0];
        mover.square = Some(to);
        mover.moves_made += 1;
        if victim_id.is_some() {
            mover.captures_made += 1;
        }
        if let Some(kind) = promotion {
            mover.kind = kind;
        }

        let is_checkmate = self.position.is_checkmate();
        let is_check = self.position.is_check();
        let suffix = if is_checkmate {
            "#"
        } else if is_check {
            "+"
        } else {
            ""
        };

        let record = MoveRecord {
            ply: self.history.len() + 1,
            move_number,
            side,
            san: format!("{san}{suffix}"),
            uci,
            from: from.to_string(),
            to: to.to_string(),
            piece: mover_id,
            piece_kind: mover_kind,
            captured: victim_id,
            captured_kind,
            is_check,
            is_checkmate,
            is_castling: castle.is_some(),
            is_en_passant: mv.is_en_passant(),
            promotion,
            fen_after: self.fen(),
        };
        debug!(ply = record.ply, san = %record.san, "Move applied");

        self.history.push(record);
        self.evaluate_termination(side);
        Ok(self.history.len() - 1)
    }

    /// `last_mover` is credited with a checkmate.
    fn evaluate_termination(&mut self, last_mover: Side) {
        if self.status != MatchStatus::Playing {
            return;
        }
        let result = if self.position.is_checkmate() {
            GameResult::win(last_mover, Termination::Checkmate)
        } else if self.position.is_stalemate() {
            GameResult::draw(Termination::Stalemate)
        } else if self.position.is_insufficient_material() {
            GameResult::draw(Termination::InsufficientMaterial)
        } else if self.position.halfmoves() >= SEVENTY_FIVE_MOVE_HALFMOVES {
            GameResult::draw(Termination::SeventyFiveMoveRule)
        } else if self.history.len() >= self.max_plies {
            GameResult::draw(Termination::MoveLimit)
        } else {
            return;
        };
        self.finish(result);
    }
}
