//! Events streamed to presentation layers, in emission order.

use std::fmt;

use chess_core::{GameResult, MoveRecord, Side};
use commentary::CommentaryEvent;
use serde::{Deserialize, Serialize};

use crate::mode::PlayerKind;
use crate::teaching::TeachingAdvice;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub name: String,
    pub kind: PlayerKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchEvent {
    GameStart {
        white: PlayerInfo,
        black: PlayerInfo,
        fen: String,
    },
    Move {
        record: MoveRecord,
        player: String,
        /// Chosen at random after the player ran out of attempts
        forced: bool,
    },
    Commentary(CommentaryEvent),
    /// Coaching for the human about to move
    Advice(TeachingAdvice),
    DrawOffered {
        by: Side,
        accepted: bool,
    },
    Paused,
    Resumed,
    Error {
        side: Option<Side>,
        message: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        legal_moves: Vec<String>,
    },
    GameEnd {
        result: GameResult,
        description: String,
        plies: usize,
    },
}

impl MatchEvent {
    pub fn error(side: Option<Side>, message: impl Into<String>) -> Self {
        MatchEvent::Error {
            side,
            message: message.into(),
            legal_moves: Vec::new(),
        }
    }
}

impl fmt::Display for MatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchEvent::GameStart { white, black, .. } => write!(
                f,
                "Game start: {} ({}) vs {} ({})",
                white.name, white.kind, black.name, black.kind
            ),
            MatchEvent::Move {
                record,
                player,
                forced,
            } => {
                let dots = if record.side == Side::White { "." } else { "..." };
                write!(f, "{}{dots} {} ({player})", record.move_number, record.san)?;
                if *forced {
                    f.write_str(" [random fallback]")?;
                }
                Ok(())
            }
            MatchEvent::Commentary(c) => write!(f, "  {c}"),
            MatchEvent::Advice(advice) => {
                write!(f, "Coach ({}): {}", advice.side, advice.position_assessment)?;
                for (i, candidate) in advice.candidate_moves.iter().enumerate() {
                    write!(f, "\n  {}. {} [{}]", i + 1, candidate.san, candidate.evaluation)?;
                    if !candidate.explanation.is_empty() {
                        write!(f, " {}", candidate.explanation)?;
                    }
                    if !candidate.likely_response.is_empty() {
                        write!(f, " {}", candidate.likely_response)?;
                    }
                }
                Ok(())
            }
            MatchEvent::DrawOffered { by, accepted } => write!(
                f,
                "{by} offers a draw: {}",
                if *accepted { "accepted" } else { "declined" }
            ),
            MatchEvent::Paused => f.write_str("Game paused"),
            MatchEvent::Resumed => f.write_str("Game resumed"),
            MatchEvent::Error {
                side: Some(side),
                message,
                ..
            } => write!(f, "Error ({side}): {message}"),
            MatchEvent::Error { message, .. } => write!(f, "Error: {message}"),
            MatchEvent::GameEnd {
                description, plies, ..
            } => write!(f, "Game over: {description} after {plies} plies"),
        }
    }
}
