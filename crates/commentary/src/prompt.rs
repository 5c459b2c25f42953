//! Situational prompts. The system half lives on `Personality`.

use chess_core::{MoveRecord, Piece, PieceKind, Side};

/// Why a piece is speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakerRole {
    Mover,
    Captured,
    CheckedKing,
    GameStart,
    GameEnd(EndOutcome),
}

/// Game result from the speaker's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOutcome {
    Won,
    Lost,
    Drawn,
}

pub fn move_prompt(speaker: &Piece, role: SpeakerRole, record: &MoveRecord) -> String {
    let mut context = Vec::new();

    if role == SpeakerRole::Mover {
        context.push(format!(
            "You just moved from {} to {} ({}).",
            record.from, record.to, record.san
        ));
        if let Some(kind) = record.captured_kind {
            context.push(format!("You captured the enemy {kind}!"));
        }
        if let Some(kind) = record.promotion {
            context.push(format!("You have been promoted to a {kind}!"));
        }
        if record.is_checkmate {
            context.push("CHECKMATE! You've won the game!".to_string());
        } else if record.is_check {
            context.push("Your move puts the enemy king in check!".to_string());
        }
    } else {
        context.push(format!(
            "The {} {} moved {} (from {} to {}).",
            record.side, record.piece_kind, record.san, record.from, record.to
        ));
        if role == SpeakerRole::Captured {
            context.push("You have been captured!".to_string());
        }
        if role == SpeakerRole::CheckedKing {
            if record.is_checkmate {
                context.push("You are checkmated. The game is lost.".to_string());
            } else if speaker.kind == PieceKind::King {
                context.push("You are in check!".to_string());
            } else {
                context.push("Your king is in check!".to_string());
            }
        }
    }

    let tone = if record.is_check || record.is_checkmate {
        "an intense"
    } else {
        "a developing"
    };

    format!(
        "Game situation: {}\n\n\
         The board position shows {tone} game.\n\
         Move number: {}\n\n\
         Give a brief, in-character reaction (1-2 sentences). Don't explain the move \
         technically - react emotionally/dramatically as your character would.",
        context.join(" "),
        record.move_number
    )
}

pub fn situation_prompt(speaker: &Piece, situation: &str, move_number: u32) -> String {
    format!(
        "Current situation: {situation}\n\n\
         You are at square {}. The game is at move {move_number}.\n\n\
         Give a brief, in-character comment about this situation (1-2 sentences).",
        speaker.square_name()
    )
}

pub fn end_situation(winner: Option<Side>, reason: &str) -> String {
    match winner {
        Some(side) => format!("{side} has won the game by {reason}!"),
        None if reason == "abort" => "The game has ended.".to_string(),
        None => format!("The game is a draw by {reason}!"),
    }
}
