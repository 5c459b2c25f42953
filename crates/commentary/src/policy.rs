use std::fmt;
use std::str::FromStr;

use chess_core::MoveRecord;
use serde::{Deserialize, Serialize};

/// Which moves are eligible for commentary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentaryFrequency {
    #[default]
    EveryMove,
    CapturesOnly,
    KeyMoments,
}

impl CommentaryFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentaryFrequency::EveryMove => "every_move",
            CommentaryFrequency::CapturesOnly => "captures_only",
            CommentaryFrequency::KeyMoments => "key_moments",
        }
    }

    pub fn triggers(&self, record: &MoveRecord) -> bool {
        match self {
            CommentaryFrequency::EveryMove => true,
            CommentaryFrequency::CapturesOnly => record.is_capture(),
            CommentaryFrequency::KeyMoments => record.is_key_moment(),
        }
    }
}

impl fmt::Display for CommentaryFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommentaryFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "every_move" | "all" => Ok(CommentaryFrequency::EveryMove),
            "captures_only" | "captures" => Ok(CommentaryFrequency::CapturesOnly),
            "key_moments" | "key" => Ok(CommentaryFrequency::KeyMoments),
            other => Err(format!(
                "unknown commentary frequency '{other}' (expected every_move, captures_only or key_moments)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_core::GameState;

    fn record_of(moves: &[&str]) -> MoveRecord {
        let mut game = GameState::new();
        game.start().unwrap();
        for mv in moves {
            game.apply_move(mv).unwrap();
        }
        game.last_move().cloned().unwrap()
    }

    #[test]
    fn test_parse() {
        assert_eq!("captures-only".parse(), Ok(CommentaryFrequency::CapturesOnly));
        assert_eq!("KEY_MOMENTS".parse(), Ok(CommentaryFrequency::KeyMoments));
        assert!("sometimes".parse::<CommentaryFrequency>().is_err());
    }

    #[test]
    fn test_policy_triggers() {
        let quiet = record_of(&["e4"]);
        let capture = record_of(&["e4", "d5", "exd5"]);
        let castle = record_of(&["e4", "e5", "Nf3", "Nc6", "Bc4", "Bc5", "O-O"]);
        let check = record_of(&["e4", "f5", "Qh5+"]);

        assert!(CommentaryFrequency::EveryMove.triggers(&quiet));

        assert!(!CommentaryFrequency::CapturesOnly.triggers(&quiet));
        assert!(CommentaryFrequency::CapturesOnly.triggers(&capture));
        assert!(!CommentaryFrequency::CapturesOnly.triggers(&check));
        assert!(!CommentaryFrequency::CapturesOnly.triggers(&castle));

        assert!(!CommentaryFrequency::KeyMoments.triggers(&quiet));
        assert!(CommentaryFrequency::KeyMoments.triggers(&capture));
        assert!(CommentaryFrequency::KeyMoments.triggers(&castle));
        assert!(CommentaryFrequency::KeyMoments.triggers(&check));
    }
}
