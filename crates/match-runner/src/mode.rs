//! Game modes and their tuned defaults.

use std::fmt;
use std::str::FromStr;

use commentary::CommentaryFrequency;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerKind {
    Human,
    Engine,
    Llm,
}

impl PlayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerKind::Human => "human",
            PlayerKind::Engine => "engine",
            PlayerKind::Llm => "llm",
        }
    }

    /// Engine and LLM players get a bounded number of attempts per ply.
    pub fn is_machine(&self) -> bool {
        !matches!(self, PlayerKind::Human)
    }
}

impl fmt::Display for PlayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlayerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "player" => Ok(PlayerKind::Human),
            "engine" | "computer" | "stockfish" => Ok(PlayerKind::Engine),
            "llm" | "ai" => Ok(PlayerKind::Llm),
            other => Err(format!("unknown player kind '{other}' (expected human, engine or llm)")),
        }
    }
}

/// Playing-style hint handed to LLM players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmStyle {
    Aggressive,
    Defensive,
    #[default]
    Balanced,
    Creative,
}

impl LlmStyle {
    pub fn hint(&self) -> &'static str {
        match self {
            LlmStyle::Aggressive => "You prefer attacking play, piece sacrifices for initiative, and putting pressure on the opponent's king.",
            LlmStyle::Defensive => "You prefer solid, positional play, careful defense, and waiting for opponent mistakes.",
            LlmStyle::Balanced => "You play a balanced style, combining tactical awareness with positional understanding.",
            LlmStyle::Creative => "You enjoy creative, unexpected moves and are willing to take risks for interesting positions.",
        }
    }
}

impl FromStr for LlmStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aggressive" => Ok(LlmStyle::Aggressive),
            "defensive" => Ok(LlmStyle::Defensive),
            "balanced" => Ok(LlmStyle::Balanced),
            "creative" => Ok(LlmStyle::Creative),
            other => Err(format!("unknown LLM style '{other}'")),
        }
    }
}

/// Per-mode defaults; anything set explicitly by the user wins.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeDefaults {
    pub frequency: CommentaryFrequency,
    pub engine_depth: u32,
    pub engine_movetime_ms: u64,
    pub engine_skill: u8,
    pub llm_style_white: LlmStyle,
    pub llm_style_black: LlmStyle,
    pub max_plies: usize,
}

impl Default for ModeDefaults {
    fn default() -> Self {
        Self {
            frequency: CommentaryFrequency::EveryMove,
            engine_depth: 15,
            engine_movetime_ms: 1000,
            engine_skill: 20,
            llm_style_white: LlmStyle::Balanced,
            llm_style_black: LlmStyle::Balanced,
            max_plies: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    PlayerVsPlayer,
    PlayerVsComputer,
    ComputerVsComputer,
    PlayerVsLlm,
    LlmVsLlm,
    LlmVsComputer,
    /// Human vs Stockfish, coached before every move
    Teaching,
}

impl GameMode {
    pub const ALL: [GameMode; 7] = [
        GameMode::PlayerVsPlayer,
        GameMode::PlayerVsComputer,
        GameMode::ComputerVsComputer,
        GameMode::PlayerVsLlm,
        GameMode::LlmVsLlm,
        GameMode::LlmVsComputer,
        GameMode::Teaching,
    ];

    pub fn short_name(&self) -> &'static str {
        match self {
            GameMode::PlayerVsPlayer => "pvp",
            GameMode::PlayerVsComputer => "pvc",
            GameMode::ComputerVsComputer => "cvc",
            GameMode::PlayerVsLlm => "pvl",
            GameMode::LlmVsLlm => "lvl",
            GameMode::LlmVsComputer => "lvc",
            GameMode::Teaching => "teach",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            GameMode::PlayerVsPlayer => "Two human players",
            GameMode::PlayerVsComputer => "Human vs Stockfish chess engine",
            GameMode::ComputerVsComputer => "Stockfish vs Stockfish",
            GameMode::PlayerVsLlm => "Human vs LLM-controlled player",
            GameMode::LlmVsLlm => "LLM vs LLM",
            GameMode::LlmVsComputer => "LLM vs Stockfish chess engine",
            GameMode::Teaching => "Human vs Stockfish with coaching before each move",
        }
    }

    pub fn white(&self) -> PlayerKind {
        match self {
            GameMode::PlayerVsPlayer
            | GameMode::PlayerVsComputer
            | GameMode::PlayerVsLlm
            | GameMode::Teaching => PlayerKind::Human,
            GameMode::ComputerVsComputer => PlayerKind::Engine,
            GameMode::LlmVsLlm | GameMode::LlmVsComputer => PlayerKind::Llm,
        }
    }

    pub fn black(&self) -> PlayerKind {
        match self {
            GameMode::PlayerVsPlayer => PlayerKind::Human,
            GameMode::PlayerVsComputer
            | GameMode::ComputerVsComputer
            | GameMode::LlmVsComputer
            | GameMode::Teaching => PlayerKind::Engine,
            GameMode::PlayerVsLlm | GameMode::LlmVsLlm => PlayerKind::Llm,
        }
    }

    pub fn is_teaching(&self) -> bool {
        matches!(self, GameMode::Teaching)
    }

    /// The mode covering a pairing, regardless of which side each kind plays.
    /// Never `Teaching`; coaching is switched on separately.
    pub fn for_pairing(white: PlayerKind, black: PlayerKind) -> GameMode {
        use PlayerKind::*;
        match (white, black) {
            (Human, Human) => GameMode::PlayerVsPlayer,
            (Human, Engine) | (Engine, Human) => GameMode::PlayerVsComputer,
            (Engine, Engine) => GameMode::ComputerVsComputer,
            (Human, Llm) | (Llm, Human) => GameMode::PlayerVsLlm,
            (Llm, Llm) => GameMode::LlmVsLlm,
            (Llm, Engine) | (Engine, Llm) => GameMode::LlmVsComputer,
        }
    }

    pub fn defaults(&self) -> ModeDefaults {
        let base = ModeDefaults::default();
        match self {
            GameMode::PlayerVsPlayer => ModeDefaults {
                frequency: CommentaryFrequency::KeyMoments,
                ..base
            },
            GameMode::PlayerVsComputer | GameMode::Teaching => ModeDefaults {
                frequency: CommentaryFrequency::KeyMoments,
                engine_skill: 15,
                engine_depth: 15,
                ..base
            },
            GameMode::ComputerVsComputer => ModeDefaults {
                frequency: CommentaryFrequency::CapturesOnly,
                engine_skill: 20,
                engine_depth: 20,
                engine_movetime_ms: 500,
                max_plies: 300,
                ..base
            },
            GameMode::PlayerVsLlm => ModeDefaults {
                frequency: CommentaryFrequency::EveryMove,
                ..base
            },
            GameMode::LlmVsLlm => ModeDefaults {
                frequency: CommentaryFrequency::KeyMoments,
                llm_style_white: LlmStyle::Aggressive,
                llm_style_black: LlmStyle::Defensive,
                max_plies: 200,
                ..base
            },
            GameMode::LlmVsComputer => ModeDefaults {
                frequency: CommentaryFrequency::KeyMoments,
                engine_skill: 15,
                ..base
            },
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "pvp" | "player_vs_player" => Ok(GameMode::PlayerVsPlayer),
            "pvc" | "player_vs_computer" | "player_vs_comp" => Ok(GameMode::PlayerVsComputer),
            "cvc" | "computer_vs_computer" | "comp_vs_comp" => Ok(GameMode::ComputerVsComputer),
            "pvl" | "player_vs_llm" => Ok(GameMode::PlayerVsLlm),
            "lvl" | "llm_vs_llm" => Ok(GameMode::LlmVsLlm),
            "lvc" | "llm_vs_computer" | "llm_vs_comp" => Ok(GameMode::LlmVsComputer),
            "teach" | "teaching" => Ok(GameMode::Teaching),
            _ => Err(format!("Unknown game mode: {s}")),
        }
    }
}
