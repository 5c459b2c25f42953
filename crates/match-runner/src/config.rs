//! Configuration from environment variables

use std::env;
use std::time::Duration;

use commentary::{ClientSettings, CommentaryFrequency, Provider};
use tracing::info;

use crate::error::MatchError;
use crate::mode::ModeDefaults;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    /// Stockfish binary; searched for on the system when unset
    pub path: Option<String>,
    pub depth: u32,
    pub movetime_ms: u64,
    /// UCI `Skill Level`, 0..=20
    pub skill: u8,
    pub threads: u32,
    pub hash_mb: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            path: None,
            depth: 15,
            movetime_ms: 1000,
            skill: 20,
            threads: 1,
            hash_mb: 128,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: ClientSettings,

    /// Engine values the user set explicitly; unset fields take mode defaults
    pub engine_path: Option<String>,
    pub engine_depth: Option<u32>,
    pub engine_movetime_ms: Option<u64>,
    pub engine_skill: Option<u8>,
    pub engine_threads: u32,
    pub engine_hash_mb: u32,

    pub commentary_enabled: bool,
    pub commentary_frequency: Option<CommentaryFrequency>,
    /// Seed for fallback commentary and random fallback moves
    pub seed: u64,

    pub max_plies: Option<usize>,

    /// Coach human players whatever the mode
    pub teaching_enabled: bool,
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        _ => default,
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, MatchError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MatchError> {
        let provider = match lookup("CHESS_LLM_PROVIDER") {
            Some(p) if !p.trim().is_empty() => p.parse::<Provider>().map_err(MatchError::Config)?,
            _ => Provider::OpenRouter,
        };

        let mut llm = ClientSettings::new(provider);
        llm.api_key = lookup("OPENROUTER_API_KEY").filter(|k| !k.trim().is_empty());
        if let Some(url) = lookup("CHESS_LLM_BASE_URL").filter(|v| !v.trim().is_empty()) {
            llm.base_url = url;
        }
        if let Some(model) = lookup("CHESS_LLM_MODEL").filter(|v| !v.trim().is_empty()) {
            llm.model = model;
        }
        llm.timeout = Duration::from_secs(parsed(&lookup, "CHESS_LLM_TIMEOUT_SECS").unwrap_or(3));
        llm.max_retries = parsed(&lookup, "CHESS_LLM_MAX_RETRIES").unwrap_or(2);

        let commentary_frequency = match lookup("COMMENTARY_FREQUENCY") {
            Some(f) if !f.trim().is_empty() => Some(f.parse().map_err(MatchError::Config)?),
            _ => None,
        };

        let config = Self {
            llm,
            engine_path: lookup("STOCKFISH_PATH").filter(|v| !v.trim().is_empty()),
            engine_depth: parsed(&lookup, "STOCKFISH_DEPTH"),
            engine_movetime_ms: parsed(&lookup, "STOCKFISH_MOVETIME_MS"),
            engine_skill: parsed::<u8>(&lookup, "STOCKFISH_SKILL").map(|s| s.min(20)),
            engine_threads: parsed(&lookup, "STOCKFISH_THREADS").unwrap_or(1),
            engine_hash_mb: parsed(&lookup, "STOCKFISH_HASH_MB").unwrap_or(128),
            commentary_enabled: flag(&lookup, "COMMENTARY_ENABLED", true),
            commentary_frequency,
            seed: parsed(&lookup, "COMMENTARY_SEED").unwrap_or(0),
            max_plies: parsed(&lookup, "MAX_PLIES"),
            teaching_enabled: flag(&lookup, "TEACHING_ENABLED", false),
        };

        info!(
            provider = %config.llm.provider,
            model = %config.llm.model,
            llm_configured = config.llm.is_configured(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Engine settings for a mode: explicit values first, then mode defaults.
    pub fn engine_settings(&self, defaults: &ModeDefaults) -> EngineSettings {
        EngineSettings {
            path: self.engine_path.clone(),
            depth: self.engine_depth.unwrap_or(defaults.engine_depth),
            movetime_ms: self.engine_movetime_ms.unwrap_or(defaults.engine_movetime_ms),
            skill: self.engine_skill.unwrap_or(defaults.engine_skill),
            threads: self.engine_threads,
            hash_mb: self.engine_hash_mb,
        }
    }

    pub fn frequency(&self, defaults: &ModeDefaults) -> CommentaryFrequency {
        self.commentary_frequency.unwrap_or(defaults.frequency)
    }

    pub fn max_plies(&self, defaults: &ModeDefaults) -> usize {
        self.max_plies.unwrap_or(defaults.max_plies).max(1)
    }
}
