//! Turns configuration plus a pairing into a ready-to-run `Match`.

use std::sync::Arc;

use chess_core::{GameState, Side};
use commentary::{
    CommentaryConfig, CommentaryEngine, CommentaryFrequency, OpenAiCompatClient,
    TextGenerationClient,
};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::MatchError;
use crate::mode::{GameMode, ModeDefaults, PlayerKind};
use crate::orchestrator::{Match, MatchSettings};
use crate::players::{EnginePlayer, HumanPlayer, LlmPlayer, MoveSource};
use crate::teaching::TeachingAdvisor;

/// Who plays which side, plus per-run commentary and coaching overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSetup {
    pub white: PlayerKind,
    pub black: PlayerKind,
    pub commentary: bool,
    pub frequency: Option<CommentaryFrequency>,
    /// Advice before each human move
    pub teaching: bool,
}

impl MatchSetup {
    pub fn new(white: PlayerKind, black: PlayerKind) -> Self {
        Self {
            white,
            black,
            commentary: true,
            frequency: None,
            teaching: false,
        }
    }

    pub fn from_mode(mode: GameMode) -> Self {
        Self {
            teaching: mode.is_teaching(),
            ..Self::new(mode.white(), mode.black())
        }
    }

    pub fn mode(&self) -> GameMode {
        let mode = GameMode::for_pairing(self.white, self.black);
        if self.teaching && mode == GameMode::PlayerVsComputer {
            GameMode::Teaching
        } else {
            mode
        }
    }

    fn has_human(&self) -> bool {
        self.white == PlayerKind::Human || self.black == PlayerKind::Human
    }

    fn needs_llm(&self) -> bool {
        self.white == PlayerKind::Llm || self.black == PlayerKind::Llm
    }
}

/// The shared text-generation client, if credentials allow one.
pub fn text_client(config: &AppConfig) -> Result<Option<Arc<dyn TextGenerationClient>>, MatchError> {
    if !config.llm.is_configured() {
        return Ok(None);
    }
    let client = OpenAiCompatClient::new(config.llm.clone())?;
    Ok(Some(Arc::new(client)))
}

fn player_name(kind: PlayerKind, side: Side) -> String {
    match kind {
        PlayerKind::Human => format!("Human ({side})"),
        PlayerKind::Engine => format!("Stockfish ({side})"),
        PlayerKind::Llm => format!("LLM ({side})"),
    }
}

pub fn build_player(
    kind: PlayerKind,
    side: Side,
    config: &AppConfig,
    defaults: &ModeDefaults,
    client: Option<&Arc<dyn TextGenerationClient>>,
) -> Result<Box<dyn MoveSource>, MatchError> {
    let name = player_name(kind, side);
    let player: Box<dyn MoveSource> = match kind {
        PlayerKind::Human => Box::new(HumanPlayer::stdin(name)),
        PlayerKind::Engine => Box::new(EnginePlayer::new(name, config.engine_settings(defaults))),
        PlayerKind::Llm => {
            let client = client.cloned().ok_or_else(|| {
                MatchError::Config(format!(
                    "{} player needs a {} API key (set OPENROUTER_API_KEY or use CHESS_LLM_PROVIDER=ollama)",
                    kind,
                    config.llm.provider.display_name()
                ))
            })?;
            let style = match side {
                Side::White => defaults.llm_style_white,
                Side::Black => defaults.llm_style_black,
            };
            Box::new(LlmPlayer::new(name, side, client, style))
        }
    };
    Ok(player)
}

/// Build a match for `setup`. Fails only on configuration problems; a
/// missing engine binary is reported when the match starts.
pub fn build_match(config: &AppConfig, setup: &MatchSetup) -> Result<Match, MatchError> {
    let mode = setup.mode();
    let defaults = mode.defaults();

    let client = text_client(config)?;
    if setup.needs_llm() && client.is_none() {
        return Err(MatchError::Config(format!(
            "Mode {mode} needs an LLM; set OPENROUTER_API_KEY or use CHESS_LLM_PROVIDER=ollama"
        )));
    }

    let white = build_player(setup.white, Side::White, config, &defaults, client.as_ref())?;
    let black = build_player(setup.black, Side::Black, config, &defaults, client.as_ref())?;

    let state = GameState::new().with_max_plies(config.max_plies(&defaults));
    let settings = MatchSettings {
        seed: config.seed,
        ..MatchSettings::default()
    };
    let mut game = Match::new(white, black)
        .with_state(state)
        .with_settings(settings);

    if setup.teaching || config.teaching_enabled {
        if setup.has_human() {
            let advisor = TeachingAdvisor::stockfish(config.engine_settings(&defaults), client.clone());
            game = game.with_teaching(advisor);
            info!(%mode, explained = client.is_some(), "Teaching enabled");
        } else {
            warn!(%mode, "Teaching needs a human player, ignoring");
        }
    }

    if setup.commentary && config.commentary_enabled {
        let frequency = setup.frequency.unwrap_or_else(|| config.frequency(&defaults));
        if client.is_none() {
            warn!("No LLM credentials, commentary will use templates");
        }
        let engine = CommentaryEngine::new(
            client,
            CommentaryConfig {
                frequency,
                seed: config.seed,
                ..CommentaryConfig::default()
            },
        );
        game = game.with_commentary(engine);
        info!(%mode, %frequency, "Commentary enabled");
    }

    Ok(game)
}
