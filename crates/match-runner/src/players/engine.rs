use async_trait::async_trait;
use chess_core::GameState;
use tracing::{info, warn};

use super::{MoveSource, Proposal, TurnContext};
use crate::config::EngineSettings;
use crate::error::MatchError;
use crate::mode::PlayerKind;
use crate::stockfish::{locate_stockfish, StockfishEngine};

/// Stockfish over UCI. The process is spawned when the game starts and
/// shut down when it ends.
pub struct EnginePlayer {
    name: String,
    settings: EngineSettings,
    engine: Option<StockfishEngine>,
}

impl EnginePlayer {
    pub fn new(name: impl Into<String>, settings: EngineSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            engine: None,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }
}

#[async_trait]
impl MoveSource for EnginePlayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PlayerKind {
        PlayerKind::Engine
    }

    async fn on_game_start(&mut self, _state: &GameState) -> Result<(), MatchError> {
        if self.engine.is_some() {
            return Ok(());
        }
        let path = locate_stockfish(self.settings.path.as_deref()).ok_or_else(|| {
            MatchError::EngineUnavailable(match &self.settings.path {
                Some(p) => format!("Stockfish not found at {p}"),
                None => "Stockfish not found; install it or set STOCKFISH_PATH".to_string(),
            })
        })?;

        info!(player = %self.name, path = %path.display(), "Starting engine");
        self.engine = Some(StockfishEngine::new(&path, &self.settings).await?);
        Ok(())
    }

    async fn propose_move(&mut self, ctx: &TurnContext<'_>) -> Result<Proposal, MatchError> {
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| MatchError::EngineUnavailable("engine not started".into()))?;

        if let Some(err) = ctx.last_error {
            warn!(player = %self.name, error = %err, "Engine move rejected, searching again");
        }

        let uci = engine
            .best_move(&ctx.state.fen(), self.settings.depth, self.settings.movetime_ms)
            .await?;
        Ok(Proposal::Move(uci))
    }

    async fn on_game_end(&mut self, _state: &GameState) {
        if let Some(mut engine) = self.engine.take() {
            engine.quit().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_core::Side;

    #[tokio::test]
    async fn test_missing_binary_is_engine_unavailable() {
        let settings = EngineSettings {
            path: Some("/definitely/not/stockfish".to_string()),
            ..EngineSettings::default()
        };
        let mut player = EnginePlayer::new("Stockfish", settings);
        let state = GameState::new();

        let err = player.on_game_start(&state).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("/definitely/not/stockfish"));
    }

    #[tokio::test]
    async fn test_unstarted_engine_cannot_move() {
        let mut player = EnginePlayer::new("Stockfish", EngineSettings::default());
        let state = GameState::new();
        let ctx = TurnContext {
            state: &state,
            side: Side::White,
            attempt: 0,
            last_error: None,
        };
        assert!(matches!(
            player.propose_move(&ctx).await,
            Err(MatchError::EngineUnavailable(_))
        ));
    }
}
