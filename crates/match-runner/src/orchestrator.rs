//! Drives one match ply by ply: ask the side to move, apply, announce,
//! let the pieces talk, repeat.

use std::sync::Arc;

use chess_core::{
    GameError, GameResult, GameState, MoveRecord, Personality, PgnHeaders, PlyComment, Side,
};
use commentary::{CommentaryEngine, CommentaryEvent};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::MatchError;
use crate::events::{MatchEvent, PlayerInfo};
use crate::mode::PlayerKind;
use crate::players::{MoveSource, Proposal, TurnContext};
use crate::teaching::TeachingAdvisor;

/// Attempts an engine or LLM gets per ply before a random move is played.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub max_attempts: u32,
    /// Seeds the random fallback move choice
    pub seed: u64,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Run,
    Pause,
    Stop,
}

/// Pause, resume or stop a running match from another task.
#[derive(Clone)]
pub struct MatchControl {
    tx: Arc<watch::Sender<ControlSignal>>,
}

impl MatchControl {
    pub fn pause(&self) {
        self.tx.send_if_modified(|signal| {
            let changed = *signal == ControlSignal::Run;
            if changed {
                *signal = ControlSignal::Pause;
            }
            changed
        });
    }

    pub fn resume(&self) {
        self.tx.send_if_modified(|signal| {
            let changed = *signal == ControlSignal::Pause;
            if changed {
                *signal = ControlSignal::Run;
            }
            changed
        });
    }

    /// Takes effect at the next suspension point; the game ends aborted.
    pub fn stop(&self) {
        self.tx.send_replace(ControlSignal::Stop);
    }

    pub fn signal(&self) -> ControlSignal {
        *self.tx.borrow()
    }
}

/// Everything a finished match leaves behind.
#[derive(Debug)]
pub struct MatchSummary {
    pub result: GameResult,
    pub plies: usize,
    pub pgn: String,
    /// Commentary in emission order
    pub commentary: Vec<CommentaryEvent>,
    pub state: GameState,
}

impl MatchSummary {
    pub fn history(&self) -> &[MoveRecord] {
        self.state.history()
    }
}

enum PlyOutcome {
    Moved { record: MoveRecord, forced: bool },
    /// Resignation or agreed draw
    Ended,
}

pub struct Match {
    state: GameState,
    white: Box<dyn MoveSource>,
    black: Box<dyn MoveSource>,
    commentary: Option<CommentaryEngine>,
    teaching: Option<TeachingAdvisor>,
    events: Option<mpsc::UnboundedSender<MatchEvent>>,
    control_tx: Arc<watch::Sender<ControlSignal>>,
    control_rx: watch::Receiver<ControlSignal>,
    log: Vec<CommentaryEvent>,
    rng: StdRng,
    settings: MatchSettings,
    headers: PgnHeaders,
}

/// Resolves once a stop has been requested.
async fn stopped(rx: &mut watch::Receiver<ControlSignal>) {
    if rx.wait_for(|s| *s == ControlSignal::Stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

impl Match {
    pub fn new(white: Box<dyn MoveSource>, black: Box<dyn MoveSource>) -> Self {
        let (control_tx, control_rx) = watch::channel(ControlSignal::Run);
        let headers = PgnHeaders::players(white.name(), black.name());
        let settings = MatchSettings::default();
        Self {
            state: GameState::new(),
            white,
            black,
            commentary: None,
            teaching: None,
            events: None,
            control_tx: Arc::new(control_tx),
            control_rx,
            log: Vec::new(),
            rng: StdRng::seed_from_u64(settings.seed),
            settings,
            headers,
        }
    }

    /// Play from a prepared state instead of the standard start.
    pub fn with_state(mut self, state: GameState) -> Self {
        self.state = state;
        self
    }

    pub fn with_commentary(mut self, engine: CommentaryEngine) -> Self {
        self.commentary = Some(engine);
        self
    }

    /// Coach human players before each of their moves.
    pub fn with_teaching(mut self, advisor: TeachingAdvisor) -> Self {
        self.teaching = Some(advisor);
        self
    }

    pub fn has_teaching(&self) -> bool {
        self.teaching.is_some()
    }

    pub fn with_settings(mut self, settings: MatchSettings) -> Self {
        self.rng = StdRng::seed_from_u64(settings.seed);
        self.settings = settings;
        self
    }

    pub fn with_headers(mut self, headers: PgnHeaders) -> Self {
        self.headers = headers;
        self
    }

    /// Swap in a custom personality. Only before the match starts.
    pub fn set_personality(&mut self, personality: Personality) -> Result<(), MatchError> {
        self.state.set_personality(personality)?;
        Ok(())
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn control(&self) -> MatchControl {
        MatchControl {
            tx: self.control_tx.clone(),
        }
    }

    /// Event stream for a presentation layer. A later call replaces the
    /// earlier subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<MatchEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    fn emit(&self, event: MatchEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver just means nobody is watching.
            let _ = tx.send(event);
        }
    }

    fn record_commentary(&mut self, lines: Vec<CommentaryEvent>) {
        for line in lines {
            self.emit(MatchEvent::Commentary(line.clone()));
            self.log.push(line);
        }
    }

    fn player_info(player: &dyn MoveSource) -> PlayerInfo {
        PlayerInfo {
            name: player.name().to_string(),
            kind: player.kind(),
        }
    }

    /// Play the match to the end. Only setup failures and a lost engine
    /// surface as errors; everything else ends up in the result.
    pub async fn run(mut self) -> Result<MatchSummary, MatchError> {
        self.white.on_game_start(&self.state).await?;
        if let Err(e) = self.black.on_game_start(&self.state).await {
            self.white.on_game_end(&self.state).await;
            return Err(e);
        }

        let teaching_failed = match self.teaching.as_mut() {
            Some(advisor) => advisor.start().await.err(),
            None => None,
        };
        if let Some(e) = teaching_failed {
            warn!(error = %e, "Teaching unavailable, playing without advice");
            self.teaching = None;
        }

        self.state.start()?;
        info!(
            white = %self.white.name(),
            black = %self.black.name(),
            "Match started"
        );
        self.emit(MatchEvent::GameStart {
            white: Self::player_info(self.white.as_ref()),
            black: Self::player_info(self.black.as_ref()),
            fen: self.state.fen(),
        });

        let mut stop_rx = self.control_rx.clone();
        let mut aborted = false;

        if let Some(engine) = &self.commentary {
            let lines = tokio::select! {
                biased;
                _ = stopped(&mut stop_rx) => None,
                lines = engine.generate_game_start_commentary(&self.state) => Some(lines),
            };
            match lines {
                Some(lines) => self.record_commentary(lines),
                None => aborted = true,
            }
        }

        while !aborted && !self.state.is_finished() {
            if !self.checkpoint().await? {
                aborted = true;
                break;
            }

            let outcome = tokio::select! {
                biased;
                _ = stopped(&mut stop_rx) => None,
                outcome = self.play_ply() => Some(outcome),
            };

            let (record, forced) = match outcome {
                None => {
                    aborted = true;
                    break;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Match ended by fatal error");
                    self.wind_down().await;
                    return Err(e);
                }
                Some(Ok(PlyOutcome::Ended)) => continue,
                Some(Ok(PlyOutcome::Moved { record, forced })) => (record, forced),
            };

            let player = match record.side {
                Side::White => self.white.name().to_string(),
                Side::Black => self.black.name().to_string(),
            };
            let opponent = match record.side {
                Side::White => &mut self.black,
                Side::Black => &mut self.white,
            };
            opponent.on_opponent_move(&self.state, &record).await;

            debug!(ply = record.ply, san = %record.san, %player, forced, "Move played");
            self.emit(MatchEvent::Move {
                record: record.clone(),
                player,
                forced,
            });

            if let Some(engine) = &self.commentary {
                let lines = tokio::select! {
                    biased;
                    _ = stopped(&mut stop_rx) => None,
                    lines = engine.generate_move_commentary(&self.state, &record) => Some(lines),
                };
                match lines {
                    Some(lines) => self.record_commentary(lines),
                    None => aborted = true,
                }
            }
        }

        if aborted && !self.state.is_finished() {
            self.state.abort()?;
            info!("Match stopped");
        }

        let result = self.state.result().unwrap_or_else(GameResult::aborted);
        let plies = self.state.ply_count();
        info!(%result, plies, "Match finished");
        self.emit(MatchEvent::GameEnd {
            result,
            description: result.to_string(),
            plies,
        });

        if !aborted {
            if let Some(engine) = &self.commentary {
                let lines = engine.generate_game_end_commentary(&self.state).await;
                self.record_commentary(lines);
            }
        }

        self.wind_down().await;

        let comments: Vec<PlyComment> = self
            .log
            .iter()
            .map(|c| PlyComment::new(c.ply.unwrap_or(0), format!("{}: {}", c.personality_name, c.text)))
            .collect();
        let pgn = self.state.to_pgn(&self.headers, &comments);

        Ok(MatchSummary {
            result,
            plies,
            pgn,
            commentary: self.log,
            state: self.state,
        })
    }

    async fn wind_down(&mut self) {
        self.white.on_game_end(&self.state).await;
        self.black.on_game_end(&self.state).await;
        if let Some(advisor) = self.teaching.as_mut() {
            advisor.close().await;
        }
    }

    /// Advice for a human about to move. Failures cost only the advice.
    async fn advise(&mut self, side: Side) {
        let kind = match side {
            Side::White => self.white.kind(),
            Side::Black => self.black.kind(),
        };
        if kind != PlayerKind::Human {
            return;
        }
        let Some(advisor) = self.teaching.as_mut() else {
            return;
        };

        let advice = advisor.analyze(&self.state).await;
        match advice {
            Ok(advice) => {
                debug!(%side, candidates = advice.candidate_moves.len(), "Advice ready");
                self.emit(MatchEvent::Advice(advice));
            }
            Err(e) => {
                warn!(%side, error = %e, "Teaching advice failed");
                self.emit(MatchEvent::error(Some(side), format!("No advice this move: {e}")));
            }
        }
    }

    /// Honour pause requests between plies. `false` means stop.
    async fn checkpoint(&mut self) -> Result<bool, MatchError> {
        let signal = *self.control_rx.borrow_and_update();
        match signal {
            ControlSignal::Run => Ok(true),
            ControlSignal::Stop => Ok(false),
            ControlSignal::Pause => {
                self.state.pause()?;
                self.emit(MatchEvent::Paused);
                info!(ply = self.state.ply_count(), "Match paused");

                let next = match self.control_rx.wait_for(|s| *s != ControlSignal::Pause).await {
                    Ok(signal) => *signal,
                    Err(_) => ControlSignal::Stop,
                };
                if next == ControlSignal::Stop {
                    return Ok(false);
                }

                self.state.resume()?;
                self.emit(MatchEvent::Resumed);
                info!("Match resumed");
                Ok(true)
            }
        }
    }

    /// Solicit proposals from the side to move until one sticks.
    async fn play_ply(&mut self) -> Result<PlyOutcome, MatchError> {
        let side = self.state.turn();
        self.advise(side).await;

        let mut attempts = 0u32;
        let mut last_error: Option<GameError> = None;

        loop {
            let player = match side {
                Side::White => &mut self.white,
                Side::Black => &mut self.black,
            };
            let machine = player.kind().is_machine();
            let name = player.name().to_string();
            let ctx = TurnContext {
                state: &self.state,
                side,
                attempt: attempts,
                last_error: last_error.as_ref(),
            };
            let proposal = player.propose_move(&ctx).await;

            let proposal = match proposal {
                Ok(proposal) => proposal,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) if machine => {
                    warn!(player = %name, attempt = attempts + 1, error = %e, "Move request failed");
                    self.emit(MatchEvent::error(Some(side), e.to_string()));
                    attempts += 1;
                    if attempts >= self.settings.max_attempts {
                        return self.random_move(side, &name);
                    }
                    continue;
                }
                Err(e) => {
                    // A human whose input broke can't continue.
                    warn!(player = %name, error = %e, "Input failed, resigning");
                    Proposal::Resign
                }
            };

            match proposal {
                Proposal::Move(text) => {
                    let applied = self.state.apply_move(&text).map(|r| r.clone());
                    match applied {
                        Ok(record) => {
                            return Ok(PlyOutcome::Moved {
                                record,
                                forced: false,
                            })
                        }
                        Err(e @ GameError::IllegalMove { .. }) => {
                            debug!(player = %name, input = %text, "Illegal move");
                            self.emit(MatchEvent::Error {
                                side: Some(side),
                                message: e.to_string(),
                                legal_moves: e.legal_moves().map(<[String]>::to_vec).unwrap_or_default(),
                            });
                            if machine {
                                attempts += 1;
                                if attempts >= self.settings.max_attempts {
                                    return self.random_move(side, &name);
                                }
                            }
                            last_error = Some(e);
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Proposal::Resign => {
                    info!(player = %name, %side, "Resigned");
                    self.state.resign(side)?;
                    return Ok(PlyOutcome::Ended);
                }
                Proposal::OfferDraw => {
                    let opponent = match side {
                        Side::White => &mut self.black,
                        Side::Black => &mut self.white,
                    };
                    let accepted = opponent.accept_draw(&self.state).await;
                    self.emit(MatchEvent::DrawOffered { by: side, accepted });
                    if accepted {
                        self.state.agree_draw()?;
                        return Ok(PlyOutcome::Ended);
                    }
                }
            }
        }
    }

    fn random_move(&mut self, side: Side, name: &str) -> Result<PlyOutcome, MatchError> {
        let legal = self.state.legal_moves_uci();
        let choice = legal
            .choose(&mut self.rng)
            .ok_or_else(|| MatchError::Player(format!("{side} has no legal moves")))?;
        warn!(player = %name, mv = %choice, "Out of attempts, playing a random move");
        let record = self.state.apply_move(choice)?.clone();
        Ok(PlyOutcome::Moved {
            record,
            forced: true,
        })
    }
}
