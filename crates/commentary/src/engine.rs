//! Decides who speaks after a move, asks the text generator for their lines
//! and falls back to templates whenever it can't.

use std::sync::Arc;
use std::time::Duration;

use chess_core::{GameState, MoveRecord, Piece, Side};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::client::{CompletionRequest, TextGenerationClient, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::error::LlmError;
use crate::event::{CommentaryEvent, CommentaryKind, CommentarySource};
use crate::fallback;
use crate::policy::CommentaryFrequency;
use crate::prompt::{self, EndOutcome, SpeakerRole};

pub const DEFAULT_MAX_CONCURRENT: usize = 4;
/// Whole-call budget, retries included. Covers clients with no timeout of
/// their own.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct CommentaryConfig {
    pub frequency: CommentaryFrequency,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Seed for fallback template selection
    pub seed: u64,
    /// Upper bound on in-flight completions
    pub max_concurrent: usize,
    /// Past this a call counts as failed and the template line is used
    pub call_timeout: Duration,
}

impl Default for CommentaryConfig {
    fn default() -> Self {
        Self {
            frequency: CommentaryFrequency::default(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            seed: 0,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Everything one speaker needs, captured before any call is issued.
struct Speech {
    slot: usize,
    piece: Piece,
    role: SpeakerRole,
    kind: CommentaryKind,
    move_number: u32,
    ply: Option<usize>,
    user_prompt: String,
    record: Option<MoveRecord>,
}

pub struct CommentaryEngine {
    client: Option<Arc<dyn TextGenerationClient>>,
    config: CommentaryConfig,
    limiter: Semaphore,
}

impl CommentaryEngine {
    pub fn new(client: Option<Arc<dyn TextGenerationClient>>, config: CommentaryConfig) -> Self {
        let limiter = Semaphore::new(config.max_concurrent.max(1));
        Self {
            client,
            config,
            limiter,
        }
    }

    /// Template commentary only; never touches the network.
    pub fn fallback_only(config: CommentaryConfig) -> Self {
        Self::new(None, config)
    }

    pub fn config(&self) -> &CommentaryConfig {
        &self.config
    }

    pub fn frequency(&self) -> CommentaryFrequency {
        self.config.frequency
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    pub fn should_comment(&self, record: &MoveRecord) -> bool {
        self.config.frequency.triggers(record)
    }

    /// Commentary for one applied move, in speaking order: mover, captured
    /// piece, checked king. Empty when the frequency policy skips the move.
    pub async fn generate_move_commentary(
        &self,
        state: &GameState,
        record: &MoveRecord,
    ) -> Vec<CommentaryEvent> {
        if !self.should_comment(record) {
            return Vec::new();
        }

        let mut speakers: Vec<(&Piece, SpeakerRole, CommentaryKind)> = Vec::with_capacity(3);
        if let Some(mover) = state.piece(record.piece) {
            speakers.push((mover, SpeakerRole::Mover, CommentaryKind::Move));
        }
        if let Some(victim) = record.captured.and_then(|id| state.piece(id)) {
            speakers.push((victim, SpeakerRole::Captured, CommentaryKind::Capture));
        }
        if record.is_check || record.is_checkmate {
            if let Some(king) = state.king_of(record.side.opposite()) {
                speakers.push((king, SpeakerRole::CheckedKing, CommentaryKind::Reaction));
            }
        }

        let speeches = speakers
            .into_iter()
            .enumerate()
            .map(|(slot, (piece, role, kind))| Speech {
                slot,
                piece: piece.clone(),
                role,
                kind,
                move_number: record.move_number,
                ply: Some(record.ply),
                user_prompt: prompt::move_prompt(piece, role, record),
                record: Some(record.clone()),
            })
            .collect();

        self.speak_all(speeches).await
    }

    /// Both kings greet the game, white first.
    pub async fn generate_game_start_commentary(&self, state: &GameState) -> Vec<CommentaryEvent> {
        let speeches = [Side::White, Side::Black]
            .into_iter()
            .filter_map(|side| state.king_of(side))
            .enumerate()
            .map(|(slot, king)| Speech {
                slot,
                piece: king.clone(),
                role: SpeakerRole::GameStart,
                kind: CommentaryKind::GameStart,
                move_number: 0,
                ply: None,
                user_prompt: prompt::situation_prompt(
                    king,
                    "The game is about to begin!",
                    state.fullmove_number(),
                ),
                record: None,
            })
            .collect();

        self.speak_all(speeches).await
    }

    /// Both kings react to the result, white first. Empty while unfinished.
    pub async fn generate_game_end_commentary(&self, state: &GameState) -> Vec<CommentaryEvent> {
        let Some(result) = state.result() else {
            return Vec::new();
        };
        let situation = prompt::end_situation(result.winner, &result.termination.to_string());
        let move_number = state.last_move().map(|r| r.move_number).unwrap_or(0);

        let speeches = [Side::White, Side::Black]
            .into_iter()
            .filter_map(|side| state.king_of(side))
            .enumerate()
            .map(|(slot, king)| {
                let outcome = match result.winner {
                    Some(winner) if winner == king.side => EndOutcome::Won,
                    Some(_) => EndOutcome::Lost,
                    None => EndOutcome::Drawn,
                };
                Speech {
                    slot,
                    piece: king.clone(),
                    role: SpeakerRole::GameEnd(outcome),
                    kind: CommentaryKind::GameEnd,
                    move_number,
                    ply: state.last_move().map(|r| r.ply),
                    user_prompt: prompt::situation_prompt(king, &situation, state.fullmove_number()),
                    record: None,
                }
            })
            .collect();

        self.speak_all(speeches).await
    }

    /// Calls run concurrently; `join_all` keeps the input order.
    async fn speak_all(&self, speeches: Vec<Speech>) -> Vec<CommentaryEvent> {
        join_all(speeches.into_iter().map(|s| self.speak(s))).await
    }

    async fn speak(&self, speech: Speech) -> CommentaryEvent {
        let personality = speech.piece.personality.clone();
        let family = fallback::family_for(
            speech.role,
            &personality,
            speech.piece.kind,
            speech.record.as_ref(),
        );

        let generated = match &self.client {
            Some(client) => {
                let request = CompletionRequest::new(personality.system_prompt(), speech.user_prompt.as_str())
                    .with_max_tokens(self.config.max_tokens)
                    .with_temperature(self.config.temperature);
                let _permit = self.limiter.acquire().await.ok();
                let budget = self.config.call_timeout;
                let outcome = tokio::time::timeout(budget, client.complete(&request))
                    .await
                    .unwrap_or(Err(LlmError::Timeout(budget)));
                match outcome {
                    Ok(text) => clean(&text),
                    Err(e) => {
                        warn!(
                            error = %e,
                            speaker = %personality.name(),
                            "Commentary generation failed, using fallback"
                        );
                        None
                    }
                }
            }
            None => None,
        };

        let (text, source) = match generated {
            Some(text) => (text, CommentarySource::Generated),
            None => {
                let seed = fallback::slot_seed(
                    self.config.seed,
                    speech.ply.unwrap_or(0),
                    speech.slot,
                    family,
                );
                (fallback::pick(family, seed).to_string(), CommentarySource::Fallback)
            }
        };

        debug!(
            speaker = %personality.name(),
            kind = ?speech.kind,
            ?source,
            "Commentary ready"
        );

        CommentaryEvent {
            move_number: speech.move_number,
            ply: speech.ply,
            piece: speech.piece.id,
            piece_kind: speech.piece.kind,
            side: speech.piece.side,
            personality_name: personality.name(),
            text,
            kind: speech.kind,
            source,
        }
    }
}

/// Trim whitespace and wrapping quotes; `None` if nothing is left.
fn clean(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim();
    (!unquoted.is_empty()).then(|| unquoted.to_string())
}
