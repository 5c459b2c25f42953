//! Coaching for human players: Stockfish's top lines, explained by the
//! language model when one is configured and by stock phrases otherwise.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chess_core::{GameState, Side};
use commentary::{CommentarySource, CompletionRequest, LlmError, TextGenerationClient};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineSettings;
use crate::error::MatchError;
use crate::stockfish::{locate_stockfish, StockfishEngine};

pub const NUM_CANDIDATES: usize = 3;
/// Minimum depth for the candidate search
pub const ANALYSIS_DEPTH: u32 = 15;
/// Depth used to guess the opponent's reply
pub const RESPONSE_DEPTH: u32 = 10;
pub const DEFAULT_ADVICE_TIMEOUT: Duration = Duration::from_secs(15);

const COACH_TEMPERATURE: f32 = 0.3;
const COACH_MAX_TOKENS: u32 = 600;
const MAX_FALLBACK_TEXT: usize = 200;

const COACH_SYSTEM_PROMPT: &str = "You are a patient, knowledgeable chess coach. \
Give clear, educational explanations to help players understand tactical and \
strategic reasons behind moves. Be concise.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMove {
    pub san: String,
    /// "+0.50", "Mate in 3", ...
    pub evaluation: String,
    pub explanation: String,
    pub likely_response: String,
    pub follow_up_plan: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeachingAdvice {
    pub position_assessment: String,
    pub candidate_moves: Vec<CandidateMove>,
    pub side: Side,
    pub move_number: u32,
    pub source: CommentarySource,
}

/// A candidate from the engine, already in SAN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysedLine {
    pub san: String,
    pub evaluation: String,
    /// The opponent's best answer, unless the move ends the game
    pub reply: Option<String>,
}

/// Where candidate moves come from.
#[async_trait]
pub trait PositionAnalyser: Send {
    async fn start(&mut self) -> Result<(), MatchError> {
        Ok(())
    }

    /// Up to `count` lines for the side to move, best first.
    async fn top_lines(&mut self, state: &GameState, count: usize) -> Result<Vec<AnalysedLine>, MatchError>;

    async fn close(&mut self) {}
}

/// Multi-PV search on a dedicated Stockfish at full strength.
pub struct StockfishAnalyser {
    settings: EngineSettings,
    engine: Option<StockfishEngine>,
}

impl StockfishAnalyser {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings: EngineSettings {
                skill: 20,
                depth: settings.depth.max(ANALYSIS_DEPTH),
                ..settings
            },
            engine: None,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }
}

#[async_trait]
impl PositionAnalyser for StockfishAnalyser {
    async fn start(&mut self) -> Result<(), MatchError> {
        if self.engine.is_some() {
            return Ok(());
        }
        let path = locate_stockfish(self.settings.path.as_deref()).ok_or_else(|| {
            MatchError::EngineUnavailable("Stockfish not found; teaching needs it for analysis".into())
        })?;
        info!(path = %path.display(), "Starting teaching engine");
        self.engine = Some(StockfishEngine::new(&path, &self.settings).await?);
        Ok(())
    }

    async fn top_lines(&mut self, state: &GameState, count: usize) -> Result<Vec<AnalysedLine>, MatchError> {
        self.start().await?;
        let settings = self.settings.clone();
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| MatchError::EngineUnavailable("Teaching engine not started".into()))?;

        let lines = engine
            .analyse(&state.fen(), count, settings.depth, settings.movetime_ms)
            .await?;

        let mut analysed = Vec::with_capacity(lines.len());
        for line in lines {
            let Some(san) = state.to_san(&line.first_move) else {
                continue;
            };
            let mut after = state.clone();
            after.apply_move(&line.first_move)?;

            let reply = if after.is_finished() {
                None
            } else {
                let reply = engine
                    .best_move(&after.fen(), RESPONSE_DEPTH, settings.movetime_ms)
                    .await?;
                after.to_san(&reply)
            };

            analysed.push(AnalysedLine {
                san,
                evaluation: line.score.to_string(),
                reply,
            });
        }
        Ok(analysed)
    }

    async fn close(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.quit().await;
        }
    }
}

/// Builds advice before each human move.
pub struct TeachingAdvisor {
    analyser: Box<dyn PositionAnalyser>,
    client: Option<Arc<dyn TextGenerationClient>>,
    candidates: usize,
    timeout: Duration,
}

impl TeachingAdvisor {
    pub fn new(analyser: Box<dyn PositionAnalyser>, client: Option<Arc<dyn TextGenerationClient>>) -> Self {
        Self {
            analyser,
            client,
            candidates: NUM_CANDIDATES,
            timeout: DEFAULT_ADVICE_TIMEOUT,
        }
    }

    pub fn stockfish(settings: EngineSettings, client: Option<Arc<dyn TextGenerationClient>>) -> Self {
        Self::new(Box::new(StockfishAnalyser::new(settings)), client)
    }

    pub fn with_candidates(mut self, candidates: usize) -> Self {
        self.candidates = candidates.max(1);
        self
    }

    /// Budget for the explanation call; past it the stock phrases are used.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn start(&mut self) -> Result<(), MatchError> {
        self.analyser.start().await
    }

    pub async fn close(&mut self) {
        self.analyser.close().await;
    }

    /// Advice for the side to move. Engine failures surface; a missing or
    /// failing text generator only downgrades the explanations.
    pub async fn analyze(&mut self, state: &GameState) -> Result<TeachingAdvice, MatchError> {
        let lines = self.analyser.top_lines(state, self.candidates).await?;

        if let Some(client) = &self.client {
            let request = CompletionRequest::new(COACH_SYSTEM_PROMPT, coaching_prompt(state, &lines))
                .with_temperature(COACH_TEMPERATURE)
                .with_max_tokens(COACH_MAX_TOKENS);
            let reply = tokio::time::timeout(self.timeout, client.complete(&request))
                .await
                .unwrap_or(Err(LlmError::Timeout(self.timeout)));
            match reply {
                Ok(text) if !text.trim().is_empty() => {
                    debug!(candidates = lines.len(), "Coaching advice generated");
                    return Ok(parse_advice(&text, &lines, state.turn(), state.fullmove_number()));
                }
                Ok(_) => warn!("Empty coaching reply, using stock advice"),
                Err(e) => warn!(error = %e, "Coaching explanation failed, using stock advice"),
            }
        }

        Ok(fallback_advice(state, &lines))
    }
}

fn coaching_prompt(state: &GameState, lines: &[AnalysedLine]) -> String {
    let candidates = lines
        .iter()
        .enumerate()
        .map(|(i, line)| match &line.reply {
            Some(reply) => format!(
                "{}. {} (eval: {}, opponent may respond: {reply})",
                i + 1,
                line.san,
                line.evaluation
            ),
            None => format!("{}. {} (eval: {})", i + 1, line.san, line.evaluation),
        })
        .collect::<Vec<_>>()
        .join("\n");

    let sections = lines
        .iter()
        .map(|line| {
            format!(
                "MOVE ({}):\n- Why: [1 sentence tactical/strategic reason]\n\
                 - Response: [opponent's likely reply and why]\n\
                 - Follow-up: [player's next strategic goal]",
                line.san
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let check = if state.is_check() { ", currently in check" } else { "" };

    format!(
        "You are a chess coach giving concise guidance to a student.\n\n\
         Position (FEN): {fen}\n\
         Player's color: {side}\n\
         Move number: {number}{check}\n\n\
         Stockfish's top candidate moves:\n{candidates}\n\n\
         Provide coaching advice in exactly this format (keep each section to 1-2 sentences):\n\n\
         POSITION: [Brief assessment of the position]\n\n\
         {sections}",
        fen = state.fen(),
        side = state.turn().as_str(),
        number = state.fullmove_number(),
    )
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Read the coach's reply. Sections it skipped stay empty; a reply with no
/// usable structure is attached to the first candidate as free text.
pub fn parse_advice(response: &str, lines: &[AnalysedLine], side: Side, move_number: u32) -> TeachingAdvice {
    let header = Regex::new(r"\(([^)]+)\)").ok();
    let mut assessment = String::new();
    let mut candidates: Vec<CandidateMove> = Vec::new();

    for raw in response.lines() {
        let line = raw.trim();
        let upper = line.to_ascii_uppercase();
        if upper.starts_with("POSITION:") {
            assessment = line["POSITION:".len()..].trim().to_string();
        } else if upper.starts_with("MOVE") {
            let san = header
                .as_ref()
                .and_then(|re| re.captures(line))
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string());
            if let Some(san) = san {
                let evaluation = lines
                    .iter()
                    .find(|l| l.san == san)
                    .map(|l| l.evaluation.clone())
                    .unwrap_or_else(|| "?".to_string());
                candidates.push(CandidateMove {
                    san,
                    evaluation,
                    explanation: String::new(),
                    likely_response: String::new(),
                    follow_up_plan: String::new(),
                });
            }
        } else if let Some(current) = candidates.last_mut() {
            if let Some(rest) = line.strip_prefix("- Why:") {
                current.explanation = rest.trim().to_string();
            } else if let Some(rest) = line.strip_prefix("- Response:") {
                current.likely_response = rest.trim().to_string();
            } else if let Some(rest) = line.strip_prefix("- Follow-up:") {
                current.follow_up_plan = rest.trim().to_string();
            }
        }
    }

    let text = response.trim();
    if candidates.is_empty() {
        candidates = lines
            .iter()
            .enumerate()
            .map(|(i, l)| CandidateMove {
                san: l.san.clone(),
                evaluation: l.evaluation.clone(),
                explanation: if i == 0 { truncate(text, MAX_FALLBACK_TEXT) } else { String::new() },
                likely_response: String::new(),
                follow_up_plan: String::new(),
            })
            .collect();
    }
    if assessment.is_empty() {
        assessment = truncate(text.lines().next().unwrap_or_default(), MAX_FALLBACK_TEXT);
    }

    TeachingAdvice {
        position_assessment: assessment,
        candidate_moves: candidates,
        side,
        move_number,
        source: CommentarySource::Generated,
    }
}

/// Engine data with stock phrasing.
pub fn fallback_advice(state: &GameState, lines: &[AnalysedLine]) -> TeachingAdvice {
    let candidate_moves = lines
        .iter()
        .map(|l| CandidateMove {
            san: l.san.clone(),
            evaluation: l.evaluation.clone(),
            explanation: "Stockfish's recommended move.".to_string(),
            likely_response: match &l.reply {
                Some(reply) => format!("Opponent may play {reply}."),
                None => "No immediate forced response.".to_string(),
            },
            follow_up_plan: "Continue developing pieces and controlling the center.".to_string(),
        })
        .collect();

    let position_assessment = if state.is_check() {
        "You are in check, so prioritize escaping."
    } else {
        "Develop your pieces and contest the center."
    };

    TeachingAdvice {
        position_assessment: position_assessment.to_string(),
        candidate_moves,
        side: state.turn(),
        move_number: state.fullmove_number(),
        source: CommentarySource::Fallback,
    }
}
