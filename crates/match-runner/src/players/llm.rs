use std::sync::Arc;

use async_trait::async_trait;
use chess_core::{GameState, Side};
use commentary::{CompletionRequest, TextGenerationClient};
use regex::Regex;
use serde::Deserialize;
use shakmaty::{Position, Square};
use tracing::{debug, warn};

use super::{MoveSource, Proposal, TurnContext};
use crate::error::MatchError;
use crate::mode::{LlmStyle, PlayerKind};

const MOVE_TEMPERATURE: f32 = 0.3;
const MOVE_MAX_TOKENS: u32 = 300;
const HISTORY_PLIES: usize = 10;

#[derive(Deserialize)]
struct MoveReply {
    #[serde(rename = "move")]
    mv: Option<String>,
}

/// A language model choosing moves through the chat-completion client.
pub struct LlmPlayer {
    name: String,
    side: Side,
    client: Arc<dyn TextGenerationClient>,
    style: LlmStyle,
}

impl LlmPlayer {
    pub fn new(
        name: impl Into<String>,
        side: Side,
        client: Arc<dyn TextGenerationClient>,
        style: LlmStyle,
    ) -> Self {
        Self {
            name: name.into(),
            side,
            client,
            style,
        }
    }

    pub fn style(&self) -> LlmStyle {
        self.style
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are an expert chess player playing as {side}.\n{hint}\n\n\
             When asked for a move, analyze the position carefully and respond with your chosen move.\n\n\
             IMPORTANT: Respond with a JSON object in this exact format:\n\
             {{\"move\": \"<your move in SAN>\", \"reasoning\": \"<brief analysis>\"}}\n\n\
             Examples:\n\
             {{\"move\": \"e4\", \"reasoning\": \"Control the center\"}}\n\
             {{\"move\": \"Nf3\", \"reasoning\": \"Develop knight toward center\"}}\n\
             {{\"move\": \"O-O\", \"reasoning\": \"Castle for king safety\"}}\n\n\
             If you cannot use JSON, format your response as: MOVE: <your move>\n\n\
             Always choose a legal move from the provided list of legal moves.",
            side = self.side,
            hint = self.style.hint(),
        )
    }

    fn move_prompt(&self, ctx: &TurnContext<'_>) -> String {
        let state = ctx.state;
        let legal = state.legal_moves_san();

        let mut notes = Vec::new();
        if state.is_check() {
            notes.push("You are in CHECK!".to_string());
        }
        if legal.len() < 10 {
            notes.push(format!(
                "Limited options: only {} legal moves available.",
                legal.len()
            ));
        }
        if let Some(err) = ctx.last_error {
            notes.push(format!(
                "Your previous answer was rejected ({err}). Pick exactly one move from the list."
            ));
        }

        format!(
            "Current position (you are playing {side}):\n\n{board}\nFEN: {fen}\n\n\
             Move history: {history}\n\n\
             Legal moves available: {legal}\n\n{notes}\n\n\
             It's your turn. Analyze the position and choose the best move.\n\
             Respond with JSON: {{\"move\": \"<SAN>\", \"reasoning\": \"<analysis>\"}}",
            side = self.side,
            board = ascii_board(state),
            fen = state.fen(),
            history = recent_history(state),
            legal = legal.join(", "),
            notes = notes.join(" "),
        )
    }
}

/// Board diagram from White's side, rank 8 first.
fn ascii_board(state: &GameState) -> String {
    let board = state.position().board();
    let mut out = String::with_capacity(8 * 16);
    for rank in Square::ALL.chunks(8).rev() {
        let row: Vec<String> = rank
            .iter()
            .map(|sq| board.piece_at(*sq).map_or('.', |p| p.char()).to_string())
            .collect();
        out.push_str(&row.join(" "));
        out.push('\n');
    }
    out
}

fn recent_history(state: &GameState) -> String {
    let history = state.history();
    if history.is_empty() {
        return "Game just started".to_string();
    }

    let start = history.len().saturating_sub(HISTORY_PLIES);
    let mut parts: Vec<String> = Vec::new();
    for (i, record) in history[start..].iter().enumerate() {
        match record.side {
            Side::White => parts.push(format!("{}. {}", record.move_number, record.san)),
            Side::Black if i == 0 => parts.push(format!("{}... {}", record.move_number, record.san)),
            Side::Black => parts.push(record.san.clone()),
        }
    }
    parts.join(" ")
}

fn json_move(text: &str) -> Option<String> {
    let reply: MoveReply = serde_json::from_str(text).ok()?;
    reply.mv.map(|m| m.trim().to_string()).filter(|m| !m.is_empty())
}

/// Pull a legal move out of a free-form model reply. Structured answers are
/// preferred; failing that, any legal move mentioned in the text is taken.
pub fn extract_move(response: &str, state: &GameState) -> Option<String> {
    let legal = |candidate: &str| state.is_legal(candidate).then(|| candidate.to_string());

    let embedded = Regex::new(r#"\{[^{}]*"move"\s*:\s*"[^"]*"[^{}]*\}"#).ok()?;
    if let Some(found) = embedded
        .find(response)
        .and_then(|m| json_move(m.as_str()))
        .and_then(|mv| legal(&mv))
    {
        return Some(found);
    }

    if let Some(found) = json_move(response.trim()).and_then(|mv| legal(&mv)) {
        return Some(found);
    }

    let tagged = Regex::new(r"(?i)MOVE:\s*([A-Za-z0-9\-\+#=]+)").ok()?;
    if let Some(found) = tagged
        .captures(response)
        .and_then(|c| c.get(1))
        .and_then(|m| legal(m.as_str()))
    {
        return Some(found);
    }

    // Longest first so "O-O-O" wins over "O-O" and "Nbd2" over "d2".
    let mut sans = state.legal_moves_san();
    sans.sort_by_key(|s| std::cmp::Reverse(s.len()));
    for san in sans {
        let pattern = format!(r"(?:^|[^A-Za-z0-9\-]){}(?:$|[^A-Za-z0-9\-])", regex::escape(&san));
        if Regex::new(&pattern).map_or(false, |re| re.is_match(response)) {
            return Some(san);
        }
    }

    let uci = Regex::new(r"\b([a-h][1-8][a-h][1-8][qrbn]?)\b").ok()?;
    let found = uci
        .captures_iter(response)
        .filter_map(|c| c.get(1))
        .find_map(|m| legal(m.as_str()));
    found
}

#[async_trait]
impl MoveSource for LlmPlayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PlayerKind {
        PlayerKind::Llm
    }

    async fn propose_move(&mut self, ctx: &TurnContext<'_>) -> Result<Proposal, MatchError> {
        let request = CompletionRequest::new(self.system_prompt(), self.move_prompt(ctx))
            .with_temperature(MOVE_TEMPERATURE)
            .with_max_tokens(MOVE_MAX_TOKENS);

        let response = self.client.complete(&request).await?;
        debug!(player = %self.name, attempt = ctx.attempt, response = %response, "LLM reply");

        match extract_move(&response, ctx.state) {
            Some(mv) => Ok(Proposal::Move(mv)),
            None => {
                warn!(player = %self.name, "No legal move in LLM reply");
                Err(MatchError::Player(format!(
                    "{} gave no legal move: {}",
                    self.name,
                    response.chars().take(80).collect::<String>()
                )))
            }
        }
    }
}
