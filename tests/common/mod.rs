#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chess_core::{GameState, MoveRecord};
use commentary::{CompletionRequest, LlmError, TextGenerationClient};
use match_runner::{
    AnalysedLine, MatchControl, MatchError, MatchEvent, MoveSource, PlayerKind, PositionAnalyser,
    Proposal, TurnContext,
};
use tokio::sync::mpsc::UnboundedReceiver;

/// Capture then check: the last move, Qxe2+, takes the white queen with check.
pub const CAPTURE_CHECK: [&str; 8] = ["e4", "d5", "exd5", "Qxd5", "Nc3", "Qe5+", "Qe2", "Qxe2+"];

/// Lets a scripted player reach the match control after the match is built.
pub type ControlSlot = Arc<Mutex<Option<MatchControl>>>;

/// What a scripted player was shown on each request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seen {
    pub attempt: u32,
    pub fullmove: u32,
    pub had_error: bool,
}

/// Plays a fixed script. Besides moves, understands `resign`, `draw`,
/// `fail` (errors out), `hang` (never answers), `pause` and `stop` (poke the
/// control slot, then carry on with the next entry / hang).
pub struct ScriptedPlayer {
    name: String,
    kind: PlayerKind,
    script: VecDeque<String>,
    accepts_draw: bool,
    control: ControlSlot,
    pub seen: Arc<Mutex<Vec<Seen>>>,
    pub opponent_moves: Arc<AtomicUsize>,
}

impl ScriptedPlayer {
    pub fn new(name: &str, kind: PlayerKind, script: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind,
            script: script.iter().map(|s| s.to_string()).collect(),
            accepts_draw: false,
            control: Arc::new(Mutex::new(None)),
            seen: Arc::new(Mutex::new(Vec::new())),
            opponent_moves: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn human(name: &str, script: &[&str]) -> Self {
        Self::new(name, PlayerKind::Human, script)
    }

    pub fn machine(name: &str, script: &[&str]) -> Self {
        Self::new(name, PlayerKind::Llm, script)
    }

    pub fn accepting_draws(mut self) -> Self {
        self.accepts_draw = true;
        self
    }

    pub fn with_control(mut self, slot: &ControlSlot) -> Self {
        self.control = slot.clone();
        self
    }

    pub fn boxed(self) -> Box<dyn MoveSource> {
        Box::new(self)
    }

    fn poke(&self, f: impl FnOnce(&MatchControl)) {
        if let Some(control) = self.control.lock().unwrap().as_ref() {
            f(control);
        }
    }
}

#[async_trait]
impl MoveSource for ScriptedPlayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PlayerKind {
        self.kind
    }

    async fn propose_move(&mut self, ctx: &TurnContext<'_>) -> Result<Proposal, MatchError> {
        self.seen.lock().unwrap().push(Seen {
            attempt: ctx.attempt,
            fullmove: ctx.state.fullmove_number(),
            had_error: ctx.last_error.is_some(),
        });

        loop {
            let Some(entry) = self.script.pop_front() else {
                return Ok(Proposal::Resign);
            };
            match entry.as_str() {
                "resign" => return Ok(Proposal::Resign),
                "draw" => return Ok(Proposal::OfferDraw),
                "fail" => return Err(MatchError::Player("scripted failure".into())),
                "hang" => std::future::pending::<()>().await,
                "pause" => self.poke(|c| c.pause()),
                "stop" => {
                    self.poke(|c| c.stop());
                    std::future::pending::<()>().await;
                }
                mv => return Ok(Proposal::Move(mv.to_string())),
            }
        }
    }

    async fn accept_draw(&mut self, _state: &GameState) -> bool {
        self.accepts_draw
    }

    async fn on_opponent_move(&mut self, _state: &GameState, _record: &MoveRecord) {
        self.opponent_moves.fetch_add(1, Ordering::SeqCst);
    }
}

/// Speaker name as stated in the personality system prompt.
fn speaker(request: &CompletionRequest) -> String {
    request
        .system
        .lines()
        .find_map(|l| l.split("Your name is ").nth(1))
        .and_then(|rest| rest.split('.').next())
        .unwrap_or("?")
        .to_string()
}

/// Answers "<name> speaks", optionally after a per-speaker delay.
#[derive(Default)]
pub struct NamedClient {
    delays: HashMap<String, Duration>,
    pub calls: AtomicUsize,
}

impl NamedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }
}

#[async_trait]
impl TextGenerationClient for NamedClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = speaker(request);
        if let Some(delay) = self.delays.get(&name) {
            tokio::time::sleep(*delay).await;
        }
        Ok(format!("{name} speaks"))
    }
}

/// Every call fails the way an unreachable service would.
#[derive(Default)]
pub struct FailingClient {
    pub calls: AtomicUsize,
}

#[async_trait]
impl TextGenerationClient for FailingClient {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(LlmError::Http("connection refused".into()))
    }
}

/// Stands in for Stockfish: the first legal moves, equal scores.
#[derive(Default)]
pub struct FirstLegalLines {
    pub broken_start: bool,
    pub broken_search: bool,
}

#[async_trait]
impl PositionAnalyser for FirstLegalLines {
    async fn start(&mut self) -> Result<(), MatchError> {
        if self.broken_start {
            return Err(MatchError::EngineUnavailable("no engine here".into()));
        }
        Ok(())
    }

    async fn top_lines(&mut self, state: &GameState, count: usize) -> Result<Vec<AnalysedLine>, MatchError> {
        if self.broken_search {
            return Err(MatchError::EngineUnavailable("engine crashed".into()));
        }
        Ok(state
            .legal_moves_san()
            .into_iter()
            .take(count)
            .map(|san| AnalysedLine {
                san,
                evaluation: "+0.00".to_string(),
                reply: None,
            })
            .collect())
    }
}

/// Coaches in the expected sections, always about the same first move.
#[derive(Default)]
pub struct CoachClient {
    pub calls: AtomicUsize,
}

#[async_trait]
impl TextGenerationClient for CoachClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let first = request
            .user
            .lines()
            .find_map(|l| l.strip_prefix("1. "))
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap_or("?")
            .to_string();
        Ok(format!(
            "POSITION: Lesson {n}.\n\nMOVE ({first}):\n- Why: It is first.\n- Response: Anything.\n- Follow-up: Keep going."
        ))
    }
}

/// Everything already sent on the event channel.
pub fn drain(rx: &mut UnboundedReceiver<MatchEvent>) -> Vec<MatchEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Knights hopping out and back, `plies_per_side` moves for each side. Every
/// 60th move is a queenside pawn push instead, so the 75-move rule never ends
/// the game first.
pub fn knight_shuffle(plies_per_side: usize) -> (Vec<&'static str>, Vec<&'static str>) {
    fn one_side(hops: [&'static str; 2], pushes: [&'static str; 4], n: usize) -> Vec<&'static str> {
        let mut hops = hops.into_iter().cycle();
        let mut pushes = pushes.into_iter();
        (1..=n)
            .map(|i| {
                let push = if i % 60 == 0 { pushes.next() } else { None };
                push.unwrap_or_else(|| hops.next().unwrap())
            })
            .collect()
    }
    (
        one_side(["Nf3", "Ng1"], ["a3", "b3", "c3", "d3"], plies_per_side),
        one_side(["Nf6", "Ng8"], ["a6", "b6", "c6", "d6"], plies_per_side),
    )
}
