use std::collections::VecDeque;
use std::io;

use async_trait::async_trait;
use chess_core::GameState;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

use super::{MoveSource, Proposal, TurnContext};
use crate::error::MatchError;
use crate::mode::PlayerKind;

const HELP: &str = "Commands:\n  \
    <move>  - Make a move (e.g., 'e4', 'Nf3', 'e2e4', 'O-O')\n  \
    moves   - Show all legal moves\n  \
    draw    - Offer a draw\n  \
    resign  - Resign the game\n  \
    quit    - Quit the game";

/// Where a human's typed lines come from and where replies go.
#[async_trait]
pub trait LineSource: Send {
    /// `None` once input is exhausted.
    async fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;

    fn show(&mut self, message: &str);
}

pub struct StdinLines {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinLines {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinLines {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LineSource for StdinLines {
    async fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;
        self.lines.next_line().await
    }

    fn show(&mut self, message: &str) {
        println!("{message}");
    }
}

/// Pre-recorded input, mostly for tests and replays.
#[async_trait]
impl LineSource for VecDeque<String> {
    async fn read_line(&mut self, _prompt: &str) -> io::Result<Option<String>> {
        Ok(self.pop_front())
    }

    fn show(&mut self, _message: &str) {}
}

pub struct HumanPlayer {
    name: String,
    input: Box<dyn LineSource>,
}

impl HumanPlayer {
    pub fn new(name: impl Into<String>, input: Box<dyn LineSource>) -> Self {
        Self {
            name: name.into(),
            input,
        }
    }

    pub fn stdin(name: impl Into<String>) -> Self {
        Self::new(name, Box::new(StdinLines::new()))
    }

    pub fn scripted<I, S>(name: impl Into<String>, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: VecDeque<String> = lines.into_iter().map(Into::into).collect();
        Self::new(name, Box::new(lines))
    }
}

#[async_trait]
impl MoveSource for HumanPlayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PlayerKind {
        PlayerKind::Human
    }

    async fn propose_move(&mut self, ctx: &TurnContext<'_>) -> Result<Proposal, MatchError> {
        if let Some(err) = ctx.last_error {
            self.input
                .show(&format!("{err}. Type 'moves' to see legal moves."));
        }

        let prompt = format!("{}'s move ({}): ", self.name, ctx.side);
        loop {
            // End of input counts as leaving the game.
            let Some(line) = self.input.read_line(&prompt).await? else {
                return Ok(Proposal::Resign);
            };
            let line = line.trim();

            match line.to_ascii_lowercase().as_str() {
                "" => continue,
                "quit" | "exit" | "resign" => return Ok(Proposal::Resign),
                "draw" => return Ok(Proposal::OfferDraw),
                "help" => self.input.show(HELP),
                "moves" => {
                    let moves = ctx.state.legal_moves_san();
                    self.input
                        .show(&format!("Legal moves ({}): {}", moves.len(), moves.join(", ")));
                }
                _ => return Ok(Proposal::Move(line.to_string())),
            }
        }
    }

    async fn accept_draw(&mut self, _state: &GameState) -> bool {
        let prompt = format!("{}, your opponent offers a draw. Accept? [y/N] ", self.name);
        match self.input.read_line(&prompt).await {
            Ok(Some(answer)) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            _ => false,
        }
    }
}
