//! PGN export with per-move brace comments.

use chrono::{Local, NaiveDate};

use crate::game::GameState;
use crate::piece::Side;

const EVENT_NAME: &str = "ChessAlive Game";
const LINE_WIDTH: usize = 80;

/// Seven-tag roster values that aren't derived from the game itself.
#[derive(Debug, Clone)]
pub struct PgnHeaders {
    pub event: String,
    pub site: String,
    pub date: NaiveDate,
    pub round: String,
    pub white: String,
    pub black: String,
}

impl Default for PgnHeaders {
    fn default() -> Self {
        Self {
            event: EVENT_NAME.to_string(),
            site: "?".to_string(),
            date: Local::now().date_naive(),
            round: "1".to_string(),
            white: "White".to_string(),
            black: "Black".to_string(),
        }
    }
}

impl PgnHeaders {
    pub fn players(white: impl Into<String>, black: impl Into<String>) -> Self {
        Self {
            white: white.into(),
            black: black.into(),
            ..Self::default()
        }
    }
}

/// A comment attached after ply `ply`. Ply 0 comments precede the first move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlyComment {
    pub ply: usize,
    pub text: String,
}

impl PlyComment {
    pub fn new(ply: usize, text: impl Into<String>) -> Self {
        Self {
            ply,
            text: text.into(),
        }
    }
}

fn header_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Braces would terminate the comment early.
fn comment_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| match c {
            '{' => '(',
            '}' => ')',
            '\n' | '\r' => ' ',
            c => c,
        })
        .collect();
    format!("{{ {} }}", cleaned.trim())
}

fn wrap(tokens: &[String]) -> String {
    let mut out = String::new();
    let mut line_len = 0;
    for token in tokens {
        // Comments are wrapped word by word.
        for word in token.split(' ').filter(|w| !w.is_empty()) {
            if line_len > 0 && line_len + 1 + word.len() > LINE_WIDTH {
                out.push('\n');
                line_len = 0;
            } else if line_len > 0 {
                out.push(' ');
                line_len += 1;
            }
            out.push_str(word);
            line_len += word.len();
        }
    }
    out
}

impl GameState {
    /// Render the game as PGN. `comments` are emitted in the order given,
    /// grouped after the ply they belong to.
    pub fn to_pgn(&self, headers: &PgnHeaders, comments: &[PlyComment]) -> String {
        let result = self.result().map(|r| r.pgn_token()).unwrap_or("*");

        let mut pgn = String::new();
        let tags = [
            ("Event", headers.event.clone()),
            ("Site", headers.site.clone()),
            ("Date", headers.date.format("%Y.%m.%d").to_string()),
            ("Round", headers.round.clone()),
            ("White", headers.white.clone()),
            ("Black", headers.black.clone()),
            ("Result", result.to_string()),
        ];
        for (name, value) in tags {
            pgn.push_str(&format!("[{name} \"{}\"]\n", header_value(&value)));
        }
        if let Some(fen) = self.initial_fen() {
            pgn.push_str("[SetUp \"1\"]\n");
            pgn.push_str(&format!("[FEN \"{}\"]\n", header_value(fen)));
        }
        pgn.push('\n');

        let comments_for = |ply: usize| {
            comments
                .iter()
                .filter(move |c| c.ply == ply)
                .map(|c| comment_text(&c.text))
        };

        let mut tokens: Vec<String> = comments_for(0).collect();
        let mut after_comment = false;
        for record in self.history() {
            match record.side {
                Side::White => {
                    tokens.push(format!("{}. {}", record.move_number, record.san))
                }
                Side::Black if record.ply == 1 || after_comment => {
                    tokens.push(format!("{}... {}", record.move_number, record.san))
                }
                Side::Black => tokens.push(record.san.clone()),
            }
            let before = tokens.len();
            tokens.extend(comments_for(record.ply));
            after_comment = tokens.len() > before;
        }
        tokens.push(result.to_string());

        pgn.push_str(&wrap(&tokens));
        pgn.push('\n');
        pgn
    }
}
