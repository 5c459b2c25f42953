//! Stockfish engine wrapper using UCI protocol (async I/O)

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use tracing::{debug, info};

use crate::config::EngineSettings;
use crate::error::MatchError;

/// Slack on top of the configured movetime before a search counts as hung.
const SEARCH_GRACE: Duration = Duration::from_secs(5);

/// Bound on the `uci` / `isready` handshakes.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

const EXECUTABLE_NAMES: &[&str] = &[
    "stockfish",
    "stockfish.exe",
    "stockfish-ubuntu-x86-64",
    "stockfish_15",
];

const COMMON_PATHS: &[&str] = &[
    "/usr/bin/stockfish",
    "/usr/local/bin/stockfish",
    "/usr/games/stockfish",
    "/opt/stockfish/stockfish",
    "/opt/homebrew/bin/stockfish",
];

fn unavailable(context: &str, e: impl std::fmt::Display) -> MatchError {
    MatchError::EngineUnavailable(format!("{context}: {e}"))
}

/// Resolve the engine binary: the configured path if it exists, otherwise
/// the usual executable names on `PATH`, then common install locations.
pub fn locate_stockfish(configured: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = configured {
        let path = Path::new(path);
        return path.is_file().then(|| path.to_path_buf());
    }

    if let Some(dirs) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&dirs) {
            for name in EXECUTABLE_NAMES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
    }

    COMMON_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
}

/// Parse the move out of a `bestmove` line. `(none)` means no legal move.
pub fn parse_bestmove(line: &str) -> Option<String> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "bestmove" {
        return None;
    }
    match parts.next()? {
        "(none)" | "0000" => None,
        mv => Some(mv.to_string()),
    }
}

/// Engine score from the side to move's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    /// Moves to mate; negative when the side to move is getting mated
    Mate(i32),
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Score::Centipawns(cp) => {
                let pawns = f64::from(cp) / 100.0;
                if cp >= 0 {
                    write!(f, "+{pawns:.2}")
                } else {
                    write!(f, "{pawns:.2}")
                }
            }
            Score::Mate(n) if n > 0 => write!(f, "Mate in {n}"),
            Score::Mate(n) => write!(f, "Opp mates in {}", n.abs()),
        }
    }
}

/// One principal variation from a multi-line search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PvLine {
    /// 1-based `multipv` index
    pub rank: usize,
    pub score: Score,
    /// First move of the line, UCI
    pub first_move: String,
}

/// Parse an `info ... multipv N score cp X ... pv m1 m2` line. Lines without
/// a score or a pv (currmove updates, strings) give `None`.
pub fn parse_info_line(line: &str) -> Option<PvLine> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "info" {
        return None;
    }

    let mut rank = 1;
    let mut score = None;
    let mut first_move = None;
    while let Some(token) = tokens.next() {
        match token {
            "multipv" => rank = tokens.next()?.parse().ok()?,
            "score" => {
                let kind = tokens.next()?;
                let value: i32 = tokens.next()?.parse().ok()?;
                score = match kind {
                    "cp" => Some(Score::Centipawns(value)),
                    "mate" => Some(Score::Mate(value)),
                    _ => None,
                };
            }
            "pv" => {
                first_move = tokens.next().map(str::to_string);
                break;
            }
            _ => {}
        }
    }

    Some(PvLine {
        rank,
        score: score?,
        first_move: first_move?,
    })
}

/// Stockfish engine instance
pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StockfishEngine {
    /// Spawn a Stockfish process, run the UCI handshake and apply options.
    pub async fn new(path: &Path, settings: &EngineSettings) -> Result<Self, MatchError> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| unavailable("Failed to spawn Stockfish", e))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| MatchError::EngineUnavailable("Stockfish stdin unavailable".into()))?;
        let stdout = BufReader::new(
            process
                .stdout
                .take()
                .ok_or_else(|| MatchError::EngineUnavailable("Stockfish stdout unavailable".into()))?,
        );

        let mut engine = Self {
            process,
            stdin,
            stdout,
        };

        engine.send("uci").await?;
        engine.wait_for("uciok", HANDSHAKE_TIMEOUT).await?;

        engine
            .send(&format!("setoption name Skill Level value {}", settings.skill.min(20)))
            .await?;
        engine
            .send(&format!("setoption name Threads value {}", settings.threads.max(1)))
            .await?;
        engine
            .send(&format!("setoption name Hash value {}", settings.hash_mb.max(1)))
            .await?;
        engine.send("isready").await?;
        engine.wait_for("readyok", HANDSHAKE_TIMEOUT).await?;

        info!(path = %path.display(), skill = settings.skill, "Stockfish ready");
        Ok(engine)
    }

    /// Send a command to Stockfish
    async fn send(&mut self, cmd: &str) -> Result<(), MatchError> {
        debug!(cmd, "SF <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| unavailable("Failed to write to Stockfish", e))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| unavailable("Failed to flush stdin", e))?;
        Ok(())
    }

    async fn read_line(&mut self, line: &mut String) -> Result<(), MatchError> {
        line.clear();
        let n = self
            .stdout
            .read_line(line)
            .await
            .map_err(|e| unavailable("Failed to read from Stockfish", e))?;
        if n == 0 {
            return Err(MatchError::EngineUnavailable("Stockfish exited".into()));
        }
        debug!(line = line.trim(), "SF >");
        Ok(())
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str, limit: Duration) -> Result<(), MatchError> {
        let wait = async {
            let mut line = String::new();
            loop {
                self.read_line(&mut line).await?;
                if line.trim() == expected {
                    return Ok(());
                }
            }
        };
        tokio::time::timeout(limit, wait)
            .await
            .map_err(|_| MatchError::EngineUnavailable(format!("Timed out waiting for {expected}")))?
    }

    /// Search a position and return the best move in UCI notation.
    pub async fn best_move(&mut self, fen: &str, depth: u32, movetime_ms: u64) -> Result<String, MatchError> {
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth} movetime {movetime_ms}")).await?;

        let limit = Duration::from_millis(movetime_ms) + SEARCH_GRACE;
        let search = async {
            let mut line = String::new();
            loop {
                self.read_line(&mut line).await?;
                if line.starts_with("bestmove") {
                    return parse_bestmove(&line).ok_or_else(|| {
                        MatchError::Player(format!("Stockfish found no move: {}", line.trim()))
                    });
                }
            }
        };

        let outcome = tokio::time::timeout(limit, search).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                let _ = self.send("stop").await;
                Err(MatchError::EngineUnavailable(format!(
                    "Search exceeded {} ms",
                    limit.as_millis()
                )))
            }
        }
    }

    /// Multi-line search: the best `lines` moves with their scores, best
    /// first. Only the deepest report per line is kept.
    pub async fn analyse(
        &mut self,
        fen: &str,
        lines: usize,
        depth: u32,
        movetime_ms: u64,
    ) -> Result<Vec<PvLine>, MatchError> {
        self.send(&format!("setoption name MultiPV value {}", lines.max(1)))
            .await?;
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth} movetime {movetime_ms}")).await?;

        let limit = Duration::from_millis(movetime_ms) + SEARCH_GRACE;
        let search = async {
            let mut best: BTreeMap<usize, PvLine> = BTreeMap::new();
            let mut line = String::new();
            loop {
                self.read_line(&mut line).await?;
                if line.starts_with("bestmove") {
                    return Ok::<_, MatchError>(best.into_values().collect::<Vec<_>>());
                }
                if let Some(pv) = parse_info_line(&line) {
                    best.insert(pv.rank, pv);
                }
            }
        };

        let outcome = tokio::time::timeout(limit, search).await;
        let found = match outcome {
            Ok(result) => result?,
            Err(_) => {
                let _ = self.send("stop").await;
                return Err(MatchError::EngineUnavailable(format!(
                    "Analysis exceeded {} ms",
                    limit.as_millis()
                )));
            }
        };

        self.send("setoption name MultiPV value 1").await?;
        Ok(found)
    }

    /// Send quit command and wait for process to exit
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        let _ = self.process.wait().await;
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        // No async in drop; the child may already be gone.
        let _ = self.process.start_kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bestmove() {
        assert_eq!(parse_bestmove("bestmove e2e4 ponder e7e5"), Some("e2e4".to_string()));
        assert_eq!(parse_bestmove("bestmove e7e8q"), Some("e7e8q".to_string()));
        assert_eq!(parse_bestmove("bestmove (none)"), None);
        assert_eq!(parse_bestmove("info depth 10 pv e2e4"), None);
        assert_eq!(parse_bestmove("bestmove"), None);
    }

    #[test]
    fn test_parse_info_line() {
        let line = "info depth 15 seldepth 21 multipv 2 score cp -35 nodes 91234 nps 1200000 pv d7d5 e4d5 d8d5";
        assert_eq!(
            parse_info_line(line),
            Some(PvLine {
                rank: 2,
                score: Score::Centipawns(-35),
                first_move: "d7d5".to_string(),
            })
        );

        let mate = parse_info_line("info depth 9 score mate 3 pv h5f7").unwrap();
        assert_eq!(mate.rank, 1);
        assert_eq!(mate.score, Score::Mate(3));

        let bound = parse_info_line("info depth 12 multipv 1 score cp 20 lowerbound pv e2e4").unwrap();
        assert_eq!(bound.score, Score::Centipawns(20));

        assert_eq!(parse_info_line("info depth 15 currmove e2e4 currmovenumber 1"), None);
        assert_eq!(parse_info_line("info string NNUE evaluation enabled"), None);
        assert_eq!(parse_info_line("bestmove e2e4"), None);
    }

    #[test]
    fn test_score_display() {
        assert_eq!(Score::Centipawns(50).to_string(), "+0.50");
        assert_eq!(Score::Centipawns(0).to_string(), "+0.00");
        assert_eq!(Score::Centipawns(-125).to_string(), "-1.25");
        assert_eq!(Score::Mate(3).to_string(), "Mate in 3");
        assert_eq!(Score::Mate(-2).to_string(), "Opp mates in 2");
    }

    #[test]
    fn test_configured_path_must_exist() {
        assert_eq!(locate_stockfish(Some("/definitely/not/stockfish")), None);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_engine_unavailable() {
        let result = StockfishEngine::new(
            Path::new("/definitely/not/stockfish"),
            &EngineSettings::default(),
        )
        .await;
        assert!(matches!(result, Err(MatchError::EngineUnavailable(_))));
    }
}
