//! ChessAlive match runner
//!
//! Plays one game between humans, Stockfish and LLM players and prints the
//! move and commentary stream.

use anyhow::Context;
use tracing::{error, info};

use match_runner::{build_match, AppConfig, GameMode, MatchEvent, MatchSetup, PlayerKind};

/// Value following `flag` in the CLI args, if any
fn arg_value(args: &[String], flag: &str) -> Option<String> {
    for i in 0..args.len() {
        if args[i] == flag {
            return args.get(i + 1).cloned();
        }
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn print_usage() {
    println!("Usage: chess-alive [--mode MODE] [--white KIND] [--black KIND]");
    println!("                   [--frequency every_move|captures_only|key_moments]");
    println!("                   [--no-commentary] [--teach] [--pgn-out FILE] [--json]");
    println!();
    println!("Modes:");
    for mode in GameMode::ALL {
        println!("  {:<6} {}", mode.short_name(), mode.description());
    }
    println!();
    println!("Player kinds: human, engine, llm");
}

/// Parse the pairing, commentary and coaching overrides from CLI args
fn parse_setup(args: &[String]) -> anyhow::Result<MatchSetup> {
    let mode: GameMode = match arg_value(args, "--mode") {
        Some(m) => m.parse().map_err(anyhow::Error::msg)?,
        None => GameMode::PlayerVsComputer,
    };

    let mut setup = MatchSetup::from_mode(mode);
    if let Some(white) = arg_value(args, "--white") {
        setup.white = white.parse::<PlayerKind>().map_err(anyhow::Error::msg)?;
    }
    if let Some(black) = arg_value(args, "--black") {
        setup.black = black.parse::<PlayerKind>().map_err(anyhow::Error::msg)?;
    }
    if let Some(freq) = arg_value(args, "--frequency") {
        setup.frequency = Some(freq.parse().map_err(anyhow::Error::msg)?);
    }
    setup.commentary = !has_flag(args, "--no-commentary");
    setup.teaching |= has_flag(args, "--teach");
    Ok(setup)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        print_usage();
        return Ok(());
    }

    let setup = parse_setup(&args)?;
    let json = has_flag(&args, "--json");
    let pgn_out = arg_value(&args, "--pgn-out");

    let config = AppConfig::from_env()?;
    let mut game = build_match(&config, &setup)?;
    info!(mode = %setup.mode(), white = %setup.white, black = %setup.black, "Starting match");

    let mut events = game.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if json {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => error!(error = %e, "Failed to serialize event"),
                }
            } else if let MatchEvent::Error { legal_moves, .. } = &event {
                println!("{event}");
                if !legal_moves.is_empty() {
                    println!("  Legal moves: {}", legal_moves.join(", "));
                }
            } else {
                println!("{event}");
            }
        }
    });

    let control = game.control();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping match");
            control.stop();
        }
    });

    let summary = game.run().await?;
    // The match owned the only sender, so the printer drains and exits.
    let _ = printer.await;

    if let Some(path) = pgn_out {
        std::fs::write(&path, &summary.pgn).with_context(|| format!("writing PGN to {path}"))?;
        info!(path = %path, "PGN written");
    } else if !json {
        println!();
        println!("{}", summary.pgn);
    }

    Ok(())
}
