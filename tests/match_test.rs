//! Full matches driven by scripted players.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chess_core::{
    GameError, GameResult, MatchStatus, Personality, PieceKind, Side, Termination,
};
use commentary::{
    CommentaryConfig, CommentaryEngine, CommentaryFrequency, CommentaryKind, CommentarySource,
    TextGenerationClient,
};
use match_runner::players::EnginePlayer;
use match_runner::{EngineSettings, Match, MatchError, MatchEvent, MatchSettings, TeachingAdvisor};

use common::{
    drain, knight_shuffle, CoachClient, ControlSlot, FirstLegalLines, NamedClient, ScriptedPlayer,
};

fn fallback_commentary(frequency: CommentaryFrequency) -> CommentaryEngine {
    CommentaryEngine::fallback_only(CommentaryConfig {
        frequency,
        ..CommentaryConfig::default()
    })
}

fn moves(events: &[MatchEvent]) -> Vec<(String, bool)> {
    events
        .iter()
        .filter_map(|e| match e {
            MatchEvent::Move { record, forced, .. } => Some((record.san.clone(), *forced)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn ply_ceiling_ends_in_a_draw() {
    let (white, black) = knight_shuffle(250);
    let mut game = Match::new(
        ScriptedPlayer::human("W", &white).boxed(),
        ScriptedPlayer::human("B", &black).boxed(),
    );
    let mut rx = game.subscribe();
    let summary = game.run().await.unwrap();

    assert_eq!(summary.plies, 500);
    assert_eq!(summary.result, GameResult::draw(Termination::MoveLimit));
    assert_eq!(summary.result.to_string(), "draw by move limit");
    assert!(summary.pgn.contains("[Result \"1/2-1/2\"]"));

    let events = drain(&mut rx);
    assert!(matches!(
        events.last(),
        Some(MatchEvent::GameEnd { plies: 500, .. })
    ));

    let mut state = summary.state;
    assert_eq!(state.status(), MatchStatus::Finished);
    assert!(matches!(
        state.apply_move("e4"),
        Err(GameError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn illegal_human_move_is_resolicited() {
    let white = ScriptedPlayer::human("Alice", &["e5", "Ke2", "xyz", "e5", "e4"]);
    let seen = white.seen.clone();
    let mut game = Match::new(white.boxed(), ScriptedPlayer::human("Bob", &["resign"]).boxed());
    let mut rx = game.subscribe();
    let summary = game.run().await.unwrap();

    // Four rejections, no random fallback for humans.
    let events = drain(&mut rx);
    let errors: Vec<&MatchEvent> = events
        .iter()
        .filter(|e| matches!(e, MatchEvent::Error { .. }))
        .collect();
    assert_eq!(errors.len(), 4);
    match errors[0] {
        MatchEvent::Error {
            side, legal_moves, ..
        } => {
            assert_eq!(*side, Some(Side::White));
            assert_eq!(legal_moves.len(), 20);
            assert!(legal_moves.contains(&"e4".to_string()));
        }
        _ => unreachable!(),
    }
    assert_eq!(moves(&events), vec![("e4".to_string(), false)]);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 5);
    assert!(seen.iter().all(|s| s.fullmove == 1 && s.attempt == 0));
    assert!(!seen[0].had_error);
    assert!(seen[1..].iter().all(|s| s.had_error));

    assert_eq!(summary.result, GameResult::win(Side::White, Termination::Resignation));
    assert!(summary.pgn.contains("1. e4 1-0"));
}

#[tokio::test]
async fn machine_gets_three_attempts_then_a_random_move() {
    let white = ScriptedPlayer::machine("Model", &["e5", "fail", "Qh5"]);
    let seen = white.seen.clone();
    let mut game = Match::new(white.boxed(), ScriptedPlayer::human("Bob", &["resign"]).boxed())
        .with_settings(MatchSettings {
            seed: 42,
            ..MatchSettings::default()
        });
    let mut rx = game.subscribe();
    let summary = game.run().await.unwrap();

    let events = drain(&mut rx);
    let played = moves(&events);
    assert_eq!(played.len(), 1);
    assert!(played[0].1, "fallback move is flagged as forced");
    assert_eq!(summary.plies, 1);
    assert_eq!(summary.history()[0].side, Side::White);

    let attempts: Vec<u32> = seen.lock().unwrap().iter().map(|s| s.attempt).collect();
    assert_eq!(attempts, vec![0, 1, 2]);
}

#[tokio::test]
async fn random_fallback_is_seeded() {
    async fn forced_move(seed: u64) -> String {
        let game = Match::new(
            ScriptedPlayer::machine("Model", &["zz", "zz", "zz"]).boxed(),
            ScriptedPlayer::human("Bob", &["resign"]).boxed(),
        )
        .with_settings(MatchSettings {
            seed,
            ..MatchSettings::default()
        });
        game.run().await.unwrap().history()[0].san.clone()
    }

    assert_eq!(forced_move(9).await, forced_move(9).await);
}

#[tokio::test]
async fn draw_offers() {
    // Declined: play goes on and white still has to move.
    let mut game = Match::new(
        ScriptedPlayer::human("W", &["draw", "e4", "resign"]).boxed(),
        ScriptedPlayer::human("B", &["e5"]).boxed(),
    );
    let mut rx = game.subscribe();
    let summary = game.run().await.unwrap();
    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        MatchEvent::DrawOffered {
            by: Side::White,
            accepted: false
        }
    )));
    assert_eq!(summary.plies, 2);
    assert_eq!(summary.result, GameResult::win(Side::Black, Termination::Resignation));

    // Accepted.
    let mut game = Match::new(
        ScriptedPlayer::human("W", &["e4"]).accepting_draws().boxed(),
        ScriptedPlayer::human("B", &["draw"]).boxed(),
    );
    let mut rx = game.subscribe();
    let summary = game.run().await.unwrap();
    assert_eq!(summary.result, GameResult::draw(Termination::DrawAgreement));
    assert_eq!(summary.plies, 1);
    assert!(summary.pgn.contains("1. e4 1/2-1/2"));
    assert!(drain(&mut rx).iter().any(|e| matches!(
        e,
        MatchEvent::DrawOffered {
            by: Side::Black,
            accepted: true
        }
    )));
}

#[tokio::test]
async fn events_arrive_in_emission_order() {
    let mut game = Match::new(
        ScriptedPlayer::human("W", &["e4", "Bc4", "Qh5", "Qxf7#"]).boxed(),
        ScriptedPlayer::human("B", &["e5", "Nc6", "Nf6"]).boxed(),
    )
    .with_commentary(fallback_commentary(CommentaryFrequency::EveryMove));
    let mut rx = game.subscribe();
    let summary = game.run().await.unwrap();
    let events = drain(&mut rx);

    assert!(matches!(events.first(), Some(MatchEvent::GameStart { .. })));
    // Two opening lines from the kings follow the start.
    assert!(matches!(&events[1], MatchEvent::Commentary(c) if c.kind == CommentaryKind::GameStart));
    assert!(matches!(&events[2], MatchEvent::Commentary(c) if c.kind == CommentaryKind::GameStart));
    assert!(matches!(&events[3], MatchEvent::Move { record, .. } if record.san == "e4"));

    // Every move is followed by its own commentary before the next move.
    let mut last_move_ply = 0;
    for event in &events {
        match event {
            MatchEvent::Move { record, .. } => last_move_ply = record.ply,
            MatchEvent::Commentary(c) if c.kind != CommentaryKind::GameStart => {
                assert_eq!(c.ply, Some(last_move_ply));
            }
            _ => {}
        }
    }

    let end = events
        .iter()
        .position(|e| matches!(e, MatchEvent::GameEnd { .. }))
        .unwrap();
    let closing: Vec<_> = events[end + 1..].iter().collect();
    assert_eq!(closing.len(), 2);
    assert!(closing
        .iter()
        .all(|e| matches!(e, MatchEvent::Commentary(c) if c.kind == CommentaryKind::GameEnd)));

    assert_eq!(summary.result, GameResult::win(Side::White, Termination::Checkmate));
    let logged = events
        .iter()
        .filter(|e| matches!(e, MatchEvent::Commentary(_)))
        .count();
    assert_eq!(summary.commentary.len(), logged);
}

#[tokio::test]
async fn captures_only_comments_on_captures() {
    let game = Match::new(
        ScriptedPlayer::human("W", &["e4", "exd5", "resign"]).boxed(),
        ScriptedPlayer::human("B", &["d5"]).boxed(),
    )
    .with_commentary(fallback_commentary(CommentaryFrequency::CapturesOnly));
    let summary = game.run().await.unwrap();

    let move_lines: Vec<_> = summary
        .commentary
        .iter()
        .filter(|c| matches!(c.kind, CommentaryKind::Move | CommentaryKind::Capture))
        .collect();
    assert_eq!(move_lines.len(), 2);
    assert!(move_lines.iter().all(|c| c.ply == Some(3)));
    assert_eq!(move_lines[0].personality_name, "Footsoldier");
    assert_eq!(move_lines[1].personality_name, "Dark Infantry");
}

#[tokio::test]
async fn personality_override_reaches_commentary_and_pgn() {
    let mut game = Match::new(
        ScriptedPlayer::human("W", &["Nf3", "resign"]).boxed(),
        ScriptedPlayer::human("B", &["Nf6"]).boxed(),
    )
    .with_commentary(fallback_commentary(CommentaryFrequency::EveryMove));
    game.set_personality(Personality::new(PieceKind::Knight, Side::White, "Sir Reginald"))
        .unwrap();
    let summary = game.run().await.unwrap();

    let first_move = summary
        .commentary
        .iter()
        .find(|c| c.ply == Some(1))
        .unwrap();
    assert_eq!(first_move.personality_name, "Sir Reginald");
    let pgn = summary.pgn.replace('\n', " ");
    assert!(pgn.contains("{ Sir Reginald: "));
    assert!(pgn.contains("{ King Aldric: "));
}

#[tokio::test]
async fn generated_commentary_flows_into_the_log() {
    let client = Arc::new(NamedClient::new());
    let engine = CommentaryEngine::new(
        Some(client.clone() as Arc<dyn TextGenerationClient>),
        CommentaryConfig::default(),
    );
    let game = Match::new(
        ScriptedPlayer::human("W", &["e4", "resign"]).boxed(),
        ScriptedPlayer::human("B", &["e5"]).boxed(),
    )
    .with_commentary(engine);
    let summary = game.run().await.unwrap();

    // 2 opening, 2 moves, 2 closing.
    assert_eq!(client.calls.load(Ordering::SeqCst), 6);
    assert_eq!(summary.commentary.len(), 6);
    let pgn = summary.pgn.replace('\n', " ");
    assert!(pgn.contains("1. e4 { Footsoldier: Footsoldier speaks }"));
}

#[tokio::test]
async fn players_hear_about_opponent_moves() {
    let white = ScriptedPlayer::human("W", &["e4", "d4", "resign"]);
    let black = ScriptedPlayer::human("B", &["e5", "d5"]);
    let (white_heard, black_heard) = (white.opponent_moves.clone(), black.opponent_moves.clone());
    Match::new(white.boxed(), black.boxed()).run().await.unwrap();

    assert_eq!(white_heard.load(Ordering::SeqCst), 2);
    assert_eq!(black_heard.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stop_during_a_proposal_aborts() {
    let slot: ControlSlot = Default::default();
    let mut game = Match::new(
        ScriptedPlayer::human("W", &["e4"]).boxed(),
        ScriptedPlayer::human("B", &["stop"]).with_control(&slot).boxed(),
    )
    .with_commentary(fallback_commentary(CommentaryFrequency::EveryMove));
    *slot.lock().unwrap() = Some(game.control());
    let mut rx = game.subscribe();
    let summary = game.run().await.unwrap();

    assert_eq!(summary.result, GameResult::aborted());
    assert_eq!(summary.plies, 1);
    assert!(summary.pgn.contains("[Result \"*\"]"));

    let events = drain(&mut rx);
    assert!(matches!(events.last(), Some(MatchEvent::GameEnd { .. })));
    // No closing lines for an abandoned game.
    assert!(!summary
        .commentary
        .iter()
        .any(|c| c.kind == CommentaryKind::GameEnd));
}

#[tokio::test]
async fn stop_from_another_task() {
    let mut game = Match::new(
        ScriptedPlayer::human("W", &["e4"]).boxed(),
        ScriptedPlayer::human("B", &["hang"]).boxed(),
    );
    let control = game.control();
    let mut rx = game.subscribe();
    let handle = tokio::spawn(game.run());

    while let Some(event) = rx.recv().await {
        if matches!(event, MatchEvent::Move { .. }) {
            control.stop();
            break;
        }
    }

    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.result, GameResult::aborted());
    assert_eq!(summary.plies, 1);
}

#[tokio::test]
async fn pause_and_resume_between_plies() {
    let slot: ControlSlot = Default::default();
    let mut game = Match::new(
        ScriptedPlayer::human("W", &["pause", "e4", "resign"]).with_control(&slot).boxed(),
        ScriptedPlayer::human("B", &["e5"]).boxed(),
    );
    let control = game.control();
    *slot.lock().unwrap() = Some(control.clone());
    let mut rx = game.subscribe();
    let handle = tokio::spawn(game.run());

    let mut seen = Vec::new();
    while let Some(event) = rx.recv().await {
        if matches!(event, MatchEvent::Paused) {
            control.resume();
        }
        seen.push(event);
    }

    let summary = handle.await.unwrap().unwrap();
    let paused = seen.iter().position(|e| matches!(e, MatchEvent::Paused)).unwrap();
    let resumed = seen.iter().position(|e| matches!(e, MatchEvent::Resumed)).unwrap();
    // Pause takes effect after white's move, before black's.
    assert!(matches!(&seen[paused - 1], MatchEvent::Move { record, .. } if record.san == "e4"));
    assert_eq!(resumed, paused + 1);
    assert_eq!(summary.plies, 2);
    assert_eq!(summary.result, GameResult::win(Side::Black, Termination::Resignation));
}

#[tokio::test]
async fn missing_engine_is_fatal_before_the_game_starts() {
    let engine = EnginePlayer::new(
        "Stockfish",
        EngineSettings {
            path: Some("/definitely/not/stockfish".to_string()),
            ..EngineSettings::default()
        },
    );
    let mut game = Match::new(ScriptedPlayer::human("W", &["e4"]).boxed(), Box::new(engine));
    let mut rx = game.subscribe();

    let result = game.run().await;
    assert!(matches!(result, Err(MatchError::EngineUnavailable(_))));
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn events_survive_a_json_round_trip() {
    let mut game = Match::new(
        ScriptedPlayer::human("W", &["f3", "g4"]).boxed(),
        ScriptedPlayer::human("B", &["e5", "Qh4#"]).boxed(),
    )
    .with_commentary(fallback_commentary(CommentaryFrequency::EveryMove));
    let mut rx = game.subscribe();
    game.run().await.unwrap();
    let events = drain(&mut rx);

    let mut tags = Vec::new();
    for event in &events {
        let line = serde_json::to_string(event).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        tags.push(value["type"].as_str().unwrap().to_string());

        let back: MatchEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(&back, event);
    }
    assert_eq!(tags.first().map(String::as_str), Some("game_start"));
    assert!(tags.contains(&"move".to_string()));
    assert!(tags.contains(&"game_end".to_string()));
    assert!(tags.iter().filter(|t| *t == "commentary").count() >= 6);
}

fn coaching_trace(events: &[MatchEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            MatchEvent::Advice(advice) => Some(format!("advice {}", advice.move_number)),
            MatchEvent::Move { record, .. } => Some(record.san.clone()),
            MatchEvent::Error { .. } => Some("error".to_string()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn coaching_comes_before_each_human_move() {
    let client = Arc::new(CoachClient::default());
    let advisor = TeachingAdvisor::new(
        Box::new(FirstLegalLines::default()),
        Some(client.clone() as Arc<dyn TextGenerationClient>),
    );
    let mut game = Match::new(
        ScriptedPlayer::human("Student", &["e4", "Qh5xx", "Nf3", "resign"]).boxed(),
        ScriptedPlayer::machine("Sparring", &["e5", "Nc6"]).boxed(),
    )
    .with_teaching(advisor);
    let mut rx = game.subscribe();
    let summary = game.run().await.unwrap();
    let events = drain(&mut rx);

    // One piece of advice per human ply, none for the machine, none for a retry.
    assert_eq!(
        coaching_trace(&events),
        vec!["advice 1", "e4", "e5", "advice 2", "error", "Nf3", "Nc6", "advice 3"]
    );
    assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    assert_eq!(summary.result, GameResult::win(Side::Black, Termination::Resignation));

    let advice = events
        .iter()
        .find_map(|e| match e {
            MatchEvent::Advice(a) => Some(a),
            _ => None,
        })
        .unwrap();
    assert_eq!(advice.side, Side::White);
    assert_eq!(advice.source, CommentarySource::Generated);
    assert_eq!(advice.position_assessment, "Lesson 1.");
    assert_eq!(advice.candidate_moves.len(), 1);
    assert_eq!(advice.candidate_moves[0].evaluation, "+0.00");
    assert_eq!(advice.candidate_moves[0].explanation, "It is first.");
}

#[tokio::test]
async fn coaching_without_a_client_uses_engine_lines() {
    let advisor = TeachingAdvisor::new(Box::new(FirstLegalLines::default()), None).with_candidates(2);
    let mut game = Match::new(
        ScriptedPlayer::machine("Sparring", &["e4"]).boxed(),
        ScriptedPlayer::human("Student", &["resign"]).boxed(),
    )
    .with_teaching(advisor);
    let mut rx = game.subscribe();
    game.run().await.unwrap();

    let advice: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            MatchEvent::Advice(a) => Some(a),
            _ => None,
        })
        .collect();
    assert_eq!(advice.len(), 1);
    assert_eq!(advice[0].side, Side::Black);
    assert_eq!(advice[0].source, CommentarySource::Fallback);
    assert_eq!(advice[0].candidate_moves.len(), 2);
}

#[tokio::test]
async fn broken_coaching_never_stops_the_game() {
    // Engine missing at start: the game runs without advice.
    let advisor = TeachingAdvisor::new(
        Box::new(FirstLegalLines {
            broken_start: true,
            ..FirstLegalLines::default()
        }),
        None,
    );
    let mut game = Match::new(
        ScriptedPlayer::human("W", &["e4", "resign"]).boxed(),
        ScriptedPlayer::human("B", &["e5"]).boxed(),
    )
    .with_teaching(advisor);
    let mut rx = game.subscribe();
    let summary = game.run().await.unwrap();
    assert_eq!(summary.plies, 2);
    assert_eq!(coaching_trace(&drain(&mut rx)), vec!["e4", "e5"]);

    // Engine dies mid-game: each missed piece of advice is reported, play goes on.
    let advisor = TeachingAdvisor::new(
        Box::new(FirstLegalLines {
            broken_search: true,
            ..FirstLegalLines::default()
        }),
        None,
    );
    let mut game = Match::new(
        ScriptedPlayer::human("W", &["e4", "resign"]).boxed(),
        ScriptedPlayer::machine("B", &["e5"]).boxed(),
    )
    .with_teaching(advisor);
    let mut rx = game.subscribe();
    let summary = game.run().await.unwrap();
    assert_eq!(summary.plies, 2);
    assert_eq!(
        coaching_trace(&drain(&mut rx)),
        vec!["error", "e4", "e5", "error"]
    );
}
