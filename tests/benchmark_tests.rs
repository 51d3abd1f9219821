//! Performance benchmarks for the rules engine, the search and the codec

use bincode::{deserialize, serialize};
use server::config::Settings;
use server::service::GameService;
use shared::ai::{choose_move, evaluate};
use shared::{BotLevel, Board, Cell, Game, Identity, Packet, COLS};
use std::time::Instant;

/// Position after eight opening moves.
fn midgame() -> Board {
    let mut game = Game::new();
    for column in [3, 3, 2, 4, 4, 2, 1, 5] {
        game.apply_move(column).unwrap();
    }
    game.board
}

/// Benchmarks win detection on a busy board
#[test]
fn benchmark_win_detection() {
    let board = midgame();
    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = board.detect_win();
    }

    let duration = start.elapsed();
    println!(
        "Win detection: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks full random games through the state machine
#[test]
fn benchmark_random_games() {
    let games = 2_000;
    let start = Instant::now();
    let mut draws = 0;

    for seed in 0..games {
        let mut game = Game::new();
        let mut step: usize = seed;
        while !game.is_over() {
            let legal = game.board.legal_columns();
            step = step.wrapping_mul(31).wrapping_add(7);
            game.apply_move(legal[step % legal.len()]).unwrap();
        }
        if game.status.winner().is_none() {
            draws += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Scripted games: {} games in {:?} ({} draws)",
        games, duration, draws
    );

    assert!(duration.as_millis() < 5000);
}

/// Benchmarks the static evaluation used at search leaves
#[test]
fn benchmark_evaluation() {
    let board = midgame();
    let iterations = 50_000;
    let start = Instant::now();

    let mut total = 0i64;
    for _ in 0..iterations {
        total += evaluate(&board, Cell::PlayerOne) as i64;
    }

    let duration = start.elapsed();
    println!(
        "Evaluation: {} iterations in {:?} (checksum {})",
        iterations, duration, total
    );

    assert!(duration.as_millis() < 3000);
}

/// Benchmarks a move choice at every level
#[test]
fn benchmark_search_levels() {
    let board = midgame();
    let mut rng = rand::thread_rng();

    for level in 1..=5 {
        let start = Instant::now();
        let column = choose_move(&board, Cell::PlayerOne, BotLevel::new(level), &mut rng);
        let duration = start.elapsed();
        println!("Level {}: column {:?} in {:?}", level, column, duration);

        let column = column.expect("midgame board has legal moves");
        assert!(column < COLS);
        assert!(duration.as_millis() < 5000);
    }
}

/// Benchmarks packet encoding for a full room snapshot
#[tokio::test]
async fn benchmark_snapshot_serialization() {
    let service = GameService::new(Settings::default());
    let room = service
        .sessions()
        .create(&Identity::with_account("pid-1", "alice"))
        .unwrap();
    let packet = Packet::Room(room);

    let iterations = 20_000;
    let start = Instant::now();

    let mut bytes = 0;
    for _ in 0..iterations {
        let encoded = serialize(&packet).unwrap();
        bytes = encoded.len();
        let _: Packet = deserialize(&encoded).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot codec: {} round trips of {} bytes in {:?}",
        iterations, bytes, duration
    );

    assert!(bytes < 1024);
    assert!(duration.as_millis() < 3000);
}

/// Stress test: many rooms created and played concurrently
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_test_many_rooms() {
    let service = std::sync::Arc::new(GameService::new(Settings::default()));
    let rooms = 200;
    let start = Instant::now();

    let mut handles = Vec::new();
    for i in 0..rooms {
        let service = std::sync::Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let first = Identity::guest(format!("a{}", i));
            let second = Identity::guest(format!("b{}", i));
            let code = service.sessions().create(&first).unwrap().code;
            service.sessions().join(&code, &second).unwrap();
            for turn in 0..7 {
                let (who, column) = if turn % 2 == 0 { (&first, 0) } else { (&second, 1) };
                service.sessions().play(&code, who, column).unwrap();
            }
            service.sessions().read(&code, &first, None, false).await.unwrap()
        }));
    }

    for handle in handles {
        let room = handle.await.unwrap();
        assert_eq!(room.status.winner(), Some(Cell::PlayerOne));
    }

    let duration = start.elapsed();
    println!("{} rooms played in {:?}", rooms, duration);
    assert_eq!(service.sessions().len(), rooms);
    assert!(duration.as_millis() < 5000);
}
