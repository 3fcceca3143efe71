//! Performance benchmarks for critical game systems

use server::config::{GameConfig, WorldConfig};
use server::leaderboard::recompute;
use server::registry::PlayerRegistry;
use server::session::{Lobby, SessionInput};
use server::view::ViewFilter;
use server::world::World;
use shared::{ClientMessage, ServerMessage, MAX_RENDERED_PEERS, RENDER_DISTANCE};
use std::time::Instant;

fn seeded_world() -> World {
    World::new(WorldConfig {
        seed: Some(3),
        ..WorldConfig::default()
    })
}

fn crowded_registry(count: usize) -> PlayerRegistry {
    let mut registry = PlayerRegistry::with_seed(11);
    for i in 0..count {
        let id = registry.register(&format!("p{}", i)).unwrap();
        registry
            .update_player(&id, 150.0 + (i as f32) * 7.0, 200.0, (i * 13 % 97) as u32, i % 9 == 0)
            .unwrap();
    }
    registry
}

/// Benchmarks course generation far ahead of the spawn
#[test]
fn benchmark_world_generation() {
    let mut world = seeded_world();
    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let x = world.last_pipe_x();
        world.extend_for(x);
        world.prune_behind(x);
    }

    let duration = start.elapsed();
    println!(
        "World generation: {} pipes in {:?} ({:.2} ns/pipe)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Pruning keeps the course bounded no matter how far it grows
    assert!(world.len() < 20);
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks leaderboard recomputation over a large lobby
#[test]
fn benchmark_leaderboard_recompute() {
    let registry = crowded_registry(1_000);
    let iterations = 200;
    let start = Instant::now();

    for _ in 0..iterations {
        let top = recompute(registry.iter(), 10, 0);
        assert_eq!(top.len(), 10);
    }

    let duration = start.elapsed();
    println!(
        "Leaderboard recompute: {} × 1000 players in {:?} ({:.2} μs/recompute)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks per-player snapshot building for a full lobby
#[test]
fn benchmark_snapshot_filtering() {
    let registry = crowded_registry(500);
    let world = seeded_world();
    let filter = ViewFilter::new(RENDER_DISTANCE, MAX_RENDERED_PEERS);
    let leaderboard = recompute(registry.iter(), 10, 0);
    let viewers: Vec<_> = registry.iter().map(|(id, _)| id.clone()).collect();

    let start = Instant::now();

    let mut peers = 0;
    for viewer in &viewers {
        let snapshot = filter
            .build_snapshot(viewer, &registry, &world, &leaderboard)
            .unwrap();
        assert!(snapshot.peers.len() <= MAX_RENDERED_PEERS);
        peers += snapshot.peers.len();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot filtering: {} viewers, {} peers total in {:?}",
        viewers.len(),
        peers,
        duration
    );

    // One full broadcast must fit comfortably inside a tick budget in release
    assert!(duration.as_millis() < 1000);
}

/// Stress tests the lobby with many joins and reports
#[test]
fn stress_test_lobby_reports() {
    let mut lobby = Lobby::new(GameConfig {
        world: WorldConfig {
            seed: Some(8),
            ..WorldConfig::default()
        },
        ..GameConfig::default()
    });

    for connection in 1..=100 {
        lobby.connect(connection);
        lobby.handle(
            connection,
            SessionInput::Message(ClientMessage::Init {
                name: format!("bot{}", connection),
                x: 150.0,
                y: 150.0,
                score: 0,
                is_dead: false,
            }),
        );
    }
    assert_eq!(lobby.registry().len(), 100);

    let rounds = 50;
    let start = Instant::now();

    for round in 0..rounds {
        for connection in 1..=100u64 {
            lobby.handle(
                connection,
                SessionInput::Message(ClientMessage::Update {
                    player_id: None,
                    x: 150.0 + (round * 20) as f32 + connection as f32,
                    y: 200.0,
                    score: round,
                    is_dead: false,
                }),
            );
        }
        let snapshots = lobby.snapshots();
        assert_eq!(snapshots.len(), 100);
    }

    let duration = start.elapsed();
    println!(
        "Lobby stress: {} rounds × 100 players in {:?} ({:.2} ms/round)",
        rounds,
        duration,
        duration.as_millis() as f64 / rounds as f64
    );

    for (_, message) in lobby.snapshots() {
        let ServerMessage::State { top_players, .. } = message else {
            panic!("snapshot was not a state message");
        };
        assert_eq!(top_players.len(), 10);
    }
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks JSON encoding of a full snapshot
#[test]
fn benchmark_snapshot_encoding() {
    let mut lobby = Lobby::new(GameConfig::default());
    for connection in 1..=20 {
        lobby.connect(connection);
        lobby.handle(
            connection,
            SessionInput::Message(ClientMessage::Init {
                name: format!("bot{}", connection),
                x: 150.0 + connection as f32,
                y: 150.0,
                score: connection as u32,
                is_dead: false,
            }),
        );
    }
    let snapshots = lobby.snapshots();

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        for (_, message) in &snapshots {
            let text = shared::encode(message).unwrap();
            assert!(text.starts_with('{'));
        }
    }

    let duration = start.elapsed();
    println!(
        "Snapshot encoding: {} × {} snapshots in {:?}",
        iterations,
        snapshots.len(),
        duration
    );

    assert!(duration.as_millis() < 5000);
}
