//! Performance benchmarks for the hot paths of the presence protocol

use client::camera::{Camera, Viewport, Zoom};
use client::roster::Roster;
use client::throttle::UpdateThrottle;
use server::dispatch::handle_client_event;
use server::registry::SessionRegistry;
use shared::{
    ClientEvent, ConnectionId, JoinRequest, MoveRequest, PlayerSession, PlayerUpdate, Position,
    ServerEvent, WireEvent,
};
use std::time::Instant;

fn ids(count: usize) -> Vec<ConnectionId> {
    (0..count).map(|i| ConnectionId::new(format!("conn-{:015}", i))).collect()
}

fn populated_registry(ids: &[ConnectionId]) -> SessionRegistry {
    let mut registry = SessionRegistry::new();
    for (i, id) in ids.iter().enumerate() {
        registry.join(
            id,
            JoinRequest {
                username: Some(format!("player{}", i)),
                x: Some(i as f32),
                y: Some(0.0),
                ..Default::default()
            },
        );
    }
    registry
}

/// Benchmarks applying moves to a full registry
#[test]
fn benchmark_registry_moves() {
    let ids = ids(500);
    let mut registry = populated_registry(&ids);

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let id = &ids[i % ids.len()];
        let _ = registry.apply_move(
            id,
            MoveRequest {
                x: i as f32,
                y: -(i as f32),
            },
        );
    }

    let duration = start.elapsed();
    println!(
        "Registry moves: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks the full move path: dispatch plus encoding the broadcast
#[test]
fn benchmark_move_dispatch_and_encode() {
    let ids = ids(100);
    let mut registry = populated_registry(&ids);

    let iterations = 20_000;
    let start = Instant::now();

    for i in 0..iterations {
        let from = &ids[i % ids.len()];
        let event = ClientEvent::PlayerMove(MoveRequest {
            x: i as f32 * 0.5,
            y: 3.0,
        });
        for dispatch in handle_client_event(&mut registry, from, event, i as u64) {
            if let server::dispatch::Dispatch::Broadcast { event, .. } = dispatch {
                let _ = event.encode().unwrap();
            }
        }
    }

    let duration = start.elapsed();
    println!(
        "Move dispatch+encode: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks encoding and decoding a large roster snapshot
#[test]
fn benchmark_snapshot_codec() {
    let ids = ids(200);
    let registry = populated_registry(&ids);
    let snapshot = ServerEvent::PlayersUpdate(registry.all());

    let iterations = 500;
    let start = Instant::now();

    for _ in 0..iterations {
        let text = snapshot.encode().unwrap();
        let decoded = ServerEvent::decode(&text).unwrap();
        assert!(matches!(decoded, ServerEvent::PlayersUpdate(ref players) if players.len() == 200));
    }

    let duration = start.elapsed();
    println!(
        "Snapshot codec (200 players): {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 3000);
}

/// Benchmarks client-side reconciliation of a stream of deltas
#[test]
fn benchmark_roster_reconciliation() {
    let ids = ids(200);
    let mut roster = Roster::new();
    roster.set_local_id(ids[0].clone());

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let id = ids[i % ids.len()].clone();
        let update = PlayerUpdate {
            player: PlayerSession {
                id,
                user_id: None,
                username: "p".to_string(),
                position: Position::new(i as f32, 0.0),
                color: shared::DEFAULT_COLOR.to_string(),
                avatar: None,
                radius: shared::DEFAULT_RADIUS,
            },
            timestamp: i as u64,
        };
        let _ = roster.apply_update(update.player, i as u64);
    }

    let duration = start.elapsed();
    println!(
        "Roster reconciliation: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(roster.len(), ids.len() - 1);
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks one simulated second of throttle and camera work at 60 FPS
/// for many clients
#[test]
fn benchmark_frame_math() {
    let viewport = Viewport::new(1280.0, 720.0);
    let clients = 1_000;

    let start = Instant::now();
    let mut sent = 0;

    for client in 0..clients {
        let mut throttle = UpdateThrottle::new();
        let mut position = Position::new(client as f32, 0.0);
        for frame in 0..60u64 {
            position.x += 5.0;
            if throttle.should_send(position, frame * 16) {
                sent += 1;
            }
            let camera = Camera::follow(position, viewport, Zoom::new(1.5));
            let _ = camera.world_to_screen(Position::new(0.0, 0.0));
            let _ = camera.grid_lines(viewport, 50.0);
        }
    }

    let duration = start.elapsed();
    println!(
        "Frame math: {} client-seconds in {:?}, {} reports",
        clients, duration, sent
    );

    // Moving 5 units per frame always exceeds the distance threshold
    assert_eq!(sent, clients * 60);
    assert!(duration.as_millis() < 3000);
}
