//! Performance benchmarks for the hot paths of the synchronization core.

use std::time::Instant;

use client::interpolation::InterpolationBuffer;
use shared::movement::{clamp_player, resolve};
use shared::protocol::{DirectionSet, InputCommand, ServerSnapshot};
use shared::{PlayerState, Role, Vec2, PLAYER_SPEED, TICK_SECONDS};

fn command(sequence: u32) -> InputCommand {
    InputCommand {
        directions: DirectionSet {
            right: true,
            ..DirectionSet::default()
        },
        sequence,
        issued_at: None,
    }
}

/// Benchmarks the resolve + clamp pair that runs on every tick of both
/// sides.
#[test]
fn benchmark_movement_integration() {
    let iterations = 100_000;
    let mut position = Vec2::new(360.0, 240.0);

    let start = Instant::now();
    for i in 0..iterations {
        let delta = resolve(PLAYER_SPEED, (i % 3) as i32 - 1, 0, TICK_SECONDS);
        position = clamp_player(position.add(delta));
    }
    let duration = start.elapsed();

    println!(
        "Movement integration: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 100ms for 100k iterations
    assert!(duration.as_millis() < 100);
    assert!(position.x >= 0.0); // keep the loop observable
}

/// Benchmarks reconciliation replay with a deep unacknowledged queue.
#[test]
fn benchmark_reconciliation_replay() {
    let replay_depth = 64;
    let iterations = 1_000;

    let commands: Vec<InputCommand> = (1..=replay_depth).map(command).collect();

    let start = Instant::now();
    for _ in 0..iterations {
        let mut player = PlayerState::new(Role::Host);
        player.position = Vec2::new(100.0, 100.0);
        for cmd in &commands {
            player.apply_command(cmd, TICK_SECONDS);
        }
    }
    let duration = start.elapsed();

    println!(
        "Reconciliation replay: {} x {} commands in {:?} ({:.2} µs/replay)",
        iterations,
        replay_depth,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks the bracketing scan over a full interpolation buffer.
#[test]
fn benchmark_interpolation_sampling() {
    let mut buffer = InterpolationBuffer::new();
    let capacity = shared::snapshot_capacity();
    for i in 0..capacity {
        buffer.push(ServerSnapshot {
            host_position: Vec2::new(20.0, 20.0),
            guest_position: Vec2::new(i as f32, 200.0),
            host_last_seq: i as u32,
            guest_last_seq: i as u32,
            server_time: i as f32 * 0.045,
        });
    }

    let iterations = 100_000;
    let midpoint = (capacity as f32 / 2.0) * 0.045;

    let start = Instant::now();
    for i in 0..iterations {
        let at = midpoint + (i % 10) as f32 * 0.001;
        let _ = buffer.sample(at, Role::Guest);
    }
    let duration = start.elapsed();

    println!(
        "Interpolation sampling: {} samples over {} snapshots in {:?} ({:.2} ns/sample)",
        iterations,
        capacity,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks snapshot JSON encode/decode, the per-broadcast wire cost.
#[test]
fn benchmark_snapshot_codec() {
    let snapshot = ServerSnapshot {
        host_position: Vec2::new(18.2, 20.0),
        guest_position: Vec2::new(498.2, 200.0),
        host_last_seq: 12345,
        guest_last_seq: 54321,
        server_time: 123.456,
    };

    let iterations = 10_000;
    let start = Instant::now();
    for _ in 0..iterations {
        let encoded = serde_json::to_string(&snapshot).unwrap();
        let decoded: ServerSnapshot = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.host_last_seq, snapshot.host_last_seq);
    }
    let duration = start.elapsed();

    println!(
        "Snapshot codec: {} round trips in {:?} ({:.2} µs/round trip)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks the authoritative drain with bursty queues.
#[test]
fn benchmark_input_drain() {
    let iterations = 10_000;
    let burst = 8;

    let start = Instant::now();
    let mut player = PlayerState::new(Role::Guest);
    let mut next_seq = 1;
    for _ in 0..iterations {
        for _ in 0..burst {
            player.queue_input(command(next_seq));
            next_seq += 1;
        }
        player.integrate(TICK_SECONDS);
    }
    let duration = start.elapsed();

    println!(
        "Input drain: {} ticks x {} queued commands in {:?} ({:.2} µs/tick)",
        iterations,
        burst,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}
