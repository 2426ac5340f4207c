//! Simulation core shared between the authoritative server and the
//! predicting client.
//!
//! Both sides integrate movement with the same fixed tick duration, the
//! same speed constant and the same fixed-point quantization, so that a
//! given input sequence produces bit-identical positions on either end.
//! Everything latency-related (prediction, reconciliation, interpolation)
//! depends on that determinism.

pub mod fixed;
pub mod movement;
pub mod player;
pub mod protocol;
pub mod step;

pub use fixed::{fixed, Vec2};
pub use player::{PlayerPair, PlayerState, Role};
pub use protocol::{ClientFrame, DirectionSet, InputCommand, ProtocolError, ServerFrame, ServerSnapshot};
pub use step::FixedStep;

/// Arena width in world units.
pub const ARENA_WIDTH: f32 = 720.0;
/// Arena height in world units.
pub const ARENA_HEIGHT: f32 = 480.0;

/// Axis-aligned half extents of a player box (16x16).
pub const PLAYER_HALF_X: f32 = 8.0;
pub const PLAYER_HALF_Y: f32 = 8.0;

/// Movement speed in world units per second.
pub const PLAYER_SPEED: f32 = 120.0;

/// Fixed simulation step. Client prediction and the authoritative tick
/// both integrate with exactly this value, never a wall-clock delta.
pub const TICK_SECONDS: f32 = 0.015;

/// A snapshot is broadcast every Nth simulation tick.
pub const BROADCAST_DIVISOR: u32 = 3;
/// Seconds between broadcast snapshots.
pub const BROADCAST_SECONDS: f32 = TICK_SECONDS * BROADCAST_DIVISOR as f32;

/// How far in the past the remote entity is rendered, so that two
/// snapshots usually bracket the render time.
pub const INTERPOLATION_OFFSET: f32 = 0.1;

/// Seconds of snapshot history retained for interpolation.
pub const BUFFER_SECONDS: f32 = 2.0;

/// Remote smoothing strength; blend factor per tick is
/// `TICK_SECONDS * SMOOTHING_AMOUNT`.
pub const SMOOTHING_AMOUNT: f32 = 25.0;

/// A wall-clock stall longer than this resets the step accumulator
/// instead of burst-simulating the backlog.
pub const STALL_RESET_SECONDS: f32 = 2.0;

/// Host spawn position.
pub const HOST_SPAWN: (f32, f32) = (20.0, 20.0);
/// Guest spawn position.
pub const GUEST_SPAWN: (f32, f32) = (500.0, 200.0);

/// Interpolation buffer capacity: `BUFFER_SECONDS` worth of snapshots at
/// the broadcast rate.
pub fn snapshot_capacity() -> usize {
    (BUFFER_SECONDS / BROADCAST_SECONDS).ceil() as usize
}
