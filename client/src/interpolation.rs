//! Snapshot interpolation for the remote entity.
//!
//! The client deliberately renders the opponent a fixed offset in the
//! past, so that two buffered snapshots usually bracket the render time
//! and the position can be reconstructed by interpolation instead of
//! guessed by extrapolation.

use std::collections::VecDeque;

use shared::fixed::{fixed, Vec2};
use shared::protocol::ServerSnapshot;
use shared::{snapshot_capacity, Role};

/// Bounded history of authoritative snapshots, oldest first.
///
/// Entries arrive in non-decreasing `server_time` order (the transport is
/// ordered); once the buffer exceeds its capacity the oldest entries are
/// evicted.
pub struct InterpolationBuffer {
    snapshots: VecDeque<ServerSnapshot>,
    capacity: usize,
}

impl InterpolationBuffer {
    pub fn new() -> Self {
        Self::with_capacity(snapshot_capacity())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        InterpolationBuffer {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, snapshot: ServerSnapshot) {
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn oldest(&self) -> Option<&ServerSnapshot> {
        self.snapshots.front()
    }

    pub fn latest(&self) -> Option<&ServerSnapshot> {
        self.snapshots.back()
    }

    /// Reconstructs `role`'s position at buffered time `at`.
    ///
    /// Scans from the oldest entry for the first pair with
    /// `previous.server_time <= at < target.server_time` and lerps
    /// between them. When no pair brackets `at` — the offset was too
    /// aggressive or the connection stalled — the position freezes at the
    /// oldest retained snapshot rather than extrapolating.
    pub fn sample(&self, at: f32, role: Role) -> Option<Vec2> {
        let mut bracket = None;
        for i in 0..self.snapshots.len().saturating_sub(1) {
            let previous = &self.snapshots[i];
            let target = &self.snapshots[i + 1];
            if previous.server_time <= at && at < target.server_time {
                bracket = Some((previous, target));
                break;
            }
        }

        let (previous, target) = match bracket {
            Some(pair) => pair,
            None => {
                let oldest = self.oldest()?;
                (oldest, oldest)
            }
        };

        let span = target.server_time - previous.server_time;
        let raw = (target.server_time - at) / span;
        // A zero span divides to NaN/infinity; hold at `previous`.
        let time_point = if raw.is_finite() { fixed(raw) } else { 0.0 };

        Some(
            previous
                .position_of(role)
                .lerp(target.position_of(role), time_point),
        )
    }
}

impl Default for InterpolationBuffer {
    fn default() -> Self {
        Self::new()
    }
}
