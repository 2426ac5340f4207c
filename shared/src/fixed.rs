//! Fixed-point quantization and the 2D vector type built on it.
//!
//! Positions and deltas are rounded to a fixed number of decimal places
//! after every arithmetic step. Client and server compute positions
//! independently; without the rounding, accumulated float error would
//! make their results drift apart and every snapshot would look like a
//! misprediction.

use serde::{Deserialize, Serialize};

/// Decimal places kept by [`fixed`].
pub const PRECISION: u32 = 3;

const SCALE: f32 = 1000.0;

/// Rounds `value` to [`PRECISION`] decimal places.
pub fn fixed(value: f32) -> f32 {
    (value * SCALE).round() / SCALE
}

/// A 2D position or displacement, always stored quantized.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }

    /// Component-wise sum, re-quantized.
    pub fn add(self, other: Vec2) -> Vec2 {
        Vec2 {
            x: fixed(self.x + other.x),
            y: fixed(self.y + other.y),
        }
    }

    /// Linear interpolation from `self` toward `target`.
    ///
    /// The blend factor is quantized and clamped to [0, 1] before use, so
    /// a degenerate factor can never extrapolate past either endpoint.
    pub fn lerp(self, target: Vec2, t: f32) -> Vec2 {
        let t = fixed(t.clamp(0.0, 1.0));
        Vec2 {
            x: fixed(self.x + t * (target.x - self.x)),
            y: fixed(self.y + t * (target.y - self.y)),
        }
    }
}

impl From<(f32, f32)> for Vec2 {
    fn from((x, y): (f32, f32)) -> Self {
        Vec2 { x, y }
    }
}
