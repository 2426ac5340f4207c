//! Movement integration: direction input to displacement, and the arena
//! bounds clamp.

use crate::fixed::{fixed, Vec2};
use crate::{ARENA_HEIGHT, ARENA_WIDTH, PLAYER_HALF_X, PLAYER_HALF_Y};

/// Converts a direction sum into a displacement for one fixed step.
///
/// `dir_x`/`dir_y` are the summed contributions of every command consumed
/// this tick (one command contributes -1, 0 or 1 per axis), so magnitudes
/// beyond 1 are valid. `dt` must be the fixed simulation step, not a
/// wall-clock delta.
pub fn resolve(speed: f32, dir_x: i32, dir_y: i32, dt: f32) -> Vec2 {
    Vec2 {
        x: fixed(dir_x as f32 * speed * dt),
        y: fixed(dir_y as f32 * speed * dt),
    }
}

/// Clamps `position` so the entity's box stays inside the arena, then
/// re-quantizes. Applied after every integration on both sides so both
/// saturate to the same value.
pub fn clamp_to_arena(position: Vec2, half_extents: Vec2, arena: Vec2) -> Vec2 {
    Vec2 {
        x: fixed(position.x.clamp(half_extents.x, arena.x - half_extents.x)),
        y: fixed(position.y.clamp(half_extents.y, arena.y - half_extents.y)),
    }
}

/// [`clamp_to_arena`] with the standard player box and arena dimensions.
pub fn clamp_player(position: Vec2) -> Vec2 {
    clamp_to_arena(
        position,
        Vec2::new(PLAYER_HALF_X, PLAYER_HALF_Y),
        Vec2::new(ARENA_WIDTH, ARENA_HEIGHT),
    )
}
