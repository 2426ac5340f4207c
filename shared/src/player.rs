//! Per-player simulation state and role addressing.
//!
//! A match always has exactly two slots. Instead of branching on a
//! "am I the host" flag at every field access, state lives in a two-slot
//! pair indexed by [`Role`]; each side holds a single `Role` saying which
//! slot is its own.

use std::collections::VecDeque;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::fixed::Vec2;
use crate::movement::{clamp_player, resolve};
use crate::protocol::InputCommand;
use crate::{GUEST_SPAWN, HOST_SPAWN, PLAYER_SPEED};

/// Which of the two match slots a participant occupies. The host is the
/// participant whose connection created the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Host,
    Guest,
}

impl Role {
    pub fn index(self) -> usize {
        match self {
            Role::Host => 0,
            Role::Guest => 1,
        }
    }

    pub fn other(self) -> Role {
        match self {
            Role::Host => Role::Guest,
            Role::Guest => Role::Host,
        }
    }

    pub fn spawn(self) -> Vec2 {
        match self {
            Role::Host => HOST_SPAWN.into(),
            Role::Guest => GUEST_SPAWN.into(),
        }
    }

    pub fn is_host(self) -> bool {
        matches!(self, Role::Host)
    }
}

/// One player's simulation state.
///
/// On the server, `position` is authoritative and the pending queue is
/// drained every tick. On the client, `position` is the local prediction
/// for the own slot; `confirmed_position` is the last server-acknowledged
/// value and the pending queue holds not-yet-acknowledged commands kept
/// for replay.
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub role: Role,
    pub position: Vec2,
    pub confirmed_position: Vec2,
    pub visual_position: Vec2,
    /// Highest input sequence applied to `position` by the authority
    /// (server) or acknowledged by it (client).
    pub last_processed_seq: u32,
    pub pending_inputs: VecDeque<InputCommand>,
}

impl PlayerState {
    pub fn new(role: Role) -> Self {
        let spawn = role.spawn();
        PlayerState {
            role,
            position: spawn,
            confirmed_position: spawn,
            visual_position: spawn,
            last_processed_seq: 0,
            pending_inputs: VecDeque::new(),
        }
    }

    /// Puts the player back on its spawn point. Sequence bookkeeping is
    /// untouched; sequences are never reset during a connection's
    /// lifetime.
    pub fn reset_position(&mut self) {
        let spawn = self.role.spawn();
        self.position = spawn;
        self.confirmed_position = spawn;
        self.visual_position = spawn;
    }

    pub fn queue_input(&mut self, command: InputCommand) {
        self.pending_inputs.push_back(command);
    }

    /// Drains the pending queue into a direction sum for one tick.
    ///
    /// Commands at or below `last_processed_seq` are stale duplicates and
    /// contribute nothing. All remaining commands are summed (later
    /// commands add to, not overwrite, earlier ones), the last drained
    /// sequence number is recorded and the queue is emptied.
    pub fn consume_directions(&mut self) -> (i32, i32) {
        let mut dir_x = 0;
        let mut dir_y = 0;
        let mut last_seq = self.last_processed_seq;

        for command in self.pending_inputs.drain(..) {
            if command.sequence <= last_seq {
                continue;
            }
            dir_x += command.directions.dir_x();
            dir_y += command.directions.dir_y();
            last_seq = command.sequence;
        }

        self.last_processed_seq = last_seq;
        (dir_x, dir_y)
    }

    /// One authoritative integration step: drain, resolve, clamp.
    pub fn integrate(&mut self, dt: f32) {
        let (dir_x, dir_y) = self.consume_directions();
        let delta = resolve(PLAYER_SPEED, dir_x, dir_y, dt);
        self.position = clamp_player(self.position.add(delta));
    }

    /// Applies a single command to `position`, exactly the way the
    /// authority will: one resolve for one fixed step, then the clamp.
    /// Used for optimistic prediction and for reconciliation replay.
    pub fn apply_command(&mut self, command: &InputCommand, dt: f32) {
        let delta = resolve(
            PLAYER_SPEED,
            command.directions.dir_x(),
            command.directions.dir_y(),
            dt,
        );
        self.position = clamp_player(self.position.add(delta));
    }
}

/// The two match slots, indexable by [`Role`].
#[derive(Debug, Clone)]
pub struct PlayerPair {
    slots: [PlayerState; 2],
}

impl PlayerPair {
    pub fn new() -> Self {
        PlayerPair {
            slots: [PlayerState::new(Role::Host), PlayerState::new(Role::Guest)],
        }
    }

    pub fn reset_positions(&mut self) {
        for slot in &mut self.slots {
            slot.reset_position();
        }
    }
}

impl Default for PlayerPair {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<Role> for PlayerPair {
    type Output = PlayerState;

    fn index(&self, role: Role) -> &PlayerState {
        &self.slots[role.index()]
    }
}

impl IndexMut<Role> for PlayerPair {
    fn index_mut(&mut self, role: Role) -> &mut PlayerState {
        &mut self.slots[role.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DirectionSet;
    use crate::TICK_SECONDS;
    use assert_approx_eq::assert_approx_eq;

    fn command(directions: DirectionSet, sequence: u32) -> InputCommand {
        InputCommand {
            directions,
            sequence,
            issued_at: None,
        }
    }

    fn left() -> DirectionSet {
        DirectionSet {
            left: true,
            ..DirectionSet::default()
        }
    }

    fn right() -> DirectionSet {
        DirectionSet {
            right: true,
            ..DirectionSet::default()
        }
    }

    #[test]
    fn roles_address_their_slots() {
        let pair = PlayerPair::new();
        assert_eq!(pair[Role::Host].position, Vec2::from(HOST_SPAWN));
        assert_eq!(pair[Role::Guest].position, Vec2::from(GUEST_SPAWN));
        assert_eq!(Role::Host.other(), Role::Guest);
        assert!(Role::Host.is_host());
    }

    #[test]
    fn consume_sums_all_unprocessed_commands() {
        let mut player = PlayerState::new(Role::Host);
        player.queue_input(command(right(), 1));
        player.queue_input(command(right(), 2));
        player.queue_input(command(left(), 3));

        let (dir_x, dir_y) = player.consume_directions();
        assert_eq!(dir_x, 1); // +1 +1 -1
        assert_eq!(dir_y, 0);
        assert_eq!(player.last_processed_seq, 3);
        assert!(player.pending_inputs.is_empty());
    }

    #[test]
    fn consume_ignores_stale_commands() {
        let mut player = PlayerState::new(Role::Host);
        player.last_processed_seq = 5;
        player.queue_input(command(right(), 4));
        player.queue_input(command(right(), 5));
        player.queue_input(command(right(), 6));

        let (dir_x, _) = player.consume_directions();
        assert_eq!(dir_x, 1);
        assert_eq!(player.last_processed_seq, 6);
    }

    #[test]
    fn consume_with_empty_queue_is_a_no_op() {
        let mut player = PlayerState::new(Role::Host);
        player.last_processed_seq = 9;
        assert_eq!(player.consume_directions(), (0, 0));
        assert_eq!(player.last_processed_seq, 9);
    }

    #[test]
    fn integrate_moves_and_records_sequence() {
        let mut player = PlayerState::new(Role::Host);
        let start_x = player.position.x;
        player.queue_input(command(left(), 1));
        player.integrate(TICK_SECONDS);
        assert_approx_eq!(player.position.x, start_x - 1.8, 1e-4);
        assert_eq!(player.last_processed_seq, 1);
    }

    #[test]
    fn integrate_clamps_at_the_wall() {
        let mut player = PlayerState::new(Role::Host);
        player.position = Vec2::new(crate::PLAYER_HALF_X, 100.0);
        player.queue_input(command(left(), 1));
        player.integrate(TICK_SECONDS);
        assert_eq!(player.position.x, crate::PLAYER_HALF_X);
    }

    #[test]
    fn apply_command_matches_integrate_for_one_command() {
        let mut via_queue = PlayerState::new(Role::Guest);
        via_queue.queue_input(command(right(), 1));
        via_queue.integrate(TICK_SECONDS);

        let mut direct = PlayerState::new(Role::Guest);
        direct.apply_command(&command(right(), 1), TICK_SECONDS);

        assert_eq!(via_queue.position, direct.position);
    }

    #[test]
    fn reset_position_keeps_sequence_bookkeeping() {
        let mut player = PlayerState::new(Role::Guest);
        player.queue_input(command(right(), 1));
        player.integrate(TICK_SECONDS);
        player.reset_position();
        assert_eq!(player.position, Role::Guest.spawn());
        assert_eq!(player.last_processed_seq, 1);
    }
}
