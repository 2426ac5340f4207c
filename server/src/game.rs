//! Authoritative per-match simulation.

use log::debug;
use shared::fixed::fixed;
use shared::protocol::{InputCommand, ServerSnapshot};
use shared::{PlayerPair, Role, BROADCAST_DIVISOR, TICK_SECONDS};

/// The server-side state of one two-player match.
///
/// Positions in here are the single source of truth. Every fixed tick the
/// pending commands of both slots are drained into one displacement each;
/// every [`BROADCAST_DIVISOR`]th tick a snapshot of the result is due.
#[derive(Debug, Clone)]
pub struct MatchState {
    pub players: PlayerPair,
    /// Simulation clock, advanced by the fixed step each tick. Strictly
    /// increasing across the snapshots of one match.
    pub server_time: f32,
    pub tick: u32,
    /// Both participants are present and positions have been reset.
    pub active: bool,
}

impl MatchState {
    pub fn new() -> Self {
        MatchState {
            players: PlayerPair::new(),
            server_time: 0.0,
            tick: 0,
            active: false,
        }
    }

    /// Buffers one input command for the given slot. Commands at or below
    /// the slot's last processed sequence are duplicates of work already
    /// done and are dropped silently.
    pub fn queue_input(&mut self, role: Role, command: InputCommand) {
        let player = &mut self.players[role];
        if command.sequence <= player.last_processed_seq {
            debug!(
                "dropping stale input seq {} for {:?} (last processed {})",
                command.sequence, role, player.last_processed_seq
            );
            return;
        }
        player.queue_input(command);
    }

    /// Runs one fixed simulation step for both slots and advances the
    /// match clock.
    pub fn step(&mut self) {
        self.players[Role::Host].integrate(TICK_SECONDS);
        self.players[Role::Guest].integrate(TICK_SECONDS);
        self.tick += 1;
        self.server_time = fixed(self.server_time + TICK_SECONDS);
    }

    /// True on the ticks where a snapshot should go out.
    pub fn should_broadcast(&self) -> bool {
        self.tick % BROADCAST_DIVISOR == 0
    }

    pub fn snapshot(&self) -> ServerSnapshot {
        ServerSnapshot {
            host_position: self.players[Role::Host].position,
            guest_position: self.players[Role::Guest].position,
            host_last_seq: self.players[Role::Host].last_processed_seq,
            guest_last_seq: self.players[Role::Guest].last_processed_seq,
            server_time: self.server_time,
        }
    }

    /// Marks the match live: both participants present, fresh spawns.
    pub fn start(&mut self) {
        self.players.reset_positions();
        self.active = true;
    }
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::protocol::DirectionSet;
    use shared::{HOST_SPAWN, PLAYER_SPEED};

    fn command(token: &str, sequence: u32) -> InputCommand {
        InputCommand {
            directions: DirectionSet::parse(token).unwrap(),
            sequence,
            issued_at: None,
        }
    }

    #[test]
    fn opposite_inputs_over_two_ticks_cancel() {
        let mut state = MatchState::new();
        let spawn_x = HOST_SPAWN.0;

        state.queue_input(Role::Host, command("l", 1));
        state.step();
        assert_approx_eq!(
            state.players[Role::Host].position.x,
            spawn_x - PLAYER_SPEED * TICK_SECONDS,
            1e-4
        );

        state.queue_input(Role::Host, command("r", 2));
        state.step();
        assert_approx_eq!(state.players[Role::Host].position.x, spawn_x, 1e-4);
        assert_eq!(state.players[Role::Host].last_processed_seq, 2);
    }

    #[test]
    fn stale_input_is_dropped_silently() {
        let mut state = MatchState::new();
        state.queue_input(Role::Guest, command("r", 1));
        state.step();
        let after_first = state.players[Role::Guest].position;

        // Re-delivery of seq 1 must not move the player again.
        state.queue_input(Role::Guest, command("r", 1));
        state.step();
        assert_eq!(state.players[Role::Guest].position, after_first);
        assert_eq!(state.players[Role::Guest].last_processed_seq, 1);
    }

    #[test]
    fn multiple_commands_in_one_tick_sum() {
        let mut state = MatchState::new();
        state.queue_input(Role::Host, command("r", 1));
        state.queue_input(Role::Host, command("r", 2));
        state.step();
        assert_approx_eq!(
            state.players[Role::Host].position.x,
            HOST_SPAWN.0 + 2.0 * PLAYER_SPEED * TICK_SECONDS,
            1e-4
        );
    }

    #[test]
    fn broadcast_cadence_is_every_third_tick() {
        let mut state = MatchState::new();
        let mut broadcast_ticks = Vec::new();
        for _ in 0..9 {
            state.step();
            if state.should_broadcast() {
                broadcast_ticks.push(state.tick);
            }
        }
        assert_eq!(broadcast_ticks, vec![3, 6, 9]);
    }

    #[test]
    fn snapshot_times_strictly_increase() {
        let mut state = MatchState::new();
        let mut previous = -1.0f32;
        for _ in 0..30 {
            state.step();
            if state.should_broadcast() {
                let snapshot = state.snapshot();
                assert!(snapshot.server_time > previous);
                previous = snapshot.server_time;
            }
        }
    }

    #[test]
    fn start_resets_positions_and_activates() {
        let mut state = MatchState::new();
        state.queue_input(Role::Host, command("d", 1));
        state.step();
        assert_ne!(state.players[Role::Host].position, Role::Host.spawn());

        state.start();
        assert!(state.active);
        assert_eq!(state.players[Role::Host].position, Role::Host.spawn());
        assert_eq!(state.players[Role::Guest].position, Role::Guest.spawn());
    }
}
