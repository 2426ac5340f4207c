//! Client-side game state: prediction, reconciliation and the render
//! clock.
//!
//! The locally-controlled entity is moved the instant input is sampled,
//! with the same resolver and clamp the server will apply — that is the
//! prediction. When an authoritative snapshot arrives the engine rewinds
//! to the server-confirmed position, drops every acknowledged command and
//! replays the rest, so a correct prediction produces zero visible
//! correction and a wrong one snaps by exactly the divergence.

use log::{debug, info};
use shared::fixed::{fixed, Vec2};
use shared::protocol::{DirectionSet, InputCommand, ServerSnapshot};
use shared::{PlayerPair, Role, INTERPOLATION_OFFSET, SMOOTHING_AMOUNT, TICK_SECONDS};

use crate::input::InputTracker;
use crate::interpolation::InterpolationBuffer;

/// Where this client stands in the match lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Connected, no role assigned yet.
    Waiting,
    /// We created the match and wait for an opponent.
    Hosting,
    /// We joined an existing match, waiting for the ready signal.
    Joined,
    /// Both participants present.
    Playing,
    /// The match ended; the server may re-seat us at any moment.
    Ended,
}

/// Render-side clock for the remote entity.
///
/// `render_time` runs continuously — advanced every render frame — and
/// re-syncs to `server_time − INTERPOLATION_OFFSET` whenever a snapshot
/// arrives, so interpolation proceeds smoothly between receipts instead
/// of freezing until the next one.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientClock {
    pub server_time: f32,
    pub render_time: f32,
}

impl ClientClock {
    pub fn advance(&mut self, dt: f32) {
        self.render_time += dt;
    }

    pub fn sync(&mut self, server_time: f32) {
        self.server_time = server_time;
        self.render_time = server_time - INTERPOLATION_OFFSET;
    }
}

/// The complete client-side synchronization state for one connection.
pub struct ClientGame {
    /// Which slot is ours. Provisional until the server assigns one.
    pub role: Role,
    pub phase: SessionPhase,
    pub players: PlayerPair,
    pub tracker: InputTracker,
    pub buffer: InterpolationBuffer,
    pub clock: ClientClock,
    /// Local fixed-tick clock, stamped into outgoing commands.
    pub local_time: f32,
    /// Apply input locally before the server confirms it.
    pub prediction: bool,
    /// Ease the remote entity toward its interpolated position instead of
    /// snapping.
    pub smoothing: bool,
}

impl ClientGame {
    pub fn new() -> Self {
        ClientGame {
            role: Role::Host,
            phase: SessionPhase::Waiting,
            players: PlayerPair::new(),
            tracker: InputTracker::new(),
            buffer: InterpolationBuffer::new(),
            clock: ClientClock::default(),
            local_time: 0.0,
            prediction: true,
            smoothing: true,
        }
    }

    /// Discards everything scoped to the previous match. The input
    /// sequence counter deliberately survives; it is scoped to the
    /// connection, not the match.
    fn reset_match(&mut self) {
        self.players.reset_positions();
        for role in [Role::Host, Role::Guest] {
            self.players[role].pending_inputs.clear();
            self.players[role].last_processed_seq = 0;
        }
        self.buffer = InterpolationBuffer::new();
        self.clock = ClientClock::default();
    }

    /// The server made us host of a fresh match.
    pub fn on_hosting(&mut self, server_time: f32) {
        self.role = Role::Host;
        self.phase = SessionPhase::Hosting;
        self.local_time = server_time;
        self.reset_match();
        info!("hosting a match, server time {:.3}", server_time);
    }

    /// The server seated us as guest in an existing match.
    pub fn on_joining(&mut self, host_id: u32) {
        self.role = Role::Guest;
        self.phase = SessionPhase::Joined;
        self.reset_match();
        info!("joining a match hosted by connection {}", host_id);
    }

    /// Both participants are in; play from fresh spawns.
    pub fn on_ready(&mut self, server_time: f32) {
        self.phase = SessionPhase::Playing;
        self.local_time = server_time;
        self.players.reset_positions();
        info!("match ready, server time {:.3}", server_time);
    }

    pub fn on_end(&mut self) {
        self.phase = SessionPhase::Ended;
        info!("match ended");
    }

    /// One fixed simulation step: sample input, sequence it, predict.
    /// Returns the command that must go to the server, if any.
    pub fn on_fixed_tick(&mut self, directions: DirectionSet) -> Option<InputCommand> {
        self.local_time = fixed(self.local_time + TICK_SECONDS);

        let command = self.tracker.tick(directions, Some(self.local_time))?;
        let me = &mut self.players[self.role];
        me.queue_input(command.clone());

        if self.prediction {
            me.apply_command(&command, TICK_SECONDS);
            me.visual_position = me.position;
        }

        Some(command)
    }

    /// An authoritative snapshot arrived: feed the interpolation buffer,
    /// re-sync the render clock and reconcile our own entity.
    pub fn on_snapshot(&mut self, snapshot: ServerSnapshot) {
        self.clock.sync(snapshot.server_time);
        self.reconcile(&snapshot);
        self.buffer.push(snapshot);
    }

    /// Rewind-and-replay correction of the predicted position.
    fn reconcile(&mut self, snapshot: &ServerSnapshot) {
        let acked_seq = snapshot.last_seq_of(self.role);
        let server_position = snapshot.position_of(self.role);

        let role = self.role;
        let me = &mut self.players[role];

        // The snapshot must acknowledge a command we still hold;
        // otherwise it confirms nothing new and correction is skipped.
        let Some(index) = me
            .pending_inputs
            .iter()
            .position(|command| command.sequence == acked_seq)
        else {
            return;
        };

        me.confirmed_position = server_position;
        me.last_processed_seq = acked_seq;
        me.pending_inputs.drain(..=index);

        // Rewind to the confirmed position, then replay everything the
        // server has not seen yet, in sequence order.
        me.position = me.confirmed_position;
        if self.prediction {
            let replay: Vec<InputCommand> = self.players[role].pending_inputs.iter().cloned().collect();
            let me = &mut self.players[role];
            for command in &replay {
                me.apply_command(command, TICK_SECONDS);
            }
        }

        let me = &mut self.players[role];
        me.visual_position = me.position;
        debug!(
            "reconciled to seq {} at ({:.3}, {:.3}), {} commands replayed",
            acked_seq,
            me.confirmed_position.x,
            me.confirmed_position.y,
            me.pending_inputs.len()
        );
    }

    /// One render frame: advance the render clock and pull the remote
    /// entity's position out of the interpolation buffer.
    pub fn on_render_tick(&mut self, dt: f32) {
        self.clock.advance(dt);

        let remote_role = self.role.other();
        if let Some(target) = self.buffer.sample(self.clock.render_time, remote_role) {
            let remote = &mut self.players[remote_role];
            remote.visual_position = if self.smoothing {
                remote
                    .visual_position
                    .lerp(target, fixed(TICK_SECONDS * SMOOTHING_AMOUNT))
            } else {
                target
            };
            remote.position = remote.visual_position;
        }

        // Without prediction our own entity just follows the newest
        // confirmed state.
        if !self.prediction {
            if let Some(confirmed) = self.buffer.latest().map(|s| s.position_of(self.role)) {
                let me = &mut self.players[self.role];
                me.confirmed_position = confirmed;
                me.position = confirmed;
                me.visual_position = confirmed;
            }
        }
    }

    pub fn local_visual_position(&self) -> Vec2 {
        self.players[self.role].visual_position
    }

    pub fn remote_visual_position(&self) -> Vec2 {
        self.players[self.role.other()].visual_position
    }
}

impl Default for ClientGame {
    fn default() -> Self {
        Self::new()
    }
}
