//! Fixed-step accumulator decoupling simulation ticks from wall-clock
//! wakeups.

use crate::STALL_RESET_SECONDS;

/// Absorbs wall-clock jitter and hands out whole fixed steps.
///
/// Elapsed time accumulates until at least one full step is available;
/// the remainder carries into the next frame. A stall longer than the
/// reset threshold (window hidden, debugger pause, scheduler hiccup)
/// discards the backlog instead of burst-simulating it.
#[derive(Debug)]
pub struct FixedStep {
    step: f32,
    accumulated: f32,
    stall_reset: f32,
}

impl FixedStep {
    pub fn new(step: f32) -> Self {
        FixedStep {
            step,
            accumulated: 0.0,
            stall_reset: STALL_RESET_SECONDS,
        }
    }

    /// Feeds `elapsed` wall-clock seconds in and returns how many fixed
    /// steps to simulate now.
    pub fn advance(&mut self, elapsed: f32) -> u32 {
        self.accumulated += elapsed;

        if self.accumulated > self.stall_reset {
            self.accumulated = 0.0;
            return 0;
        }

        let mut steps = 0;
        while self.accumulated >= self.step {
            self.accumulated -= self.step;
            steps += 1;
        }
        steps
    }

    pub fn step_seconds(&self) -> f32 {
        self.step
    }
}
