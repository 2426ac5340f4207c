//! Input sequencing and pluggable direction sources.
//!
//! Keyboard polling belongs to the embedding application; the core only
//! sees a [`DirectionSet`] per fixed tick. The tracker turns non-idle
//! samples into sequenced commands; idle ticks produce neither a command
//! nor a frame on the wire.

use shared::protocol::{DirectionSet, InputCommand};

/// Assigns monotonically increasing sequence numbers to sampled input.
/// The counter lives for the whole connection and is never reset, even
/// across match restarts.
pub struct InputTracker {
    last_sequence: u32,
}

impl InputTracker {
    pub fn new() -> Self {
        InputTracker { last_sequence: 0 }
    }

    /// One fixed tick worth of input. Returns `None` when no direction is
    /// active — nothing is enqueued and nothing is sent for idle ticks.
    pub fn tick(&mut self, directions: DirectionSet, issued_at: Option<f32>) -> Option<InputCommand> {
        if directions.is_empty() {
            return None;
        }

        self.last_sequence += 1;
        Some(InputCommand {
            directions,
            sequence: self.last_sequence,
            issued_at,
        })
    }

    pub fn last_sequence(&self) -> u32 {
        self.last_sequence
    }
}

impl Default for InputTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Supplies the direction sample for each fixed tick.
pub trait DirectionSource {
    fn sample(&mut self) -> DirectionSet;
}

/// Never presses anything. Default for a headless client.
pub struct IdleSource;

impl DirectionSource for IdleSource {
    fn sample(&mut self) -> DirectionSet {
        DirectionSet::default()
    }
}

/// Plays back a fixed script of direction holds, then goes idle.
///
/// Script syntax: comma-separated `<keys>:<ticks>` steps, where `<keys>`
/// is any combination of `l`, `r`, `u`, `d`, or `.` for an idle stretch.
/// `"l:40,.:20,r:40"` holds left for 40 ticks, rests 20, then holds right
/// for 40.
pub struct ScriptedSource {
    steps: Vec<(DirectionSet, u32)>,
    index: usize,
    remaining: u32,
}

impl ScriptedSource {
    pub fn parse(script: &str) -> Result<Self, String> {
        let mut steps = Vec::new();

        for step in script.split(',').filter(|s| !s.is_empty()) {
            let (keys, count) = step
                .split_once(':')
                .ok_or_else(|| format!("script step `{}` is missing `:<ticks>`", step))?;

            let mut directions = DirectionSet::default();
            for key in keys.chars() {
                match key {
                    'l' => directions.left = true,
                    'r' => directions.right = true,
                    'u' => directions.up = true,
                    'd' => directions.down = true,
                    '.' => {}
                    other => return Err(format!("unknown key `{}` in script", other)),
                }
            }

            let ticks: u32 = count
                .parse()
                .map_err(|_| format!("bad tick count `{}` in script", count))?;
            if ticks > 0 {
                steps.push((directions, ticks));
            }
        }

        let remaining = steps.first().map(|(_, ticks)| *ticks).unwrap_or(0);
        Ok(ScriptedSource {
            steps,
            index: 0,
            remaining,
        })
    }
}

impl DirectionSource for ScriptedSource {
    fn sample(&mut self) -> DirectionSet {
        while self.index < self.steps.len() && self.remaining == 0 {
            self.index += 1;
            if let Some((_, ticks)) = self.steps.get(self.index) {
                self.remaining = *ticks;
            }
        }

        match self.steps.get(self.index) {
            Some((directions, _)) if self.remaining > 0 => {
                self.remaining -= 1;
                *directions
            }
            _ => DirectionSet::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held(left: bool, right: bool) -> DirectionSet {
        DirectionSet {
            left,
            right,
            ..DirectionSet::default()
        }
    }

    #[test]
    fn idle_ticks_emit_nothing() {
        let mut tracker = InputTracker::new();
        assert!(tracker.tick(DirectionSet::default(), None).is_none());
        assert_eq!(tracker.last_sequence(), 0);
    }

    #[test]
    fn sequences_are_strictly_increasing() {
        let mut tracker = InputTracker::new();
        let mut previous = 0;
        for i in 0..50 {
            // Interleave idle ticks; they must not consume sequence numbers.
            if i % 3 == 0 {
                assert!(tracker.tick(DirectionSet::default(), None).is_none());
                continue;
            }
            let command = tracker.tick(held(true, false), None).unwrap();
            assert!(command.sequence > previous);
            previous = command.sequence;
        }
    }

    #[test]
    fn tick_stamps_the_issue_time() {
        let mut tracker = InputTracker::new();
        let command = tracker.tick(held(false, true), Some(1.5)).unwrap();
        assert_eq!(command.issued_at, Some(1.5));
        assert_eq!(command.sequence, 1);
    }

    #[test]
    fn scripted_source_plays_steps_then_idles() {
        let mut source = ScriptedSource::parse("l:2,.:1,r:1").unwrap();
        assert!(source.sample().left);
        assert!(source.sample().left);
        assert!(source.sample().is_empty());
        assert!(source.sample().right);
        // Script exhausted: idle forever.
        assert!(source.sample().is_empty());
        assert!(source.sample().is_empty());
    }

    #[test]
    fn scripted_source_combines_keys() {
        let mut source = ScriptedSource::parse("lu:1").unwrap();
        let directions = source.sample();
        assert!(directions.left && directions.up);
    }

    #[test]
    fn scripted_source_rejects_malformed_steps() {
        assert!(ScriptedSource::parse("l").is_err());
        assert!(ScriptedSource::parse("x:3").is_err());
        assert!(ScriptedSource::parse("l:abc").is_err());
    }
}
