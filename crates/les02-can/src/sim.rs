//! In-process buses for running the listener without CAN hardware.
//!
//! * [`SimulatedBus`] – an LES02 position generator that alternates master
//!   and slave frames at a fixed period, like the bench mock.
//! * [`ScriptedBus`] – replays an exact list of frames and then either
//!   closes or fails.  Used by tests across the workspace.

use std::collections::VecDeque;
use std::time::Duration;

use les02_types::{Les02Error, POSITION_MAX};

use crate::source::{BusTransport, RawFrame};

/// Master position identifier emitted by the simulator.
pub const SIM_MASTER_ID: u32 = 0x80;
/// Slave position identifier emitted by the simulator.
pub const SIM_SLAVE_ID: u32 = 0x81;

const DEFAULT_PERIOD: Duration = Duration::from_millis(2);

// ────────────────────────────────────────────────────────────────────────────
// SimulatedBus
// ────────────────────────────────────────────────────────────────────────────

/// Generates position frames forever (or up to a limit).
///
/// Each frame advances the 24-bit position by one (wrapping after
/// `0xFFFFFF`) and alternates between [`SIM_MASTER_ID`] and
/// [`SIM_SLAVE_ID`].  The payload is `[msb, mid, lsb, 0x00]`.
///
/// # Example
///
/// ```rust
/// use les02_can::{BusTransport, SimulatedBus};
/// use std::time::Duration;
///
/// let mut bus = SimulatedBus::new().with_period(Duration::ZERO).with_limit(2);
/// assert_eq!(bus.recv().unwrap().unwrap().payload, vec![0, 0, 1, 0]);
/// assert_eq!(bus.recv().unwrap().unwrap().identifier, 0x81);
/// assert!(bus.recv().unwrap().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct SimulatedBus {
    position: u32,
    next_is_master: bool,
    period: Duration,
    remaining: Option<u64>,
    started: bool,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self {
            position: 0,
            next_is_master: true,
            period: DEFAULT_PERIOD,
            remaining: None,
            started: false,
        }
    }

    /// Delay between consecutive frames (builder-style).
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Close cleanly after `frames` frames (builder-style).
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.remaining = Some(frames);
        self
    }

    /// Start counting from `position` instead of zero (builder-style).
    pub fn starting_at(mut self, position: u32) -> Self {
        self.position = position & POSITION_MAX;
        self
    }
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BusTransport for SimulatedBus {
    fn recv(&mut self) -> Result<Option<RawFrame>, Les02Error> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Ok(None);
            }
            *remaining -= 1;
        }

        if self.started && !self.period.is_zero() {
            std::thread::sleep(self.period);
        }
        self.started = true;

        let identifier = if self.next_is_master { SIM_MASTER_ID } else { SIM_SLAVE_ID };
        self.next_is_master = !self.next_is_master;

        self.position = (self.position + 1) & POSITION_MAX;
        let [_, msb, mid, lsb] = self.position.to_be_bytes();

        Ok(Some(RawFrame::new(identifier, &[msb, mid, lsb, 0x00])))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ScriptedBus
// ────────────────────────────────────────────────────────────────────────────

/// Replays a fixed list of frames without blocking.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBus {
    frames: VecDeque<RawFrame>,
    failure: Option<String>,
}

impl ScriptedBus {
    pub fn new(frames: Vec<RawFrame>) -> Self {
        Self {
            frames: frames.into(),
            failure: None,
        }
    }

    /// End with [`Les02Error::Transport`] instead of a clean close.
    pub fn then_fail(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }
}

impl BusTransport for ScriptedBus {
    fn recv(&mut self) -> Result<Option<RawFrame>, Les02Error> {
        if let Some(frame) = self.frames.pop_front() {
            return Ok(Some(frame));
        }
        match self.failure.take() {
            Some(reason) => Err(Les02Error::Transport(reason)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::decode_position;

    fn fast(limit: u64) -> SimulatedBus {
        SimulatedBus::new().with_period(Duration::ZERO).with_limit(limit)
    }

    #[test]
    fn simulator_alternates_channels() {
        let mut bus = fast(4);
        let ids: Vec<u32> = std::iter::from_fn(|| bus.recv().unwrap())
            .map(|f| f.identifier)
            .collect();
        assert_eq!(ids, vec![0x80, 0x81, 0x80, 0x81]);
    }

    #[test]
    fn simulator_counts_up_in_big_endian() {
        let mut bus = fast(3).starting_at(0x0000FF);
        let positions: Vec<u32> = std::iter::from_fn(|| bus.recv().unwrap())
            .map(|f| {
                assert_eq!(f.len(), 4);
                assert_eq!(f.payload[3], 0x00);
                decode_position(&f.payload).unwrap()
            })
            .collect();
        assert_eq!(positions, vec![0x000100, 0x000101, 0x000102]);
    }

    #[test]
    fn simulator_wraps_at_24_bits() {
        let mut bus = fast(2).starting_at(POSITION_MAX - 1);
        let first = bus.recv().unwrap().unwrap();
        let second = bus.recv().unwrap().unwrap();
        assert_eq!(decode_position(&first.payload).unwrap(), POSITION_MAX);
        assert_eq!(decode_position(&second.payload).unwrap(), 0);
    }

    #[test]
    fn simulator_closes_after_limit() {
        let mut bus = fast(1);
        assert!(bus.recv().unwrap().is_some());
        assert!(bus.recv().unwrap().is_none());
        assert!(bus.recv().unwrap().is_none());
    }

    #[test]
    fn scripted_bus_fails_once_then_closes() {
        let mut bus = ScriptedBus::new(vec![RawFrame::new(0x10, &[1])]).then_fail("boom");
        assert_eq!(bus.recv().unwrap(), Some(RawFrame::new(0x10, &[1])));
        assert!(matches!(bus.recv(), Err(Les02Error::Transport(_))));
        assert!(bus.recv().unwrap().is_none());
    }
}
