//! Edge state machine
//!
//! Turns a stream of edges into pulse widths. Pure and synchronous; the
//! caller serializes access.

use serde::Serialize;

use contracts::{EdgeError, EdgeEvent, Level, PulseMeasurement};

/// Which edge the tracker is waiting for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MirrorState {
    /// No edge seen since start, reset or watchdog expiry
    #[default]
    AwaitingFirstEdge,
    /// Line went high at `rising_micros`, waiting for the falling edge
    HighPending { rising_micros: u64 },
    /// Line went low at `falling_micros`, waiting for the rising edge
    LowPending { falling_micros: u64 },
}

impl MirrorState {
    /// Pending level and the timestamp it was entered at
    pub fn pending(&self) -> Option<(Level, u64)> {
        match *self {
            MirrorState::AwaitingFirstEdge => None,
            MirrorState::HighPending { rising_micros } => Some((Level::High, rising_micros)),
            MirrorState::LowPending { falling_micros } => Some((Level::Low, falling_micros)),
        }
    }

    fn entered(level: Level, timestamp_micros: u64) -> Self {
        match level {
            Level::High => MirrorState::HighPending {
                rising_micros: timestamp_micros,
            },
            Level::Low => MirrorState::LowPending {
                falling_micros: timestamp_micros,
            },
        }
    }
}

/// Pairs opposite-polarity edges into measurements
#[derive(Debug, Clone, Default)]
pub struct EdgeTracker {
    state: MirrorState,
    /// Timestamp of the last accepted edge
    last_timestamp: Option<u64>,
}

impl EdgeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MirrorState {
        self.state
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.last_timestamp
    }

    /// Feed one edge.
    ///
    /// - `Ok(Some(_))`: the edge completed a pulse
    /// - `Ok(None)`: first edge, now pending
    /// - `Err(OutOfOrder)`: older than the last accepted edge, state untouched
    /// - `Err(DuplicatePolarity)`: same level as the pending edge; the
    ///   pending edge is re-armed at the new timestamp
    pub fn observe(&mut self, event: EdgeEvent) -> Result<Option<PulseMeasurement>, EdgeError> {
        let t = event.timestamp_micros;
        if let Some(last) = self.last_timestamp {
            if t < last {
                return Err(EdgeError::OutOfOrder {
                    level: event.level,
                    timestamp_micros: t,
                    last_micros: last,
                });
            }
        }
        self.last_timestamp = Some(t);

        let previous = self.state;
        self.state = MirrorState::entered(event.level, t);

        match previous.pending() {
            None => Ok(None),
            Some((pending, since)) if pending == event.level => {
                Err(EdgeError::DuplicatePolarity {
                    level: event.level,
                    previous_micros: since,
                    timestamp_micros: t,
                })
            }
            // t >= last >= since, so the width never underflows
            Some((pending, since)) => Ok(PulseMeasurement::between(pending, since, t)),
        }
    }

    /// Drop the pending edge, returning what was pending.
    ///
    /// Ordering is kept: edges older than the last accepted one are still
    /// rejected afterwards.
    pub fn expire(&mut self) -> Option<(Level, u64)> {
        let pending = self.state.pending();
        self.state = MirrorState::AwaitingFirstEdge;
        pending
    }

    /// Back to the initial state, forgetting the last timestamp
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_edge_has_no_measurement() {
        let mut tracker = EdgeTracker::new();
        assert_eq!(tracker.observe(EdgeEvent::rising(1000)), Ok(None));
        assert_eq!(
            tracker.state(),
            MirrorState::HighPending {
                rising_micros: 1000
            }
        );
    }

    #[test]
    fn test_high_pulse() {
        let mut tracker = EdgeTracker::new();
        tracker.observe(EdgeEvent::rising(1000)).unwrap();
        let m = tracker.observe(EdgeEvent::falling(1450)).unwrap().unwrap();

        assert_eq!(m.polarity, Level::High);
        assert_eq!(m.width_micros, 450);
        assert_eq!(
            tracker.state(),
            MirrorState::LowPending {
                falling_micros: 1450
            }
        );
    }

    #[test]
    fn test_low_pulse() {
        let mut tracker = EdgeTracker::new();
        tracker.observe(EdgeEvent::falling(200)).unwrap();
        let m = tracker.observe(EdgeEvent::rising(900)).unwrap().unwrap();

        assert_eq!(m.polarity, Level::Low);
        assert_eq!(m.width_micros, 700);
    }

    #[test]
    fn test_alternating_edges_give_one_measurement_each() {
        let mut tracker = EdgeTracker::new();
        let edges = [
            EdgeEvent::rising(0),
            EdgeEvent::falling(100),
            EdgeEvent::rising(300),
            EdgeEvent::falling(350),
            EdgeEvent::rising(1000),
        ];
        let widths: Vec<_> = edges
            .into_iter()
            .filter_map(|e| tracker.observe(e).unwrap())
            .map(|m| (m.polarity, m.width_micros))
            .collect();

        assert_eq!(
            widths,
            vec![
                (Level::High, 100),
                (Level::Low, 200),
                (Level::High, 50),
                (Level::Low, 650),
            ]
        );
    }

    #[test]
    fn test_zero_width_is_valid() {
        let mut tracker = EdgeTracker::new();
        tracker.observe(EdgeEvent::rising(500)).unwrap();
        let m = tracker.observe(EdgeEvent::falling(500)).unwrap().unwrap();
        assert_eq!(m.width_micros, 0);
    }

    #[test]
    fn test_duplicate_rearms() {
        let mut tracker = EdgeTracker::new();
        tracker.observe(EdgeEvent::rising(1000)).unwrap();
        let err = tracker.observe(EdgeEvent::rising(1200)).unwrap_err();

        assert_eq!(
            err,
            EdgeError::DuplicatePolarity {
                level: Level::High,
                previous_micros: 1000,
                timestamp_micros: 1200,
            }
        );
        assert_eq!(
            tracker.state(),
            MirrorState::HighPending {
                rising_micros: 1200
            }
        );

        // Width is measured from the re-armed edge
        let m = tracker.observe(EdgeEvent::falling(1500)).unwrap().unwrap();
        assert_eq!(m.width_micros, 300);
    }

    #[test]
    fn test_out_of_order_leaves_state() {
        let mut tracker = EdgeTracker::new();
        tracker.observe(EdgeEvent::rising(1000)).unwrap();
        let err = tracker.observe(EdgeEvent::falling(900)).unwrap_err();

        assert_eq!(err.kind(), "out_of_order");
        assert_eq!(
            tracker.state(),
            MirrorState::HighPending {
                rising_micros: 1000
            }
        );
        assert_eq!(tracker.last_timestamp(), Some(1000));
    }

    #[test]
    fn test_expire_keeps_ordering() {
        let mut tracker = EdgeTracker::new();
        tracker.observe(EdgeEvent::rising(1000)).unwrap();

        assert_eq!(tracker.expire(), Some((Level::High, 1000)));
        assert_eq!(tracker.state(), MirrorState::AwaitingFirstEdge);
        assert!(tracker.observe(EdgeEvent::falling(10)).is_err());

        // Next edge starts over without a measurement
        assert_eq!(tracker.observe(EdgeEvent::falling(2000)), Ok(None));
    }

    #[test]
    fn test_reset() {
        let mut tracker = EdgeTracker::new();
        tracker.observe(EdgeEvent::rising(1000)).unwrap();
        tracker.reset();

        assert_eq!(tracker.state(), MirrorState::AwaitingFirstEdge);
        assert_eq!(tracker.observe(EdgeEvent::rising(5)), Ok(None));
    }
}
