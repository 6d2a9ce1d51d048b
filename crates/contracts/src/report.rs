//! MirrorReport - side channel for per-event outcomes
//!
//! Nothing on the edge path returns errors to the edge source. Outcomes are
//! pushed to registered callbacks instead.

use std::fmt;
use std::sync::Arc;

use crate::{ChannelId, EdgeError, Level, PulseMeasurement, TriggerError};

/// Outcome of processing an edge or running a trigger
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorReport {
    /// A pulse completed
    Measured(PulseMeasurement),

    /// An edge was rejected
    EdgeRejected(EdgeError),

    /// A channel finished driving a pulse
    Triggered {
        channel: ChannelId,
        duration_micros: u64,
        measured_at_micros: u64,
    },

    /// A channel could not drive a pulse
    TriggerFailed {
        channel: ChannelId,
        error: TriggerError,
    },

    /// The watchdog returned a pending state to idle
    WatchdogExpired {
        pending: Level,
        pending_since_micros: u64,
        timeout_micros: u64,
    },
}

impl MirrorReport {
    pub fn measurement(&self) -> Option<&PulseMeasurement> {
        match self {
            MirrorReport::Measured(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            MirrorReport::EdgeRejected(_) | MirrorReport::TriggerFailed { .. }
        )
    }
}

/// Report callback type
pub type ReportCallback = Arc<dyn Fn(&MirrorReport) + Send + Sync>;

/// Fan-out of reports to every registered callback
#[derive(Clone, Default)]
pub struct Reporter {
    callbacks: Vec<ReportCallback>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register another callback
    pub fn subscribe(&mut self, callback: ReportCallback) {
        self.callbacks.push(callback);
    }

    /// Builder form of [`Reporter::subscribe`]
    pub fn with(mut self, callback: ReportCallback) -> Self {
        self.subscribe(callback);
        self
    }

    pub fn emit(&self, report: MirrorReport) {
        for callback in &self.callbacks {
            callback(&report);
        }
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_reporter_fans_out() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let a = Arc::clone(&seen);
        let b = Arc::clone(&seen);
        let reporter = Reporter::new()
            .with(Arc::new(move |r: &MirrorReport| a.lock().unwrap().push(r.clone())))
            .with(Arc::new(move |r: &MirrorReport| b.lock().unwrap().push(r.clone())));

        let m = PulseMeasurement::between(Level::High, 0, 10).unwrap();
        reporter.emit(MirrorReport::Measured(m));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].measurement(), Some(&m));
    }
}
