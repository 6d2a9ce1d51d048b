//! Simulated output line
//!
//! Implements `OutputLine`: drives a shared level high for the requested
//! duration, then low. An [`OutputProbe`] observes the line from tests and
//! injects faults.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use contracts::{ChannelId, LineOffset, OutputLine, TriggerError};
use tracing::{instrument, trace};

#[derive(Debug, Default)]
struct ProbeShared {
    level: AtomicBool,
    pulses: Mutex<Vec<u64>>,
    unavailable: AtomicBool,
    fail_next: AtomicU32,
    overlaps: AtomicU64,
}

/// Observer and fault injector for one simulated output line
#[derive(Clone, Debug, Default)]
pub struct OutputProbe {
    shared: Arc<ProbeShared>,
}

impl OutputProbe {
    /// Current line level (true = driven)
    pub fn is_high(&self) -> bool {
        self.shared.level.load(Ordering::SeqCst)
    }

    /// Durations of completed pulses, in order
    pub fn pulses(&self) -> Vec<u64> {
        self.shared.pulses.lock().unwrap().clone()
    }

    pub fn pulse_count(&self) -> usize {
        self.shared.pulses.lock().unwrap().len()
    }

    /// Pulses that started while the line was already driven
    pub fn overlaps(&self) -> u64 {
        self.shared.overlaps.load(Ordering::Relaxed)
    }

    /// Make every trigger fail until cleared
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make the next `count` triggers fail
    pub fn fail_next(&self, count: u32) {
        self.shared.fail_next.store(count, Ordering::SeqCst);
    }

    fn take_fault(&self) -> Option<&'static str> {
        if self.shared.unavailable.load(Ordering::SeqCst) {
            return Some("line unavailable");
        }
        self.shared
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()
            .map(|_| "injected fault")
    }
}

/// Simulated output line bound to a channel
#[derive(Debug)]
pub struct SimulatedOutputLine {
    channel: ChannelId,
    line: LineOffset,
    probe: OutputProbe,
}

impl SimulatedOutputLine {
    pub fn new(channel: ChannelId, line: LineOffset) -> Self {
        Self {
            channel,
            line,
            probe: OutputProbe::default(),
        }
    }

    pub fn line(&self) -> LineOffset {
        self.line
    }

    /// Probe sharing this line's state
    pub fn probe(&self) -> OutputProbe {
        self.probe.clone()
    }
}

impl OutputLine for SimulatedOutputLine {
    fn channel_id(&self) -> &ChannelId {
        &self.channel
    }

    #[instrument(
        level = "trace",
        name = "sim_output_trigger",
        skip(self),
        fields(channel = %self.channel, line = self.line)
    )]
    async fn trigger_output(&mut self, duration_micros: u64) -> Result<(), TriggerError> {
        if let Some(reason) = self.probe.take_fault() {
            return Err(TriggerError::unavailable(&self.channel, reason));
        }

        let shared = &self.probe.shared;
        if shared.level.swap(true, Ordering::SeqCst) {
            shared.overlaps.fetch_add(1, Ordering::Relaxed);
        }
        if duration_micros > 0 {
            tokio::time::sleep(Duration::from_micros(duration_micros)).await;
        }
        shared.level.store(false, Ordering::SeqCst);
        shared.pulses.lock().unwrap().push(duration_micros);

        trace!(duration_us = duration_micros, "pulse complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_pulse_drives_line_for_duration() {
        let mut line = SimulatedOutputLine::new("out".into(), 4);
        let probe = line.probe();

        let task = tokio::spawn(async move {
            line.trigger_output(450).await.unwrap();
        });

        tokio::task::yield_now().await;
        assert!(probe.is_high());

        tokio::time::advance(Duration::from_micros(450)).await;
        task.await.unwrap();

        assert!(!probe.is_high());
        assert_eq!(probe.pulses(), vec![450]);
        assert_eq!(probe.overlaps(), 0);
    }

    #[tokio::test]
    async fn test_zero_duration_pulse_is_recorded() {
        let mut line = SimulatedOutputLine::new("out".into(), 4);
        line.trigger_output(0).await.unwrap();
        assert_eq!(line.probe().pulses(), vec![0]);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let mut line = SimulatedOutputLine::new("out".into(), 4);
        let probe = line.probe();

        probe.fail_next(1);
        let err = line.trigger_output(10).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(line.trigger_output(10).await.is_ok());

        probe.set_unavailable(true);
        assert!(line.trigger_output(10).await.is_err());
        assert_eq!(probe.pulse_count(), 1);
    }
}
