//! TriggerDispatcher - fan-out of one measurement to every output channel

use std::collections::HashSet;

use tokio::runtime::Handle;
use tracing::{debug, instrument, warn};

use contracts::{
    ChannelId, ChannelOptions, InitializationError, MirrorReport, MirrorSettings, OutputChannel,
    OutputLine, PulseMeasurement, Reporter,
};

use crate::handle::{ChannelHandle, ChannelSummary, TriggerRequest};
use crate::metrics::MetricsSnapshot;

/// Result of dispatching one measurement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Channels that accepted the trigger
    pub issued: usize,
    /// Channels that refused it
    pub rejected: usize,
    /// Output duration requested
    pub duration_micros: u64,
    /// Measurement filtered out by polarity
    pub skipped: bool,
}

/// Builder for creating a TriggerDispatcher
pub struct DispatcherBuilder {
    settings: MirrorSettings,
    reporter: Reporter,
    runtime: Handle,
    ids: HashSet<ChannelId>,
    handles: Vec<ChannelHandle>,
}

impl DispatcherBuilder {
    /// Channel workers will be spawned on `runtime`
    pub fn new(settings: MirrorSettings, reporter: Reporter, runtime: Handle) -> Self {
        Self {
            settings,
            reporter,
            runtime,
            ids: HashSet::new(),
            handles: Vec::new(),
        }
    }

    /// Add an output line and start its worker
    ///
    /// # Errors
    /// `DuplicateChannel` if a line with the same channel id was already added.
    #[instrument(
        name = "dispatcher_add_output",
        skip(self, line),
        fields(channel = %line.channel_id())
    )]
    pub fn add_output<L: OutputLine + Send + 'static>(
        &mut self,
        line: L,
        options: ChannelOptions,
    ) -> Result<&mut Self, InitializationError> {
        let id = line.channel_id().clone();
        if !self.ids.insert(id.clone()) {
            return Err(InitializationError::DuplicateChannel { channel: id });
        }
        let handle = ChannelHandle::spawn_on(line, options, self.reporter.clone(), &self.runtime);
        self.handles.push(handle);
        Ok(self)
    }

    pub fn build(self) -> TriggerDispatcher {
        TriggerDispatcher::with_handles(self.handles, self.settings, self.reporter)
    }
}

/// Fans measurements out to channel workers
pub struct TriggerDispatcher {
    handles: Vec<ChannelHandle>,
    settings: MirrorSettings,
    reporter: Reporter,
}

impl TriggerDispatcher {
    /// Create a dispatcher from already-running channel handles
    pub fn with_handles(
        handles: Vec<ChannelHandle>,
        settings: MirrorSettings,
        reporter: Reporter,
    ) -> Self {
        Self {
            handles,
            settings,
            reporter,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.handles.len()
    }

    pub fn settings(&self) -> &MirrorSettings {
        &self.settings
    }

    /// Current state of every channel, in configuration order
    pub fn channels(&self) -> Vec<OutputChannel> {
        self.handles.iter().map(ChannelHandle::snapshot).collect()
    }

    /// Metrics for all channels
    pub fn metrics(&self) -> Vec<(ChannelId, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.id().clone(), h.metrics().snapshot()))
            .collect()
    }

    /// Request a `width x scale` pulse on every channel
    ///
    /// Never waits for a pulse. A channel that refuses the trigger is reported
    /// and skipped; the remaining channels are still triggered.
    pub fn dispatch(&self, measurement: &PulseMeasurement) -> DispatchOutcome {
        let duration_micros = self.settings.scaled_duration(measurement.width_micros);
        let mut outcome = DispatchOutcome {
            duration_micros,
            ..Default::default()
        };

        if !self.settings.polarity.accepts(measurement.polarity) {
            debug!(polarity = %measurement.polarity, "Measurement filtered by polarity");
            outcome.skipped = true;
            return outcome;
        }

        let request = TriggerRequest {
            duration_micros,
            measured_at_micros: measurement.completed_at_micros,
        };

        for handle in &self.handles {
            match handle.try_trigger(request) {
                Ok(()) => outcome.issued += 1,
                Err(e) => {
                    outcome.rejected += 1;
                    observability::record_trigger_result(handle.id(), e.kind());
                    warn!(channel = %handle.id(), error = %e, "Trigger refused");
                    self.reporter.emit(MirrorReport::TriggerFailed {
                        channel: handle.id().clone(),
                        error: e,
                    });
                }
            }
        }

        outcome
    }

    /// Shut every channel down, letting admitted pulses finish
    ///
    /// Returns each channel's final state, in configuration order.
    #[instrument(name = "dispatcher_shutdown", skip(self), fields(channels = self.handles.len()))]
    pub async fn shutdown(self) -> Vec<ChannelSummary> {
        let mut summaries = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            summaries.push(handle.shutdown().await);
        }
        debug!("Dispatcher shutdown complete");
        summaries
    }
}
