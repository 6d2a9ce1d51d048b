//! PulseMirror - edge input to timed output pulses
//!
//! One mutex serializes edge deliveries from any thread. Measurements are
//! handed to the dispatcher, which never waits on an output line, so
//! `on_edge` returns as soon as the state transition is done.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use contracts::{
    ChannelId, ChannelOptions, EdgeError, EdgeEvent, EdgeSource, InitializationError,
    MirrorReport, MirrorSettings, OutputChannel, OutputLine, Reporter, SubscriptionHandle,
};
use dispatcher::{ChannelSummary, DispatcherBuilder, MetricsSnapshot, TriggerDispatcher};

use crate::tracker::{EdgeTracker, MirrorState};

struct Inner {
    tracker: EdgeTracker,
    /// None after shutdown
    dispatcher: Option<TriggerDispatcher>,
    watchdog: Option<JoinHandle<()>>,
    /// Bumped whenever the watchdog is re-armed or cancelled. A timer whose
    /// generation no longer matches has been superseded.
    generation: u64,
}

struct Shared {
    inner: Mutex<Inner>,
    settings: MirrorSettings,
    reporter: Reporter,
    runtime: Handle,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expire(&self, generation: u64, timeout: Duration) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }
        inner.watchdog = None;

        if let Some((pending, since)) = inner.tracker.expire() {
            let timeout_micros = timeout.as_micros() as u64;
            observability::record_watchdog_expired(pending);
            warn!(
                pending = %pending,
                pending_since_micros = since,
                timeout_micros,
                "Watchdog expired, waiting for a new first edge"
            );
            self.reporter.emit(MirrorReport::WatchdogExpired {
                pending,
                pending_since_micros: since,
                timeout_micros,
            });
        }
    }
}

/// Measures pulses on one input and mirrors them on every output channel
///
/// Cheap to clone; clones share the same state machine and channels.
#[derive(Clone)]
pub struct PulseMirror {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for PulseMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseMirror")
            .field("state", &self.state())
            .field("settings", &self.shared.settings)
            .finish()
    }
}

impl PulseMirror {
    /// Start building a mirror whose workers and watchdog run on the current
    /// tokio runtime.
    ///
    /// # Errors
    /// `NoRuntime` when called outside a tokio runtime.
    pub fn builder(
        settings: MirrorSettings,
        reporter: Reporter,
    ) -> Result<PulseMirrorBuilder, InitializationError> {
        let runtime = Handle::try_current().map_err(|e| InitializationError::NoRuntime {
            message: e.to_string(),
        })?;
        Ok(Self::builder_on(settings, reporter, runtime))
    }

    /// Start building a mirror on an explicit runtime
    pub fn builder_on(
        settings: MirrorSettings,
        reporter: Reporter,
        runtime: Handle,
    ) -> PulseMirrorBuilder {
        PulseMirrorBuilder {
            outputs: DispatcherBuilder::new(settings.clone(), reporter.clone(), runtime.clone()),
            settings,
            reporter,
            runtime,
        }
    }

    /// Process one edge
    ///
    /// Callable from any thread. Outcomes go to the reporter; nothing is
    /// returned to the edge source. Report callbacks run while the state lock
    /// is held and must not call back into the mirror.
    pub fn on_edge(&self, event: EdgeEvent) {
        observability::record_edge_received(event.level);
        let mut inner = self.shared.lock();

        if inner.dispatcher.is_none() {
            debug!(level = %event.level, "Edge after shutdown ignored");
            return;
        }

        match inner.tracker.observe(event) {
            Ok(measurement) => {
                self.arm_watchdog(&mut inner);
                if let Some(m) = measurement {
                    observability::record_measurement(&m);
                    debug!(
                        polarity = %m.polarity,
                        width_micros = m.width_micros,
                        "Pulse measured"
                    );
                    self.shared.reporter.emit(MirrorReport::Measured(m));
                    if let Some(dispatcher) = &inner.dispatcher {
                        let outcome = dispatcher.dispatch(&m);
                        if !outcome.skipped {
                            observability::record_dispatch(
                                outcome.duration_micros,
                                outcome.issued,
                                outcome.rejected,
                            );
                            debug!(
                                issued = outcome.issued,
                                rejected = outcome.rejected,
                                duration_us = outcome.duration_micros,
                                "Measurement dispatched"
                            );
                        }
                    }
                }
            }
            Err(e) => {
                if matches!(e, EdgeError::DuplicatePolarity { .. }) {
                    self.arm_watchdog(&mut inner);
                }
                observability::record_edge_rejected(&e);
                warn!(error = %e, "Edge rejected");
                self.shared.reporter.emit(MirrorReport::EdgeRejected(e));
            }
        }
    }

    /// Subscribe to an edge source
    ///
    /// The subscription holds a weak reference: once every `PulseMirror`
    /// clone is dropped, further edges are ignored. Call
    /// [`EdgeSource::unsubscribe`] with the returned handle to detach.
    pub fn subscribe_to<S: EdgeSource + ?Sized>(&self, source: &S) -> SubscriptionHandle {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let handle = source.subscribe_edges(Arc::new(move |event: EdgeEvent| {
            if let Some(shared) = weak.upgrade() {
                PulseMirror { shared }.on_edge(event);
            }
        }));
        info!(line = source.line(), id = handle.id, "Subscribed to edge source");
        handle
    }

    pub fn state(&self) -> MirrorState {
        self.shared.lock().tracker.state()
    }

    pub fn settings(&self) -> &MirrorSettings {
        &self.shared.settings
    }

    /// Output channels with their last successful trigger, in configuration
    /// order. Empty after shutdown.
    pub fn channels(&self) -> Vec<OutputChannel> {
        self.shared
            .lock()
            .dispatcher
            .as_ref()
            .map(TriggerDispatcher::channels)
            .unwrap_or_default()
    }

    pub fn channel_metrics(&self) -> Vec<(ChannelId, MetricsSnapshot)> {
        self.shared
            .lock()
            .dispatcher
            .as_ref()
            .map(TriggerDispatcher::metrics)
            .unwrap_or_default()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.lock().dispatcher.is_none()
    }

    /// Stop accepting edges, cancel the watchdog and wait for admitted pulses
    /// to finish. The state machine is reset.
    ///
    /// Returns the final state of every channel; empty if already shut down.
    #[instrument(name = "pulse_mirror_shutdown", skip(self))]
    pub async fn shutdown(&self) -> Vec<ChannelSummary> {
        let dispatcher = {
            let mut inner = self.shared.lock();
            inner.generation += 1;
            if let Some(watchdog) = inner.watchdog.take() {
                watchdog.abort();
            }
            inner.tracker.reset();
            inner.dispatcher.take()
        };

        match dispatcher {
            Some(dispatcher) => {
                let summaries = dispatcher.shutdown().await;
                info!("Pulse mirror shut down");
                summaries
            }
            None => Vec::new(),
        }
    }

    /// Cancel any running timer and start a new one for the current pending
    /// state
    fn arm_watchdog(&self, inner: &mut Inner) {
        inner.generation += 1;
        if let Some(previous) = inner.watchdog.take() {
            previous.abort();
        }

        let Some(timeout) = self.shared.settings.watchdog_timeout() else {
            return;
        };
        if inner.tracker.state().pending().is_none() {
            return;
        }

        let generation = inner.generation;
        let weak = Arc::downgrade(&self.shared);
        inner.watchdog = Some(self.shared.runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(shared) = weak.upgrade() {
                shared.expire(generation, timeout);
            }
        }));
    }
}

/// Builder for [`PulseMirror`]
pub struct PulseMirrorBuilder {
    outputs: DispatcherBuilder,
    settings: MirrorSettings,
    reporter: Reporter,
    runtime: Handle,
}

impl PulseMirrorBuilder {
    /// Add an output channel
    ///
    /// # Errors
    /// `DuplicateChannel` if the line's channel id is already configured.
    pub fn add_output<L: OutputLine + Send + 'static>(
        &mut self,
        line: L,
        options: ChannelOptions,
    ) -> Result<&mut Self, InitializationError> {
        self.outputs.add_output(line, options)?;
        Ok(self)
    }

    pub fn build(self) -> PulseMirror {
        let dispatcher = self.outputs.build();
        info!(
            channels = dispatcher.channel_count(),
            scale = self.settings.scale,
            watchdog_timeout_us = ?self.settings.watchdog_timeout_us,
            polarity = ?self.settings.polarity,
            "Pulse mirror ready"
        );

        PulseMirror {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    tracker: EdgeTracker::new(),
                    dispatcher: Some(dispatcher),
                    watchdog: None,
                    generation: 0,
                }),
                settings: self.settings,
                reporter: self.reporter,
                runtime: self.runtime,
            }),
        }
    }
}
