//! ChannelHandle - one output channel with its own queue and worker task
//!
//! The edge path only ever calls [`ChannelHandle::try_trigger`], which never
//! waits. The worker drives the line and reports the outcome.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{
    BusyPolicy, ChannelId, ChannelOptions, MirrorReport, OutputChannel, OutputLine, Reporter,
    TriggerError,
};

use crate::metrics::{ChannelMetrics, MetricsSnapshot};

/// One pulse to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerRequest {
    /// How long to hold the line active
    pub duration_micros: u64,
    /// Completing-edge timestamp of the measurement behind this pulse
    pub measured_at_micros: u64,
}

/// Final state of a channel after shutdown
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSummary {
    pub channel: OutputChannel,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug)]
struct ChannelState {
    /// A pulse is being driven (or, under `Reject`, has been admitted)
    active: AtomicBool,
    /// Completing-edge timestamp of the last successful pulse
    last_trigger_micros: Mutex<Option<u64>>,
}

impl ChannelState {
    fn last_trigger(&self) -> Option<u64> {
        *self
            .last_trigger_micros
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn record_trigger(&self, measured_at_micros: u64) {
        *self
            .last_trigger_micros
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(measured_at_micros);
    }
}

/// Handle to a running channel worker
pub struct ChannelHandle {
    id: ChannelId,
    options: ChannelOptions,
    tx: mpsc::Sender<TriggerRequest>,
    state: Arc<ChannelState>,
    metrics: Arc<ChannelMetrics>,
    worker_handle: JoinHandle<()>,
}

impl ChannelHandle {
    /// Spawn the worker on the current tokio runtime
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime; use [`ChannelHandle::spawn_on`] otherwise.
    pub fn spawn<L: OutputLine + Send + 'static>(
        line: L,
        options: ChannelOptions,
        reporter: Reporter,
    ) -> Self {
        Self::spawn_on(line, options, reporter, &Handle::current())
    }

    /// Spawn the worker on the given runtime
    pub fn spawn_on<L: OutputLine + Send + 'static>(
        line: L,
        options: ChannelOptions,
        reporter: Reporter,
        runtime: &Handle,
    ) -> Self {
        let id = line.channel_id().clone();
        let capacity = match options.busy_policy {
            BusyPolicy::Reject => 1,
            BusyPolicy::Queue => options.queue_capacity.max(1),
        };
        let (tx, rx) = mpsc::channel(capacity);
        let state = Arc::new(ChannelState {
            active: AtomicBool::new(false),
            last_trigger_micros: Mutex::new(None),
        });
        let metrics = Arc::new(ChannelMetrics::new());

        let worker = ChannelWorker {
            line,
            id: id.clone(),
            max_retries: options.max_retries,
            state: Arc::clone(&state),
            metrics: Arc::clone(&metrics),
            reporter,
        };
        let worker_handle = runtime.spawn(worker.run(rx));

        Self {
            id,
            options,
            tx,
            state,
            metrics,
            worker_handle,
        }
    }

    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    pub fn options(&self) -> ChannelOptions {
        self.options
    }

    pub fn metrics(&self) -> &Arc<ChannelMetrics> {
        &self.metrics
    }

    /// Whether a pulse is currently admitted or running
    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::SeqCst)
    }

    pub fn last_trigger_micros(&self) -> Option<u64> {
        self.state.last_trigger()
    }

    pub fn snapshot(&self) -> OutputChannel {
        OutputChannel {
            id: self.id.clone(),
            last_trigger_micros: self.last_trigger_micros(),
        }
    }

    /// Hand a pulse to the worker without waiting
    ///
    /// # Errors
    /// - `Busy`: reject policy and a pulse is still active
    /// - `QueueFull`: queue policy and `queue_capacity` pulses are pending
    /// - `Closed`: the worker has stopped
    pub fn try_trigger(&self, request: TriggerRequest) -> Result<(), TriggerError> {
        let result = match self.options.busy_policy {
            BusyPolicy::Reject => self.admit_exclusive(request),
            BusyPolicy::Queue => self.enqueue(request),
        };
        match &result {
            Ok(()) => self
                .metrics
                .set_queue_len(self.tx.max_capacity() - self.tx.capacity()),
            Err(_) => self.metrics.inc_rejected_count(),
        }
        result
    }

    fn admit_exclusive(&self, request: TriggerRequest) -> Result<(), TriggerError> {
        if self
            .state
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(TriggerError::Busy {
                channel: self.id.clone(),
            });
        }
        self.tx.try_send(request).map_err(|e| {
            self.state.active.store(false, Ordering::SeqCst);
            self.send_error(e)
        })
    }

    fn enqueue(&self, request: TriggerRequest) -> Result<(), TriggerError> {
        self.tx.try_send(request).map_err(|e| self.send_error(e))
    }

    fn send_error(&self, err: mpsc::error::TrySendError<TriggerRequest>) -> TriggerError {
        match err {
            mpsc::error::TrySendError::Full(_) => TriggerError::QueueFull {
                channel: self.id.clone(),
                capacity: self.tx.max_capacity(),
            },
            mpsc::error::TrySendError::Closed(_) => {
                error!(channel = %self.id, "Channel worker closed unexpectedly");
                TriggerError::Closed {
                    channel: self.id.clone(),
                }
            }
        }
    }

    /// Stop accepting pulses and wait for queued ones to finish
    ///
    /// Returns the channel's final state once the worker has drained.
    #[instrument(name = "channel_handle_shutdown", skip(self), fields(channel = %self.id))]
    pub async fn shutdown(self) -> ChannelSummary {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(channel = %self.id, error = ?e, "Worker task panicked");
        }
        debug!(channel = %self.id, "ChannelHandle shutdown complete");

        ChannelSummary {
            channel: OutputChannel {
                last_trigger_micros: self.state.last_trigger(),
                id: self.id,
            },
            metrics: self.metrics.snapshot(),
        }
    }
}

struct ChannelWorker<L> {
    line: L,
    id: ChannelId,
    max_retries: u32,
    state: Arc<ChannelState>,
    metrics: Arc<ChannelMetrics>,
    reporter: Reporter,
}

impl<L: OutputLine> ChannelWorker<L> {
    #[instrument(name = "channel_worker_loop", skip(self, rx), fields(channel = %self.id))]
    async fn run(mut self, mut rx: mpsc::Receiver<TriggerRequest>) {
        debug!("Channel worker started");

        while let Some(request) = rx.recv().await {
            self.metrics.set_queue_len(rx.len());
            self.state.active.store(true, Ordering::SeqCst);

            match self.drive(request.duration_micros).await {
                Ok(()) => {
                    self.state.record_trigger(request.measured_at_micros);
                    self.metrics.inc_trigger_count();
                    observability::record_trigger_result(&self.id, "success");
                    self.reporter.emit(MirrorReport::Triggered {
                        channel: self.id.clone(),
                        duration_micros: request.duration_micros,
                        measured_at_micros: request.measured_at_micros,
                    });
                }
                Err(e) => {
                    self.metrics.inc_failure_count();
                    observability::record_trigger_result(&self.id, e.kind());
                    warn!(
                        duration_us = request.duration_micros,
                        error = %e,
                        "Trigger failed"
                    );
                    // keep serving; one bad pulse must not take the channel down
                    self.reporter.emit(MirrorReport::TriggerFailed {
                        channel: self.id.clone(),
                        error: e,
                    });
                }
            }

            self.state.active.store(false, Ordering::SeqCst);
        }

        debug!("Channel worker stopped");
    }

    async fn drive(&mut self, duration_micros: u64) -> Result<(), TriggerError> {
        let mut attempt = 0;
        loop {
            match self.line.trigger_output(duration_micros).await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    self.metrics.inc_retry_count();
                    debug!(attempt, error = %e, "Retrying trigger");
                }
                result => return result,
            }
        }
    }
}
