//! Simulated edge source
//!
//! Implements `EdgeSource`. Edges come from three places:
//! - `inject`: delivered synchronously on the caller's thread
//! - `play`: a square wave generated on a background thread
//! - `play_script`: recorded events replayed with their original spacing

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contracts::{
    EdgeCallback, EdgeEvent, EdgeSource, Level, LineOffset, SubscriptionHandle, WaveformConfig,
};
use tracing::{debug, trace};

/// Longest single sleep while waiting for the next edge, so `stop` stays responsive
const MAX_SLEEP_SLICE: Duration = Duration::from_millis(10);

struct SourceShared {
    line: LineOffset,
    epoch: Instant,
    subscribers: Mutex<HashMap<u64, EdgeCallback>>,
    next_id: AtomicU64,
    delivered: AtomicU64,
}

/// Simulated input line
///
/// Cloning yields another handle to the same line.
#[derive(Clone)]
pub struct SimulatedEdgeSource {
    shared: Arc<SourceShared>,
}

impl std::fmt::Debug for SimulatedEdgeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedEdgeSource")
            .field("line", &self.shared.line)
            .finish_non_exhaustive()
    }
}

impl SimulatedEdgeSource {
    /// Standalone source whose clock starts now
    pub fn new(line: LineOffset) -> Self {
        Self::with_epoch(line, Instant::now())
    }

    pub(crate) fn with_epoch(line: LineOffset, epoch: Instant) -> Self {
        Self {
            shared: Arc::new(SourceShared {
                line,
                epoch,
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                delivered: AtomicU64::new(0),
            }),
        }
    }

    /// Microseconds since the source's epoch
    pub fn now_micros(&self) -> u64 {
        self.shared.epoch.elapsed().as_micros() as u64
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().unwrap().len()
    }

    /// Edges delivered so far (counted once per event, not per subscriber)
    pub fn delivered(&self) -> u64 {
        self.shared.delivered.load(Ordering::Relaxed)
    }

    /// Deliver one edge to every subscriber on the calling thread
    ///
    /// Subscribers are invoked under the subscription lock, so a callback must
    /// not subscribe to or unsubscribe from this same source.
    pub fn inject(&self, event: EdgeEvent) {
        let subscribers = self.shared.subscribers.lock().unwrap();
        for callback in subscribers.values() {
            callback(event);
        }
        self.shared.delivered.fetch_add(1, Ordering::Relaxed);
        trace!(
            line = self.shared.line,
            level = %event.level,
            timestamp_us = event.timestamp_micros,
            "edge delivered"
        );
    }

    /// Drive a square wave from a background thread
    ///
    /// Edge timestamps are the scheduled edge times on this source's clock, so
    /// widths are exact even when the thread wakes late. A finite wave emits
    /// `2 * cycles + 1` edges: the closing edge completes the last pulse.
    pub fn play(&self, wave: WaveformConfig) -> Playback {
        let source = self.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            let edge_budget = wave.cycles.map(|c| c.saturating_mul(2).saturating_add(1));
            let mut level = wave.start_level;
            let mut next_at = source.now_micros();
            let mut emitted = 0u64;

            debug!(
                line = source.shared.line,
                high_us = wave.high_us,
                low_us = wave.low_us,
                cycles = ?wave.cycles,
                "waveform playback started"
            );

            while edge_budget.is_none_or(|budget| emitted < budget) {
                if !source.sleep_until(next_at, &stop_flag) {
                    break;
                }
                source.inject(EdgeEvent {
                    level,
                    timestamp_micros: next_at,
                });
                emitted += 1;

                let hold = match level {
                    Level::High => wave.high_us,
                    Level::Low => wave.low_us,
                };
                next_at = next_at.saturating_add(hold);
                level = level.inverted();
            }

            debug!(line = source.shared.line, emitted, "waveform playback finished");
            emitted
        });

        Playback {
            stop,
            handle: Some(handle),
        }
    }

    /// Replay recorded events from a background thread
    ///
    /// Events keep their recorded timestamps (including out-of-order ones);
    /// only the spacing between deliveries is reproduced.
    pub fn play_script(&self, events: Vec<EdgeEvent>) -> Playback {
        let source = self.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            let start = source.now_micros();
            let first = events.first().map(|e| e.timestamp_micros).unwrap_or(0);
            let mut emitted = 0u64;

            for event in events {
                let offset = event.timestamp_micros.saturating_sub(first);
                if !source.sleep_until(start.saturating_add(offset), &stop_flag) {
                    break;
                }
                source.inject(event);
                emitted += 1;
            }

            debug!(line = source.shared.line, emitted, "script playback finished");
            emitted
        });

        Playback {
            stop,
            handle: Some(handle),
        }
    }

    /// Sleep until `deadline_micros`; false if stopped first
    fn sleep_until(&self, deadline_micros: u64, stop: &AtomicBool) -> bool {
        loop {
            if stop.load(Ordering::Relaxed) {
                return false;
            }
            let now = self.now_micros();
            if now >= deadline_micros {
                return true;
            }
            let remaining = Duration::from_micros(deadline_micros - now);
            thread::sleep(remaining.min(MAX_SLEEP_SLICE));
        }
    }
}

impl EdgeSource for SimulatedEdgeSource {
    fn line(&self) -> LineOffset {
        self.shared.line
    }

    fn subscribe_edges(&self, callback: EdgeCallback) -> SubscriptionHandle {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared
            .subscribers
            .lock()
            .unwrap()
            .insert(id, callback);
        debug!(line = self.shared.line, subscription = id, "edge subscription added");
        SubscriptionHandle {
            line: self.shared.line,
            id,
        }
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        if handle.line != self.shared.line {
            return;
        }
        if self
            .shared
            .subscribers
            .lock()
            .unwrap()
            .remove(&handle.id)
            .is_some()
        {
            debug!(line = self.shared.line, subscription = handle.id, "edge subscription removed");
        }
    }
}

/// Handle to a background playback thread
pub struct Playback {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl Playback {
    /// Whether the playback thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Stop playback and return the number of edges emitted
    pub fn stop(mut self) -> u64 {
        self.stop.store(true, Ordering::Relaxed);
        self.join_inner()
    }

    /// Wait for a finite playback to end
    pub fn join(mut self) -> u64 {
        self.join_inner()
    }

    fn join_inner(&mut self) -> u64 {
        self.handle
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or(0)
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
