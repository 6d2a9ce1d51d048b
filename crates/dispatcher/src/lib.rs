//! # Dispatcher
//!
//! Output fan-out for the pulse mirror.
//!
//! Responsibilities:
//! - One worker task and queue per output channel
//! - Busy handling per channel (reject or queue), never overlapping pulses
//! - Fan-out of each measurement to every channel without blocking the edge path
//! - Per-channel failure isolation and bounded retries

pub mod dispatcher;
pub mod handle;
pub mod metrics;

pub use contracts::{OutputLine, PulseMeasurement};
pub use dispatcher::{DispatchOutcome, DispatcherBuilder, TriggerDispatcher};
pub use handle::{ChannelHandle, ChannelSummary, TriggerRequest};
pub use metrics::{ChannelMetrics, MetricsSnapshot};
