//! # Pulse Mirror
//!
//! Measures pulse widths on one digital input and reproduces them, scaled,
//! on a set of digital outputs.
//!
//! ## Usage
//!
//! ```ignore
//! use pulse_mirror::PulseMirror;
//!
//! let mut builder = PulseMirror::builder(settings, reporter)?;
//! builder.add_output(line, options)?;
//! let mirror = builder.build();
//!
//! let subscription = mirror.subscribe_to(&edge_source);
//! // ... edges arrive, outputs pulse ...
//! edge_source.unsubscribe(subscription);
//! mirror.shutdown().await;
//! ```

mod capture;
mod mirror;
mod tracker;

pub use capture::PulseRecorder;
pub use mirror::{PulseMirror, PulseMirrorBuilder};
pub use tracker::{EdgeTracker, MirrorState};

pub use dispatcher::{ChannelSummary, MetricsSnapshot};

// Re-export contracts types
pub use contracts::{EdgeEvent, Level, MirrorReport, MirrorSettings, PulseMeasurement, Reporter};
