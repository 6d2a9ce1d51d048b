//! Edge events and the pulse measurements derived from them.
//!
//! ## Time Model
//! - Timestamps are microseconds from the edge source's monotonic clock
//! - Events for one line arrive in non-decreasing timestamp order

use serde::{Deserialize, Serialize};
use std::fmt;

/// GPIO line number on a chip
pub type LineOffset = u32;

/// Digital signal level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// The opposite level
    pub fn inverted(self) -> Self {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }

    /// Lowercase label (used for logs and metric labels)
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Low => "low",
            Level::High => "high",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected transition on an input line.
///
/// `level` is the level the line moved *to*: a rising edge carries
/// `Level::High`, a falling edge `Level::Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeEvent {
    pub level: Level,
    pub timestamp_micros: u64,
}

impl EdgeEvent {
    pub fn rising(timestamp_micros: u64) -> Self {
        Self {
            level: Level::High,
            timestamp_micros,
        }
    }

    pub fn falling(timestamp_micros: u64) -> Self {
        Self {
            level: Level::Low,
            timestamp_micros,
        }
    }
}

/// Width of one completed pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseMeasurement {
    /// `completed_at_micros - started_at_micros`
    pub width_micros: u64,
    /// Level the line held during the pulse
    pub polarity: Level,
    /// Timestamp of the edge that opened the pulse
    pub started_at_micros: u64,
    /// Timestamp of the edge that closed the pulse
    pub completed_at_micros: u64,
}

impl PulseMeasurement {
    /// Measure the pulse between two edges.
    ///
    /// Returns `None` when `end` precedes `start`: that is a wrapped clock or
    /// an out-of-order delivery, and the width would be meaningless.
    pub fn between(polarity: Level, start: u64, end: u64) -> Option<Self> {
        let width_micros = end.checked_sub(start)?;
        Some(Self {
            width_micros,
            polarity,
            started_at_micros: start,
            completed_at_micros: end,
        })
    }
}

/// One high pulse paired with the low gap that follows it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseBit {
    pub on_micros: u64,
    pub off_micros: u64,
}
