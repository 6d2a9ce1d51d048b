//! Layered error definitions
//!
//! Categorized by where they surface: per edge, per trigger, at startup.
//! Only [`InitializationError`] is fatal; the others are reported and the
//! mirror keeps running.

use thiserror::Error;

use crate::{ChannelId, Level, LineOffset};

/// Rejected input edge
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EdgeError {
    /// Timestamp precedes the last accepted edge; the event is discarded
    #[error("out-of-order edge: {level} at {timestamp_micros}us precedes last edge at {last_micros}us")]
    OutOfOrder {
        level: Level,
        timestamp_micros: u64,
        last_micros: u64,
    },

    /// Two same-polarity edges with no opposite edge between them
    #[error("duplicate {level} edge at {timestamp_micros}us (previous at {previous_micros}us), re-armed")]
    DuplicatePolarity {
        level: Level,
        previous_micros: u64,
        timestamp_micros: u64,
    },
}

impl EdgeError {
    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            EdgeError::OutOfOrder { .. } => "out_of_order",
            EdgeError::DuplicatePolarity { .. } => "duplicate_polarity",
        }
    }
}

/// Failed output trigger
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerError {
    /// Channel still driving a previous pulse (reject policy)
    #[error("channel '{channel}' is busy")]
    Busy { channel: ChannelId },

    /// Channel queue at capacity (queue policy)
    #[error("channel '{channel}' queue is full ({capacity} pending)")]
    QueueFull { channel: ChannelId, capacity: usize },

    /// Underlying line cannot be driven
    #[error("channel '{channel}' unavailable: {message}")]
    Unavailable { channel: ChannelId, message: String },

    /// Channel worker has shut down
    #[error("channel '{channel}' is closed")]
    Closed { channel: ChannelId },
}

impl TriggerError {
    pub fn unavailable(channel: &ChannelId, message: impl Into<String>) -> Self {
        Self::Unavailable {
            channel: channel.clone(),
            message: message.into(),
        }
    }

    /// Whether a retry of the same pulse can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, TriggerError::Unavailable { .. })
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            TriggerError::Busy { .. } => "busy",
            TriggerError::QueueFull { .. } => "queue_full",
            TriggerError::Unavailable { .. } => "unavailable",
            TriggerError::Closed { .. } => "closed",
        }
    }
}

/// Startup failure; surfaced to the process boundary
#[derive(Debug, Error)]
pub enum InitializationError {
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Requested line does not exist on the chip
    #[error("gpio line {line} is not available")]
    LineUnavailable { line: LineOffset },

    /// Requested line already held by another consumer
    #[error("gpio line {line} is already in use as {usage}")]
    LineInUse {
        line: LineOffset,
        usage: &'static str,
    },

    /// Two outputs configured with the same channel id
    #[error("duplicate output channel '{channel}'")]
    DuplicateChannel { channel: ChannelId },

    /// No async runtime to host channel workers and watchdog timers
    #[error("no tokio runtime available: {message}")]
    NoRuntime { message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl InitializationError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}
