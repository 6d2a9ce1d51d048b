//! OutputLine trait - output collaborator interface

use serde::Serialize;

use crate::{ChannelId, TriggerError};

/// A digital output that can be pulsed
///
/// Implementations drive the line active, wait `duration_micros`, then
/// release it. The future resolves once the line is released.
#[trait_variant::make(OutputLine: Send)]
pub trait LocalOutputLine {
    /// Channel this line is bound to (used for logging/metrics)
    fn channel_id(&self) -> &ChannelId;

    /// Drive the line active for `duration_micros`
    ///
    /// # Errors
    /// Returns [`TriggerError::Unavailable`] if the line cannot be driven.
    async fn trigger_output(&mut self, duration_micros: u64) -> Result<(), TriggerError>;
}

/// Snapshot of one output channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputChannel {
    pub id: ChannelId,
    /// Completing-edge timestamp of the last successful trigger
    pub last_trigger_micros: Option<u64>,
}
