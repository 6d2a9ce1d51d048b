//! EdgeSource trait - input line abstraction
//!
//! The GPIO driver owns interrupt handling and timestamping; consumers only
//! see a callback per transition.

use std::sync::Arc;

use crate::{EdgeEvent, LineOffset};

/// Edge callback type
///
/// Invoked once per detected transition, possibly from a driver thread.
pub type EdgeCallback = Arc<dyn Fn(EdgeEvent) + Send + Sync>;

/// Token returned by [`EdgeSource::subscribe_edges`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub line: LineOffset,
    pub id: u64,
}

/// Source of edge events for one input line
///
/// # Contract
///
/// - Callbacks receive events with non-decreasing `timestamp_micros`
/// - `unsubscribe` is idempotent; once it returns the callback is not invoked again
///
/// # Example
///
/// ```ignore
/// let handle = source.subscribe_edges(Arc::new(move |edge| mirror.on_edge(edge)));
/// // ...
/// source.unsubscribe(handle);
/// ```
pub trait EdgeSource: Send + Sync {
    /// Line this source watches
    fn line(&self) -> LineOffset;

    /// Register a callback for every transition on the line
    fn subscribe_edges(&self, callback: EdgeCallback) -> SubscriptionHandle;

    /// Release a subscription
    fn unsubscribe(&self, handle: SubscriptionHandle);
}
