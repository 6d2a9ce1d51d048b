//! # Contracts
//!
//! Shared data model and collaborator interfaces for the pulse mirror.
//! Every other crate in the workspace depends on this one; it depends on none of them.
//!
//! ## Time Model
//! - Edge timestamps are microseconds from the input driver's monotonic clock
//! - Pulse widths and output durations are in microseconds

mod blueprint;
mod channel_id;
mod edge;
mod edge_source;
mod error;
mod output;
mod report;

pub use blueprint::*;
pub use channel_id::ChannelId;
pub use edge::*;
pub use edge_source::{EdgeCallback, EdgeSource, SubscriptionHandle};
pub use error::*;
pub use output::*;
pub use report::*;
