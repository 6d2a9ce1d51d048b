//! Mirror wiring and lifecycle.

mod orchestrator;
mod stats;

pub use orchestrator::{capture_pulses, CaptureConfig, Pipeline, PipelineConfig, StopReason};
pub use stats::{CaptureResult, PipelineStats};
