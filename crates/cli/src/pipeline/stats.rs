//! Run statistics.

use std::time::Duration;

use contracts::{ChannelId, PulseBit, PulseMeasurement};
use observability::MetricsSummary;
use pulse_mirror::{ChannelSummary, MirrorState};
use serde::Serialize;

use super::StopReason;

/// Per-channel totals at the end of a run
#[derive(Debug, Clone, Serialize)]
pub struct ChannelStats {
    pub id: ChannelId,
    pub line: u32,
    pub last_trigger_micros: Option<u64>,
    pub triggered: u64,
    /// Pulses the output line failed to drive
    pub failed: u64,
    /// Triggers refused while busy or queue full
    pub rejected: u64,
    pub retries: u64,
    /// Pulses observed on the simulated line
    pub pulses_driven: usize,
}

impl ChannelStats {
    pub fn new(summary: ChannelSummary, line: u32, pulses_driven: usize) -> Self {
        Self {
            id: summary.channel.id,
            line,
            last_trigger_micros: summary.channel.last_trigger_micros,
            triggered: summary.metrics.trigger_count,
            failed: summary.metrics.failure_count,
            rejected: summary.metrics.rejected_count,
            retries: summary.metrics.retry_count,
            pulses_driven,
        }
    }
}

/// Statistics from a mirror run
#[derive(Debug, Clone)]
pub struct PipelineStats {
    pub duration: Duration,
    pub stop_reason: StopReason,
    /// Edges played by the simulated input
    pub edges_played: u64,
    /// Machine state when the run stopped
    pub final_state: MirrorState,
    pub channels: Vec<ChannelStats>,
    pub summary: MetricsSummary,
}

impl PipelineStats {
    /// Measurements per second
    pub fn pulse_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.summary.measurements as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pulse Mirror Statistics                   ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Stopped by: {}", self.stop_reason);
        println!("   ├─ Edges played: {}", self.edges_played);
        println!("   ├─ Pulses measured: {}", self.summary.measurements);
        println!("   ├─ Pulse rate: {:.2}/s", self.pulse_rate());
        println!("   └─ Final state: {:?}", self.final_state);

        println!("\n📈 Input");
        println!("   ├─ High width (us): {}", self.summary.high_width_us);
        println!("   ├─ Low width (us): {}", self.summary.low_width_us);
        println!(
            "   ├─ Rejected edges: {} out-of-order, {} duplicate",
            self.summary.out_of_order, self.summary.duplicate_polarity
        );
        println!("   └─ Watchdog expiries: {}", self.summary.watchdog_expiries);

        println!("\n📤 Outputs ({})", self.channels.len());
        for (i, channel) in self.channels.iter().enumerate() {
            let prefix = if i == self.channels.len() - 1 {
                "└─"
            } else {
                "├─"
            };
            let last = channel
                .last_trigger_micros
                .map(|t| format!("{t}us"))
                .unwrap_or_else(|| "never".to_string());
            println!(
                "   {} {} (line {}): {} triggered, {} failed, {} rejected, {} retries, last at {}",
                prefix,
                channel.id,
                channel.line,
                channel.triggered,
                channel.failed,
                channel.rejected,
                channel.retries,
                last
            );
        }

        println!();
    }
}

/// Recorded pulse train
#[derive(Debug, Clone, Serialize)]
pub struct CaptureResult {
    pub line: u32,
    pub duration_ms: u64,
    pub measurements: Vec<PulseMeasurement>,
    pub bits: Vec<PulseBit>,
}

impl CaptureResult {
    pub fn print(&self) {
        println!(
            "Captured {} pulses on line {} in {} ms",
            self.measurements.len(),
            self.line,
            self.duration_ms
        );
        if self.bits.is_empty() {
            println!("  (no complete high/low pairs)");
            return;
        }
        println!("  {:>5}  {:>10}  {:>10}", "#", "on (us)", "off (us)");
        for (i, bit) in self.bits.iter().enumerate() {
            println!("  {:>5}  {:>10}  {:>10}", i, bit.on_micros, bit.off_micros);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulse_rate() {
        let stats = PipelineStats {
            duration: Duration::from_secs(2),
            stop_reason: StopReason::WaveformFinished,
            edges_played: 7,
            final_state: MirrorState::AwaitingFirstEdge,
            channels: Vec::new(),
            summary: MetricsSummary {
                measurements: 6,
                ..Default::default()
            },
        };
        assert!((stats.pulse_rate() - 3.0).abs() < 1e-10);
    }
}
