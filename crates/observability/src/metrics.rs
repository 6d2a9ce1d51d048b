//! Pulse mirror metrics
//!
//! `record_*` functions publish to the `metrics` facade (Prometheus when the
//! exporter is installed, no-ops otherwise). [`MirrorMetricsAggregator`]
//! keeps the in-memory totals printed at the end of a run.

use std::collections::BTreeMap;

use contracts::{EdgeError, Level, MirrorReport, PulseMeasurement};
use metrics::{counter, histogram};
use serde::Serialize;

/// Record an edge delivered by the input line
pub fn record_edge_received(level: Level) {
    counter!("pulse_mirror_edges_total", "level" => level.as_str()).increment(1);
}

/// Record a rejected edge
pub fn record_edge_rejected(error: &EdgeError) {
    counter!("pulse_mirror_edges_rejected_total", "kind" => error.kind()).increment(1);
}

/// Record a completed pulse
pub fn record_measurement(measurement: &PulseMeasurement) {
    let polarity = measurement.polarity.as_str();
    counter!("pulse_mirror_measurements_total", "polarity" => polarity).increment(1);
    histogram!("pulse_mirror_pulse_width_us", "polarity" => polarity)
        .record(measurement.width_micros as f64);
}

/// Record the fan-out of one measurement
pub fn record_dispatch(duration_micros: u64, issued: usize, rejected: usize) {
    histogram!("pulse_mirror_trigger_duration_us").record(duration_micros as f64);
    counter!("pulse_mirror_triggers_issued_total").increment(issued as u64);
    if rejected > 0 {
        counter!("pulse_mirror_triggers_refused_total").increment(rejected as u64);
    }
}

/// Record how a trigger ended on one channel (`success` or an error kind)
pub fn record_trigger_result(channel: &str, outcome: &'static str) {
    counter!(
        "pulse_mirror_trigger_results_total",
        "channel" => channel.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a watchdog expiry
pub fn record_watchdog_expired(pending: Level) {
    counter!("pulse_mirror_watchdog_expired_total", "pending" => pending.as_str()).increment(1);
}

/// In-memory aggregation of mirror reports
#[derive(Debug, Clone, Default)]
pub struct MirrorMetricsAggregator {
    pub measurements: u64,
    pub out_of_order: u64,
    pub duplicate_polarity: u64,
    pub watchdog_expiries: u64,
    pub high_width_us: RunningStats,
    pub low_width_us: RunningStats,
    /// Channel -> successful triggers
    pub triggers: BTreeMap<String, u64>,
    /// Channel -> failed or refused triggers
    pub trigger_failures: BTreeMap<String, u64>,
}

impl MirrorMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one report into the totals
    pub fn update(&mut self, report: &MirrorReport) {
        match report {
            MirrorReport::Measured(m) => {
                self.measurements += 1;
                match m.polarity {
                    Level::High => self.high_width_us.push(m.width_micros as f64),
                    Level::Low => self.low_width_us.push(m.width_micros as f64),
                }
            }
            MirrorReport::EdgeRejected(EdgeError::OutOfOrder { .. }) => self.out_of_order += 1,
            MirrorReport::EdgeRejected(EdgeError::DuplicatePolarity { .. }) => {
                self.duplicate_polarity += 1
            }
            MirrorReport::Triggered { channel, .. } => {
                *self.triggers.entry(channel.to_string()).or_insert(0) += 1;
            }
            MirrorReport::TriggerFailed { channel, .. } => {
                *self.trigger_failures.entry(channel.to_string()).or_insert(0) += 1;
            }
            MirrorReport::WatchdogExpired { .. } => self.watchdog_expiries += 1,
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            measurements: self.measurements,
            out_of_order: self.out_of_order,
            duplicate_polarity: self.duplicate_polarity,
            watchdog_expiries: self.watchdog_expiries,
            high_width_us: StatsSummary::from(&self.high_width_us),
            low_width_us: StatsSummary::from(&self.low_width_us),
            triggers: self.triggers.clone(),
            trigger_failures: self.trigger_failures.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Summary of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSummary {
    pub measurements: u64,
    pub out_of_order: u64,
    pub duplicate_polarity: u64,
    pub watchdog_expiries: u64,
    pub high_width_us: StatsSummary,
    pub low_width_us: StatsSummary,
    pub triggers: BTreeMap<String, u64>,
    pub trigger_failures: BTreeMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Pulse Mirror Summary ===")?;
        writeln!(f, "Measurements: {}", self.measurements)?;
        writeln!(f, "High pulse width (us): {}", self.high_width_us)?;
        writeln!(f, "Low pulse width (us): {}", self.low_width_us)?;
        writeln!(
            f,
            "Rejected edges: {} out-of-order, {} duplicate",
            self.out_of_order, self.duplicate_polarity
        )?;
        writeln!(f, "Watchdog expiries: {}", self.watchdog_expiries)?;

        if !self.triggers.is_empty() || !self.trigger_failures.is_empty() {
            writeln!(f, "Channels:")?;
            let channels: std::collections::BTreeSet<_> = self
                .triggers
                .keys()
                .chain(self.trigger_failures.keys())
                .collect();
            for channel in channels {
                writeln!(
                    f,
                    "  {}: {} triggered, {} failed",
                    channel,
                    self.triggers.get(channel).copied().unwrap_or(0),
                    self.trigger_failures.get(channel).copied().unwrap_or(0)
                )?;
            }
        }

        Ok(())
    }
}

/// Summary statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
