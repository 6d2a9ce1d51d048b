//! MirrorBlueprint - Config Loader output
//!
//! Describes the full mirror setup: input line, output channels, mirroring
//! policy and the optional simulated hardware.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::{ChannelId, Level, LineOffset};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete mirror configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    /// Line whose pulses are measured
    pub input: InputConfig,

    /// Lines that reproduce the measured pulses
    pub outputs: Vec<OutputConfig>,

    /// Mirroring policy
    #[serde(default)]
    pub mirror: MirrorSettings,

    /// Simulated GPIO chip (the only bundled backend)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation: Option<SimulationConfig>,
}

/// Input line configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub line: LineOffset,

    /// Human-readable name (logs only)
    #[serde(default = "default_input_name")]
    pub name: String,
}

fn default_input_name() -> String {
    "input".to_string()
}

/// Output channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Unique channel identifier
    pub id: ChannelId,

    pub line: LineOffset,

    /// What to do with a trigger while the channel is still active
    #[serde(default)]
    pub busy_policy: BusyPolicy,

    /// Pending triggers kept under [`BusyPolicy::Queue`]
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Retries after [`crate::TriggerError::Unavailable`]
    #[serde(default)]
    pub max_retries: u32,
}

fn default_queue_capacity() -> usize {
    4
}

impl OutputConfig {
    /// Config for a line with default channel options
    pub fn new(id: impl Into<ChannelId>, line: LineOffset) -> Self {
        Self {
            id: id.into(),
            line,
            busy_policy: BusyPolicy::default(),
            queue_capacity: default_queue_capacity(),
            max_retries: 0,
        }
    }

    pub fn options(&self) -> ChannelOptions {
        ChannelOptions {
            busy_policy: self.busy_policy,
            queue_capacity: self.queue_capacity,
            max_retries: self.max_retries,
        }
    }
}

/// Per-channel worker options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOptions {
    pub busy_policy: BusyPolicy,
    pub queue_capacity: usize,
    pub max_retries: u32,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            busy_policy: BusyPolicy::default(),
            queue_capacity: default_queue_capacity(),
            max_retries: 0,
        }
    }
}

/// Handling of a trigger that arrives while the channel is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Fail the trigger with `TriggerError::Busy`
    #[default]
    Reject,
    /// Run it after the active pulse, up to `queue_capacity` pending
    Queue,
}

/// Mirroring policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorSettings {
    /// Output duration = measured width x scale
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Return a pending state to idle after this long without the opposite edge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watchdog_timeout_us: Option<u64>,

    /// Which measured pulses are reproduced
    #[serde(default)]
    pub polarity: PolarityFilter,
}

fn default_scale() -> f64 {
    1.0
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            watchdog_timeout_us: None,
            polarity: PolarityFilter::default(),
        }
    }
}

impl MirrorSettings {
    pub fn watchdog_timeout(&self) -> Option<Duration> {
        self.watchdog_timeout_us.map(Duration::from_micros)
    }

    /// Output duration for a measured width
    pub fn scaled_duration(&self, width_micros: u64) -> u64 {
        if self.scale == 1.0 {
            width_micros
        } else {
            // float-to-int `as` saturates, so huge products clamp to u64::MAX
            (width_micros as f64 * self.scale).round() as u64
        }
    }
}

/// Polarity selection for dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolarityFilter {
    /// Mirror high pulses only; the low gap between marks is measured and
    /// reported but drives nothing
    #[default]
    High,
    /// Mirror low pulses only
    Low,
    /// Mirror every completed pulse. Under the reject policy the output for
    /// a low gap is usually still active when the next mark completes.
    Both,
}

impl PolarityFilter {
    pub fn accepts(self, polarity: Level) -> bool {
        match self {
            PolarityFilter::High => polarity == Level::High,
            PolarityFilter::Low => polarity == Level::Low,
            PolarityFilter::Both => true,
        }
    }
}

/// Simulated chip configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Lines present on the chip (empty = every configured line)
    #[serde(default)]
    pub available_lines: Vec<LineOffset>,

    /// Square wave played on the input line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waveform: Option<WaveformConfig>,
}

/// Square wave description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveformConfig {
    /// Time spent high per cycle
    pub high_us: u64,
    /// Time spent low per cycle
    pub low_us: u64,
    /// Number of full cycles (None = until stopped)
    #[serde(default)]
    pub cycles: Option<u64>,
    /// Level of the first edge
    #[serde(default = "default_start_level")]
    pub start_level: Level,
}

fn default_start_level() -> Level {
    Level::High
}

impl MirrorBlueprint {
    /// Minimal blueprint: one input, outputs with default options
    pub fn new(input: LineOffset, outputs: Vec<OutputConfig>) -> Self {
        Self {
            version: ConfigVersion::V1,
            input: InputConfig {
                line: input,
                name: default_input_name(),
            },
            outputs,
            mirror: MirrorSettings::default(),
            simulation: None,
        }
    }

    /// Every line the blueprint needs, input first
    pub fn referenced_lines(&self) -> Vec<LineOffset> {
        std::iter::once(self.input.line)
            .chain(self.outputs.iter().map(|o| o.line))
            .collect()
    }

    /// Lines the simulated chip exposes
    pub fn simulated_lines(&self) -> BTreeSet<LineOffset> {
        match &self.simulation {
            Some(sim) if !sim.available_lines.is_empty() => {
                sim.available_lines.iter().copied().collect()
            }
            _ => self.referenced_lines().into_iter().collect(),
        }
    }

    pub fn waveform(&self) -> Option<WaveformConfig> {
        self.simulation.as_ref().and_then(|sim| sim.waveform)
    }
}
