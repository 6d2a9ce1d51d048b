//! Pipeline orchestrator - wires the simulated chip to a pulse mirror.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{EdgeSource, MirrorBlueprint, MirrorReport, MirrorSettings, Reporter};
use gpio_sim::{OutputProbe, Playback, SimulatedChip};
use observability::MirrorMetricsAggregator;
use pulse_mirror::{PulseMirror, PulseRecorder};
use tracing::{info, instrument, warn};

use super::stats::ChannelStats;
use super::{CaptureResult, PipelineStats};

const PLAYBACK_POLL: Duration = Duration::from_millis(10);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated blueprint
    pub blueprint: MirrorBlueprint,

    /// Stop after this long (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Signal,
    Timeout,
    WaveformFinished,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::Signal => "signal",
            StopReason::Timeout => "timeout",
            StopReason::WaveformFinished => "end of waveform",
        })
    }
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves, the timeout elapses, or a finite
    /// simulated waveform ends
    ///
    /// Line acquisition failures abort before any edge is processed.
    #[instrument(name = "pipeline_run", skip_all, fields(input = self.config.blueprint.input.line))]
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let chip = SimulatedChip::from_blueprint(blueprint);
        info!(lines = chip.line_count(), "Simulated GPIO chip ready");

        let source = chip.request_input(blueprint.input.line).with_context(|| {
            format!(
                "Failed to request input line {} ({})",
                blueprint.input.line, blueprint.input.name
            )
        })?;

        let aggregator = Arc::new(Mutex::new(MirrorMetricsAggregator::new()));
        let reporter = {
            let aggregator = Arc::clone(&aggregator);
            Reporter::new().with(Arc::new(move |report: &MirrorReport| {
                aggregator
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .update(report);
            }))
        };

        let mut builder = PulseMirror::builder(blueprint.mirror.clone(), reporter)?;
        let mut probes: Vec<(u32, OutputProbe)> = Vec::with_capacity(blueprint.outputs.len());
        for output in &blueprint.outputs {
            let line = chip
                .request_output(output.line, output.id.clone())
                .with_context(|| {
                    format!(
                        "Failed to request output line {} for channel {}",
                        output.line, output.id
                    )
                })?;
            probes.push((output.line, line.probe()));
            builder.add_output(line, output.options())?;
        }
        let mirror = builder.build();
        let subscription = mirror.subscribe_to(&source);

        info!(
            input = blueprint.input.line,
            outputs = blueprint.outputs.len(),
            "Pulse mirror running"
        );

        let playback = match blueprint.waveform() {
            Some(wave) => {
                info!(
                    high_us = wave.high_us,
                    low_us = wave.low_us,
                    cycles = ?wave.cycles,
                    "Playing simulated waveform"
                );
                Some(source.play(wave))
            }
            None => {
                warn!("No simulated waveform configured, input stays idle");
                None
            }
        };

        let timeout = async {
            match self.config.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let stop_reason = tokio::select! {
            _ = shutdown => {
                warn!("Received shutdown signal, stopping mirror...");
                StopReason::Signal
            }
            _ = timeout => {
                warn!(timeout = ?self.config.timeout, "Run timed out");
                StopReason::Timeout
            }
            _ = wait_for_playback(playback.as_ref()) => {
                info!("Simulated waveform finished");
                StopReason::WaveformFinished
            }
        };

        // Shutdown
        info!("Shutting down pipeline...");
        let edges_played = stop_playback(playback).await?;
        source.unsubscribe(subscription);

        let final_state = mirror.state();
        let summaries = mirror.shutdown().await;

        let channels = summaries
            .into_iter()
            .zip(probes)
            .map(|(summary, (line, probe))| ChannelStats::new(summary, line, probe.pulse_count()))
            .collect();

        let summary = aggregator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .summary();

        let stats = PipelineStats {
            duration: start_time.elapsed(),
            stop_reason,
            edges_played,
            final_state,
            channels,
            summary,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            measurements = stats.summary.measurements,
            stop_reason = %stats.stop_reason,
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

/// Capture configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub blueprint: MirrorBlueprint,
    pub duration: Duration,
}

/// Record the input pulse train without driving any output
#[instrument(name = "pipeline_capture", skip_all, fields(input = config.blueprint.input.line))]
pub async fn capture_pulses(config: CaptureConfig) -> Result<CaptureResult> {
    let blueprint = &config.blueprint;
    let chip = SimulatedChip::from_blueprint(blueprint);
    let source = chip
        .request_input(blueprint.input.line)
        .with_context(|| format!("Failed to request input line {}", blueprint.input.line))?;

    let recorder = PulseRecorder::new();
    let settings = MirrorSettings {
        watchdog_timeout_us: blueprint.mirror.watchdog_timeout_us,
        ..Default::default()
    };
    let mirror =
        PulseMirror::builder(settings, Reporter::new().with(recorder.callback()))?.build();
    let subscription = mirror.subscribe_to(&source);

    let playback = blueprint.waveform().map(|wave| source.play(wave));
    if playback.is_none() {
        warn!("No simulated waveform configured, nothing will be captured");
    }

    tokio::select! {
        _ = tokio::time::sleep(config.duration) => {}
        _ = wait_for_playback(playback.as_ref()) => {
            info!("Simulated waveform finished before capture window");
        }
    }

    stop_playback(playback).await?;
    source.unsubscribe(subscription);
    mirror.shutdown().await;

    let result = CaptureResult {
        line: blueprint.input.line,
        duration_ms: config.duration.as_millis() as u64,
        measurements: recorder.measurements(),
        bits: recorder.bits(),
    };
    info!(
        measurements = result.measurements.len(),
        bits = result.bits.len(),
        "Capture complete"
    );
    Ok(result)
}

/// Resolves when a finite playback ends; never without one
async fn wait_for_playback(playback: Option<&Playback>) {
    let Some(playback) = playback else {
        return std::future::pending().await;
    };
    while !playback.is_finished() {
        tokio::time::sleep(PLAYBACK_POLL).await;
    }
}

/// Stop playback off the async threads, returning the edges emitted
async fn stop_playback(playback: Option<Playback>) -> Result<u64> {
    match playback {
        Some(playback) => tokio::task::spawn_blocking(move || playback.stop())
            .await
            .context("Playback thread failed"),
        None => Ok(0),
    }
}
