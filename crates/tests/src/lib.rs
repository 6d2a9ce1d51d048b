//! # Integration Tests
//!
//! Cross-crate tests.
//!
//! Covers:
//! - Contract snapshots
//! - Config -> simulated chip -> mirror wiring
//! - End-to-end mirroring over simulated edge sources and output lines

#[cfg(test)]
mod contract_tests {
    use contracts::{ChannelId, EdgeError, Level, MirrorReport, PulseMeasurement, TriggerError};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_report_failures() {
        let channel = ChannelId::from("emitter_0");
        let reports = [
            MirrorReport::Measured(PulseMeasurement::between(Level::High, 0, 10).unwrap()),
            MirrorReport::EdgeRejected(EdgeError::OutOfOrder {
                level: Level::Low,
                timestamp_micros: 1,
                last_micros: 10,
            }),
            MirrorReport::TriggerFailed {
                channel: channel.clone(),
                error: TriggerError::Busy { channel },
            },
        ];

        let failures: Vec<bool> = reports.iter().map(MirrorReport::is_failure).collect();
        assert_eq!(failures, vec![false, true, true]);
        assert_eq!(reports[0].measurement().map(|m| m.width_micros), Some(10));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        EdgeEvent, EdgeSource, InitializationError, Level, MirrorBlueprint, MirrorReport,
        Reporter,
    };
    use gpio_sim::{OutputProbe, SimulatedChip, SimulatedEdgeSource};
    use observability::MirrorMetricsAggregator;
    use pulse_mirror::{MirrorState, PulseMirror, PulseRecorder};

    const CONFIG: &str = r#"
[input]
line = 11
name = "ir_receiver"

[[outputs]]
id = "emitter_0"
line = 4

[[outputs]]
id = "emitter_1"
line = 17

[[outputs]]
id = "emitter_2"
line = 27

[mirror]
watchdog_timeout_us = 5000000
"#;

    struct Rig {
        mirror: PulseMirror,
        source: SimulatedEdgeSource,
        probes: Vec<OutputProbe>,
    }

    /// Config -> chip -> mirror, the same wiring the binary does
    fn wire(blueprint: &MirrorBlueprint, reporter: Reporter) -> Result<Rig, InitializationError> {
        let chip = SimulatedChip::from_blueprint(blueprint);
        let source = chip.request_input(blueprint.input.line)?;

        let mut builder = PulseMirror::builder(blueprint.mirror.clone(), reporter)?;
        let mut probes = Vec::new();
        for output in &blueprint.outputs {
            let line = chip.request_output(output.line, output.id.clone())?;
            probes.push(line.probe());
            builder.add_output(line, output.options())?;
        }

        let mirror = builder.build();
        mirror.subscribe_to(&source);
        Ok(Rig {
            mirror,
            source,
            probes,
        })
    }

    fn recording() -> (Reporter, Arc<Mutex<Vec<MirrorReport>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = Reporter::new().with(Arc::new(move |r: &MirrorReport| {
            sink.lock().unwrap().push(r.clone())
        }));
        (reporter, seen)
    }

    /// Config file to mirrored pulses on every output
    #[tokio::test(start_paused = true)]
    async fn test_config_to_mirrored_pulses() {
        let blueprint = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
        let (reporter, reports) = recording();
        let rig = wire(&blueprint, reporter).unwrap();

        rig.source.inject(EdgeEvent::rising(1000));
        rig.source.inject(EdgeEvent::falling(1450));
        let summaries = rig.mirror.shutdown().await;

        for probe in &rig.probes {
            assert_eq!(probe.pulses(), vec![450]);
        }
        assert_eq!(summaries.len(), 3);
        assert!(summaries
            .iter()
            .all(|s| s.channel.last_trigger_micros == Some(1450)));

        let mut aggregator = MirrorMetricsAggregator::new();
        for report in reports.lock().unwrap().iter() {
            aggregator.update(report);
        }
        let summary = aggregator.summary();
        assert_eq!(summary.measurements, 1);
        assert_eq!(summary.triggers.values().sum::<u64>(), 3);
        assert!(summary.trigger_failures.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_then_recovery() {
        let blueprint = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
        let (reporter, reports) = recording();
        let rig = wire(&blueprint, reporter).unwrap();

        rig.source.inject(EdgeEvent::rising(1000));
        tokio::time::sleep(Duration::from_millis(5_001)).await;
        assert_eq!(rig.mirror.state(), MirrorState::AwaitingFirstEdge);

        // The falling edge now only opens a low pulse
        rig.source.inject(EdgeEvent::falling(6_000_000));
        rig.source.inject(EdgeEvent::rising(6_000_300));
        rig.source.inject(EdgeEvent::falling(6_000_800));
        rig.mirror.shutdown().await;

        let reports = reports.lock().unwrap();
        assert!(matches!(
            reports[0],
            MirrorReport::WatchdogExpired {
                pending: Level::High,
                ..
            }
        ));
        let measured: Vec<_> = reports
            .iter()
            .filter_map(|r| r.measurement())
            .map(|m| (m.polarity, m.width_micros))
            .collect();
        assert_eq!(measured, vec![(Level::Low, 300), (Level::High, 500)]);
        for probe in &rig.probes {
            assert_eq!(probe.pulses(), vec![500]);
        }
    }

    #[tokio::test]
    async fn test_line_conflicts_fail_initialization() {
        let mut blueprint = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
        blueprint.simulation = Some(contracts::SimulationConfig {
            available_lines: vec![11, 4, 17],
            waveform: None,
        });

        let err = wire(&blueprint, Reporter::new()).err().unwrap();
        assert!(matches!(err, InitializationError::LineUnavailable { line: 27 }));

        let chip = SimulatedChip::new([11, 4]);
        let _input = chip.request_input(11).unwrap();
        let err = chip.request_output(11, "emitter_0".into()).err().unwrap();
        assert!(matches!(err, InitializationError::LineInUse { line: 11, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_policy_serializes_pulses() {
        let toml = r#"
[input]
line = 11

[[outputs]]
id = "queued"
line = 4
busy_policy = "queue"
queue_capacity = 8

[[outputs]]
id = "exclusive"
line = 17
"#;
        let blueprint = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        let rig = wire(&blueprint, Reporter::new()).unwrap();

        // Three marks, each completing before the previous output pulse ends
        for event in [
            EdgeEvent::rising(0),
            EdgeEvent::falling(1000),
            EdgeEvent::rising(1200),
            EdgeEvent::falling(2200),
            EdgeEvent::rising(2400),
            EdgeEvent::falling(3400),
        ] {
            rig.source.inject(event);
        }
        let summaries = rig.mirror.shutdown().await;

        let queued = &rig.probes[0];
        let exclusive = &rig.probes[1];
        assert_eq!(queued.pulses(), vec![1000, 1000, 1000]);
        assert_eq!(exclusive.pulses(), vec![1000]);
        assert_eq!(queued.overlaps(), 0);
        assert_eq!(summaries[0].metrics.rejected_count, 0);
        assert_eq!(summaries[1].metrics.rejected_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_transient_fault() {
        let toml = r#"
[input]
line = 11

[[outputs]]
id = "flaky"
line = 4
max_retries = 2
"#;
        let blueprint = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        let (reporter, reports) = recording();
        let rig = wire(&blueprint, reporter).unwrap();
        rig.probes[0].fail_next(2);

        rig.source.inject(EdgeEvent::rising(0));
        rig.source.inject(EdgeEvent::falling(800));
        let summaries = rig.mirror.shutdown().await;

        assert_eq!(rig.probes[0].pulses(), vec![800]);
        assert_eq!(summaries[0].metrics.retry_count, 2);
        assert!(!reports.lock().unwrap().iter().any(MirrorReport::is_failure));
    }

    /// The shipped config, driven by its own waveform: every mark is mirrored
    /// on every output and no channel is ever busy
    #[tokio::test(start_paused = true)]
    async fn test_example_waveform_mirrors_every_mark() {
        let blueprint = ConfigLoader::load_from_str(
            include_str!("../../../pulse_mirror.example.toml"),
            ConfigFormat::Toml,
        )
        .unwrap();
        let wave = blueprint.waveform().unwrap();
        let cycles = wave.cycles.unwrap();
        let (reporter, reports) = recording();
        let rig = wire(&blueprint, reporter).unwrap();

        let mut now = 0;
        for _ in 0..cycles {
            rig.source.inject(EdgeEvent::rising(now));
            tokio::time::sleep(Duration::from_micros(wave.high_us)).await;
            now += wave.high_us;
            rig.source.inject(EdgeEvent::falling(now));
            tokio::time::sleep(Duration::from_micros(wave.low_us)).await;
            now += wave.low_us;
        }
        rig.source.inject(EdgeEvent::rising(now));
        let summaries = rig.mirror.shutdown().await;

        assert!(!reports.lock().unwrap().iter().any(MirrorReport::is_failure));
        assert_eq!(summaries.len(), 6);
        for (summary, probe) in summaries.iter().zip(&rig.probes) {
            assert_eq!(summary.metrics.rejected_count, 0);
            assert_eq!(summary.metrics.trigger_count, cycles);
            assert_eq!(probe.pulses(), vec![wave.high_us; cycles as usize]);
        }
    }

    #[tokio::test]
    async fn test_waveform_playback_capture() {
        let blueprint = MirrorBlueprint::new(11, Vec::new());
        let chip = SimulatedChip::from_blueprint(&blueprint);
        let source = chip.request_input(11).unwrap();

        let recorder = PulseRecorder::new();
        let mirror = PulseMirror::builder(
            blueprint.mirror.clone(),
            Reporter::new().with(recorder.callback()),
        )
        .unwrap()
        .build();
        let subscription = mirror.subscribe_to(&source);

        let playback = source.play(contracts::WaveformConfig {
            high_us: 1_000,
            low_us: 2_000,
            cycles: Some(4),
            start_level: Level::High,
        });
        let emitted = tokio::task::spawn_blocking(move || playback.join())
            .await
            .unwrap();
        source.unsubscribe(subscription);
        mirror.shutdown().await;

        assert_eq!(emitted, 9);
        assert_eq!(recorder.len(), 8);
        assert_eq!(recorder.widths(Level::High), vec![1_000; 4]);
        assert_eq!(recorder.bits().len(), 4);
        assert!(recorder
            .bits()
            .iter()
            .all(|b| b.on_micros == 1_000 && b.off_micros == 2_000));
    }
}
