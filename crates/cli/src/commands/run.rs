//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use contracts::MirrorBlueprint;

use super::{check_blueprint, load_blueprint, shutdown_signal};
use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_mirror(args: &RunArgs) -> Result<()> {
    let mut blueprint = load_blueprint(&args.blueprint)?;
    apply_overrides(&mut blueprint, args);
    check_blueprint(&blueprint, true)?;

    info!(
        input = blueprint.input.line,
        outputs = blueprint.outputs.len(),
        scale = blueprint.mirror.scale,
        watchdog_timeout_us = ?blueprint.mirror.watchdog_timeout_us,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    info!("Starting pulse mirror...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Pulse mirror failed")?;

    stats.print_summary();
    info!("Pulse Mirror finished");
    Ok(())
}

fn apply_overrides(blueprint: &mut MirrorBlueprint, args: &RunArgs) {
    if let Some(scale) = args.scale {
        info!(scale, "Overriding scale from CLI");
        blueprint.mirror.scale = scale;
    }
    if let Some(watchdog_us) = args.watchdog_us {
        info!(watchdog_us, "Overriding watchdog timeout from CLI");
        blueprint.mirror.watchdog_timeout_us = Some(watchdog_us);
    }
    if let Some(polarity) = args.polarity {
        blueprint.mirror.polarity = polarity.into();
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &MirrorBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Input: line {} ({})", blueprint.input.line, blueprint.input.name);
    println!("\nOutputs ({}):", blueprint.outputs.len());
    for output in &blueprint.outputs {
        println!(
            "  - {} (line {}, {:?}, retries {})",
            output.id, output.line, output.busy_policy, output.max_retries
        );
    }

    let mirror = &blueprint.mirror;
    println!("\nMirror:");
    println!("  Scale: {}", mirror.scale);
    println!("  Polarity: {:?}", mirror.polarity);
    match mirror.watchdog_timeout_us {
        Some(us) => println!("  Watchdog: {us} us"),
        None => println!("  Watchdog: disabled"),
    }

    if let Some(wave) = blueprint.waveform() {
        println!(
            "\nSimulated input: {} us high / {} us low, {}",
            wave.high_us,
            wave.low_us,
            wave.cycles
                .map(|c| format!("{c} cycles"))
                .unwrap_or_else(|| "until stopped".to_string())
        );
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{BlueprintArgs, PolarityArg};
    use contracts::{OutputConfig, PolarityFilter};

    #[test]
    fn test_overrides_applied() {
        let mut bp = MirrorBlueprint::new(11, vec![OutputConfig::new("a", 4)]);
        let args = RunArgs {
            blueprint: BlueprintArgs::default(),
            scale: Some(0.5),
            watchdog_us: Some(20_000),
            polarity: Some(PolarityArg::Low),
            timeout: 0,
            metrics_port: 0,
            dry_run: false,
        };

        apply_overrides(&mut bp, &args);
        assert_eq!(bp.mirror.scale, 0.5);
        assert_eq!(bp.mirror.watchdog_timeout_us, Some(20_000));
        assert_eq!(bp.mirror.polarity, PolarityFilter::Low);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut bp = MirrorBlueprint::new(11, vec![OutputConfig::new("a", 4)]);
        let args = RunArgs {
            blueprint: BlueprintArgs::default(),
            scale: Some(0.0),
            watchdog_us: None,
            polarity: None,
            timeout: 0,
            metrics_port: 0,
            dry_run: true,
        };

        apply_overrides(&mut bp, &args);
        assert!(check_blueprint(&bp, true).is_err());
    }
}
