//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{MirrorBlueprint, MirrorSettings, OutputConfig, WaveformConfig};

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo<'a> {
    version: String,
    input_line: u32,
    input_name: &'a str,
    outputs: &'a [OutputConfig],
    mirror: &'a MirrorSettings,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    chip_lines: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    waveform: Option<WaveformConfig>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let json = serde_json::to_string_pretty(&build_config_info(&blueprint))
            .context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn build_config_info(blueprint: &MirrorBlueprint) -> ConfigInfo<'_> {
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        input_line: blueprint.input.line,
        input_name: &blueprint.input.name,
        outputs: &blueprint.outputs,
        mirror: &blueprint.mirror,
        chip_lines: blueprint.simulated_lines().into_iter().collect(),
        waveform: blueprint.waveform(),
    }
}

fn print_config_info(blueprint: &MirrorBlueprint) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Pulse Mirror Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📥 Input");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   └─ Line {} ({})", blueprint.input.line, blueprint.input.name);

    println!("\n📤 Outputs ({})", blueprint.outputs.len());
    for (i, output) in blueprint.outputs.iter().enumerate() {
        let prefix = if i == blueprint.outputs.len() - 1 {
            "└─"
        } else {
            "├─"
        };
        println!(
            "   {} {} (line {}, {:?}, queue {}, retries {})",
            prefix,
            output.id,
            output.line,
            output.busy_policy,
            output.queue_capacity,
            output.max_retries
        );
    }

    let mirror = &blueprint.mirror;
    println!("\n⚙️  Mirror Settings");
    println!("   ├─ Scale: {}", mirror.scale);
    println!("   ├─ Polarity: {:?}", mirror.polarity);
    match mirror.watchdog_timeout_us {
        Some(us) => println!("   └─ Watchdog: {} us", us),
        None => println!("   └─ Watchdog: disabled"),
    }

    println!("\n🔌 Simulated Chip");
    println!("   ├─ Lines: {:?}", blueprint.simulated_lines());
    match blueprint.waveform() {
        Some(wave) => println!(
            "   └─ Waveform: {} us high / {} us low, starts {}, {}",
            wave.high_us,
            wave.low_us,
            wave.start_level,
            wave.cycles
                .map(|c| format!("{c} cycles"))
                .unwrap_or_else(|| "until stopped".to_string())
        ),
        None => println!("   └─ Waveform: none"),
    }

    println!();
}
