//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{BusyPolicy, ChannelOptions, MirrorBlueprint, PolarityFilter};

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    input_line: u32,
    output_count: usize,
    scale: f64,
    watchdog_timeout_us: Option<u64>,
    simulated_waveform: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: Vec::new(),
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&blueprint),
            summary: Some(ConfigSummary {
                version: format!("{:?}", blueprint.version),
                input_line: blueprint.input.line,
                output_count: blueprint.outputs.len(),
                scale: blueprint.mirror.scale,
                watchdog_timeout_us: blueprint.mirror.watchdog_timeout_us,
                simulated_waveform: blueprint.waveform().is_some(),
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &MirrorBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.mirror.watchdog_timeout_us.is_none() {
        warnings.push(
            "mirror.watchdog_timeout_us not set - a missing edge leaves the mirror pending forever"
                .to_string(),
        );
    }

    if blueprint.waveform().is_none() {
        warnings.push("No simulation.waveform - the simulated input stays idle".to_string());
    }

    if blueprint.mirror.polarity == PolarityFilter::Both
        && blueprint
            .outputs
            .iter()
            .any(|o| o.busy_policy == BusyPolicy::Reject)
    {
        warnings.push(
            "mirror.polarity = \"both\" with reject-policy outputs - a mirrored low gap usually refuses the next high pulse"
                .to_string(),
        );
    }

    for output in &blueprint.outputs {
        if output.busy_policy == BusyPolicy::Reject
            && output.queue_capacity != ChannelOptions::default().queue_capacity
        {
            warnings.push(format!(
                "Output '{}' sets queue_capacity but uses the reject policy",
                output.id
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Input line: {}", summary.input_line);
            println!("  Outputs: {}", summary.output_count);
            println!("  Scale: {}", summary.scale);
            match summary.watchdog_timeout_us {
                Some(us) => println!("  Watchdog: {us} us"),
                None => println!("  Watchdog: disabled"),
            }
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_config() {
        let file = write_config(
            r#"
[input]
line = 11

[[outputs]]
id = "emitter_0"
line = 4

[mirror]
watchdog_timeout_us = 5000000
"#,
        );
        let result = validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        });

        assert!(result.valid);
        let summary = result.summary.unwrap();
        assert_eq!(summary.output_count, 1);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_shared_line_is_invalid() {
        let file = write_config(
            r#"
[input]
line = 4

[[outputs]]
id = "emitter_0"
line = 4
"#,
        );
        let result = validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        });

        assert!(!result.valid);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_both_polarity_with_reject_outputs_warns() {
        let file = write_config(
            r#"
[input]
line = 11

[[outputs]]
id = "emitter_0"
line = 4

[mirror]
polarity = "both"
watchdog_timeout_us = 5000000
"#,
        );
        let result = validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        });

        assert!(result.valid);
        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings.iter().any(|w| w.contains("mirror.polarity")));
    }

    #[test]
    fn test_missing_file() {
        let result = validate_config(&ValidateArgs {
            config: "/nonexistent/pulse_mirror.toml".into(),
            json: false,
        });
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }
}
