//! Command implementations.

mod capture;
mod info;
mod run;
mod validate;

pub use capture::run_capture;
pub use info::run_info;
pub use run::run_mirror;
pub use validate::run_validate;

use anyhow::{Context, Result};
use tracing::{info, warn};

use config_loader::ConfigLoader;
use contracts::{ChannelId, Level, MirrorBlueprint, OutputConfig, WaveformConfig};

use crate::cli::BlueprintArgs;
use crate::error::CliError;

/// Build the blueprint from `--config` and apply flag overrides
///
/// Not validated; see [`check_blueprint`].
pub(crate) fn load_blueprint(args: &BlueprintArgs) -> Result<MirrorBlueprint> {
    let mut blueprint = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::config_not_found(path.display().to_string()).into());
            }
            info!(config = %path.display(), "Loading configuration");
            ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => {
            let input = args.input.ok_or(CliError::MissingInput)?;
            MirrorBlueprint::new(input, Vec::new())
        }
    };

    if let Some(input) = args.input {
        blueprint.input.line = input;
    }

    if !args.outputs.is_empty() {
        info!(outputs = ?args.outputs, "Using output lines from CLI");
        blueprint.outputs = args
            .outputs
            .iter()
            .enumerate()
            .map(|(i, &line)| OutputConfig::new(ChannelId::emitter(i), line))
            .collect();
    }

    if let (Some(high_us), Some(low_us)) = (args.high_us, args.low_us) {
        blueprint.simulation.get_or_insert_with(Default::default).waveform =
            Some(WaveformConfig {
                high_us,
                low_us,
                cycles: args.cycles,
                start_level: Level::High,
            });
    } else if let Some(cycles) = args.cycles {
        match blueprint
            .simulation
            .as_mut()
            .and_then(|sim| sim.waveform.as_mut())
        {
            Some(wave) => wave.cycles = Some(cycles),
            None => warn!("--cycles given without a waveform, ignored"),
        }
    }

    Ok(blueprint)
}

/// Validate the final blueprint
///
/// With `require_outputs == false` an output-less blueprint is accepted and
/// only its waveform is checked.
pub(crate) fn check_blueprint(blueprint: &MirrorBlueprint, require_outputs: bool) -> Result<()> {
    if !blueprint.outputs.is_empty() {
        return ConfigLoader::validate(blueprint).context("Invalid configuration");
    }
    if require_outputs {
        return Err(CliError::MissingOutputs.into());
    }

    if let Some(wave) = blueprint.waveform() {
        if wave.high_us.saturating_add(wave.low_us) == 0 {
            return Err(CliError::invalid_waveform("high_us + low_us must be positive").into());
        }
        if wave.cycles == Some(0) {
            return Err(CliError::invalid_waveform("cycles must be at least 1").into());
        }
    }
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_blueprint_from_flags() {
        let args = BlueprintArgs {
            input: Some(11),
            outputs: vec![4, 17],
            high_us: Some(450),
            low_us: Some(550),
            cycles: Some(3),
            ..Default::default()
        };

        let bp = load_blueprint(&args).unwrap();
        assert_eq!(bp.input.line, 11);
        assert_eq!(bp.outputs.len(), 2);
        assert_eq!(bp.outputs[1].id, "emitter_1");
        assert_eq!(bp.waveform().unwrap().cycles, Some(3));
        check_blueprint(&bp, true).unwrap();
    }

    #[test]
    fn test_missing_input() {
        let err = load_blueprint(&BlueprintArgs::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::MissingInput)
        ));
    }

    #[test]
    fn test_outputs_required_for_run() {
        let bp = MirrorBlueprint::new(11, Vec::new());
        assert!(check_blueprint(&bp, true).is_err());
        assert!(check_blueprint(&bp, false).is_ok());
    }

    #[test]
    fn test_flags_override_config() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[input]
line = 11

[[outputs]]
id = "led"
line = 4
"#
        )
        .unwrap();

        let args = BlueprintArgs {
            config: Some(file.path().to_path_buf()),
            input: Some(12),
            ..Default::default()
        };
        let bp = load_blueprint(&args).unwrap();
        assert_eq!(bp.input.line, 12);
        assert_eq!(bp.outputs[0].id, "led");
    }

    #[test]
    fn test_config_not_found() {
        let args = BlueprintArgs {
            config: Some("/nonexistent/pulse_mirror.toml".into()),
            ..Default::default()
        };
        let err = load_blueprint(&args).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
