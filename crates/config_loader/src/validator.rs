//! Configuration validation
//!
//! Rules:
//! - at least one output
//! - channel ids non-empty and unique
//! - every line used once (input and outputs never share a line)
//! - scale finite and > 0
//! - watchdog timeout > 0 when set
//! - queue_capacity >= 1
//! - simulated waveform has a non-zero period
//!
//! Whether a line actually exists is checked when it is requested, not here.

use std::collections::HashSet;

use contracts::{InitializationError, MirrorBlueprint};

/// Validate a MirrorBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &MirrorBlueprint) -> Result<(), InitializationError> {
    validate_outputs(blueprint)?;
    validate_lines(blueprint)?;
    validate_mirror(blueprint)?;
    validate_simulation(blueprint)?;
    Ok(())
}

fn validate_outputs(blueprint: &MirrorBlueprint) -> Result<(), InitializationError> {
    if blueprint.outputs.is_empty() {
        return Err(InitializationError::config_validation(
            "outputs",
            "at least one output is required",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, output) in blueprint.outputs.iter().enumerate() {
        if output.id.is_empty() {
            return Err(InitializationError::config_validation(
                format!("outputs[{idx}].id"),
                "channel id cannot be empty",
            ));
        }
        if !seen.insert(output.id.as_str()) {
            return Err(InitializationError::config_validation(
                format!("outputs[id={}]", output.id),
                "duplicate channel id",
            ));
        }
        if output.queue_capacity == 0 {
            return Err(InitializationError::config_validation(
                format!("outputs[{}].queue_capacity", output.id),
                "queue_capacity must be >= 1",
            ));
        }
    }
    Ok(())
}

fn validate_lines(blueprint: &MirrorBlueprint) -> Result<(), InitializationError> {
    let mut seen = HashSet::from([blueprint.input.line]);
    for output in &blueprint.outputs {
        if !seen.insert(output.line) {
            return Err(InitializationError::config_validation(
                format!("outputs[{}].line", output.id),
                format!("duplicate line {} (each line may be used once)", output.line),
            ));
        }
    }
    Ok(())
}

fn validate_mirror(blueprint: &MirrorBlueprint) -> Result<(), InitializationError> {
    let mirror = &blueprint.mirror;

    if !mirror.scale.is_finite() || mirror.scale <= 0.0 {
        return Err(InitializationError::config_validation(
            "mirror.scale",
            format!("scale must be finite and > 0, got {}", mirror.scale),
        ));
    }

    if mirror.watchdog_timeout_us == Some(0) {
        return Err(InitializationError::config_validation(
            "mirror.watchdog_timeout_us",
            "watchdog timeout must be > 0 (omit it to disable the watchdog)",
        ));
    }

    Ok(())
}

fn validate_simulation(blueprint: &MirrorBlueprint) -> Result<(), InitializationError> {
    let Some(wave) = blueprint.waveform() else {
        return Ok(());
    };

    if wave.high_us.saturating_add(wave.low_us) == 0 {
        return Err(InitializationError::config_validation(
            "simulation.waveform",
            "high_us + low_us must be > 0",
        ));
    }
    if wave.cycles == Some(0) {
        return Err(InitializationError::config_validation(
            "simulation.waveform.cycles",
            "cycles must be > 0 (omit it to run until stopped)",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Level, OutputConfig, SimulationConfig, WaveformConfig};

    fn blueprint() -> MirrorBlueprint {
        MirrorBlueprint::new(
            11,
            vec![OutputConfig::new("a", 4), OutputConfig::new("b", 17)],
        )
    }

    fn field_of(err: InitializationError) -> String {
        match err {
            InitializationError::ConfigValidation { field, .. } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_valid_blueprint() {
        assert!(validate(&blueprint()).is_ok());
    }

    #[test]
    fn test_no_outputs() {
        let mut bp = blueprint();
        bp.outputs.clear();
        assert_eq!(field_of(validate(&bp).unwrap_err()), "outputs");
    }

    #[test]
    fn test_duplicate_channel_id() {
        let mut bp = blueprint();
        bp.outputs[1].id = "a".into();
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("duplicate channel id"));
    }

    #[test]
    fn test_output_on_input_line() {
        let mut bp = blueprint();
        bp.outputs[0].line = 11;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "outputs[a].line");
    }

    #[test]
    fn test_scale_must_be_positive() {
        let mut bp = blueprint();
        bp.mirror.scale = 0.0;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "mirror.scale");

        bp.mirror.scale = f64::NAN;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "mirror.scale");
    }

    #[test]
    fn test_zero_watchdog() {
        let mut bp = blueprint();
        bp.mirror.watchdog_timeout_us = Some(0);
        assert_eq!(
            field_of(validate(&bp).unwrap_err()),
            "mirror.watchdog_timeout_us"
        );
    }

    #[test]
    fn test_zero_queue_capacity() {
        let mut bp = blueprint();
        bp.outputs[1].queue_capacity = 0;
        assert_eq!(
            field_of(validate(&bp).unwrap_err()),
            "outputs[b].queue_capacity"
        );
    }

    #[test]
    fn test_flat_waveform() {
        let mut bp = blueprint();
        bp.simulation = Some(SimulationConfig {
            available_lines: vec![],
            waveform: Some(WaveformConfig {
                high_us: 0,
                low_us: 0,
                cycles: None,
                start_level: Level::High,
            }),
        });
        assert_eq!(field_of(validate(&bp).unwrap_err()), "simulation.waveform");
    }
}
