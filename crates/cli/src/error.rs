//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Neither a config file nor `--input` was given
    #[error("No input line: pass --config or --input")]
    MissingInput,

    /// Running needs at least one output
    #[error("No output lines: add [[outputs]] to the config or pass --output")]
    MissingOutputs,

    /// Simulated waveform cannot be played
    #[error("Invalid simulated waveform: {message}")]
    InvalidWaveform { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_waveform(message: impl Into<String>) -> Self {
        Self::InvalidWaveform {
            message: message.into(),
        }
    }
}
