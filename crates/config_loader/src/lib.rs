//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Generate `MirrorBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("pulse_mirror.toml")).unwrap();
//! println!("Input line: {}", blueprint.input.line);
//! ```

mod parser;
mod validator;

pub use contracts::MirrorBlueprint;
pub use parser::ConfigFormat;

use contracts::InitializationError;
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<MirrorBlueprint, InitializationError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<MirrorBlueprint, InitializationError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Validate a blueprint assembled in code (e.g. from CLI flags)
    pub fn validate(blueprint: &MirrorBlueprint) -> Result<(), InitializationError> {
        validator::validate(blueprint)
    }

    /// Serialize MirrorBlueprint to TOML string
    pub fn to_toml(blueprint: &MirrorBlueprint) -> Result<String, InitializationError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| InitializationError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize MirrorBlueprint to JSON string
    pub fn to_json(blueprint: &MirrorBlueprint) -> Result<String, InitializationError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| InitializationError::config_parse(format!("JSON serialize error: {e}")))
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat, InitializationError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            InitializationError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            InitializationError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }
}
