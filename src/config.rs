//! Converter configuration.
//!
//! Settings come from stock defaults, optionally overridden by a TOML file
//! passed with `--config`. Command-line flags override both.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [processing]
//! max_workers = 4           # Parallel workers (omit for auto = min(cores, 8))
//!
//! [extensions]
//! data = ".data"            # Extension of Celeste bitmap files
//! png = ".png"              # Extension of PNG files
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [processing]
//! max_workers = 2
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Upper bound on the automatic worker count.
pub const DEFAULT_WORKER_CAP: usize = 8;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Converter configuration.
///
/// All fields have defaults; unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    /// Worker pool settings.
    pub processing: ProcessingConfig,
    /// File extensions matched and produced by each direction.
    pub extensions: ExtensionsConfig,
}

impl ConverterConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.max_workers == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_workers must be at least 1".into(),
            ));
        }
        for (key, ext) in [
            ("extensions.data", &self.extensions.data),
            ("extensions.png", &self.extensions.png),
        ] {
            if ext.len() < 2 || !ext.starts_with('.') {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a dot followed by a name, got {ext:?}"
                )));
            }
        }
        if self.extensions.data.eq_ignore_ascii_case(&self.extensions.png) {
            return Err(ConfigError::Validation(
                "extensions.data and extensions.png must differ".into(),
            ));
        }
        Ok(())
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Number of parallel conversion workers.
    /// When absent, defaults to the number of CPU cores, capped at 8.
    pub max_workers: Option<usize>,
}

/// Resolve the effective worker count from config.
///
/// - `None` → `min(cores, 8)`
/// - `Some(n)` → `n`, even above the core count
pub fn effective_workers(config: &ProcessingConfig) -> usize {
    config.max_workers.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(DEFAULT_WORKER_CAP)
    })
}

/// File extensions, including the leading dot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtensionsConfig {
    pub data: String,
    pub png: String,
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            data: ".data".to_string(),
            png: ".png".to_string(),
        }
    }
}

// =============================================================================
// Config loading and merging
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(ConverterConfig::default())
        .map_err(|e| ConfigError::Validation(format!("stock defaults do not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<ConverterConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ConverterConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from an optional TOML file.
///
/// `None` yields the stock defaults. A path that does not exist is an error:
/// the user asked for that file explicitly.
pub fn load_config(path: Option<&Path>) -> Result<ConverterConfig, ConfigError> {
    let overlay = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock config file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r#"# Celeste Converter Configuration
# ===============================
# Pass this file with `--config <path>`. All options are optional;
# the values below are the defaults.

[processing]
# Number of parallel conversion workers.
# Omit for auto: the number of CPU cores, capped at 8.
# The --workers flag overrides this value.
# max_workers = 4

[extensions]
# Extension of Celeste bitmap files (matched case-insensitively).
data = ".data"
# Extension of PNG files (matched case-insensitively).
png = ".png"
"#
}
