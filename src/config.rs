//! Provider configuration.
//!
//! Loaded from an optional YAML file; every field has a default so an
//! absent file and an empty file behave the same.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScriptError;

/// Settings that apply to every invocation of a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Append a descriptor block per invocation to this file (disabled when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor_log: Option<Utf8PathBuf>,
    /// Directory under which workspaces are created (system temp dir when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_root: Option<Utf8PathBuf>,
    /// Kill scripts that run longer than this many seconds (no limit when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ProviderConfig {
    /// Returns the script timeout, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ScriptError::Config` if a value is out of range, or
    /// `ScriptError::Io` if `temp_root` is not an existing directory.
    pub fn validate(&self) -> Result<(), ScriptError> {
        if self.timeout_secs == Some(0) {
            return Err(ScriptError::Config("timeout_secs must be greater than 0".to_string()));
        }
        if let Some(root) = &self.temp_root {
            let metadata = std::fs::metadata(root)
                .map_err(|e| ScriptError::io(format!("failed to read temp_root {}", root), e))?;
            if !metadata.is_dir() {
                return Err(ScriptError::Config(format!("temp_root is not a directory: {}", root)));
            }
        }
        if let Some(log) = &self.descriptor_log
            && log.as_str().is_empty()
        {
            return Err(ScriptError::Config("descriptor_log must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Loads and validates a provider configuration file.
///
/// # Errors
///
/// Returns `ScriptError::Io` if the file cannot be read, or
/// `ScriptError::Config` if it cannot be parsed or fails validation.
pub fn load_config(path: &Utf8Path) -> Result<ProviderConfig, ScriptError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ScriptError::io(format!("failed to read config {}", path), e))?;
    let config: ProviderConfig = if content.trim().is_empty() {
        ProviderConfig::default()
    } else {
        serde_yaml::from_str(&content)
            .map_err(|e| ScriptError::Config(format!("failed to parse {}: {}", path, e)))?
    };
    config.validate()?;
    debug!("loaded config from {}: {:?}", path, config);
    Ok(config)
}
