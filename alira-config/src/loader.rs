//! Configuration loader implementations.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::schema::{AliraConfig, TurnSettings};

/// Overrides [`TurnSettings::default_model`](crate::TurnSettings::default_model).
pub const ENV_DEFAULT_MODEL: &str = "ALIRA_DEFAULT_MODEL";
/// Overrides [`TurnSettings::turn_timeout`], in seconds.
pub const ENV_TURN_TIMEOUT_SECS: &str = "ALIRA_TURN_TIMEOUT_SECS";
/// Overrides [`AliraConfig::log_filter`].
pub const ENV_LOG: &str = "ALIRA_LOG";

impl AliraConfig {
    /// Reads a JSON configuration file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::from_json_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parses a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error when the document is malformed or names unknown
    /// fields.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw).context("failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `ALIRA_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error when an override value is malformed.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| env::var(key).ok())
    }

    /// Applies overrides resolved through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error when an override value is malformed.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup(ENV_DEFAULT_MODEL) {
            debug!(model = %model, "default model overridden");
            self.turn.default_model = model;
        }
        if let Some(raw) = lookup(ENV_TURN_TIMEOUT_SECS) {
            self.turn.turn_timeout = raw
                .trim()
                .parse::<f64>()
                .map_err(anyhow::Error::from)
                .and_then(|secs| Ok(Duration::try_from_secs_f64(secs)?))
                .with_context(|| format!("{ENV_TURN_TIMEOUT_SECS} must be a number of seconds, got `{raw}`"))?;
        }
        if let Some(filter) = lookup(ENV_LOG) {
            self.log_filter = filter;
        }

        self.validate()?;
        Ok(self)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty default model or a zero turn timeout.
    pub fn validate(&self) -> Result<()> {
        self.turn.validate()
    }
}

impl TurnSettings {
    /// Checks the settings a turn depends on.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty default model or a zero turn timeout.
    pub fn validate(&self) -> Result<()> {
        if self.default_model.trim().is_empty() {
            bail!("turn.default_model must not be empty");
        }
        if self.turn_timeout.is_zero() {
            bail!("turn.turn_timeout_secs must be greater than zero");
        }
        Ok(())
    }
}
