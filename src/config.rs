//! Configuration loading using Figment
//!
//! Configuration is merged from, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. A TOML file (`psu_monitor.toml` by default)
//! 3. Environment variables prefixed with `PSU_MONITOR_`, nested with `__`
//!
//! ```text
//! PSU_MONITOR_APPLICATION__LOG_LEVEL=debug
//! PSU_MONITOR_MONITOR__INTERVAL_SECS=0.5
//! PSU_MONITOR_INSTRUMENT__PORT=/dev/ttyUSB0
//! ```
//!
//! Link parameters (9600 baud, 8N1, 2 s timeout) are fixed and not
//! configurable.

use crate::error::{AppResult, PsuError};
use crate::instrument::DEFAULT_MODEL_MARKER;
use crate::monitor::{interval_from_secs, MeasurementMode, DEFAULT_INTERVAL_SECS};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "psu_monitor.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PSU_MONITOR_";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Polling defaults
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Instrument selection
    #[serde(default)]
    pub instrument: InstrumentConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Polling defaults; the CLI and prompts override these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Mode used when none is given on the command line; prompted when unset
    #[serde(default)]
    pub mode: Option<MeasurementMode>,
    /// Default polling interval in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,
}

/// Instrument selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Port to use instead of scanning
    #[serde(default)]
    pub port: Option<String>,
    /// Substring the `*IDN?` reply must contain before measuring
    #[serde(default = "default_model_marker")]
    pub model_marker: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_interval_secs() -> f64 {
    DEFAULT_INTERVAL_SECS
}

fn default_model_marker() -> String {
    DEFAULT_MODEL_MARKER.to_string()
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            mode: None,
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            port: None,
            model_marker: default_model_marker(),
        }
    }
}

impl Settings {
    /// Load from `psu_monitor.toml` (if present) and the environment.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from a specific file (missing files are skipped) and the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let settings: Self = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - Interval is a positive, finite number of seconds
    /// - Model marker and port (when set) are not empty
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(PsuError::Validation(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let secs = self.monitor.interval_secs;
        if interval_from_secs(secs).is_none() {
            return Err(PsuError::Validation(format!(
                "Invalid interval_secs {}. Must be a positive number of seconds",
                secs
            )));
        }

        if self.instrument.model_marker.is_empty() {
            return Err(PsuError::Validation(
                "'model_marker' cannot be empty".to_string(),
            ));
        }

        if matches!(&self.instrument.port, Some(p) if p.trim().is_empty()) {
            return Err(PsuError::Validation("'port' cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Default polling interval; the built-in default if the value is out of range
    pub fn interval(&self) -> Duration {
        interval_from_secs(self.monitor.interval_secs)
            .unwrap_or(Duration::from_secs_f64(DEFAULT_INTERVAL_SECS))
    }
}
