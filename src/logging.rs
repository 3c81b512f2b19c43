//! Logging setup
//!
//! Library code logs through the `log` facade. The binary installs
//! `env_logger` with the configured level; `RUST_LOG` still takes precedence.

use crate::config::Settings;
use log::LevelFilter;

/// Resolve the level filter from configuration and the `--verbose` flag.
pub fn level_filter(settings: &Settings, verbose: bool) -> LevelFilter {
    if verbose {
        return LevelFilter::Debug;
    }
    settings
        .application
        .log_level
        .parse()
        .unwrap_or(LevelFilter::Info)
}

/// Initialize logging based on configuration
///
/// Safe to call more than once; later calls are ignored.
pub fn init(settings: &Settings, verbose: bool) {
    let level = level_filter(settings, verbose);

    let _ = env_logger::Builder::new()
        .filter_level(LevelFilter::Warn)
        .filter_module("psu_monitor", level)
        .parse_default_env()
        .format_timestamp(None)
        .format_module_path(false)
        .try_init();
}
