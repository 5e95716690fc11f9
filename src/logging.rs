//! Tracing subscriber setup
//!
//! The log level comes from the configuration and can be raised with `-v`
//! or lowered with `-q` on the command line. Output goes to the configured
//! file (appending) or to stderr.

use crate::config::LoggingConfig;
use crate::HarvestError;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Builds the filter directive for the given settings
///
/// Verbosity flags take precedence over the configured level.
pub fn filter_directive(config: &LoggingConfig, verbose: u8, quiet: bool) -> String {
    if quiet {
        return "error".to_string();
    }

    match verbose {
        0 => format!("geo_harvest={},warn", config.level.to_ascii_lowercase()),
        1 => "geo_harvest=debug,info".to_string(),
        2 => "geo_harvest=trace,debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Installs the global tracing subscriber
///
/// # Returns
///
/// * `Ok(())` - Subscriber installed
/// * `Err(HarvestError)` - Log file could not be opened or a subscriber
///   was already installed
pub fn init_logging(config: &LoggingConfig, verbose: u8, quiet: bool) -> Result<(), HarvestError> {
    let filter = EnvFilter::new(filter_directive(config, verbose, quiet));

    match &config.destination {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_thread_ids(true)
                .try_init()
                .map_err(|e| HarvestError::Logging(e.to_string()))
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init()
            .map_err(|e| HarvestError::Logging(e.to_string())),
    }
}
