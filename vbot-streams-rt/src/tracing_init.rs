//! Tracing bootstrap (ambient stack, spec SPEC_FULL §"Observability").
//! Simplified from `pilatus-rt::tracing::init`: same `tracing-subscriber`
//! registry plus `tracing-appender` rolling file layer, minus the
//! `console_subscriber` / `minfac`-registered `TracingConfig` machinery
//! this crate has no use for.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;

#[derive(Debug, Clone)]
pub struct TracingInitConfig {
    /// `EnvFilter` directive string, e.g. `"info,vbot_media=debug"`.
    pub env_filter: String,
    /// When set, logs are additionally written to hourly-rolling files
    /// under this directory.
    pub log_dir: Option<PathBuf>,
}

impl Default for TracingInitConfig {
    fn default() -> Self {
        Self {
            env_filter: "info".to_string(),
            log_dir: None,
        }
    }
}

/// Installs the global `tracing` subscriber. Returns a `WorkerGuard` that
/// must be kept alive for the process lifetime when file logging is
/// enabled, since dropping it stops the non-blocking writer.
pub fn init_tracing(config: &TracingInitConfig) -> Result<Option<WorkerGuard>, TryInitError> {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_line_number(true)
        .compact()
        .with_filter(tracing_subscriber::EnvFilter::new(config.env_filter.clone()));

    match &config.log_dir {
        Some(dir) => {
            let (non_blocking, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::hourly(dir, "vbot.log"));
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .compact()
                .with_line_number(true)
                .with_filter(tracing_subscriber::EnvFilter::new(config.env_filter.clone()));

            tracing_subscriber::registry()
                .with(stdout_layer)
                .with(file_layer)
                .try_init()?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(stdout_layer).try_init()?;
            Ok(None)
        }
    }
}
