// src/logging.rs

//! `tracing` subscriber setup.
//!
//! `--log-level` wins over `BUILDDAG_LOG`, which accepts anything an
//! `EnvFilter` does ("debug", "builddag::engine=trace,info"). Without either
//! we log at `info`. Output goes to stderr; stdout carries the dry-run plan
//! and the build report.

use anyhow::{Result, anyhow};
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "BUILDDAG_LOG";

/// Install the global subscriber. Fails if one is already set.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = cli_level
        .map(|lvl| EnvFilter::new(Level::from(lvl).as_str()))
        .or_else(env_filter)
        .unwrap_or_else(|| EnvFilter::new(Level::INFO.as_str()));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to initialise logging: {e}"))
}

/// Filter from `BUILDDAG_LOG`; unset, blank or unparsable values are ignored.
fn env_filter() -> Option<EnvFilter> {
    let raw = std::env::var(LOG_ENV_VAR).ok()?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    // "warning" is a common spelling that EnvFilter rejects.
    let directives = if raw.eq_ignore_ascii_case("warning") { "warn" } else { raw };
    EnvFilter::try_new(directives).ok()
}
