// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `builddag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "builddag",
    version,
    about = "Rebuild only the packages whose sources changed, plus everything downstream of them.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the build manifest (TOML).
    ///
    /// Default: `Builddag.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Builddag.toml")]
    pub manifest: String,

    /// Resolve and print the build plan, but don't build anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Rebuild this package even if the oracle reports it as unchanged.
    ///
    /// May be given more than once.
    #[arg(long, value_name = "NAME")]
    pub force: Vec<String>,

    /// Rebuild every package in the manifest.
    #[arg(long)]
    pub force_all: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
