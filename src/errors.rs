// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuilddagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown dependency '{dependency}' declared by package '{package}'")]
    UnknownDependency { package: String, dependency: String },

    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Cycle detected in package graph: {0}")]
    DagCycle(String),

    #[error("Could not determine build state of package '{package}': {source}")]
    OracleError {
        package: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuilddagError>;
