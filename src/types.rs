// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Canonical package name type used throughout the crate.
pub type PackageName = String;

/// What the wave runner does once a package build fails.
///
/// - `SkipDependents`: skip every package downstream of the failure and keep
///   building everything else (default behaviour).
/// - `Abort`: let the current wave finish, then skip all remaining waves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    #[default]
    SkipDependents,
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip-dependents" | "skip_dependents" => Ok(FailurePolicy::SkipDependents),
            "abort" => Ok(FailurePolicy::Abort),
            other => Err(format!(
                "invalid on_failure: {other} (expected \"skip-dependents\" or \"abort\")"
            )),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::SkipDependents => f.write_str("skip-dependents"),
            FailurePolicy::Abort => f.write_str("abort"),
        }
    }
}
