// src/engine/mod.rs

//! Wave execution engine.
//!
//! The engine consumes a [`crate::dag::BuildPlan`] and hands each package to
//! an [`crate::exec::BuildBackend`]:
//! - builds within one wave run concurrently (bounded by `max_parallel`);
//! - a wave starts only once every build of the previous wave reported back;
//! - a failure skips the failed package's downstream dependents (or, with
//!   [`FailurePolicy::Abort`], every later wave).
//!
//! The wave loop lives in [`runtime`].

use std::collections::BTreeSet;

use crate::catalog::Package;
use crate::types::PackageName;

pub use crate::types::FailurePolicy;

/// Outcome of one package build as reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Success,
    Failed(i32),
}

/// Everything a backend needs to build one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildJob {
    pub package: PackageName,
    pub source_name: String,
    pub origin: String,
    pub branch: String,
    pub deps_path: Option<String>,
    /// Index of the wave this build belongs to.
    pub wave: usize,
}

impl BuildJob {
    pub fn from_package(package: &Package, wave: usize) -> Self {
        Self {
            package: package.name.clone(),
            source_name: package.source_name.clone(),
            origin: package.origin.clone(),
            branch: package.branch.clone(),
            deps_path: package.deps_path.clone(),
            wave,
        }
    }
}

/// A package whose build did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub package: PackageName,
    /// Exit code when the build ran and failed; `None` when it could not run.
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

/// Result of executing a whole plan.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Succeeded packages, wave by wave.
    pub succeeded: Vec<PackageName>,
    pub failed: Vec<BuildFailure>,
    /// Packages never attempted because something they depend on failed.
    pub skipped: BTreeSet<PackageName>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    pub fn failed_names(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(|f| f.package.as_str())
    }
}

pub mod runtime;

pub use runtime::WaveRunner;
