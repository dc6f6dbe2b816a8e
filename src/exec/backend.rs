// src/exec/backend.rs

//! Pluggable build backend abstraction.
//!
//! The wave runner talks to a `BuildBackend` instead of spawning processes
//! itself. This makes it easy to swap in a fake backend in tests while
//! keeping the production implementation in [`super::task_runner`].
//!
//! - `CommandBackend` is the default implementation used by `builddag`. It
//!   runs `[config].build_command` once per package.
//! - Tests can provide their own `BuildBackend` that, for example, records
//!   which packages were built and fails some of them on purpose.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::engine::{BuildJob, BuildOutcome};
use crate::errors::{BuilddagError, Result};

use super::task_runner::run_build;

/// Boxed, `'static` build future so the runner can spawn it on Tokio.
pub type BuildFuture = Pin<Box<dyn Future<Output = Result<BuildOutcome>> + Send + 'static>>;

/// Trait abstracting how a single package gets built.
pub trait BuildBackend: Send + Sync {
    /// Build one package.
    ///
    /// `Ok(BuildOutcome::Failed(_))` means the build ran and failed; `Err`
    /// means it could not be run at all. Both count as a failure of the
    /// package.
    fn build(&self, job: BuildJob) -> BuildFuture;
}

/// Production backend: runs a shell command per package.
///
/// The command sees the package through `BUILDDAG_*` environment variables
/// and runs with the package's source tree as working directory.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    command: String,
    sources_dir: PathBuf,
}

impl CommandBackend {
    pub fn new(command: impl Into<String>, sources_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            sources_dir: sources_dir.into(),
        }
    }
}

impl BuildBackend for CommandBackend {
    fn build(&self, job: BuildJob) -> BuildFuture {
        let command = self.command.clone();
        let source_dir = self.sources_dir.join(&job.source_name);

        Box::pin(async move {
            run_build(&job, &command, &source_dir)
                .await
                .map_err(BuilddagError::from)
        })
    }
}
