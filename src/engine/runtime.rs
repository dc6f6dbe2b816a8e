// src/engine/runtime.rs

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::dag::{BuildPlan, DagGraph};
use crate::errors::{BuilddagError, Result};
use crate::exec::BuildBackend;
use crate::types::{FailurePolicy, PackageName};

use super::{BuildFailure, BuildJob, BuildOutcome, RunReport};

/// Executes a [`BuildPlan`] wave by wave through a [`BuildBackend`].
///
/// Wave N+1 is not started until every build of wave N has reported back,
/// since later waves may need the artifacts earlier waves just produced.
pub struct WaveRunner<B: BuildBackend> {
    backend: Arc<B>,
    max_parallel: usize,
    policy: FailurePolicy,
}

impl<B: BuildBackend> fmt::Debug for WaveRunner<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaveRunner")
            .field("max_parallel", &self.max_parallel)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<B: BuildBackend + 'static> WaveRunner<B> {
    pub fn new(backend: B, max_parallel: usize, policy: FailurePolicy) -> Self {
        Self {
            backend: Arc::new(backend),
            max_parallel: max_parallel.max(1),
            policy,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run every wave of `plan`.
    ///
    /// Build failures end up in the report; only infrastructure problems (a
    /// build task panicking) are returned as errors.
    pub async fn run(&self, graph: &DagGraph<'_>, plan: &BuildPlan) -> Result<RunReport> {
        let catalog = graph.catalog();
        let mut report = RunReport::default();
        let mut aborted = false;

        info!(
            waves = plan.len(),
            packages = plan.package_count(),
            max_parallel = self.max_parallel,
            policy = %self.policy,
            "starting build plan"
        );

        for wave in plan.waves() {
            if aborted {
                report.skipped.extend(wave.packages.iter().cloned());
                continue;
            }

            let jobs: Vec<BuildJob> = wave
                .packages
                .iter()
                .filter(|name| !report.skipped.contains(*name))
                .filter_map(|name| catalog.get(name))
                .map(|pkg| BuildJob::from_package(pkg, wave.index))
                .collect();

            if jobs.is_empty() {
                debug!(wave = wave.index, "every package of this wave was skipped");
                continue;
            }

            info!(
                wave = wave.index,
                packages = ?jobs.iter().map(|j| j.package.as_str()).collect::<Vec<_>>(),
                "starting wave"
            );

            let failures = self.run_wave(jobs, &mut report).await?;

            for failed in &failures {
                let blocked = plan.blocked_by(graph, failed);
                if !blocked.is_empty() {
                    warn!(
                        package = %failed,
                        skipped = ?blocked,
                        "skipping dependents of failed package"
                    );
                }
                report.skipped.extend(blocked);
            }

            if !failures.is_empty() && self.policy == FailurePolicy::Abort {
                warn!(wave = wave.index, "build failed; aborting remaining waves");
                aborted = true;
            }
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "build plan finished"
        );

        Ok(report)
    }

    /// Run one wave to completion (the barrier) and return the packages that
    /// failed in it.
    async fn run_wave(
        &self,
        jobs: Vec<BuildJob>,
        report: &mut RunReport,
    ) -> Result<BTreeSet<PackageName>> {
        let permits = Arc::new(Semaphore::new(self.max_parallel));
        let mut set = JoinSet::new();

        for job in jobs {
            let name = job.package.clone();
            let build = self.backend.build(job);
            let permits = Arc::clone(&permits);
            set.spawn(async move {
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => build.await,
                    Err(e) => Err(BuilddagError::Other(e.into())),
                };
                (name, outcome)
            });
        }

        let mut failed = BTreeSet::new();
        let mut succeeded = Vec::new();

        while let Some(joined) = set.join_next().await {
            let (name, outcome) = joined
                .map_err(|e| BuilddagError::Other(anyhow::anyhow!("build task panicked: {e}")))?;

            match outcome {
                Ok(BuildOutcome::Success) => {
                    info!(package = %name, "build succeeded");
                    succeeded.push(name);
                }
                Ok(BuildOutcome::Failed(code)) => {
                    warn!(package = %name, exit_code = code, "build failed");
                    report.failed.push(BuildFailure {
                        package: name.clone(),
                        exit_code: Some(code),
                        error: None,
                    });
                    failed.insert(name);
                }
                Err(err) => {
                    warn!(package = %name, error = %err, "build could not be run");
                    report.failed.push(BuildFailure {
                        package: name.clone(),
                        exit_code: None,
                        error: Some(err.to_string()),
                    });
                    failed.insert(name);
                }
            }
        }

        succeeded.sort();
        report.succeeded.extend(succeeded);
        Ok(failed)
    }
}
