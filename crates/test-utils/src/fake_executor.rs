use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use builddag::engine::{BuildJob, BuildOutcome};
use builddag::errors::BuilddagError;
use builddag::exec::{BuildBackend, BuildFuture};

/// What the fake backend observed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    Started { package: String, wave: usize },
    Finished { package: String, success: bool },
}

/// A fake backend that:
/// - records when each build started and finished;
/// - fails packages in `failing` with exit code 1;
/// - returns a backend error for packages in `broken`;
/// - optionally sleeps per build, so concurrent builds overlap.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    events: Arc<Mutex<Vec<BuildEvent>>>,
    failing: BTreeSet<String>,
    broken: BTreeSet<String>,
    delay: Option<Duration>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, names: &[&str]) -> Self {
        self.failing.extend(names.iter().map(|s| s.to_string()));
        self
    }

    pub fn broken(mut self, names: &[&str]) -> Self {
        self.broken.extend(names.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn events(&self) -> Vec<BuildEvent> {
        self.events.lock().expect("event log lock poisoned").clone()
    }

    /// Package names in the order their builds started.
    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                BuildEvent::Started { package, .. } => Some(package),
                BuildEvent::Finished { .. } => None,
            })
            .collect()
    }

    /// Highest number of builds that were running at the same time.
    pub fn max_concurrency(&self) -> usize {
        let mut running = 0usize;
        let mut max = 0usize;
        for event in self.events() {
            match event {
                BuildEvent::Started { .. } => {
                    running += 1;
                    max = max.max(running);
                }
                BuildEvent::Finished { .. } => running = running.saturating_sub(1),
            }
        }
        max
    }
}

impl BuildBackend for FakeBackend {
    fn build(&self, job: BuildJob) -> BuildFuture {
        let events = Arc::clone(&self.events);
        let fail = self.failing.contains(&job.package);
        let broken = self.broken.contains(&job.package);
        let delay = self.delay;

        Box::pin(async move {
            events
                .lock()
                .expect("event log lock poisoned")
                .push(BuildEvent::Started {
                    package: job.package.clone(),
                    wave: job.wave,
                });

            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            events
                .lock()
                .expect("event log lock poisoned")
                .push(BuildEvent::Finished {
                    package: job.package.clone(),
                    success: !(fail || broken),
                });

            if broken {
                return Err(BuilddagError::Other(anyhow!(
                    "could not start build of '{}'",
                    job.package
                )));
            }
            Ok(if fail {
                BuildOutcome::Failed(1)
            } else {
                BuildOutcome::Success
            })
        })
    }
}
