use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use builddag::catalog::Package;
use builddag::oracle::ChangeOracle;

/// A scripted change oracle that:
/// - reports packages in `changed` as hash-changed;
/// - reports packages in `missing` as having no artifact;
/// - fails every query for packages in `failing`;
/// - counts how often each package was queried.
#[derive(Debug, Default)]
pub struct FakeOracle {
    changed: BTreeSet<String>,
    missing: BTreeSet<String>,
    failing: BTreeSet<String>,
    queries: Mutex<BTreeMap<String, Queries>>,
}

/// Per-package query counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Queries {
    pub exists: usize,
    pub hash_changed: usize,
}

impl FakeOracle {
    /// Every artifact exists and nothing changed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every artifact exists; `names` report a changed hash.
    pub fn changed(names: &[&str]) -> Self {
        Self::new().with_changed(names)
    }

    pub fn with_changed(mut self, names: &[&str]) -> Self {
        self.changed.extend(names.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_missing(mut self, names: &[&str]) -> Self {
        self.missing.extend(names.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_failing(mut self, names: &[&str]) -> Self {
        self.failing.extend(names.iter().map(|s| s.to_string()));
        self
    }

    pub fn queries_for(&self, name: &str) -> Queries {
        self.queries
            .lock()
            .expect("query counter lock poisoned")
            .get(name)
            .copied()
            .unwrap_or_default()
    }

    /// Every package queried at least once, with its counters.
    pub fn all_queries(&self) -> BTreeMap<String, Queries> {
        self.queries
            .lock()
            .expect("query counter lock poisoned")
            .clone()
    }

    fn record(&self, name: &str, f: impl FnOnce(&mut Queries)) {
        let mut queries = self.queries.lock().expect("query counter lock poisoned");
        f(queries.entry(name.to_string()).or_default());
    }

    fn check_failing(&self, name: &str) -> Result<()> {
        if self.failing.contains(name) {
            return Err(anyhow!("state store unreachable for '{name}'"));
        }
        Ok(())
    }
}

impl ChangeOracle for FakeOracle {
    fn exists(&self, package: &Package) -> Result<bool> {
        self.record(&package.name, |q| q.exists += 1);
        self.check_failing(&package.name)?;
        Ok(!self.missing.contains(&package.name))
    }

    fn hash_changed(&self, package: &Package) -> Result<bool> {
        self.record(&package.name, |q| q.hash_changed += 1);
        self.check_failing(&package.name)?;
        Ok(self.changed.contains(&package.name))
    }
}
