// src/oracle/source_tree.rs

//! Change oracle backed by checked-out source trees and artifact directories.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow, bail};
use tracing::debug;

use crate::catalog::Package;
use crate::fs::FileSystem;
use crate::oracle::hash::{HashStore, compute_package_hash, compute_tree_hash};
use crate::oracle::ChangeOracle;

/// Answers "missing or changed?" from the filesystem:
///
/// - a package's artifact exists when `<artifacts_dir>/<name>` is a directory;
/// - its current hash covers origin, branch and every file under
///   `<sources_dir>/<source_name>`;
/// - it changed when that hash differs from the one recorded after its last
///   successful build (or none was recorded).
///
/// Tree hashes are computed once per source name and cached for the life of
/// the oracle, so repeated queries within a run agree.
pub struct SourceTreeOracle {
    fs: Arc<dyn FileSystem>,
    sources_dir: PathBuf,
    artifacts_dir: PathBuf,
    store: Mutex<Box<dyn HashStore>>,
    tree_hashes: Mutex<HashMap<String, String>>,
}

impl SourceTreeOracle {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        sources_dir: impl Into<PathBuf>,
        artifacts_dir: impl Into<PathBuf>,
        store: Box<dyn HashStore>,
    ) -> Self {
        Self {
            fs,
            sources_dir: sources_dir.into(),
            artifacts_dir: artifacts_dir.into(),
            store: Mutex::new(store),
            tree_hashes: Mutex::new(HashMap::new()),
        }
    }

    pub fn source_dir(&self, package: &Package) -> PathBuf {
        self.sources_dir.join(&package.source_name)
    }

    pub fn artifact_dir(&self, package: &Package) -> PathBuf {
        self.artifacts_dir.join(&package.name)
    }

    /// Current hash of the package's source identity and tree.
    pub fn current_hash(&self, package: &Package) -> Result<String> {
        let tree_hash = self.tree_hash(package)?;
        Ok(compute_package_hash(
            &package.origin,
            &package.branch,
            &tree_hash,
        ))
    }

    fn tree_hash(&self, package: &Package) -> Result<String> {
        let mut cache = self
            .tree_hashes
            .lock()
            .map_err(|_| anyhow!("source hash cache lock poisoned"))?;
        if let Some(hash) = cache.get(&package.source_name) {
            return Ok(hash.clone());
        }

        let dir = self.source_dir(package);
        if !self.fs.is_dir(&dir) {
            bail!("source tree {:?} is missing", dir);
        }
        let hash = compute_tree_hash(self.fs.as_ref(), &dir)?;
        cache.insert(package.source_name.clone(), hash.clone());
        Ok(hash)
    }

    /// Hash every package about to be built, before any build runs.
    ///
    /// Builds write into their source tree, so hashing afterwards would
    /// record the build's own outputs. A missing source tree fails here
    /// instead of after the build.
    pub fn snapshot<'a, I>(&self, packages: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Package>,
    {
        for package in packages {
            let hash = self
                .current_hash(package)
                .with_context(|| format!("hashing sources of package '{}'", package.name))?;
            debug!(package = %package.name, hash = %hash, "snapshotted source hash");
        }
        Ok(())
    }

    /// Record the package's hash as of its last successful build.
    ///
    /// Uses the cached tree hash, so after [`Self::snapshot`] this is the
    /// hash of the tree the build started from.
    pub fn record_build(&self, package: &Package) -> Result<()> {
        let hash = self.current_hash(package)?;
        let mut store = self
            .store
            .lock()
            .map_err(|_| anyhow!("hash store lock poisoned"))?;
        store.save(&package.name, &hash)
    }

    /// Drop recorded hashes of packages no longer in the manifest.
    pub fn prune(&self, active: &[&str]) -> Result<()> {
        let mut store = self
            .store
            .lock()
            .map_err(|_| anyhow!("hash store lock poisoned"))?;
        store.prune(active)
    }
}

impl ChangeOracle for SourceTreeOracle {
    fn exists(&self, package: &Package) -> Result<bool> {
        Ok(self.fs.is_dir(&self.artifact_dir(package)))
    }

    fn hash_changed(&self, package: &Package) -> Result<bool> {
        let current = self.current_hash(package)?;
        let recorded = self
            .store
            .lock()
            .map_err(|_| anyhow!("hash store lock poisoned"))?
            .load(&package.name)?;

        let changed = recorded.as_deref() != Some(current.as_str());
        debug!(
            package = %package.name,
            recorded = ?recorded,
            current = %current,
            changed,
            "compared source hash"
        );
        Ok(changed)
    }
}
