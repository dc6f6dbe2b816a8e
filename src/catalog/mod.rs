// src/catalog/mod.rs

//! In-memory package catalog.
//!
//! The catalog is an arena of [`Package`] and [`BinaryPackage`] records
//! addressed by [`PackageId`] / [`BinaryId`]. It is built fresh from a
//! [`Manifest`] at the start of every run and never mutated afterwards.

pub mod package;

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::model::{BinaryPackageConfig, Manifest};
use crate::errors::{BuilddagError, Result};

pub use package::{BinaryId, BinaryPackage, Package, PackageId, PackageKind};

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    packages: Vec<Package>,
    binaries: Vec<BinaryPackage>,
    by_name: HashMap<String, PackageId>,
    /// One binary name may be produced by several packages (a `-dbg`
    /// sub-package republishing its parent's binaries, for instance).
    binary_owners: HashMap<String, Vec<BinaryId>>,
}

impl Catalog {
    /// Build the catalog from a validated manifest.
    ///
    /// Sub-packages inherit origin, branch and source name from their parent,
    /// and inherit `kernel_module` / `deps_path` unless they set their own.
    pub fn from_manifest(manifest: &Manifest) -> Result<Self> {
        let mut catalog = Catalog::default();

        for src in &manifest.sources {
            let parent_id = catalog.insert_package(Package {
                id: PackageId(0),
                name: src.name.clone(),
                kind: PackageKind::Source,
                source_name: src.name.clone(),
                origin: src.repo.clone(),
                branch: src.branch.clone(),
                explicit_deps: src.explicit_deps.clone(),
                kernel_module: src.kernel_module,
                batch_priority: src.batch_priority,
                deps_path: src.deps_path.clone(),
                binary_packages: Vec::new(),
            })?;

            for sub in &src.subpackages {
                if let Some(branch) = sub.branch.as_deref() {
                    if branch != src.branch {
                        warn!(
                            package = %sub.name,
                            declared = %branch,
                            inherited = %src.branch,
                            "sub-package branch differs from its parent; using the parent's"
                        );
                    }
                }

                catalog.insert_package(Package {
                    id: PackageId(0),
                    name: sub.name.clone(),
                    kind: PackageKind::SubPackage { parent: parent_id },
                    source_name: src.name.clone(),
                    origin: src.repo.clone(),
                    branch: src.branch.clone(),
                    explicit_deps: sub.explicit_deps.clone(),
                    kernel_module: sub.kernel_module.unwrap_or(src.kernel_module),
                    batch_priority: sub.batch_priority,
                    deps_path: sub.deps_path.clone().or_else(|| src.deps_path.clone()),
                    binary_packages: Vec::new(),
                })?;
            }
        }

        for (owner, binaries) in &manifest.binary_packages {
            let owner_id = catalog
                .id_of(owner)
                .ok_or_else(|| BuilddagError::PackageNotFound(owner.clone()))?;
            for cfg in binaries {
                catalog.insert_binary(owner_id, cfg);
            }
        }

        debug!(
            packages = catalog.packages.len(),
            binaries = catalog.binaries.len(),
            "catalog built"
        );

        Ok(catalog)
    }

    fn insert_package(&mut self, mut package: Package) -> Result<PackageId> {
        if self.by_name.contains_key(&package.name) {
            return Err(BuilddagError::ConfigError(format!(
                "package '{}' is declared more than once",
                package.name
            )));
        }
        let id = PackageId(self.packages.len());
        package.id = id;
        self.by_name.insert(package.name.clone(), id);
        self.packages.push(package);
        Ok(id)
    }

    fn insert_binary(&mut self, owner: PackageId, cfg: &BinaryPackageConfig) {
        let id = BinaryId(self.binaries.len());
        self.binaries.push(BinaryPackage {
            id,
            name: cfg.name.clone(),
            source_package: cfg.source_package.clone(),
            build_dependencies: cfg.build_dependencies.clone(),
            runtime_dependencies: cfg.runtime_dependencies.clone(),
            owner,
        });
        self.binary_owners.entry(cfg.name.clone()).or_default().push(id);
        self.packages[owner.0].binary_packages.push(id);
    }

    /// All packages in declaration order (parents before their sub-packages).
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn id_of(&self, name: &str) -> Option<PackageId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&Package> {
        self.id_of(name).map(|id| &self.packages[id.0])
    }

    /// Look up a package by handle.
    ///
    /// Handles are only ever produced by this catalog, so this indexes
    /// directly.
    pub fn package(&self, id: PackageId) -> &Package {
        &self.packages[id.0]
    }

    pub fn binary(&self, id: BinaryId) -> &BinaryPackage {
        &self.binaries[id.0]
    }

    /// Binaries produced by a package.
    pub fn binaries_of(&self, id: PackageId) -> impl Iterator<Item = &BinaryPackage> {
        self.packages[id.0]
            .binary_packages
            .iter()
            .map(|bin| &self.binaries[bin.0])
    }

    /// Packages producing a binary with the given name (empty when the name
    /// is not managed by this catalog).
    pub fn owners_of_binary(&self, binary_name: &str) -> Vec<PackageId> {
        self.binary_owners
            .get(binary_name)
            .map(|ids| ids.iter().map(|id| self.binaries[id.0].owner).collect())
            .unwrap_or_default()
    }

    /// The package named `kernel`, if the manifest declares one.
    pub fn kernel(&self) -> Option<PackageId> {
        self.id_of(KERNEL_PACKAGE)
    }
}

/// Name of the package whose rebuild fans out to every kernel module.
pub const KERNEL_PACKAGE: &str = "kernel";
