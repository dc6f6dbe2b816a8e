// src/catalog/package.rs

//! Package records stored in the [`Catalog`](super::Catalog) arenas.

use std::fmt;

use crate::types::PackageName;

/// Stable handle of a [`Package`] inside one catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageId(pub(crate) usize);

impl PackageId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable handle of a [`BinaryPackage`] inside one catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BinaryId(pub(crate) usize);

/// Whether a package stands on its own or extends a parent's source tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    Source,
    SubPackage { parent: PackageId },
}

/// One buildable unit.
#[derive(Debug, Clone)]
pub struct Package {
    pub id: PackageId,
    pub name: PackageName,
    pub kind: PackageKind,
    /// Source-tree identity; shared by a package and its sub-packages.
    pub source_name: String,
    pub origin: String,
    pub branch: String,
    pub explicit_deps: Vec<PackageName>,
    pub kernel_module: bool,
    pub batch_priority: Option<i64>,
    pub deps_path: Option<String>,
    /// Binaries produced by this package.
    pub binary_packages: Vec<BinaryId>,
}

impl Package {
    pub fn parent(&self) -> Option<PackageId> {
        match self.kind {
            PackageKind::Source => None,
            PackageKind::SubPackage { parent } => Some(parent),
        }
    }
}

/// Installable artifact produced by exactly one [`Package`].
#[derive(Debug, Clone)]
pub struct BinaryPackage {
    pub id: BinaryId,
    pub name: String,
    /// Packaging identity of the owner (e.g. `openzfs-linux`).
    pub source_package: String,
    pub build_dependencies: Vec<String>,
    pub runtime_dependencies: Vec<String>,
    /// Handle back to the owning package; never an ownership pointer.
    pub owner: PackageId,
}
