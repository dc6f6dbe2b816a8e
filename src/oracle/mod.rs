// src/oracle/mod.rs

//! Change oracle: "is this package's artifact missing, or has its source
//! changed since the last successful build?"
//!
//! - [`ChangeOracle`] is the narrow interface the resolver consumes.
//! - [`hash`] holds source tree hashing and recorded-hash storage.
//! - [`source_tree`] implements the oracle over the filesystem.

pub mod hash;
pub mod source_tree;

use anyhow::Result;

use crate::catalog::Package;

pub use hash::{FileHashStore, HashStore, MemoryHashStore};
pub use source_tree::SourceTreeOracle;

/// Per-package build state queries.
///
/// An `Err` means the state could not be determined; callers must not treat
/// it as either answer.
pub trait ChangeOracle {
    /// Does a previously built artifact exist?
    fn exists(&self, package: &Package) -> Result<bool>;

    /// Does the current source hash differ from the last recorded build?
    fn hash_changed(&self, package: &Package) -> Result<bool>;
}
