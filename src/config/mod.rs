// src/config/mod.rs

//! Manifest loading and validation.
//!
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a manifest from disk (`loader.rs`).
//! - Validate names and explicit dependencies (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_manifest_path, load_and_validate, load_from_path};
pub use model::{
    BinaryPackageConfig, ConfigSection, Manifest, RawManifest, SourceConfig, SubPackageConfig,
};
