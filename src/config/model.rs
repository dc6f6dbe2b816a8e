// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::FailurePolicy;

/// Top-level manifest as read from a TOML file.
///
/// ```toml
/// [config]
/// build_command = "make -C $BUILDDAG_SOURCE_DIR"
/// max_parallel = 4
///
/// [[sources]]
/// name = "openzfs"
/// repo = "https://github.com/truenas/zfs"
/// branch = "truenas/zfs-2.1-release"
/// kernel_module = true
///
///   [[sources.subpackages]]
///   name = "openzfs-dbg"
///   deps_path = "contrib/debian"
///
/// [[sources]]
/// name = "zectl"
/// repo = "https://github.com/truenas/zectl"
/// branch = "master"
/// explicit_deps = ["openzfs"]
///
/// [binary_packages]
/// zectl = [{ name = "zectl", source_package = "zectl" }]
/// ```
///
/// This is the unvalidated shape; use `Manifest::try_from` (or
/// `load_and_validate`) to obtain a [`Manifest`].
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawManifest {
    /// Global behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Source packages from `[[sources]]`, in declaration order.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// Binary packages produced by each package, keyed by package name.
    #[serde(default)]
    pub binary_packages: BTreeMap<String, Vec<BinaryPackageConfig>>,
}

/// Validated manifest.
///
/// Only constructible through `TryFrom<RawManifest>`, so holding one means
/// names are unique and explicit dependencies resolve.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub config: ConfigSection,
    pub sources: Vec<SourceConfig>,
    pub binary_packages: BTreeMap<String, Vec<BinaryPackageConfig>>,
}

impl Manifest {
    pub(crate) fn new_unchecked(raw: RawManifest) -> Self {
        Self {
            config: raw.config,
            sources: raw.sources,
            binary_packages: raw.binary_packages,
        }
    }

    /// Iterate over every declared package name, sub-packages included.
    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().flat_map(|src| {
            std::iter::once(src.name.as_str())
                .chain(src.subpackages.iter().map(|sub| sub.name.as_str()))
        })
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Shell command run once per package by the command backend.
    ///
    /// Not needed for `--dry-run`.
    #[serde(default)]
    pub build_command: Option<String>,

    /// Maximum number of packages built at the same time within one wave.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// `"skip-dependents"` (default) or `"abort"`.
    #[serde(default)]
    pub on_failure: FailurePolicy,

    /// Directory holding one checked-out source tree per `source_name`.
    #[serde(default = "default_sources_dir")]
    pub sources_dir: PathBuf,

    /// Directory holding one artifact directory per package name.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    /// Directory for recorded build hashes.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

fn default_max_parallel() -> usize {
    4
}

fn default_sources_dir() -> PathBuf {
    PathBuf::from("sources")
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("pkgdir")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".builddag")
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            build_command: None,
            max_parallel: default_max_parallel(),
            on_failure: FailurePolicy::default(),
            sources_dir: default_sources_dir(),
            artifacts_dir: default_artifacts_dir(),
            state_dir: default_state_dir(),
        }
    }
}

/// `[[sources]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,

    /// Where the source lives. Opaque to the resolver.
    pub repo: String,

    pub branch: String,

    /// Packages this one must be built after.
    #[serde(default)]
    pub explicit_deps: Vec<String>,

    /// Rebuild whenever the `kernel` package is rebuilt.
    #[serde(default)]
    pub kernel_module: bool,

    /// Lower sorts earlier within a wave; unset sorts last.
    #[serde(default)]
    pub batch_priority: Option<i64>,

    /// Packaging directory inside the source tree, passed to the builder.
    #[serde(default)]
    pub deps_path: Option<String>,

    #[serde(default)]
    pub subpackages: Vec<SubPackageConfig>,
}

/// `[[sources.subpackages]]` entry.
///
/// Origin, branch and source name always come from the parent. Fields left
/// unset here fall back to the parent's value where that makes sense
/// (`kernel_module`, `deps_path`); `batch_priority` and `explicit_deps` are
/// per-package.
#[derive(Debug, Clone, Deserialize)]
pub struct SubPackageConfig {
    pub name: String,

    /// Accepted for compatibility; the parent's branch always wins.
    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default)]
    pub explicit_deps: Vec<String>,

    #[serde(default)]
    pub kernel_module: Option<bool>,

    #[serde(default)]
    pub batch_priority: Option<i64>,

    #[serde(default)]
    pub deps_path: Option<String>,
}

/// One entry of `[binary_packages].<package>`.
#[derive(Debug, Clone, Deserialize)]
pub struct BinaryPackageConfig {
    pub name: String,

    /// Packaging identity of the owning source package (e.g. `openzfs-linux`).
    pub source_package: String,

    /// Names of binary packages that must be present to build this one.
    #[serde(default)]
    pub build_dependencies: Vec<String>,

    #[serde(default)]
    pub runtime_dependencies: Vec<String>,
}
