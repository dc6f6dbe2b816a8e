#![allow(dead_code)]

use std::collections::BTreeMap;

use builddag::config::{
    BinaryPackageConfig, ConfigSection, Manifest, RawManifest, SourceConfig, SubPackageConfig,
};
use builddag::types::FailurePolicy;

/// Builder for `Manifest` to simplify test setup.
pub struct ManifestBuilder {
    manifest: RawManifest,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self {
            manifest: RawManifest {
                config: ConfigSection::default(),
                sources: Vec::new(),
                binary_packages: BTreeMap::new(),
            },
        }
    }

    pub fn with_source(mut self, source: SourceConfig) -> Self {
        self.manifest.sources.push(source);
        self
    }

    /// Declare the binaries produced by `owner`.
    pub fn with_binaries(mut self, owner: &str, binaries: Vec<BinaryPackageConfig>) -> Self {
        self.manifest
            .binary_packages
            .entry(owner.to_string())
            .or_default()
            .extend(binaries);
        self
    }

    pub fn with_build_command(mut self, cmd: &str) -> Self {
        self.manifest.config.build_command = Some(cmd.to_string());
        self
    }

    pub fn with_max_parallel(mut self, n: usize) -> Self {
        self.manifest.config.max_parallel = n;
        self
    }

    pub fn with_on_failure(mut self, policy: FailurePolicy) -> Self {
        self.manifest.config.on_failure = policy;
        self
    }

    /// The unvalidated manifest, for tests exercising validation itself.
    pub fn raw(self) -> RawManifest {
        self.manifest
    }

    pub fn build(self) -> Manifest {
        Manifest::try_from(self.manifest).expect("Failed to build valid manifest from builder")
    }
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `SourceConfig`.
pub struct SourceBuilder {
    source: SourceConfig,
}

impl SourceBuilder {
    /// Source with a repo derived from its name and branch `master`.
    pub fn new(name: &str) -> Self {
        Self {
            source: SourceConfig {
                name: name.to_string(),
                repo: format!("https://github.com/truenas/{name}"),
                branch: "master".to_string(),
                explicit_deps: vec![],
                kernel_module: false,
                batch_priority: None,
                deps_path: None,
                subpackages: vec![],
            },
        }
    }

    pub fn repo(mut self, repo: &str) -> Self {
        self.source.repo = repo.to_string();
        self
    }

    pub fn branch(mut self, branch: &str) -> Self {
        self.source.branch = branch.to_string();
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.source.explicit_deps.push(dep.to_string());
        self
    }

    pub fn kernel_module(mut self, val: bool) -> Self {
        self.source.kernel_module = val;
        self
    }

    pub fn batch_priority(mut self, priority: i64) -> Self {
        self.source.batch_priority = Some(priority);
        self
    }

    pub fn deps_path(mut self, path: &str) -> Self {
        self.source.deps_path = Some(path.to_string());
        self
    }

    pub fn subpackage(mut self, sub: SubPackageConfig) -> Self {
        self.source.subpackages.push(sub);
        self
    }

    pub fn build(self) -> SourceConfig {
        self.source
    }
}

/// Builder for `SubPackageConfig`.
pub struct SubPackageBuilder {
    sub: SubPackageConfig,
}

impl SubPackageBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            sub: SubPackageConfig {
                name: name.to_string(),
                branch: None,
                explicit_deps: vec![],
                kernel_module: None,
                batch_priority: None,
                deps_path: None,
            },
        }
    }

    pub fn branch(mut self, branch: &str) -> Self {
        self.sub.branch = Some(branch.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.sub.explicit_deps.push(dep.to_string());
        self
    }

    pub fn kernel_module(mut self, val: bool) -> Self {
        self.sub.kernel_module = Some(val);
        self
    }

    pub fn batch_priority(mut self, priority: i64) -> Self {
        self.sub.batch_priority = Some(priority);
        self
    }

    pub fn deps_path(mut self, path: &str) -> Self {
        self.sub.deps_path = Some(path.to_string());
        self
    }

    pub fn build(self) -> SubPackageConfig {
        self.sub
    }
}

/// A binary package without build dependencies.
pub fn binary(name: &str, source_package: &str) -> BinaryPackageConfig {
    BinaryPackageConfig {
        name: name.to_string(),
        source_package: source_package.to_string(),
        build_dependencies: vec![],
        runtime_dependencies: vec![],
    }
}

/// A binary package that build-depends on the given binaries.
pub fn binary_with_deps(
    name: &str,
    source_package: &str,
    build_dependencies: &[&str],
) -> BinaryPackageConfig {
    BinaryPackageConfig {
        build_dependencies: build_dependencies.iter().map(|s| s.to_string()).collect(),
        ..binary(name, source_package)
    }
}
