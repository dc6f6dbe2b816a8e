// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{Manifest, RawManifest};
use crate::errors::{BuilddagError, Result};

impl TryFrom<RawManifest> for Manifest {
    type Error = BuilddagError;

    fn try_from(raw: RawManifest) -> std::result::Result<Self, Self::Error> {
        validate_raw_manifest(&raw)?;
        Ok(Manifest::new_unchecked(raw))
    }
}

/// Shape checks that need nothing but the manifest itself.
///
/// Edges that depend on binary packages and the kernel-module flag, and
/// therefore cycle detection, are checked when the graph is built.
fn validate_raw_manifest(raw: &RawManifest) -> Result<()> {
    ensure_has_sources(raw)?;
    validate_global_config(raw)?;
    let names = validate_package_names(raw)?;
    validate_explicit_deps(raw, &names)?;
    validate_binary_owners(raw, &names)?;
    Ok(())
}

fn ensure_has_sources(raw: &RawManifest) -> Result<()> {
    if raw.sources.is_empty() {
        return Err(BuilddagError::ConfigError(
            "manifest must contain at least one [[sources]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(raw: &RawManifest) -> Result<()> {
    if raw.config.max_parallel == 0 {
        return Err(BuilddagError::ConfigError(
            "[config].max_parallel must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_package_names(raw: &RawManifest) -> Result<HashSet<&str>> {
    let mut names = HashSet::new();

    let all = raw.sources.iter().flat_map(|src| {
        std::iter::once(src.name.as_str()).chain(src.subpackages.iter().map(|s| s.name.as_str()))
    });

    for name in all {
        if name.trim().is_empty() {
            return Err(BuilddagError::ConfigError(
                "package names must not be empty".to_string(),
            ));
        }
        if !names.insert(name) {
            return Err(BuilddagError::ConfigError(format!(
                "package '{}' is declared more than once",
                name
            )));
        }
    }

    Ok(names)
}

fn validate_explicit_deps(raw: &RawManifest, names: &HashSet<&str>) -> Result<()> {
    let declared = raw.sources.iter().flat_map(|src| {
        std::iter::once((src.name.as_str(), &src.explicit_deps))
            .chain(src.subpackages.iter().map(|s| (s.name.as_str(), &s.explicit_deps)))
    });

    for (name, deps) in declared {
        for dep in deps {
            if dep == name {
                return Err(BuilddagError::ConfigError(format!(
                    "package '{}' cannot depend on itself in `explicit_deps`",
                    name
                )));
            }
            if !names.contains(dep.as_str()) {
                return Err(BuilddagError::UnknownDependency {
                    package: name.to_string(),
                    dependency: dep.clone(),
                });
            }
        }
    }
    Ok(())
}

fn validate_binary_owners(raw: &RawManifest, names: &HashSet<&str>) -> Result<()> {
    for owner in raw.binary_packages.keys() {
        if !names.contains(owner.as_str()) {
            return Err(BuilddagError::ConfigError(format!(
                "[binary_packages] lists binaries for undeclared package '{}'",
                owner
            )));
        }
    }
    Ok(())
}
