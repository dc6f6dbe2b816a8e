// src/dag/resolver.rs

//! Rebuild-set resolution.
//!
//! Seeds are the packages whose artifact is missing or whose source changed
//! (plus anything forced). If `kernel` is seeded, every kernel module is
//! seeded too. The seed is then closed over dependent edges: whatever depends
//! on a rebuilt package, through any edge kind, is rebuilt as well.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use tracing::{debug, info};

use crate::catalog::PackageId;
use crate::dag::graph::{DagGraph, EdgeKind};
use crate::errors::{BuilddagError, Result};
use crate::oracle::ChangeOracle;
use crate::types::PackageName;

/// Why a package ended up in the rebuild set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildReason {
    /// No previously built artifact exists.
    ArtifactMissing,
    /// Source hash differs from the last recorded build.
    HashChanged,
    /// Requested explicitly by the caller.
    Forced,
    /// A kernel module, seeded because `kernel` itself is rebuilt.
    KernelFanout,
    /// Reached through an edge from a package already in the set.
    Upstream { package: PackageName, kind: EdgeKind },
}

impl RebuildReason {
    /// Whether this package was a seed rather than pulled in by propagation.
    pub fn is_seed(&self) -> bool {
        !matches!(self, RebuildReason::Upstream { .. })
    }
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebuildReason::ArtifactMissing => f.write_str("artifact missing"),
            RebuildReason::HashChanged => f.write_str("source changed"),
            RebuildReason::Forced => f.write_str("forced"),
            RebuildReason::KernelFanout => f.write_str("kernel rebuilt"),
            RebuildReason::Upstream { package, kind } => {
                write!(f, "depends on {package} ({kind})")
            }
        }
    }
}

/// Packages that must be rebuilt this run, each with the first reason found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildSet {
    entries: BTreeMap<PackageName, RebuildEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildEntry {
    pub id: PackageId,
    pub reason: RebuildReason,
}

impl RebuildSet {
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Member names in lexical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    pub fn ids(&self) -> impl Iterator<Item = PackageId> + '_ {
        self.entries.values().map(|e| e.id)
    }

    pub fn reason_of(&self, name: &str) -> Option<&RebuildReason> {
        self.entries.get(name).map(|e| &e.reason)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RebuildEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Seed reasons for every member, dropping propagation reasons.
    ///
    /// Feeding this back into [`close`] reproduces the same set.
    pub fn seeds(&self) -> Vec<(PackageId, RebuildReason)> {
        let mut seeds: Vec<_> = self
            .entries
            .values()
            .filter(|e| e.reason.is_seed())
            .map(|e| (e.id, e.reason.clone()))
            .collect();
        seeds.sort_by_key(|(id, _)| *id);
        seeds
    }
}

/// Extra seeding requested by the caller on top of the oracle's verdicts.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Package names to rebuild regardless of their state.
    pub force: Vec<PackageName>,
    /// Rebuild every package.
    pub force_all: bool,
}

/// Compute the rebuild set from the oracle's verdicts.
pub fn resolve<O>(graph: &DagGraph<'_>, oracle: &O) -> Result<RebuildSet>
where
    O: ChangeOracle + ?Sized,
{
    resolve_with(graph, oracle, &ResolveOptions::default())
}

/// [`resolve`] with forced packages added to the seed.
pub fn resolve_with<O>(
    graph: &DagGraph<'_>,
    oracle: &O,
    options: &ResolveOptions,
) -> Result<RebuildSet>
where
    O: ChangeOracle + ?Sized,
{
    let seeds = seed(graph, oracle, options)?;
    let set = close(graph, seeds);
    info!(
        packages = set.len(),
        seeds = set.seeds().len(),
        "rebuild set resolved"
    );
    Ok(set)
}

/// Query the oracle once per package and collect the seed, applying the
/// kernel fanout rule.
fn seed<O>(
    graph: &DagGraph<'_>,
    oracle: &O,
    options: &ResolveOptions,
) -> Result<Vec<(PackageId, RebuildReason)>>
where
    O: ChangeOracle + ?Sized,
{
    let catalog = graph.catalog();
    let mut seeds: BTreeMap<PackageId, RebuildReason> = BTreeMap::new();

    for name in &options.force {
        let id = catalog
            .id_of(name)
            .ok_or_else(|| BuilddagError::PackageNotFound(name.clone()))?;
        seeds.insert(id, RebuildReason::Forced);
    }

    for pkg in catalog.packages() {
        if options.force_all {
            seeds.entry(pkg.id).or_insert(RebuildReason::Forced);
            continue;
        }
        if seeds.contains_key(&pkg.id) {
            continue;
        }

        let oracle_err = |source| BuilddagError::OracleError {
            package: pkg.name.clone(),
            source,
        };

        let exists = oracle.exists(pkg).map_err(oracle_err)?;
        if !exists {
            debug!(package = %pkg.name, "artifact missing; seeding");
            seeds.insert(pkg.id, RebuildReason::ArtifactMissing);
            continue;
        }

        if oracle.hash_changed(pkg).map_err(oracle_err)? {
            debug!(package = %pkg.name, "source hash changed; seeding");
            seeds.insert(pkg.id, RebuildReason::HashChanged);
        }
    }

    if let Some(kernel) = catalog.kernel().filter(|k| seeds.contains_key(k)) {
        for pkg in catalog.packages().filter(|p| p.kernel_module && p.id != kernel) {
            if !seeds.contains_key(&pkg.id) {
                debug!(package = %pkg.name, "kernel rebuilt; seeding kernel module");
                seeds.insert(pkg.id, RebuildReason::KernelFanout);
            }
        }
    }

    Ok(seeds.into_iter().collect())
}

/// Close a seed over dependent edges (breadth-first) until nothing new is
/// added.
///
/// A seed entry keeps its reason; every other member records the edge it
/// was first reached through. Closing an already closed set (for instance
/// `close(graph, set.seeds())`) yields the same set.
pub fn close<I>(graph: &DagGraph<'_>, seeds: I) -> RebuildSet
where
    I: IntoIterator<Item = (PackageId, RebuildReason)>,
{
    let catalog = graph.catalog();
    let mut members: BTreeMap<PackageId, RebuildReason> = BTreeMap::new();
    let mut queue: VecDeque<PackageId> = VecDeque::new();

    for (id, reason) in seeds {
        if !members.contains_key(&id) {
            members.insert(id, reason);
            queue.push_back(id);
        }
    }

    while let Some(id) = queue.pop_front() {
        for edge in graph.dependents_of(id) {
            if members.contains_key(&edge.to) {
                continue;
            }
            let reason = RebuildReason::Upstream {
                package: catalog.package(id).name.clone(),
                kind: edge.kind,
            };
            debug!(
                package = %catalog.package(edge.to).name,
                reason = %reason,
                "propagating rebuild"
            );
            members.insert(edge.to, reason);
            queue.push_back(edge.to);
        }
    }

    let entries = members
        .into_iter()
        .map(|(id, reason)| {
            (
                catalog.package(id).name.clone(),
                RebuildEntry { id, reason },
            )
        })
        .collect();

    RebuildSet { entries }
}
