// src/dag/scheduler.rs

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use tracing::{debug, info};

use crate::catalog::{Catalog, Package, PackageId};
use crate::dag::graph::DagGraph;
use crate::dag::resolver::RebuildSet;
use crate::errors::{BuilddagError, Result};
use crate::types::PackageName;

/// Packages that may build concurrently.
///
/// `packages` is ordered by ascending `batch_priority` (unset last), then by
/// name. The order is for presentation only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wave {
    pub index: usize,
    pub packages: Vec<PackageName>,
}

/// Rebuild set ordered into waves.
///
/// Every package's dependencies inside the rebuild set sit in earlier waves,
/// so waves run one after another with all builds of one wave in parallel.
#[derive(Debug, Clone, Default)]
pub struct BuildPlan {
    waves: Vec<Wave>,
    wave_by_name: HashMap<PackageName, usize>,
}

impl BuildPlan {
    pub fn waves(&self) -> &[Wave] {
        &self.waves
    }

    /// Number of waves.
    pub fn len(&self) -> usize {
        self.waves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    /// Number of packages across all waves.
    pub fn package_count(&self) -> usize {
        self.wave_by_name.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.wave_by_name.contains_key(name)
    }

    pub fn wave_of(&self, name: &str) -> Option<usize> {
        self.wave_by_name.get(name).copied()
    }

    /// Plan members that (directly or transitively) depend on `failed` and
    /// therefore must not be attempted once it failed.
    ///
    /// `failed` itself is not included. Packages without a dependency path to
    /// it are unaffected.
    pub fn blocked_by(&self, graph: &DagGraph<'_>, failed: &str) -> BTreeSet<PackageName> {
        let catalog = graph.catalog();
        let mut blocked = BTreeSet::new();
        let Some(root) = catalog.id_of(failed) else {
            return blocked;
        };

        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            for edge in graph.dependents_of(id) {
                let name = &catalog.package(edge.to).name;
                if self.contains(name) && blocked.insert(name.clone()) {
                    stack.push(edge.to);
                }
            }
        }

        blocked
    }
}

/// Order a rebuild set into waves (Kahn's algorithm, one layer per wave).
///
/// Only edges between members count. A cycle among members cannot occur for
/// a graph built by [`DagGraph::build`]; it is still reported as
/// [`BuilddagError::DagCycle`] rather than silently dropping packages.
pub fn schedule(graph: &DagGraph<'_>, set: &RebuildSet) -> Result<BuildPlan> {
    let catalog = graph.catalog();
    let members: BTreeSet<PackageId> = set.ids().collect();

    // Distinct predecessors / successors within the set; several edge kinds
    // between the same pair count once.
    let mut pending: BTreeMap<PackageId, usize> = BTreeMap::new();
    let mut successors: BTreeMap<PackageId, BTreeSet<PackageId>> = BTreeMap::new();
    for &id in &members {
        let preds: BTreeSet<PackageId> = graph
            .dependencies_of(id)
            .iter()
            .map(|e| e.from)
            .filter(|from| members.contains(from))
            .collect();
        pending.insert(id, preds.len());
        for pred in preds {
            successors.entry(pred).or_default().insert(id);
        }
    }

    let mut ready: VecDeque<PackageId> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut plan = BuildPlan::default();

    while !ready.is_empty() {
        let mut layer: Vec<PackageId> = ready.drain(..).collect();
        sort_wave(catalog, &mut layer);

        for id in &layer {
            for succ in successors.get(id).into_iter().flatten() {
                if let Some(count) = pending.get_mut(succ) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(*succ);
                    }
                }
            }
        }

        let index = plan.waves.len();
        let packages: Vec<PackageName> = layer
            .iter()
            .map(|id| catalog.package(*id).name.clone())
            .collect();
        for name in &packages {
            plan.wave_by_name.insert(name.clone(), index);
        }
        debug!(wave = index, ?packages, "wave scheduled");
        plan.waves.push(Wave { index, packages });
    }

    if plan.package_count() < members.len() {
        let mut stuck: Vec<&str> = members
            .iter()
            .map(|id| catalog.package(*id).name.as_str())
            .filter(|name| !plan.contains(name))
            .collect();
        stuck.sort_unstable();
        return Err(BuilddagError::DagCycle(format!(
            "cycle detected while scheduling packages: {}",
            stuck.join(", ")
        )));
    }

    info!(
        waves = plan.len(),
        packages = plan.package_count(),
        "build plan computed"
    );

    Ok(plan)
}

/// Ascending `batch_priority`, unset after any explicit value, ties by name.
fn sort_wave(catalog: &Catalog, layer: &mut [PackageId]) {
    layer.sort_by(|a, b| {
        let a = catalog.package(*a);
        let b = catalog.package(*b);
        let key = |p: &Package| (p.batch_priority.is_none(), p.batch_priority);
        key(a).cmp(&key(b)).then_with(|| a.name.cmp(&b.name))
    });
}
