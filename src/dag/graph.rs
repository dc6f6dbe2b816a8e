// src/dag/graph.rs

use std::collections::BTreeSet;
use std::fmt;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::catalog::{Catalog, PackageId};
use crate::errors::{BuilddagError, Result};

/// Why one package must be built after another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeKind {
    /// Declared in `explicit_deps`.
    Explicit,
    /// A binary of the dependent build-depends on a binary of the dependency.
    BinaryLinked,
    /// `kernel` -> every package flagged `kernel_module`.
    KernelFanout,
    /// Parent -> sub-package.
    SubPackage,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EdgeKind::Explicit => "explicit",
            EdgeKind::BinaryLinked => "binary-linked",
            EdgeKind::KernelFanout => "kernel-fanout",
            EdgeKind::SubPackage => "sub-package",
        };
        f.write_str(s)
    }
}

/// Directed edge `from -> to`: `to` depends on `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    pub from: PackageId,
    pub to: PackageId,
    pub kind: EdgeKind,
}

/// Per-node adjacency: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Edges into this node: packages this one is built after.
    deps: Vec<Edge>,
    /// Edges out of this node: packages built after this one.
    dependents: Vec<Edge>,
}

/// Package dependency graph derived from a [`Catalog`].
///
/// Immutable once built. Stores both directions so the resolver can walk
/// dependents and the scheduler can count dependencies.
#[derive(Debug, Clone)]
pub struct DagGraph<'c> {
    catalog: &'c Catalog,
    nodes: Vec<DagNode>,
    edges: BTreeSet<Edge>,
}

impl<'c> DagGraph<'c> {
    /// Derive every edge from the catalog and verify the result is acyclic.
    ///
    /// Binary build-dependencies that no catalog package produces refer to
    /// packages outside this build (base distro packages) and are ignored.
    pub fn build(catalog: &'c Catalog) -> Result<Self> {
        let mut edges = BTreeSet::new();
        let kernel = catalog.kernel();

        for pkg in catalog.packages() {
            for dep in &pkg.explicit_deps {
                let from = catalog
                    .id_of(dep)
                    .ok_or_else(|| BuilddagError::UnknownDependency {
                        package: pkg.name.clone(),
                        dependency: dep.clone(),
                    })?;
                if from == pkg.id {
                    return Err(BuilddagError::ConfigError(format!(
                        "package '{}' cannot depend on itself in `explicit_deps`",
                        pkg.name
                    )));
                }
                edges.insert(Edge {
                    from,
                    to: pkg.id,
                    kind: EdgeKind::Explicit,
                });
            }

            for binary in catalog.binaries_of(pkg.id) {
                for dep_name in &binary.build_dependencies {
                    let owners = catalog.owners_of_binary(dep_name);
                    if owners.is_empty() {
                        debug!(
                            package = %pkg.name,
                            binary = %binary.name,
                            dependency = %dep_name,
                            "build dependency not managed by this catalog; ignoring"
                        );
                        continue;
                    }
                    for owner in owners {
                        // Same source family: ordering comes from the sub-package edge.
                        if catalog.package(owner).source_name == pkg.source_name {
                            continue;
                        }
                        edges.insert(Edge {
                            from: owner,
                            to: pkg.id,
                            kind: EdgeKind::BinaryLinked,
                        });
                    }
                }
            }

            if pkg.kernel_module {
                if let Some(kernel) = kernel.filter(|k| *k != pkg.id) {
                    edges.insert(Edge {
                        from: kernel,
                        to: pkg.id,
                        kind: EdgeKind::KernelFanout,
                    });
                }
            }

            if let Some(parent) = pkg.parent() {
                edges.insert(Edge {
                    from: parent,
                    to: pkg.id,
                    kind: EdgeKind::SubPackage,
                });
            }
        }

        let mut nodes = vec![DagNode::default(); catalog.len()];
        for edge in &edges {
            nodes[edge.from.index()].dependents.push(*edge);
            nodes[edge.to.index()].deps.push(*edge);
        }

        let graph = Self {
            catalog,
            nodes,
            edges,
        };
        graph.verify_acyclic()?;

        debug!(
            packages = catalog.len(),
            edges = graph.edges.len(),
            "dependency graph built"
        );

        Ok(graph)
    }

    /// A topological sort fails exactly when there is a cycle; the strongly
    /// connected component around the offending node names the packages
    /// involved.
    fn verify_acyclic(&self) -> Result<()> {
        // Edge direction: dependency -> dependent.
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for pkg in self.catalog.packages() {
            graph.add_node(pkg.id.index());
        }
        for edge in &self.edges {
            graph.add_edge(edge.from.index(), edge.to.index(), ());
        }

        let cycle = match toposort(&graph, None) {
            Ok(_order) => return Ok(()),
            Err(cycle) => cycle.node_id(),
        };

        let members = tarjan_scc(&graph)
            .into_iter()
            .find(|scc| scc.contains(&cycle))
            .unwrap_or_else(|| vec![cycle]);

        let mut names: Vec<&str> = members
            .into_iter()
            .map(|idx| self.catalog.package(PackageId(idx)).name.as_str())
            .collect();
        names.sort_unstable();

        Err(BuilddagError::DagCycle(format!(
            "cycle detected between packages: {}",
            names.join(", ")
        )))
    }

    pub fn catalog(&self) -> &'c Catalog {
        self.catalog
    }

    /// Every edge, ordered by (from, to, kind).
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Edges into `id`: what it is built after.
    pub fn dependencies_of(&self, id: PackageId) -> &[Edge] {
        self.nodes
            .get(id.index())
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Edges out of `id`: what must be rebuilt when it is.
    pub fn dependents_of(&self, id: PackageId) -> &[Edge] {
        self.nodes
            .get(id.index())
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Names of the packages `name` directly depends on (deduplicated).
    pub fn dependency_names(&self, name: &str) -> Vec<&str> {
        let Some(id) = self.catalog.id_of(name) else {
            return Vec::new();
        };
        self.names(self.dependencies_of(id).iter().map(|e| e.from))
    }

    /// Names of the packages directly depending on `name` (deduplicated).
    pub fn dependent_names(&self, name: &str) -> Vec<&str> {
        let Some(id) = self.catalog.id_of(name) else {
            return Vec::new();
        };
        self.names(self.dependents_of(id).iter().map(|e| e.to))
    }

    /// Kinds of the edges `from -> to`, empty when there is none.
    pub fn edge_kinds(&self, from: &str, to: &str) -> Vec<EdgeKind> {
        let (Some(from), Some(to)) = (self.catalog.id_of(from), self.catalog.id_of(to)) else {
            return Vec::new();
        };
        self.dependents_of(from)
            .iter()
            .filter(|e| e.to == to)
            .map(|e| e.kind)
            .collect()
    }

    fn names(&self, ids: impl Iterator<Item = PackageId>) -> Vec<&str> {
        let ids: BTreeSet<PackageId> = ids.collect();
        ids.into_iter()
            .map(|id| self.catalog.package(id).name.as_str())
            .collect()
    }
}
