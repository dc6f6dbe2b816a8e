// tests/property_resolver.rs

use std::collections::BTreeSet;

use builddag::catalog::Catalog;
use builddag::config::Manifest;
use builddag::dag::{DagGraph, RebuildReason, close, resolve, schedule};
use builddag_test_utils::builders::{
    ManifestBuilder, SourceBuilder, SubPackageBuilder, binary_with_deps,
};
use builddag_test_utils::fake_oracle::FakeOracle;
use proptest::prelude::*;

/// Random acyclic package layout: package `i` only ever depends on packages
/// `0..i`, so edges always point from a lower to a higher index.
#[derive(Debug, Clone)]
struct Shape {
    /// `(dependency index, through a binary build-dependency?)`.
    deps: Vec<Vec<(usize, bool)>>,
    kernel_module: Vec<bool>,
    has_dbg: Vec<bool>,
    /// Name package 0 `kernel`.
    with_kernel: bool,
}

impl Shape {
    fn len(&self) -> usize {
        self.deps.len()
    }

    fn name(&self, i: usize) -> String {
        if i == 0 && self.with_kernel {
            "kernel".to_string()
        } else {
            format!("pkg_{i}")
        }
    }

    fn manifest(&self) -> Manifest {
        let mut builder = ManifestBuilder::new();
        for i in 0..self.len() {
            let name = self.name(i);
            let mut source = SourceBuilder::new(&name).kernel_module(self.kernel_module[i]);
            let mut binary_deps = Vec::new();
            for &(dep, via_binary) in &self.deps[i] {
                if via_binary {
                    binary_deps.push(format!("bin_{dep}"));
                } else {
                    source = source.after(&self.name(dep));
                }
            }
            if self.has_dbg[i] {
                source = source.subpackage(SubPackageBuilder::new(&format!("{name}-dbg")).build());
            }
            let binary_deps: Vec<&str> = binary_deps.iter().map(String::as_str).collect();
            builder = builder
                .with_source(source.build())
                .with_binaries(&name, vec![binary_with_deps(&format!("bin_{i}"), &name, &binary_deps)]);
        }
        builder.build()
    }

    fn seed_names(&self, seeds: &[usize]) -> Vec<String> {
        seeds.iter().map(|i| self.name(i % self.len())).collect()
    }
}

fn shape_strategy(max_packages: usize) -> impl Strategy<Value = Shape> {
    (1..=max_packages).prop_flat_map(|n| {
        (
            proptest::collection::vec(
                proptest::collection::vec((any::<usize>(), any::<bool>()), 0..4),
                n,
            ),
            proptest::collection::vec(any::<bool>(), n),
            proptest::collection::vec(any::<bool>(), n),
            any::<bool>(),
        )
            .prop_map(|(raw_deps, kernel_module, has_dbg, with_kernel)| {
                let deps = raw_deps
                    .into_iter()
                    .enumerate()
                    .map(|(i, raw)| {
                        if i == 0 {
                            return Vec::new();
                        }
                        // One edge per dependency; the first kind drawn wins.
                        let mut seen = BTreeSet::new();
                        raw.into_iter()
                            .map(|(d, via_binary)| (d % i, via_binary))
                            .filter(|(d, _)| seen.insert(*d))
                            .collect()
                    })
                    .collect();
                Shape {
                    deps,
                    kernel_module,
                    has_dbg,
                    with_kernel,
                }
            })
    })
}

fn as_strs(names: &[String]) -> Vec<&str> {
    names.iter().map(String::as_str).collect()
}

fn rebuild_names(graph: &DagGraph<'_>, changed: &[String]) -> BTreeSet<String> {
    let oracle = FakeOracle::changed(&as_strs(changed));
    resolve(graph, &oracle)
        .expect("fake oracle never fails")
        .names()
        .map(str::to_string)
        .collect()
}

proptest! {
    #[test]
    fn enlarging_the_seed_never_shrinks_the_rebuild_set(
        shape in shape_strategy(12),
        seeds in proptest::collection::vec(any::<usize>(), 0..4),
        extra in proptest::collection::vec(any::<usize>(), 0..4),
    ) {
        let manifest = shape.manifest();
        let catalog = Catalog::from_manifest(&manifest).expect("catalog");
        let graph = DagGraph::build(&catalog).expect("generated graph is acyclic");

        let small = shape.seed_names(&seeds);
        let mut large = small.clone();
        large.extend(shape.seed_names(&extra));

        let small_set = rebuild_names(&graph, &small);
        let large_set = rebuild_names(&graph, &large);
        prop_assert!(small_set.is_subset(&large_set));
    }

    #[test]
    fn closing_a_closed_set_changes_nothing(
        shape in shape_strategy(12),
        seeds in proptest::collection::vec(any::<usize>(), 0..4),
    ) {
        let manifest = shape.manifest();
        let catalog = Catalog::from_manifest(&manifest).expect("catalog");
        let graph = DagGraph::build(&catalog).expect("generated graph is acyclic");
        let changed = shape.seed_names(&seeds);
        let oracle = FakeOracle::changed(&as_strs(&changed));

        let set = resolve(&graph, &oracle).expect("fake oracle never fails");

        prop_assert_eq!(&close(&graph, set.seeds()), &set);

        let everything = set.ids().map(|id| (id, RebuildReason::Forced));
        let reclosed = close(&graph, everything);
        prop_assert_eq!(reclosed.names().collect::<Vec<_>>(), set.names().collect::<Vec<_>>());
    }

    #[test]
    fn rebuilt_parents_take_their_subpackages_along(
        shape in shape_strategy(12),
        seeds in proptest::collection::vec(any::<usize>(), 0..4),
    ) {
        let manifest = shape.manifest();
        let catalog = Catalog::from_manifest(&manifest).expect("catalog");
        let graph = DagGraph::build(&catalog).expect("generated graph is acyclic");

        let set = rebuild_names(&graph, &shape.seed_names(&seeds));

        for pkg in catalog.packages() {
            if let Some(parent) = pkg.parent() {
                if set.contains(&catalog.package(parent).name) {
                    prop_assert!(set.contains(&pkg.name), "{} missing", pkg.name);
                }
            }
        }
    }

    #[test]
    fn changed_kernel_rebuilds_every_kernel_module(
        shape in shape_strategy(12),
        seeds in proptest::collection::vec(any::<usize>(), 0..4),
    ) {
        let mut shape = shape;
        shape.with_kernel = true;
        let manifest = shape.manifest();
        let catalog = Catalog::from_manifest(&manifest).expect("catalog");
        let graph = DagGraph::build(&catalog).expect("generated graph is acyclic");

        let mut changed = shape.seed_names(&seeds);
        changed.push("kernel".to_string());
        let set = rebuild_names(&graph, &changed);

        for pkg in catalog.packages().filter(|p| p.kernel_module) {
            prop_assert!(set.contains(&pkg.name), "kernel module {} missing", pkg.name);
        }
    }

    #[test]
    fn waves_respect_every_edge_between_members(
        shape in shape_strategy(12),
        seeds in proptest::collection::vec(any::<usize>(), 0..4),
    ) {
        let manifest = shape.manifest();
        let catalog = Catalog::from_manifest(&manifest).expect("catalog");
        let graph = DagGraph::build(&catalog).expect("generated graph is acyclic");
        let changed = shape.seed_names(&seeds);
        let oracle = FakeOracle::changed(&as_strs(&changed));
        let set = resolve(&graph, &oracle).expect("fake oracle never fails");

        let plan = schedule(&graph, &set).expect("acyclic set schedules");

        prop_assert_eq!(plan.package_count(), set.len());
        for name in set.names() {
            prop_assert!(plan.contains(name));
        }

        for edge in graph.edges() {
            let from = &catalog.package(edge.from).name;
            let to = &catalog.package(edge.to).name;
            if let (Some(a), Some(b)) = (plan.wave_of(from), plan.wave_of(to)) {
                prop_assert!(a < b, "{} (wave {}) not before {} (wave {})", from, a, to, b);
            }
        }
    }
}
