// tests/scheduler_waves.rs

use std::collections::BTreeSet;
use std::error::Error;

use builddag::catalog::Catalog;
use builddag::dag::{DagGraph, RebuildReason, close, resolve, schedule};
use builddag_test_utils::builders::{ManifestBuilder, SourceBuilder};
use builddag_test_utils::fake_oracle::FakeOracle;
use builddag_test_utils::{init_tracing, truenas_manifest};

type TestResult = Result<(), Box<dyn Error>>;

fn wave_names(plan: &builddag::dag::BuildPlan) -> Vec<Vec<&str>> {
    plan.waves()
        .iter()
        .map(|w| w.packages.iter().map(String::as_str).collect())
        .collect()
}

#[test]
fn kernel_rebuild_is_layered_by_dependencies() -> TestResult {
    init_tracing();

    let manifest = truenas_manifest();
    let catalog = Catalog::from_manifest(&manifest)?;
    let graph = DagGraph::build(&catalog)?;
    let set = resolve(&graph, &FakeOracle::changed(&["kernel"]))?;

    let plan = schedule(&graph, &set)?;

    assert_eq!(
        wave_names(&plan),
        vec![
            vec!["kernel"],
            // kernel-dbg carries batch_priority 0, so it sorts first.
            vec!["kernel-dbg", "openzfs", "scst"],
            vec!["openzfs-dbg", "py_libzfs", "scst-dbg", "truenas_samba", "zectl"],
        ]
    );
    assert_eq!(plan.len(), 3);
    assert_eq!(plan.package_count(), set.len());
    assert_eq!(plan.wave_of("kernel"), Some(0));
    assert_eq!(plan.wave_of("zectl"), Some(2));
    assert_eq!(plan.wave_of("not-in-plan"), None);
    Ok(())
}

#[test]
fn empty_rebuild_set_gives_empty_plan() -> TestResult {
    init_tracing();

    let manifest = truenas_manifest();
    let catalog = Catalog::from_manifest(&manifest)?;
    let graph = DagGraph::build(&catalog)?;
    let set = resolve(&graph, &FakeOracle::new())?;

    let plan = schedule(&graph, &set)?;

    assert!(plan.is_empty());
    assert_eq!(plan.package_count(), 0);
    Ok(())
}

#[test]
fn dependencies_outside_the_rebuild_set_do_not_hold_back_a_wave() -> TestResult {
    init_tracing();

    let manifest = truenas_manifest();
    let catalog = Catalog::from_manifest(&manifest)?;
    let graph = DagGraph::build(&catalog)?;

    // openzfs depends on kernel, but kernel is not rebuilt.
    let set = resolve(&graph, &FakeOracle::changed(&["openzfs"]))?;
    let plan = schedule(&graph, &set)?;

    assert_eq!(
        wave_names(&plan),
        vec![
            vec!["openzfs"],
            vec!["openzfs-dbg", "py_libzfs", "truenas_samba", "zectl"],
        ]
    );
    Ok(())
}

#[test]
fn independent_seeds_share_the_first_wave() -> TestResult {
    init_tracing();

    let manifest = truenas_manifest();
    let catalog = Catalog::from_manifest(&manifest)?;
    let graph = DagGraph::build(&catalog)?;
    let set = resolve(&graph, &FakeOracle::changed(&["zectl", "scst", "truenas_samba"]))?;

    let plan = schedule(&graph, &set)?;

    assert_eq!(
        wave_names(&plan),
        vec![vec!["scst", "truenas_samba", "zectl"], vec!["scst-dbg"]]
    );
    Ok(())
}

#[test]
fn batch_priority_orders_packages_within_a_wave() -> TestResult {
    init_tracing();

    let manifest = ManifestBuilder::new()
        .with_source(SourceBuilder::new("delta").build())
        .with_source(SourceBuilder::new("charlie").batch_priority(2).build())
        .with_source(SourceBuilder::new("bravo").build())
        .with_source(SourceBuilder::new("alpha").batch_priority(1).build())
        .with_source(SourceBuilder::new("echo").batch_priority(-3).build())
        .build();
    let catalog = Catalog::from_manifest(&manifest)?;
    let graph = DagGraph::build(&catalog)?;
    let seeds = catalog.packages().map(|p| (p.id, RebuildReason::Forced));
    let set = close(&graph, seeds);

    let plan = schedule(&graph, &set)?;

    assert_eq!(
        wave_names(&plan),
        vec![vec!["echo", "alpha", "charlie", "bravo", "delta"]]
    );
    Ok(())
}

#[test]
fn no_wave_contains_both_ends_of_an_edge() -> TestResult {
    init_tracing();

    let manifest = truenas_manifest();
    let catalog = Catalog::from_manifest(&manifest)?;
    let graph = DagGraph::build(&catalog)?;
    let seeds = catalog.packages().map(|p| (p.id, RebuildReason::Forced));
    let set = close(&graph, seeds);

    let plan = schedule(&graph, &set)?;

    for edge in graph.edges() {
        let from = &catalog.package(edge.from).name;
        let to = &catalog.package(edge.to).name;
        let (Some(from_wave), Some(to_wave)) = (plan.wave_of(from), plan.wave_of(to)) else {
            panic!("{from} or {to} missing from plan");
        };
        assert!(
            from_wave < to_wave,
            "{from} (wave {from_wave}) must come before {to} (wave {to_wave})"
        );
    }
    Ok(())
}

#[test]
fn blocked_by_follows_dependents_transitively() -> TestResult {
    init_tracing();

    let manifest = truenas_manifest();
    let catalog = Catalog::from_manifest(&manifest)?;
    let graph = DagGraph::build(&catalog)?;
    let set = resolve(&graph, &FakeOracle::changed(&["kernel"]))?;
    let plan = schedule(&graph, &set)?;

    let expected: BTreeSet<String> = ["openzfs-dbg", "py_libzfs", "truenas_samba", "zectl"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(plan.blocked_by(&graph, "openzfs"), expected);

    assert_eq!(plan.blocked_by(&graph, "kernel").len(), plan.package_count() - 1);
    assert!(plan.blocked_by(&graph, "zectl").is_empty());
    assert_eq!(
        plan.blocked_by(&graph, "scst"),
        BTreeSet::from(["scst-dbg".to_string()])
    );
    Ok(())
}

#[test]
fn blocked_by_only_reports_plan_members() -> TestResult {
    init_tracing();

    let manifest = truenas_manifest();
    let catalog = Catalog::from_manifest(&manifest)?;
    let graph = DagGraph::build(&catalog)?;

    // Only zectl is rebuilt; nothing in the plan depends on it or on kernel.
    let set = resolve(&graph, &FakeOracle::changed(&["zectl"]))?;
    let plan = schedule(&graph, &set)?;

    assert!(plan.blocked_by(&graph, "kernel").is_empty());
    assert!(plan.blocked_by(&graph, "unknown").is_empty());
    Ok(())
}
