// tests/runtime_fake_executor.rs

use std::collections::BTreeSet;
use std::error::Error;
use std::time::Duration;

use builddag::catalog::Catalog;
use builddag::dag::{BuildPlan, DagGraph, resolve, schedule};
use builddag::engine::{FailurePolicy, WaveRunner};
use builddag_test_utils::fake_executor::{BuildEvent, FakeBackend};
use builddag_test_utils::fake_oracle::FakeOracle;
use builddag_test_utils::{init_tracing, truenas_manifest, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn names(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Position of the first event matching `pred`.
fn position(events: &[BuildEvent], pred: impl Fn(&BuildEvent) -> bool) -> Option<usize> {
    events.iter().position(pred)
}

/// Wave N+1 must not start before every build of wave N finished.
fn assert_barriers(events: &[BuildEvent], plan: &BuildPlan) {
    for pair in plan.waves().windows(2) {
        let (earlier, later) = (&pair[0], &pair[1]);
        let last_finish = earlier
            .packages
            .iter()
            .filter_map(|p| {
                position(events, |e| {
                    matches!(e, BuildEvent::Finished { package, .. } if package == p)
                })
            })
            .max();
        let first_start = later
            .packages
            .iter()
            .filter_map(|p| {
                position(events, |e| {
                    matches!(e, BuildEvent::Started { package, .. } if package == p)
                })
            })
            .min();
        if let (Some(finish), Some(start)) = (last_finish, first_start) {
            assert!(
                finish < start,
                "wave {} started before wave {} finished: {events:?}",
                later.index,
                earlier.index
            );
        }
    }
}

#[tokio::test]
async fn runs_every_wave_in_order() -> TestResult {
    init_tracing();

    let manifest = truenas_manifest();
    let catalog = Catalog::from_manifest(&manifest)?;
    let graph = DagGraph::build(&catalog)?;
    let set = resolve(&graph, &FakeOracle::changed(&["kernel"]))?;
    let plan = schedule(&graph, &set)?;

    let runner = WaveRunner::new(
        FakeBackend::new().with_delay(Duration::from_millis(5)),
        4,
        FailurePolicy::SkipDependents,
    );
    let report = with_timeout(runner.run(&graph, &plan)).await?;

    assert!(report.is_success(), "unexpected report: {report:?}");
    assert_eq!(report.succeeded.len(), set.len());
    assert_eq!(report.succeeded[0], "kernel");

    let events = runner.backend().events();
    assert_eq!(runner.backend().started().len(), set.len());
    assert_barriers(&events, &plan);
    Ok(())
}

#[tokio::test]
async fn max_parallel_bounds_concurrent_builds() -> TestResult {
    init_tracing();

    let manifest = truenas_manifest();
    let catalog = Catalog::from_manifest(&manifest)?;
    let graph = DagGraph::build(&catalog)?;
    let set = resolve(&graph, &FakeOracle::changed(&["kernel"]))?;
    let plan = schedule(&graph, &set)?;

    let runner = WaveRunner::new(
        FakeBackend::new().with_delay(Duration::from_millis(20)),
        2,
        FailurePolicy::SkipDependents,
    );
    let report = with_timeout(runner.run(&graph, &plan)).await?;

    assert!(report.is_success());
    let max = runner.backend().max_concurrency();
    assert!(max <= 2, "saw {max} concurrent builds");
    assert!(max >= 2, "the five-package wave should overlap, saw {max}");
    Ok(())
}

#[tokio::test]
async fn failure_skips_only_downstream_packages() -> TestResult {
    init_tracing();

    let manifest = truenas_manifest();
    let catalog = Catalog::from_manifest(&manifest)?;
    let graph = DagGraph::build(&catalog)?;
    let set = resolve(&graph, &FakeOracle::changed(&["kernel"]))?;
    let plan = schedule(&graph, &set)?;

    let runner = WaveRunner::new(
        FakeBackend::new().failing(&["openzfs"]),
        4,
        FailurePolicy::SkipDependents,
    );
    let report = with_timeout(runner.run(&graph, &plan)).await?;

    assert_eq!(report.failed_names().collect::<Vec<_>>(), vec!["openzfs"]);
    assert_eq!(report.failed[0].exit_code, Some(1));
    assert_eq!(
        report.skipped,
        names(&["openzfs-dbg", "py_libzfs", "truenas_samba", "zectl"])
    );

    let succeeded: BTreeSet<String> = report.succeeded.iter().cloned().collect();
    assert_eq!(
        succeeded,
        names(&["kernel", "kernel-dbg", "scst", "scst-dbg"])
    );

    let started = runner.backend().started();
    for skipped in &report.skipped {
        assert!(!started.contains(skipped), "{skipped} should not have started");
    }
    Ok(())
}

#[tokio::test]
async fn abort_policy_finishes_the_wave_then_stops() -> TestResult {
    init_tracing();

    let manifest = truenas_manifest();
    let catalog = Catalog::from_manifest(&manifest)?;
    let graph = DagGraph::build(&catalog)?;
    let set = resolve(&graph, &FakeOracle::changed(&["kernel"]))?;
    let plan = schedule(&graph, &set)?;

    let runner = WaveRunner::new(
        FakeBackend::new().failing(&["openzfs"]),
        4,
        FailurePolicy::Abort,
    );
    let report = with_timeout(runner.run(&graph, &plan)).await?;

    // openzfs shares wave 1 with kernel-dbg and scst; both still complete.
    assert_eq!(report.succeeded, vec!["kernel", "kernel-dbg", "scst"]);
    assert_eq!(report.failed_names().collect::<Vec<_>>(), vec!["openzfs"]);
    assert_eq!(
        report.skipped,
        names(&["openzfs-dbg", "py_libzfs", "scst-dbg", "truenas_samba", "zectl"])
    );
    assert_eq!(runner.backend().started().len(), 4);
    Ok(())
}

#[tokio::test]
async fn backend_error_counts_as_failure() -> TestResult {
    init_tracing();

    let manifest = truenas_manifest();
    let catalog = Catalog::from_manifest(&manifest)?;
    let graph = DagGraph::build(&catalog)?;
    let set = resolve(&graph, &FakeOracle::changed(&["scst"]))?;
    let plan = schedule(&graph, &set)?;

    let runner = WaveRunner::new(
        FakeBackend::new().broken(&["scst"]),
        1,
        FailurePolicy::SkipDependents,
    );
    let report = with_timeout(runner.run(&graph, &plan)).await?;

    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].package, "scst");
    assert_eq!(report.failed[0].exit_code, None);
    assert!(report.failed[0].error.is_some());
    assert_eq!(report.skipped, names(&["scst-dbg"]));
    assert!(report.succeeded.is_empty());
    Ok(())
}

#[tokio::test]
async fn empty_plan_builds_nothing() -> TestResult {
    init_tracing();

    let manifest = truenas_manifest();
    let catalog = Catalog::from_manifest(&manifest)?;
    let graph = DagGraph::build(&catalog)?;
    let set = resolve(&graph, &FakeOracle::new())?;
    let plan = schedule(&graph, &set)?;

    let runner = WaveRunner::new(FakeBackend::new(), 4, FailurePolicy::SkipDependents);
    let report = with_timeout(runner.run(&graph, &plan)).await?;

    assert!(report.is_success());
    assert!(report.succeeded.is_empty());
    assert!(runner.backend().events().is_empty());
    Ok(())
}
