// src/lib.rs

pub mod catalog;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod oracle;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::cli::CliArgs;
use crate::config::{Manifest, load_and_validate};
use crate::dag::{BuildPlan, DagGraph, RebuildSet, ResolveOptions, resolve_with, schedule};
use crate::engine::{RunReport, WaveRunner};
use crate::exec::CommandBackend;
use crate::fs::RealFileSystem;
use crate::oracle::{FileHashStore, SourceTreeOracle};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - manifest loading
/// - catalog / graph construction
/// - rebuild resolution against the source tree oracle
/// - wave scheduling and execution
pub async fn run(args: CliArgs) -> Result<()> {
    let manifest_path = PathBuf::from(&args.manifest);
    let manifest = load_and_validate(&manifest_path)?;
    let root_dir = manifest_root_dir(&manifest_path);

    let catalog = Catalog::from_manifest(&manifest)?;
    let graph = DagGraph::build(&catalog)?;

    let oracle = source_tree_oracle(&manifest, &root_dir);
    let options = ResolveOptions {
        force: args.force.clone(),
        force_all: args.force_all,
    };
    let set = resolve_with(&graph, &oracle, &options)?;
    let plan = schedule(&graph, &set)?;

    if args.dry_run {
        print_dry_run(&plan, &set);
        return Ok(());
    }

    if plan.is_empty() {
        info!("every package is up to date; nothing to build");
        return Ok(());
    }

    let Some(command) = manifest.config.build_command.clone() else {
        bail!("[config].build_command is required to build (use --dry-run to only plan)");
    };

    oracle.snapshot(set.ids().map(|id| catalog.package(id)))?;

    let backend = CommandBackend::new(command, root_dir.join(&manifest.config.sources_dir));
    let runner = WaveRunner::new(
        backend,
        manifest.config.max_parallel,
        manifest.config.on_failure,
    );
    let report = runner.run(&graph, &plan).await?;

    // A failed write must not cost the other packages their record.
    let mut record_error = None;
    for pkg in report.succeeded.iter().filter_map(|name| catalog.get(name)) {
        if let Err(err) = oracle.record_build(pkg) {
            warn!(package = %pkg.name, error = %err, "failed to record build hash");
            record_error.get_or_insert(err);
        }
    }

    let active: Vec<&str> = manifest.package_names().collect();
    oracle.prune(&active)?;

    print_report(&report);

    if let Some(err) = record_error {
        return Err(err.context("recording build hashes"));
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(anyhow!(
            "{} package(s) failed, {} skipped",
            report.failed.len(),
            report.skipped.len()
        ))
    }
}

/// Directory that relative `[config]` paths are resolved against.
///
/// - If the manifest path has a non-empty parent (e.g. "build/Builddag.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Builddag.toml" (parent = ""),
///   we fall back to the current working directory "."
fn manifest_root_dir(manifest_path: &Path) -> PathBuf {
    match manifest_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn source_tree_oracle(manifest: &Manifest, root_dir: &Path) -> SourceTreeOracle {
    let cfg = &manifest.config;
    SourceTreeOracle::new(
        Arc::new(RealFileSystem),
        root_dir.join(&cfg.sources_dir),
        root_dir.join(&cfg.artifacts_dir),
        Box::new(FileHashStore::new(root_dir.join(&cfg.state_dir))),
    )
}

/// Print the waves, and why each package is in them.
fn print_dry_run(plan: &BuildPlan, set: &RebuildSet) {
    println!("builddag dry-run");
    println!(
        "  {} package(s) to rebuild in {} wave(s)",
        plan.package_count(),
        plan.len()
    );

    for wave in plan.waves() {
        println!();
        println!("wave {}:", wave.index);
        for name in &wave.packages {
            match set.reason_of(name) {
                Some(reason) => println!("  - {name} ({reason})"),
                None => println!("  - {name}"),
            }
        }
    }

    debug!("dry-run complete (no execution)");
}

fn print_report(report: &RunReport) {
    println!("builddag report");
    println!("  succeeded: {}", report.succeeded.len());
    for failure in &report.failed {
        match (&failure.exit_code, &failure.error) {
            (Some(code), _) => println!("  failed: {} (exit code {code})", failure.package),
            (None, Some(err)) => println!("  failed: {} ({err})", failure.package),
            (None, None) => println!("  failed: {}", failure.package),
        }
    }
    for name in &report.skipped {
        println!("  skipped: {name}");
    }
}
