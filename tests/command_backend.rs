// tests/command_backend.rs
#![cfg(unix)]

use std::error::Error;
use std::path::Path;

use builddag::catalog::Catalog;
use builddag::engine::{BuildJob, BuildOutcome};
use builddag::exec::{BuildBackend, CommandBackend};
use builddag_test_utils::{init_tracing, truenas_manifest, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn job_for(name: &str, wave: usize) -> Result<BuildJob, Box<dyn Error>> {
    let manifest = truenas_manifest();
    let catalog = Catalog::from_manifest(&manifest)?;
    let pkg = catalog.get(name).ok_or_else(|| format!("{name} missing"))?;
    Ok(BuildJob::from_package(pkg, wave))
}

fn out_file(dir: &Path) -> String {
    dir.join("out.txt").display().to_string()
}

#[tokio::test]
async fn build_command_sees_the_package_environment() -> TestResult {
    init_tracing();

    let sources = tempfile::tempdir()?;
    std::fs::create_dir(sources.path().join("openzfs"))?;
    let out = tempfile::tempdir()?;
    let out_path = out_file(out.path());

    let command = format!(
        "printf '%s|%s|%s|%s' \"$BUILDDAG_PACKAGE\" \"$BUILDDAG_SOURCE_NAME\" \
         \"$BUILDDAG_DEPS_PATH\" \"$BUILDDAG_SOURCE_DIR\" > '{out_path}'"
    );
    let backend = CommandBackend::new(command, sources.path());

    let outcome = with_timeout(backend.build(job_for("openzfs-dbg", 1)?)).await?;
    assert_eq!(outcome, BuildOutcome::Success);

    let written = std::fs::read_to_string(&out_path)?;
    let expected = format!(
        "openzfs-dbg|openzfs|contrib/debian|{}",
        sources.path().join("openzfs").display()
    );
    assert_eq!(written, expected);
    Ok(())
}

#[tokio::test]
async fn non_zero_exit_is_a_failed_build() -> TestResult {
    init_tracing();

    let sources = tempfile::tempdir()?;
    let backend = CommandBackend::new("echo building; exit 3", sources.path());

    let outcome = with_timeout(backend.build(job_for("zectl", 2)?)).await?;
    assert_eq!(outcome, BuildOutcome::Failed(3));
    Ok(())
}

#[tokio::test]
async fn build_runs_inside_the_source_tree() -> TestResult {
    init_tracing();

    let sources = tempfile::tempdir()?;
    let source_dir = sources.path().join("scst");
    std::fs::create_dir(&source_dir)?;
    let out = tempfile::tempdir()?;
    let out_path = out_file(out.path());

    // scst-dbg shares its parent's checkout.
    let backend = CommandBackend::new(format!("pwd -P > '{out_path}'"), sources.path());

    let outcome = with_timeout(backend.build(job_for("scst-dbg", 2)?)).await?;
    assert_eq!(outcome, BuildOutcome::Success);

    let cwd = std::fs::read_to_string(&out_path)?;
    assert_eq!(
        Path::new(cwd.trim()),
        std::fs::canonicalize(&source_dir)?.as_path()
    );
    Ok(())
}
