// src/exec/task_runner.rs

//! Single package build process runner.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::engine::{BuildJob, BuildOutcome};

/// Run `command` for one package and wait for it to exit.
///
/// Stdout is logged at `info`, stderr at `debug`, both tagged with the
/// package name. A non-zero exit is a [`BuildOutcome::Failed`]; failing to
/// spawn or wait on the process is an error.
pub async fn run_build(job: &BuildJob, command: &str, source_dir: &Path) -> Result<BuildOutcome> {
    info!(
        package = %job.package,
        wave = job.wave,
        cmd = %command,
        "starting build process"
    );

    let mut cmd = shell(command);
    if source_dir.is_dir() {
        cmd.current_dir(source_dir);
    }

    cmd.env("BUILDDAG_PACKAGE", &job.package)
        .env("BUILDDAG_SOURCE_NAME", &job.source_name)
        .env("BUILDDAG_ORIGIN", &job.origin)
        .env("BUILDDAG_BRANCH", &job.branch)
        .env("BUILDDAG_SOURCE_DIR", source_dir)
        .env("BUILDDAG_DEPS_PATH", job.deps_path.as_deref().unwrap_or(""))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning build process for package '{}'", job.package))?;

    if let Some(stdout) = child.stdout.take() {
        let package = job.package.clone();
        tokio::spawn(forward_lines(stdout, move |line| {
            info!(package = %package, "stdout: {line}")
        }));
    }
    // Drained even when nobody looks at debug output, or the pipe fills up.
    if let Some(stderr) = child.stderr.take() {
        let package = job.package.clone();
        tokio::spawn(forward_lines(stderr, move |line| {
            debug!(package = %package, "stderr: {line}")
        }));
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for build process of package '{}'", job.package))?;

    let code = status.code().unwrap_or(-1);
    info!(
        package = %job.package,
        exit_code = code,
        success = status.success(),
        "build process exited"
    );

    Ok(if status.success() {
        BuildOutcome::Success
    } else {
        BuildOutcome::Failed(code)
    })
}

fn shell(command: &str) -> Command {
    let (program, flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };
    let mut cmd = Command::new(program);
    cmd.arg(flag).arg(command);
    cmd
}

async fn forward_lines<R, F>(pipe: R, mut log: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut lines = BufReader::new(pipe).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        log(&line);
    }
}
