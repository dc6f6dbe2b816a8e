// src/exec/mod.rs

//! Build execution layer.
//!
//! - [`backend`] provides the `BuildBackend` trait and the production
//!   `CommandBackend`, which tests can replace with a fake implementation.
//! - [`task_runner`] runs one package's build command with
//!   `tokio::process::Command` and reports its outcome.

pub mod backend;
pub mod task_runner;

pub use backend::{BuildBackend, BuildFuture, CommandBackend};
