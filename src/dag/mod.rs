// src/dag/mod.rs

//! Package dependency graph, rebuild resolution and wave scheduling.
//!
//! - [`graph`] derives the acyclic package graph from a catalog.
//! - [`resolver`] computes which packages must be rebuilt.
//! - [`scheduler`] orders that set into parallel waves.

pub mod graph;
pub mod resolver;
pub mod scheduler;

pub use graph::{DagGraph, Edge, EdgeKind};
pub use resolver::{close, resolve, resolve_with, RebuildReason, RebuildSet, ResolveOptions};
pub use scheduler::{schedule, BuildPlan, Wave};
