//! Forward-only dependency graph between cells.
//!
//! This module provides:
//! - Producer resolution in reading order
//! - Per-cell input/output wiring
//! - Unresolved reference reporting
//! - Comparison of declared signatures against the computed wiring

mod builder;
mod types;

pub use builder::{GraphBuilder, check_declared_signatures};
pub use types::{CellWiring, DependencyEdge, DependencyGraph, ProducerRule};
