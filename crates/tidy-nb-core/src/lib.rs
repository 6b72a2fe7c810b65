//! Core engine for tidy-nb notebook conversion.
//!
//! This crate provides:
//! - The cell/document model shared by both notebook formats
//! - Python variable usage analysis (tree-sitter based)
//! - Forward-only dependency graph construction between cells
//! - Diagnostics for unparsable cells and unresolved references

pub mod analysis;
pub mod error;
pub mod graph;
pub mod notebook;
pub mod syntax;

pub use analysis::{
    AllowList, CellAnalysis, CellAnalyzer, KeepAll, NamePolicy, ReservedNames, analyze_cells,
};
pub use error::{Diagnostic, Error, ParseError, Result, UnresolvedReference};
pub use graph::{
    CellWiring, DependencyEdge, DependencyGraph, GraphBuilder, ProducerRule,
    check_declared_signatures,
};
pub use notebook::{Cell, CellKind, Document, Signature};
pub use syntax::PythonParser;
