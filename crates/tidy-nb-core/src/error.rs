//! Error and diagnostic types for tidy-nb-core.
//!
//! Fatal problems are [`Error`]s. Everything the conversion can survive is a
//! [`Diagnostic`]: it is collected and handed back next to the output.

use thiserror::Error;

/// Result type for tidy-nb-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tidy-nb-core.
#[derive(Debug, Error)]
pub enum Error {
    /// The Python grammar could not be loaded into a parser.
    #[error("failed to load Python grammar: {0}")]
    Grammar(String),
}

/// A cell whose code is not valid standalone Python.
///
/// `line` and `column` are 1-based and relative to the cell text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cell {}: syntax error at line {line}, column {column}: {message}", .cell + 1)]
pub struct ParseError {
    /// Index of the cell in the document
    pub cell: usize,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// A name read by a cell that no earlier cell binds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cell {}: '{name}' is not defined by any earlier cell", .cell + 1)]
pub struct UnresolvedReference {
    /// Index of the consuming cell
    pub cell: usize,
    /// The free variable
    pub name: String,
}

/// Non-fatal findings reported alongside a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    /// Cell code could not be parsed; the cell is passed through verbatim.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A use with no earlier producer.
    #[error(transparent)]
    Unresolved(#[from] UnresolvedReference),

    /// A reactive cell's declared signature disagrees with its code.
    #[error(
        "cell {}: declared signature of '{name}' differs from its code{}{}{}",
        .cell + 1,
        list_suffix("missing parameters", .missing_inputs),
        list_suffix("unused parameters", .unused_inputs),
        list_suffix("returns unbound names", .unbound_outputs)
    )]
    SignatureMismatch {
        cell: usize,
        name: String,
        missing_inputs: Vec<String>,
        unused_inputs: Vec<String>,
        unbound_outputs: Vec<String>,
    },

    /// No cells were recognized; the whole input became a single code cell.
    #[error("no notebook cells recognized: {reason}; input kept as a single code cell")]
    NoCells { reason: String },
}

impl Diagnostic {
    /// Index of the cell this diagnostic refers to, if any.
    pub fn cell(&self) -> Option<usize> {
        match self {
            Diagnostic::Parse(err) => Some(err.cell),
            Diagnostic::Unresolved(reference) => Some(reference.cell),
            Diagnostic::SignatureMismatch { cell, .. } => Some(*cell),
            Diagnostic::NoCells { .. } => None,
        }
    }
}

fn list_suffix(label: &str, names: &[String]) -> String {
    if names.is_empty() {
        String::new()
    } else {
        format!("; {}: {}", label, names.join(", "))
    }
}
