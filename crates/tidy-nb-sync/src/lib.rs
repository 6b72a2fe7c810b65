//! Sync engine for tidy-nb notebooks.
//!
//! Converts between Jupyter `.ipynb` notebooks and marimo `.py` notebooks.
//!
//! # Architecture
//!
//! ```text
//! notebook.ipynb ──► read_document ──┐                    ┌──► MarimoGenerator ──► notebook.py
//!                                     ├──► Document ──► analyze_cells ──► GraphBuilder
//! notebook.py ─────► MarimoParser ───┘                    └──► IpynbGenerator ───► notebook.ipynb
//! ```

mod error;
mod ipynb;
mod literal;
mod marimo;
mod parser;
mod text;

pub use error::{SyncError, SyncResult};
pub use ipynb::{
    CellMetadata, CellSource, IpynbGenerator, JupyterCell, JupyterNotebook, default_metadata,
    read_document,
};
pub use marimo::{EmitOptions, MarimoGenerator};
pub use parser::{Extraction, MarimoParser};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tidy_nb_core::{
    Cell, CellKind, DependencyGraph, Diagnostic, Document, GraphBuilder, NamePolicy, ProducerRule,
    ReservedNames, analyze_cells, check_declared_signatures,
};

/// Settings shared by both conversion directions.
#[derive(Clone)]
pub struct ConvertOptions {
    /// Which names count as cross-cell data flow
    pub policy: Arc<dyn NamePolicy>,
    /// Which earlier binder supplies a rebound name
    pub producer_rule: ProducerRule,
    /// marimo header settings
    pub emit: EmitOptions,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            policy: Arc::new(ReservedNames::default()),
            producer_rule: ProducerRule::default(),
            emit: EmitOptions::default(),
        }
    }
}

impl std::fmt::Debug for ConvertOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvertOptions")
            .field("producer_rule", &self.producer_rule)
            .field("emit", &self.emit)
            .finish_non_exhaustive()
    }
}

/// A successful conversion plus everything it noticed along the way.
#[derive(Debug, Clone)]
pub struct Converted<T> {
    pub output: T,
    /// Non-fatal findings, sorted by cell
    pub diagnostics: Vec<Diagnostic>,
}

/// A document with its analysis and wiring.
struct Wired {
    document: Document,
    graph: DependencyGraph,
    diagnostics: Vec<Diagnostic>,
}

fn wire(mut document: Document, options: &ConvertOptions) -> SyncResult<Wired> {
    let policy = options.policy.as_ref();
    let mut diagnostics = analyze_cells(&mut document.cells, policy)?;

    let graph = GraphBuilder::default()
        .with_rule(options.producer_rule)
        .build(&document.cells);
    diagnostics.extend(graph.diagnostics());
    diagnostics.extend(check_declared_signatures(&document.cells, &graph, policy));

    // Stable: diagnostics for the same cell keep their discovery order.
    diagnostics.sort_by_key(|diagnostic| diagnostic.cell().map_or(0, |cell| cell + 1));

    Ok(Wired {
        document,
        graph,
        diagnostics,
    })
}

/// Convert Jupyter JSON text to marimo source.
pub fn ipynb_to_marimo(json: &str, options: &ConvertOptions) -> SyncResult<Converted<String>> {
    let document = read_document(json)?;
    let wired = wire(document, options)?;
    let output = MarimoGenerator::new(options.emit.clone()).generate(&wired.document, &wired.graph);

    Ok(Converted {
        output,
        diagnostics: wired.diagnostics,
    })
}

/// Read marimo source into a document, falling back to a single code cell
/// when no cells can be recognized.
pub fn read_marimo(source: &str) -> SyncResult<Converted<Document>> {
    let mut parser = MarimoParser::new()?;
    let reason = match parser.parse(source) {
        Extraction::Cells(document) if !document.is_empty() || source.trim().is_empty() => {
            return Ok(Converted {
                output: document,
                diagnostics: Vec::new(),
            });
        }
        Extraction::Cells(_) => "no @app.cell functions found".to_string(),
        Extraction::Malformed { line, message } => {
            format!("source is not valid Python (line {}: {})", line, message)
        }
    };

    tracing::warn!("{}; keeping the whole file as one code cell", reason);
    Ok(Converted {
        output: Document::new(vec![Cell::code(source)]),
        diagnostics: vec![Diagnostic::NoCells { reason }],
    })
}

/// Convert marimo source to a Jupyter notebook.
pub fn marimo_to_ipynb(source: &str, options: &ConvertOptions) -> SyncResult<Converted<JupyterNotebook>> {
    let Converted {
        output: document,
        diagnostics: mut extraction,
    } = read_marimo(source)?;

    // Unresolved references are not reported for reactive input.
    let wired = wire(document, options)?;
    extraction.extend(
        wired
            .diagnostics
            .into_iter()
            .filter(|diagnostic| !matches!(diagnostic, Diagnostic::Unresolved(_))),
    );

    let output = IpynbGenerator::new().generate(&wired.document)?;
    Ok(Converted {
        output,
        diagnostics: extraction,
    })
}

fn read_file(path: &Path) -> SyncResult<String> {
    fs::read_to_string(path).map_err(|e| SyncError::ReadError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Convert a `.ipynb` file to a marimo `.py` file.
///
/// Nothing is written unless the conversion succeeds.
pub fn convert_ipynb_file(
    ipynb_path: impl AsRef<Path>,
    py_path: impl AsRef<Path>,
    options: &ConvertOptions,
) -> SyncResult<Vec<Diagnostic>> {
    let ipynb_path = ipynb_path.as_ref();
    let py_path = py_path.as_ref();

    let json = read_file(ipynb_path)?;
    let converted = ipynb_to_marimo(&json, options)?;

    fs::write(py_path, &converted.output).map_err(|e| SyncError::WriteError {
        path: py_path.to_path_buf(),
        message: e.to_string(),
    })?;

    tracing::info!(
        "Converted {} → {} ({} diagnostics)",
        ipynb_path.display(),
        py_path.display(),
        converted.diagnostics.len()
    );

    Ok(converted.diagnostics)
}

/// Convert a marimo `.py` file to a `.ipynb` file.
///
/// Nothing is written unless the conversion succeeds.
pub fn convert_marimo_file(
    py_path: impl AsRef<Path>,
    ipynb_path: impl AsRef<Path>,
    options: &ConvertOptions,
) -> SyncResult<Vec<Diagnostic>> {
    let py_path = py_path.as_ref();
    let ipynb_path = ipynb_path.as_ref();

    let source = read_file(py_path)?;
    let converted = marimo_to_ipynb(&source, options)?;
    converted.output.write_to_file(ipynb_path)?;

    tracing::info!(
        "Converted {} → {} ({} cells)",
        py_path.display(),
        ipynb_path.display(),
        converted.output.cells.len()
    );

    Ok(converted.diagnostics)
}

/// One row of a notebook summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellSummary {
    pub index: usize,
    pub kind: CellKind,
    pub lines: usize,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// Per-cell wiring preview of a notebook in either format.
#[derive(Debug, Clone)]
pub struct NotebookSummary {
    pub cells: Vec<CellSummary>,
    pub diagnostics: Vec<Diagnostic>,
}

impl NotebookSummary {
    /// Number of cells of the given kind.
    pub fn count(&self, kind: CellKind) -> usize {
        self.cells.iter().filter(|cell| cell.kind == kind).count()
    }
}

/// Analyze a notebook file without writing anything.
///
/// `.ipynb` files are read as Jupyter notebooks; anything else as marimo.
pub fn summarize(path: impl AsRef<Path>, options: &ConvertOptions) -> SyncResult<NotebookSummary> {
    let path = path.as_ref();
    let content = read_file(path)?;

    let is_ipynb = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ipynb"));
    let (document, mut diagnostics) = if is_ipynb {
        (read_document(&content)?, Vec::new())
    } else {
        let converted = read_marimo(&content)?;
        (converted.output, converted.diagnostics)
    };

    let wired = wire(document, options)?;
    diagnostics.extend(wired.diagnostics);

    let cells = wired
        .document
        .cells
        .iter()
        .enumerate()
        .map(|(pos, cell)| CellSummary {
            index: cell.index,
            kind: cell.kind,
            lines: cell.line_count(),
            inputs: wired.graph.inputs(pos).to_vec(),
            outputs: wired.graph.outputs(pos).to_vec(),
        })
        .collect();

    Ok(NotebookSummary { cells, diagnostics })
}

/// Get the default `.py` path for a `.ipynb` notebook.
pub fn default_marimo_path(ipynb_path: impl AsRef<Path>) -> PathBuf {
    ipynb_path.as_ref().with_extension("py")
}

/// Get the default `.ipynb` path for a marimo `.py` notebook.
pub fn default_ipynb_path(py_path: impl AsRef<Path>) -> PathBuf {
    py_path.as_ref().with_extension("ipynb")
}
