//! Per-cell variable usage analysis.
//!
//! Each code cell is parsed on its own and reduced to three name sets:
//! - **bindings**: names assigned at the cell's top level
//! - **uses**: names read before (or without) a binding in the same cell
//! - **imports**: the subset of bindings introduced by import statements
//!
//! A [`NamePolicy`] then drops builtins and cell-local noise.

mod collector;
mod policy;

use std::collections::BTreeSet;

use rayon::prelude::*;
use tracing::debug;

use crate::error::{Diagnostic, Error, ParseError, Result};
use crate::notebook::Cell;
use crate::syntax::{PythonParser, first_error};

use collector::{NameCollector, RawNames};

pub use policy::{AllowList, KeepAll, NamePolicy, ReservedNames, is_python_builtin};

/// The names a single cell binds, reads and imports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellAnalysis {
    pub bindings: BTreeSet<String>,
    pub uses: BTreeSet<String>,
    pub imports: BTreeSet<String>,
}

impl CellAnalysis {
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.uses.is_empty() && self.imports.is_empty()
    }

    fn filtered(raw: RawNames, policy: &dyn NamePolicy) -> Self {
        let keep = |name: &str| !policy.is_noise(name);

        let uses = raw
            .uses
            .iter()
            .filter(|name| {
                keep(name.as_str()) && !policy.is_builtin(name) && !raw.imports.contains(*name)
            })
            .cloned()
            .collect();
        let imports = raw
            .imports
            .iter()
            .filter(|name| keep(name.as_str()))
            .cloned()
            .collect();
        let bindings = raw
            .bindings
            .into_iter()
            .filter(|name| keep(name.as_str()))
            .collect();

        Self {
            bindings,
            uses,
            imports,
        }
    }
}

/// Analyzes cell code with a reusable parser.
pub struct CellAnalyzer<'p> {
    parser: PythonParser,
    policy: &'p dyn NamePolicy,
}

impl<'p> CellAnalyzer<'p> {
    pub fn new(policy: &'p dyn NamePolicy) -> Result<Self> {
        Ok(Self {
            parser: PythonParser::new()?,
            policy,
        })
    }

    /// Analyze the code of the cell at `index`.
    ///
    /// Returns a [`ParseError`] if the text is not valid Python.
    pub fn analyze(&mut self, index: usize, source: &str) -> std::result::Result<CellAnalysis, ParseError> {
        analyze_source(&mut self.parser, self.policy, index, source)
    }
}

fn analyze_source(
    parser: &mut PythonParser,
    policy: &dyn NamePolicy,
    index: usize,
    source: &str,
) -> std::result::Result<CellAnalysis, ParseError> {
    let tree = parser.parse(source).ok_or_else(|| ParseError {
        cell: index,
        line: 1,
        column: 1,
        message: "parser produced no syntax tree".to_string(),
    })?;

    if let Some(problem) = first_error(&tree, source) {
        return Err(ParseError {
            cell: index,
            line: problem.position.row + 1,
            column: problem.position.column + 1,
            message: problem.message,
        });
    }

    let raw = NameCollector::collect(tree.root_node(), source);
    Ok(CellAnalysis::filtered(raw, policy))
}

enum Outcome {
    Narrative,
    Analyzed(CellAnalysis),
    Failed(ParseError),
}

/// Analyze every code cell in parallel, storing the results on the cells.
///
/// Cells that fail to parse get `parse_error` set and an empty analysis;
/// each failure is also returned as a [`Diagnostic::Parse`].
pub fn analyze_cells(cells: &mut [Cell], policy: &dyn NamePolicy) -> Result<Vec<Diagnostic>> {
    let outcomes: Vec<Outcome> = cells
        .par_iter()
        .map_init(PythonParser::new, |parser, cell| {
            if cell.kind.is_narrative() {
                return Ok(Outcome::Narrative);
            }
            let parser = match parser {
                Ok(parser) => parser,
                Err(e) => return Err(Error::Grammar(e.to_string())),
            };
            Ok(match analyze_source(parser, policy, cell.index, &cell.raw_text) {
                Ok(analysis) => Outcome::Analyzed(analysis),
                Err(err) => Outcome::Failed(err),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut diagnostics = Vec::new();
    for (cell, outcome) in cells.iter_mut().zip(outcomes) {
        match outcome {
            Outcome::Narrative => {
                cell.analysis = CellAnalysis::default();
                cell.parse_error = None;
            }
            Outcome::Analyzed(analysis) => {
                debug!(
                    cell = cell.index,
                    bindings = analysis.bindings.len(),
                    uses = analysis.uses.len(),
                    "Analyzed cell"
                );
                cell.analysis = analysis;
                cell.parse_error = None;
            }
            Outcome::Failed(err) => {
                debug!(cell = cell.index, error = %err, "Cell kept verbatim");
                cell.analysis = CellAnalysis::default();
                cell.parse_error = Some(err.clone());
                diagnostics.push(Diagnostic::Parse(err));
            }
        }
    }

    Ok(diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_builtins_and_noise_are_dropped() {
        let policy = ReservedNames::default();
        let mut analyzer = CellAnalyzer::new(&policy).unwrap();
        let analysis = analyzer
            .analyze(0, "for i in range(n):\n    _acc = len(items) + MAX\nresult = _acc")
            .unwrap();
        assert_eq!(analysis.bindings, set(&["result"]));
        assert_eq!(analysis.uses, set(&["items", "n"]));
    }

    #[test]
    fn test_imports_are_not_uses() {
        let policy = ReservedNames::default();
        let mut analyzer = CellAnalyzer::new(&policy).unwrap();
        let analysis = analyzer
            .analyze(0, "import pandas as pd\ndf = pd.read_csv(path)")
            .unwrap();
        assert_eq!(analysis.imports, set(&["pd"]));
        assert_eq!(analysis.bindings, set(&["df", "pd"]));
        assert_eq!(analysis.uses, set(&["path"]));
    }

    #[test]
    fn test_keep_all_retains_temporaries() {
        let mut analyzer = CellAnalyzer::new(&KeepAll).unwrap();
        let analysis = analyzer.analyze(0, "tmp = i + 1").unwrap();
        assert_eq!(analysis.bindings, set(&["tmp"]));
        assert_eq!(analysis.uses, set(&["i"]));
    }

    #[test]
    fn test_parse_error_is_located() {
        let policy = ReservedNames::default();
        let mut analyzer = CellAnalyzer::new(&policy).unwrap();
        let err = analyzer.analyze(4, "x = 1\ny = (x +\n").unwrap_err();
        assert_eq!(err.cell, 4);
        assert!(err.line >= 2);
        assert!(err.column >= 1);
    }

    #[test]
    fn test_analyze_cells_stores_results() {
        let mut cells = vec![
            Cell::code("x = 1"),
            Cell::markdown("uses x in prose"),
            Cell::code("y = x +"),
            Cell::code("print(x)"),
        ];
        for (index, cell) in cells.iter_mut().enumerate() {
            cell.index = index;
        }

        let diagnostics = analyze_cells(&mut cells, &ReservedNames::default()).unwrap();

        assert_eq!(cells[0].analysis.bindings, set(&["x"]));
        assert!(cells[1].analysis.is_empty());
        assert!(cells[2].is_unparsable());
        assert!(cells[2].analysis.is_empty());
        assert_eq!(cells[3].analysis.uses, set(&["x"]));

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].cell(), Some(2));
    }
}
