//! Builds the dependency graph from analyzed cells.

use std::collections::BTreeSet;

use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use super::types::{CellWiring, DependencyGraph, ProducerRule};
use crate::analysis::NamePolicy;
use crate::error::{Diagnostic, UnresolvedReference};
use crate::notebook::{Cell, CellKind};

/// Graph construction settings.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    rule: ProducerRule,
    /// Names the output preamble provides to every cell
    ambient: BTreeSet<String>,
    /// Whether re-importing a name makes the cell its producer
    reimports_shadow: bool,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self {
            rule: ProducerRule::Nearest,
            ambient: BTreeSet::from(["mo".to_string()]),
            reimports_shadow: false,
        }
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: ProducerRule) -> Self {
        self.rule = rule;
        self
    }

    /// Replace the ambient name set.
    pub fn with_ambient<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ambient = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reimports_shadow(mut self, enabled: bool) -> Self {
        self.reimports_shadow = enabled;
        self
    }

    /// Resolve every cell's uses against earlier bindings.
    ///
    /// Cells are expected in reading order with `index` equal to position.
    pub fn build(&self, cells: &[Cell]) -> DependencyGraph {
        let mut graph: DiGraph<usize, String> = DiGraph::with_capacity(cells.len(), cells.len());
        let nodes: Vec<NodeIndex> = (0..cells.len()).map(|pos| graph.add_node(pos)).collect();

        let mut inputs: Vec<BTreeSet<String>> = vec![BTreeSet::new(); cells.len()];
        let mut outputs: Vec<BTreeSet<String>> = vec![BTreeSet::new(); cells.len()];
        let mut unresolved = Vec::new();

        // Name -> producing cell, as of the cell being processed
        let mut producers: FxHashMap<&str, usize> = FxHashMap::default();
        let mut imported: FxHashSet<&str> = FxHashSet::default();

        for (pos, cell) in cells.iter().enumerate() {
            let analysis = &cell.analysis;

            for name in &analysis.uses {
                if analysis.bindings.contains(name) {
                    continue;
                }
                match producers.get(name.as_str()) {
                    Some(&producer) => {
                        graph.add_edge(nodes[producer], nodes[pos], name.clone());
                        inputs[pos].insert(name.clone());
                        outputs[producer].insert(name.clone());
                    }
                    None if self.ambient.contains(name) => {}
                    None => {
                        inputs[pos].insert(name.clone());
                        unresolved.push(UnresolvedReference {
                            cell: pos,
                            name: name.clone(),
                        });
                    }
                }
            }

            for name in &analysis.bindings {
                let reimport = !self.reimports_shadow
                    && analysis.imports.contains(name)
                    && imported.contains(name.as_str());
                if reimport {
                    continue;
                }
                match self.rule {
                    ProducerRule::Nearest => {
                        producers.insert(name.as_str(), pos);
                    }
                    ProducerRule::Earliest => {
                        producers.entry(name.as_str()).or_insert(pos);
                    }
                }
            }
            imported.extend(analysis.imports.iter().map(String::as_str));
        }

        let wiring: Vec<CellWiring> = inputs
            .into_iter()
            .zip(outputs)
            .map(|(inputs, outputs)| CellWiring {
                inputs: inputs.into_iter().collect(),
                outputs: outputs.into_iter().collect(),
            })
            .collect();

        debug!(
            cells = cells.len(),
            edges = graph.edge_count(),
            unresolved = unresolved.len(),
            "Built dependency graph"
        );

        DependencyGraph {
            graph,
            nodes,
            wiring,
            unresolved,
        }
    }
}

/// Compare each reactive cell's declared signature with its computed wiring.
///
/// Reports parameters the code needs but does not declare, declared
/// parameters the code never reads, and returned names the cell never binds.
pub fn check_declared_signatures(
    cells: &[Cell],
    graph: &DependencyGraph,
    policy: &dyn NamePolicy,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for (pos, cell) in cells.iter().enumerate() {
        if cell.kind != CellKind::Code || cell.is_unparsable() {
            continue;
        }
        let Some(declared) = &cell.declared else {
            continue;
        };

        let wiring = graph.wiring(pos);
        let params: BTreeSet<&str> = declared.params.iter().map(String::as_str).collect();

        let missing_inputs: Vec<String> = wiring
            .inputs
            .iter()
            .filter(|name| !params.contains(name.as_str()))
            .cloned()
            .collect();

        let unused_inputs: Vec<String> = declared
            .params
            .iter()
            .filter(|name| {
                !policy.is_noise(name)
                    && !cell.analysis.uses.contains(*name)
                    && !wiring.inputs.contains(*name)
            })
            .cloned()
            .collect();

        let unbound_outputs: Vec<String> = declared
            .returns
            .iter()
            .filter(|name| !policy.is_noise(name) && !cell.analysis.bindings.contains(*name))
            .cloned()
            .collect();

        if missing_inputs.is_empty() && unused_inputs.is_empty() && unbound_outputs.is_empty() {
            continue;
        }
        diagnostics.push(Diagnostic::SignatureMismatch {
            cell: pos,
            name: cell.name.clone(),
            missing_inputs,
            unused_inputs,
            unbound_outputs,
        });
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ReservedNames, analyze_cells};
    use crate::notebook::{Document, Signature};

    fn analyzed(sources: &[&str]) -> Vec<Cell> {
        let mut document = Document::new(sources.iter().map(|s| Cell::code(*s)).collect());
        analyze_cells(&mut document.cells, &ReservedNames::default()).unwrap();
        document.cells
    }

    fn names(list: &[String]) -> Vec<&str> {
        list.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_linear_chain() {
        let cells = analyzed(&["x = 1", "y = x + 1", "print(y)"]);
        let graph = GraphBuilder::default().build(&cells);

        assert_eq!(names(graph.outputs(0)), vec!["x"]);
        assert!(graph.inputs(0).is_empty());
        assert_eq!(names(graph.inputs(1)), vec!["x"]);
        assert_eq!(names(graph.outputs(1)), vec!["y"]);
        assert_eq!(names(graph.inputs(2)), vec!["y"]);
        assert!(graph.outputs(2).is_empty());

        assert_eq!(graph.edges().len(), 2);
        assert_eq!(graph.producer_of(2, "y"), Some(1));
        assert_eq!(graph.dependents(0), vec![1]);
        assert_eq!(graph.dependencies(2), vec![1]);
        assert!(graph.unresolved().is_empty());
    }

    #[test]
    fn test_match_captures_are_not_inputs() {
        let cells = analyzed(&[
            "cmd = get()",
            "match cmd:\n    case [first, *rest]:\n        out = first\n    case other:\n        out = other",
        ]);
        let graph = GraphBuilder::default().build(&cells);
        assert_eq!(names(graph.inputs(1)), vec!["cmd"]);
        assert_eq!(names(graph.outputs(0)), vec!["cmd"]);
    }

    #[test]
    fn test_comprehension_over_same_name() {
        let cells = analyzed(&["x = [1, 2]", "y = [x for x in x]"]);
        let graph = GraphBuilder::default().build(&cells);
        assert_eq!(names(graph.inputs(1)), vec!["x"]);
        assert_eq!(names(graph.outputs(0)), vec!["x"]);
    }

    #[test]
    fn test_nearest_rebinding_shadows() {
        let cells = analyzed(&["x = 1", "x = 2\ny = x", "print(x)"]);
        let graph = GraphBuilder::default().build(&cells);
        assert_eq!(graph.producer_of(2, "x"), Some(1));
        assert!(graph.outputs(0).is_empty());
        assert_eq!(names(graph.outputs(1)), vec!["x"]);
    }

    #[test]
    fn test_rebinding_within_cell() {
        let cells = analyzed(&["x = 1\ny = 2\nx = y", "print(x)"]);
        let graph = GraphBuilder::default().build(&cells);
        assert_eq!(graph.producer_of(1, "x"), Some(0));
        assert_eq!(names(graph.outputs(0)), vec!["x"]);
    }

    #[test]
    fn test_earliest_rule() {
        let cells = analyzed(&["x = 1", "x = 2", "print(x)"]);
        let graph = GraphBuilder::default()
            .with_rule(ProducerRule::Earliest)
            .build(&cells);
        assert_eq!(graph.producer_of(2, "x"), Some(0));
        assert_eq!(names(graph.outputs(0)), vec!["x"]);
        assert!(graph.outputs(1).is_empty());
    }

    #[test]
    fn test_use_before_binding_is_unresolved() {
        let cells = analyzed(&["print(later)", "later = 1"]);
        let graph = GraphBuilder::default().build(&cells);
        assert_eq!(names(graph.inputs(0)), vec!["later"]);
        assert!(graph.outputs(1).is_empty());
        assert_eq!(
            graph.unresolved(),
            &[UnresolvedReference {
                cell: 0,
                name: "later".to_string()
            }]
        );
        assert_eq!(graph.diagnostics().len(), 1);
    }

    #[test]
    fn test_self_bound_use_is_not_an_input() {
        let cells = analyzed(&["x = 1", "x = x + 1"]);
        let graph = GraphBuilder::default().build(&cells);
        assert!(graph.inputs(1).is_empty());
        assert!(graph.outputs(0).is_empty());
    }

    #[test]
    fn test_ambient_names_need_no_producer() {
        let cells = analyzed(&["mo.md('hi')"]);
        let graph = GraphBuilder::default().build(&cells);
        assert!(graph.inputs(0).is_empty());
        assert!(graph.unresolved().is_empty());

        let graph = GraphBuilder::default()
            .with_ambient(Vec::<String>::new())
            .build(&cells);
        assert_eq!(names(graph.inputs(0)), vec!["mo"]);
    }

    #[test]
    fn test_ambient_name_with_producer_is_wired() {
        let cells = analyzed(&["import marimo as mo", "mo.md('hi')"]);
        let graph = GraphBuilder::default().build(&cells);
        assert_eq!(graph.producer_of(1, "mo"), Some(0));
    }

    #[test]
    fn test_reimport_does_not_shadow() {
        let cells = analyzed(&["import numpy as np", "import numpy as np\na = np.zeros(3)", "b = np.ones(3)"]);
        let graph = GraphBuilder::default().build(&cells);
        assert_eq!(graph.producer_of(2, "np"), Some(0));
        assert!(graph.outputs(1).is_empty());

        let graph = GraphBuilder::default().with_reimports_shadow(true).build(&cells);
        assert_eq!(graph.producer_of(2, "np"), Some(1));
    }

    #[test]
    fn test_wiring_invariants() {
        let cells = analyzed(&[
            "import pandas as pd\ndf = pd.read_csv(path)",
            "total = df.value.sum()\nmean = total / len(df)",
            "def report():\n    return f'{mean} {total}'",
            "x = report()\ny = x.upper()",
            "broken = (",
            "print(y, df)",
        ]);
        let graph = GraphBuilder::default().build(&cells);

        for (pos, cell) in cells.iter().enumerate() {
            let wiring = graph.wiring(pos);
            for output in &wiring.outputs {
                assert!(cell.analysis.bindings.contains(output));
            }
            for input in &wiring.inputs {
                assert!(!cell.analysis.bindings.contains(input));
            }
            assert!(wiring.inputs.windows(2).all(|w| w[0] < w[1]));
            assert!(wiring.outputs.windows(2).all(|w| w[0] < w[1]));
        }
        for edge in graph.edges() {
            assert!(edge.producer < edge.consumer);
        }
        assert_eq!(graph.execution_order(), (0..cells.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_unparsable_cell_has_no_wiring() {
        let cells = analyzed(&["x = 1", "y = (x", "print(x)"]);
        let graph = GraphBuilder::default().build(&cells);
        assert!(graph.inputs(1).is_empty());
        assert!(graph.dependencies(1).is_empty());
        assert_eq!(graph.producer_of(2, "x"), Some(0));
    }

    #[test]
    fn test_empty_document() {
        let graph = GraphBuilder::default().build(&[]);
        assert!(graph.is_empty());
        assert!(graph.execution_order().is_empty());
        assert!(graph.inputs(3).is_empty());
    }

    #[test]
    fn test_declared_signature_mismatch() {
        let mut cells = analyzed(&["x = 1", "y = x + 1", "z = 2"]);
        cells[1].declared = Some(Signature {
            params: vec!["unused".to_string()],
            returns: vec!["y".to_string(), "missing".to_string()],
        });
        cells[2].declared = Some(Signature {
            params: Vec::new(),
            returns: vec!["z".to_string()],
        });

        let graph = GraphBuilder::default().build(&cells);
        let diagnostics = check_declared_signatures(&cells, &graph, &ReservedNames::default());

        assert_eq!(diagnostics.len(), 1);
        match &diagnostics[0] {
            Diagnostic::SignatureMismatch {
                cell,
                missing_inputs,
                unused_inputs,
                unbound_outputs,
                ..
            } => {
                assert_eq!(*cell, 1);
                assert_eq!(missing_inputs, &vec!["x".to_string()]);
                assert_eq!(unused_inputs, &vec!["unused".to_string()]);
                assert_eq!(unbound_outputs, &vec!["missing".to_string()]);
            }
            other => panic!("unexpected diagnostic: {other}"),
        }
    }
}
