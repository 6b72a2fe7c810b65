//! End-to-end wiring tests: cell text in, graph out.

use tidy_nb_core::{
    AllowList, Cell, Diagnostic, Document, GraphBuilder, KeepAll, ReservedNames, analyze_cells,
};

fn document(sources: &[&str]) -> Document {
    Document::new(sources.iter().map(|s| Cell::code(*s)).collect())
}

#[test]
fn test_data_science_notebook() {
    let mut doc = document(&[
        "import numpy as np\nimport pandas as pd",
        "df = pd.DataFrame({'a': np.arange(10)})",
        "summary = df.describe()\nfor i in range(3):\n    print(i)",
        "def plot(frame):\n    return frame.plot(title=title)\n\ntitle = 'Summary'",
        "chart = plot(summary)",
    ]);
    let diagnostics = analyze_cells(&mut doc.cells, &ReservedNames::default()).unwrap();
    assert!(diagnostics.is_empty());

    let graph = GraphBuilder::default().build(&doc.cells);

    assert_eq!(graph.outputs(0), &["np".to_string(), "pd".to_string()]);
    assert_eq!(graph.inputs(1), &["np".to_string(), "pd".to_string()]);
    assert_eq!(graph.outputs(1), &["df".to_string()]);
    // `i` is a conventional temporary and `title` is bound later in its own cell.
    assert_eq!(graph.inputs(2), &["df".to_string()]);
    assert!(graph.inputs(3).is_empty());
    assert_eq!(graph.outputs(3), &["plot".to_string()]);
    assert_eq!(graph.inputs(4), &["plot".to_string(), "summary".to_string()]);
    assert!(graph.unresolved().is_empty());
    assert_eq!(graph.execution_order(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_broken_cell_is_isolated() {
    let mut doc = document(&["x = 1", "y = [x,", "z = x * 2"]);
    let diagnostics = analyze_cells(&mut doc.cells, &ReservedNames::default()).unwrap();

    assert_eq!(diagnostics.len(), 1);
    assert!(matches!(&diagnostics[0], Diagnostic::Parse(err) if err.cell == 1));
    assert!(doc.cells[1].is_unparsable());

    let graph = GraphBuilder::default().build(&doc.cells);
    assert_eq!(graph.dependents(0), vec![2]);
}

#[test]
fn test_policy_changes_wiring() {
    let sources = ["tmp = load()", "result = tmp + 1"];

    let mut doc = document(&sources);
    analyze_cells(&mut doc.cells, &ReservedNames::default()).unwrap();
    let graph = GraphBuilder::default().build(&doc.cells);
    assert!(graph.edges().is_empty());

    let mut doc = document(&sources);
    analyze_cells(&mut doc.cells, &KeepAll).unwrap();
    let graph = GraphBuilder::default().build(&doc.cells);
    assert_eq!(graph.producer_of(1, "tmp"), Some(0));

    let mut doc = document(&sources);
    analyze_cells(&mut doc.cells, &AllowList::new(["tmp"], ReservedNames::default())).unwrap();
    let graph = GraphBuilder::default().build(&doc.cells);
    assert_eq!(graph.producer_of(1, "tmp"), Some(0));
}

#[test]
fn test_unresolved_reference_diagnostic() {
    let mut doc = document(&["y = undefined_thing + 1"]);
    analyze_cells(&mut doc.cells, &ReservedNames::default()).unwrap();
    let graph = GraphBuilder::default().build(&doc.cells);

    let diagnostics = graph.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].cell(), Some(0));
    assert!(diagnostics[0].to_string().contains("undefined_thing"));
    assert_eq!(graph.inputs(0), &["undefined_thing".to_string()]);
}
