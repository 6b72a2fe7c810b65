//! Analyze command: per-cell inputs and outputs without writing anything.

use tidy_nb_core::CellKind;
use tidy_nb_sync::{CellSummary, ConvertOptions, summarize};

use crate::convert::existing_input;
use crate::{colors, report_diagnostics};

/// Execute the analyze command.
pub fn execute(input: &str, options: &ConvertOptions, strict: bool) -> anyhow::Result<()> {
    let path = existing_input(input)?;
    let summary = summarize(&path, options)?;

    println!(
        "\n{}Notebook Analysis{} - {}",
        colors::BOLD,
        colors::RESET,
        path.display()
    );
    println!("{}", "─".repeat(50));
    println!(
        "{}{:>4}  {:<9} {:>5}  {:<24} {}{}",
        colors::DIM,
        "#",
        "kind",
        "lines",
        "inputs",
        "outputs",
        colors::RESET
    );

    for cell in &summary.cells {
        println!("{}", row(cell));
    }

    println!("{}", "─".repeat(50));
    println!(
        "{} cells ({} code, {} markdown, {} raw)",
        summary.cells.len(),
        summary.count(CellKind::Code),
        summary.count(CellKind::Markdown),
        summary.count(CellKind::Raw)
    );

    report_diagnostics(&summary.diagnostics, strict)
}

fn row(cell: &CellSummary) -> String {
    let names = |names: &[String]| {
        if names.is_empty() {
            "-".to_string()
        } else {
            names.join(", ")
        }
    };

    format!(
        "{:>4}  {}{:<9}{} {:>5}  {:<24} {}",
        cell.index + 1,
        colors::CYAN,
        cell.kind.as_str(),
        colors::RESET,
        cell.lines,
        names(&cell.inputs),
        names(&cell.outputs)
    )
}
