//! Conversion commands for the tidy-nb CLI.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tidy_nb_core::Diagnostic;
use tidy_nb_sync::{
    ConvertOptions, SyncResult, convert_ipynb_file, convert_marimo_file, default_ipynb_path,
    default_marimo_path,
};

use crate::{colors, report_diagnostics};

/// Convert a Jupyter notebook to marimo.
pub fn to_marimo(
    input: &str,
    output: Option<&str>,
    options: &ConvertOptions,
    strict: bool,
) -> anyhow::Result<()> {
    let input_path = existing_input(input)?;
    let output_path = output.map_or_else(|| default_marimo_path(&input_path), PathBuf::from);

    println!(
        "\n{}tidy-nb{} - Converting to marimo format",
        colors::BOLD,
        colors::RESET
    );
    println!("{}", "─".repeat(50));

    let diagnostics = run(&input_path, &output_path, |from, to| {
        convert_ipynb_file(from, to, options)
    })?;
    report_diagnostics(&diagnostics, strict)
}

/// Convert a marimo notebook to Jupyter.
pub fn to_jupyter(
    input: &str,
    output: Option<&str>,
    options: &ConvertOptions,
    strict: bool,
) -> anyhow::Result<()> {
    let input_path = existing_input(input)?;
    let output_path = output.map_or_else(|| default_ipynb_path(&input_path), PathBuf::from);

    println!(
        "\n{}tidy-nb{} - Converting to Jupyter format",
        colors::BOLD,
        colors::RESET
    );
    println!("{}", "─".repeat(50));

    let diagnostics = run(&input_path, &output_path, |from, to| {
        convert_marimo_file(from, to, options)
    })?;
    report_diagnostics(&diagnostics, strict)
}

pub(crate) fn existing_input(input: &str) -> anyhow::Result<PathBuf> {
    let path = Path::new(input);
    if !path.exists() {
        anyhow::bail!("Notebook not found: {}", input);
    }
    Ok(path.to_path_buf())
}

/// Run one file conversion with a timed progress line.
fn run(
    input: &Path,
    output: &Path,
    convert: impl FnOnce(&Path, &Path) -> SyncResult<Vec<Diagnostic>>,
) -> anyhow::Result<Vec<Diagnostic>> {
    let start = Instant::now();

    print!(
        "  {} → {} ... ",
        input.file_name().unwrap_or_default().to_string_lossy(),
        output.display()
    );
    colors::flush_stdout();

    let diagnostics = convert(input, output)?;

    let elapsed = start.elapsed();
    println!(
        "{}✓{} ({:.2}ms)",
        colors::GREEN,
        colors::RESET,
        elapsed.as_secs_f64() * 1000.0
    );

    Ok(diagnostics)
}
