//! End-to-end tests for tidy-nb CLI commands.
//!
//! These tests run the binary against real notebook files.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin for tests

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// Create a temporary directory with a test notebook.
struct TestNotebook {
    _temp_dir: TempDir,
    notebook_path: PathBuf,
}

impl TestNotebook {
    fn new(filename: &str, source: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let notebook_path = temp_dir.path().join(filename);
        fs::write(&notebook_path, source).expect("Failed to write notebook");

        Self {
            _temp_dir: temp_dir,
            notebook_path,
        }
    }

    fn path(&self) -> &PathBuf {
        &self.notebook_path
    }

    fn py_path(&self) -> PathBuf {
        self.notebook_path.with_extension("py")
    }

    fn ipynb_path(&self) -> PathBuf {
        self.notebook_path.with_extension("ipynb")
    }
}

fn tidy_nb() -> Command {
    Command::cargo_bin("tidy-nb").expect("binary should build")
}

/// A three-cell notebook: markdown, a producer and a consumer.
fn simple_ipynb() -> &'static str {
    r##"{
 "cells": [
  {"cell_type": "markdown", "metadata": {}, "source": "# Numbers"},
  {"cell_type": "code", "metadata": {}, "outputs": [], "execution_count": null, "source": "base = 42\ndoubled = base * 2"},
  {"cell_type": "code", "metadata": {}, "outputs": [], "execution_count": null, "source": "print(doubled + 10)"}
 ],
 "metadata": {},
 "nbformat": 4,
 "nbformat_minor": 5
}"##
}

/// A notebook reading a name no cell defines.
fn unresolved_ipynb() -> &'static str {
    r#"{
 "cells": [
  {"cell_type": "code", "metadata": {}, "source": "print(undefined_total)"}
 ],
 "metadata": {},
 "nbformat": 4,
 "nbformat_minor": 5
}"#
}

fn simple_marimo() -> &'static str {
    r#"import marimo

app = marimo.App()


@app.cell
def _():
    a = 1
    return (a,)


@app.cell
def _(a):
    b = a + 1
    return (b,)


if __name__ == "__main__":
    app.run()
"#
}

// =============================================================================
// to-marimo
// =============================================================================

#[test]
fn test_to_marimo_writes_py_file() {
    let nb = TestNotebook::new("numbers.ipynb", simple_ipynb());

    tidy_nb()
        .arg("to-marimo")
        .arg(nb.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Converting to marimo format"))
        .stdout(predicate::str::contains("✓"));

    let py = fs::read_to_string(nb.py_path()).expect("output should exist");
    assert!(py.contains("def cell_2():"));
    assert!(py.contains("    return (doubled,)"));
    assert!(py.contains("def cell_3(doubled):"));
    assert!(py.contains("app = marimo.App(width=\"medium\")"));
}

#[test]
fn test_to_marimo_explicit_output_and_header() {
    let nb = TestNotebook::new("numbers.ipynb", simple_ipynb());
    let output = nb.path().with_file_name("custom.py");

    tidy_nb()
        .arg("to-marimo")
        .arg(nb.path())
        .arg(&output)
        .args(["--generated-with", "0.1.0", "--width", ""])
        .assert()
        .success();

    let py = fs::read_to_string(&output).expect("output should exist");
    assert!(py.contains("__generated_with = \"0.1.0\""));
    assert!(py.contains("app = marimo.App()\n"));
    assert!(!nb.py_path().exists());
}

#[test]
fn test_to_marimo_missing_input() {
    tidy_nb()
        .args(["to-marimo", "/nonexistent/notebook.ipynb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Notebook not found"));
}

#[test]
fn test_to_marimo_unknown_cell_type_fails() {
    let nb = TestNotebook::new(
        "odd.ipynb",
        r#"{"cells": [{"cell_type": "widget", "source": ""}], "metadata": {}, "nbformat": 4, "nbformat_minor": 5}"#,
    );

    tidy_nb().arg("to-marimo").arg(nb.path()).assert().failure();
    assert!(!nb.py_path().exists());
}

// =============================================================================
// Diagnostics
// =============================================================================

#[test]
fn test_unresolved_reference_is_a_warning() {
    let nb = TestNotebook::new("loose.ipynb", unresolved_ipynb());

    tidy_nb()
        .arg("to-marimo")
        .arg(nb.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("warning"))
        .stderr(predicate::str::contains("undefined_total"));
}

#[test]
fn test_strict_turns_diagnostics_into_failure() {
    let nb = TestNotebook::new("loose.ipynb", unresolved_ipynb());

    tidy_nb()
        .args(["--strict", "to-marimo"])
        .arg(nb.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--strict"));
}

#[test]
fn test_keep_all_names_wires_temporaries() {
    let nb = TestNotebook::new(
        "temps.ipynb",
        r#"{"cells": [
            {"cell_type": "code", "source": "_scratch = 1"},
            {"cell_type": "code", "source": "print(_scratch)"}
        ], "metadata": {}, "nbformat": 4, "nbformat_minor": 5}"#,
    );

    tidy_nb()
        .args(["to-marimo", "--keep-all-names"])
        .arg(nb.path())
        .assert()
        .success();

    let py = fs::read_to_string(nb.py_path()).expect("output should exist");
    assert!(py.contains("def cell_2(_scratch):"));
}

// =============================================================================
// to-jupyter
// =============================================================================

#[test]
fn test_to_jupyter_writes_ipynb_file() {
    let nb = TestNotebook::new("app.py", simple_marimo());

    tidy_nb()
        .arg("to-jupyter")
        .arg(nb.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Converting to Jupyter format"));

    let json = fs::read_to_string(nb.ipynb_path()).expect("output should exist");
    let value: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");
    let cells = value["cells"].as_array().expect("cells array");
    assert_eq!(cells.len(), 2);
    assert_eq!(cells[1]["cell_type"], "code");
    assert_eq!(value["nbformat"], 4);
}

#[test]
fn test_to_jupyter_plain_script_warns() {
    let nb = TestNotebook::new("script.py", "print('hello')\n");

    tidy_nb()
        .arg("to-jupyter")
        .arg(nb.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("warning"));

    assert!(nb.ipynb_path().exists());
}

// =============================================================================
// analyze
// =============================================================================

#[test]
fn test_analyze_ipynb() {
    let nb = TestNotebook::new("numbers.ipynb", simple_ipynb());

    tidy_nb()
        .arg("analyze")
        .arg(nb.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Notebook Analysis"))
        .stdout(predicate::str::contains("3 cells (2 code, 1 markdown, 0 raw)"))
        .stdout(predicate::str::contains("doubled"));

    assert!(!nb.py_path().exists());
}

#[test]
fn test_analyze_marimo() {
    let nb = TestNotebook::new("app.py", simple_marimo());

    tidy_nb()
        .arg("analyze")
        .arg(nb.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("2 cells (2 code, 0 markdown, 0 raw)"));
}

#[test]
fn test_help_lists_commands() {
    tidy_nb()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("to-marimo"))
        .stdout(predicate::str::contains("to-jupyter"))
        .stdout(predicate::str::contains("analyze"));
}
