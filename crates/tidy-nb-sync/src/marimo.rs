//! marimo `.py` notebook generation.
//!
//! Every cell becomes one `@app.cell` function. Code cells take their
//! computed inputs as parameters and return their outputs; narrative cells
//! render through `mo.md` / `mo.plain_text`.

use tidy_nb_core::{Cell, CellKind, DependencyGraph, Document};

use crate::literal::string_block;
use crate::text::indent;

/// Output settings for the marimo file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitOptions {
    /// Value written to `__generated_with`
    pub generated_with: String,
    /// App width; `None` writes `marimo.App()`
    pub width: Option<String>,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            generated_with: "0.13.11".to_string(),
            width: Some("medium".to_string()),
        }
    }
}

/// Generator for marimo notebooks.
#[derive(Debug, Clone, Default)]
pub struct MarimoGenerator {
    options: EmitOptions,
}

impl MarimoGenerator {
    pub fn new(options: EmitOptions) -> Self {
        Self { options }
    }

    /// Render a document whose cells have been wired by `graph`.
    pub fn generate(&self, document: &Document, graph: &DependencyGraph) -> String {
        let mut units = vec![self.preamble()];
        for (pos, cell) in document.cells.iter().enumerate() {
            units.push(render_cell(cell, graph.inputs(pos), graph.outputs(pos)));
        }
        units.push("if __name__ == \"__main__\":\n    app.run()".to_string());

        let mut out = units.join("\n\n\n");
        out.push('\n');
        out
    }

    fn preamble(&self) -> String {
        let app = match &self.options.width {
            Some(width) => format!("marimo.App(width=\"{}\")", width),
            None => "marimo.App()".to_string(),
        };
        format!(
            "import marimo\n\n__generated_with = \"{}\"\napp = {}\n\nwith app.setup:\n    import marimo as mo",
            self.options.generated_with, app
        )
    }
}

fn render_cell(cell: &Cell, inputs: &[String], outputs: &[String]) -> String {
    match cell.kind {
        CellKind::Markdown => render_narrative(cell, "md"),
        CellKind::Raw => render_narrative(cell, "plain_text"),
        CellKind::Code if cell.is_unparsable() => render_unparsable(cell),
        CellKind::Code => render_code(cell, inputs, outputs),
    }
}

fn decorator(cell: &Cell) -> &'static str {
    if cell.hide_code {
        "@app.cell(hide_code=True)"
    } else {
        "@app.cell"
    }
}

fn render_code(cell: &Cell, inputs: &[String], outputs: &[String]) -> String {
    let mut lines = vec![
        decorator(cell).to_string(),
        format!("def {}({}):", cell.name, inputs.join(", ")),
    ];
    if !cell.raw_text.is_empty() {
        lines.push(indent(&cell.raw_text, 4));
    }
    lines.push(return_statement(outputs));
    lines.join("\n")
}

fn return_statement(outputs: &[String]) -> String {
    match outputs {
        [] => "    return".to_string(),
        [single] => format!("    return ({},)", single),
        many => format!("    return ({})", many.join(", ")),
    }
}

fn render_narrative(cell: &Cell, function: &str) -> String {
    [
        "@app.cell(hide_code=True)".to_string(),
        format!("def {}():", cell.name),
        format!("    mo.{}(", function),
        format!("        {}", string_block(&cell.raw_text, 8)),
        "    )".to_string(),
        "    return".to_string(),
    ]
    .join("\n")
}

fn render_unparsable(cell: &Cell) -> String {
    [
        "app._unparsable_cell(".to_string(),
        format!("    {},", string_block(&cell.raw_text, 4)),
        format!("    name=\"{}\"", cell.name),
        ")".to_string(),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidy_nb_core::{GraphBuilder, ReservedNames, analyze_cells};

    fn render(cells: Vec<Cell>) -> String {
        let mut document = Document::new(cells);
        analyze_cells(&mut document.cells, &ReservedNames::default()).unwrap();
        let graph = GraphBuilder::default().build(&document.cells);
        MarimoGenerator::default().generate(&document, &graph)
    }

    #[test]
    fn test_layout() {
        let out = render(vec![Cell::code("x = 1")]);
        assert_eq!(
            out,
            r#"import marimo

__generated_with = "0.13.11"
app = marimo.App(width="medium")

with app.setup:
    import marimo as mo


@app.cell
def cell_1():
    x = 1
    return


if __name__ == "__main__":
    app.run()
"#
        );
    }

    #[test]
    fn test_wired_chain() {
        let out = render(vec![
            Cell::code("x = 1"),
            Cell::code("y = x + 1"),
            Cell::code("print(y)"),
        ]);
        assert!(out.contains("def cell_1():\n    x = 1\n    return (x,)"));
        assert!(out.contains("def cell_2(x):\n    y = x + 1\n    return (y,)"));
        assert!(out.contains("def cell_3(y):\n    print(y)\n    return\n"));
    }

    #[test]
    fn test_multiple_outputs_sorted() {
        let out = render(vec![Cell::code("b = 1\na = 2"), Cell::code("print(a, b)")]);
        assert!(out.contains("    return (a, b)"));
        assert!(out.contains("def cell_2(a, b):"));
    }

    #[test]
    fn test_markdown_cell() {
        let out = render(vec![Cell::markdown("# Title\n\nText")]);
        assert!(out.contains(
            "@app.cell(hide_code=True)\ndef cell_1():\n    mo.md(\n        r\"\"\"\n        # Title\n\n        Text\n        \"\"\"\n    )\n    return"
        ));
    }

    #[test]
    fn test_raw_cell_uses_plain_text() {
        let out = render(vec![Cell::raw("raw")]);
        assert!(out.contains("    mo.plain_text(\n"));
    }

    #[test]
    fn test_unparsable_cell() {
        let out = render(vec![Cell::code("y = (x +")]);
        assert!(out.contains("app._unparsable_cell(\n    r\"\"\"\n    y = (x +\n    \"\"\",\n    name=\"cell_1\"\n)"));
    }

    #[test]
    fn test_hidden_code_and_labels() {
        let out = render(vec![Cell::code("a = 1").with_label("load data").with_hide_code(true)]);
        assert!(out.contains("@app.cell(hide_code=True)\ndef load_data():"));
    }

    #[test]
    fn test_code_body_keeps_blank_edges() {
        let out = render(vec![Cell::code("\nx = 1\n")]);
        assert!(out.contains("def cell_1():\n\n    x = 1\n\n    return\n"));
    }

    #[test]
    fn test_empty_code_cell() {
        let out = render(vec![Cell::code("")]);
        assert!(out.contains("def cell_1():\n    return\n"));
    }

    #[test]
    fn test_width_option() {
        let document = Document::new(Vec::new());
        let graph = GraphBuilder::default().build(&document.cells);
        let generator = MarimoGenerator::new(EmitOptions {
            generated_with: "0.1.0".to_string(),
            width: None,
        });
        let out = generator.generate(&document, &graph);
        assert!(out.contains("__generated_with = \"0.1.0\"\napp = marimo.App()\n"));
    }
}
