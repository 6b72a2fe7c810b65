//! Format-independent notebook model.
//!
//! Both extractors produce a [`Document`]; both emitters consume one.

use rustc_hash::FxHashSet;
use serde_json::{Map, Value};

use crate::analysis::CellAnalysis;
use crate::error::ParseError;

/// Kind of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    /// Executable Python code.
    Code,
    /// Markdown narrative.
    Markdown,
    /// Raw (unrendered) narrative text.
    Raw,
}

impl CellKind {
    /// Narrative cells carry text only and are never analyzed.
    pub fn is_narrative(self) -> bool {
        !matches!(self, CellKind::Code)
    }

    /// The container-format `cell_type` discriminator.
    pub fn as_str(self) -> &'static str {
        match self {
            CellKind::Code => "code",
            CellKind::Markdown => "markdown",
            CellKind::Raw => "raw",
        }
    }

    /// Parse a container-format `cell_type` discriminator.
    pub fn from_cell_type(value: &str) -> Option<Self> {
        match value {
            "code" => Some(CellKind::Code),
            "markdown" => Some(CellKind::Markdown),
            "raw" => Some(CellKind::Raw),
            _ => None,
        }
    }
}

impl std::fmt::Display for CellKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters and returned names declared by a reactive cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<String>,
    pub returns: Vec<String>,
}

/// A single notebook cell.
#[derive(Debug, Clone)]
pub struct Cell {
    /// Position in the document
    pub index: usize,
    /// Cell kind
    pub kind: CellKind,
    /// Verbatim body text
    pub raw_text: String,
    /// Explicit label supplied by the input document
    pub label: Option<String>,
    /// Unique identifier used when emitting the reactive form
    pub name: String,
    /// Whether the cell's code is hidden in the rendered notebook
    pub hide_code: bool,
    /// Signature declared by the reactive form, if the cell came from one
    pub declared: Option<Signature>,
    /// Bindings, uses and imports computed by the analyzer
    pub analysis: CellAnalysis,
    /// Set when the cell's code could not be parsed
    pub parse_error: Option<ParseError>,
}

impl Cell {
    /// Create a cell of the given kind. Index and name are assigned by [`Document::new`].
    pub fn new(kind: CellKind, raw_text: impl Into<String>) -> Self {
        Self {
            index: 0,
            kind,
            raw_text: raw_text.into(),
            label: None,
            name: String::new(),
            hide_code: false,
            declared: None,
            analysis: CellAnalysis::default(),
            parse_error: None,
        }
    }

    pub fn code(raw_text: impl Into<String>) -> Self {
        Self::new(CellKind::Code, raw_text)
    }

    pub fn markdown(raw_text: impl Into<String>) -> Self {
        Self::new(CellKind::Markdown, raw_text)
    }

    pub fn raw(raw_text: impl Into<String>) -> Self {
        Self::new(CellKind::Raw, raw_text)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_hide_code(mut self, hide_code: bool) -> Self {
        self.hide_code = hide_code;
        self
    }

    pub fn with_declared(mut self, declared: Signature) -> Self {
        self.declared = Some(declared);
        self
    }

    /// True for a code cell whose text failed to parse.
    pub fn is_unparsable(&self) -> bool {
        self.parse_error.is_some()
    }

    /// Number of lines in the cell body.
    pub fn line_count(&self) -> usize {
        self.raw_text.lines().count()
    }
}

/// An ordered sequence of cells plus opaque document-level metadata.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub cells: Vec<Cell>,
    /// Container-format notebook metadata, passed through untouched
    pub metadata: Option<Map<String, Value>>,
    /// Container-format version as `(nbformat, nbformat_minor)`
    pub format: Option<(u32, u32)>,
}

impl Document {
    /// Build a document, assigning positions and unique names to the cells.
    pub fn new(cells: Vec<Cell>) -> Self {
        let mut document = Self {
            cells,
            metadata: None,
            format: None,
        };
        document.renumber();
        document
    }

    /// Reassign indices and names after the cell sequence changed.
    pub fn renumber(&mut self) {
        for (index, cell) in self.cells.iter_mut().enumerate() {
            cell.index = index;
        }
        assign_names(&mut self.cells);
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Look up a cell by its emitted name.
    pub fn cell_by_name(&self, name: &str) -> Option<&Cell> {
        self.cells.iter().find(|cell| cell.name == name)
    }
}

/// Python keywords that cannot be used as function names.
const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

/// Convert an arbitrary label into a valid Python identifier.
pub fn sanitize_name(label: &str) -> String {
    let mut name: String = label
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if name.is_empty() {
        return "cell".to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    if PYTHON_KEYWORDS.contains(&name.as_str()) {
        name.push('_');
    }
    name
}

fn assign_names(cells: &mut [Cell]) {
    let mut taken: FxHashSet<String> = FxHashSet::default();

    for cell in cells.iter_mut() {
        let base = match cell.label.as_deref() {
            // The anonymous marimo name carries no identity.
            Some(label) if label != "_" => sanitize_name(label),
            _ => format!("cell_{}", cell.index + 1),
        };

        let mut name = base.clone();
        let mut counter = 2;
        while taken.contains(&name) {
            name = format!("{}_{}", base, counter);
            counter += 1;
        }

        taken.insert(name.clone());
        cell.name = name;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_names() {
        let document = Document::new(vec![Cell::code("x = 1"), Cell::markdown("# Hi")]);
        let names: Vec<_> = document.cells.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["cell_1", "cell_2"]);
        assert_eq!(document.cells[1].index, 1);
    }

    #[test]
    fn test_label_collisions_get_suffix() {
        let document = Document::new(vec![
            Cell::code("a = 1").with_label("load"),
            Cell::code("b = 2").with_label("load"),
            Cell::code("c = 3").with_label("load"),
        ]);
        let names: Vec<_> = document.cells.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["load", "load_2", "load_3"]);
        assert_eq!(document.cell_by_name("load_2").map(|c| c.index), Some(1));
        assert!(document.cell_by_name("missing").is_none());
    }

    #[test]
    fn test_label_colliding_with_position_name() {
        let document = Document::new(vec![
            Cell::code("a = 1").with_label("cell_2"),
            Cell::code("b = 2"),
        ]);
        assert_eq!(document.cells[0].name, "cell_2");
        assert_eq!(document.cells[1].name, "cell_2_2");
    }

    #[test]
    fn test_anonymous_label_uses_position() {
        let document = Document::new(vec![Cell::code("a = 1").with_label("_")]);
        assert_eq!(document.cells[0].name, "cell_1");
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Load data!"), "Load_data_");
        assert_eq!(sanitize_name("1st"), "_1st");
        assert_eq!(sanitize_name(""), "cell");
        assert_eq!(sanitize_name("class"), "class_");
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [CellKind::Code, CellKind::Markdown, CellKind::Raw] {
            assert_eq!(CellKind::from_cell_type(kind.as_str()), Some(kind));
        }
        assert_eq!(CellKind::from_cell_type("heading"), None);
        assert!(CellKind::Raw.is_narrative());
        assert!(!CellKind::Code.is_narrative());
    }
}
