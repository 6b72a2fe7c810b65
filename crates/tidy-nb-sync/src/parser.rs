//! Parser for marimo `.py` notebooks.
//!
//! Cells are recognized by syntax-tree structure:
//! - `@app.cell` / `@app.cell(...)` decorated functions
//! - `app._unparsable_cell(<string>, name="...")` calls
//! - the `with app.setup:` block
//!
//! Everything else at module level is scaffolding and is dropped.

use tree_sitter::Node;

use tidy_nb_core::syntax::{PythonParser, node_text};
use tidy_nb_core::{Cell, CellKind, Document, Signature};

use crate::error::SyncResult;
use crate::literal::{block_text, decode_string};
use crate::text::{line_indentation, split_closing_line, strip_indent};

/// Result of reading a marimo source file.
#[derive(Debug)]
pub enum Extraction {
    /// The file parsed; cells in source order (possibly none).
    Cells(Document),
    /// The file is not valid Python.
    Malformed { line: usize, message: String },
}

/// Parser for marimo notebooks.
pub struct MarimoParser {
    parser: PythonParser,
}

impl MarimoParser {
    /// Create a new parser.
    pub fn new() -> SyncResult<Self> {
        Ok(Self {
            parser: PythonParser::new()?,
        })
    }

    /// Extract the cells of a marimo notebook.
    pub fn parse(&mut self, source: &str) -> Extraction {
        let Some(tree) = self.parser.parse(source) else {
            return Extraction::Malformed {
                line: 1,
                message: "parser produced no syntax tree".to_string(),
            };
        };
        if let Some(problem) = tidy_nb_core::syntax::first_error(&tree, source) {
            return Extraction::Malformed {
                line: problem.position.row + 1,
                message: problem.message,
            };
        }

        let root = tree.root_node();
        let mut cells = Vec::new();
        let mut cursor = root.walk();
        for statement in root.named_children(&mut cursor) {
            let cell = match statement.kind() {
                "decorated_definition" => parse_cell_function(statement, source),
                "expression_statement" => parse_unparsable_cell(statement, source),
                "with_statement" => parse_setup_block(statement, source),
                _ => None,
            };
            if let Some(cell) = cell {
                cells.push(cell);
            }
        }

        let mut document = Document::new(cells);
        // Positional function names carry no identity of their own.
        for cell in &mut document.cells {
            if cell.label.as_deref() == Some(format!("cell_{}", cell.index + 1).as_str()) {
                cell.label = None;
            }
        }
        document.renumber();
        Extraction::Cells(document)
    }
}

/// Whether `node` is the attribute `app.<member>`.
fn is_app_member(node: Node<'_>, source: &str, member: &str) -> bool {
    if node.kind() != "attribute" {
        return false;
    }
    let object = node.child_by_field_name("object");
    let attribute = node.child_by_field_name("attribute");
    matches!(
        (object, attribute),
        (Some(object), Some(attribute))
            if object.kind() == "identifier"
                && node_text(object, source) == "app"
                && node_text(attribute, source) == member
    )
}

/// Whether `node` is `<module>.<function>(...)` and return its arguments.
fn call_arguments<'t>(node: Node<'t>, source: &str, module: &str, function: &str) -> Option<Node<'t>> {
    if node.kind() != "call" {
        return None;
    }
    let callee = node.child_by_field_name("function")?;
    if callee.kind() != "attribute" {
        return None;
    }
    let object = callee.child_by_field_name("object")?;
    let attribute = callee.child_by_field_name("attribute")?;
    if object.kind() != "identifier"
        || node_text(object, source) != module
        || node_text(attribute, source) != function
    {
        return None;
    }
    node.child_by_field_name("arguments")
}

fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

/// Keyword argument value by name.
fn keyword_argument<'t>(arguments: Node<'t>, source: &str, name: &str) -> Option<Node<'t>> {
    named_children(arguments).into_iter().find_map(|argument| {
        let key = argument.child_by_field_name("name")?;
        (argument.kind() == "keyword_argument" && node_text(key, source) == name)
            .then(|| argument.child_by_field_name("value"))
            .flatten()
    })
}

/// Positional (non-keyword) arguments.
fn positional_arguments<'t>(arguments: Node<'t>) -> Vec<Node<'t>> {
    named_children(arguments)
        .into_iter()
        .filter(|argument| argument.kind() != "keyword_argument")
        .collect()
}

/// `@app.cell` → `Some(false)`, `@app.cell(hide_code=True)` → `Some(true)`.
fn cell_decorator(decorator: Node<'_>, source: &str) -> Option<bool> {
    let expression = decorator.named_child(0)?;
    if is_app_member(expression, source, "cell") {
        return Some(false);
    }
    let arguments = call_arguments(expression, source, "app", "cell")?;
    let hidden = keyword_argument(arguments, source, "hide_code")
        .is_some_and(|value| value.kind() == "true");
    Some(hidden)
}

fn parse_cell_function(node: Node<'_>, source: &str) -> Option<Cell> {
    let definition = node.child_by_field_name("definition")?;
    if definition.kind() != "function_definition" {
        return None;
    }

    let mut hide_code = None;
    let mut cursor = node.walk();
    for decorator in node.named_children(&mut cursor) {
        if decorator.kind() == "decorator" {
            if let Some(hidden) = cell_decorator(decorator, source) {
                hide_code = Some(hidden);
            }
        }
    }
    let hide_code = hide_code?;

    let name = definition
        .child_by_field_name("name")
        .map(|name| node_text(name, source).to_string())
        .unwrap_or_default();
    let params = definition
        .child_by_field_name("parameters")
        .map(|parameters| parameter_names(parameters, source))
        .unwrap_or_default();
    let body = definition.child_by_field_name("body")?;

    let mut statements = named_children(body);
    let mut returns = Vec::new();
    let mut body_end = body.end_byte();
    let mut anchor = statements.first().copied().unwrap_or(body);
    if let Some(last) = statements.last().copied() {
        if last.kind() == "return_statement" {
            if let Some(names) = returned_names(last, source) {
                returns = names;
                body_end = last.start_byte();
                anchor = last;
                statements.pop();
            }
        }
    }

    let body_start = header_end(definition).unwrap_or(body.start_byte());
    let indentation = line_indentation(source, anchor.start_byte());

    let cell = match narrative_call(&statements, source) {
        Some((kind, text)) => Cell::new(kind, text),
        None => Cell::code(body_text(source, body_start, body_end, &[], indentation))
            .with_declared(Signature { params, returns }),
    };

    Some(with_function_label(cell.with_hide_code(hide_code), name))
}

fn with_function_label(cell: Cell, name: String) -> Cell {
    if name.is_empty() || name == "_" {
        cell
    } else {
        cell.with_label(name)
    }
}

/// Byte offset just past the `:` ending a definition header.
fn header_end(definition: Node<'_>) -> Option<usize> {
    let mut cursor = definition.walk();
    let colon = definition
        .children(&mut cursor)
        .find(|child| !child.is_named() && child.kind() == ":")?;
    Some(colon.end_byte())
}

fn parameter_names(parameters: Node<'_>, source: &str) -> Vec<String> {
    named_children(parameters)
        .into_iter()
        .filter_map(|parameter| match parameter.kind() {
            "identifier" => Some(node_text(parameter, source).to_string()),
            "default_parameter" | "typed_default_parameter" => parameter
                .child_by_field_name("name")
                .map(|name| node_text(name, source).to_string()),
            "typed_parameter" => parameter
                .named_child(0)
                .filter(|name| name.kind() == "identifier")
                .map(|name| node_text(name, source).to_string()),
            _ => None,
        })
        .collect()
}

/// Names in a `return`, `return x`, `return (a,)` or `return a, b`.
/// Returns `None` if the value is not made of plain names.
fn returned_names(statement: Node<'_>, source: &str) -> Option<Vec<String>> {
    let mut names = Vec::new();
    for value in named_children(statement) {
        collect_names(value, source, &mut names)?;
    }
    Some(names)
}

fn collect_names(node: Node<'_>, source: &str, names: &mut Vec<String>) -> Option<()> {
    match node.kind() {
        "identifier" => {
            names.push(node_text(node, source).to_string());
            Some(())
        }
        "tuple" | "expression_list" | "parenthesized_expression" => {
            for child in named_children(node) {
                collect_names(child, source, names)?;
            }
            Some(())
        }
        _ => None,
    }
}

/// A body of exactly `mo.md(<literal>)` or `mo.plain_text(<literal>)`.
fn narrative_call(statements: &[Node<'_>], source: &str) -> Option<(CellKind, String)> {
    let [statement] = statements else {
        return None;
    };
    if statement.kind() != "expression_statement" {
        return None;
    }
    let call = statement.named_child(0)?;

    let (kind, arguments) = [("md", CellKind::Markdown), ("plain_text", CellKind::Raw)]
        .into_iter()
        .find_map(|(function, kind)| {
            call_arguments(call, source, "mo", function).map(|arguments| (kind, arguments))
        })?;

    let [literal] = named_children(arguments)[..] else {
        return None;
    };
    let content = decode_string(literal, source)?;
    Some((kind, block_text(&content)))
}

fn parse_unparsable_cell(statement: Node<'_>, source: &str) -> Option<Cell> {
    let call = statement.named_child(0)?;
    let arguments = call_arguments(call, source, "app", "_unparsable_cell")?;

    let literal = positional_arguments(arguments).into_iter().next()?;
    let text = block_text(&decode_string(literal, source)?);
    let name = keyword_argument(arguments, source, "name")
        .and_then(|value| decode_string(value, source))
        .unwrap_or_default();

    Some(with_function_label(Cell::code(text), name))
}

/// `with app.setup:` minus the generated `import marimo as mo`.
fn parse_setup_block(statement: Node<'_>, source: &str) -> Option<Cell> {
    let clause = named_children(statement)
        .into_iter()
        .find(|child| child.kind() == "with_clause")?;
    let [item] = named_children(clause)[..] else {
        return None;
    };
    let value = item.child_by_field_name("value")?;
    let is_setup = is_app_member(value, source, "setup")
        || value
            .child_by_field_name("function")
            .is_some_and(|function| is_app_member(function, source, "setup"));
    if !is_setup {
        return None;
    }

    let body = statement.child_by_field_name("body")?;
    let statements = named_children(body);
    let skipped: Vec<(usize, usize)> = statements
        .iter()
        .filter(|child| is_marimo_import(**child, source))
        .map(|child| whole_line(source, child.start_byte(), child.end_byte()))
        .collect();
    let indentation = statements
        .first()
        .map_or("", |first| line_indentation(source, first.start_byte()));

    let start = header_end(statement).unwrap_or(body.start_byte());
    let text = body_text(source, start, body.end_byte(), &skipped, indentation);
    if text.trim().is_empty() {
        return None;
    }
    Some(Cell::code(text).with_label("setup"))
}

fn is_marimo_import(statement: Node<'_>, source: &str) -> bool {
    statement.kind() == "import_statement"
        && node_text(statement, source)
            .split_whitespace()
            .eq(["import", "marimo", "as", "mo"])
}

/// Source between `start` and `end` with `skipped` ranges removed, read
/// back the way the emitter lays a body out: the header line is dropped,
/// a trailing line of bare indentation is dropped with its newline, and
/// `indentation` is stripped from every line that carries it.
fn body_text(
    source: &str,
    start: usize,
    end: usize,
    skipped: &[(usize, usize)],
    indentation: &str,
) -> String {
    let mut text = String::with_capacity(end.saturating_sub(start));
    let mut pos = start;
    for &(skip_start, skip_end) in skipped {
        if skip_start >= pos && skip_start < end {
            text.push_str(&source[pos..skip_start]);
            pos = skip_end;
        }
    }
    text.push_str(&source[pos..end.max(pos)]);

    // A blank or comment-only header remainder is dropped; an inline body is kept.
    let rest = match text.split_once('\n') {
        Some((first, rest)) if first.trim().is_empty() || first.trim_start().starts_with('#') => {
            rest
        }
        _ => return text.trim().to_string(),
    };

    let (body, _) = split_closing_line(rest);
    strip_indent(body, indentation)
}

/// Widen a statement's range to its whole line, newline included.
fn whole_line(source: &str, start: usize, end: usize) -> (usize, usize) {
    let start = start - line_indentation(source, start).len();
    let end = match source[end..].find('\n') {
        Some(pos) if source[end..end + pos].trim().is_empty() => end + pos + 1,
        _ => end,
    };
    (start, end)
}
