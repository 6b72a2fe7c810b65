//! Thin wrapper around the tree-sitter Python grammar.

use tree_sitter::{Node, Parser, Point, Tree};

use crate::error::{Error, Result};

/// A tree-sitter parser configured for Python.
///
/// Parsers are not `Sync`; create one per thread.
pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    /// Create a new parser.
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| Error::Grammar(e.to_string()))?;
        Ok(Self { parser })
    }

    /// Parse Python source into a syntax tree.
    ///
    /// tree-sitter recovers from syntax errors, so the returned tree may
    /// contain `ERROR` or missing nodes; see [`first_error`].
    pub fn parse(&mut self, source: &str) -> Option<Tree> {
        self.parser.parse(source, None)
    }
}

/// Source text covered by a node.
pub fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

/// A located syntax problem inside a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxProblem {
    /// 0-based row and column
    pub position: Point,
    pub message: String,
}

/// Find the first `ERROR` or missing node in document order.
pub fn first_error(tree: &Tree, source: &str) -> Option<SyntaxProblem> {
    let root = tree.root_node();
    if !root.has_error() {
        return None;
    }

    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_missing() {
            return Some(SyntaxProblem {
                position: node.start_position(),
                message: format!("missing '{}'", node.kind()),
            });
        }
        if node.is_error() {
            let snippet: String = node_text(node, source)
                .lines()
                .next()
                .unwrap_or_default()
                .chars()
                .take(30)
                .collect();
            return Some(SyntaxProblem {
                position: node.start_position(),
                message: if snippet.trim().is_empty() {
                    "invalid syntax".to_string()
                } else {
                    format!("invalid syntax near '{}'", snippet.trim())
                },
            });
        }
        if node.has_error() {
            // Push in reverse so children pop in source order.
            for i in (0..node.child_count()).rev() {
                if let Some(child) = node.child(i) {
                    stack.push(child);
                }
            }
        }
    }

    // The root reported an error that no child carries.
    Some(SyntaxProblem {
        position: root.start_position(),
        message: "invalid syntax".to_string(),
    })
}
