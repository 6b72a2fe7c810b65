//! Python string literals holding narrative text.
//!
//! Markdown, raw and unparsable cells are stored in the reactive form as
//! triple-quoted blocks whose content starts on its own line and is
//! indented to the surrounding code:
//!
//! ```text
//! mo.md(
//!     r"""
//!     # Title
//!     """
//! )
//! ```

use tree_sitter::Node;

use tidy_nb_core::syntax::node_text;

use crate::text::{split_closing_line, strip_indent};

/// Encode `text` as a triple-quoted block whose lines sit at `width` spaces.
///
/// A raw literal is used unless the text contains `"""` or a carriage
/// return; then a plain literal with `\\`, `\"` and `\r` escapes is
/// emitted instead.
pub(crate) fn string_block(text: &str, width: usize) -> String {
    let (prefix, body) = if text.contains(r#"""""#) || text.contains('\r') {
        let escaped = text
            .replace('\\', r"\\")
            .replace('"', r#"\""#)
            .replace('\r', r"\r");
        ("", escaped)
    } else {
        ("r", text.to_string())
    };

    let pad = " ".repeat(width);
    let mut out = format!("{}\"\"\"\n", prefix);
    for line in body.split('\n') {
        if !line.is_empty() {
            out.push_str(&pad);
            out.push_str(line);
        }
        out.push('\n');
    }
    out.push_str(&pad);
    out.push_str(r#"""""#);
    out
}

/// Undo the block layout: drop the opening newline and the closing
/// line, then strip the closing line's indentation from every line.
///
/// Content that does not start on its own line is taken verbatim.
pub(crate) fn block_text(content: &str) -> String {
    let Some(content) = content.strip_prefix('\n') else {
        return content.to_string();
    };
    let (body, indentation) = split_closing_line(content);
    strip_indent(body, indentation)
}

/// Decode a plain (non-f, non-bytes) string literal node.
///
/// Returns `None` for anything that is not a single literal with static
/// content.
pub(crate) fn decode_string(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }

    let mut start = None;
    let mut end = None;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "string_start" => start = Some(child),
            "string_end" => end = Some(child),
            "interpolation" => return None,
            _ => {}
        }
    }
    let (start, end) = (start?, end?);

    let opener = node_text(start, source);
    let prefix = opener.trim_end_matches(['"', '\'']).to_ascii_lowercase();
    if prefix.contains(['f', 'b', 't']) {
        return None;
    }

    let content = source.get(start.end_byte()..end.start_byte())?;
    if prefix.contains('r') {
        Some(content.to_string())
    } else {
        Some(unescape(content))
    }
}

fn unescape(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escaped) = chars.next() else {
            out.push('\\');
            break;
        };
        match escaped {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{0B}'),
            'x' | 'u' | 'U' => {
                let width = match escaped {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = (0..width)
                    .filter_map(|_| chars.next_if(char::is_ascii_hexdigit))
                    .collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(ch) if digits.len() == width => out.push(ch),
                    _ => {
                        out.push('\\');
                        out.push(escaped);
                        out.push_str(&digits);
                    }
                }
            }
            '0'..='7' => {
                let mut digits = String::from(escaped);
                while digits.len() < 3 {
                    match chars.next_if(|c| ('0'..='7').contains(c)) {
                        Some(d) => digits.push(d),
                        None => break,
                    }
                }
                match u32::from_str_radix(&digits, 8).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push('\\');
                        out.push_str(&digits);
                    }
                }
            }
            // Unknown escapes (including `\N{...}`) are kept as written.
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}
