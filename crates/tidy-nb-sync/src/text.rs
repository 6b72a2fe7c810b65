//! Line-oriented text helpers shared by the extractors and emitters.
//!
//! Lines are split on `'\n'` only, so a `'\r'` before it stays part of
//! the line.

fn is_indentation(text: &str) -> bool {
    text.chars().all(|c| c == ' ' || c == '\t')
}

/// Prefix every non-empty line with `width` spaces.
pub(crate) fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove `prefix` from every line that starts with it.
pub(crate) fn strip_indent(text: &str, prefix: &str) -> String {
    text.split('\n')
        .map(|line| line.strip_prefix(prefix).unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split off a final line holding only indentation, together with the
/// newline before it. Returns the remaining text and that indentation.
pub(crate) fn split_closing_line(text: &str) -> (&str, &str) {
    match text.rfind('\n') {
        Some(pos) if is_indentation(&text[pos + 1..]) => (&text[..pos], &text[pos + 1..]),
        None if is_indentation(text) => ("", text),
        _ => (text, ""),
    }
}

/// Leading whitespace of the line `offset` sits on, if only whitespace
/// precedes it.
pub(crate) fn line_indentation(source: &str, offset: usize) -> &str {
    let line_start = source[..offset].rfind('\n').map_or(0, |pos| pos + 1);
    let prefix = &source[line_start..offset];
    if is_indentation(prefix) { prefix } else { "" }
}
