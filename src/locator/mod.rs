//! Finds the test enclosing a cursor position.
//!
//! The locator walks from the smallest syntax node at the cursor up to the
//! root, collecting the titles of every `it`, `test` and `describe` call on
//! the way. Titles are joined outermost first, so a cursor inside
//! `describe("Outer", () => { it("works", ...) })` yields `"Outer works"`,
//! which Jest accepts as a `--testNamePattern`.

pub mod parser;

pub use parser::{LanguageVariant, Location, ParsedSource};

use tree_sitter::Node;

/// Callee names recognised as test declarations.
pub const TEST_FUNCTIONS: &[&str] = &["it", "test", "describe"];

/// Name of the nearest enclosing test at a zero-based character offset.
///
/// Returns `None` when the cursor is outside the text or not inside any
/// recognised call, and when every matched title is blank.
pub fn nearest_test_name(source: &ParsedSource, offset: usize) -> Option<String> {
    let text = source.text();
    let Some(byte) = byte_offset(text, offset) else {
        tracing::debug!("Cursor offset {} is outside the source", offset);
        return None;
    };
    let byte = skip_indentation(text, byte);

    let node = source.tree().root_node().descendant_for_byte_range(byte, byte)?;

    let mut name = String::new();
    let mut matched = false;
    let mut current = Some(node);
    while let Some(node) = current {
        if let Some(title) = test_title(node, text) {
            name = format!("{} {}", title, name);
            matched = true;
        }
        current = node.parent();
    }

    let name = name.trim();
    if !matched || name.is_empty() {
        return None;
    }
    tracing::debug!("Nearest test at offset {}: {:?}", offset, name);
    Some(name.to_string())
}

/// Convenience wrapper: parse `text` and locate at `offset`.
pub fn nearest_test_in(text: &str, variant: LanguageVariant, offset: usize) -> Option<String> {
    let source = ParsedSource::parse(text, variant)?;
    nearest_test_name(&source, offset)
}

/// Title of a test declaration call, if `node` is one.
/// Member callees (`it.each`, `test.skip`) and non-string titles yield nothing.
fn test_title(node: Node, text: &str) -> Option<String> {
    if node.kind() != "call_expression" {
        return None;
    }
    let callee = node.child_by_field_name("function")?;
    if callee.kind() != "identifier" {
        return None;
    }
    let name = callee.utf8_text(text.as_bytes()).ok()?;
    if !TEST_FUNCTIONS.contains(&name) {
        return None;
    }

    let arguments = node.child_by_field_name("arguments")?;
    let mut cursor = arguments.walk();
    let first = arguments
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment")?;
    if first.kind() != "string" {
        return None;
    }
    let raw = first.utf8_text(text.as_bytes()).ok()?;
    Some(string_value(raw))
}

/// Contents of a quoted string literal with common escapes decoded.
fn string_value(raw: &str) -> String {
    let inner = if raw.len() >= 2 { &raw[1..raw.len() - 1] } else { "" };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\n') => {} // line continuation
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn byte_offset(text: &str, offset: usize) -> Option<usize> {
    match text.char_indices().nth(offset) {
        Some((byte, _)) => Some(byte),
        None if text.chars().count() == offset => Some(text.len()),
        None => None,
    }
}

/// A cursor inside a line's indentation moves to the first non-blank
/// character, so it resolves to the call starting on that line.
fn skip_indentation(text: &str, byte: usize) -> usize {
    let line_start = text[..byte].rfind('\n').map(|i| i + 1).unwrap_or(0);
    if !text[line_start..byte].chars().all(|c| c == ' ' || c == '\t') {
        return byte;
    }
    let rest = &text[byte..];
    byte + (rest.len() - rest.trim_start_matches([' ', '\t']).len())
}
