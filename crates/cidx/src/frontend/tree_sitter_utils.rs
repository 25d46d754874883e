//! Small helpers for reading tree-sitter nodes.

// Rows and columns are stored as u32.
#![allow(clippy::cast_possible_truncation)]

use tree_sitter::Node;
use xxhash_rust::xxh3::xxh3_64;

use super::{FileRef, SourceLocation};
use crate::types::Span;

/// Source text of a node.
///
/// Returns an empty string when the node's byte range does not fall on
/// character boundaries, which only happens inside error recovery.
pub fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    source.get(node.byte_range()).unwrap_or_else(|| {
        tracing::trace!(
            byte_range = ?node.byte_range(),
            node_kind = %node.kind(),
            "Node range is not on character boundaries"
        );
        ""
    })
}

/// Convert tree-sitter positions to a 1-indexed [`Span`].
pub fn node_span(node: Node<'_>) -> Span {
    let start_line = node.start_position().row as u32 + 1;
    let start_col = node.start_position().column as u32 + 1;
    let end_line = node.end_position().row as u32 + 1;
    let end_col = node.end_position().column as u32 + 1;

    Span::new(start_line, start_col, end_line, end_col).unwrap_or_else(|| {
        tracing::warn!(
            start_line,
            start_col,
            end_line,
            end_col,
            node_kind = %node.kind(),
            "Tree-sitter produced invalid span, using fallback"
        );
        Span::point(start_line, start_col)
    })
}

/// Start of a node as a location in `file`.
pub fn node_location(node: Node<'_>, file: FileRef) -> SourceLocation {
    SourceLocation {
        file,
        line: node.start_position().row as u32 + 1,
        column: node.start_position().column as u32 + 1,
    }
}

/// All children of a node paired with their field names.
pub fn children_with_fields(node: Node<'_>) -> Vec<(Option<&'static str>, Node<'_>)> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            out.push((cursor.field_name(), cursor.node()));
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    out
}

/// Named children of a node.
pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Stable identity of a declaring node: same file, kind and start offset
/// give the same hash across runs.
pub fn node_hash(path: &std::path::Path, keyword: &str, node: Node<'_>) -> u64 {
    let key = format!("{}:{keyword}:{}", path.display(), node.start_byte());
    xxh3_64(key.as_bytes())
}
