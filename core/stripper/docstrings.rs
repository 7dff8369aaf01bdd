use super::common::{ProtectedRange, ProtectedRanges};
use tree_sitter::{Node, Parser};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    #[error("failed to load the Python grammar: {0}")]
    Grammar(String),

    #[error("parser produced no syntax tree")]
    NoTree,

    #[error("syntax error near line {line}")]
    Syntax { line: usize },
}

/// Any syntax error rejects the whole file; no partial ranges are returned.
pub fn locate_docstrings(source: &str) -> Result<ProtectedRanges, LocateError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| LocateError::Grammar(e.to_string()))?;

    let tree = parser.parse(source, None).ok_or(LocateError::NoTree)?;
    let root = tree.root_node();
    if root.has_error() {
        let line = first_error_line(root).unwrap_or(1);
        return Err(LocateError::Syntax { line });
    }

    let mut ranges = ProtectedRanges::new();
    collect_docstrings(root, source.as_bytes(), &mut ranges);
    Ok(ranges)
}

fn collect_docstrings(node: Node, source: &[u8], ranges: &mut ProtectedRanges) {
    let body = match node.kind() {
        "module" => Some(node),
        "class_definition" | "function_definition" => node.child_by_field_name("body"),
        _ => None,
    };

    if let Some(literal) = body.and_then(|b| docstring_literal(b, source)) {
        let range = ProtectedRange::new(
            literal.start_position().row + 1,
            literal.end_position().row + 1,
        );
        if !ranges.insert(range) {
            tracing::debug!(
                "docstring at lines {}-{} overlaps an earlier one",
                range.start,
                range.end
            );
        }
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_docstrings(child, source, ranges);
    }
}

fn docstring_literal<'t>(body: Node<'t>, source: &[u8]) -> Option<Node<'t>> {
    let mut cursor = body.walk();
    let first = body
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment")?;

    if first.kind() != "expression_statement" || first.named_child_count() != 1 {
        return None;
    }
    let expr = first.named_child(0)?;
    let plain = match expr.kind() {
        "string" => is_plain_string(expr, source),
        "concatenated_string" => {
            let mut parts = expr.walk();
            expr.named_children(&mut parts)
                .filter(|part| part.kind() == "string")
                .all(|part| is_plain_string(part, source))
        }
        _ => false,
    };
    plain.then_some(expr)
}

fn is_plain_string(string: Node, source: &[u8]) -> bool {
    let Ok(text) = string.utf8_text(source) else {
        return false;
    };
    let prefix_len = text.find(['"', '\'']).unwrap_or(text.len());
    !text[..prefix_len]
        .chars()
        .any(|c| matches!(c.to_ascii_lowercase(), 'b' | 'f' | 't'))
}

fn first_error_line(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            if let Some(line) = first_error_line(child) {
                return Some(line);
            }
        }
    }
    None
}
