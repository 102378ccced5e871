//! Read-only helpers for walking the document tree.
//!
//! Offsets inside a text block are "global": text leaves contribute their
//! byte length and inline voids the length of their placeholder text.

use crate::core::{Document, ElementNode, Node, Point, Selection};
use crate::ops::{Op, Path};
use crate::plugin::{ChildConstraint, PluginRegistry};

pub(crate) fn node_at_path<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a Node> {
    let (first, rest) = path.split_first()?;
    let mut node = doc.children.get(*first)?;
    for &ix in rest {
        node = match node {
            Node::Element(el) => el.children.get(ix)?,
            Node::Void(_) | Node::Text(_) => return None,
        };
    }
    Some(node)
}

pub(crate) fn element_at_path<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a ElementNode> {
    match node_at_path(doc, path)? {
        Node::Element(el) => Some(el),
        _ => None,
    }
}

pub(crate) fn children_at_path<'a>(doc: &'a Document, parent_path: &[usize]) -> Option<&'a [Node]> {
    if parent_path.is_empty() {
        return Some(&doc.children);
    }
    element_at_path(doc, parent_path).map(|el| el.children.as_slice())
}

pub(crate) fn clamp_to_char_boundary(s: &str, ix: usize) -> usize {
    let mut ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

pub(crate) fn inline_len(node: &Node) -> usize {
    match node {
        Node::Text(t) => t.text.len(),
        Node::Void(v) => v.inline_text().len(),
        Node::Element(_) => 0,
    }
}

pub(crate) fn total_inline_len(children: &[Node]) -> usize {
    children.iter().map(inline_len).sum()
}

pub(crate) fn inline_text(children: &[Node]) -> String {
    let mut out = String::with_capacity(total_inline_len(children));
    for node in children {
        match node {
            Node::Text(t) => out.push_str(&t.text),
            Node::Void(v) => out.push_str(v.inline_text()),
            Node::Element(_) => {}
        }
    }
    out
}

/// Inline spans of a text block: `(child index, start, end)` in global offsets.
pub(crate) fn inline_spans(children: &[Node]) -> Vec<(usize, usize, usize)> {
    let mut cursor = 0usize;
    let mut spans = Vec::with_capacity(children.len());
    for (ix, node) in children.iter().enumerate() {
        if matches!(node, Node::Element(_)) {
            continue;
        }
        let len = inline_len(node);
        spans.push((ix, cursor, cursor + len));
        cursor += len;
    }
    spans
}

pub(crate) fn point_global_offset(children: &[Node], child_ix: usize, offset: usize) -> usize {
    let mut global = 0usize;
    for (ix, node) in children.iter().enumerate().take(child_ix + 1) {
        if ix < child_ix {
            global += inline_len(node);
            continue;
        }
        global += match node {
            Node::Text(t) => clamp_to_char_boundary(&t.text, offset),
            Node::Void(_) => offset.min(inline_len(node)),
            Node::Element(_) => 0,
        };
    }
    global
}

/// Map a global offset back to a text point, snapping out of inline voids.
pub(crate) fn point_for_global_offset(block_path: &[usize], children: &[Node], global: usize) -> Point {
    let at = |ix: usize, offset: usize| {
        let mut path = block_path.to_vec();
        path.push(ix);
        Point::new(path, offset)
    };

    for (ix, start, end) in inline_spans(children) {
        if global > end {
            continue;
        }
        match &children[ix] {
            Node::Text(t) => {
                if global == end && matches!(children.get(ix + 1), Some(Node::Text(_))) {
                    return at(ix + 1, 0);
                }
                return at(ix, clamp_to_char_boundary(&t.text, global - start));
            }
            Node::Void(_) => {
                let prefer_before = global - start <= end - global;
                let before = children[..ix].iter().enumerate().rev().find_map(|(i, n)| match n {
                    Node::Text(t) => Some(at(i, t.text.len())),
                    _ => None,
                });
                let after = children.iter().enumerate().skip(ix + 1).find_map(|(i, n)| {
                    matches!(n, Node::Text(_)).then(|| at(i, 0))
                });
                let picked = if prefer_before {
                    before.or(after)
                } else {
                    after.or(before)
                };
                if let Some(point) = picked {
                    return point;
                }
            }
            Node::Element(_) => {}
        }
    }

    children
        .iter()
        .enumerate()
        .rev()
        .find_map(|(ix, node)| match node {
            Node::Text(t) => Some(at(ix, t.text.len())),
            _ => None,
        })
        .unwrap_or_else(|| at(0, 0))
}

pub(crate) fn element_is_text_block(el: &ElementNode, registry: &PluginRegistry) -> bool {
    match registry.node_specs().get(&el.kind).map(|s| &s.children) {
        Some(ChildConstraint::InlineOnly) => true,
        Some(_) => false,
        None => el
            .children
            .iter()
            .any(|n| matches!(n, Node::Text(_) | Node::Void(_))),
    }
}

pub(crate) struct TextBlock<'a> {
    pub(crate) path: Path,
    pub(crate) el: &'a ElementNode,
}

pub(crate) fn text_blocks_in_order<'a>(
    doc: &'a Document,
    registry: &PluginRegistry,
) -> Vec<TextBlock<'a>> {
    fn walk<'a>(
        nodes: &'a [Node],
        path: &mut Path,
        registry: &PluginRegistry,
        out: &mut Vec<TextBlock<'a>>,
    ) {
        for (ix, node) in nodes.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            path.push(ix);
            if element_is_text_block(el, registry) {
                out.push(TextBlock {
                    path: path.clone(),
                    el,
                });
            } else {
                walk(&el.children, path, registry, out);
            }
            path.pop();
        }
    }

    let mut out = Vec::new();
    walk(&doc.children, &mut Vec::new(), registry, &mut out);
    out
}

pub(crate) fn ordered_selection_points(sel: &Selection) -> (Point, Point) {
    let (a, b) = (&sel.anchor, &sel.focus);
    let anchor_first = match a.path.cmp(&b.path) {
        std::cmp::Ordering::Equal => a.offset <= b.offset,
        ordering => ordering == std::cmp::Ordering::Less,
    };
    if anchor_first {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// The text blocks touched by `sel`, in document order, each paired with the
/// selected global range inside it.
pub(crate) fn selected_block_ranges<'a>(
    doc: &'a Document,
    registry: &PluginRegistry,
    sel: &Selection,
) -> Result<Vec<(TextBlock<'a>, std::ops::Range<usize>)>, String> {
    let (start, end) = ordered_selection_points(sel);
    let start_block = start
        .path
        .split_last()
        .map(|(_, p)| p.to_vec())
        .ok_or_else(|| "Selection start is not in a text block".to_string())?;
    let end_block = end
        .path
        .split_last()
        .map(|(_, p)| p.to_vec())
        .ok_or_else(|| "Selection end is not in a text block".to_string())?;

    let blocks = text_blocks_in_order(doc, registry);
    let start_ix = blocks
        .iter()
        .position(|b| b.path == start_block)
        .ok_or_else(|| "Selection start is not in a text block".to_string())?;
    let end_ix = blocks
        .iter()
        .position(|b| b.path == end_block)
        .ok_or_else(|| "Selection end is not in a text block".to_string())?;
    let (first, last) = (start_ix.min(end_ix), start_ix.max(end_ix));

    let start_child = start.path.last().copied().unwrap_or(0);
    let end_child = end.path.last().copied().unwrap_or(0);

    Ok(blocks
        .into_iter()
        .enumerate()
        .skip(first)
        .take(last - first + 1)
        .map(|(ix, block)| {
            let children = block.el.children.as_slice();
            let from = if ix == first {
                point_global_offset(children, start_child, start.offset)
            } else {
                0
            };
            let to = if ix == last {
                point_global_offset(children, end_child, end.offset)
            } else {
                total_inline_len(children)
            };
            (block, from..to.max(from))
        })
        .collect())
}

/// Visit the children of the document root and of every element that holds
/// blocks, passing the container path.
pub(crate) fn walk_block_containers(
    doc: &Document,
    registry: &PluginRegistry,
    visit: &mut dyn FnMut(&[Node], &Path, &mut Vec<Op>),
) -> Vec<Op> {
    fn walk(
        children: &[Node],
        path: &mut Path,
        registry: &PluginRegistry,
        visit: &mut dyn FnMut(&[Node], &Path, &mut Vec<Op>),
        ops: &mut Vec<Op>,
    ) {
        visit(children, path, ops);
        for (ix, node) in children.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            if el.children.is_empty() || element_is_text_block(el, registry) {
                continue;
            }
            path.push(ix);
            walk(&el.children, path, registry, visit, ops);
            path.pop();
        }
    }

    let mut ops = Vec::new();
    walk(&doc.children, &mut Vec::new(), registry, visit, &mut ops);
    ops
}

pub(crate) fn child_path(parent: &[usize], ix: usize) -> Path {
    let mut path = parent.to_vec();
    path.push(ix);
    path
}
