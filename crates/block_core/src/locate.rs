//! Finding nodes by predicate, either upward from a position or by scanning
//! the whole tree.

use std::fmt::Write as _;
use std::ops::RangeInclusive;

use crate::node::{Document, ElementNode, Node, NodeKind, NodeRef, Path};
use crate::selection::Selection;

/// A node matched upward from a position, with its span and how it relates
/// to the current selection.
#[derive(Debug, Clone)]
pub struct FoundNode<'a> {
    pub node: NodeRef<'a>,
    pub kind: NodeKind,
    pub depth: usize,
    pub path: Path,
    pub start: usize,
    pub end: usize,
    pub node_before: Option<NodeRef<'a>>,
    pub node_after: Option<NodeRef<'a>>,
    /// Selection overlaps the node's span.
    pub is_selected: bool,
    /// Selection lies strictly inside the node's span.
    pub is_only_node_selected: bool,
    pub text: String,
}

impl FoundNode<'_> {
    pub fn element(&self) -> Option<&ElementNode> {
        self.node.as_element()
    }
}

/// A node found by a full scan.
#[derive(Debug, Clone)]
pub struct Located<'a> {
    pub node: NodeRef<'a>,
    pub pos: usize,
    pub path: Path,
}

pub fn is_kind(kind: NodeKind) -> impl Fn(NodeRef<'_>) -> bool {
    move |node| node.kind() == kind
}

/// Walks from the node at `pos` (default: the selection's start) up to the
/// document and returns the first node satisfying `predicate`. The node
/// directly at `pos` wins over its ancestors. A text leaf matched at `pos`
/// reports the leaf's own span.
pub fn find_selected_node<'a>(
    doc: &'a Document,
    selection: &Selection,
    predicate: impl Fn(NodeRef<'_>) -> bool,
    pos: Option<usize>,
) -> Option<FoundNode<'a>> {
    let pos = pos.unwrap_or_else(|| selection.from());
    let rp = doc.resolve(pos).ok()?;

    let direct = {
        let depth = rp.depth();
        let parent = rp.parent();
        let index = rp.index(depth);
        parent.children.get(index).map(|child| {
            let start = pos - rp.text_offset();
            (NodeRef::from(child), rp.child_path(), depth + 1, start)
        })
    };

    let (node, path, depth, start, end) = match direct {
        Some((node, path, depth, start)) if predicate(node) => {
            (node, path, depth, start, start + node.node_size())
        }
        _ => {
            let depth = rp.find_depth(|el| predicate(NodeRef::Element(el)))?;
            let node = NodeRef::Element(rp.node(depth));
            (node, rp.path(depth), depth, rp.before(depth), rp.after(depth))
        }
    };

    let (from, to) = (selection.from(), selection.to());
    let node_before = doc.resolve(start).ok().and_then(|r| r.node_before());
    let node_after = doc.resolve(end).ok().and_then(|r| r.node_after());
    let is_only_node_selected = from > start && to < end;
    let is_selected =
        (from >= start && to <= end) || (to > start && to < end) || (from > start && from < end);

    Some(FoundNode {
        node,
        kind: node.kind(),
        depth,
        path,
        start,
        end,
        node_before,
        node_after,
        is_selected,
        is_only_node_selected,
        text: doc.text_between(start, end),
    })
}

/// Pre-order scan of every node below the document. More expensive than
/// [`find_selected_node`]; stops once `limit` matches are collected.
pub fn find_nodes<'a>(
    doc: &'a Document,
    predicate: impl Fn(NodeRef<'_>) -> bool,
    limit: Option<usize>,
) -> Vec<Located<'a>> {
    fn walk<'a>(
        el: &'a ElementNode,
        start: usize,
        path: &mut Path,
        predicate: &dyn Fn(NodeRef<'_>) -> bool,
        limit: Option<usize>,
        out: &mut Vec<Located<'a>>,
    ) -> bool {
        let mut pos = start;
        for (ix, child) in el.children.iter().enumerate() {
            if limit.is_some_and(|limit| out.len() >= limit) {
                return false;
            }
            path.push(ix);
            let node = NodeRef::from(child);
            if predicate(node) {
                out.push(Located {
                    node,
                    pos,
                    path: path.clone(),
                });
            }
            if let Node::Element(child_el) = child {
                if !walk(child_el, pos + 1, path, predicate, limit, out) {
                    path.pop();
                    return false;
                }
            }
            path.pop();
            pos += child.node_size();
        }
        true
    }

    let mut out = Vec::new();
    walk(doc.root(), 0, &mut Vec::new(), &predicate, limit, &mut out);
    out
}

pub fn find_node<'a>(
    doc: &'a Document,
    predicate: impl Fn(NodeRef<'_>) -> bool,
) -> Option<Located<'a>> {
    find_nodes(doc, predicate, Some(1)).into_iter().next()
}

/// Calls `f` for every node overlapping `from..to` in document order. When
/// `f` returns false the node's children are skipped.
pub fn nodes_between<'a>(
    doc: &'a Document,
    from: usize,
    to: usize,
    mut f: impl FnMut(NodeRef<'a>, usize, &[usize]) -> bool,
) {
    fn walk<'a>(
        el: &'a ElementNode,
        start: usize,
        from: usize,
        to: usize,
        path: &mut Path,
        f: &mut dyn FnMut(NodeRef<'a>, usize, &[usize]) -> bool,
    ) {
        let mut pos = start;
        for (ix, child) in el.children.iter().enumerate() {
            if pos >= to {
                break;
            }
            let end = pos + child.node_size();
            if end > from {
                path.push(ix);
                let descend = f(NodeRef::from(child), pos, path);
                if descend {
                    if let Node::Element(child_el) = child {
                        walk(child_el, pos + 1, from, to, path, f);
                    }
                }
                path.pop();
            }
            pos = end;
        }
    }

    walk(doc.root(), 0, from, to, &mut Vec::new(), &mut f);
}

/// Content spans of every textblock, in document order.
pub fn textblock_ranges(doc: &Document) -> Vec<RangeInclusive<usize>> {
    let mut out = Vec::new();
    for found in find_nodes(doc, |n| n.kind().is_textblock(), None) {
        let size = found.node.node_size();
        out.push(found.pos + 1..=found.pos + size - 1);
    }
    out
}

/// Indented outline of the tree with each node's span, for debugging.
pub fn describe_structure(doc: &Document) -> String {
    fn preview(text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= 50 {
            return text.to_string();
        }
        let head: String = chars[..35].iter().collect();
        let tail: String = chars[chars.len() - 15..].iter().collect();
        format!("{head}... ({} more) ...{tail}", chars.len() - 50)
    }

    fn walk(node: &Node, pos: usize, indent: usize, out: &mut String) {
        let pad = "  ".repeat(indent);
        let end = pos + node.node_size();
        match node {
            Node::Text(t) => {
                let _ = writeln!(out, "{pad}text({pos}..{end}, {:?})", preview(&t.text));
            }
            Node::Element(el) if el.kind.is_leaf() => {
                let _ = writeln!(out, "{pad}{}({pos}..{end})", el.kind);
            }
            Node::Element(el) => {
                let _ = writeln!(out, "{pad}{}({pos}..{end}) {{", el.kind);
                let mut child_pos = pos + 1;
                for child in &el.children {
                    walk(child, child_pos, indent + 1, out);
                    child_pos += child.node_size();
                }
                let _ = writeln!(out, "{pad}}}");
            }
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "document(0..{}) {{", doc.content_size());
    let mut pos = 0;
    for child in doc.children() {
        walk(child, pos, 1, &mut out);
        pos += child.node_size();
    }
    out.push_str("}\n");
    out
}
