//! Flattened position resolution.
//!
//! Positions count token boundaries: entering or leaving a non-leaf element
//! costs one, a leaf element is one token, and each character of text is one
//! token. Position 0 is the start of the document's content.

use crate::error::PositionError;
use crate::node::{Document, ElementNode, Node, NodeRef, Path};

#[derive(Debug, Clone, Copy)]
struct Frame<'a> {
    node: &'a ElementNode,
    /// Index into `node.children` the position points at.
    index: usize,
    /// Absolute position of the start of `node`'s content.
    start: usize,
}

/// The ancestor stack of a position. Depth 0 is the document.
#[derive(Debug, Clone)]
pub struct ResolvedPos<'a> {
    pos: usize,
    frames: Vec<Frame<'a>>,
    text_offset: usize,
}

/// Index of the child containing `offset` and that child's start offset.
/// An offset exactly at the end of child `i` resolves to `i + 1`.
fn find_index(el: &ElementNode, offset: usize) -> (usize, usize) {
    let mut cur = 0usize;
    for (ix, child) in el.children.iter().enumerate() {
        let end = cur + child.node_size();
        if offset < end {
            return (ix, cur);
        }
        cur = end;
    }
    (el.children.len(), cur)
}

impl Document {
    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos<'_>, PositionError> {
        let size = self.content_size();
        if pos > size {
            return Err(PositionError::OutOfRange { pos, size });
        }

        let mut frames = Vec::new();
        let mut node = self.root();
        let mut start = 0usize;
        let mut text_offset = 0usize;
        loop {
            let rem = pos - start;
            let (index, child_start) = find_index(node, rem);
            frames.push(Frame { node, index, start });
            let Some(child) = node.children.get(index) else {
                break;
            };
            match child {
                Node::Text(_) => {
                    text_offset = rem - child_start;
                    break;
                }
                Node::Element(el) if !el.kind.is_leaf() && rem > child_start => {
                    node = el;
                    start += child_start + 1;
                }
                Node::Element(_) => break,
            }
        }

        Ok(ResolvedPos {
            pos,
            frames,
            text_offset,
        })
    }

    /// The node that starts at `pos`, or the text leaf containing it.
    pub fn node_at(&self, pos: usize) -> Option<NodeRef<'_>> {
        let mut node = self.root();
        let mut rem = pos;
        loop {
            let (index, child_start) = find_index(node, rem);
            let child = node.children.get(index)?;
            match child {
                Node::Text(t) => return Some(NodeRef::Text(t)),
                Node::Element(el) if child_start == rem => return Some(NodeRef::Element(el)),
                Node::Element(el) => {
                    node = el;
                    rem -= child_start + 1;
                }
            }
        }
    }

    /// Text between two positions. Block boundaries add no separator.
    pub fn text_between(&self, from: usize, to: usize) -> String {
        let mut out = String::new();
        collect_text_between(self.root(), 0, from, to, &mut out);
        out
    }
}

fn collect_text_between(el: &ElementNode, start: usize, from: usize, to: usize, out: &mut String) {
    let mut pos = start;
    for child in &el.children {
        let size = child.node_size();
        let end = pos + size;
        if end > from && pos < to {
            match child {
                Node::Text(t) => {
                    let lo = from.saturating_sub(pos);
                    let hi = (to - pos).min(size);
                    out.extend(t.text.chars().skip(lo).take(hi.saturating_sub(lo)));
                }
                Node::Element(child_el) => {
                    collect_text_between(child_el, pos + 1, from, to, out);
                }
            }
        }
        if pos >= to {
            break;
        }
        pos = end;
    }
}

impl<'a> ResolvedPos<'a> {
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Depth of the innermost ancestor (the parent of the position).
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    fn frame(&self, depth: usize) -> &Frame<'a> {
        &self.frames[depth.min(self.depth())]
    }

    /// Ancestor at `depth`. Depths past `depth()` clamp to the parent.
    pub fn node(&self, depth: usize) -> &'a ElementNode {
        self.frame(depth).node
    }

    pub fn parent(&self) -> &'a ElementNode {
        self.node(self.depth())
    }

    /// Child index the position points at inside the ancestor at `depth`.
    pub fn index(&self, depth: usize) -> usize {
        self.frame(depth).index
    }

    /// Start of the content of the ancestor at `depth`.
    pub fn start(&self, depth: usize) -> usize {
        self.frame(depth).start
    }

    /// End of the content of the ancestor at `depth`.
    pub fn end(&self, depth: usize) -> usize {
        let frame = self.frame(depth);
        frame.start + frame.node.content_size()
    }

    /// Position directly before the ancestor at `depth`. The document has no
    /// position before it, so depth 0 yields 0.
    pub fn before(&self, depth: usize) -> usize {
        if depth == 0 {
            0
        } else {
            self.start(depth) - 1
        }
    }

    /// Position directly after the ancestor at `depth`.
    pub fn after(&self, depth: usize) -> usize {
        if depth == 0 {
            self.end(0)
        } else {
            self.end(depth) + 1
        }
    }

    /// Offset of the position inside its parent's content.
    pub fn parent_offset(&self) -> usize {
        self.pos - self.start(self.depth())
    }

    /// Offset into the text leaf the position points into, 0 at leaf boundaries.
    pub fn text_offset(&self) -> usize {
        self.text_offset
    }

    pub fn node_after(&self) -> Option<NodeRef<'a>> {
        let parent = self.parent();
        parent.children.get(self.index(self.depth())).map(NodeRef::from)
    }

    pub fn node_before(&self) -> Option<NodeRef<'a>> {
        let parent = self.parent();
        let index = self.index(self.depth());
        if self.text_offset > 0 {
            return parent.children.get(index).map(NodeRef::from);
        }
        index
            .checked_sub(1)
            .and_then(|ix| parent.children.get(ix))
            .map(NodeRef::from)
    }

    /// Path of the ancestor at `depth`; the document is the empty path.
    pub fn path(&self, depth: usize) -> Path {
        self.frames[..depth.min(self.depth())]
            .iter()
            .map(|f| f.index)
            .collect()
    }

    /// Path of the parent node.
    pub fn parent_path(&self) -> Path {
        self.path(self.depth())
    }

    /// Path of the child slot the position points at inside its parent.
    pub fn child_path(&self) -> Path {
        let mut path = self.parent_path();
        path.push(self.index(self.depth()));
        path
    }

    /// Innermost depth whose ancestor satisfies `f`.
    pub fn find_depth(&self, f: impl Fn(&ElementNode) -> bool) -> Option<usize> {
        (0..=self.depth()).rev().find(|&d| f(self.node(d)))
    }
}
