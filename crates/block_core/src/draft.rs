//! Batched edits against a private working copy of the document.
//!
//! A [`Draft`] is taken from the editor, edited through primitives that
//! compile down to [`Op`]s, and handed back to `Editor::commit`. Positions
//! given to a primitive always refer to the draft's current document; use
//! [`Draft::map`] to carry positions taken before earlier primitives.

use crate::error::StepError;
use crate::locate::nodes_between;
use crate::node::{Attrs, Document, ElementNode, Mark, MarkType, Marks, Node, NodeKind, NodeRef, Path, TextNode};
use crate::ops::{AttrPatch, Bias, Mapping, Op, Transaction, TransactionMeta, apply_op};
use crate::selection::Selection;

#[derive(Debug, Clone)]
pub struct Draft {
    base_version: u64,
    doc: Document,
    selection: Selection,
    stored_marks: Option<Marks>,
    stored_marks_set: bool,
    ops: Vec<Op>,
    inverse: Vec<Op>,
    mapping: Mapping,
    source: Option<String>,
}

pub(crate) struct DraftParts {
    pub doc: Document,
    pub selection: Selection,
    pub stored_marks: Option<Marks>,
    pub stored_marks_set: bool,
    pub ops: Vec<Op>,
    pub inverse: Vec<Op>,
    pub source: Option<String>,
}

impl Draft {
    pub(crate) fn new(
        doc: Document,
        selection: Selection,
        stored_marks: Option<Marks>,
        base_version: u64,
    ) -> Self {
        Self {
            base_version,
            doc,
            selection,
            stored_marks,
            stored_marks_set: false,
            ops: Vec::new(),
            inverse: Vec::new(),
            mapping: Mapping::new(),
            source: None,
        }
    }

    pub(crate) fn into_parts(self) -> DraftParts {
        DraftParts {
            doc: self.doc,
            selection: self.selection,
            stored_marks: self.stored_marks,
            stored_marks_set: self.stored_marks_set,
            ops: self.ops,
            inverse: self.inverse,
            source: self.source,
        }
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn stored_marks(&self) -> Option<&Marks> {
        self.stored_marks.as_ref()
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn doc_changed(&self) -> bool {
        !self.ops.is_empty()
    }

    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn set_source(&mut self, source: impl Into<String>) -> &mut Self {
        self.source = Some(source.into());
        self
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// Number of ops applied so far, usable as a mapping checkpoint.
    pub fn step_count(&self) -> usize {
        self.mapping.len()
    }

    /// Maps a position from the draft's starting document to the current one.
    pub fn map(&self, pos: usize, bias: Bias) -> usize {
        self.mapping.map(pos, bias)
    }

    /// Maps a position taken at checkpoint `step` to the current document.
    pub fn map_from(&self, step: usize, pos: usize, bias: Bias) -> usize {
        self.mapping.map_from(step, pos, bias)
    }

    pub fn set_selection(&mut self, selection: Selection) -> &mut Self {
        self.selection = selection;
        self
    }

    /// Marks for the next typed text. Survives the commit even when the
    /// document changes.
    pub fn set_stored_marks(&mut self, marks: Option<Marks>) -> &mut Self {
        self.stored_marks = marks;
        self.stored_marks_set = true;
        self
    }

    /// Applies one op, recording its inverse and mapping the selection.
    pub fn apply(&mut self, op: Op) -> Result<(), StepError> {
        let (inverse, map) = apply_op(&mut self.doc, op.clone())?;
        self.ops.push(op);
        self.inverse.push(inverse);
        self.mapping.push(map);
        self.selection = self.selection.map_from(&self.mapping, self.mapping.len() - 1);
        Ok(())
    }

    fn apply_all(&mut self, ops: Vec<Op>) -> Result<(), StepError> {
        for op in ops {
            self.apply(op)?;
        }
        Ok(())
    }

    pub fn into_transaction(self) -> Transaction {
        Transaction {
            ops: self.ops,
            selection_after: Some(self.selection),
            meta: TransactionMeta {
                source: self.source,
            },
        }
    }

    // Path-addressed helpers.

    pub fn insert_node_at(&mut self, path: Path, node: Node) -> Result<(), StepError> {
        self.apply(Op::InsertNode { path, node })
    }

    pub fn remove_node_at(&mut self, path: Path) -> Result<(), StepError> {
        self.apply(Op::RemoveNode { path })
    }

    pub fn replace_node_at(&mut self, path: Path, node: Node) -> Result<(), StepError> {
        self.apply(Op::RemoveNode { path: path.clone() })?;
        self.apply(Op::InsertNode { path, node })
    }

    /// Sets the given attributes on the element at `path`, skipping values
    /// that already match.
    pub fn set_attrs_at(&mut self, path: Path, attrs: Attrs) -> Result<(), StepError> {
        let el = self
            .doc
            .element_at_path(&path)
            .ok_or_else(|| StepError::invalid_path(&path, "no element"))?;
        let set: Attrs = attrs
            .into_iter()
            .filter(|(k, v)| el.attrs.get(k) != Some(v))
            .collect();
        if set.is_empty() {
            return Ok(());
        }
        self.apply(Op::SetNodeAttrs {
            path,
            patch: AttrPatch {
                set,
                remove: Vec::new(),
            },
        })
    }

    pub fn set_attr_at(
        &mut self,
        path: Path,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), StepError> {
        let mut attrs = Attrs::new();
        attrs.insert(key.to_string(), value);
        self.set_attrs_at(path, attrs)
    }

    /// Changes kind and, when given, replaces all attributes of the element
    /// at `path`. Content and size are kept.
    pub fn set_markup_at(
        &mut self,
        path: Path,
        kind: NodeKind,
        attrs: Option<Attrs>,
    ) -> Result<(), StepError> {
        let el = self
            .doc
            .element_at_path(&path)
            .ok_or_else(|| StepError::invalid_path(&path, "no element"))?;
        let current_kind = el.kind;
        let patch = attrs.map(|attrs| AttrPatch::replace(&el.attrs, &attrs));
        if current_kind != kind {
            self.apply(Op::SetNodeKind {
                path: path.clone(),
                kind,
            })?;
        }
        if let Some(patch) = patch.filter(|p| !p.is_empty()) {
            self.apply(Op::SetNodeAttrs { path, patch })?;
        }
        Ok(())
    }

    // Position-addressed primitives.

    fn element_starting_at(&self, pos: usize) -> Result<(Path, &ElementNode), StepError> {
        let rp = self.doc.resolve(pos)?;
        if rp.text_offset() > 0 {
            return Err(StepError::NoNodeAt(pos));
        }
        match rp.node_after() {
            Some(NodeRef::Element(el)) => Ok((rp.child_path(), el)),
            _ => Err(StepError::NoNodeAt(pos)),
        }
    }

    /// Inserts a node at `pos`. Text nodes go through [`Draft::insert_marked_text`].
    pub fn insert_at(&mut self, pos: usize, node: Node) -> Result<(), StepError> {
        let node = match node {
            Node::Text(t) => {
                self.insert_marked_text(pos, &t.text, t.marks)?;
                return Ok(());
            }
            Node::Element(el) => el,
        };
        let rp = self.doc.resolve(pos)?;
        let parent = rp.parent();
        if parent.is_textblock() {
            return Err(StepError::InvalidInsert {
                pos,
                kind: node.kind,
            });
        }
        let path = rp.child_path();
        self.apply(Op::InsertNode {
            path,
            node: Node::Element(node),
        })
    }

    /// Marks a character typed at `pos` would get.
    pub fn marks_at(&self, pos: usize) -> Marks {
        marks_at(&self.doc, pos)
    }

    /// Inserts `text` at `pos` with the marks found there. Returns the
    /// position after the inserted text.
    pub fn insert_text(&mut self, pos: usize, text: &str) -> Result<usize, StepError> {
        let marks = self.marks_at(pos);
        self.insert_marked_text(pos, text, marks)
    }

    pub fn insert_marked_text(
        &mut self,
        pos: usize,
        text: &str,
        marks: Marks,
    ) -> Result<usize, StepError> {
        if text.is_empty() {
            return Ok(pos);
        }
        let rp = self.doc.resolve(pos)?;
        let parent = rp.parent();
        if !parent.is_textblock() {
            return Err(StepError::NotATextblock(pos));
        }
        let marks = if parent.kind == NodeKind::CodeBlock {
            Marks::default()
        } else {
            marks
        };
        let parent_path = rp.parent_path();
        let index = rp.index(rp.depth());
        let offset = rp.text_offset();
        let child_path = |ix: usize| {
            let mut p = parent_path.clone();
            p.push(ix);
            p
        };
        let text_at = |ix: usize| parent.children.get(ix).and_then(Node::as_text);

        let ops = if offset > 0 {
            let Some(current) = text_at(index) else {
                return Err(StepError::NotATextblock(pos));
            };
            if current.marks == marks {
                vec![Op::InsertText {
                    path: child_path(index),
                    offset,
                    text: text.to_string(),
                }]
            } else {
                vec![
                    Op::SplitText {
                        path: child_path(index),
                        offset,
                        marks: current.marks.clone(),
                    },
                    Op::InsertNode {
                        path: child_path(index + 1),
                        node: Node::marked_text(text, marks),
                    },
                ]
            }
        } else if let Some(before) = index
            .checked_sub(1)
            .and_then(text_at)
            .filter(|t| t.marks == marks)
        {
            vec![Op::InsertText {
                path: child_path(index - 1),
                offset: before.len(),
                text: text.to_string(),
            }]
        } else if text_at(index).is_some_and(|t| t.marks == marks) {
            vec![Op::InsertText {
                path: child_path(index),
                offset: 0,
                text: text.to_string(),
            }]
        } else {
            vec![Op::InsertNode {
                path: child_path(index),
                node: Node::marked_text(text, marks),
            }]
        };
        self.apply_all(ops)?;
        Ok(pos + text.chars().count())
    }

    /// Deletes `from..to`. Supported shapes: a range inside one parent, or a
    /// range whose endpoints both lie in textblocks, in which case the
    /// remainder of the last textblock is joined onto the first.
    pub fn delete_range(&mut self, from: usize, to: usize) -> Result<(), StepError> {
        if from > to {
            return Err(StepError::UnsupportedRange {
                from,
                to,
                reason: "range is reversed",
            });
        }
        if from == to {
            return Ok(());
        }
        let rf = self.doc.resolve(from)?;
        let rt = self.doc.resolve(to)?;
        let a_path = rf.parent_path();
        let b_path = rt.parent_path();

        if a_path == b_path {
            let parent = rf.parent();
            let ops = if parent.is_textblock() {
                inline_delete_ops(parent, &a_path, rf.parent_offset(), rt.parent_offset())
            } else {
                (rf.index(rf.depth())..rt.index(rt.depth()))
                    .rev()
                    .map(|ix| {
                        let mut path = a_path.clone();
                        path.push(ix);
                        Op::RemoveNode { path }
                    })
                    .collect()
            };
            return self.apply_all(ops);
        }

        if !rf.parent().is_textblock() || !rt.parent().is_textblock() {
            return Err(StepError::UnsupportedRange {
                from,
                to,
                reason: "endpoints must share a parent or both lie in textblocks",
            });
        }

        let a_off = rf.parent_offset();
        let b_off = rt.parent_offset();
        let b_el = rt.parent();
        let tail = slice_inline(b_el, b_off, b_el.content_size());
        let common = a_path
            .iter()
            .zip(&b_path)
            .take_while(|(a, b)| a == b)
            .count();

        // Everything on the way down to the end point, bottom-up. Ancestors
        // left empty go with it.
        for level in (common..b_path.len()).rev() {
            let parent_path = &b_path[..level];
            let upto = b_path[level];
            let deepest = level == b_path.len() - 1;
            let emptied = self
                .doc
                .element_at_path(&b_path[..=level])
                .is_some_and(|el| el.children.is_empty());
            let end = if deepest || emptied { upto + 1 } else { upto };
            let start = if level == common { a_path[common] + 1 } else { 0 };
            for ix in (start..end).rev() {
                let mut path = parent_path.to_vec();
                path.push(ix);
                self.apply(Op::RemoveNode { path })?;
            }
        }

        // Siblings after the start point, up to the common ancestor.
        for level in (common + 1..a_path.len()).rev() {
            let parent_path = &a_path[..level];
            let len = self
                .doc
                .element_at_path(parent_path)
                .map_or(0, |el| el.children.len());
            for ix in (a_path[level] + 1..len).rev() {
                let mut path = parent_path.to_vec();
                path.push(ix);
                self.apply(Op::RemoveNode { path })?;
            }
        }

        let a_el = self
            .doc
            .element_at_path(&a_path)
            .ok_or_else(|| StepError::invalid_path(&a_path, "start textblock vanished"))?;
        let trim = inline_delete_ops(a_el, &a_path, a_off, a_el.content_size());
        self.apply_all(trim)?;

        for node in tail {
            let len = self
                .doc
                .element_at_path(&a_path)
                .map_or(0, |el| el.children.len());
            let mut path = a_path.clone();
            path.push(len);
            self.apply(Op::InsertNode { path, node })?;
        }
        Ok(())
    }

    /// Deletes the selection and collapses it to its start. Returns whether
    /// anything was selected.
    pub fn delete_selection(&mut self) -> Result<bool, StepError> {
        let selection = self.selection;
        if selection.is_empty() {
            return Ok(false);
        }
        self.delete_range(selection.from(), selection.to())?;
        self.selection = Selection::caret(selection.from());
        Ok(true)
    }

    /// Replaces kind and attributes of the element starting at `pos`.
    pub fn set_markup(
        &mut self,
        pos: usize,
        kind: NodeKind,
        attrs: Option<Attrs>,
    ) -> Result<(), StepError> {
        let (path, _) = self.element_starting_at(pos)?;
        self.set_markup_at(path, kind, attrs)
    }

    /// Merges `attrs` into the element starting at `pos`.
    pub fn update_attrs(&mut self, pos: usize, attrs: Attrs) -> Result<(), StepError> {
        let (path, _) = self.element_starting_at(pos)?;
        self.set_attrs_at(path, attrs)
    }

    /// Splits the textblock containing `pos` into two siblings: the original
    /// is cloned, the clone inserted after it, the clone's leading text and
    /// the original's trailing text removed. Returns the start of the second
    /// block's content.
    pub fn split_at(&mut self, pos: usize) -> Result<usize, StepError> {
        let rp = self.doc.resolve(pos)?;
        let block = rp.parent();
        if !block.is_textblock() {
            return Err(StepError::NotATextblock(pos));
        }
        let path = rp.parent_path();
        let offset = rp.parent_offset();
        let len = block.content_size();
        let clone = Node::Element(block.clone());

        let mut clone_path = path.clone();
        if let Some(last) = clone_path.last_mut() {
            *last += 1;
        }
        self.apply(Op::InsertNode {
            path: clone_path.clone(),
            node: clone,
        })?;

        let lead = {
            let el = self
                .doc
                .element_at_path(&clone_path)
                .ok_or_else(|| StepError::invalid_path(&clone_path, "clone vanished"))?;
            inline_delete_ops(el, &clone_path, 0, offset)
        };
        self.apply_all(lead)?;

        let trail = {
            let el = self
                .doc
                .element_at_path(&path)
                .ok_or_else(|| StepError::invalid_path(&path, "split block vanished"))?;
            inline_delete_ops(el, &path, offset, len)
        };
        self.apply_all(trail)?;

        let start = self
            .doc
            .pos_before_path(&clone_path)
            .ok_or_else(|| StepError::invalid_path(&clone_path, "clone vanished"))?;
        Ok(start + 1)
    }

    pub fn add_mark(&mut self, from: usize, to: usize, mark: &Mark) -> Result<(), StepError> {
        self.change_marks(from, to, true, |m| m.clone().with(mark))
    }

    pub fn remove_mark(
        &mut self,
        from: usize,
        to: usize,
        mark_type: MarkType,
    ) -> Result<(), StepError> {
        self.change_marks(from, to, false, |m| m.clone().without(mark_type))
    }

    fn change_marks(
        &mut self,
        from: usize,
        to: usize,
        skip_code_blocks: bool,
        f: impl Fn(&Marks) -> Marks,
    ) -> Result<(), StepError> {
        if from >= to {
            return Ok(());
        }
        let size = self.doc.content_size();
        if to > size {
            return Err(crate::error::PositionError::OutOfRange { pos: to, size }.into());
        }

        let mut leaves: Vec<(Path, usize, TextNode)> = Vec::new();
        nodes_between(&self.doc, from, to, |node, pos, path| match node {
            NodeRef::Text(t) => {
                leaves.push((path.to_vec(), pos, t.clone()));
                false
            }
            NodeRef::Element(el) => !(skip_code_blocks && el.kind == NodeKind::CodeBlock),
        });

        for (path, pos, leaf) in leaves.into_iter().rev() {
            let marks = f(&leaf.marks);
            if marks == leaf.marks {
                continue;
            }
            let len = leaf.len();
            let lo = from.max(pos) - pos;
            let hi = to.min(pos + len) - pos;
            if hi < len {
                self.apply(Op::SplitText {
                    path: path.clone(),
                    offset: hi,
                    marks: leaf.marks.clone(),
                })?;
            }
            if lo > 0 {
                self.apply(Op::SplitText {
                    path,
                    offset: lo,
                    marks,
                })?;
            } else {
                self.apply(Op::SetTextMarks { path, marks })?;
            }
        }
        Ok(())
    }
}

/// Marks a character typed at `pos` inherits: those of the surrounding
/// text, with links only continued from inside the link.
pub fn marks_at(doc: &Document, pos: usize) -> Marks {
    let Ok(rp) = doc.resolve(pos) else {
        return Marks::default();
    };
    if !rp.parent().is_textblock() {
        return Marks::default();
    }
    if rp.text_offset() > 0 {
        if let Some(NodeRef::Text(t)) = rp.node_after() {
            return t.marks.clone();
        }
    }
    if let Some(NodeRef::Text(t)) = rp.node_before() {
        return t.marks.clone().without(MarkType::Link);
    }
    if let Some(NodeRef::Text(t)) = rp.node_after() {
        return t.marks.clone().without(MarkType::Link);
    }
    Marks::default()
}

/// Ops removing `from..to` (content offsets) from a textblock, issued
/// back to front so earlier paths stay valid.
fn inline_delete_ops(el: &ElementNode, path: &[usize], from: usize, to: usize) -> Vec<Op> {
    let mut ops = Vec::new();
    let mut pos = 0usize;
    for (ix, child) in el.children.iter().enumerate() {
        let size = child.node_size();
        let end = pos + size;
        if end > from && pos < to {
            let lo = from.max(pos) - pos;
            let hi = to.min(end) - pos;
            let mut child_path = path.to_vec();
            child_path.push(ix);
            if lo == 0 && hi == size {
                ops.push(Op::RemoveNode { path: child_path });
            } else {
                ops.push(Op::RemoveText {
                    path: child_path,
                    range: lo..hi,
                });
            }
        }
        pos = end;
    }
    ops.reverse();
    ops
}

/// Copies the inline content of a textblock between two content offsets.
fn slice_inline(el: &ElementNode, from: usize, to: usize) -> Vec<Node> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    for child in &el.children {
        let size = child.node_size();
        let end = pos + size;
        if end > from && pos < to {
            match child {
                Node::Text(t) => {
                    let lo = from.max(pos) - pos;
                    let hi = to.min(end) - pos;
                    let text: String = t.text.chars().skip(lo).take(hi - lo).collect();
                    out.push(Node::marked_text(text, t.marks.clone()));
                }
                Node::Element(_) => out.push(child.clone()),
            }
        }
        pos = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(doc: Document) -> Draft {
        Draft::new(doc, Selection::caret(0), None, 0)
    }

    fn texts(doc: &Document) -> Vec<String> {
        crate::locate::find_nodes(doc, |n| n.kind().is_textblock(), None)
            .into_iter()
            .map(|l| l.node.as_element().map(|e| e.text_content()).unwrap_or_default())
            .collect()
    }

    #[test]
    fn split_in_the_middle_keeps_both_halves() {
        // featured(0) wrapper(1){ para(2){ "abcdef" 3..9 } }
        let mut d = draft(Document::with_blocks(vec![Node::paragraph("abcdef")]));
        let cursor = d.split_at(6).unwrap();
        assert_eq!(texts(d.doc()), vec!["abc", "def"]);
        assert_eq!(cursor, 8);
        assert_eq!(d.doc().node_at_path(&[1]).unwrap().as_element().unwrap().children.len(), 2);
    }

    #[test]
    fn cross_block_delete_joins_the_remainder() {
        // featured(0) w(1){p(2){"abc" 3..6}} w(8){p(9){"def" 10..13}} w(15){p(16){"ghi" 17..20}}
        let mut d = draft(Document::with_blocks(vec![
            Node::paragraph("abc"),
            Node::paragraph("def"),
            Node::paragraph("ghi"),
        ]));
        d.delete_range(4, 18).unwrap();
        assert_eq!(texts(d.doc()), vec!["ahi"]);
        assert_eq!(d.doc().wrapper_count(), 1);
    }

    #[test]
    fn mark_split_produces_three_leaves() {
        let mut d = draft(Document::with_blocks(vec![Node::paragraph("abcdef")]));
        d.add_mark(4, 6, &Mark::Bold).unwrap();
        let para = d.doc().element_at_path(&[1, 0]).unwrap();
        let leaves: Vec<(String, bool)> = para
            .children
            .iter()
            .filter_map(Node::as_text)
            .map(|t| (t.text.clone(), t.marks.bold))
            .collect();
        assert_eq!(
            leaves,
            vec![("a".into(), false), ("bc".into(), true), ("def".into(), false)]
        );
    }

    #[test]
    fn insert_text_splits_differently_marked_leaf() {
        let mut d = draft(Document::with_blocks(vec![Node::paragraph("abcd")]));
        let end = d
            .insert_marked_text(5, "X", Marks::default().with(&Mark::Italic))
            .unwrap();
        assert_eq!(end, 6);
        let para = d.doc().element_at_path(&[1, 0]).unwrap();
        assert_eq!(para.children.len(), 3);
        assert_eq!(para.text_content(), "abXcd");
    }

    #[test]
    fn reversed_range_is_rejected() {
        let mut d = draft(Document::blank());
        assert!(matches!(
            d.delete_range(3, 1),
            Err(StepError::UnsupportedRange { .. })
        ));
    }
}
