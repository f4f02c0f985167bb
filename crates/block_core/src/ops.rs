use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::StepError;
use crate::node::{Attrs, Document, ElementNode, Marks, Node, NodeKind, Path, TextNode, byte_offset};
use crate::selection::Selection;

/// Path-addressed tree edit. Text offsets count Unicode scalar values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    InsertText {
        path: Path,
        offset: usize,
        text: String,
    },
    RemoveText {
        path: Path,
        range: Range<usize>,
    },
    InsertNode {
        path: Path,
        node: Node,
    },
    RemoveNode {
        path: Path,
    },
    SetNodeAttrs {
        #[serde(default)]
        path: Path,
        patch: AttrPatch,
    },
    SetNodeKind {
        path: Path,
        kind: NodeKind,
    },
    SetTextMarks {
        path: Path,
        marks: Marks,
    },
    /// Appends the following sibling leaf to the text leaf at `path`. The
    /// sibling's marks are dropped. Positions are unaffected.
    JoinText {
        path: Path,
    },
    /// Cuts the text leaf at `path` at `offset`; the tail becomes the next
    /// sibling carrying `marks`. Positions are unaffected.
    SplitText {
        path: Path,
        offset: usize,
        marks: Marks,
    },
}

impl Op {
    pub fn path(&self) -> &[usize] {
        match self {
            Op::InsertText { path, .. }
            | Op::RemoveText { path, .. }
            | Op::InsertNode { path, .. }
            | Op::RemoveNode { path }
            | Op::SetNodeAttrs { path, .. }
            | Op::SetNodeKind { path, .. }
            | Op::SetTextMarks { path, .. }
            | Op::JoinText { path }
            | Op::SplitText { path, .. } => path,
        }
    }

    pub fn set_attr(path: Path, key: &str, value: serde_json::Value) -> Self {
        let mut set = Attrs::new();
        set.insert(key.to_string(), value);
        Op::SetNodeAttrs {
            path,
            patch: AttrPatch {
                set,
                remove: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrPatch {
    #[serde(default)]
    pub set: Attrs,
    #[serde(default)]
    pub remove: Vec<String>,
}

impl AttrPatch {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }

    /// Patch turning `current` into exactly `next`.
    pub fn replace(current: &Attrs, next: &Attrs) -> Self {
        let set = next
            .iter()
            .filter(|(k, v)| current.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let remove = current
            .keys()
            .filter(|k| !next.contains_key(*k))
            .cloned()
            .collect();
        Self { set, remove }
    }
}

/// Applies `patch` and returns the patch that undoes it.
fn patch_apply(attrs: &mut Attrs, patch: &AttrPatch) -> AttrPatch {
    let mut old_set = Attrs::new();
    let mut old_remove = Vec::new();

    for (k, v) in &patch.set {
        if let Some(prev) = attrs.insert(k.clone(), v.clone()) {
            old_set.insert(k.clone(), prev);
        } else {
            old_remove.push(k.clone());
        }
    }

    for key in &patch.remove {
        if let Some(prev) = attrs.remove(key) {
            old_set.insert(key.clone(), prev);
        }
    }

    AttrPatch {
        set: old_set,
        remove: old_remove,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub ops: Vec<Op>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_after: Option<Selection>,
    #[serde(default)]
    pub meta: TransactionMeta,
}

impl Transaction {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            ops,
            selection_after: None,
            meta: TransactionMeta::default(),
        }
    }

    pub fn selection_after(mut self, selection_after: Selection) -> Self {
        self.selection_after = Some(selection_after);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.meta.source = Some(source.into());
        self
    }
}

/// Which side a position sticks to when content is inserted exactly at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bias {
    Left,
    #[default]
    Right,
}

/// Position effect of one applied op: `deleted` tokens at `pos` were
/// replaced by `inserted` tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepMap {
    pub pos: usize,
    pub deleted: usize,
    pub inserted: usize,
}

impl StepMap {
    pub const IDENTITY: StepMap = StepMap {
        pos: 0,
        deleted: 0,
        inserted: 0,
    };

    pub fn is_identity(&self) -> bool {
        self.deleted == 0 && self.inserted == 0
    }

    pub fn map(&self, pos: usize, bias: Bias) -> usize {
        if self.is_identity() || pos < self.pos {
            return pos;
        }
        let end = self.pos + self.deleted;
        if pos > end {
            return pos - self.deleted + self.inserted;
        }
        if self.deleted == 0 || (pos == end && pos > self.pos) {
            // At an insertion point, or at the far edge of a deletion.
            return match bias {
                Bias::Left if self.deleted == 0 => pos,
                _ => self.pos + self.inserted,
            };
        }
        match bias {
            Bias::Left => self.pos,
            Bias::Right => self.pos + self.inserted,
        }
    }
}

/// Ordered step maps of a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn map(&self, pos: usize, bias: Bias) -> usize {
        self.map_from(0, pos, bias)
    }

    /// Maps a position taken after the first `start` steps through the rest.
    pub fn map_from(&self, start: usize, pos: usize, bias: Bias) -> usize {
        self.maps
            .iter()
            .skip(start)
            .fold(pos, |pos, m| m.map(pos, bias))
    }
}

/// Applies `op` to `doc`, returning its inverse and its position map.
pub fn apply_op(doc: &mut Document, op: Op) -> Result<(Op, StepMap), StepError> {
    tracing::trace!(?op, "apply op");
    match op {
        Op::InsertText { path, offset, text } => {
            let start = doc
                .pos_before_path(&path)
                .ok_or_else(|| StepError::invalid_path(&path, "no such text node"))?;
            let node = text_mut(doc, &path)?;
            let len = node.len();
            if offset > len {
                return Err(StepError::invalid_path(
                    &path,
                    format!("text offset {offset} past length {len}"),
                ));
            }
            let at = byte_offset(&node.text, offset);
            node.text.insert_str(at, &text);
            let inserted = text.chars().count();
            let map = StepMap {
                pos: start + offset,
                deleted: 0,
                inserted,
            };
            Ok((
                Op::RemoveText {
                    path,
                    range: offset..offset + inserted,
                },
                map,
            ))
        }
        Op::RemoveText { path, range } => {
            let start = doc
                .pos_before_path(&path)
                .ok_or_else(|| StepError::invalid_path(&path, "no such text node"))?;
            let node = text_mut(doc, &path)?;
            let len = node.len();
            if range.start > range.end || range.end > len {
                return Err(StepError::invalid_path(
                    &path,
                    format!("text range {range:?} outside length {len}"),
                ));
            }
            let lo = byte_offset(&node.text, range.start);
            let hi = byte_offset(&node.text, range.end);
            let removed: String = node.text[lo..hi].to_string();
            node.text.replace_range(lo..hi, "");
            let map = StepMap {
                pos: start + range.start,
                deleted: range.end - range.start,
                inserted: 0,
            };
            Ok((
                Op::InsertText {
                    path,
                    offset: range.start,
                    text: removed,
                },
                map,
            ))
        }
        Op::InsertNode { path, node } => {
            let pos = doc
                .pos_before_path(&path)
                .ok_or_else(|| StepError::invalid_path(&path, "insert slot out of bounds"))?;
            let (index, parent_path) = split_path(&path)?;
            let parent = element_mut(doc, parent_path)?;
            if parent.kind.is_leaf() {
                return Err(StepError::invalid_path(&path, "parent is a leaf"));
            }
            if index > parent.children.len() {
                return Err(StepError::invalid_path(&path, "insert index out of bounds"));
            }
            let map = StepMap {
                pos,
                deleted: 0,
                inserted: node.node_size(),
            };
            parent.children.insert(index, node);
            Ok((Op::RemoveNode { path }, map))
        }
        Op::RemoveNode { path } => {
            let pos = doc
                .pos_before_path(&path)
                .ok_or_else(|| StepError::invalid_path(&path, "no such node"))?;
            let (index, parent_path) = split_path(&path)?;
            let parent = element_mut(doc, parent_path)?;
            if index >= parent.children.len() {
                return Err(StepError::invalid_path(&path, "remove index out of bounds"));
            }
            let removed = parent.children.remove(index);
            let map = StepMap {
                pos,
                deleted: removed.node_size(),
                inserted: 0,
            };
            Ok((
                Op::InsertNode {
                    path,
                    node: removed,
                },
                map,
            ))
        }
        Op::SetNodeAttrs { path, patch } => {
            let el = element_mut(doc, &path)?;
            let old = patch_apply(&mut el.attrs, &patch);
            Ok((Op::SetNodeAttrs { path, patch: old }, StepMap::IDENTITY))
        }
        Op::SetNodeKind { path, kind } => {
            if path.is_empty() {
                return Err(StepError::invalid_path(&path, "cannot retype the document"));
            }
            let el = element_mut(doc, &path)?;
            let old = el.kind;
            if old.is_leaf() != kind.is_leaf() || kind == NodeKind::Document || kind == NodeKind::Text
            {
                return Err(StepError::InvalidMarkup { from: old, to: kind });
            }
            el.kind = kind;
            Ok((Op::SetNodeKind { path, kind: old }, StepMap::IDENTITY))
        }
        Op::SetTextMarks { path, marks } => {
            let node = text_mut(doc, &path)?;
            let old = std::mem::replace(&mut node.marks, marks);
            Ok((Op::SetTextMarks { path, marks: old }, StepMap::IDENTITY))
        }
        Op::JoinText { path } => {
            let (index, parent_path) = split_path(&path)?;
            let parent = element_mut(doc, parent_path)?;
            let both_text = matches!(
                (parent.children.get(index), parent.children.get(index + 1)),
                (Some(Node::Text(_)), Some(Node::Text(_)))
            );
            if !both_text {
                return Err(StepError::invalid_path(&path, "join needs two text leaves"));
            }
            let (Node::Text(next), Some(Node::Text(node))) = (
                parent.children.remove(index + 1),
                parent.children.get_mut(index),
            ) else {
                return Err(StepError::invalid_path(&path, "join needs two text leaves"));
            };
            let offset = node.len();
            node.text.push_str(&next.text);
            Ok((
                Op::SplitText {
                    path,
                    offset,
                    marks: next.marks,
                },
                StepMap::IDENTITY,
            ))
        }
        Op::SplitText {
            path,
            offset,
            marks,
        } => {
            let (index, parent_path) = split_path(&path)?;
            let parent = element_mut(doc, parent_path)?;
            let Some(Node::Text(node)) = parent.children.get_mut(index) else {
                return Err(StepError::invalid_path(&path, "expected a text node"));
            };
            let len = node.len();
            if offset > len {
                return Err(StepError::invalid_path(
                    &path,
                    format!("split offset {offset} past length {len}"),
                ));
            }
            let tail = node.text.split_off(byte_offset(&node.text, offset));
            parent
                .children
                .insert(index + 1, Node::Text(TextNode::with_marks(tail, marks)));
            Ok((Op::JoinText { path }, StepMap::IDENTITY))
        }
    }
}

fn split_path(path: &[usize]) -> Result<(usize, &[usize]), StepError> {
    match path.split_last() {
        Some((index, parent)) => Ok((*index, parent)),
        None => Err(StepError::invalid_path(path, "empty path")),
    }
}

pub(crate) fn element_mut<'a>(
    doc: &'a mut Document,
    path: &[usize],
) -> Result<&'a mut ElementNode, StepError> {
    let mut el = doc.root_mut();
    for (depth, &ix) in path.iter().enumerate() {
        let len = el.children.len();
        el = match el.children.get_mut(ix) {
            Some(Node::Element(child)) => child,
            Some(Node::Text(_)) => {
                return Err(StepError::invalid_path(
                    path,
                    format!("text node at depth {depth} is not a container"),
                ));
            }
            None => {
                return Err(StepError::invalid_path(
                    path,
                    format!("index {ix} out of bounds at depth {depth} ({len} children)"),
                ));
            }
        };
    }
    Ok(el)
}

fn text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, StepError> {
    let (index, parent_path) = split_path(path)?;
    match element_mut(doc, parent_path)?.children.get_mut(index) {
        Some(Node::Text(t)) => Ok(t),
        _ => Err(StepError::invalid_path(path, "expected a text node")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::with_blocks(vec![Node::paragraph("abc")])
    }

    #[test]
    fn inverse_ops_restore_the_document() {
        let mut doc = doc();
        let original = doc.clone();
        let ops = vec![
            Op::InsertText {
                path: vec![1, 0, 0],
                offset: 1,
                text: "xy".into(),
            },
            Op::InsertNode {
                path: vec![2],
                node: Node::empty_block_wrapper(),
            },
            Op::set_attr(vec![1], "indentation", "center".into()),
            Op::SetNodeKind {
                path: vec![1, 0],
                kind: NodeKind::Heading,
            },
            Op::RemoveText {
                path: vec![1, 0, 0],
                range: 0..2,
            },
        ];
        let mut inverse = Vec::new();
        for op in ops {
            inverse.push(apply_op(&mut doc, op).unwrap().0);
        }
        assert_eq!(doc.node_at_path(&[1, 0]).unwrap().text_content(), "ybc");
        for op in inverse.into_iter().rev() {
            apply_op(&mut doc, op).unwrap();
        }
        assert_eq!(doc, original);
    }

    #[test]
    fn split_and_join_keep_positions() {
        let mut doc = doc();
        let bold = Marks {
            bold: true,
            ..Marks::default()
        };
        let (inverse, map) = apply_op(
            &mut doc,
            Op::SplitText {
                path: vec![1, 0, 0],
                offset: 1,
                marks: bold.clone(),
            },
        )
        .unwrap();
        assert!(map.is_identity());
        let para = doc.element_at_path(&[1, 0]).unwrap();
        assert_eq!(para.children.len(), 2);
        assert_eq!(para.children[1], Node::marked_text("bc", bold));
        assert_eq!(inverse, Op::JoinText { path: vec![1, 0, 0] });
        apply_op(&mut doc, inverse).unwrap();
        assert_eq!(doc, self::doc());
    }

    #[test]
    fn step_maps_shift_later_positions() {
        let mut doc = doc();
        let (_, map) = apply_op(
            &mut doc,
            Op::InsertText {
                path: vec![1, 0, 0],
                offset: 1,
                text: "xy".into(),
            },
        )
        .unwrap();
        assert_eq!(map, StepMap { pos: 4, deleted: 0, inserted: 2 });
        assert_eq!(map.map(3, Bias::Right), 3);
        assert_eq!(map.map(4, Bias::Left), 4);
        assert_eq!(map.map(4, Bias::Right), 6);
        assert_eq!(map.map(5, Bias::Right), 7);

        let (_, map) = apply_op(&mut doc, Op::RemoveNode { path: vec![1] }).unwrap();
        assert_eq!(map, StepMap { pos: 1, deleted: 9, inserted: 0 });
        assert_eq!(map.map(5, Bias::Left), 1);
        assert_eq!(map.map(10, Bias::Right), 1);
        assert_eq!(map.map(11, Bias::Right), 2);
    }

    #[test]
    fn mapping_composes_steps() {
        let mut mapping = Mapping::new();
        mapping.push(StepMap { pos: 2, deleted: 0, inserted: 3 });
        mapping.push(StepMap { pos: 0, deleted: 1, inserted: 0 });
        assert_eq!(mapping.map(4, Bias::Right), 6);
        assert_eq!(mapping.map_from(1, 4, Bias::Right), 3);
    }

    #[test]
    fn invalid_paths_are_rejected() {
        let mut doc = doc();
        assert!(apply_op(&mut doc, Op::RemoveNode { path: vec![7] }).is_err());
        assert!(apply_op(
            &mut doc,
            Op::InsertText {
                path: vec![1, 0],
                offset: 0,
                text: "x".into(),
            }
        )
        .is_err());
        assert!(apply_op(
            &mut doc,
            Op::SetNodeKind {
                path: vec![1, 0],
                kind: NodeKind::Image,
            }
        )
        .is_err());
    }
}
