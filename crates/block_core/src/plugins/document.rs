//! Schema repair run after every commit: document shape, wrapper rules,
//! container content and text leaf hygiene.

use serde_json::Value;

use crate::node::{Document, ElementNode, Indentation, Marks, Node, NodeKind};
use crate::ops::{AttrPatch, Op};
use crate::plugin::{EditorPlugin, NormalizePass};
use crate::schema::{ChildConstraint, allows_child, has_indentation, is_block_content, node_spec};

use super::child_path;

pub(crate) struct DocumentPlugin;

impl EditorPlugin for DocumentPlugin {
    fn id(&self) -> &'static str {
        "document"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(FeaturedImageFirst),
            Box::new(WrapTopLevelBlocks),
            Box::new(UnwrapNestedWrappers),
            Box::new(EnsureWrappers),
            Box::new(FixContainerContent),
            Box::new(NormalizeTextLeaves),
            Box::new(NormalizeAttrs),
        ]
    }
}

struct FeaturedImageFirst;

impl NormalizePass for FeaturedImageFirst {
    fn id(&self) -> &'static str {
        "document.featured_image_first"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        let children = doc.children();
        if children.first().map(Node::kind) != Some(NodeKind::FeaturedImage) {
            // Move a stray featured image to the front, or create one.
            return match children
                .iter()
                .position(|n| n.kind() == NodeKind::FeaturedImage)
            {
                Some(ix) => vec![
                    Op::RemoveNode { path: vec![ix] },
                    Op::InsertNode {
                        path: vec![0],
                        node: children[ix].clone(),
                    },
                ],
                None => vec![Op::InsertNode {
                    path: vec![0],
                    node: Node::featured_image(),
                }],
            };
        }
        children
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .filter(|(_, n)| n.kind() == NodeKind::FeaturedImage)
            .map(|(ix, _)| Op::RemoveNode { path: vec![ix] })
            .collect()
    }
}

struct WrapTopLevelBlocks;

impl NormalizePass for WrapTopLevelBlocks {
    fn id(&self) -> &'static str {
        "document.wrap_top_level_blocks"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        let mut ops = Vec::new();
        for (ix, node) in doc.children().iter().enumerate().skip(1).rev() {
            let kind = node.kind();
            if matches!(kind, NodeKind::BlockWrapper | NodeKind::FeaturedImage) {
                continue;
            }
            let path = vec![ix];
            ops.push(Op::RemoveNode { path: path.clone() });
            if let Some(block) = as_block(node) {
                ops.push(Op::InsertNode {
                    path,
                    node: Node::block_wrapper(vec![block]),
                });
            }
        }
        ops
    }
}

/// Turns a node that landed where blocks are expected into a block, or
/// `None` when it should be dropped.
fn as_block(node: &Node) -> Option<Node> {
    match node {
        Node::Text(t) if t.is_empty() => None,
        Node::Text(t) => Some(Node::element(
            NodeKind::Paragraph,
            Default::default(),
            vec![Node::Text(t.clone())],
        )),
        Node::Element(el) if is_block_content(el.kind) => Some(node.clone()),
        Node::Element(el) if el.kind == NodeKind::ListItem => Some(Node::element(
            NodeKind::BulletList,
            Default::default(),
            vec![node.clone()],
        )),
        Node::Element(_) => None,
    }
}

struct UnwrapNestedWrappers;

impl NormalizePass for UnwrapNestedWrappers {
    fn id(&self) -> &'static str {
        "document.unwrap_nested_wrappers"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        fn collect(el: &ElementNode, path: &mut Vec<usize>, out: &mut Vec<(Vec<usize>, ElementNode)>) {
            for (ix, child) in el.children.iter().enumerate() {
                let Node::Element(child_el) = child else {
                    continue;
                };
                path.push(ix);
                if child_el.kind == NodeKind::BlockWrapper {
                    out.push((path.clone(), child_el.clone()));
                } else {
                    collect(child_el, path, out);
                }
                path.pop();
            }
        }

        let mut found = Vec::new();
        for (ix, child) in doc.children().iter().enumerate() {
            if let Node::Element(el) = child {
                collect(el, &mut vec![ix], &mut found);
            }
        }

        // Back to front, so earlier paths stay valid while later wrappers
        // are spliced open.
        let mut ops = Vec::new();
        for (path, wrapper) in found.into_iter().rev() {
            ops.push(Op::RemoveNode { path: path.clone() });
            let mut slot = path;
            for child in wrapper.children {
                ops.push(Op::InsertNode {
                    path: slot.clone(),
                    node: child,
                });
                if let Some(last) = slot.last_mut() {
                    *last += 1;
                }
            }
        }
        ops
    }
}

struct EnsureWrappers;

impl NormalizePass for EnsureWrappers {
    fn id(&self) -> &'static str {
        "document.ensure_wrappers"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        let children = doc.children();
        let wrappers: Vec<(usize, bool)> = children
            .iter()
            .enumerate()
            .filter_map(|(ix, n)| match n {
                Node::Element(el) if el.kind == NodeKind::BlockWrapper => {
                    Some((ix, el.children.is_empty()))
                }
                _ => None,
            })
            .collect();

        let Some(&(first_ix, _)) = wrappers.first() else {
            return vec![Op::InsertNode {
                path: vec![children.len()],
                node: Node::empty_block_wrapper(),
            }];
        };
        let all_empty = wrappers.iter().all(|(_, empty)| *empty);

        let mut ops = Vec::new();
        for &(ix, empty) in wrappers.iter().rev() {
            if !empty {
                continue;
            }
            if all_empty && ix == first_ix {
                ops.push(Op::InsertNode {
                    path: vec![ix, 0],
                    node: Node::empty_paragraph(),
                });
            } else {
                ops.push(Op::RemoveNode { path: vec![ix] });
            }
        }
        ops
    }
}

struct FixContainerContent;

impl NormalizePass for FixContainerContent {
    fn id(&self) -> &'static str {
        "document.fix_container_content"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        let mut ops = Vec::new();
        for (ix, child) in doc.children().iter().enumerate().rev() {
            if let Node::Element(el) = child {
                fix_element(el, &mut vec![ix], &mut ops);
            }
        }
        ops
    }
}

/// Children are visited back to front, each subtree before its parent's
/// own child list changes. Empty wrappers are left to [`EnsureWrappers`].
fn fix_element(el: &ElementNode, path: &mut Vec<usize>, ops: &mut Vec<Op>) {
    let constraint = node_spec(el.kind).children;
    let mut survivors = Vec::new();
    for (ix, child) in el.children.iter().enumerate().rev() {
        let kind = child.kind();
        path.push(ix);
        if allows_child(el.kind, kind) {
            if let Node::Element(child_el) = child {
                fix_element(child_el, path, ops);
            }
            survivors.push(kind);
        } else {
            ops.push(Op::RemoveNode { path: path.clone() });
            if let Some(replacement) = coerce_child(constraint, child) {
                survivors.push(replacement.kind());
                ops.push(Op::InsertNode {
                    path: path.clone(),
                    node: replacement,
                });
            }
        }
        path.pop();
    }
    // Collected back to front.
    let first = survivors.last().copied();

    match (constraint, first) {
        (ChildConstraint::Blocks, None) if el.kind != NodeKind::BlockWrapper => {
            ops.push(Op::InsertNode {
                path: child_path(path, 0),
                node: Node::empty_paragraph(),
            });
        }
        (ChildConstraint::ListItems, None) => {
            ops.push(Op::InsertNode {
                path: child_path(path, 0),
                node: list_item(Node::empty_paragraph()),
            });
        }
        (ChildConstraint::Blocks, Some(kind))
            if el.kind == NodeKind::ListItem && kind != NodeKind::Paragraph =>
        {
            ops.push(Op::InsertNode {
                path: child_path(path, 0),
                node: Node::empty_paragraph(),
            });
        }
        _ => {}
    }
}

fn list_item(first: Node) -> Node {
    Node::element(NodeKind::ListItem, Default::default(), vec![first])
}

/// What a disallowed child becomes inside a container with `constraint`.
fn coerce_child(constraint: ChildConstraint, child: &Node) -> Option<Node> {
    match constraint {
        ChildConstraint::Blocks => as_block(child),
        ChildConstraint::ListItems => {
            let block = as_block(child)?;
            Some(match block.kind() {
                NodeKind::Paragraph => list_item(block),
                _ => Node::element(
                    NodeKind::ListItem,
                    Default::default(),
                    vec![Node::empty_paragraph(), block],
                ),
            })
        }
        ChildConstraint::InlineOnly => {
            let text = child.text_content();
            (!text.is_empty()).then(|| Node::text(text))
        }
        ChildConstraint::None | ChildConstraint::TopLevel => None,
    }
}

struct NormalizeTextLeaves;

impl NormalizePass for NormalizeTextLeaves {
    fn id(&self) -> &'static str {
        "document.normalize_text_leaves"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        fn walk(el: &ElementNode, path: &mut Vec<usize>, ops: &mut Vec<Op>) {
            if el.is_textblock() {
                textblock_ops(el, path, ops);
                return;
            }
            for (ix, child) in el.children.iter().enumerate().rev() {
                if let Node::Element(child_el) = child {
                    path.push(ix);
                    walk(child_el, path, ops);
                    path.pop();
                }
            }
        }

        let mut ops = Vec::new();
        walk(doc.root(), &mut Vec::new(), &mut ops);
        ops
    }
}

/// Drops empty leaves, strips marks inside code blocks and joins neighbours
/// with equal marks. Joining keeps every position where it was.
fn textblock_ops(el: &ElementNode, path: &[usize], ops: &mut Vec<Op>) {
    let strip = el.kind == NodeKind::CodeBlock;
    let mut next: Option<Marks> = None;
    for (ix, child) in el.children.iter().enumerate().rev() {
        let Node::Text(t) = child else {
            next = None;
            continue;
        };
        let leaf = child_path(path, ix);
        if t.is_empty() {
            ops.push(Op::RemoveNode { path: leaf });
            continue;
        }
        let marks = if strip { Marks::default() } else { t.marks.clone() };
        if marks != t.marks {
            ops.push(Op::SetTextMarks {
                path: leaf.clone(),
                marks: marks.clone(),
            });
        }
        if next.as_ref() == Some(&marks) {
            ops.push(Op::JoinText { path: leaf });
        }
        next = Some(marks);
    }
}

struct NormalizeAttrs;

impl NormalizePass for NormalizeAttrs {
    fn id(&self) -> &'static str {
        "document.normalize_attrs"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        fn walk(el: &ElementNode, path: &mut Vec<usize>, ops: &mut Vec<Op>) {
            let mut patch = AttrPatch::default();
            if has_indentation(el.kind) {
                if let Some(value) = el.attrs.get("indentation") {
                    let valid = value
                        .as_str()
                        .is_some_and(|s| s.parse::<Indentation>().is_ok());
                    if !valid {
                        patch.remove.push("indentation".to_string());
                    }
                }
            }
            if el.kind == NodeKind::Heading {
                if let Some(value) = el.attrs.get("level") {
                    let level = value.as_u64().unwrap_or(1).clamp(1, 3);
                    if value.as_u64() != Some(level) {
                        patch.set.insert("level".to_string(), Value::from(level));
                    }
                }
            }
            if !patch.is_empty() {
                ops.push(Op::SetNodeAttrs {
                    path: path.clone(),
                    patch,
                });
            }
            for (ix, child) in el.children.iter().enumerate() {
                if let Node::Element(child_el) = child {
                    path.push(ix);
                    walk(child_el, path, ops);
                    path.pop();
                }
            }
        }

        let mut ops = Vec::new();
        for (ix, child) in doc.children().iter().enumerate() {
            if let Node::Element(el) = child {
                walk(el, &mut vec![ix], &mut ops);
            }
        }
        ops
    }
}
