//! Block type changes: headings, code blocks, blockquotes and lists.
//!
//! The edits work on a [`Draft`] so the slash palette can combine them with
//! deleting its query text in one transaction.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::draft::Draft;
use crate::error::{CommandError, StepError};
use crate::locate::nodes_between;
use crate::node::{Attrs, Document, ElementNode, Node, NodeKind, Path};
use crate::plugin::{CommandSpec, EditorPlugin};
use crate::schema::{ChildConstraint, has_indentation, node_spec};

use super::{carry_selection, child_path, parse_args};

pub(crate) struct BlocksPlugin;

#[derive(Deserialize)]
struct LevelArgs {
    #[serde(default = "default_level")]
    level: u64,
}

fn default_level() -> u64 {
    1
}

fn checked_level(level: u64) -> Result<u64, CommandError> {
    if (1..=3).contains(&level) {
        Ok(level)
    } else {
        Err(CommandError::invalid(format!(
            "heading level {level} is outside 1..=3"
        )))
    }
}

impl EditorPlugin for BlocksPlugin {
    fn id(&self) -> &'static str {
        "blocks"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("heading.set", "Heading", |editor, args| {
                let LevelArgs { level } = parse_args(args)?;
                let level = checked_level(level)?;
                editor.transact(|draft| {
                    set_block_type(draft, NodeKind::Heading, level_attrs(level))
                        .map_err(CommandError::from)
                })
            })
            .keywords(["title", "h1", "h2", "h3"])
            .args_example(json!({ "level": 2 })),
            CommandSpec::new("heading.toggle", "Toggle heading", |editor, args| {
                let LevelArgs { level } = parse_args(args)?;
                let level = checked_level(level)?;
                editor.transact(|draft| {
                    let active = all_selected(draft, |el| {
                        el.kind == NodeKind::Heading
                            && el.attr("level").and_then(|v| v.as_u64()).unwrap_or(1) == level
                    });
                    let result = if active {
                        set_block_type(draft, NodeKind::Paragraph, Attrs::new())
                    } else {
                        set_block_type(draft, NodeKind::Heading, level_attrs(level))
                    };
                    result.map_err(CommandError::from)
                })
            })
            .args_example(json!({ "level": 1 })),
            CommandSpec::new("paragraph.set", "Text", |editor, _args| {
                editor.transact(|draft| {
                    set_block_type(draft, NodeKind::Paragraph, Attrs::new())
                        .map_err(CommandError::from)
                })
            })
            .keywords(["normal", "plain"]),
            CommandSpec::new("code_block.toggle", "Code block", |editor, _args| {
                editor.transact(|draft| toggle_code_block(draft).map_err(CommandError::from))
            })
            .keywords(["code", "pre"]),
            CommandSpec::new("blockquote.toggle", "Blockquote", |editor, _args| {
                editor.transact(|draft| toggle_blockquote(draft).map_err(CommandError::from))
            })
            .keywords(["quote"]),
            CommandSpec::new("bullet_list.toggle", "Bullet list", |editor, _args| {
                editor.transact(|draft| {
                    toggle_list(draft, NodeKind::BulletList).map_err(CommandError::from)
                })
            })
            .keywords(["unordered", "ul"]),
            CommandSpec::new("ordered_list.toggle", "Numbered list", |editor, _args| {
                editor.transact(|draft| {
                    toggle_list(draft, NodeKind::OrderedList).map_err(CommandError::from)
                })
            })
            .keywords(["ordered", "ol"]),
        ]
    }
}

pub(crate) fn level_attrs(level: u64) -> Attrs {
    let mut attrs = Attrs::new();
    attrs.insert("level".to_string(), Value::from(level));
    attrs
}

/// Paths of the textblocks overlapping the draft's selection.
fn selected_textblocks(doc: &Document, from: usize, to: usize) -> Vec<Path> {
    let mut out = Vec::new();
    nodes_between(doc, from, to, |node, _, path| {
        if node.kind().is_textblock() {
            out.push(path.to_vec());
            return false;
        }
        true
    });
    out
}

fn all_selected(draft: &Draft, f: impl Fn(&ElementNode) -> bool) -> bool {
    let selection = draft.selection();
    let doc = draft.doc();
    let paths = selected_textblocks(doc, selection.from(), selection.to());
    !paths.is_empty()
        && paths
            .iter()
            .filter_map(|path| doc.element_at_path(path))
            .all(f)
}

/// Turns every selected textblock into `kind` with `attrs`, keeping its
/// indentation when the new kind has one.
pub fn set_block_type(draft: &mut Draft, kind: NodeKind, attrs: Attrs) -> Result<(), StepError> {
    if !kind.is_textblock() {
        return Err(StepError::InvalidMarkup {
            from: NodeKind::Paragraph,
            to: kind,
        });
    }
    let selection = draft.selection();
    for path in selected_textblocks(draft.doc(), selection.from(), selection.to()) {
        let mut next = attrs.clone();
        if has_indentation(kind) {
            let kept = draft
                .doc()
                .element_at_path(&path)
                .and_then(|el| el.attrs.get("indentation").cloned());
            if let Some(indentation) = kept {
                next.entry("indentation".to_string()).or_insert(indentation);
            }
        }
        draft.set_markup_at(path, kind, Some(next))?;
    }
    Ok(())
}

pub fn toggle_code_block(draft: &mut Draft) -> Result<(), StepError> {
    if all_selected(draft, |el| el.kind == NodeKind::CodeBlock) {
        set_block_type(draft, NodeKind::Paragraph, Attrs::new())
    } else {
        set_block_type(draft, NodeKind::CodeBlock, Attrs::new())
    }
}

/// Parent path and first/last child index of the sibling blocks the
/// selection spans, inside the innermost container holding both ends.
fn block_range(doc: &Document, from: usize, to: usize) -> Option<(Path, usize, usize)> {
    let rf = doc.resolve(from).ok()?;
    let rt = doc.resolve(if to > from { to - 1 } else { to }).ok()?;
    let depth = rf.depth().min(rt.depth());
    (1..=depth).rev().find_map(|d| {
        let container = rf.node(d);
        let same = rf.path(d) == rt.path(d);
        let holds_blocks = node_spec(container.kind).children == ChildConstraint::Blocks;
        (same && holds_blocks).then(|| (rf.path(d), rf.index(d), rt.index(d).max(rf.index(d))))
    })
}

/// Replaces children `first..=last` of the element at `parent` with
/// `replacement`.
fn splice(
    draft: &mut Draft,
    parent: &[usize],
    first: usize,
    last: usize,
    replacement: Vec<Node>,
) -> Result<(), StepError> {
    let in_range = draft
        .doc()
        .element_at_path(parent)
        .is_some_and(|el| last < el.children.len() && first <= last);
    if !in_range {
        return Err(StepError::invalid_path(parent, "child range out of bounds"));
    }
    for ix in (first..=last).rev() {
        draft.remove_node_at(child_path(parent, ix))?;
    }
    for (offset, node) in replacement.into_iter().enumerate() {
        draft.insert_node_at(child_path(parent, first + offset), node)?;
    }
    Ok(())
}

/// Lifts the content of the nearest blockquote around the selection out of
/// it, or wraps the selected blocks in a new one.
pub fn toggle_blockquote(draft: &mut Draft) -> Result<(), StepError> {
    let selection = draft.selection();
    let before = draft.doc().clone();
    let rp = before.resolve(selection.from())?;

    let moves: Vec<(Path, Path)> =
        if let Some(depth) = rp.find_depth(|el| el.kind == NodeKind::Blockquote) {
            let quote_path = rp.path(depth);
            let quote = rp.node(depth);
            let Some((&ix, parent)) = quote_path.split_last() else {
                return Ok(());
            };
            splice(draft, parent, ix, ix, quote.children.clone())?;
            (0..quote.children.len())
                .map(|j| (child_path(&quote_path, j), child_path(parent, ix + j)))
                .collect()
        } else {
            let Some((parent, first, last)) = block_range(&before, selection.from(), selection.to())
            else {
                return Ok(());
            };
            let Some(container) = before.element_at_path(&parent) else {
                return Ok(());
            };
            let quoted = container.children[first..=last].to_vec();
            let quote = Node::element(NodeKind::Blockquote, Attrs::new(), quoted);
            splice(draft, &parent, first, last, vec![quote])?;
            (first..=last)
                .map(|ix| {
                    let mut to = child_path(&parent, first);
                    to.push(ix - first);
                    (child_path(&parent, ix), to)
                })
                .collect()
        };

    let carried = carry_selection(&before, draft.doc(), selection, &moves);
    draft.set_selection(carried);
    Ok(())
}

/// Wraps a block for a list item. Items must start with a paragraph, so
/// other textblocks become paragraphs and non-text blocks get an empty
/// paragraph in front. Returns the item and the block's index inside it.
fn list_item_for(block: Node) -> (Node, usize) {
    match block {
        Node::Element(el) if el.kind == NodeKind::Paragraph => (
            Node::element(NodeKind::ListItem, Attrs::new(), vec![Node::Element(el)]),
            0,
        ),
        Node::Element(el) if el.kind.is_textblock() => {
            let para = Node::element(NodeKind::Paragraph, Attrs::new(), el.children);
            (Node::element(NodeKind::ListItem, Attrs::new(), vec![para]), 0)
        }
        other => (
            Node::element(
                NodeKind::ListItem,
                Attrs::new(),
                vec![Node::empty_paragraph(), other],
            ),
            1,
        ),
    }
}

/// Inside a list of `kind`: lifts all of its items' content out. Inside a
/// list of the other kind: switches the list's kind. Otherwise wraps the
/// selected blocks in a new list, one item per block.
pub fn toggle_list(draft: &mut Draft, kind: NodeKind) -> Result<(), StepError> {
    if !kind.is_list() {
        return Err(StepError::InvalidMarkup {
            from: NodeKind::BulletList,
            to: kind,
        });
    }
    let selection = draft.selection();
    let before = draft.doc().clone();
    let rp = before.resolve(selection.from())?;

    let moves: Vec<(Path, Path)> = if let Some(depth) = rp.find_depth(|el| el.kind.is_list()) {
        let list_path = rp.path(depth);
        let list = rp.node(depth);
        if list.kind != kind {
            draft.set_markup_at(list_path, kind, Some(Attrs::new()))?;
            return Ok(());
        }
        let Some((&ix, parent)) = list_path.split_last() else {
            return Ok(());
        };
        let mut lifted = Vec::new();
        let mut moves = Vec::new();
        for (item_ix, item) in list.children.iter().enumerate() {
            let Some(item) = item.as_element() else {
                continue;
            };
            for (j, child) in item.children.iter().enumerate() {
                let mut from = child_path(&list_path, item_ix);
                from.push(j);
                moves.push((from, child_path(parent, ix + lifted.len())));
                lifted.push(child.clone());
            }
        }
        splice(draft, parent, ix, ix, lifted)?;
        moves
    } else {
        let Some((parent, first, last)) = block_range(&before, selection.from(), selection.to())
        else {
            return Ok(());
        };
        let Some(container) = before.element_at_path(&parent) else {
            return Ok(());
        };
        let mut items = Vec::new();
        let mut moves = Vec::new();
        for (offset, block) in container.children[first..=last].iter().enumerate() {
            let (item, inner) = list_item_for(block.clone());
            let mut to = child_path(&parent, first);
            to.extend([offset, inner]);
            moves.push((child_path(&parent, first + offset), to));
            items.push(item);
        }
        let list = Node::element(kind, Attrs::new(), items);
        splice(draft, &parent, first, last, vec![list])?;
        moves
    };

    let carried = carry_selection(&before, draft.doc(), selection, &moves);
    draft.set_selection(carried);
    Ok(())
}
