//! Enter handling and wrapper-level commands.
//!
//! Every top-level block lives in its own wrapper, so Enter normally opens a
//! new wrapper instead of splitting inside the current one. Only a cursor in
//! the middle of text splits the textblock in place.

use serde::Deserialize;
use serde_json::json;

use crate::core::Editor;
use crate::draft::Draft;
use crate::error::{CommandError, StepError};
use crate::events::KeyChord;
use crate::locate::{find_selected_node, is_kind};
use crate::node::{ElementNode, Indentation, Node, NodeKind};
use crate::plugin::{CommandSpec, EditorPlugin, KeyBinding};
use crate::selection::Selection;

use super::{PRIORITY_HIGH, caret_in, carry_selection, parse_args, wrapper_index};

pub(crate) struct BlockWrapperPlugin;

impl EditorPlugin for BlockWrapperPlugin {
    fn id(&self) -> &'static str {
        "block_wrapper"
    }

    fn keymap(&self) -> Vec<KeyBinding> {
        vec![KeyBinding::new(
            KeyChord::key("Enter"),
            PRIORITY_HIGH,
            handle_enter,
        )]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("block_wrapper.insert", "Insert block", |editor, args| {
                #[derive(Deserialize)]
                struct Args {
                    pos: usize,
                }
                let Args { pos } = parse_args(args)?;
                insert_block_wrapper(editor, pos)
            })
            .description("Insert an empty block at a position between top-level blocks.")
            .args_example(json!({ "pos": 1 })),
            CommandSpec::new(
                "block_wrapper.insert_above",
                "Insert block above",
                |editor, args| {
                    let PosArgs { pos } = parse_args(args)?;
                    insert_block_wrapper_above(editor, pos)
                },
            )
            .keywords(["before", "new"]),
            CommandSpec::new(
                "block_wrapper.insert_below",
                "Insert block below",
                |editor, args| {
                    let PosArgs { pos } = parse_args(args)?;
                    insert_block_wrapper_below(editor, pos)
                },
            )
            .keywords(["after", "new"]),
            CommandSpec::new("block_wrapper.wrap", "Wrap in own block", |editor, _args| {
                wrap_in_block_wrapper(editor)
            })
            .description("Move the current block out of a shared wrapper into its own."),
            CommandSpec::new(
                "block_wrapper.set_indentation",
                "Align block",
                |editor, args| {
                    #[derive(Deserialize)]
                    struct Args {
                        indentation: String,
                        #[serde(default)]
                        pos: Option<usize>,
                    }
                    let Args { indentation, pos } = parse_args(args)?;
                    set_block_wrapper_indentation(editor, &indentation, pos)
                },
            )
            .args_example(json!({ "indentation": "center" })),
            CommandSpec::new("block_wrapper.move_up", "Move block up", |editor, _args| {
                move_block_wrapper(editor, Direction::Up)
            }),
            CommandSpec::new("block_wrapper.move_down", "Move block down", |editor, _args| {
                move_block_wrapper(editor, Direction::Down)
            }),
        ]
    }
}

#[derive(Deserialize)]
struct PosArgs {
    #[serde(default)]
    pos: Option<usize>,
}

fn handle_enter(editor: &mut Editor) -> bool {
    let (ignored, exception) = {
        let doc = editor.doc();
        let selection = editor.selection();
        let inside = |kinds: &[NodeKind]| {
            kinds
                .iter()
                .any(|&kind| find_selected_node(doc, &selection, is_kind(kind), None).is_some())
        };
        let config = editor.config();
        (
            inside(&config.enter_ignored_kinds),
            inside(&config.enter_exception_kinds),
        )
    };
    if ignored {
        return false;
    }
    if exception {
        return insert_block_wrapper_below(editor, None).is_ok();
    }
    match editor.transact(|draft| {
        draft.set_source("key.enter");
        split_or_open(draft)
    }) {
        Ok(handled) => handled,
        Err(err) => {
            tracing::debug!(%err, "enter aborted");
            false
        }
    }
}

/// The Enter state machine, after the ignored and exception kinds.
fn split_or_open(draft: &mut Draft) -> Result<bool, StepError> {
    if draft.selection().is_node() {
        let Some(ix) = wrapper_index(draft.doc(), draft.selection().from()) else {
            return Ok(false);
        };
        open_wrapper(draft, ix + 1)?;
        return Ok(true);
    }

    draft.delete_selection()?;
    let pos = draft.selection().head();
    let rp = draft.doc().resolve(pos)?;
    let Some(wrapper_depth) = rp.find_depth(|el| el.kind == NodeKind::BlockWrapper) else {
        return Ok(false);
    };
    let block = rp.parent();
    if !block.is_textblock() {
        return Ok(false);
    }
    let wrapper_ix = rp.index(0);
    let sole = rp.depth() == wrapper_depth + 1 && rp.node(wrapper_depth).children.len() == 1;
    let offset = rp.parent_offset();
    let len = block.content_size();
    let blank = block.text_content().trim().is_empty();

    if blank {
        if sole {
            draft.remove_node_at(vec![wrapper_ix])?;
            open_wrapper(draft, wrapper_ix)?;
        } else {
            open_wrapper(draft, wrapper_ix + 1)?;
        }
    } else if offset == 0 {
        // The caret maps past the new wrapper and stays on its text.
        draft.insert_node_at(vec![wrapper_ix], Node::empty_block_wrapper())?;
    } else if offset == len {
        open_wrapper(draft, wrapper_ix + 1)?;
    } else {
        let caret = draft.split_at(pos)?;
        draft.set_selection(Selection::caret(caret));
    }
    Ok(true)
}

/// Inserts an empty wrapper at top-level index `ix` and moves the caret
/// into it.
fn open_wrapper(draft: &mut Draft, ix: usize) -> Result<(), StepError> {
    draft.insert_node_at(vec![ix], Node::empty_block_wrapper())?;
    let caret = caret_in(draft.doc(), ix);
    draft.set_selection(Selection::caret(caret));
    Ok(())
}

/// Inserts an empty wrapper at `pos`, which must lie between two top-level
/// nodes after the featured image.
pub fn insert_block_wrapper(editor: &mut Editor, pos: usize) -> Result<(), CommandError> {
    editor.transact(|draft| {
        let rp = draft.doc().resolve(pos)?;
        if rp.depth() != 0 {
            return Err(CommandError::invalid(format!(
                "position {pos} is not between top-level blocks"
            )));
        }
        let ix = rp.index(0);
        if ix == 0 {
            return Err(CommandError::invalid(
                "nothing may precede the featured image",
            ));
        }
        open_wrapper(draft, ix)?;
        Ok(())
    })
}

fn target_wrapper(editor: &Editor, pos: Option<usize>) -> Result<usize, CommandError> {
    let pos = pos.unwrap_or_else(|| editor.selection().from());
    wrapper_index(editor.doc(), pos)
        .ok_or_else(|| CommandError::not_applicable(format!("no block at position {pos}")))
}

pub fn insert_block_wrapper_above(
    editor: &mut Editor,
    pos: Option<usize>,
) -> Result<(), CommandError> {
    let ix = target_wrapper(editor, pos)?;
    editor
        .transact(|draft| open_wrapper(draft, ix))
        .map_err(CommandError::from)
}

pub fn insert_block_wrapper_below(
    editor: &mut Editor,
    pos: Option<usize>,
) -> Result<(), CommandError> {
    let ix = target_wrapper(editor, pos)?;
    editor
        .transact(|draft| open_wrapper(draft, ix + 1))
        .map_err(CommandError::from)
}

/// Splits a multi-block wrapper so the block holding the selection start
/// gets a wrapper of its own. Siblings before and after keep the original
/// wrapper's attributes in wrappers of their own.
pub fn wrap_in_block_wrapper(editor: &mut Editor) -> Result<(), CommandError> {
    let selection = editor.selection();
    let (wrapper_ix, block_ix, wrapper) = {
        let rp = editor.doc().resolve(selection.from())?;
        let Some(depth) = rp.find_depth(|el| el.kind == NodeKind::BlockWrapper) else {
            return Err(CommandError::not_applicable("selection is not inside a block"));
        };
        (rp.index(0), rp.index(depth), rp.node(depth).clone())
    };
    if wrapper.children.len() < 2 {
        return Ok(());
    }

    let piece = |children: &[Node]| {
        Node::Element(ElementNode::new(
            NodeKind::BlockWrapper,
            wrapper.attrs.clone(),
            children.to_vec(),
        ))
    };
    let before = &wrapper.children[..block_ix];
    let after = &wrapper.children[block_ix + 1..];
    let block_wrapper_ix = wrapper_ix + usize::from(!before.is_empty());

    editor.transact(|draft| {
        let original = draft.doc().clone();
        draft.remove_node_at(vec![wrapper_ix])?;
        let mut ix = wrapper_ix;
        for group in [before, &wrapper.children[block_ix..=block_ix], after] {
            if group.is_empty() {
                continue;
            }
            draft.insert_node_at(vec![ix], piece(group))?;
            ix += 1;
        }
        let moves = vec![(vec![wrapper_ix, block_ix], vec![block_wrapper_ix, 0])];
        let carried = carry_selection(&original, draft.doc(), selection, &moves);
        draft.set_selection(carried);
        Ok(())
    })
}

pub fn set_block_wrapper_indentation(
    editor: &mut Editor,
    value: &str,
    pos: Option<usize>,
) -> Result<(), CommandError> {
    let indentation: Indentation = value.parse()?;
    let ix = target_wrapper(editor, pos)?;
    editor
        .transact(|draft| draft.set_attr_at(vec![ix], "indentation", indentation.to_value()))
        .map_err(CommandError::from)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Swaps the wrapper holding the selection with its neighbour. The featured
/// image never moves.
pub fn move_block_wrapper(editor: &mut Editor, direction: Direction) -> Result<(), CommandError> {
    let selection = editor.selection();
    let ix = target_wrapper(editor, None)?;
    let count = editor.doc().children().len();
    let target = match direction {
        Direction::Up if ix > 1 => ix - 1,
        Direction::Down if ix + 1 < count => ix + 1,
        _ => {
            return Err(CommandError::not_applicable(format!(
                "block cannot move {direction:?}"
            )));
        }
    };
    editor.transact(|draft| {
        let original = draft.doc().clone();
        let node = original.children()[ix].clone();
        draft.remove_node_at(vec![ix])?;
        draft.insert_node_at(vec![target], node)?;
        let moves = [(vec![ix], vec![target])];
        let carried = carry_selection(&original, draft.doc(), selection, &moves);
        draft.set_selection(carried);
        Ok(())
    })
}
