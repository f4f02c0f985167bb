//! Fallback editing: history keys, line selection and the base keymap that
//! runs when no structural handler claimed the input.

use std::ops::RangeInclusive;

use crate::core::Editor;
use crate::error::StepError;
use crate::events::{InputEvent, KeyChord};
use crate::locate::{nodes_between, textblock_ranges};
use crate::node::{NodeKind, NodeRef};
use crate::plugin::{EditorPlugin, EventBinding, KeyBinding};
use crate::selection::{Selection, near_text};

use super::marks::TEXT_INPUT_SOURCE;
use super::{PRIORITY_BASE, PRIORITY_NORMAL};

pub(crate) struct HistoryPlugin;

impl EditorPlugin for HistoryPlugin {
    fn id(&self) -> &'static str {
        "history"
    }

    fn keymap(&self) -> Vec<KeyBinding> {
        vec![
            KeyBinding::new(KeyChord::with_mod("z"), PRIORITY_NORMAL, Editor::undo),
            KeyBinding::new(KeyChord::with_mod("z").shift(), PRIORITY_NORMAL, Editor::redo),
            KeyBinding::new(KeyChord::with_mod("y"), PRIORITY_NORMAL, Editor::redo),
        ]
    }
}

pub(crate) struct LineSelectionPlugin;

impl EditorPlugin for LineSelectionPlugin {
    fn id(&self) -> &'static str {
        "line_selection"
    }

    fn keymap(&self) -> Vec<KeyBinding> {
        vec![KeyBinding::new(
            KeyChord::with_mod("a"),
            PRIORITY_NORMAL,
            select_line,
        )]
    }
}

/// Selects the content of the textblock holding the head. Declines when
/// that content is already selected.
fn select_line(editor: &mut Editor) -> bool {
    let selection = editor.selection();
    let Some(range) = block_range_at(editor, selection.head()) else {
        return false;
    };
    let line = Selection::text(*range.start(), *range.end());
    if selection == line {
        return false;
    }
    editor.set_selection(line);
    true
}

fn block_range_at(editor: &Editor, pos: usize) -> Option<RangeInclusive<usize>> {
    textblock_ranges(editor.doc())
        .into_iter()
        .find(|r| r.contains(&pos))
}

pub(crate) struct BaseKeymapPlugin;

impl EditorPlugin for BaseKeymapPlugin {
    fn id(&self) -> &'static str {
        "base_keymap"
    }

    fn keymap(&self) -> Vec<KeyBinding> {
        vec![
            KeyBinding::new(KeyChord::key("Enter"), PRIORITY_BASE, split_block),
            KeyBinding::new(KeyChord::key("Backspace"), PRIORITY_BASE, delete_backward),
            KeyBinding::new(KeyChord::key("ArrowLeft"), PRIORITY_BASE, |editor| {
                move_caret(editor, false)
            }),
            KeyBinding::new(KeyChord::key("ArrowRight"), PRIORITY_BASE, |editor| {
                move_caret(editor, true)
            }),
        ]
    }

    fn event_handlers(&self) -> Vec<EventBinding> {
        vec![EventBinding::new("base.input", PRIORITY_BASE, handle_event)]
    }
}

fn in_code_block(editor: &Editor, pos: usize) -> bool {
    editor
        .doc()
        .resolve(pos)
        .is_ok_and(|rp| rp.parent().kind == NodeKind::CodeBlock)
}

fn split_block(editor: &mut Editor) -> bool {
    let in_code = in_code_block(editor, editor.selection().from());
    let result = editor.transact(|draft| {
        draft.set_source("key.enter");
        draft.delete_selection()?;
        let head = draft.selection().head();
        let caret = if in_code {
            draft.insert_text(head, "\n")?
        } else {
            draft.split_at(head)?
        };
        draft.set_selection(Selection::caret(caret));
        Ok::<_, StepError>(())
    });
    result.is_ok()
}

fn delete_backward(editor: &mut Editor) -> bool {
    let selection = editor.selection();
    if !selection.is_empty() {
        return editor
            .transact(|draft| {
                draft.set_source("key.backspace");
                draft.delete_selection().map(|_| ())
            })
            .is_ok();
    }

    let head = selection.head();
    let Ok(rp) = editor.doc().resolve(head) else {
        return false;
    };
    if !rp.parent().is_textblock() {
        return false;
    }
    if rp.parent_offset() > 0 {
        let prev = head - 1;
        return editor
            .transact(|draft| {
                draft.set_source("key.backspace");
                draft.delete_range(prev, head)?;
                draft.set_selection(Selection::caret(prev));
                Ok::<_, StepError>(())
            })
            .is_ok();
    }

    // Start of a textblock: join onto the previous one, or select an image
    // standing in between.
    let Some(prev_end) = textblock_ranges(editor.doc())
        .into_iter()
        .rev()
        .map(|r| *r.end())
        .find(|&end| end < head)
    else {
        return false;
    };
    let mut image = None;
    nodes_between(editor.doc(), prev_end, head, |node, pos, _| {
        if let NodeRef::Element(el) = node {
            if el.kind.is_leaf() && pos >= prev_end {
                image = Some(pos);
            }
        }
        true
    });
    if let Some(pos) = image {
        let Some(selection) = Selection::node(editor.doc(), pos) else {
            return false;
        };
        editor.set_selection(selection);
        return true;
    }
    editor
        .transact(|draft| {
            draft.set_source("key.backspace");
            draft.delete_range(prev_end, head)?;
            draft.set_selection(Selection::caret(prev_end));
            Ok::<_, StepError>(())
        })
        .is_ok()
}

/// Steps the caret one valid text position, crossing into the neighbouring
/// textblock at a boundary. A range collapses onto its edge instead.
fn move_caret(editor: &mut Editor, forward: bool) -> bool {
    let selection = editor.selection();
    if !selection.is_empty() {
        let edge = if forward { selection.to() } else { selection.from() };
        editor.set_selection(Selection::caret(near_text(editor.doc(), edge)));
        return true;
    }
    let head = selection.head();
    let ranges = textblock_ranges(editor.doc());
    let Some(current) = ranges.iter().position(|r| r.contains(&head)) else {
        return false;
    };
    let range = &ranges[current];
    let next = if forward {
        if head < *range.end() {
            Some(head + 1)
        } else {
            ranges.get(current + 1).map(|r| *r.start())
        }
    } else if head > *range.start() {
        Some(head - 1)
    } else {
        current
            .checked_sub(1)
            .and_then(|ix| ranges.get(ix))
            .map(|r| *r.end())
    };
    match next {
        Some(pos) => {
            editor.set_selection(Selection::caret(pos));
            true
        }
        None => false,
    }
}

fn handle_event(editor: &mut Editor, event: &InputEvent) -> bool {
    match event {
        InputEvent::TextInput { text } => insert_typed(editor, text),
        InputEvent::Paste {
            text: Some(text), ..
        } => paste_text(editor, text),
        InputEvent::Click { pos } => {
            let pos = (*pos).min(editor.doc().content_size());
            editor.set_selection(Selection::caret(near_text(editor.doc(), pos)));
            true
        }
        _ => false,
    }
}

/// Replaces the selection with `text`, carrying the stored marks or the
/// marks at the cursor.
fn insert_typed(editor: &mut Editor, text: &str) -> bool {
    let result = editor.transact(|draft| {
        draft.set_source(TEXT_INPUT_SOURCE);
        draft.delete_selection()?;
        let pos = near_text(draft.doc(), draft.selection().head());
        let marks = draft
            .stored_marks()
            .cloned()
            .unwrap_or_else(|| draft.marks_at(pos));
        let end = draft.insert_marked_text(pos, text, marks)?;
        draft.set_selection(Selection::caret(end));
        Ok::<_, StepError>(())
    });
    if let Err(err) = &result {
        tracing::debug!(%err, "text input dropped");
    }
    result.is_ok()
}

/// Pastes plain text one line per textblock; code blocks take it verbatim.
fn paste_text(editor: &mut Editor, text: &str) -> bool {
    let in_code = in_code_block(editor, editor.selection().from());
    editor
        .transact(|draft| {
            draft.set_source("input.paste");
            draft.delete_selection()?;
            let mut pos = near_text(draft.doc(), draft.selection().head());
            if in_code {
                pos = draft.insert_text(pos, text)?;
            } else {
                for (ix, line) in text.lines().enumerate() {
                    if ix > 0 {
                        pos = draft.split_at(pos)?;
                    }
                    pos = draft.insert_text(pos, line)?;
                }
            }
            draft.set_selection(Selection::caret(pos));
            Ok::<_, StepError>(())
        })
        .is_ok()
}
