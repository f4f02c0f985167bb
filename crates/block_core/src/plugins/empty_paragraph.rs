//! Empty paragraphs inside wrappers: Backspace removal and deferred cleanup.

use crate::core::Editor;
use crate::draft::Draft;
use crate::error::StepError;
use crate::events::KeyChord;
use crate::locate::textblock_ranges;
use crate::node::{Document, Node, NodeKind};
use crate::plugin::{EditorPlugin, KeyBinding, Reconciler};
use crate::selection::{Selection, near_text};

use super::PRIORITY_HIGH;

pub(crate) struct EmptyParagraphPlugin;

impl EditorPlugin for EmptyParagraphPlugin {
    fn id(&self) -> &'static str {
        "empty_paragraph"
    }

    fn keymap(&self) -> Vec<KeyBinding> {
        vec![KeyBinding::new(
            KeyChord::key("Backspace"),
            PRIORITY_HIGH,
            handle_backspace,
        )]
    }

    fn reconcilers(&self) -> Vec<Box<dyn Reconciler>> {
        vec![Box::new(RemoveEmptyParagraphs)]
    }
}

fn is_blank(node: &Node) -> bool {
    node.kind() == NodeKind::Paragraph && node.text_content().trim().is_empty()
}

/// End of the last textblock ending at or before `pos`.
fn caret_before(doc: &Document, pos: usize) -> usize {
    textblock_ranges(doc)
        .into_iter()
        .rev()
        .find(|r| *r.end() <= pos)
        .map(|r| *r.end())
        .unwrap_or_else(|| near_text(doc, pos))
}

/// Backspace at the start of an empty paragraph directly inside a wrapper.
/// A sole paragraph takes its wrapper with it; the last wrapper of the
/// document is reset instead.
fn handle_backspace(editor: &mut Editor) -> bool {
    let selection = editor.selection();
    if !selection.is_empty() || selection.is_node() {
        return false;
    }
    let target = {
        let doc = editor.doc();
        let Ok(rp) = doc.resolve(selection.head()) else {
            return false;
        };
        let parent = rp.parent();
        if parent.kind != NodeKind::Paragraph
            || rp.parent_offset() != 0
            || !parent.text_content().trim().is_empty()
            || rp.depth() != 2
            || rp.node(1).kind != NodeKind::BlockWrapper
        {
            return false;
        }
        let sole = rp.node(1).children.len() == 1;
        let last = doc.wrapper_count() == 1;
        (rp.index(0), rp.index(1), sole, last)
    };

    let result = editor.transact(|draft| {
        draft.set_source("key.backspace");
        remove_empty_paragraph(draft, target)
    });
    match result {
        Ok(()) => true,
        Err(err) => {
            tracing::debug!(%err, "backspace aborted");
            false
        }
    }
}

fn remove_empty_paragraph(
    draft: &mut Draft,
    (wrapper_ix, para_ix, sole, last): (usize, usize, bool, bool),
) -> Result<(), StepError> {
    let start = draft
        .doc()
        .pos_before_path(&[wrapper_ix])
        .ok_or_else(|| StepError::invalid_path(&[wrapper_ix], "wrapper vanished"))?;
    let caret = match (sole, last) {
        (true, true) => {
            draft.replace_node_at(vec![wrapper_ix], Node::empty_block_wrapper())?;
            start + 2
        }
        (true, false) => {
            draft.remove_node_at(vec![wrapper_ix])?;
            caret_before(draft.doc(), start)
        }
        (false, _) => {
            let pos = draft
                .doc()
                .pos_before_path(&[wrapper_ix, para_ix])
                .unwrap_or(start);
            draft.remove_node_at(vec![wrapper_ix, para_ix])?;
            caret_before(draft.doc(), pos)
        }
    };
    draft.set_selection(Selection::caret(caret));
    Ok(())
}

/// Drops blank paragraphs from wrappers holding more than one block,
/// except the one under the cursor. A wrapper never loses all of its
/// children this way.
struct RemoveEmptyParagraphs;

impl Reconciler for RemoveEmptyParagraphs {
    fn id(&self) -> &'static str {
        "empty_paragraph.cleanup"
    }

    fn reconcile(&self, editor: &Editor) -> Result<Option<Draft>, StepError> {
        let doc = editor.doc();
        let cursor = editor.selection().from();
        let mut doomed = Vec::new();
        let mut pos = 0;
        for (wrapper_ix, node) in doc.children().iter().enumerate() {
            let size = node.node_size();
            if let Some(wrapper) = node
                .as_element()
                .filter(|el| el.kind == NodeKind::BlockWrapper && el.children.len() > 1)
            {
                let mut child_pos = pos + 1;
                let mut found = Vec::new();
                for (ix, child) in wrapper.children.iter().enumerate() {
                    let end = child_pos + child.node_size();
                    if is_blank(child) && !(child_pos..=end).contains(&cursor) {
                        found.push(vec![wrapper_ix, ix]);
                    }
                    child_pos = end;
                }
                if found.len() == wrapper.children.len() {
                    found.remove(0);
                }
                doomed.extend(found);
            }
            pos += size;
        }

        if doomed.is_empty() {
            return Ok(None);
        }
        let mut draft = editor.draft();
        draft.set_source("reconcile.empty_paragraph");
        for path in doomed.into_iter().rev() {
            draft.remove_node_at(path)?;
        }
        Ok(Some(draft))
    }
}
