//! Inline marks: keyboard toggles, stored marks for the next input, the
//! backtick input rule, and links.

use serde::Deserialize;
use serde_json::json;

use crate::core::Editor;
use crate::draft::{Draft, marks_at};
use crate::error::{CommandError, QueryError, StepError};
use crate::events::KeyChord;
use crate::locate::nodes_between;
use crate::node::{Document, Mark, MarkType, Marks, Node, NodeKind, NodeRef};
use crate::plugin::{CommandSpec, EditorPlugin, KeyBinding, QuerySpec, TransactionTransform};
use crate::selection::Selection;

use super::{PRIORITY_NORMAL, parse_args};

/// Source tag of drafts produced by typed text.
pub(crate) const TEXT_INPUT_SOURCE: &str = "input.text";

pub(crate) struct MarksPlugin;

impl EditorPlugin for MarksPlugin {
    fn id(&self) -> &'static str {
        "marks"
    }

    fn keymap(&self) -> Vec<KeyBinding> {
        let toggles = [
            ("b", Mark::Bold),
            ("i", Mark::Italic),
            ("u", Mark::Underline),
            ("`", Mark::Code),
        ];
        let mut keymap: Vec<KeyBinding> = toggles
            .into_iter()
            .map(|(key, mark)| {
                KeyBinding::new(KeyChord::with_mod(key), PRIORITY_NORMAL, move |editor| {
                    toggle_mark(editor, mark.clone()).is_ok()
                })
            })
            .collect();
        keymap.push(KeyBinding::new(
            KeyChord::key("ArrowRight"),
            PRIORITY_NORMAL,
            leave_code,
        ));
        keymap
    }

    fn transaction_transforms(&self) -> Vec<Box<dyn TransactionTransform>> {
        vec![Box::new(BacktickCode)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        [
            ("marks.toggle_bold", "Bold", Mark::Bold),
            ("marks.toggle_italic", "Italic", Mark::Italic),
            ("marks.toggle_underline", "Underline", Mark::Underline),
            ("marks.toggle_code", "Inline code", Mark::Code),
        ]
        .into_iter()
        .map(|(id, label, mark)| {
            CommandSpec::new(id, label, move |editor, _args| {
                toggle_mark(editor, mark.clone())
            })
        })
        .collect()
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("marks.active", |editor, _args| {
            serde_json::to_value(active_marks(editor)).map_err(QueryError::from)
        })]
    }
}

/// Text leaves overlapping `from..to`, outside code blocks.
fn leaf_marks(doc: &Document, from: usize, to: usize) -> Vec<Marks> {
    let mut out = Vec::new();
    nodes_between(doc, from, to, |node, _, _| match node {
        NodeRef::Text(t) => {
            out.push(t.marks.clone());
            false
        }
        NodeRef::Element(el) => el.kind != NodeKind::CodeBlock,
    });
    out
}

/// Marks in effect at the selection: stored marks or the caret's marks
/// when collapsed, otherwise the marks shared by every selected leaf.
pub fn active_marks(editor: &Editor) -> Marks {
    let selection = editor.selection();
    if selection.is_empty() {
        return editor
            .stored_marks()
            .cloned()
            .unwrap_or_else(|| marks_at(editor.doc(), selection.head()));
    }
    let leaves = leaf_marks(editor.doc(), selection.from(), selection.to());
    let Some((first, rest)) = leaves.split_first() else {
        return Marks::default();
    };
    let mut shared = first.clone();
    for mark_type in [
        MarkType::Bold,
        MarkType::Italic,
        MarkType::Underline,
        MarkType::Code,
    ] {
        if rest.iter().any(|m| !m.has(mark_type)) {
            shared = shared.without(mark_type);
        }
    }
    if rest.iter().any(|m| m.link != shared.link) {
        shared.link = None;
    }
    shared
}

/// Adds `mark` to the selection unless every selected leaf already has it,
/// in which case it is removed. A collapsed selection toggles the stored
/// marks instead.
pub fn toggle_mark(editor: &mut Editor, mark: Mark) -> Result<(), CommandError> {
    let mark_type = mark.mark_type();
    let selection = editor.selection();
    if selection.is_node() {
        return Err(CommandError::not_applicable("marks need a text selection"));
    }
    if selection.is_empty() {
        let current = active_marks(editor);
        let next = if current.has(mark_type) {
            current.without(mark_type)
        } else {
            current.with(&mark)
        };
        return editor.transact(|draft| {
            draft.set_stored_marks(Some(next));
            Ok(())
        });
    }

    let leaves = leaf_marks(editor.doc(), selection.from(), selection.to());
    let everywhere = !leaves.is_empty() && leaves.iter().all(|m| m.has(mark_type));
    editor.transact(|draft| {
        draft.set_source("marks.toggle");
        let result = if everywhere {
            draft.remove_mark(selection.from(), selection.to(), mark_type)
        } else {
            draft.add_mark(selection.from(), selection.to(), &mark)
        };
        result.map_err(CommandError::from)
    })
}

/// ArrowRight with a collapsed cursor in code text stops the code mark from
/// continuing into what is typed next.
fn leave_code(editor: &mut Editor) -> bool {
    let selection = editor.selection();
    if !selection.is_empty() || selection.is_node() {
        return false;
    }
    let current = active_marks(editor);
    if !current.code {
        return false;
    }
    editor
        .transact(|draft| {
            draft.set_stored_marks(Some(current.without(MarkType::Code)));
            Ok::<_, StepError>(())
        })
        .is_ok()
}

/// Turns `` `text` `` into code-marked `text` when the closing backtick is
/// typed. The opening backtick must start the block or follow whitespace,
/// and the enclosed text must not start or end with whitespace.
struct BacktickCode;

impl BacktickCode {
    /// Content offsets of the opening and closing backticks.
    fn find(before: &[char]) -> Option<(usize, usize)> {
        let close = before.len().checked_sub(1)?;
        if before[close] != '`' {
            return None;
        }
        let open = before[..close].iter().rposition(|&c| c == '`')?;
        let inner = &before[open + 1..close];
        let (first, last) = (inner.first()?, inner.last()?);
        if first.is_whitespace() || last.is_whitespace() {
            return None;
        }
        if open > 0 && !before[open - 1].is_whitespace() {
            return None;
        }
        Some((open, close))
    }
}

impl TransactionTransform for BacktickCode {
    fn id(&self) -> &'static str {
        "marks.backtick_code"
    }

    fn transform(&self, _editor: &Editor, draft: &mut Draft) -> Result<(), StepError> {
        let selection = draft.selection();
        if draft.source() != Some(TEXT_INPUT_SOURCE) || !selection.is_empty() {
            return Ok(());
        }
        let caret = selection.head();
        let (start, open, close) = {
            let rp = draft.doc().resolve(caret)?;
            let block = rp.parent();
            if !block.is_textblock() || block.kind == NodeKind::CodeBlock {
                return Ok(());
            }
            let only_text = block.children.iter().all(|c| matches!(c, Node::Text(_)));
            if !only_text {
                return Ok(());
            }
            let before: Vec<char> = block
                .text_content()
                .chars()
                .take(rp.parent_offset())
                .collect();
            let Some((open, close)) = Self::find(&before) else {
                return Ok(());
            };
            (rp.start(rp.depth()), open, close)
        };

        draft.delete_range(start + close, start + close + 1)?;
        draft.add_mark(start + open + 1, start + close, &Mark::Code)?;
        draft.delete_range(start + open, start + open + 1)?;
        let marks = draft.marks_at(draft.selection().head());
        draft.set_stored_marks(Some(marks.without(MarkType::Code)));
        tracing::debug!(from = start + open, to = start + close - 1, "backtick code");
        Ok(())
    }
}

pub(crate) struct LinkPlugin;

impl EditorPlugin for LinkPlugin {
    fn id(&self) -> &'static str {
        "link"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("link.set", "Link", |editor, args| {
                #[derive(Deserialize)]
                struct Args {
                    href: String,
                }
                let Args { href } = parse_args(args)?;
                set_link(editor, &href)
            })
            .keywords(["url", "href"])
            .args_example(json!({ "href": "https://example.com" })),
            CommandSpec::new("link.set_with_text", "Insert link", |editor, args| {
                #[derive(Deserialize)]
                struct Args {
                    href: String,
                    #[serde(default)]
                    text: String,
                }
                let Args { href, text } = parse_args(args)?;
                set_link_with_text(editor, &href, &text)
            })
            .args_example(json!({ "href": "https://example.com", "text": "example" })),
            CommandSpec::new("link.unset", "Remove link", |editor, _args| unset_link(editor)),
        ]
    }
}

fn checked_href(href: &str) -> Result<Mark, CommandError> {
    let href = href.trim();
    if href.is_empty() {
        return Err(CommandError::invalid("link href must not be empty"));
    }
    Ok(Mark::Link(href.to_string()))
}

pub fn set_link(editor: &mut Editor, href: &str) -> Result<(), CommandError> {
    let mark = checked_href(href)?;
    let selection = editor.selection();
    if selection.is_empty() || selection.is_node() {
        return Err(CommandError::not_applicable("select the text to link"));
    }
    editor.transact(|draft| {
        draft.set_source("link.set");
        draft
            .add_mark(selection.from(), selection.to(), &mark)
            .map_err(CommandError::from)
    })
}

/// Links the selected text, or inserts `text` as a link at a collapsed
/// cursor.
pub fn set_link_with_text(editor: &mut Editor, href: &str, text: &str) -> Result<(), CommandError> {
    let mark = checked_href(href)?;
    let selection = editor.selection();
    if !selection.is_empty() {
        return set_link(editor, href);
    }
    if text.is_empty() {
        return Err(CommandError::not_applicable("no text selected or given"));
    }
    editor.transact(|draft| {
        draft.set_source("link.insert");
        let end = draft.insert_marked_text(selection.head(), text, Marks::default().with(&mark))?;
        draft.set_selection(Selection::caret(end));
        Ok(())
    })
}

/// Span of the link run around `pos`: adjacent leaves sharing the href.
fn link_span(doc: &Document, pos: usize) -> Option<(usize, usize)> {
    let rp = doc.resolve(pos).ok()?;
    let block = rp.parent();
    if !block.is_textblock() {
        return None;
    }
    let offset = rp.parent_offset();
    let start = rp.start(rp.depth());

    let mut runs: Vec<(usize, usize, &str)> = Vec::new();
    let mut at = 0;
    for child in &block.children {
        let size = child.node_size();
        if let Some(href) = child.as_text().and_then(|t| t.marks.link.as_deref()) {
            match runs.last_mut() {
                Some((_, to, current)) if *to == at && *current == href => *to += size,
                _ => runs.push((at, at + size, href)),
            }
        }
        at += size;
    }
    runs.into_iter()
        .find(|&(from, to, _)| from <= offset && offset <= to)
        .map(|(from, to, _)| (start + from, start + to))
}

pub fn unset_link(editor: &mut Editor) -> Result<(), CommandError> {
    let selection = editor.selection();
    let (from, to) = if selection.is_empty() {
        match link_span(editor.doc(), selection.head()) {
            Some(span) => span,
            None => return Ok(()),
        }
    } else {
        (selection.from(), selection.to())
    };
    editor.transact(|draft| {
        draft.set_source("link.unset");
        draft
            .remove_mark(from, to, MarkType::Link)
            .map_err(CommandError::from)
    })
}
