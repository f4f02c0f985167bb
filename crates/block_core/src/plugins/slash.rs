//! The `/` palette: detects a query typed at the start of a textblock,
//! filters the block actions it offers, and runs the chosen one in place of
//! the query text.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::Editor;
use crate::error::{CommandError, QueryError};
use crate::events::EditorEvent;
use crate::node::{Document, NodeKind};
use crate::plugin::{CommandSpec, EditorPlugin, QuerySpec};
use crate::selection::Selection;

use super::blocks::{
    level_attrs, set_block_type, toggle_blockquote, toggle_code_block, toggle_list,
};
use super::parse_args;

const TRIGGER: char = '/';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlashAction {
    Image,
    Heading1,
    Heading2,
    Heading3,
    BulletList,
    NumberedList,
    CodeBlock,
    Blockquote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashItem {
    pub title: String,
    pub description: String,
    pub icon: String,
    pub action: SlashAction,
}

const ITEMS: [(&str, &str, &str, SlashAction); 8] = [
    ("Image", "Upload an image", "🖼️", SlashAction::Image),
    ("Heading 1", "Large heading", "H1", SlashAction::Heading1),
    ("Heading 2", "Medium heading", "H2", SlashAction::Heading2),
    ("Heading 3", "Small heading", "H3", SlashAction::Heading3),
    ("Bullet List", "Create a bullet list", "•", SlashAction::BulletList),
    ("Numbered List", "Create a numbered list", "1.", SlashAction::NumberedList),
    ("Code Block", "Add a code block", "</>", SlashAction::CodeBlock),
    ("Blockquote", "Add a quote", "❝", SlashAction::Blockquote),
];

/// Items whose title or description contains `query`, ignoring case. An
/// empty query lists everything.
pub fn slash_items(query: &str) -> Vec<SlashItem> {
    let needle = query.to_lowercase();
    ITEMS
        .iter()
        .filter(|(title, description, _, _)| {
            needle.is_empty()
                || title.to_lowercase().contains(&needle)
                || description.to_lowercase().contains(&needle)
        })
        .map(|&(title, description, icon, action)| SlashItem {
            title: title.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
            action,
        })
        .collect()
}

/// An open palette: `from..to` covers the trigger and the query after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashState {
    pub from: usize,
    pub to: usize,
    pub query: String,
}

/// The palette is open while a collapsed cursor sits in a textblock whose
/// text up to the cursor starts with `/`. The query may contain spaces.
pub fn slash_state(doc: &Document, selection: Selection) -> Option<SlashState> {
    if !selection.is_empty() || selection.is_node() {
        return None;
    }
    let rp = doc.resolve(selection.head()).ok()?;
    let block = rp.parent();
    if !block.is_textblock() || block.kind == NodeKind::CodeBlock {
        return None;
    }
    let typed: String = block
        .text_content()
        .chars()
        .take(rp.parent_offset())
        .collect();
    let query = typed.strip_prefix(TRIGGER)?;
    Some(SlashState {
        from: rp.start(rp.depth()),
        to: selection.head(),
        query: query.to_string(),
    })
}

pub(crate) struct SlashCommandPlugin;

impl EditorPlugin for SlashCommandPlugin {
    fn id(&self) -> &'static str {
        "slash"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("slash.execute", "Run slash item", |editor, args| {
                #[derive(Deserialize)]
                struct Args {
                    action: SlashAction,
                }
                let Args { action } = parse_args(args)?;
                execute(editor, action)
            })
            .args_example(json!({ "action": "heading2" }))
            .hidden(true),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("slash.state", |editor, _args| {
                let state = slash_state(editor.doc(), editor.selection());
                serde_json::to_value(state).map_err(QueryError::from)
            }),
            QuerySpec::new("slash.items", |editor, args| {
                #[derive(Deserialize)]
                struct Args {
                    query: Option<String>,
                }
                let query = match args {
                    Some(args) => serde_json::from_value::<Args>(args)
                        .map_err(|err| QueryError::InvalidArgs(err.to_string()))?
                        .query,
                    None => None,
                };
                let query = query
                    .or_else(|| slash_state(editor.doc(), editor.selection()).map(|s| s.query))
                    .unwrap_or_default();
                serde_json::to_value(slash_items(&query)).map_err(QueryError::from)
            }),
        ]
    }
}

/// Removes the typed query and applies `action` to the block it was in.
fn execute(editor: &mut Editor, action: SlashAction) -> Result<(), CommandError> {
    let Some(state) = slash_state(editor.doc(), editor.selection()) else {
        return Err(CommandError::not_applicable("no slash query at the cursor"));
    };
    tracing::debug!(?action, query = %state.query, "slash execute");
    editor.transact(|draft| {
        draft.set_source("slash.execute");
        draft.delete_range(state.from, state.to)?;
        draft.set_selection(Selection::caret(state.from));
        let result = match action {
            SlashAction::Image => Ok(()),
            SlashAction::Heading1 => set_block_type(draft, NodeKind::Heading, level_attrs(1)),
            SlashAction::Heading2 => set_block_type(draft, NodeKind::Heading, level_attrs(2)),
            SlashAction::Heading3 => set_block_type(draft, NodeKind::Heading, level_attrs(3)),
            SlashAction::BulletList => toggle_list(draft, NodeKind::BulletList),
            SlashAction::NumberedList => toggle_list(draft, NodeKind::OrderedList),
            SlashAction::CodeBlock => toggle_code_block(draft),
            SlashAction::Blockquote => toggle_blockquote(draft),
        };
        result.map_err(CommandError::from)
    })?;
    if action == SlashAction::Image {
        editor.emit(EditorEvent::ImageDialogRequested);
    }
    Ok(())
}
