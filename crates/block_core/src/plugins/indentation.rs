use serde::Deserialize;
use serde_json::json;

use crate::core::Editor;
use crate::error::CommandError;
use crate::events::KeyChord;
use crate::locate::nodes_between;
use crate::node::{Indentation, NodeKind, NodeRef, Path};
use crate::plugin::{CommandSpec, EditorPlugin, KeyBinding};

use super::{PRIORITY_NORMAL, parse_args};

pub(crate) struct IndentationPlugin;

impl EditorPlugin for IndentationPlugin {
    fn id(&self) -> &'static str {
        "indentation"
    }

    fn keymap(&self) -> Vec<KeyBinding> {
        [
            ("l", Indentation::Left),
            ("e", Indentation::Center),
            ("r", Indentation::Right),
        ]
        .into_iter()
        .map(|(key, indentation)| {
            KeyBinding::new(KeyChord::with_mod(key).shift(), PRIORITY_NORMAL, move |editor| {
                set_indentation(editor, indentation.as_str()).is_ok()
            })
        })
        .collect()
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("indentation.set", "Set alignment", |editor, args| {
                #[derive(Deserialize)]
                struct Args {
                    indentation: String,
                }
                let Args { indentation } = parse_args(args)?;
                set_indentation(editor, &indentation)
            })
            .description("Align the current block left, center or right.")
            .keywords(["align", "indent"])
            .args_example(json!({ "indentation": "center" })),
        ]
    }
}

/// Picks the kind whose nodes receive the indentation: an enclosing wrapper
/// first, then the nearest configured ancestor of the anchor, then
/// `paragraph`, then the first configured kind.
fn target_kind(editor: &Editor) -> Result<NodeKind, CommandError> {
    let kinds = &editor.config().indentable_kinds;
    let rp = editor.doc().resolve(editor.selection().anchor())?;
    if rp.find_depth(|el| el.kind == NodeKind::BlockWrapper).is_some() {
        return Ok(NodeKind::BlockWrapper);
    }
    if let Some(depth) = rp.find_depth(|el| kinds.contains(&el.kind)) {
        return Ok(rp.node(depth).kind);
    }
    if kinds.contains(&NodeKind::Paragraph) {
        return Ok(NodeKind::Paragraph);
    }
    kinds
        .first()
        .copied()
        .ok_or_else(|| CommandError::not_applicable("no indentable node kinds configured"))
}

/// Sets `indentation` on every node of the target kind overlapping the
/// selection. Unknown values are rejected before anything changes.
pub fn set_indentation(editor: &mut Editor, value: &str) -> Result<(), CommandError> {
    let indentation: Indentation = value.parse()?;
    let kind = target_kind(editor)?;
    let selection = editor.selection();

    let mut paths: Vec<Path> = Vec::new();
    nodes_between(editor.doc(), selection.from(), selection.to(), |node, _, path| {
        if let NodeRef::Element(el) = node {
            if el.kind == kind {
                paths.push(path.to_vec());
            }
        }
        !node.kind().is_textblock()
    });
    tracing::debug!(%kind, %indentation, nodes = paths.len(), "set indentation");

    editor.transact(|draft| {
        for path in paths {
            draft.set_attr_at(path, "indentation", indentation.to_value())?;
        }
        Ok(())
    })
}
