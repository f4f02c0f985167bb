//! Block images: selection on click, caption and alignment edits, upload
//! requests for dropped or pasted files, and keeping each image's
//! indentation in step with its container.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::core::Editor;
use crate::draft::Draft;
use crate::error::{CommandError, StepError};
use crate::events::{EditorEvent, FileInfo, InputEvent};
use crate::locate::{find_nodes, is_kind, nodes_between};
use crate::node::{Attrs, Document, ElementNode, Indentation, Node, NodeKind, NodeRef, Path};
use crate::plugin::{CommandSpec, EditorPlugin, EventBinding, Reconciler};
use crate::selection::Selection;

use super::{PRIORITY_NORMAL, parse_args, set_indentation, wrapper_index};

pub(crate) struct ImagePlugin;

impl EditorPlugin for ImagePlugin {
    fn id(&self) -> &'static str {
        "image"
    }

    fn event_handlers(&self) -> Vec<EventBinding> {
        vec![EventBinding::new("image.input", PRIORITY_NORMAL, handle_event)]
    }

    fn reconcilers(&self) -> Vec<Box<dyn Reconciler>> {
        vec![Box::new(SyncImageIndentation)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("image.set_alignment", "Align image", |editor, args| {
                #[derive(Deserialize)]
                struct Args {
                    alignment: String,
                }
                let Args { alignment } = parse_args(args)?;
                set_image_alignment(editor, &alignment)
            })
            .args_example(json!({ "alignment": "center" })),
            CommandSpec::new("image.set_caption", "Set image caption", |editor, args| {
                #[derive(Deserialize)]
                struct Args {
                    caption: String,
                }
                let Args { caption } = parse_args(args)?;
                set_image_caption(editor, &caption)
            })
            .args_example(json!({ "caption": "A quiet harbour" })),
            CommandSpec::new("image.insert", "Insert image", |editor, args| {
                let args: InsertImage = parse_args(args)?;
                insert_image(editor, args)
            })
            .description("Insert an image in a new block below the current one.")
            .keywords(["picture", "photo", "upload"])
            .args_example(json!({ "src": "https://example.com/a.png", "alt": "" })),
            CommandSpec::new("image.set_indentation", "Align image", |editor, args| {
                #[derive(Deserialize)]
                struct Args {
                    indentation: String,
                }
                let Args { indentation } = parse_args(args)?;
                set_image_indentation(editor, &indentation)
            })
            .hidden(true),
        ]
    }
}

fn handle_event(editor: &mut Editor, event: &InputEvent) -> bool {
    match event {
        InputEvent::Click { pos } => select_image(editor, *pos),
        InputEvent::CaptionInput { pos, caption } => update_caption(editor, *pos, caption),
        InputEvent::Drop { files, .. } | InputEvent::Paste { files, .. } => {
            request_upload(editor, files)
        }
        InputEvent::TextInput { .. } => false,
    }
}

fn image_at(doc: &Document, pos: usize) -> Option<&ElementNode> {
    doc.node_at(pos)
        .and_then(|node| node.as_element())
        .filter(|el| el.kind == NodeKind::Image)
}

fn select_image(editor: &mut Editor, pos: usize) -> bool {
    if image_at(editor.doc(), pos).is_none() {
        return false;
    }
    let Some(selection) = Selection::node(editor.doc(), pos) else {
        return false;
    };
    editor.set_selection(selection);
    true
}

fn update_caption(editor: &mut Editor, pos: usize, caption: &str) -> bool {
    if image_at(editor.doc(), pos).is_none() {
        return false;
    }
    let result = editor.transact(|draft| {
        draft.set_source("image.caption_input");
        draft.update_attrs(pos, attrs([("caption", Value::from(caption))]))
    });
    match result {
        Ok(()) => true,
        Err(err) => {
            tracing::debug!(%err, "caption input dropped");
            false
        }
    }
}

/// Only the first image file is forwarded; non-image drops are left alone.
fn request_upload(editor: &mut Editor, files: &[FileInfo]) -> bool {
    let Some(file) = files.iter().find(|f| f.is_image()) else {
        return false;
    };
    editor.emit(EditorEvent::ImageUploadRequested { file: file.clone() });
    true
}

fn attrs<const N: usize>(pairs: [(&str, Value); N]) -> Attrs {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Path of the node-selected image, or `InvalidOperand`.
fn selected_image(editor: &Editor) -> Result<Path, CommandError> {
    let selection = editor.selection();
    let doc = editor.doc();
    match selection.selected_node(doc) {
        Some(el) if el.kind == NodeKind::Image => Ok(doc.resolve(selection.from())?.child_path()),
        _ => Err(CommandError::invalid("an image must be node-selected")),
    }
}

/// Sets `indentation` on the image at `path` and on its wrapper.
fn align_with_wrapper(
    draft: &mut Draft,
    path: Path,
    indentation: Indentation,
) -> Result<(), StepError> {
    let wrapper = path.first().map(|&ix| vec![ix]);
    draft.set_attr_at(path, "indentation", indentation.to_value())?;
    if let Some(wrapper) = wrapper {
        let is_wrapper = draft
            .doc()
            .element_at_path(&wrapper)
            .is_some_and(|el| el.kind == NodeKind::BlockWrapper);
        if is_wrapper {
            draft.set_attr_at(wrapper, "indentation", indentation.to_value())?;
        }
    }
    Ok(())
}

pub fn set_image_alignment(editor: &mut Editor, alignment: &str) -> Result<(), CommandError> {
    let path = selected_image(editor)?;
    let indentation: Indentation = alignment.parse()?;
    editor.transact(|draft| {
        align_with_wrapper(draft, path, indentation).map_err(CommandError::from)
    })
}

pub fn set_image_caption(editor: &mut Editor, caption: &str) -> Result<(), CommandError> {
    let path = selected_image(editor)?;
    editor.transact(|draft| {
        draft
            .set_attr_at(path, "caption", Value::from(caption))
            .map_err(CommandError::from)
    })
}

/// Node-selected image first, then the first image in the selection,
/// otherwise plain block indentation.
pub fn set_image_indentation(editor: &mut Editor, value: &str) -> Result<(), CommandError> {
    let indentation: Indentation = value.parse()?;
    let path = match selected_image(editor) {
        Ok(path) => Some(path),
        Err(_) => {
            let selection = editor.selection();
            let mut first = None;
            nodes_between(editor.doc(), selection.from(), selection.to(), |node, _, path| {
                if first.is_none() && node.kind() == NodeKind::Image {
                    first = Some(path.to_vec());
                }
                first.is_none()
            });
            first
        }
    };
    match path {
        Some(path) => editor.transact(|draft| {
            align_with_wrapper(draft, path, indentation).map_err(CommandError::from)
        }),
        None => set_indentation(editor, value),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsertImage {
    pub src: String,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Adds the image in a new wrapper after the one holding the selection and
/// node-selects it.
pub fn insert_image(editor: &mut Editor, image: InsertImage) -> Result<(), CommandError> {
    if image.src.trim().is_empty() {
        return Err(CommandError::invalid("image src must not be empty"));
    }
    let ix = wrapper_index(editor.doc(), editor.selection().from())
        .map(|ix| ix + 1)
        .unwrap_or(editor.doc().children().len());

    let mut node_attrs = attrs([("src", Value::from(image.src))]);
    if let Some(alt) = image.alt {
        node_attrs.insert("alt".to_string(), Value::from(alt));
    }
    if let Some(title) = image.title {
        node_attrs.insert("title".to_string(), Value::from(title));
    }
    let node = Node::block_wrapper(vec![Node::element(NodeKind::Image, node_attrs, Vec::new())]);

    editor.transact(|draft| {
        draft.set_source("image.insert");
        draft.insert_node_at(vec![ix], node)?;
        let pos = draft
            .doc()
            .pos_before_path(&[ix, 0])
            .ok_or_else(|| StepError::invalid_path(&[ix, 0], "image vanished"))?;
        if let Some(selection) = Selection::node(draft.doc(), pos) {
            draft.set_selection(selection);
        }
        Ok(())
    })
}

/// Effective indentation of the nearest ancestor carrying one.
fn inherited_indentation(doc: &Document, path: &[usize]) -> Indentation {
    (1..path.len())
        .rev()
        .filter_map(|len| doc.element_at_path(&path[..len]))
        .find_map(ElementNode::indentation)
        .unwrap_or_default()
}

struct SyncImageIndentation;

impl Reconciler for SyncImageIndentation {
    fn id(&self) -> &'static str {
        "image.sync_indentation"
    }

    fn reconcile(&self, editor: &Editor) -> Result<Option<Draft>, StepError> {
        let doc = editor.doc();
        let stale: Vec<(Path, Indentation)> = find_nodes(doc, is_kind(NodeKind::Image), None)
            .into_iter()
            .filter_map(|found| {
                let NodeRef::Element(image) = found.node else {
                    return None;
                };
                let inherited = inherited_indentation(doc, &found.path);
                (image.indentation() != Some(inherited)).then_some((found.path, inherited))
            })
            .collect();
        if stale.is_empty() {
            return Ok(None);
        }
        let mut draft = editor.draft();
        draft.set_source("reconcile.image_indentation");
        for (path, indentation) in stale {
            draft.set_attr_at(path, "indentation", indentation.to_value())?;
        }
        Ok(Some(draft))
    }
}
