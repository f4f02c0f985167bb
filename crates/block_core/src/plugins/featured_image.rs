use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::Editor;
use crate::error::{CommandError, QueryError};
use crate::events::{EditorEvent, InputEvent};
use crate::node::{Attrs, NodeKind};
use crate::plugin::{CommandSpec, EditorPlugin, EventBinding, QuerySpec};

use super::{PRIORITY_NORMAL, parse_args};

pub(crate) struct FeaturedImagePlugin;

/// Attributes of the leading featured image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedImage {
    #[serde(default)]
    pub media_id: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl EditorPlugin for FeaturedImagePlugin {
    fn id(&self) -> &'static str {
        "featured_image"
    }

    fn event_handlers(&self) -> Vec<EventBinding> {
        vec![EventBinding::new(
            "featured_image.click",
            PRIORITY_NORMAL,
            |editor, event| match event {
                InputEvent::Click { pos: 0 } => {
                    editor.emit(EditorEvent::FeaturedImageRequested);
                    true
                }
                _ => false,
            },
        )]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("featured_image.set", "Set featured image", |editor, args| {
                let image: FeaturedImage = parse_args(args)?;
                set_featured_image(editor, image)
            })
            .args_example(json!({ "mediaId": "42", "imageUrl": "https://example.com/cover.jpg" })),
            CommandSpec::new(
                "featured_image.remove",
                "Remove featured image",
                |editor, _args| set_featured_image(editor, FeaturedImage::default()),
            ),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("featured_image.get", |editor, _args| {
            let attrs = editor
                .doc()
                .children()
                .first()
                .and_then(|node| node.as_element())
                .filter(|el| el.kind == NodeKind::FeaturedImage)
                .map(|el| el.attrs.clone())
                .unwrap_or_default();
            let image = FeaturedImage {
                media_id: attrs.get("mediaId").and_then(Value::as_str).map(str::to_string),
                image_url: attrs.get("imageUrl").and_then(Value::as_str).map(str::to_string),
            };
            serde_json::to_value(image).map_err(QueryError::from)
        })]
    }
}

/// Replaces the featured image's attributes. The node itself always stays,
/// so removal clears them.
pub fn set_featured_image(editor: &mut Editor, image: FeaturedImage) -> Result<(), CommandError> {
    let mut attrs = Attrs::new();
    if let Some(media_id) = image.media_id {
        attrs.insert("mediaId".to_string(), Value::from(media_id));
    }
    if let Some(image_url) = image.image_url {
        attrs.insert("imageUrl".to_string(), Value::from(image_url));
    }
    editor.transact(|draft| {
        draft.set_source("featured_image.set");
        draft
            .set_markup_at(vec![0], NodeKind::FeaturedImage, Some(attrs))
            .map_err(CommandError::from)
    })
}
