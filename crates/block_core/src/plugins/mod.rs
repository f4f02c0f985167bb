mod block_wrapper;
mod blocks;
mod document;
mod empty_paragraph;
mod featured_image;
mod image;
mod indentation;
mod keymap;
mod marks;
mod slash;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::CommandError;
use crate::node::{Document, NodeKind, Path};
use crate::plugin::EditorPlugin;
use crate::selection::{Selection, near_text};

pub use block_wrapper::{
    Direction, insert_block_wrapper, insert_block_wrapper_above, insert_block_wrapper_below,
    move_block_wrapper, set_block_wrapper_indentation, wrap_in_block_wrapper,
};
pub use blocks::{set_block_type, toggle_blockquote, toggle_code_block, toggle_list};
pub use featured_image::{FeaturedImage, set_featured_image};
pub use image::{
    InsertImage, insert_image, set_image_alignment, set_image_caption, set_image_indentation,
};
pub use indentation::set_indentation;
pub use marks::{active_marks, set_link, set_link_with_text, toggle_mark, unset_link};
pub use slash::{SlashAction, SlashItem, SlashState, slash_items, slash_state};

/// Priority of handlers that must see input before the generic keymap.
pub(crate) const PRIORITY_HIGH: i32 = 100;
pub(crate) const PRIORITY_NORMAL: i32 = 50;
pub(crate) const PRIORITY_BASE: i32 = 0;

pub(crate) fn standard() -> Vec<Box<dyn EditorPlugin>> {
    vec![
        Box::new(document::DocumentPlugin),
        Box::new(block_wrapper::BlockWrapperPlugin),
        Box::new(empty_paragraph::EmptyParagraphPlugin),
        Box::new(indentation::IndentationPlugin),
        Box::new(image::ImagePlugin),
        Box::new(featured_image::FeaturedImagePlugin),
        Box::new(marks::MarksPlugin),
        Box::new(marks::LinkPlugin),
        Box::new(blocks::BlocksPlugin),
        Box::new(slash::SlashCommandPlugin),
        Box::new(keymap::HistoryPlugin),
        Box::new(keymap::LineSelectionPlugin),
        Box::new(keymap::BaseKeymapPlugin),
    ]
}

pub(crate) fn child_path(parent: &[usize], ix: usize) -> Path {
    let mut path = parent.to_vec();
    path.push(ix);
    path
}

/// Decodes command arguments; a missing argument object reads as `{}`.
pub(crate) fn parse_args<T: DeserializeOwned>(args: Option<Value>) -> Result<T, CommandError> {
    let value = args.unwrap_or_else(|| Value::Object(Default::default()));
    serde_json::from_value(value).map_err(|err| CommandError::invalid(err.to_string()))
}

/// Index of the top-level wrapper containing `pos`.
pub(crate) fn wrapper_index(doc: &Document, pos: usize) -> Option<usize> {
    let rp = doc.resolve(pos).ok()?;
    if rp.depth() == 0 {
        return None;
    }
    let ix = rp.index(0);
    (doc.children().get(ix)?.kind() == NodeKind::BlockWrapper).then_some(ix)
}

/// First caret position inside the top-level node at `ix`.
pub(crate) fn caret_in(doc: &Document, ix: usize) -> usize {
    let pos = doc.pos_before_path(&[ix]).unwrap_or(0);
    near_text(doc, pos)
}

/// A position pinned to a textblock by path, for carrying a selection
/// across edits that move whole blocks.
#[derive(Debug, Clone)]
pub(crate) struct TextAnchor {
    pub path: Path,
    pub offset: usize,
}

impl TextAnchor {
    pub fn at(doc: &Document, pos: usize) -> Option<Self> {
        let rp = doc.resolve(pos).ok()?;
        rp.parent().is_textblock().then(|| TextAnchor {
            path: rp.parent_path(),
            offset: rp.parent_offset(),
        })
    }

    pub fn pos(&self, doc: &Document) -> Option<usize> {
        let block = doc.element_at_path(&self.path)?;
        if !block.is_textblock() {
            return None;
        }
        let start = doc.pos_before_path(&self.path)? + 1;
        Some(start + self.offset.min(block.content_size()))
    }

    /// Rewrites the path through the first move whose source is a prefix.
    pub fn rebase(&mut self, moves: &[(Path, Path)]) {
        self.path = rebase_path(&self.path, moves);
    }
}

pub(crate) fn rebase_path(path: &[usize], moves: &[(Path, Path)]) -> Path {
    for (from, to) in moves {
        if path.starts_with(from) {
            let mut out = to.clone();
            out.extend_from_slice(&path[from.len()..]);
            return out;
        }
    }
    path.to_vec()
}

/// Carries `selection`, taken in `before`, into `after`, where the subtrees
/// listed in `moves` now live at new paths. Endpoints that cannot be
/// carried collapse onto the nearest text.
pub(crate) fn carry_selection(
    before: &Document,
    after: &Document,
    selection: Selection,
    moves: &[(Path, Path)],
) -> Selection {
    if let Selection::Node { from, .. } = selection {
        let carried = before
            .resolve(from)
            .ok()
            .map(|rp| rebase_path(&rp.child_path(), moves))
            .and_then(|path| after.pos_before_path(&path))
            .and_then(|pos| Selection::node(after, pos));
        return carried.unwrap_or_else(|| Selection::caret(near_text(after, from)));
    }
    let carry = |pos: usize| {
        TextAnchor::at(before, pos).and_then(|mut anchor| {
            anchor.rebase(moves);
            anchor.pos(after)
        })
    };
    match (carry(selection.anchor()), carry(selection.head())) {
        (Some(anchor), Some(head)) => Selection::text(anchor, head),
        (Some(pos), None) | (None, Some(pos)) => Selection::caret(pos),
        (None, None) => Selection::caret(near_text(after, selection.head().min(after.content_size()))),
    }
}
