use serde::{Deserialize, Serialize};

use crate::locate::textblock_ranges;
use crate::node::{Document, ElementNode, NodeRef};
use crate::ops::{Bias, Mapping};

/// Either a text range (`anchor` stays put, `head` moves) or a node
/// selection covering exactly one non-text node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Selection {
    Text { anchor: usize, head: usize },
    Node { from: usize, to: usize },
}

impl Default for Selection {
    fn default() -> Self {
        Selection::caret(0)
    }
}

impl Selection {
    pub fn caret(pos: usize) -> Self {
        Selection::Text {
            anchor: pos,
            head: pos,
        }
    }

    pub fn text(anchor: usize, head: usize) -> Self {
        Selection::Text { anchor, head }
    }

    /// Node selection of the element starting at `pos`.
    pub fn node(doc: &Document, pos: usize) -> Option<Self> {
        let NodeRef::Element(el) = doc.node_at(pos)? else {
            return None;
        };
        Some(Selection::Node {
            from: pos,
            to: pos + el.node_size(),
        })
    }

    pub fn anchor(&self) -> usize {
        match *self {
            Selection::Text { anchor, .. } => anchor,
            Selection::Node { from, .. } => from,
        }
    }

    pub fn head(&self) -> usize {
        match *self {
            Selection::Text { head, .. } => head,
            Selection::Node { to, .. } => to,
        }
    }

    pub fn from(&self) -> usize {
        self.anchor().min(self.head())
    }

    pub fn to(&self) -> usize {
        self.anchor().max(self.head())
    }

    pub fn is_empty(&self) -> bool {
        self.from() == self.to()
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Selection::Node { .. })
    }

    /// The element under a node selection.
    pub fn selected_node<'a>(&self, doc: &'a Document) -> Option<&'a ElementNode> {
        let Selection::Node { from, .. } = *self else {
            return None;
        };
        doc.node_at(from)?.as_element()
    }

    pub fn map(&self, mapping: &Mapping) -> Self {
        self.map_from(mapping, 0)
    }

    pub(crate) fn map_from(&self, mapping: &Mapping, start: usize) -> Self {
        match *self {
            Selection::Text { anchor, head } => Selection::Text {
                anchor: mapping.map_from(start, anchor, Bias::Right),
                head: mapping.map_from(start, head, Bias::Right),
            },
            Selection::Node { from, to } => Selection::Node {
                from: mapping.map_from(start, from, Bias::Right),
                to: mapping.map_from(start, to, Bias::Left),
            },
        }
    }

    /// Moves each endpoint onto a valid spot in `doc`: text endpoints into
    /// the nearest textblock, node selections onto a real node.
    pub fn repair(&self, doc: &Document) -> Self {
        let size = doc.content_size();
        match *self {
            Selection::Node { from, to } => {
                if let Some(NodeRef::Element(el)) = doc.node_at(from) {
                    if from + el.node_size() == to {
                        return *self;
                    }
                }
                let pos = near_text(doc, from.min(size));
                Selection::caret(pos)
            }
            Selection::Text { anchor, head } => Selection::Text {
                anchor: near_text(doc, anchor.min(size)),
                head: near_text(doc, head.min(size)),
            },
        }
    }
}

/// Nearest position inside a textblock, searching forward first.
pub fn near_text(doc: &Document, pos: usize) -> usize {
    let ranges = textblock_ranges(doc);
    if ranges.iter().any(|r| r.contains(&pos)) {
        return pos;
    }
    if let Some(r) = ranges.iter().find(|r| *r.start() >= pos) {
        return *r.start();
    }
    ranges.last().map(|r| *r.end()).unwrap_or(pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    #[test]
    fn repair_moves_structural_positions_into_text() {
        // featured(0) wrapper(1){ para(2){ "ab" 3..5 } } wrapper(7){ image(8) }
        let doc = Document::with_blocks(vec![Node::paragraph("ab"), Node::image("x.png")]);
        assert_eq!(Selection::caret(0).repair(&doc), Selection::caret(3));
        assert_eq!(Selection::caret(4).repair(&doc), Selection::caret(4));
        assert_eq!(Selection::caret(9).repair(&doc), Selection::caret(5));

        let image = Selection::node(&doc, 8).unwrap();
        assert_eq!(image, Selection::Node { from: 8, to: 9 });
        assert_eq!(image.repair(&doc), image);
        assert_eq!(Selection::Node { from: 8, to: 12 }.repair(&doc), Selection::caret(5));
    }
}
