use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{InvalidIndentation, UnknownKind};
use crate::schema;

pub type Attrs = BTreeMap<String, Value>;
pub type Path = Vec<usize>;

/// Closed set of node kinds understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Document,
    BlockWrapper,
    FeaturedImage,
    Paragraph,
    Heading,
    Image,
    Text,
    BulletList,
    OrderedList,
    ListItem,
    Blockquote,
    CodeBlock,
}

impl NodeKind {
    pub const ALL: [NodeKind; 12] = [
        NodeKind::Document,
        NodeKind::BlockWrapper,
        NodeKind::FeaturedImage,
        NodeKind::Paragraph,
        NodeKind::Heading,
        NodeKind::Image,
        NodeKind::Text,
        NodeKind::BulletList,
        NodeKind::OrderedList,
        NodeKind::ListItem,
        NodeKind::Blockquote,
        NodeKind::CodeBlock,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Document => "document",
            NodeKind::BlockWrapper => "blockWrapper",
            NodeKind::FeaturedImage => "featuredImage",
            NodeKind::Paragraph => "paragraph",
            NodeKind::Heading => "heading",
            NodeKind::Image => "image",
            NodeKind::Text => "text",
            NodeKind::BulletList => "bulletList",
            NodeKind::OrderedList => "orderedList",
            NodeKind::ListItem => "listItem",
            NodeKind::Blockquote => "blockquote",
            NodeKind::CodeBlock => "codeBlock",
        }
    }

    /// Element kinds without content. They occupy a single position.
    pub fn is_leaf(self) -> bool {
        matches!(self, NodeKind::FeaturedImage | NodeKind::Image)
    }

    /// Element kinds whose content is inline text.
    pub fn is_textblock(self) -> bool {
        matches!(
            self,
            NodeKind::Paragraph | NodeKind::Heading | NodeKind::CodeBlock
        )
    }

    pub fn is_list(self) -> bool {
        matches!(self, NodeKind::BulletList | NodeKind::OrderedList)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NodeKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Indentation {
    #[default]
    Left,
    Center,
    Right,
}

impl Indentation {
    pub const ALL: [Indentation; 3] = [Indentation::Left, Indentation::Center, Indentation::Right];

    pub fn as_str(self) -> &'static str {
        match self {
            Indentation::Left => "left",
            Indentation::Center => "center",
            Indentation::Right => "right",
        }
    }

    pub fn to_value(self) -> Value {
        Value::String(self.as_str().to_string())
    }
}

impl fmt::Display for Indentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Indentation {
    type Err = InvalidIndentation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Indentation::Left),
            "center" => Ok(Indentation::Center),
            "right" => Ok(Indentation::Right),
            other => Err(InvalidIndentation(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkType {
    Bold,
    Italic,
    Underline,
    Code,
    Link,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Code,
    Link(String),
}

impl Mark {
    pub fn mark_type(&self) -> MarkType {
        match self {
            Mark::Bold => MarkType::Bold,
            Mark::Italic => MarkType::Italic,
            Mark::Underline => MarkType::Underline,
            Mark::Code => MarkType::Code,
            Mark::Link(_) => MarkType::Link,
        }
    }
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// Inline marks on a text leaf. One slot per mark type, so a leaf can never
/// carry the same mark twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Marks {
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub underline: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Marks {
    pub fn is_empty(&self) -> bool {
        *self == Marks::default()
    }

    pub fn has(&self, mark_type: MarkType) -> bool {
        match mark_type {
            MarkType::Bold => self.bold,
            MarkType::Italic => self.italic,
            MarkType::Underline => self.underline,
            MarkType::Code => self.code,
            MarkType::Link => self.link.is_some(),
        }
    }

    pub fn with(mut self, mark: &Mark) -> Self {
        match mark {
            Mark::Bold => self.bold = true,
            Mark::Italic => self.italic = true,
            Mark::Underline => self.underline = true,
            Mark::Code => self.code = true,
            Mark::Link(href) => self.link = Some(href.clone()),
        }
        self
    }

    pub fn without(mut self, mark_type: MarkType) -> Self {
        match mark_type {
            MarkType::Bold => self.bold = false,
            MarkType::Italic => self.italic = false,
            MarkType::Underline => self.underline = false,
            MarkType::Code => self.code = false,
            MarkType::Link => self.link = None,
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default, skip_serializing_if = "Marks::is_empty")]
    pub marks: Marks,
}

impl TextNode {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: Marks::default(),
        }
    }

    pub fn with_marks(text: impl Into<String>, marks: Marks) -> Self {
        Self {
            text: text.into(),
            marks,
        }
    }

    /// Length in positions (Unicode scalar values).
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,
    #[serde(default, rename = "content", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl ElementNode {
    pub fn new(kind: NodeKind, attrs: Attrs, children: Vec<Node>) -> Self {
        Self {
            kind,
            attrs,
            children,
        }
    }

    pub fn content_size(&self) -> usize {
        self.children.iter().map(Node::node_size).sum()
    }

    pub fn node_size(&self) -> usize {
        if self.kind.is_leaf() {
            1
        } else {
            self.content_size() + 2
        }
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.collect_text(&mut out);
        }
        out
    }

    pub fn is_textblock(&self) -> bool {
        self.kind.is_textblock()
    }

    /// Stored attribute, falling back to the schema default for this kind.
    pub fn attr(&self, key: &str) -> Option<Value> {
        self.attrs
            .get(key)
            .cloned()
            .or_else(|| schema::default_attr(self.kind, key))
    }

    pub fn attr_str(&self, key: &str) -> Option<String> {
        match self.attr(key)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Effective indentation, if this kind carries one.
    pub fn indentation(&self) -> Option<Indentation> {
        if !schema::has_indentation(self.kind) {
            return None;
        }
        Some(
            self.attr_str("indentation")
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Text(TextNode),
    Element(ElementNode),
}

impl Node {
    pub fn element(kind: NodeKind, attrs: Attrs, children: Vec<Node>) -> Self {
        Node::Element(ElementNode::new(kind, attrs, children))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode::new(text))
    }

    pub fn marked_text(text: impl Into<String>, marks: Marks) -> Self {
        Node::Text(TextNode::with_marks(text, marks))
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        let text = text.into();
        let children = if text.is_empty() {
            Vec::new()
        } else {
            vec![Node::text(text)]
        };
        Node::element(NodeKind::Paragraph, Attrs::default(), children)
    }

    pub fn empty_paragraph() -> Self {
        Node::element(NodeKind::Paragraph, Attrs::default(), Vec::new())
    }

    pub fn heading(level: u64, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut attrs = Attrs::default();
        attrs.insert("level".to_string(), Value::from(level));
        let children = if text.is_empty() {
            Vec::new()
        } else {
            vec![Node::text(text)]
        };
        Node::element(NodeKind::Heading, attrs, children)
    }

    pub fn image(src: impl Into<String>) -> Self {
        let mut attrs = Attrs::default();
        attrs.insert("src".to_string(), Value::String(src.into()));
        Node::element(NodeKind::Image, attrs, Vec::new())
    }

    pub fn featured_image() -> Self {
        Node::element(NodeKind::FeaturedImage, Attrs::default(), Vec::new())
    }

    pub fn block_wrapper(children: Vec<Node>) -> Self {
        Node::element(NodeKind::BlockWrapper, Attrs::default(), children)
    }

    /// A wrapper holding a single empty paragraph.
    pub fn empty_block_wrapper() -> Self {
        Node::block_wrapper(vec![Node::empty_paragraph()])
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Text(_) => NodeKind::Text,
            Node::Element(el) => el.kind,
        }
    }

    pub fn node_size(&self) -> usize {
        match self {
            Node::Text(t) => t.len(),
            Node::Element(el) => el.node_size(),
        }
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match self {
            Node::Text(t) => Some(t),
            Node::Element(_) => None,
        }
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(&t.text),
            Node::Element(el) => {
                for child in &el.children {
                    child.collect_text(out);
                }
            }
        }
    }
}

/// Borrowed view of any node in the tree, including the document root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeRef<'a> {
    Element(&'a ElementNode),
    Text(&'a TextNode),
}

impl<'a> NodeRef<'a> {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeRef::Element(el) => el.kind,
            NodeRef::Text(_) => NodeKind::Text,
        }
    }

    pub fn node_size(&self) -> usize {
        match self {
            NodeRef::Element(el) => el.node_size(),
            NodeRef::Text(t) => t.len(),
        }
    }

    pub fn as_element(&self) -> Option<&'a ElementNode> {
        match self {
            NodeRef::Element(el) => Some(el),
            NodeRef::Text(_) => None,
        }
    }

    pub fn to_node(&self) -> Node {
        match self {
            NodeRef::Element(el) => Node::Element((*el).clone()),
            NodeRef::Text(t) => Node::Text((*t).clone()),
        }
    }
}

impl<'a> From<&'a Node> for NodeRef<'a> {
    fn from(node: &'a Node) -> Self {
        match node {
            Node::Element(el) => NodeRef::Element(el),
            Node::Text(t) => NodeRef::Text(t),
        }
    }
}

/// The document tree. The root is an element of kind `document` which
/// exclusively owns every node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    root: ElementNode,
}

impl Default for Document {
    fn default() -> Self {
        Self::blank()
    }
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self {
            root: ElementNode::new(NodeKind::Document, Attrs::default(), children),
        }
    }

    /// `[featuredImage, blockWrapper[paragraph]]`
    pub fn blank() -> Self {
        Self::new(vec![Node::featured_image(), Node::empty_block_wrapper()])
    }

    /// A valid document with one wrapper per given block.
    pub fn with_blocks(blocks: Vec<Node>) -> Self {
        let mut children = vec![Node::featured_image()];
        children.extend(blocks.into_iter().map(|b| Node::block_wrapper(vec![b])));
        Self::new(children)
    }

    pub fn root(&self) -> &ElementNode {
        &self.root
    }

    pub(crate) fn root_mut(&mut self) -> &mut ElementNode {
        &mut self.root
    }

    pub fn children(&self) -> &[Node] {
        &self.root.children
    }

    pub fn content_size(&self) -> usize {
        self.root.content_size()
    }

    pub fn text_content(&self) -> String {
        self.root.text_content()
    }

    pub fn wrapper_count(&self) -> usize {
        self.root
            .children
            .iter()
            .filter(|n| n.kind() == NodeKind::BlockWrapper)
            .count()
    }

    pub fn node_at_path(&self, path: &[usize]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.root.children.get(*first)?;
        for &ix in rest {
            node = node.as_element()?.children.get(ix)?;
        }
        Some(node)
    }

    /// Element at `path`; the empty path is the root.
    pub fn element_at_path(&self, path: &[usize]) -> Option<&ElementNode> {
        if path.is_empty() {
            return Some(&self.root);
        }
        self.node_at_path(path)?.as_element()
    }

    /// Absolute position directly before the node at `path`.
    pub fn pos_before_path(&self, path: &[usize]) -> Option<usize> {
        let mut pos = 0usize;
        let mut el = &self.root;
        for (depth, &ix) in path.iter().enumerate() {
            if ix > el.children.len() {
                return None;
            }
            pos += el.children[..ix].iter().map(Node::node_size).sum::<usize>();
            if depth + 1 == path.len() {
                return Some(pos);
            }
            el = el.children.get(ix)?.as_element()?;
            pos += 1;
        }
        Some(pos)
    }
}

/// Byte index of the `chars`-th scalar value, clamped to the end.
pub(crate) fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices()
        .nth(chars)
        .map(|(ix, _)| ix)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_follow_flattened_offsets() {
        let doc = Document::with_blocks(vec![Node::paragraph("abc"), Node::image("a.png")]);
        // featured(1) + wrapper(2 + para(2 + 3)) + wrapper(2 + image(1))
        assert_eq!(doc.content_size(), 1 + 7 + 3);
        assert_eq!(doc.pos_before_path(&[1]), Some(1));
        assert_eq!(doc.pos_before_path(&[1, 0]), Some(2));
        assert_eq!(doc.pos_before_path(&[1, 0, 0]), Some(3));
        assert_eq!(doc.pos_before_path(&[2, 0]), Some(9));
    }

    #[test]
    fn node_kind_round_trips_through_names() {
        for kind in NodeKind::ALL {
            assert_eq!(kind.name().parse::<NodeKind>().unwrap(), kind);
        }
        assert!("header".parse::<NodeKind>().is_err());
    }

    #[test]
    fn text_length_counts_scalar_values() {
        let t = TextNode::new("héllo");
        assert_eq!(t.len(), 5);
        assert_eq!(byte_offset("héllo", 2), 3);
        assert_eq!(byte_offset("héllo", 9), 6);
    }
}
