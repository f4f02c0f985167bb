//! Conversion between documents and an HTML-shaped external tree.
//!
//! Rendering emits the markup the editor has always produced: wrappers as
//! `div[data-type=block-wrapper]` carrying their indentation, images as
//! `img` or `figure > img + figcaption`, marks as `strong`/`em`/`u`/`code`/`a`.
//! Parsing accepts the same shapes back. Attributes equal to their schema
//! default are left unset, so a render/parse round trip reproduces a
//! document that only stores non-default attributes.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExternalFormatError;
use crate::node::{Attrs, Document, ElementNode, Indentation, Mark, Marks, Node, NodeKind};
use crate::schema::{default_attr, validate_document};

pub type ExternalAttrs = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExternalNode {
    Text {
        text: String,
    },
    Element {
        tag: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attrs: ExternalAttrs,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<ExternalNode>,
    },
}

impl ExternalNode {
    pub fn element(tag: &str, attrs: ExternalAttrs, children: Vec<ExternalNode>) -> Self {
        ExternalNode::Element {
            tag: tag.to_string(),
            attrs,
            children,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        ExternalNode::Text { text: text.into() }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            ExternalNode::Element { tag, .. } => Some(tag),
            ExternalNode::Text { .. } => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            ExternalNode::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            ExternalNode::Text { .. } => None,
        }
    }

    pub fn children(&self) -> &[ExternalNode] {
        match self {
            ExternalNode::Element { children, .. } => children,
            ExternalNode::Text { .. } => &[],
        }
    }

    pub fn text_content(&self) -> String {
        match self {
            ExternalNode::Text { text } => text.clone(),
            ExternalNode::Element { children, .. } => {
                children.iter().map(ExternalNode::text_content).collect()
            }
        }
    }

    fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    fn is_blank_text(&self) -> bool {
        matches!(self, ExternalNode::Text { text } if text.trim().is_empty())
    }
}

const WRAPPER_TYPE: &str = "block-wrapper";
const FEATURED_IMAGE_TYPE: &str = "featured-image";
const VOID_TAGS: [&str; 2] = ["img", "br"];

fn attrs_of<const N: usize>(pairs: [(&str, String); N]) -> ExternalAttrs {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Attribute value as markup text. Null reads as unset.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Copies `key` into `out` as `name` unless unset or equal to the default.
fn copy_attr(el: &ElementNode, key: &str, name: &str, out: &mut ExternalAttrs) {
    let Some(value) = el.attrs.get(key) else {
        return;
    };
    if default_attr(el.kind, key).as_ref() == Some(value) {
        return;
    }
    if let Some(text) = value_text(value) {
        out.insert(name.to_string(), text);
    }
}

pub fn to_external(doc: &Document) -> Vec<ExternalNode> {
    doc.children().iter().map(render_node).collect()
}

fn render_node(node: &Node) -> ExternalNode {
    match node {
        Node::Text(t) => render_text(&t.text, &t.marks),
        Node::Element(el) => render_element(el),
    }
}

/// Marks nest innermost first: code, underline, italic, bold, then link.
fn render_text(text: &str, marks: &Marks) -> ExternalNode {
    let mut node = ExternalNode::text(text);
    if marks.code {
        let attrs = attrs_of([("class", "code-style".to_string())]);
        node = ExternalNode::element("code", attrs, vec![node]);
    }
    for (on, tag) in [(marks.underline, "u"), (marks.italic, "em"), (marks.bold, "strong")] {
        if on {
            node = ExternalNode::element(tag, ExternalAttrs::new(), vec![node]);
        }
    }
    if let Some(href) = &marks.link {
        node = ExternalNode::element("a", attrs_of([("href", href.clone())]), vec![node]);
    }
    node
}

fn render_children(el: &ElementNode) -> Vec<ExternalNode> {
    el.children.iter().map(render_node).collect()
}

fn render_element(el: &ElementNode) -> ExternalNode {
    let mut attrs = ExternalAttrs::new();
    copy_attr(el, "indentation", "data-indentation", &mut attrs);
    match el.kind {
        NodeKind::BlockWrapper => {
            let indentation = el.indentation().unwrap_or_default();
            attrs.insert("data-type".into(), WRAPPER_TYPE.into());
            attrs.insert("data-indentation".into(), indentation.to_string());
            copy_attr(el, "className", "class", &mut attrs);
            let style: Vec<String> = [
                ("backgroundColor", "background-color"),
                ("padding", "padding"),
            ]
            .into_iter()
            .filter_map(|(key, prop)| {
                let value = el.attrs.get(key).and_then(value_text)?;
                Some(format!("{prop}: {value}"))
            })
            .collect();
            if !style.is_empty() {
                attrs.insert("style".into(), style.join("; "));
            }
            ExternalNode::element("div", attrs, render_children(el))
        }
        NodeKind::FeaturedImage => {
            attrs.insert("data-type".into(), FEATURED_IMAGE_TYPE.into());
            for key in ["mediaId", "imageUrl", "position"] {
                copy_attr(el, key, key, &mut attrs);
            }
            ExternalNode::element("div", attrs, Vec::new())
        }
        NodeKind::Paragraph => ExternalNode::element("p", attrs, render_children(el)),
        NodeKind::Heading => {
            let level = el.attr("level").and_then(|v| v.as_u64()).unwrap_or(1);
            copy_attr(el, "class", "class", &mut attrs);
            ExternalNode::element(&format!("h{level}"), attrs, render_children(el))
        }
        NodeKind::CodeBlock => {
            let code = ExternalNode::element(
                "code",
                ExternalAttrs::new(),
                vec![ExternalNode::text(el.text_content())],
            );
            ExternalNode::element("pre", attrs, vec![code])
        }
        NodeKind::Blockquote => ExternalNode::element("blockquote", attrs, render_children(el)),
        NodeKind::BulletList => ExternalNode::element("ul", attrs, render_children(el)),
        NodeKind::OrderedList => {
            copy_attr(el, "start", "start", &mut attrs);
            ExternalNode::element("ol", attrs, render_children(el))
        }
        NodeKind::ListItem => ExternalNode::element("li", attrs, render_children(el)),
        NodeKind::Image => render_image(el),
        // Never inside a valid document.
        NodeKind::Document | NodeKind::Text => {
            ExternalNode::element("div", attrs, render_children(el))
        }
    }
}

/// Images always state their indentation. A caption turns the image into
/// a figure.
fn render_image(el: &ElementNode) -> ExternalNode {
    let indentation = el.indentation().unwrap_or_default();
    let mut img = ExternalAttrs::new();
    for key in ["src", "alt", "title", "width", "height"] {
        copy_attr(el, key, key, &mut img);
    }
    img.insert("class".into(), format!("editor-image editor-image-{indentation}"));
    img.insert("data-indentation".into(), indentation.to_string());

    let caption = el.attr_str("caption").filter(|c| !c.is_empty());
    let Some(caption) = caption else {
        return ExternalNode::element("img", img, Vec::new());
    };
    let figure = attrs_of([
        ("class", format!("editor-image-figure editor-image-{indentation}")),
        ("data-indentation", indentation.to_string()),
    ]);
    let figcaption = ExternalNode::element(
        "figcaption",
        attrs_of([("class", "editor-image-caption".to_string())]),
        vec![ExternalNode::text(caption)],
    );
    ExternalNode::element(
        "figure",
        figure,
        vec![ExternalNode::element("img", img, Vec::new()), figcaption],
    )
}

pub fn render_html(doc: &Document) -> String {
    let mut out = String::new();
    for node in to_external(doc) {
        write_html(&node, &mut out);
    }
    out
}

fn write_html(node: &ExternalNode, out: &mut String) {
    match node {
        ExternalNode::Text { text } => escape_into(text, false, out),
        ExternalNode::Element {
            tag,
            attrs,
            children,
        } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attrs {
                let _ = write!(out, " {name}=\"");
                escape_into(value, true, out);
                out.push('"');
            }
            out.push('>');
            if VOID_TAGS.contains(&tag.as_str()) {
                return;
            }
            for child in children {
                write_html(child, out);
            }
            let _ = write!(out, "</{tag}>");
        }
    }
}

fn escape_into(text: &str, in_attr: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attr => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

/// Builds a document from top-level nodes. A missing featured image is
/// added in front and bare blocks get a wrapper of their own; anything
/// else that breaks the schema is an error.
pub fn from_external(nodes: &[ExternalNode]) -> Result<Document, ExternalFormatError> {
    let mut children = Vec::new();
    for node in nodes.iter().filter(|n| !n.is_blank_text()) {
        let parsed = parse_block(node)?;
        if parsed.kind() == NodeKind::FeaturedImage || parsed.kind() == NodeKind::BlockWrapper {
            children.push(parsed);
        } else {
            children.push(Node::block_wrapper(vec![parsed]));
        }
    }
    if children.first().map(Node::kind) != Some(NodeKind::FeaturedImage) {
        children.insert(0, Node::featured_image());
    }
    if children.len() == 1 {
        children.push(Node::empty_block_wrapper());
    }
    let doc = Document::new(children);
    validate_document(&doc)?;
    tracing::debug!(blocks = doc.wrapper_count(), "parsed external document");
    Ok(doc)
}

fn invalid_attr(tag: &str, attr: &str, reason: impl Into<String>) -> ExternalFormatError {
    ExternalFormatError::InvalidAttr {
        tag: tag.to_string(),
        attr: attr.to_string(),
        reason: reason.into(),
    }
}

/// Stores `value` unless it equals the schema default for `kind`.
fn put(attrs: &mut Attrs, kind: NodeKind, key: &str, value: Value) {
    if value.is_null() || default_attr(kind, key).as_ref() == Some(&value) {
        return;
    }
    attrs.insert(key.to_string(), value);
}

fn parse_indentation(
    node: &ExternalNode,
    tag: &str,
) -> Result<Option<Indentation>, ExternalFormatError> {
    node.attr("data-indentation")
        .map(|raw| {
            raw.parse::<Indentation>()
                .map_err(|err| invalid_attr(tag, "data-indentation", err.to_string()))
        })
        .transpose()
}

fn put_indentation(attrs: &mut Attrs, kind: NodeKind, indentation: Option<Indentation>) {
    if let Some(indentation) = indentation {
        put(attrs, kind, "indentation", indentation.to_value());
    }
}

fn parse_number(tag: &str, attr: &str, raw: &str) -> Result<Value, ExternalFormatError> {
    raw.trim()
        .parse::<u64>()
        .map(Value::from)
        .map_err(|_| invalid_attr(tag, attr, format!("{raw:?} is not a number")))
}

/// Numeric values stay numbers, anything else is kept as text.
fn number_or_text(raw: &str) -> Value {
    raw.trim()
        .parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(raw))
}

fn parse_block(node: &ExternalNode) -> Result<Node, ExternalFormatError> {
    let ExternalNode::Element { tag, .. } = node else {
        let mut inline = Vec::new();
        parse_inline(node, &Marks::default(), &mut inline)?;
        return Ok(Node::element(NodeKind::Paragraph, Attrs::new(), merge_text(inline)));
    };
    let tag = tag.as_str();
    let mut attrs = Attrs::new();
    let block = match tag {
        "div" => match node.attr("data-type") {
            Some(WRAPPER_TYPE) => parse_wrapper(node)?,
            Some(FEATURED_IMAGE_TYPE) => parse_featured_image(node)?,
            _ => return Err(ExternalFormatError::UnknownTag(tag.to_string())),
        },
        "p" => {
            put_indentation(&mut attrs, NodeKind::Paragraph, parse_indentation(node, tag)?);
            Node::element(NodeKind::Paragraph, attrs, parse_inline_children(node)?)
        }
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = tag[1..].parse::<u64>().unwrap_or(1).min(3);
            put(&mut attrs, NodeKind::Heading, "level", Value::from(level));
            put_indentation(&mut attrs, NodeKind::Heading, parse_indentation(node, tag)?);
            if let Some(class) = node.attr("class") {
                put(&mut attrs, NodeKind::Heading, "class", Value::from(class));
            }
            Node::element(NodeKind::Heading, attrs, parse_inline_children(node)?)
        }
        "pre" => {
            put_indentation(&mut attrs, NodeKind::CodeBlock, parse_indentation(node, tag)?);
            let text = node.text_content();
            let children = if text.is_empty() {
                Vec::new()
            } else {
                vec![Node::text(text)]
            };
            Node::element(NodeKind::CodeBlock, attrs, children)
        }
        "blockquote" => {
            put_indentation(&mut attrs, NodeKind::Blockquote, parse_indentation(node, tag)?);
            Node::element(NodeKind::Blockquote, attrs, parse_blocks(node.children())?)
        }
        "ul" | "ol" => {
            let kind = if tag == "ul" {
                NodeKind::BulletList
            } else {
                NodeKind::OrderedList
            };
            if let Some(raw) = node.attr("start").filter(|_| kind == NodeKind::OrderedList) {
                put(&mut attrs, kind, "start", parse_number(tag, "start", raw)?);
            }
            let items = node
                .children()
                .iter()
                .filter(|child| !child.is_blank_text())
                .map(parse_block)
                .collect::<Result<Vec<_>, _>>()?;
            Node::element(kind, attrs, items)
        }
        "li" => {
            let mut content = parse_blocks(node.children())?;
            if content.first().map(Node::kind) != Some(NodeKind::Paragraph) {
                content.insert(0, Node::empty_paragraph());
            }
            Node::element(NodeKind::ListItem, attrs, content)
        }
        "img" => parse_image(node, None)?,
        "figure" => {
            let img = node
                .children()
                .iter()
                .find(|child| child.tag() == Some("img"))
                .ok_or_else(|| invalid_attr(tag, "img", "figure without an image"))?;
            parse_image(img, Some(node))?
        }
        other => return Err(ExternalFormatError::UnknownTag(other.to_string())),
    };
    Ok(block)
}

fn parse_wrapper(node: &ExternalNode) -> Result<Node, ExternalFormatError> {
    let kind = NodeKind::BlockWrapper;
    let mut attrs = Attrs::new();
    put_indentation(&mut attrs, kind, parse_indentation(node, "div")?);
    if let Some(class) = node.attr("class") {
        put(&mut attrs, kind, "className", Value::from(class));
    }
    for declaration in node.attr("style").unwrap_or_default().split(';') {
        let Some((prop, value)) = declaration.split_once(':') else {
            continue;
        };
        let key = match prop.trim() {
            "background-color" => "backgroundColor",
            "padding" => "padding",
            _ => continue,
        };
        put(&mut attrs, kind, key, Value::from(value.trim()));
    }
    let mut content = parse_blocks(node.children())?;
    if content.is_empty() {
        content.push(Node::empty_paragraph());
    }
    Ok(Node::element(kind, attrs, content))
}

fn parse_featured_image(node: &ExternalNode) -> Result<Node, ExternalFormatError> {
    let kind = NodeKind::FeaturedImage;
    let mut attrs = Attrs::new();
    for key in ["mediaId", "imageUrl"] {
        if let Some(value) = node.attr(key) {
            put(&mut attrs, kind, key, Value::from(value));
        }
    }
    if let Some(raw) = node.attr("position") {
        put(&mut attrs, kind, "position", parse_number("div", "position", raw)?);
    }
    Ok(Node::element(kind, attrs, Vec::new()))
}

/// Indentation comes from `data-indentation` on the figure or image, then
/// from alignment classes.
fn image_indentation(target: &ExternalNode) -> Result<Indentation, ExternalFormatError> {
    if let Some(indentation) = parse_indentation(target, "img")? {
        return Ok(indentation);
    }
    let center = ["text-center", "center-aligned", "editor-image-center"];
    let right = ["text-right", "right-aligned", "editor-image-right"];
    if center.iter().any(|c| target.has_class(c)) {
        Ok(Indentation::Center)
    } else if right.iter().any(|c| target.has_class(c)) {
        Ok(Indentation::Right)
    } else {
        Ok(Indentation::Left)
    }
}

fn parse_image(
    img: &ExternalNode,
    figure: Option<&ExternalNode>,
) -> Result<Node, ExternalFormatError> {
    let kind = NodeKind::Image;
    let mut attrs = Attrs::new();
    for key in ["src", "alt", "title"] {
        if let Some(value) = img.attr(key) {
            put(&mut attrs, kind, key, Value::from(value));
        }
    }
    for key in ["width", "height"] {
        if let Some(raw) = img.attr(key) {
            put(&mut attrs, kind, key, number_or_text(raw));
        }
    }
    let caption = match figure {
        Some(figure) => figure
            .children()
            .iter()
            .find(|child| child.tag() == Some("figcaption"))
            .map(ExternalNode::text_content),
        None => img.attr("data-caption").map(str::to_string),
    };
    if let Some(caption) = caption.filter(|c| !c.is_empty()) {
        put(&mut attrs, kind, "caption", Value::from(caption));
    }
    let indentation = image_indentation(figure.unwrap_or(img))?;
    put(&mut attrs, kind, "indentation", indentation.to_value());
    Ok(Node::element(kind, attrs, Vec::new()))
}

fn is_inline(node: &ExternalNode) -> bool {
    match node.tag() {
        None => true,
        Some(tag) => matches!(
            tag,
            "strong" | "b" | "em" | "i" | "u" | "code" | "a" | "span"
        ),
    }
}

/// Block content. Runs of loose inline content become paragraphs.
fn parse_blocks(nodes: &[ExternalNode]) -> Result<Vec<Node>, ExternalFormatError> {
    let mut blocks = Vec::new();
    let mut run: Vec<Node> = Vec::new();
    for node in nodes {
        if is_inline(node) {
            if !node.is_blank_text() || !run.is_empty() {
                parse_inline(node, &Marks::default(), &mut run)?;
            }
            continue;
        }
        if !run.is_empty() {
            let inline = merge_text(std::mem::take(&mut run));
            blocks.push(Node::element(NodeKind::Paragraph, Attrs::new(), inline));
        }
        blocks.push(parse_block(node)?);
    }
    if !run.is_empty() {
        let inline = merge_text(run);
        blocks.push(Node::element(NodeKind::Paragraph, Attrs::new(), inline));
    }
    Ok(blocks)
}

fn parse_inline_children(node: &ExternalNode) -> Result<Vec<Node>, ExternalFormatError> {
    let mut out = Vec::new();
    for child in node.children() {
        parse_inline(child, &Marks::default(), &mut out)?;
    }
    Ok(merge_text(out))
}

fn parse_inline(
    node: &ExternalNode,
    marks: &Marks,
    out: &mut Vec<Node>,
) -> Result<(), ExternalFormatError> {
    let (tag, children) = match node {
        ExternalNode::Text { text } => {
            if !text.is_empty() {
                out.push(Node::marked_text(text.clone(), marks.clone()));
            }
            return Ok(());
        }
        ExternalNode::Element { tag, children, .. } => (tag.as_str(), children),
    };
    let marks = match tag {
        "strong" | "b" => marks.clone().with(&Mark::Bold),
        "em" | "i" => marks.clone().with(&Mark::Italic),
        "u" => marks.clone().with(&Mark::Underline),
        "code" => marks.clone().with(&Mark::Code),
        "a" => {
            let href = node
                .attr("href")
                .filter(|href| !href.trim().is_empty())
                .ok_or_else(|| invalid_attr(tag, "href", "link without a target"))?;
            marks.clone().with(&Mark::Link(href.to_string()))
        }
        "span" => marks.clone(),
        other => return Err(ExternalFormatError::UnknownTag(other.to_string())),
    };
    for child in children {
        parse_inline(child, &marks, out)?;
    }
    Ok(())
}

/// Joins adjacent text leaves with equal marks.
fn merge_text(nodes: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if let (Some(Node::Text(last)), Node::Text(next)) = (out.last_mut(), &node) {
            if last.marks == next.marks {
                last.text.push_str(&next.text);
                continue;
            }
        }
        out.push(node);
    }
    out
}
