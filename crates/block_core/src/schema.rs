use serde_json::Value;

use crate::error::SchemaViolation;
use crate::node::{Document, ElementNode, Indentation, Node, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Root,
    Wrapper,
    Block,
    Inline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildConstraint {
    /// Leaf: no content at all.
    None,
    /// Text leaves only.
    InlineOnly,
    /// One or more block nodes.
    Blocks,
    /// One or more list items.
    ListItems,
    /// `featuredImage blockWrapper+`
    TopLevel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttrSpec {
    pub name: &'static str,
    pub default: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub kind: NodeKind,
    pub role: NodeRole,
    pub children: ChildConstraint,
    pub attrs: Vec<AttrSpec>,
}

fn attr(name: &'static str, default: Value) -> AttrSpec {
    AttrSpec { name, default }
}

fn indentation() -> AttrSpec {
    attr("indentation", Indentation::Left.to_value())
}

pub fn node_spec(kind: NodeKind) -> NodeSpec {
    let (role, children, attrs) = match kind {
        NodeKind::Document => (NodeRole::Root, ChildConstraint::TopLevel, vec![]),
        NodeKind::BlockWrapper => (
            NodeRole::Wrapper,
            ChildConstraint::Blocks,
            vec![
                indentation(),
                attr("className", Value::Null),
                attr("backgroundColor", Value::Null),
                attr("padding", Value::Null),
            ],
        ),
        NodeKind::FeaturedImage => (
            NodeRole::Wrapper,
            ChildConstraint::None,
            vec![
                attr("mediaId", Value::Null),
                attr("imageUrl", Value::Null),
                attr("position", Value::from(0)),
            ],
        ),
        NodeKind::Paragraph | NodeKind::CodeBlock => {
            (NodeRole::Block, ChildConstraint::InlineOnly, vec![indentation()])
        }
        NodeKind::Heading => (
            NodeRole::Block,
            ChildConstraint::InlineOnly,
            vec![
                attr("level", Value::from(1)),
                indentation(),
                attr("class", Value::Null),
            ],
        ),
        NodeKind::Image => (
            NodeRole::Block,
            ChildConstraint::None,
            vec![
                attr("src", Value::Null),
                attr("alt", Value::Null),
                attr("title", Value::Null),
                attr("width", Value::Null),
                attr("height", Value::Null),
                attr("caption", Value::Null),
                indentation(),
            ],
        ),
        NodeKind::Text => (NodeRole::Inline, ChildConstraint::None, vec![]),
        NodeKind::BulletList => (NodeRole::Block, ChildConstraint::ListItems, vec![]),
        NodeKind::OrderedList => (
            NodeRole::Block,
            ChildConstraint::ListItems,
            vec![attr("start", Value::from(1))],
        ),
        NodeKind::ListItem => (NodeRole::Block, ChildConstraint::Blocks, vec![]),
        NodeKind::Blockquote => (NodeRole::Block, ChildConstraint::Blocks, vec![indentation()]),
    };
    NodeSpec {
        kind,
        role,
        children,
        attrs,
    }
}

/// Schema default for `key` on `kind`. Null defaults read as absent.
pub fn default_attr(kind: NodeKind, key: &str) -> Option<Value> {
    node_spec(kind)
        .attrs
        .into_iter()
        .find(|a| a.name == key)
        .map(|a| a.default)
        .filter(|v| !v.is_null())
}

pub fn has_indentation(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::BlockWrapper
            | NodeKind::Paragraph
            | NodeKind::Heading
            | NodeKind::Image
            | NodeKind::Blockquote
            | NodeKind::CodeBlock
    )
}

/// Kinds allowed inside a wrapper, blockquote or list item.
pub fn is_block_content(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Paragraph
            | NodeKind::Heading
            | NodeKind::Image
            | NodeKind::BulletList
            | NodeKind::OrderedList
            | NodeKind::Blockquote
            | NodeKind::CodeBlock
    )
}

pub fn allows_child(parent: NodeKind, child: NodeKind) -> bool {
    match node_spec(parent).children {
        ChildConstraint::None => false,
        ChildConstraint::InlineOnly => child == NodeKind::Text,
        ChildConstraint::Blocks => is_block_content(child),
        ChildConstraint::ListItems => child == NodeKind::ListItem,
        ChildConstraint::TopLevel => {
            matches!(child, NodeKind::FeaturedImage | NodeKind::BlockWrapper)
        }
    }
}

/// Checks the structural invariants a committed document must satisfy.
/// Image indentation drift is repaired after commit and is not checked here.
pub fn validate_document(doc: &Document) -> Result<(), SchemaViolation> {
    let children = doc.children();
    let violation = |path: Vec<usize>, message: &str| SchemaViolation {
        path,
        message: message.to_string(),
    };

    if children.first().map(Node::kind) != Some(NodeKind::FeaturedImage) {
        return Err(violation(vec![0], "document must start with a featured image"));
    }
    if children.len() < 2 {
        return Err(violation(vec![], "document needs at least one block wrapper"));
    }
    for (ix, child) in children.iter().enumerate() {
        let expected = if ix == 0 {
            NodeKind::FeaturedImage
        } else {
            NodeKind::BlockWrapper
        };
        if child.kind() != expected {
            return Err(SchemaViolation {
                path: vec![ix],
                message: format!("expected {expected}, found {}", child.kind()),
            });
        }
        if let Node::Element(el) = child {
            validate_element(el, &mut vec![ix])?;
        }
    }
    Ok(())
}

fn validate_element(el: &ElementNode, path: &mut Vec<usize>) -> Result<(), SchemaViolation> {
    let fail = |path: &[usize], message: String| SchemaViolation {
        path: path.to_vec(),
        message,
    };

    let spec = node_spec(el.kind);
    match spec.children {
        ChildConstraint::None if !el.children.is_empty() => {
            return Err(fail(path, format!("{} cannot have content", el.kind)));
        }
        ChildConstraint::Blocks | ChildConstraint::ListItems if el.children.is_empty() => {
            return Err(fail(path, format!("{} cannot be empty", el.kind)));
        }
        _ => {}
    }
    if el.kind == NodeKind::ListItem
        && el.children.first().map(Node::kind) != Some(NodeKind::Paragraph)
    {
        return Err(fail(path, "list item must start with a paragraph".into()));
    }
    if let Some(value) = el.attrs.get("indentation") {
        let valid = value
            .as_str()
            .is_some_and(|s| s.parse::<Indentation>().is_ok());
        if !valid {
            return Err(fail(path, format!("invalid indentation {value}")));
        }
    }
    if el.kind == NodeKind::Heading {
        let level = el.attr("level").and_then(|v| v.as_u64()).unwrap_or(0);
        if !(1..=3).contains(&level) {
            return Err(fail(path, format!("heading level {level} out of range")));
        }
    }

    let mut prev_marks = None;
    for (ix, child) in el.children.iter().enumerate() {
        path.push(ix);
        if !allows_child(el.kind, child.kind()) {
            return Err(fail(
                path,
                format!("{} is not allowed inside {}", child.kind(), el.kind),
            ));
        }
        match child {
            Node::Text(t) => {
                if t.is_empty() {
                    return Err(fail(path, "empty text leaf".into()));
                }
                if el.kind == NodeKind::CodeBlock && !t.marks.is_empty() {
                    return Err(fail(path, "code block text cannot carry marks".into()));
                }
                if prev_marks.as_ref() == Some(&t.marks) {
                    return Err(fail(path, "adjacent text leaves share marks".into()));
                }
                prev_marks = Some(t.marks.clone());
            }
            Node::Element(child_el) => {
                prev_marks = None;
                validate_element(child_el, path)?;
            }
        }
        path.pop();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_document_is_valid() {
        assert!(validate_document(&Document::blank()).is_ok());
    }

    #[test]
    fn unwrapped_block_is_rejected() {
        let doc = Document::new(vec![Node::featured_image(), Node::paragraph("loose")]);
        let err = validate_document(&doc).unwrap_err();
        assert_eq!(err.path, vec![1]);
    }

    #[test]
    fn defaults_fill_missing_attrs() {
        assert_eq!(
            default_attr(NodeKind::BlockWrapper, "indentation"),
            Some(Value::String("left".into()))
        );
        assert_eq!(default_attr(NodeKind::Image, "caption"), None);
        assert_eq!(default_attr(NodeKind::Heading, "level"), Some(Value::from(1)));
    }
}
