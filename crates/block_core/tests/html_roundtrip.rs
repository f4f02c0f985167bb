use blockdoc_core::{
    Attrs, Document, ExternalFormatError, ExternalNode, Marks, Node, NodeKind, from_external,
    render_html, to_external,
};
use serde_json::{Value, json};

fn element(kind: NodeKind, attrs: &[(&str, Value)], children: Vec<Node>) -> Node {
    let attrs: Attrs = attrs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    Node::element(kind, attrs, children)
}

fn marks(f: impl FnOnce(&mut Marks)) -> Marks {
    let mut marks = Marks::default();
    f(&mut marks);
    marks
}

fn external(value: Value) -> Vec<ExternalNode> {
    serde_json::from_value(value).unwrap()
}

#[test]
fn renders_wrappers_headings_and_marks() {
    let doc = Document::with_blocks(vec![
        Node::heading(2, "Title"),
        element(
            NodeKind::Paragraph,
            &[],
            vec![
                Node::text("plain "),
                Node::marked_text("bold", marks(|m| m.bold = true)),
            ],
        ),
    ]);

    assert_eq!(
        render_html(&doc),
        concat!(
            r#"<div data-type="featured-image"></div>"#,
            r#"<div data-indentation="left" data-type="block-wrapper"><h2>Title</h2></div>"#,
            r#"<div data-indentation="left" data-type="block-wrapper">"#,
            r#"<p>plain <strong>bold</strong></p></div>"#,
        )
    );
}

#[test]
fn renders_captioned_images_as_figures() {
    let doc = Document::with_blocks(vec![element(
        NodeKind::Image,
        &[
            ("src", json!("a.png")),
            ("caption", json!("Dawn")),
            ("indentation", json!("right")),
        ],
        Vec::new(),
    )]);

    let html = render_html(&doc);

    assert!(html.contains(
        r#"<figure class="editor-image-figure editor-image-right" data-indentation="right">"#
    ));
    assert!(html.contains(
        r#"<img class="editor-image editor-image-right" data-indentation="right" src="a.png">"#
    ));
    assert!(html.contains(r#"<figcaption class="editor-image-caption">Dawn</figcaption>"#));
    assert!(!html.contains("</img>"));
}

#[test]
fn escapes_text_and_attributes() {
    let doc = Document::with_blocks(vec![element(
        NodeKind::Paragraph,
        &[],
        vec![Node::marked_text(
            "a < b & c",
            marks(|m| m.link = Some("/q?x=\"1\"".to_string())),
        )],
    )]);

    let html = render_html(&doc);

    assert!(html.contains(r#"<a href="/q?x=&quot;1&quot;">a &lt; b &amp; c</a>"#));
}

#[test]
fn render_then_parse_reproduces_the_document() {
    let doc = Document::new(vec![
        element(NodeKind::FeaturedImage, &[("mediaId", json!("7"))], Vec::new()),
        element(
            NodeKind::BlockWrapper,
            &[("indentation", json!("center"))],
            vec![Node::heading(2, "Title")],
        ),
        Node::block_wrapper(vec![element(
            NodeKind::Paragraph,
            &[],
            vec![
                Node::text("plain "),
                Node::marked_text(
                    "bold link",
                    marks(|m| {
                        m.bold = true;
                        m.link = Some("https://example.com".to_string());
                    }),
                ),
                Node::marked_text("x", marks(|m| m.code = true)),
            ],
        )]),
        Node::block_wrapper(vec![element(
            NodeKind::Image,
            &[
                ("src", json!("a.png")),
                ("caption", json!("Cap")),
                ("indentation", json!("center")),
            ],
            Vec::new(),
        )]),
        Node::block_wrapper(vec![element(
            NodeKind::BulletList,
            &[],
            vec![
                element(NodeKind::ListItem, &[], vec![Node::paragraph("one")]),
                element(NodeKind::ListItem, &[], vec![Node::paragraph("two")]),
            ],
        )]),
        Node::block_wrapper(vec![element(
            NodeKind::Blockquote,
            &[],
            vec![Node::paragraph("quoted")],
        )]),
        Node::block_wrapper(vec![element(
            NodeKind::CodeBlock,
            &[],
            vec![Node::text("fn main() {}")],
        )]),
    ]);

    let parsed = from_external(&to_external(&doc)).unwrap();

    assert_eq!(parsed, doc);
}

#[test]
fn bare_blocks_get_a_featured_image_and_wrappers() {
    let nodes = external(json!([
        { "tag": "p", "children": [{ "text": "loose" }] },
        { "text": "\n  " },
        { "tag": "h5", "children": [{ "text": "deep" }] }
    ]));

    let doc = from_external(&nodes).unwrap();

    assert_eq!(
        doc,
        Document::with_blocks(vec![Node::paragraph("loose"), Node::heading(3, "deep")])
    );
}

#[test]
fn an_empty_tree_becomes_a_blank_document() {
    assert_eq!(from_external(&[]).unwrap(), Document::blank());
}

#[test]
fn image_alignment_falls_back_to_classes() {
    let nodes = external(json!([
        { "tag": "img", "attrs": { "src": "a.png", "class": "editor-image editor-image-right" } },
        { "tag": "img", "attrs": { "src": "b.png", "class": "text-center", "data-caption": "B" } }
    ]));

    let doc = from_external(&nodes).unwrap();

    let first = doc.element_at_path(&[1, 0]).unwrap();
    assert_eq!(first.attr_str("indentation").as_deref(), Some("right"));
    let second = doc.element_at_path(&[2, 0]).unwrap();
    assert_eq!(second.attr_str("indentation").as_deref(), Some("center"));
    assert_eq!(second.attr_str("caption").as_deref(), Some("B"));
}

#[test]
fn unknown_markup_is_rejected() {
    let err = from_external(&external(json!([{ "tag": "table" }]))).unwrap_err();
    assert!(matches!(err, ExternalFormatError::UnknownTag(tag) if tag == "table"));

    let err = from_external(&external(json!([
        { "tag": "p", "children": [{ "tag": "blink", "children": [{ "text": "x" }] }] }
    ])))
    .unwrap_err();
    assert!(matches!(err, ExternalFormatError::UnknownTag(tag) if tag == "blink"));

    let err = from_external(&external(json!([
        { "tag": "p", "children": [{ "tag": "a", "children": [{ "text": "x" }] }] }
    ])))
    .unwrap_err();
    assert!(matches!(err, ExternalFormatError::InvalidAttr { attr, .. } if attr == "href"));
}

#[test]
fn invalid_wrapper_indentation_is_rejected() {
    let nodes = external(json!([
        { "tag": "div", "attrs": { "data-type": "block-wrapper", "data-indentation": "up" } }
    ]));

    let err = from_external(&nodes).unwrap_err();

    assert!(matches!(err, ExternalFormatError::InvalidAttr { .. }));
}
