use blockdoc_core::{
    CommandError, Document, Editor, ElementNode, Indentation, InputEvent, KeyChord, Node,
    NodeKind, PluginRegistry, Selection,
};
use serde_json::json;

fn element(editor: &Editor, path: &[usize]) -> ElementNode {
    editor
        .doc()
        .element_at_path(path)
        .cloned()
        .unwrap_or_else(|| panic!("expected an element at {path:?}"))
}

#[test]
fn indentation_set_targets_the_enclosing_wrapper() {
    let mut editor = Editor::new(
        Document::with_blocks(vec![Node::paragraph("centered")]),
        Selection::caret(5),
        PluginRegistry::standard(),
    );

    editor
        .run_command("indentation.set", Some(json!({ "indentation": "center" })))
        .unwrap();

    assert_eq!(element(&editor, &[1]).indentation(), Some(Indentation::Center));
    assert_eq!(element(&editor, &[1]).attr_str("indentation").as_deref(), Some("center"));
    // The paragraph keeps its own (default) alignment.
    assert!(element(&editor, &[1, 0]).attrs.get("indentation").is_none());
}

#[test]
fn indentation_set_rejects_unknown_values() {
    let mut editor = Editor::with_standard_plugins();
    let version = editor.version();

    let err = editor
        .run_command("indentation.set", Some(json!({ "indentation": "justify" })))
        .unwrap_err();

    assert!(matches!(err, CommandError::InvalidOperand(_)));
    assert_eq!(editor.version(), version);
    assert!(element(&editor, &[1]).attrs.get("indentation").is_none());
}

#[test]
fn indentation_keys_align_the_block() {
    let mut editor = Editor::with_standard_plugins();

    assert!(editor.handle_key(&KeyChord::with_mod("r").shift()));
    assert_eq!(element(&editor, &[1]).indentation(), Some(Indentation::Right));

    assert!(editor.handle_key(&KeyChord::parse("Mod-Shift-e").unwrap()));
    assert_eq!(element(&editor, &[1]).indentation(), Some(Indentation::Center));

    assert!(editor.handle_key(&KeyChord::parse("Mod-Shift-l").unwrap()));
    assert_eq!(element(&editor, &[1]).indentation(), Some(Indentation::Left));
}

#[test]
fn indentation_covers_every_wrapper_in_the_selection() {
    let mut editor = Editor::new(
        Document::with_blocks(vec![
            Node::paragraph("ab"),
            Node::paragraph("cd"),
            Node::paragraph("ef"),
        ]),
        Selection::text(4, 10),
        PluginRegistry::standard(),
    );

    editor
        .run_command("indentation.set", Some(json!({ "indentation": "right" })))
        .unwrap();

    assert_eq!(element(&editor, &[1]).indentation(), Some(Indentation::Right));
    assert_eq!(element(&editor, &[2]).indentation(), Some(Indentation::Right));
    assert!(element(&editor, &[3]).attrs.get("indentation").is_none());
}

#[test]
fn images_follow_their_wrapper_alignment() {
    // [featured, wrapper[p("cap"), image]]
    let doc = Document::new(vec![
        Node::featured_image(),
        Node::block_wrapper(vec![Node::paragraph("cap"), Node::image("a.png")]),
    ]);
    let mut editor = Editor::new(doc, Selection::caret(4), PluginRegistry::standard());

    editor
        .run_command("indentation.set", Some(json!({ "indentation": "center" })))
        .unwrap();

    assert_eq!(element(&editor, &[1]).indentation(), Some(Indentation::Center));
    let image = element(&editor, &[1, 1]);
    assert_eq!(image.kind, NodeKind::Image);
    assert_eq!(image.attr_str("indentation").as_deref(), Some("center"));

    // Alignment and the image sync come back as one undo step.
    assert!(editor.undo());
    assert!(element(&editor, &[1]).attrs.get("indentation").is_none());
    assert!(element(&editor, &[1, 1]).attrs.get("indentation").is_none());
    assert!(!editor.can_undo());
}

#[test]
fn set_alignment_on_a_selected_image_aligns_its_wrapper_too() {
    let doc = Document::with_blocks(vec![Node::paragraph("intro"), Node::image("a.png")]);
    let mut editor = Editor::new(doc, Selection::caret(3), PluginRegistry::standard());
    assert!(editor.handle_event(&InputEvent::Click { pos: 11 }));

    editor
        .run_command("image.set_alignment", Some(json!({ "alignment": "right" })))
        .unwrap();

    assert_eq!(element(&editor, &[2]).indentation(), Some(Indentation::Right));
    assert_eq!(element(&editor, &[2, 0]).indentation(), Some(Indentation::Right));
    assert!(element(&editor, &[1]).attrs.get("indentation").is_none());
}
