use blockdoc_core::{
    CommandError, Document, Editor, Indentation, Node, NodeKind, PluginRegistry, Selection,
};
use serde_json::json;

fn editor_with(doc: Document, caret: usize) -> Editor {
    Editor::new(doc, Selection::caret(caret), PluginRegistry::standard())
}

fn wrapper_texts(editor: &Editor) -> Vec<String> {
    editor
        .doc()
        .children()
        .iter()
        .filter(|node| node.kind() == NodeKind::BlockWrapper)
        .map(Node::text_content)
        .collect()
}

#[test]
fn move_down_swaps_wrappers_and_carries_the_caret() {
    let mut editor = editor_with(
        Document::with_blocks(vec![Node::paragraph("a"), Node::paragraph("b")]),
        3,
    );

    editor.run_command("block_wrapper.move_down", None).unwrap();

    assert_eq!(wrapper_texts(&editor), vec!["b", "a"]);
    // [p("b")] spans 1..6, so "a" now starts at 8.
    assert_eq!(editor.selection(), Selection::caret(8));

    editor.run_command("block_wrapper.move_up", None).unwrap();
    assert_eq!(wrapper_texts(&editor), vec!["a", "b"]);
    assert_eq!(editor.selection(), Selection::caret(3));
}

#[test]
fn the_first_wrapper_cannot_move_above_the_featured_image() {
    let mut editor = editor_with(Document::with_blocks(vec![Node::paragraph("a")]), 3);

    let err = editor
        .run_command("block_wrapper.move_up", None)
        .unwrap_err();
    assert!(matches!(err, CommandError::NotApplicable(_)));

    let err = editor
        .run_command("block_wrapper.move_down", None)
        .unwrap_err();
    assert!(matches!(err, CommandError::NotApplicable(_)));
}

#[test]
fn insert_between_top_level_blocks() {
    let mut editor = editor_with(Document::with_blocks(vec![Node::paragraph("a")]), 3);

    editor
        .run_command("block_wrapper.insert", Some(json!({ "pos": 1 })))
        .unwrap();

    assert_eq!(wrapper_texts(&editor), vec!["", "a"]);
    assert_eq!(editor.selection(), Selection::caret(3));

    let err = editor
        .run_command("block_wrapper.insert", Some(json!({ "pos": 0 })))
        .unwrap_err();
    assert!(matches!(err, CommandError::InvalidOperand(_)));

    let err = editor
        .run_command("block_wrapper.insert", Some(json!({ "pos": 3 })))
        .unwrap_err();
    assert!(matches!(err, CommandError::InvalidOperand(_)));
}

#[test]
fn insert_above_and_below_the_current_block() {
    let mut editor = editor_with(Document::with_blocks(vec![Node::paragraph("mid")]), 4);

    editor.run_command("block_wrapper.insert_below", None).unwrap();
    assert_eq!(wrapper_texts(&editor), vec!["mid", ""]);
    // [p("mid")] spans 1..8
    assert_eq!(editor.selection(), Selection::caret(10));

    editor
        .run_command("block_wrapper.insert_above", Some(json!({ "pos": 4 })))
        .unwrap();
    assert_eq!(wrapper_texts(&editor), vec!["", "mid", ""]);
    assert_eq!(editor.selection(), Selection::caret(3));
}

#[test]
fn wrap_gives_the_current_block_its_own_wrapper() {
    // wrapper 1: a (3..4), b (6..7), c (9..10)
    let doc = Document::new(vec![
        Node::featured_image(),
        Node::block_wrapper(vec![
            Node::paragraph("a"),
            Node::paragraph("b"),
            Node::paragraph("c"),
        ]),
    ]);
    let mut editor = editor_with(doc, 6);

    editor.run_command("block_wrapper.wrap", None).unwrap();

    assert_eq!(
        editor.doc(),
        &Document::with_blocks(vec![
            Node::paragraph("a"),
            Node::paragraph("b"),
            Node::paragraph("c"),
        ])
    );
    assert_eq!(editor.selection(), Selection::caret(8));
}

#[test]
fn wrap_keeps_a_single_block_wrapper_unchanged() {
    let mut editor = editor_with(Document::with_blocks(vec![Node::paragraph("a")]), 3);
    let version = editor.version();

    editor.run_command("block_wrapper.wrap", None).unwrap();

    assert_eq!(editor.version(), version);
}

#[test]
fn set_indentation_targets_the_wrapper_at_a_position() {
    let mut editor = editor_with(
        Document::with_blocks(vec![Node::paragraph("a"), Node::paragraph("b")]),
        3,
    );

    editor
        .run_command(
            "block_wrapper.set_indentation",
            Some(json!({ "indentation": "right", "pos": 8 })),
        )
        .unwrap();

    let first = editor.doc().element_at_path(&[1]).unwrap();
    let second = editor.doc().element_at_path(&[2]).unwrap();
    assert_eq!(first.indentation(), Some(Indentation::Left));
    assert_eq!(second.indentation(), Some(Indentation::Right));
}

#[test]
fn normalization_wraps_bare_top_level_blocks() {
    let doc = Document::new(vec![Node::featured_image(), Node::paragraph("loose")]);
    let editor = editor_with(doc, 2);

    assert_eq!(
        editor.doc(),
        &Document::with_blocks(vec![Node::paragraph("loose")])
    );
}
