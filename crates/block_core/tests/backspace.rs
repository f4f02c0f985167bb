use blockdoc_core::{Document, Editor, KeyChord, Node, NodeKind, PluginRegistry, Selection};

fn editor_with(doc: Document, caret: usize) -> Editor {
    Editor::new(doc, Selection::caret(caret), PluginRegistry::standard())
}

fn backspace(editor: &mut Editor) -> bool {
    editor.handle_key(&KeyChord::key("Backspace"))
}

#[test]
fn backspace_in_the_only_blank_block_resets_it() {
    let mut editor = Editor::with_standard_plugins();

    assert!(backspace(&mut editor));

    assert_eq!(editor.doc(), &Document::blank());
    assert_eq!(editor.selection(), Selection::caret(3));
}

#[test]
fn backspace_in_a_blank_sole_paragraph_removes_its_wrapper() {
    let mut editor = editor_with(
        Document::with_blocks(vec![Node::paragraph("hello"), Node::empty_paragraph()]),
        12,
    );

    assert!(backspace(&mut editor));

    assert_eq!(editor.doc(), &Document::with_blocks(vec![Node::paragraph("hello")]));
    assert_eq!(editor.selection(), Selection::caret(8));
}

#[test]
fn backspace_in_a_blank_paragraph_next_to_siblings_removes_only_the_paragraph() {
    let doc = Document::new(vec![
        Node::featured_image(),
        Node::block_wrapper(vec![Node::paragraph("x"), Node::empty_paragraph()]),
    ]);
    let mut editor = editor_with(doc, 6);

    assert!(backspace(&mut editor));

    assert_eq!(editor.doc(), &Document::with_blocks(vec![Node::paragraph("x")]));
    assert_eq!(editor.selection(), Selection::caret(4));
}

#[test]
fn backspace_inside_text_deletes_one_character() {
    let mut editor = editor_with(Document::with_blocks(vec![Node::paragraph("abc")]), 5);

    assert!(backspace(&mut editor));

    assert_eq!(editor.doc().text_content(), "ac");
    assert_eq!(editor.selection(), Selection::caret(4));
}

#[test]
fn backspace_at_block_start_joins_with_the_previous_block() {
    let mut editor = editor_with(
        Document::with_blocks(vec![Node::paragraph("ab"), Node::paragraph("cd")]),
        9,
    );

    assert!(backspace(&mut editor));

    assert_eq!(editor.doc(), &Document::with_blocks(vec![Node::paragraph("abcd")]));
    assert_eq!(editor.selection(), Selection::caret(5));
}

#[test]
fn backspace_after_an_image_selects_it_first() {
    // wrappers: [p("intro")] 1..10, [image] 10..13, [p("after")] 13..22
    let doc = Document::with_blocks(vec![
        Node::paragraph("intro"),
        Node::image("a.png"),
        Node::paragraph("after"),
    ]);
    let mut editor = editor_with(doc.clone(), 15);

    assert!(backspace(&mut editor));

    assert_eq!(editor.doc(), &doc);
    assert!(editor.selection().is_node());
    assert_eq!(editor.selection().from(), 11);
    assert_eq!(
        editor.selection().selected_node(editor.doc()).map(|el| el.kind),
        Some(NodeKind::Image)
    );
}

#[test]
fn backspace_at_document_start_does_nothing() {
    let mut editor = editor_with(Document::with_blocks(vec![Node::paragraph("abc")]), 3);

    assert!(!backspace(&mut editor));
    assert_eq!(editor.doc().text_content(), "abc");
}

#[test]
fn backspace_deletes_a_selected_range() {
    let mut editor = editor_with(Document::with_blocks(vec![Node::paragraph("abcdef")]), 3);
    editor.set_selection(Selection::text(4, 7));

    assert!(backspace(&mut editor));

    assert_eq!(editor.doc().text_content(), "aef");
    assert_eq!(editor.selection(), Selection::caret(4));
}
