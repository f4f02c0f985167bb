use blockdoc_core::{
    Document, Editor, EditorConfig, InputEvent, KeyChord, Node, PluginRegistry, Selection,
};

fn type_text(editor: &mut Editor, text: &str) {
    assert!(editor.handle_event(&InputEvent::TextInput {
        text: text.to_string(),
    }));
}

#[test]
fn undo_and_redo_restore_document_and_selection() {
    let mut editor = Editor::with_standard_plugins();
    assert!(!editor.can_undo());

    type_text(&mut editor, "hello");
    assert!(editor.can_undo());
    assert_eq!(editor.selection(), Selection::caret(8));

    assert!(editor.undo());
    assert_eq!(editor.doc(), &Document::blank());
    assert_eq!(editor.selection(), Selection::caret(3));
    assert!(editor.can_redo());

    assert!(editor.redo());
    assert_eq!(editor.doc().text_content(), "hello");
    assert_eq!(editor.selection(), Selection::caret(8));
    assert!(!editor.can_redo());
}

#[test]
fn history_keys_drive_undo_and_redo() {
    let mut editor = Editor::with_standard_plugins();
    type_text(&mut editor, "a");
    type_text(&mut editor, "b");

    assert!(editor.handle_key(&KeyChord::with_mod("z")));
    assert_eq!(editor.doc().text_content(), "a");

    assert!(editor.handle_key(&KeyChord::with_mod("z").shift()));
    assert_eq!(editor.doc().text_content(), "ab");

    assert!(editor.handle_key(&KeyChord::with_mod("z")));
    assert!(editor.handle_key(&KeyChord::with_mod("y")));
    assert_eq!(editor.doc().text_content(), "ab");

    assert!(editor.handle_key(&KeyChord::with_mod("z")));
    assert!(editor.handle_key(&KeyChord::with_mod("z")));
    assert!(!editor.handle_key(&KeyChord::with_mod("z")));
    assert_eq!(editor.doc(), &Document::blank());
}

#[test]
fn a_new_edit_clears_redo() {
    let mut editor = Editor::with_standard_plugins();
    type_text(&mut editor, "a");
    assert!(editor.undo());
    assert!(editor.can_redo());

    type_text(&mut editor, "b");

    assert!(!editor.can_redo());
    assert_eq!(editor.doc().text_content(), "b");
}

#[test]
fn undo_reverts_structural_edits_in_one_step() {
    let mut editor = Editor::new(
        Document::with_blocks(vec![Node::paragraph("abcdef")]),
        Selection::caret(9),
        PluginRegistry::standard(),
    );
    let before = editor.doc().clone();

    assert!(editor.handle_key(&KeyChord::key("Enter")));
    assert_eq!(editor.doc().wrapper_count(), 2);

    assert!(editor.undo());
    assert_eq!(editor.doc(), &before);
    assert_eq!(editor.selection(), Selection::caret(9));
}

#[test]
fn selection_changes_are_not_recorded() {
    let mut editor = Editor::with_standard_plugins();
    type_text(&mut editor, "abc");

    assert!(editor.handle_key(&KeyChord::with_mod("a")));
    assert_eq!(editor.selection(), Selection::text(3, 6));

    assert!(editor.undo());
    assert!(!editor.can_undo());
}

#[test]
fn undo_depth_is_bounded() {
    let config = EditorConfig {
        max_undo: 2,
        ..Default::default()
    };
    let mut editor = Editor::with_config(
        Document::blank(),
        Selection::caret(3),
        PluginRegistry::standard(),
        config,
    );
    for ch in ["a", "b", "c"] {
        type_text(&mut editor, ch);
    }

    assert!(editor.undo());
    assert!(editor.undo());
    assert!(!editor.undo());
    assert_eq!(editor.doc().text_content(), "a");
}
