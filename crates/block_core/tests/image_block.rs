use blockdoc_core::{
    CommandError, Document, Editor, EditorEvent, FileInfo, InputEvent, Node, NodeKind,
    PluginRegistry, Selection,
};
use serde_json::json;

/// `[featured, wrapper[p("intro")], wrapper[image]]`, image at 11.
fn editor_with_image() -> Editor {
    let doc = Document::with_blocks(vec![Node::paragraph("intro"), Node::image("a.png")]);
    Editor::new(doc, Selection::caret(3), PluginRegistry::standard())
}

#[test]
fn clicking_an_image_selects_it() {
    let mut editor = editor_with_image();

    assert!(editor.handle_event(&InputEvent::Click { pos: 11 }));

    assert_eq!(editor.selection(), Selection::Node { from: 11, to: 12 });
    assert_eq!(
        editor.selection().selected_node(editor.doc()).map(|el| el.kind),
        Some(NodeKind::Image)
    );
}

#[test]
fn clicking_text_places_the_caret() {
    let mut editor = editor_with_image();

    assert!(editor.handle_event(&InputEvent::Click { pos: 5 }));

    assert_eq!(editor.selection(), Selection::caret(5));
}

#[test]
fn image_commands_need_a_selected_image() {
    let mut editor = editor_with_image();

    let err = editor
        .run_command("image.set_alignment", Some(json!({ "alignment": "center" })))
        .unwrap_err();
    assert!(matches!(err, CommandError::InvalidOperand(_)));

    let err = editor
        .run_command("image.set_caption", Some(json!({ "caption": "x" })))
        .unwrap_err();
    assert!(matches!(err, CommandError::InvalidOperand(_)));
}

#[test]
fn caption_input_updates_the_image() {
    let mut editor = editor_with_image();

    assert!(editor.handle_event(&InputEvent::CaptionInput {
        pos: 11,
        caption: "Harbour at dawn".to_string(),
    }));

    let image = editor.doc().element_at_path(&[2, 0]).unwrap();
    assert_eq!(image.attr_str("caption").as_deref(), Some("Harbour at dawn"));
    assert_eq!(image.attr_str("src").as_deref(), Some("a.png"));
}

#[test]
fn caption_input_away_from_an_image_is_ignored() {
    let mut editor = editor_with_image();
    let before = editor.doc().clone();

    assert!(!editor.handle_event(&InputEvent::CaptionInput {
        pos: 3,
        caption: "nope".to_string(),
    }));
    assert_eq!(editor.doc(), &before);
}

#[test]
fn set_caption_on_the_selected_image() {
    let mut editor = editor_with_image();
    editor.handle_event(&InputEvent::Click { pos: 11 });

    editor
        .run_command("image.set_caption", Some(json!({ "caption": "A quiet harbour" })))
        .unwrap();

    let image = editor.doc().element_at_path(&[2, 0]).unwrap();
    assert_eq!(image.attr_str("caption").as_deref(), Some("A quiet harbour"));
}

#[test]
fn dropping_an_image_file_requests_an_upload() {
    let mut editor = editor_with_image();
    let photo = FileInfo::new("photo.png", "image/png");

    assert!(editor.handle_event(&InputEvent::Drop {
        pos: Some(3),
        files: vec![FileInfo::new("notes.txt", "text/plain"), photo.clone()],
    }));

    assert_eq!(
        editor.take_events(),
        vec![EditorEvent::ImageUploadRequested { file: photo }]
    );
    assert!(editor.take_events().is_empty());
}

#[test]
fn dropping_other_files_is_not_handled() {
    let mut editor = editor_with_image();

    assert!(!editor.handle_event(&InputEvent::Drop {
        pos: None,
        files: vec![FileInfo::new("notes.txt", "text/plain")],
    }));
    assert!(editor.take_events().is_empty());
}

#[test]
fn pasting_an_image_requests_an_upload() {
    let mut editor = editor_with_image();
    let shot = FileInfo::new("shot.jpeg", "image/jpeg");

    assert!(editor.handle_event(&InputEvent::Paste {
        files: vec![shot.clone()],
        text: None,
    }));

    assert_eq!(
        editor.take_events(),
        vec![EditorEvent::ImageUploadRequested { file: shot }]
    );
}

#[test]
fn insert_adds_a_wrapper_below_and_selects_the_image() {
    let mut editor = Editor::new(
        Document::with_blocks(vec![Node::paragraph("intro"), Node::paragraph("outro")]),
        Selection::caret(4),
        PluginRegistry::standard(),
    );

    editor
        .run_command(
            "image.insert",
            Some(json!({ "src": "https://example.com/a.png", "alt": "A" })),
        )
        .unwrap();

    assert_eq!(editor.doc().children().len(), 4);
    let image = editor.doc().element_at_path(&[2, 0]).unwrap();
    assert_eq!(image.kind, NodeKind::Image);
    assert_eq!(image.attr_str("alt").as_deref(), Some("A"));
    assert_eq!(editor.doc().element_at_path(&[3, 0]).unwrap().text_content(), "outro");
    assert_eq!(editor.selection(), Selection::Node { from: 11, to: 12 });
}

#[test]
fn insert_rejects_an_empty_src() {
    let mut editor = editor_with_image();

    let err = editor
        .run_command("image.insert", Some(json!({ "src": "  " })))
        .unwrap_err();
    assert!(matches!(err, CommandError::InvalidOperand(_)));
}
