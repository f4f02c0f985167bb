use std::time::Duration;

use blockdoc_core::{
    Document, Editor, EditorConfig, ExternalFormatError, InputEvent, Node, StoredDocument,
};

#[test]
fn snapshots_wait_for_the_debounce_period() {
    let mut editor = Editor::with_standard_plugins();
    assert!(editor.persist_deadline().is_none());

    editor.handle_event(&InputEvent::TextInput {
        text: "draft".to_string(),
    });
    let deadline = editor.persist_deadline().unwrap();

    assert!(editor.poll_persist(deadline - Duration::from_millis(1)).is_none());

    let saved = editor.poll_persist(deadline).unwrap();
    assert_eq!(saved.text_content(), "draft");

    // One snapshot per quiet period.
    assert!(editor.poll_persist(deadline + Duration::from_secs(5)).is_none());
    assert!(editor.persist_deadline().is_none());
}

#[test]
fn selection_only_changes_do_not_schedule_a_snapshot() {
    let mut editor = Editor::with_standard_plugins();

    editor.handle_event(&InputEvent::Click { pos: 3 });

    assert!(editor.persist_deadline().is_none());
}

#[test]
fn config_reads_partial_json_and_fills_defaults() {
    let config = EditorConfig::from_json_str(r#"{ "persist_debounce_ms": 250, "max_undo": 0 }"#)
        .unwrap();

    assert_eq!(config.persist_debounce(), Duration::from_millis(250));
    assert_eq!(config.max_undo, EditorConfig::default().max_undo);
    assert_eq!(config.indentable_kinds, EditorConfig::default().indentable_kinds);
}

#[test]
fn stored_documents_round_trip_through_json() {
    let doc = Document::with_blocks(vec![Node::heading(2, "Title"), Node::paragraph("body")]);
    let stored = StoredDocument::from_document(doc.clone());

    let json = stored.to_json_pretty().unwrap();
    let loaded = StoredDocument::load(&json).unwrap();

    assert_eq!(loaded, doc);
    assert!(json.contains(r#""schema": "blockdoc""#));
    assert!(json.contains(r#""type": "blockWrapper""#));
}

#[test]
fn the_envelope_fields_are_optional() {
    let json = r#"{
        "document": {
            "type": "document",
            "content": [
                { "type": "featuredImage" },
                { "type": "blockWrapper", "content": [
                    { "type": "paragraph", "content": [{ "text": "hi" }] }
                ] }
            ]
        }
    }"#;

    let stored = StoredDocument::from_json_str(json).unwrap();

    assert_eq!(stored.version, 1);
    assert_eq!(stored.schema, "blockdoc");
    assert_eq!(
        stored.into_document(),
        Document::with_blocks(vec![Node::paragraph("hi")])
    );
}

#[test]
fn loading_rejects_documents_that_break_the_schema() {
    let json = r#"{
        "document": {
            "type": "document",
            "content": [
                { "type": "blockWrapper", "content": [{ "type": "paragraph" }] }
            ]
        }
    }"#;

    let err = StoredDocument::load(json).unwrap_err();

    assert!(matches!(err, ExternalFormatError::Schema(_)));
}

#[test]
fn loading_rejects_foreign_or_newer_envelopes() {
    let body = r#""document": {
        "type": "document",
        "content": [
            { "type": "featuredImage" },
            { "type": "blockWrapper", "content": [{ "type": "paragraph" }] }
        ]
    }"#;

    let newer = format!(r#"{{ "schema": "blockdoc", "version": 2, {body} }}"#);
    let err = StoredDocument::load(&newer).unwrap_err();
    assert!(matches!(err, ExternalFormatError::UnsupportedEnvelope { version: 2, .. }));

    let foreign = format!(r#"{{ "schema": "other", {body} }}"#);
    let err = StoredDocument::load(&foreign).unwrap_err();
    assert!(matches!(
        err,
        ExternalFormatError::UnsupportedEnvelope { ref schema, .. } if schema == "other"
    ));

    let current = format!(r#"{{ "schema": "blockdoc", "version": 1, {body} }}"#);
    assert_eq!(StoredDocument::load(&current).unwrap(), Document::blank());
}
