use blockdoc_core::{
    Attrs, Document, Editor, InputEvent, KeyChord, Node, NodeKind, PluginRegistry, Selection,
    describe_structure, find_nodes, is_kind, validate_document,
};
use proptest::prelude::*;
use serde_json::json;

#[derive(Debug, Clone)]
enum Action {
    Type(String),
    Key(&'static str),
    Indent(&'static str),
    Command(&'static str),
    Slash(&'static str),
    /// Text range between two fractions of the document size.
    SelectRange(u8, u8),
    /// Node selection over the n-th image, if any.
    SelectImage(usize),
    ImageAlignment(&'static str),
    Undo,
    Redo,
}

fn indentation() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("left"), Just("center"), Just("right")]
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        4 => "[a-c /]{1,3}".prop_map(Action::Type),
        2 => Just(Action::Key("Enter")),
        2 => Just(Action::Key("Backspace")),
        1 => Just(Action::Key("ArrowLeft")),
        1 => Just(Action::Key("ArrowRight")),
        1 => Just(Action::Key("Mod-a")),
        1 => Just(Action::Key("Mod-b")),
        1 => indentation().prop_map(Action::Indent),
        1 => prop_oneof![
            Just("block_wrapper.insert_below"),
            Just("block_wrapper.move_down"),
            Just("block_wrapper.move_up"),
            Just("block_wrapper.wrap"),
            Just("heading.set"),
            Just("paragraph.set"),
            Just("code_block.toggle"),
            Just("blockquote.toggle"),
            Just("bullet_list.toggle"),
            Just("ordered_list.toggle"),
        ]
        .prop_map(Action::Command),
        1 => prop_oneof![
            Just("image"),
            Just("heading1"),
            Just("bullet_list"),
            Just("numbered_list"),
            Just("code_block"),
            Just("blockquote"),
        ]
        .prop_map(Action::Slash),
        2 => (any::<u8>(), any::<u8>()).prop_map(|(a, b)| Action::SelectRange(a, b)),
        1 => (0usize..3).prop_map(Action::SelectImage),
        1 => indentation().prop_map(Action::ImageAlignment),
        1 => Just(Action::Undo),
        1 => Just(Action::Redo),
    ]
}

fn seed() -> Document {
    let mut image = Attrs::new();
    image.insert("src".to_string(), json!("a.png"));
    image.insert("caption".to_string(), json!("Harbour"));
    image.insert("indentation".to_string(), json!("right"));
    Document::with_blocks(vec![
        Node::heading(2, "Title"),
        Node::paragraph("seed text"),
        Node::element(NodeKind::Image, image, Vec::new()),
        Node::element(
            NodeKind::BulletList,
            Attrs::new(),
            vec![
                Node::element(NodeKind::ListItem, Attrs::new(), vec![Node::paragraph("one")]),
                Node::element(NodeKind::ListItem, Attrs::new(), vec![Node::paragraph("two")]),
            ],
        ),
        Node::element(
            NodeKind::Blockquote,
            Attrs::new(),
            vec![Node::paragraph("quoted")],
        ),
        Node::element(NodeKind::CodeBlock, Attrs::new(), vec![Node::text("let x = 1;")]),
    ])
}

fn scaled(fraction: u8, size: usize) -> usize {
    size * usize::from(fraction) / usize::from(u8::MAX)
}

fn run(editor: &mut Editor, action: &Action) {
    match action {
        Action::Type(text) => {
            editor.handle_event(&InputEvent::TextInput { text: text.clone() });
        }
        Action::Key(chord) => {
            editor.handle_key(&KeyChord::parse(chord).unwrap());
        }
        Action::Indent(value) => {
            let _ = editor.run_command("indentation.set", Some(json!({ "indentation": value })));
        }
        Action::Command(id) => {
            let _ = editor.run_command(id, None);
        }
        Action::Slash(item) => {
            let _ = editor.run_command("slash.execute", Some(json!({ "action": item })));
        }
        Action::SelectRange(a, b) => {
            let size = editor.doc().content_size();
            editor.set_selection(Selection::text(scaled(*a, size), scaled(*b, size)));
        }
        Action::SelectImage(n) => {
            let pos = find_nodes(editor.doc(), is_kind(NodeKind::Image), None)
                .get(*n)
                .map(|found| found.pos);
            if let Some(selection) = pos.and_then(|pos| Selection::node(editor.doc(), pos)) {
                editor.set_selection(selection);
            }
        }
        Action::ImageAlignment(value) => {
            let _ = editor.run_command("image.set_alignment", Some(json!({ "alignment": value })));
        }
        Action::Undo => {
            editor.undo();
        }
        Action::Redo => {
            editor.redo();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn every_edit_leaves_a_valid_document(actions in prop::collection::vec(action(), 1..40)) {
        let mut editor = Editor::new(seed(), Selection::caret(3), PluginRegistry::standard());
        prop_assert!(validate_document(editor.doc()).is_ok());

        for action in &actions {
            run(&mut editor, action);

            prop_assert!(
                validate_document(editor.doc()).is_ok(),
                "invalid after {:?}:\n{}",
                action,
                describe_structure(editor.doc())
            );
            let selection = editor.selection();
            prop_assert!(selection.to() <= editor.doc().content_size());
            prop_assert!(selection.from() <= selection.to());
            prop_assert_eq!(editor.flush(), 0);
        }
    }
}
