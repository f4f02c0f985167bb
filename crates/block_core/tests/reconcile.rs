use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use blockdoc_core::{
    CommandError, CommandSpec, Document, Draft, Editor, EditorPlugin, InputEvent, KeyBinding,
    KeyChord, Node, PluginRegistry, Reconciler, RegistryError, Selection, StepError,
};
use serde_json::json;

struct CountingReconciler(Arc<AtomicUsize>);

impl Reconciler for CountingReconciler {
    fn id(&self) -> &'static str {
        "test.counting"
    }

    fn reconcile(&self, _editor: &Editor) -> Result<Option<Draft>, StepError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}

struct CountingPlugin(Arc<AtomicUsize>);

impl EditorPlugin for CountingPlugin {
    fn id(&self) -> &'static str {
        "counting"
    }

    fn reconcilers(&self) -> Vec<Box<dyn Reconciler>> {
        vec![Box::new(CountingReconciler(self.0.clone()))]
    }
}

struct SwallowEnter(Arc<AtomicUsize>);

impl EditorPlugin for SwallowEnter {
    fn id(&self) -> &'static str {
        "swallow_enter"
    }

    fn keymap(&self) -> Vec<KeyBinding> {
        let seen = self.0.clone();
        vec![KeyBinding::new(KeyChord::key("Enter"), 1000, move |_editor| {
            seen.fetch_add(1, Ordering::SeqCst);
            true
        })]
    }
}

struct Shadow;

impl EditorPlugin for Shadow {
    fn id(&self) -> &'static str {
        "shadow"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![CommandSpec::new("indentation.set", "Shadow", |_editor, _args| {
            Err(CommandError::not_applicable("never"))
        })]
    }
}

fn with_plugin(plugin: Box<dyn EditorPlugin>) -> PluginRegistry {
    let mut registry = PluginRegistry::standard();
    registry.register_plugin(plugin).unwrap();
    registry
}

#[test]
fn reconcilers_run_only_after_document_changes() {
    let runs = Arc::new(AtomicUsize::new(0));
    let registry = with_plugin(Box::new(CountingPlugin(runs.clone())));
    let mut editor = Editor::new(Document::blank(), Selection::caret(3), registry);
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    editor.handle_event(&InputEvent::Click { pos: 3 });
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    editor.handle_event(&InputEvent::TextInput {
        text: "a".to_string(),
    });
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    assert_eq!(editor.flush(), 0);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn higher_priority_key_handlers_win() {
    let seen = Arc::new(AtomicUsize::new(0));
    let registry = with_plugin(Box::new(SwallowEnter(seen.clone())));
    let mut editor = Editor::new(
        Document::with_blocks(vec![Node::paragraph("abc")]),
        Selection::caret(4),
        registry,
    );

    assert!(editor.handle_key(&KeyChord::key("Enter")));

    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(editor.doc().wrapper_count(), 1);
    assert_eq!(editor.doc().text_content(), "abc");
}

#[test]
fn registering_twice_is_rejected() {
    let mut registry = PluginRegistry::standard();

    let err = registry
        .register_plugin(Box::new(CountingPlugin(Arc::default())))
        .and_then(|_| registry.register_plugin(Box::new(CountingPlugin(Arc::default()))))
        .unwrap_err();
    assert_eq!(err, RegistryError::DuplicatePlugin("counting".to_string()));

    let err = registry.register_plugin(Box::new(Shadow)).unwrap_err();
    assert_eq!(err, RegistryError::DuplicateCommand("indentation.set".to_string()));
}

#[test]
fn unknown_commands_and_queries_are_reported() {
    let mut editor = Editor::with_standard_plugins();

    let err = editor.run_command("table.insert", None).unwrap_err();
    assert_eq!(err, CommandError::Unknown("table.insert".to_string()));
    assert!(editor.run_query_json("table.cells", None).is_err());
}

#[test]
fn blank_paragraphs_are_cleaned_up_once_the_cursor_leaves() {
    // wrapper[p("x") 2..5, p("") 5..7, p("y") 7..10]
    let doc = Document::new(vec![
        Node::featured_image(),
        Node::block_wrapper(vec![
            Node::paragraph("x"),
            Node::empty_paragraph(),
            Node::paragraph("y"),
        ]),
    ]);
    let mut editor = Editor::new(doc.clone(), Selection::caret(6), PluginRegistry::standard());

    // The blank paragraph under the cursor survives an edit.
    editor
        .run_command("indentation.set", Some(json!({ "indentation": "center" })))
        .unwrap();
    let wrapper = editor.doc().element_at_path(&[1]).unwrap();
    assert_eq!(wrapper.children.len(), 3);

    editor.set_selection(Selection::caret(3));
    editor.handle_event(&InputEvent::TextInput {
        text: "a".to_string(),
    });

    let wrapper = editor.doc().element_at_path(&[1]).unwrap();
    let texts: Vec<String> = wrapper.children.iter().map(Node::text_content).collect();
    assert_eq!(texts, vec!["ax", "y"]);
    assert_eq!(editor.selection(), Selection::caret(4));
    assert_eq!(editor.flush(), 0);

    // Typing and the cleanup undo together.
    assert!(editor.undo());
    let wrapper = editor.doc().element_at_path(&[1]).unwrap();
    assert_eq!(wrapper.children.len(), 3);
    assert_eq!(wrapper.text_content(), "xy");
}

#[test]
fn undo_does_not_rerun_reconcilers() {
    let runs = Arc::new(AtomicUsize::new(0));
    let registry = with_plugin(Box::new(CountingPlugin(runs.clone())));
    let mut editor = Editor::new(Document::blank(), Selection::caret(3), registry);
    editor.handle_event(&InputEvent::TextInput {
        text: "a".to_string(),
    });
    let after_edit = runs.load(Ordering::SeqCst);

    assert!(editor.undo());
    assert_eq!(editor.flush(), 0);

    assert_eq!(runs.load(Ordering::SeqCst), after_edit);
}
