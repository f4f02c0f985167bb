use blockdoc_core::{
    CommandError, Document, Editor, Node, Op, PluginRegistry, Selection, StepError, Transaction,
};

fn editor() -> Editor {
    Editor::new(
        Document::with_blocks(vec![Node::paragraph("abc"), Node::paragraph("def")]),
        Selection::caret(4),
        PluginRegistry::standard(),
    )
}

#[test]
fn a_failing_op_rolls_back_the_whole_transaction() {
    let mut editor = editor();
    let before = editor.doc().clone();
    let version = editor.version();

    let mut tx = Transaction::new(vec![
        Op::InsertText {
            path: vec![1, 0, 0],
            offset: 1,
            text: "X".to_string(),
        },
        Op::RemoveNode { path: vec![9] },
    ]);
    tx.selection_after = Some(Selection::caret(5));

    assert!(editor.apply(tx).is_err());

    assert_eq!(editor.doc(), &before);
    assert_eq!(editor.selection(), Selection::caret(4));
    assert_eq!(editor.version(), version);
    assert!(!editor.undo());
}

#[test]
fn a_failing_primitive_discards_the_draft() {
    let mut editor = editor();
    let before = editor.doc().clone();
    let version = editor.version();

    let result = editor.transact(|draft| {
        let end = draft.insert_text(4, "zz")?;
        draft.set_selection(Selection::caret(end));
        draft.delete_range(3, 999)?;
        Ok::<_, StepError>(())
    });

    assert!(result.is_err());
    assert_eq!(editor.doc(), &before);
    assert_eq!(editor.selection(), Selection::caret(4));
    assert_eq!(editor.version(), version);
    assert!(!editor.undo());
}

#[test]
fn commands_report_aborted_transactions() {
    let mut editor = editor();
    let before = editor.doc().clone();

    let err = editor
        .transact(|draft| {
            draft.insert_text(4, "zz")?;
            draft.delete_range(3, 999)?;
            Ok::<_, CommandError>(())
        })
        .unwrap_err();

    assert!(matches!(err, CommandError::Aborted(_)));
    assert_eq!(editor.doc(), &before);
    assert!(!editor.can_undo());
}

#[test]
fn drafts_taken_before_another_commit_are_stale() {
    let mut editor = editor();
    let mut stale = editor.draft();
    stale.insert_text(4, "late").unwrap();

    editor
        .transact(|draft| {
            draft.insert_text(4, "first")?;
            Ok::<_, StepError>(())
        })
        .unwrap();
    let after_first = editor.doc().clone();

    let err = editor.commit(stale).unwrap_err();

    assert!(matches!(err, StepError::StaleDraft { .. }));
    assert_eq!(editor.doc(), &after_first);
}
