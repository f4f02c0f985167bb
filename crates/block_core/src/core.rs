use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::draft::Draft;
use crate::error::{CommandError, QueryError, StepError};
use crate::events::{EditorEvent, InputEvent, KeyChord};
use crate::node::{Document, Marks, NodeKind};
use crate::ops::{Mapping, Op, Transaction, apply_op};
use crate::plugin::PluginRegistry;
use crate::selection::{Selection, near_text};

#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub inverse_ops: Vec<Op>,
    pub selection_before: Selection,
    pub selection_after: Selection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub max_undo: usize,
    pub max_normalize_iterations: usize,
    /// Reconciler runs allowed per flush, per registered reconciler.
    pub max_reconcile_rounds: usize,
    pub persist_debounce_ms: u64,
    /// Kinds `set_indentation` may target, in fallback order.
    pub indentable_kinds: Vec<NodeKind>,
    /// Enter inside these kinds is left to other handlers.
    pub enter_ignored_kinds: Vec<NodeKind>,
    /// Enter inside these kinds inserts a fresh wrapper below.
    pub enter_exception_kinds: Vec<NodeKind>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_undo: 200,
            max_normalize_iterations: 100,
            max_reconcile_rounds: 8,
            persist_debounce_ms: 1000,
            indentable_kinds: vec![
                NodeKind::Heading,
                NodeKind::Paragraph,
                NodeKind::Image,
                NodeKind::Blockquote,
                NodeKind::CodeBlock,
                NodeKind::BlockWrapper,
            ],
            enter_ignored_kinds: vec![NodeKind::CodeBlock],
            enter_exception_kinds: vec![NodeKind::ListItem],
        }
    }
}

impl EditorConfig {
    /// Replaces zero limits with the defaults.
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.max_undo == 0 {
            self.max_undo = defaults.max_undo;
        }
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = defaults.max_normalize_iterations;
        }
        if self.max_reconcile_rounds == 0 {
            self.max_reconcile_rounds = defaults.max_reconcile_rounds;
        }
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(s).map(Self::with_defaults)
    }

    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum History {
    Record,
    /// Folds the commit into the previous undo record.
    Append,
}

pub struct Editor {
    doc: Document,
    selection: Selection,
    stored_marks: Option<Marks>,
    registry: PluginRegistry,
    config: EditorConfig,
    version: u64,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
    pending: VecDeque<usize>,
    events: Vec<EditorEvent>,
    last_edit: Option<Instant>,
    dispatch_depth: usize,
}

impl Editor {
    pub fn new(doc: Document, selection: Selection, registry: PluginRegistry) -> Self {
        Self::with_config(doc, selection, registry, EditorConfig::default())
    }

    pub fn with_config(
        doc: Document,
        selection: Selection,
        registry: PluginRegistry,
        config: EditorConfig,
    ) -> Self {
        let mut editor = Self {
            doc,
            selection,
            stored_marks: None,
            registry,
            config: config.with_defaults(),
            version: 0,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            pending: VecDeque::new(),
            events: Vec::new(),
            last_edit: None,
            dispatch_depth: 0,
        };
        editor.normalize_in_place();
        editor
    }

    /// A blank post with the caret in its first paragraph.
    pub fn with_standard_plugins() -> Self {
        Self::from_document(Document::blank())
    }

    /// Opens `doc` with the standard plugins and the caret at the start of
    /// the first textblock.
    pub fn from_document(doc: Document) -> Self {
        let caret = near_text(&doc, 0);
        Self::new(doc, Selection::caret(caret), PluginRegistry::standard())
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn stored_marks(&self) -> Option<&Marks> {
        self.stored_marks.as_ref()
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Bumped by every commit that changes the document.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection.repair(&self.doc);
        self.stored_marks = None;
    }

    pub fn set_stored_marks(&mut self, marks: Option<Marks>) {
        self.stored_marks = marks;
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// A working copy of the current state.
    pub fn draft(&self) -> Draft {
        Draft::new(
            self.doc.clone(),
            self.selection,
            self.stored_marks.clone(),
            self.version,
        )
    }

    /// Runs `f` against a fresh draft and commits it when `f` succeeds.
    /// On error nothing is committed.
    pub fn transact<T, E>(&mut self, f: impl FnOnce(&mut Draft) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StepError>,
    {
        let mut draft = self.draft();
        let out = f(&mut draft)?;
        self.commit(draft)?;
        Ok(out)
    }

    /// Makes a draft the current state: transforms, normalization,
    /// selection repair, undo history, then the deferred reconcilers.
    pub fn commit(&mut self, draft: Draft) -> Result<(), StepError> {
        self.commit_inner(draft, History::Record)?;
        if self.dispatch_depth == 0 {
            self.flush();
        }
        Ok(())
    }

    pub fn apply(&mut self, tx: Transaction) -> Result<(), StepError> {
        let mut draft = self.draft();
        for op in tx.ops {
            draft.apply(op)?;
        }
        if let Some(selection) = tx.selection_after {
            draft.set_selection(selection);
        }
        if let Some(source) = tx.meta.source {
            draft.set_source(source);
        }
        self.commit(draft)
    }

    fn commit_inner(&mut self, mut draft: Draft, history: History) -> Result<(), StepError> {
        if draft.base_version() != self.version {
            return Err(StepError::StaleDraft {
                draft: draft.base_version(),
                editor: self.version,
            });
        }
        for transform in self.registry.transaction_transforms() {
            transform.transform(self, &mut draft)?;
        }

        let parts = draft.into_parts();
        if parts.ops.is_empty() {
            let selection = parts.selection.repair(&self.doc);
            if parts.stored_marks_set {
                self.stored_marks = parts.stored_marks;
            } else if selection != self.selection {
                self.stored_marks = None;
            }
            self.selection = selection;
            return Ok(());
        }

        let mut doc = parts.doc;
        let mut inverse_ops = parts.inverse;
        let mut mapping = Mapping::new();
        self.normalize_doc(&mut doc, &mut inverse_ops, &mut mapping)?;
        inverse_ops.reverse();
        let selection = parts.selection.map(&mapping).repair(&doc);

        tracing::debug!(
            version = self.version + 1,
            ops = parts.ops.len(),
            source = parts.source.as_deref().unwrap_or(""),
            ?history,
            "commit"
        );

        match (history, self.undo_stack.last_mut()) {
            (History::Append, Some(last)) => {
                inverse_ops.append(&mut last.inverse_ops);
                last.inverse_ops = inverse_ops;
                last.selection_after = selection;
            }
            _ => {
                self.undo_stack.push(UndoRecord {
                    inverse_ops,
                    selection_before: self.selection,
                    selection_after: selection,
                });
                self.redo_stack.clear();
                if self.undo_stack.len() > self.config.max_undo {
                    self.undo_stack.remove(0);
                }
            }
        }

        self.doc = doc;
        self.selection = selection;
        self.stored_marks = if parts.stored_marks_set {
            parts.stored_marks
        } else {
            None
        };
        self.document_changed();
        Ok(())
    }

    fn document_changed(&mut self) {
        self.version += 1;
        self.last_edit = Some(Instant::now());
        for ix in 0..self.registry.reconcilers().len() {
            if !self.pending.contains(&ix) {
                self.pending.push_back(ix);
            }
        }
    }

    /// Normalizes `doc` until no pass finds anything. Inverses and position
    /// maps of the repair ops are appended to the given buffers.
    fn normalize_doc(
        &self,
        doc: &mut Document,
        inverse_ops: &mut Vec<Op>,
        mapping: &mut Mapping,
    ) -> Result<(), StepError> {
        for _ in 0..self.config.max_normalize_iterations {
            let Some((pass, ops)) = self.registry.normalize(doc) else {
                return Ok(());
            };
            tracing::debug!(pass, ops = ops.len(), "normalize");
            for op in ops {
                let (inverse, map) = apply_op(doc, op)?;
                inverse_ops.push(inverse);
                mapping.push(map);
            }
        }
        if self.registry.normalize(doc).is_none() {
            return Ok(());
        }
        tracing::warn!(
            iterations = self.config.max_normalize_iterations,
            "normalization did not converge"
        );
        Err(StepError::NormalizeDidNotConverge(
            self.config.max_normalize_iterations,
        ))
    }

    fn normalize_in_place(&mut self) {
        let mut doc = self.doc.clone();
        let mut mapping = Mapping::new();
        match self.normalize_doc(&mut doc, &mut Vec::new(), &mut mapping) {
            Ok(()) => {
                self.selection = self.selection.map(&mapping).repair(&doc);
                self.doc = doc;
            }
            Err(err) => {
                tracing::warn!(%err, "document left as loaded");
                self.selection = self.selection.repair(&self.doc);
            }
        }
    }

    /// Runs queued reconcilers until none has anything left to fix.
    /// Returns the number of reconciling commits.
    pub fn flush(&mut self) -> usize {
        let budget = self.config.max_reconcile_rounds * self.registry.reconcilers().len();
        let mut runs = 0;
        let mut commits = 0;
        while let Some(ix) = self.pending.pop_front() {
            if runs >= budget {
                tracing::warn!(runs, "reconcilers did not settle");
                self.pending.clear();
                break;
            }
            runs += 1;
            let Some(reconciler) = self.registry.reconcilers().get(ix) else {
                continue;
            };
            let id = reconciler.id();
            match reconciler.reconcile(self) {
                Ok(Some(draft)) if draft.doc_changed() => {
                    tracing::debug!(reconciler = id, ops = draft.ops().len(), "reconcile");
                    match self.commit_inner(draft, History::Append) {
                        Ok(()) => commits += 1,
                        Err(err) => tracing::warn!(reconciler = id, %err, "reconcile aborted"),
                    }
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(reconciler = id, %err, "reconcile failed"),
            }
        }
        commits
    }

    fn enter(&mut self) {
        self.dispatch_depth += 1;
    }

    fn leave(&mut self) {
        self.dispatch_depth -= 1;
        if self.dispatch_depth == 0 {
            self.flush();
        }
    }

    /// Offers `chord` to the bound key handlers, highest priority first.
    pub fn handle_key(&mut self, chord: &KeyChord) -> bool {
        self.enter();
        let mut handled = false;
        for handler in self.registry.key_handlers(chord) {
            if handler(self) {
                handled = true;
                break;
            }
        }
        tracing::debug!(%chord, handled, "key");
        self.leave();
        handled
    }

    pub fn handle_event(&mut self, event: &InputEvent) -> bool {
        self.enter();
        let mut handled = false;
        for handler in self.registry.event_handlers() {
            if handler(self, event) {
                handled = true;
                break;
            }
        }
        tracing::debug!(?event, handled, "input event");
        self.leave();
        handled
    }

    pub fn run_command(&mut self, id: &str, args: Option<Value>) -> Result<(), CommandError> {
        let Some(command) = self.registry.command(id) else {
            return Err(CommandError::Unknown(id.to_string()));
        };
        self.enter();
        let result = (command.handler)(self, args);
        if let Err(err) = &result {
            tracing::debug!(command = id, %err, "command failed");
        }
        self.leave();
        result
    }

    pub fn run_query_json(&self, id: &str, args: Option<Value>) -> Result<Value, QueryError> {
        let Some(query) = self.registry.query(id) else {
            return Err(QueryError::Unknown(id.to_string()));
        };
        (query.handler)(self, args)
    }

    pub fn run_query<T>(&self, id: &str, args: Option<Value>) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
    {
        let value = self.run_query_json(id, args)?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn emit(&mut self, event: EditorEvent) {
        tracing::debug!(?event, "emit");
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.events)
    }

    /// When the pending snapshot becomes due, if any.
    pub fn persist_deadline(&self) -> Option<Instant> {
        self.last_edit
            .map(|edit| edit + self.config.persist_debounce())
    }

    /// Returns a snapshot once the document has been quiet for the debounce
    /// period since its last change. At most one snapshot per quiet period.
    pub fn poll_persist(&mut self, now: Instant) -> Option<Document> {
        let deadline = self.persist_deadline()?;
        if now < deadline {
            return None;
        }
        self.last_edit = None;
        tracing::debug!(version = self.version, "persist");
        Some(self.doc.clone())
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };
        match self.replay(&record.inverse_ops, record.selection_before) {
            Some(redo_ops) => {
                self.redo_stack.push(UndoRecord {
                    inverse_ops: redo_ops,
                    ..record
                });
                true
            }
            None => {
                tracing::warn!("undo record no longer applies");
                false
            }
        }
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };
        match self.replay(&record.inverse_ops, record.selection_after) {
            Some(undo_ops) => {
                self.undo_stack.push(UndoRecord {
                    inverse_ops: undo_ops,
                    ..record
                });
                true
            }
            None => {
                tracing::warn!("redo record no longer applies");
                false
            }
        }
    }

    /// Applies history ops to a copy of the document. Returns the ops that
    /// revert them, or `None` (leaving the editor untouched) if any op fails.
    fn replay(&mut self, ops: &[Op], selection: Selection) -> Option<Vec<Op>> {
        let mut doc = self.doc.clone();
        let mut reverse = Vec::with_capacity(ops.len());
        for op in ops.iter().cloned() {
            let (inverse, _) = apply_op(&mut doc, op).ok()?;
            reverse.push(inverse);
        }
        reverse.reverse();
        self.normalize_doc(&mut doc, &mut Vec::new(), &mut Mapping::new())
            .ok()?;
        self.selection = selection.repair(&doc);
        self.doc = doc;
        self.stored_marks = None;
        self.version += 1;
        self.last_edit = Some(Instant::now());
        Some(reverse)
    }
}
