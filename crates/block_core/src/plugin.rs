use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::core::Editor;
use crate::draft::Draft;
use crate::error::{CommandError, QueryError, RegistryError, StepError};
use crate::events::{InputEvent, KeyChord};
use crate::node::Document;
use crate::ops::Op;
use crate::plugins;

pub type CommandHandler =
    Arc<dyn Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync>;
pub type QueryHandler =
    Arc<dyn Fn(&Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync>;
pub type KeyHandler = Arc<dyn Fn(&mut Editor) -> bool + Send + Sync>;
pub type EventHandler = Arc<dyn Fn(&mut Editor, &InputEvent) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub args_example: Option<Value>,
    pub hidden: bool,
    pub handler: CommandHandler,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut Editor, Option<Value>) -> Result<(), CommandError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            args_example: None,
            hidden: false,
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn args_example(mut self, args_example: Value) -> Self {
        self.args_example = Some(args_example);
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

#[derive(Clone)]
pub struct QuerySpec {
    pub id: String,
    pub handler: QueryHandler,
}

impl QuerySpec {
    pub fn new(
        id: impl Into<String>,
        handler: impl Fn(&Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            handler: Arc::new(handler),
        }
    }
}

/// Binds a key chord. Among bindings for the same chord the highest
/// priority runs first; the first handler returning true wins.
#[derive(Clone)]
pub struct KeyBinding {
    pub chord: KeyChord,
    pub priority: i32,
    pub handler: KeyHandler,
}

impl KeyBinding {
    pub fn new(
        chord: KeyChord,
        priority: i32,
        handler: impl Fn(&mut Editor) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            chord,
            priority,
            handler: Arc::new(handler),
        }
    }
}

#[derive(Clone)]
pub struct EventBinding {
    pub id: String,
    pub priority: i32,
    pub handler: EventHandler,
}

impl EventBinding {
    pub fn new(
        id: impl Into<String>,
        priority: i32,
        handler: impl Fn(&mut Editor, &InputEvent) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            priority,
            handler: Arc::new(handler),
        }
    }
}

/// Structural repair run after every commit until no pass yields ops. The
/// ops of one run are applied in order, so later ops must account for
/// earlier ones.
pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document) -> Vec<Op>;
}

/// Gets a last look at a draft before it is committed.
pub trait TransactionTransform: Send + Sync {
    fn id(&self) -> &'static str;
    fn transform(&self, editor: &Editor, draft: &mut Draft) -> Result<(), StepError>;
}

/// Deferred invariant enforcement. Runs after a document-changing commit,
/// observes only committed state, and returns a draft when something needs
/// fixing. Must be idempotent.
pub trait Reconciler: Send + Sync {
    fn id(&self) -> &'static str;
    fn reconcile(&self, editor: &Editor) -> Result<Option<Draft>, StepError>;
}

pub trait EditorPlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    fn transaction_transforms(&self) -> Vec<Box<dyn TransactionTransform>> {
        Vec::new()
    }
    fn reconcilers(&self) -> Vec<Box<dyn Reconciler>> {
        Vec::new()
    }
    fn keymap(&self) -> Vec<KeyBinding> {
        Vec::new()
    }
    fn event_handlers(&self) -> Vec<EventBinding> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
    fn queries(&self) -> Vec<QuerySpec> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    plugin_ids: Vec<&'static str>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    transaction_transforms: Vec<Box<dyn TransactionTransform>>,
    reconcilers: Vec<Box<dyn Reconciler>>,
    keymap: Vec<KeyBinding>,
    event_handlers: Vec<EventBinding>,
    commands: HashMap<String, CommandSpec>,
    queries: HashMap<String, QuerySpec>,
}

impl PluginRegistry {
    pub fn new(
        plugins: impl IntoIterator<Item = Box<dyn EditorPlugin>>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    /// Every plugin shipped with the crate.
    pub fn standard() -> Self {
        Self::new(plugins::standard()).expect("standard registry must be valid")
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn EditorPlugin>) -> Result<(), RegistryError> {
        let id = plugin.id();
        if self.plugin_ids.contains(&id) {
            return Err(RegistryError::DuplicatePlugin(id.to_string()));
        }

        let mut seen = HashSet::new();
        for cmd in plugin.commands() {
            if self.commands.contains_key(&cmd.id) || !seen.insert(cmd.id.clone()) {
                return Err(RegistryError::DuplicateCommand(cmd.id));
            }
            self.commands.insert(cmd.id.clone(), cmd);
        }

        for query in plugin.queries() {
            if self.queries.contains_key(&query.id) {
                return Err(RegistryError::DuplicateQuery(query.id));
            }
            self.queries.insert(query.id.clone(), query);
        }

        self.plugin_ids.push(id);
        self.normalize_passes.extend(plugin.normalize_passes());
        self.transaction_transforms
            .extend(plugin.transaction_transforms());
        self.reconcilers.extend(plugin.reconcilers());
        self.keymap.extend(plugin.keymap());
        // Stable sort keeps registration order among equal priorities.
        self.keymap.sort_by(|a, b| b.priority.cmp(&a.priority));
        self.event_handlers.extend(plugin.event_handlers());
        self.event_handlers
            .sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(())
    }

    pub fn plugin_ids(&self) -> &[&'static str] {
        &self.plugin_ids
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    pub fn transaction_transforms(&self) -> &[Box<dyn TransactionTransform>] {
        &self.transaction_transforms
    }

    pub fn reconcilers(&self) -> &[Box<dyn Reconciler>] {
        &self.reconcilers
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn queries(&self) -> &HashMap<String, QuerySpec> {
        &self.queries
    }

    pub fn query(&self, id: &str) -> Option<QuerySpec> {
        self.queries.get(id).cloned()
    }

    /// Handlers bound to `chord`, highest priority first.
    pub fn key_handlers(&self, chord: &KeyChord) -> Vec<KeyHandler> {
        self.keymap
            .iter()
            .filter(|b| &b.chord == chord)
            .map(|b| b.handler.clone())
            .collect()
    }

    pub fn event_handlers(&self) -> Vec<EventHandler> {
        self.event_handlers
            .iter()
            .map(|b| b.handler.clone())
            .collect()
    }

    /// Ops of the first pass that finds something to fix.
    pub fn normalize(&self, doc: &Document) -> Option<(&'static str, Vec<Op>)> {
        self.normalize_passes.iter().find_map(|pass| {
            let ops = pass.run(doc);
            (!ops.is_empty()).then(|| (pass.id(), ops))
        })
    }
}
