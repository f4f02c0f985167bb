//! Replays a scripted editing session against a document and prints the
//! result.
//!
//! A script is a JSON array of steps:
//!
//! ```json
//! [
//!   { "key": "Enter" },
//!   { "event": { "type": "text_input", "text": "Hello" } },
//!   { "command": { "id": "heading.set", "args": { "level": 2 } } },
//!   { "select": { "type": "text", "anchor": 3, "head": 8 } },
//!   { "query": { "id": "marks.active" } },
//!   "undo"
//! ]
//! ```

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context as _, Result, bail};
use blockdoc_core::{
    Document, Editor, EditorConfig, ExternalNode, InputEvent, KeyChord, PluginRegistry, Selection,
    StoredDocument, describe_structure, from_external, near_text, render_html,
};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "blockdoc-replay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Stored document to start from (defaults to a blank post)
    #[arg(long)]
    doc: Option<PathBuf>,

    /// Read `--doc` as an external HTML tree instead of a stored document
    #[arg(long)]
    external: bool,

    /// Script of editing steps
    #[arg(long)]
    script: Option<PathBuf>,

    /// Editor configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Html)]
    format: Format,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Html,
    Json,
    Outline,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Step {
    Key(String),
    Event(InputEvent),
    Command {
        id: String,
        #[serde(default)]
        args: Option<Value>,
    },
    Query {
        id: String,
        #[serde(default)]
        args: Option<Value>,
    },
    Select(Selection),
    Undo,
    Redo,
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_document(cli: &Cli) -> Result<Document> {
    let Some(path) = &cli.doc else {
        return Ok(Document::blank());
    };
    let text = read(path)?;
    let doc = if cli.external {
        let nodes: Vec<ExternalNode> = serde_json::from_str(&text)
            .with_context(|| format!("{} is not an external tree", path.display()))?;
        from_external(&nodes)?
    } else {
        StoredDocument::load(&text)?
    };
    Ok(doc)
}

fn load_config(cli: &Cli) -> Result<EditorConfig> {
    match &cli.config {
        Some(path) => EditorConfig::from_json_str(&read(path)?)
            .with_context(|| format!("invalid config {}", path.display())),
        None => Ok(EditorConfig::default()),
    }
}

fn run_step(editor: &mut Editor, ix: usize, step: Step) -> Result<()> {
    match step {
        Step::Key(chord) => {
            let chord = KeyChord::parse(&chord)?;
            let handled = editor.handle_key(&chord);
            tracing::info!(step = ix, %chord, handled, "key");
        }
        Step::Event(event) => {
            let handled = editor.handle_event(&event);
            tracing::info!(step = ix, ?event, handled, "event");
        }
        Step::Command { id, args } => {
            editor
                .run_command(&id, args)
                .with_context(|| format!("step {ix}: command {id} failed"))?;
            tracing::info!(step = ix, command = %id, "command");
        }
        Step::Query { id, args } => {
            let value = editor
                .run_query_json(&id, args)
                .with_context(|| format!("step {ix}: query {id} failed"))?;
            println!("{id}: {value}");
        }
        Step::Select(selection) => {
            editor.set_selection(selection);
            tracing::info!(step = ix, selection = ?editor.selection(), "select");
        }
        Step::Undo => {
            if !editor.undo() {
                bail!("step {ix}: nothing to undo");
            }
        }
        Step::Redo => {
            if !editor.redo() {
                bail!("step {ix}: nothing to redo");
            }
        }
    }
    for event in editor.take_events() {
        tracing::info!(step = ix, ?event, "editor event");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let doc = load_document(&cli)?;
    let config = load_config(&cli)?;
    let caret = near_text(&doc, 0);
    let mut editor = Editor::with_config(
        doc,
        Selection::caret(caret),
        PluginRegistry::standard(),
        config,
    );

    if let Some(path) = &cli.script {
        let steps: Vec<Step> = serde_json::from_str(&read(path)?)
            .with_context(|| format!("{} is not a valid script", path.display()))?;
        tracing::info!(steps = steps.len(), "replaying");
        for (ix, step) in steps.into_iter().enumerate() {
            run_step(&mut editor, ix, step)?;
        }
    }

    let saved = editor.poll_persist(Instant::now() + editor.config().persist_debounce());
    tracing::info!(version = editor.version(), persisted = saved.is_some(), "done");

    let doc = editor.doc();
    match cli.format {
        Format::Html => println!("{}", render_html(doc)),
        Format::Json => {
            let stored = StoredDocument::from_document(doc.clone());
            println!("{}", stored.to_json_pretty()?);
        }
        Format::Outline => print!("{}", describe_structure(doc)),
    }
    Ok(())
}
