//! Command-line front-end for the `docpipe` engine.
//!
//! The core layer is entirely programmatic (spec.md §6, "no environment
//! variables or CLI surface at the core layer"); this binary is the
//! containing application that exposes one, the way `crates/alexandrie`'s
//! `main.rs` wraps its own `Opts`/`#[derive(Parser)]` struct around the
//! library crates it ships alongside.
//!
//! Since a document type is a caller-supplied Rust value (a set of states
//! plus the closures that process them) rather than something expressible in
//! a config file, this binary registers a small demo pipeline
//! (`new -> processed -> archived`) at startup so `next`/`finish` have
//! something to run; a real embedding application would register its own.

use std::fs;
use std::process;

use clap::{Parser, Subcommand};
use docpipe::{Config, Document, DocStore, DocumentType, ListFilter, ProcessingFailure};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "docpipe", version, about = "A persistent, concurrent document-processing pipeline engine.")]
struct Opts {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "docpipe.toml")]
    config: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Adds a root document in the given state.
    Add {
        state: String,
        #[arg(long)]
        content: Option<String>,
    },
    /// Advances the given documents by one hop.
    Next { ids: Vec<Uuid> },
    /// Drives the given documents to final states.
    Finish { ids: Vec<Uuid> },
    /// Lists documents in the given state.
    List {
        state: String,
        #[arg(long)]
        leaf: bool,
    },
    /// Counts documents, optionally restricted to a state.
    Count { state: Option<String> },
}

/// Carries `content`/`metadata` over to a freshly minted child document; the
/// state is left empty so the engine assigns the transition's `to_state`
/// (spec.md §9's "state absent" convention).
fn carry_over(doc: &Document) -> Document {
    let mut child = Document::new(String::new());
    child.content = doc.content.clone();
    child.metadata = doc.metadata.clone();
    child
}

/// The demo document type registered at startup: `new -> processed ->
/// archived`, each hop a no-op over content, just enough to exercise
/// `next`/`finish` end to end.
fn demo_document_type() -> DocumentType {
    let transitions = vec![
        docpipe::Transition::new("new", "processed", |doc: Document| async move {
            Ok::<_, ProcessingFailure>(carry_over(&doc))
        }),
        docpipe::Transition::new("processed", "archived", |doc: Document| async move {
            Ok::<_, ProcessingFailure>(carry_over(&doc))
        }),
    ];
    DocumentType::new(vec!["new".into(), "processed".into(), "archived".into()], transitions)
        .expect("demo document type is internally consistent")
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::parse();

    let _guard = docpipe::logs::init();

    let contents = fs::read_to_string(&opts.config)?;
    let config: Config = toml::from_str(contents.as_str())?;

    let store = DocStore::new(&config.database, &config.pipeline).await?;
    store.initialize().await?;
    store.set_document_type(demo_document_type()).await?;

    match opts.command {
        Command::Add { state, content } => {
            let mut doc = Document::new(state);
            if let Some(content) = content {
                doc = doc.with_content(content);
            }
            let added = store.add(vec![doc]).await?;
            for doc in added {
                println!("{}", doc.id);
            }
        }
        Command::Next { ids } => {
            let mut docs = Vec::new();
            for id in ids {
                if let Some(doc) = store.get(id, true).await? {
                    docs.push(doc);
                }
            }
            let produced = store.next(docs).await?;
            println!("{}", json::to_string_pretty(&produced)?);
        }
        Command::Finish { ids } => {
            let mut docs = Vec::new();
            for id in ids {
                if let Some(doc) = store.get(id, true).await? {
                    docs.push(doc);
                }
            }
            let finished = store.finish(docs).await?;
            println!("{}", json::to_string_pretty(&finished)?);
        }
        Command::List { state, leaf } => {
            let filter = ListFilter {
                state: Some(state),
                leaf_only: leaf,
                include_content: true,
                ..Default::default()
            };
            let docs = store.list(filter).await?;
            println!("{}", json::to_string_pretty(&docs)?);
        }
        Command::Count { state } => {
            let count = store.count(state.as_deref()).await?;
            println!("{}", count);
        }
    }

    store.dispose().await?;
    Ok(())
}

#[async_std::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}
