//! # Knowledge Forge CLI (`forge`)
//!
//! Manage the knowledge base and run semantic retrieval from the shell, or
//! start the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! forge --config ./config/forge.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `forge init` | Create the SQLite database and run schema migrations |
//! | `forge add --title <t> <content>` | Store a note (embedded on the way in) |
//! | `forge ingest <path>` | Extract text from a PDF or text file and store it |
//! | `forge list` | List stored knowledge, newest first |
//! | `forge delete <id>` | Permanently remove an item |
//! | `forge retrieve "<query>"` | Show the most relevant knowledge for a query |
//! | `forge status` | Check whether the embedding service is reachable |
//! | `forge serve` | Start the HTTP API |
//!
//! Logs go to stderr and honour `RUST_LOG` (default `info`).

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use knowledge_forge::config::{self, Config};
use knowledge_forge::embedding;
use knowledge_forge::ingest::{self, IngestPolicy};
use knowledge_forge::migrate;
use knowledge_forge::models::{KnowledgeKind, NewKnowledgeItem};
use knowledge_forge::retrieve::{format_context, RetrievalParams, Retriever};
use knowledge_forge::server;
use knowledge_forge::store::{KnowledgeStore, SqliteStore};

/// Knowledge Forge CLI: semantic knowledge retrieval for small-business assistants.
#[derive(Parser)]
#[command(
    name = "forge",
    about = "Knowledge Forge: store notes and documents, retrieve the relevant ones for an LLM prompt",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/forge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Store a note.
    ///
    /// The content is embedded with the configured provider. If the
    /// provider is unavailable the note is stored without an embedding and
    /// will not show up in retrieval.
    Add {
        /// Short label for the note.
        #[arg(long)]
        title: String,

        /// `note` or `document`.
        #[arg(long, default_value = "note")]
        kind: KnowledgeKind,

        /// Note body.
        content: String,
    },

    /// Extract text from a file (PDF, txt, md, csv, html, json, xml) and store it.
    Ingest {
        path: PathBuf,
    },

    /// List stored knowledge, newest first.
    List,

    /// Permanently delete a knowledge item.
    Delete {
        id: String,
    },

    /// Retrieve the knowledge most relevant to a query.
    Retrieve {
        query: String,

        /// Maximum number of snippets (default: `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Exclusive similarity threshold in [0, 1] (default: `[retrieval].threshold`).
        #[arg(long)]
        threshold: Option<f32>,

        /// Print the prompt-ready context block instead of a ranked listing.
        #[arg(long)]
        context: bool,
    },

    /// Check whether the embedding service is reachable.
    Status,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Add {
            title,
            kind,
            content,
        } => {
            let new = NewKnowledgeItem {
                title,
                content,
                kind,
            };
            run_add(&cfg, new).await?;
        }
        Commands::Ingest { path } => {
            run_ingest(&cfg, &path).await?;
        }
        Commands::List => {
            run_list(&cfg).await?;
        }
        Commands::Delete { id } => {
            run_delete(&cfg, &id).await?;
        }
        Commands::Retrieve {
            query,
            top_k,
            threshold,
            context,
        } => {
            run_retrieve(&cfg, &query, top_k, threshold, context).await?;
        }
        Commands::Status => {
            let provider = embedding::create_provider(&cfg.embedding)?;
            let state = if provider.health().await {
                "online"
            } else {
                "offline"
            };
            println!("embedding: {} ({})", state, provider.model_name());
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

async fn run_add(cfg: &Config, new: NewKnowledgeItem) -> Result<()> {
    let store = SqliteStore::open(cfg).await?;
    let provider = embedding::create_provider(&cfg.embedding)?;
    let policy = IngestPolicy::from(&cfg.embedding);

    let item = ingest::add_knowledge(&store, provider.as_ref(), &policy, new).await?;
    print_stored(&item.id, item.embedding.is_some());

    store.close().await;
    Ok(())
}

async fn run_ingest(cfg: &Config, path: &std::path::Path) -> Result<()> {
    let store = SqliteStore::open(cfg).await?;
    let provider = embedding::create_provider(&cfg.embedding)?;
    let policy = IngestPolicy::from(&cfg.embedding);

    let item = ingest::ingest_file(&store, provider.as_ref(), &policy, path).await?;
    print_stored(&item.id, item.embedding.is_some());
    println!("  title: {}", item.title);
    println!("  characters: {}", item.content.chars().count());

    store.close().await;
    Ok(())
}

fn print_stored(id: &str, embedded: bool) {
    println!("stored {}", id);
    println!("  embedded: {}", if embedded { "yes" } else { "no" });
}

async fn run_list(cfg: &Config) -> Result<()> {
    let store = SqliteStore::open(cfg).await?;
    let summaries = store.list_summaries().await?;
    store.close().await;

    if summaries.is_empty() {
        println!("No knowledge stored.");
        return Ok(());
    }

    for s in &summaries {
        let marker = if s.embedded { "" } else { "  (not embedded)" };
        println!(
            "{}  [{}] {}  {}{}",
            s.id,
            s.kind,
            s.title,
            s.created_at.format("%Y-%m-%d"),
            marker
        );
    }
    Ok(())
}

async fn run_delete(cfg: &Config, id: &str) -> Result<()> {
    let store = SqliteStore::open(cfg).await?;
    let deleted = store.delete(id).await?;
    store.close().await;

    if !deleted {
        bail!("knowledge item not found: {}", id);
    }
    println!("deleted {}", id);
    Ok(())
}

async fn run_retrieve(
    cfg: &Config,
    query: &str,
    top_k: Option<usize>,
    threshold: Option<f32>,
    context: bool,
) -> Result<()> {
    let defaults = RetrievalParams::from(&cfg.retrieval);
    let top_k = top_k.unwrap_or(defaults.top_k);
    let threshold = threshold.unwrap_or(defaults.threshold);

    let store = SqliteStore::open(cfg).await?;
    let items = store.list_items().await?;
    store.close().await;

    let retriever = Retriever::new(embedding::create_provider(&cfg.embedding)?);
    let hits = retriever
        .retrieve_scored(query, &items, top_k, threshold)
        .await?;

    if hits.is_empty() {
        println!("No relevant knowledge.");
        return Ok(());
    }

    if context {
        let snippets: Vec<String> = hits.iter().map(|h| h.item.content.clone()).collect();
        if let Some(block) = format_context(&snippets) {
            println!("{}", block);
        }
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let excerpt: String = hit.item.content.chars().take(240).collect();
        println!("{}. [{:.2}] {}", i + 1, hit.score, hit.item.title);
        println!("    kind: {}", hit.item.kind);
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " ").trim());
        println!("    id: {}", hit.item.id);
        println!();
    }
    Ok(())
}
