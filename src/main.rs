//! # ragdesk CLI
//!
//! Command-line front end for the ragdesk retrieval core. Every command
//! loads the encrypted store, performs one operation, and (when it mutates
//! anything) saves the store again. Results are printed to stdout as JSON;
//! logs go to stderr.
//!
//! ## Usage
//!
//! ```bash
//! ragdesk --config ./config/ragdesk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragdesk status` | Index counters, sources, corpora and retrieval config |
//! | `ragdesk sources list\|add\|update\|delete` | Manage sources |
//! | `ragdesk corpora list\|upsert\|delete` | Manage corpora |
//! | `ragdesk convo get\|set <thread>` | Corpus selection of a conversation thread |
//! | `ragdesk config get\|set` | Retrieval and chunking parameters |
//! | `ragdesk index [--all] [ids..]` | (Re)index sources |
//! | `ragdesk query "<text>"` | Retrieve context for a query |
//!
//! ## Examples
//!
//! ```bash
//! # Add a folder and a note
//! ragdesk sources add --kind folder --path ~/work/docs --label Work
//! ragdesk sources add --kind note --label Scratch --note "Deploys happen on Fridays."
//!
//! # Group them and index
//! ragdesk corpora upsert --name Work --source src_… --source src_…
//! ragdesk index --all
//!
//! # Query a corpus directly or through a thread's selection
//! ragdesk query "when do deploys happen?" --corpus corpus_…
//! ragdesk convo set thread-42 --corpus corpus_…
//! ragdesk query "when do deploys happen?" --thread thread-42
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use ragdesk::config;
use ragdesk::logging;
use ragdesk::models::{RagConfigPatch, SourceKind};
use ragdesk::persist::KeyFileStorage;
use ragdesk::service::{QueryTarget, RagService};
use ragdesk::stats::render_status;
use ragdesk::store::{CorpusInput, NewSource, SourceUpdate};

/// ragdesk — local retrieval-augmented generation over your files and notes.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "ragdesk",
    about = "ragdesk — local retrieval-augmented generation over your files and notes",
    version,
    long_about = "ragdesk indexes local files, folders and notes into an encrypted store, \
    embeds them through a local Ollama instance, and assembles citation-annotated context \
    for a query from the corpora you select."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragdesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show index status, sources, corpora and retrieval config.
    Status {
        /// Print the full overview as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Manage sources (files, folders, notes).
    Sources {
        #[command(subcommand)]
        action: SourceAction,
    },

    /// Manage corpora (named groups of sources).
    Corpora {
        #[command(subcommand)]
        action: CorpusAction,
    },

    /// Corpus selection of a conversation thread.
    Convo {
        #[command(subcommand)]
        action: ConvoAction,
    },

    /// Retrieval and chunking parameters stored with the index.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Index sources.
    ///
    /// Files whose modification time and size are unchanged since the last
    /// run are skipped; notes are always re-embedded.
    Index {
        /// Source ids to index.
        source_ids: Vec<String>,

        /// Index every source.
        #[arg(long, conflicts_with = "source_ids")]
        all: bool,
    },

    /// Retrieve context for a query.
    ///
    /// Explicit `--corpus` ids take precedence over `--thread`.
    Query {
        /// The query text.
        text: String,

        /// Corpus id to search (repeatable).
        #[arg(long = "corpus")]
        corpus_ids: Vec<String>,

        /// Use the corpus selection saved for this thread.
        #[arg(long)]
        thread: Option<String>,
    },
}

#[derive(Subcommand)]
enum SourceAction {
    /// List sources, most recently updated first.
    List,
    /// Register a source.
    Add {
        /// `file`, `folder` or `note`.
        #[arg(long, value_parser = parse_kind)]
        kind: SourceKind,
        /// Display label (required for notes; defaults to the file name otherwise).
        #[arg(long, default_value = "")]
        label: String,
        /// Path of the file or folder.
        #[arg(long, default_value = "")]
        path: String,
        /// Note text.
        #[arg(long, conflicts_with = "note_file")]
        note: Option<String>,
        /// Read note text from a file.
        #[arg(long)]
        note_file: Option<PathBuf>,
        /// Register the source disabled.
        #[arg(long)]
        disabled: bool,
    },
    /// Change a source's label, enabled flag or note text.
    Update {
        id: String,
        #[arg(long)]
        label: Option<String>,
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        #[arg(long)]
        disable: bool,
        #[arg(long)]
        note: Option<String>,
    },
    /// Delete a source, its index, and its corpus memberships.
    Delete { id: String },
}

#[derive(Subcommand)]
enum CorpusAction {
    /// List corpora by name.
    List,
    /// Create a corpus, or replace an existing one when `--id` matches.
    Upsert {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        name: String,
        /// Member source id (repeatable).
        #[arg(long = "source")]
        source_ids: Vec<String>,
    },
    /// Delete a corpus and remove it from every thread selection.
    Delete { id: String },
}

#[derive(Subcommand)]
enum ConvoAction {
    /// Print the corpus ids selected for a thread.
    Get { thread: String },
    /// Replace the corpus selection of a thread.
    Set {
        thread: String,
        /// Corpus id (repeatable). None clears the selection.
        #[arg(long = "corpus")]
        corpus_ids: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current retrieval config.
    Get,
    /// Update retrieval config fields. Zero values are ignored.
    Set {
        #[arg(long)]
        ollama_base_url: Option<String>,
        #[arg(long)]
        embeddings_model: Option<String>,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        min_score: Option<f32>,
        #[arg(long)]
        chunk_max_chars: Option<usize>,
        #[arg(long)]
        chunk_min_chars: Option<usize>,
        #[arg(long)]
        chunk_overlap_chars: Option<usize>,
        #[arg(long)]
        max_context_chars: Option<usize>,
    },
}

fn parse_kind(s: &str) -> Result<SourceKind, String> {
    s.parse::<SourceKind>().map_err(|e| e.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_or_default(&cli.config)?;
    logging::init(&cfg.log.level);

    let service: RagService<KeyFileStorage> = RagService::from_config(&cfg)?;

    match cli.command {
        Commands::Status { json } => {
            let overview = service.status().await?;
            if json {
                print_json(&overview)?;
            } else {
                print!(
                    "{}",
                    render_status(
                        &overview.status,
                        &overview.sources,
                        &overview.corpora,
                        &overview.config
                    )
                );
            }
        }
        Commands::Sources { action } => match action {
            SourceAction::List => print_json(&service.list_sources().await?)?,
            SourceAction::Add {
                kind,
                label,
                path,
                note,
                note_file,
                disabled,
            } => {
                let note = match note_file {
                    Some(file) => Some(std::fs::read_to_string(&file).with_context(|| {
                        format!("Failed to read note file: {}", file.display())
                    })?),
                    None => note,
                };
                let source = service
                    .add_source(NewSource {
                        kind,
                        label,
                        path,
                        note,
                        enabled: !disabled,
                    })
                    .await?;
                print_json(&source)?;
            }
            SourceAction::Update {
                id,
                label,
                enable,
                disable,
                note,
            } => {
                let enabled = match (enable, disable) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                };
                let source = service
                    .update_source(SourceUpdate {
                        id,
                        label,
                        enabled,
                        note,
                    })
                    .await?;
                print_json(&source)?;
            }
            SourceAction::Delete { id } => {
                let removed = service.delete_source(&id).await?;
                print_json(&serde_json::json!({ "removed": removed }))?;
            }
        },
        Commands::Corpora { action } => match action {
            CorpusAction::List => print_json(&service.list_corpora().await?)?,
            CorpusAction::Upsert {
                id,
                name,
                source_ids,
            } => {
                let corpus = service
                    .upsert_corpus(CorpusInput {
                        id,
                        name,
                        source_ids,
                    })
                    .await?;
                print_json(&corpus)?;
            }
            CorpusAction::Delete { id } => {
                let removed = service.delete_corpus(&id).await?;
                print_json(&serde_json::json!({ "removed": removed }))?;
            }
        },
        Commands::Convo { action } => match action {
            ConvoAction::Get { thread } => {
                let corpus_ids = service.get_conversation_selection(&thread).await?;
                print_json(&serde_json::json!({ "corpusIds": corpus_ids }))?;
            }
            ConvoAction::Set { thread, corpus_ids } => {
                let entry = service
                    .set_conversation_selection(&thread, &corpus_ids)
                    .await?;
                print_json(&entry)?;
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::Get => print_json(&service.get_config().await?)?,
            ConfigAction::Set {
                ollama_base_url,
                embeddings_model,
                top_k,
                min_score,
                chunk_max_chars,
                chunk_min_chars,
                chunk_overlap_chars,
                max_context_chars,
            } => {
                let config = service
                    .set_config(RagConfigPatch {
                        ollama_base_url,
                        embeddings_model,
                        top_k,
                        min_score,
                        chunk_max_chars,
                        chunk_min_chars,
                        chunk_overlap_chars,
                        max_context_chars,
                    })
                    .await?;
                print_json(&config)?;
            }
        },
        Commands::Index { source_ids, all } => {
            let ids = if all {
                service
                    .list_sources()
                    .await?
                    .into_iter()
                    .map(|s| s.id)
                    .collect()
            } else {
                source_ids
            };
            let run = service.index_sources(&ids).await?;
            print_json(&run)?;
        }
        Commands::Query {
            text,
            corpus_ids,
            thread,
        } => {
            let target = QueryTarget {
                corpus_ids: if corpus_ids.is_empty() {
                    None
                } else {
                    Some(corpus_ids)
                },
                thread_id: thread,
            };
            let response = service.query(target, &text).await?;
            print_json(&response)?;
        }
    }

    Ok(())
}
