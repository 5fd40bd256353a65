//! # ragdesk
//!
//! A local-only retrieval-augmented generation core for a desktop assistant.
//!
//! Users register sources (single files, folders, or free-form notes) and
//! group them into named corpora. ragdesk extracts and chunks their text,
//! embeds the chunks through a local Ollama-compatible service, and at query
//! time assembles a bounded, citation-annotated context string from the most
//! similar chunks of the corpora selected for a conversation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌────────────────┐
//! │   Sources    │──▶│ Normalize+Chunk  │──▶│ Encrypted store│
//! │ file/dir/note│   │     +Embed       │   │  (AES-256-GCM) │
//! └──────────────┘   └──────────────────┘   └───────┬────────┘
//!                                                   │
//!                           corpus selection ───────┤
//!                                                   ▼
//!                                     ┌──────────────────────────┐
//!                                     │ cosine top-K → context + │
//!                                     │        citations         │
//!                                     └──────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragdesk sources add --kind folder --path ~/notes
//! ragdesk corpora upsert --name "Notes" --source <source-id>
//! ragdesk index --all
//! ragdesk query "how do I rotate the keys?" --corpus <corpus-id>
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML application configuration |
//! | [`models`] | Core data types and the root [`models::Store`] |
//! | [`text`] | Whitespace normalization |
//! | [`chunk`] | Paragraph chunking with overlap |
//! | [`embedding`] | Embedding client abstraction, cosine similarity |
//! | [`connector_fs`] | Filesystem document loader |
//! | [`extract`] | Text extraction (txt, markdown, PDF) |
//! | [`ingest`] | Per-source index maintenance |
//! | [`corpus`] | Corpus selection → candidate chunks |
//! | [`search`] | Top-K retrieval and query pipeline |
//! | [`context`] | Budgeted context assembly |
//! | [`store`] | Source, corpus, selection and config mutations |
//! | [`stats`] | Index status |
//! | [`persist`] | Encrypted store file |
//! | [`service`] | Load → mutate → save operations |
//! | [`logging`] | Tracing subscriber setup |

pub mod chunk;
pub mod config;
pub mod connector_fs;
pub mod context;
pub mod corpus;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod logging;
pub mod models;
pub mod persist;
pub mod search;
pub mod service;
pub mod stats;
pub mod store;
pub mod text;
