//! Application-facing operations.
//!
//! [`RagService`] is the explicit application context: it owns the
//! persistence layer and the two collaborators (embedder, document loader)
//! and runs every operation as one cycle:
//!
//! ```text
//! lock ─▶ load snapshot ─▶ mutate in memory ─▶ save (mutating ops only) ─▶ unlock
//! ```
//!
//! The lock serializes operations issued through the same service instance.
//! A failed operation saves nothing. Every operation refuses to run when
//! store encryption is unavailable.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::connector_fs::{DocumentLoader, FsLoader};
use crate::embedding::{Embedder, OllamaEmbedder};
use crate::ingest;
use crate::models::{
    Citation, ConversationSelection, Corpus, IndexReport, IndexStatus, RagConfig, RagConfigPatch,
    Source, Store,
};
use crate::persist::{EncryptedStore, KeyFileStorage, PersistError, SecureStorage};
use crate::search;
use crate::stats::index_status;
use crate::store::{self, CorpusInput, NewSource, SourceUpdate};

/// Result of an indexing run plus the index status afterwards.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRun {
    pub result: IndexReport,
    pub status: IndexStatus,
}

/// Which corpora a query runs against.
///
/// Explicit `corpus_ids` win (even when empty); otherwise the thread's
/// saved selection is used; with neither the query has no candidates.
#[derive(Debug, Clone, Default)]
pub struct QueryTarget {
    pub corpus_ids: Option<Vec<String>>,
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub corpus_ids: Vec<String>,
    pub context: String,
    pub sources: Vec<Citation>,
}

/// Everything a settings screen needs in one read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub status: IndexStatus,
    pub sources: Vec<Source>,
    pub corpora: Vec<Corpus>,
    pub config: RagConfig,
}

pub struct RagService<S> {
    persistence: EncryptedStore<S>,
    embedder: Arc<dyn Embedder>,
    loader: Arc<dyn DocumentLoader>,
    lock: Mutex<()>,
}

impl RagService<KeyFileStorage> {
    /// Wire the production collaborators from application config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let storage = KeyFileStorage::open(&config.store.key_path, &config.store.path);
        let embedder = OllamaEmbedder::new(&config.embedding)
            .context("Failed to build embedding client")?;
        let loader = FsLoader::new(&config.loader).context("Invalid loader.exclude_globs")?;

        Ok(Self::new(
            EncryptedStore::new(&config.store.path, storage),
            Arc::new(embedder),
            Arc::new(loader),
        ))
    }
}

impl<S: SecureStorage> RagService<S> {
    pub fn new(
        persistence: EncryptedStore<S>,
        embedder: Arc<dyn Embedder>,
        loader: Arc<dyn DocumentLoader>,
    ) -> Self {
        Self {
            persistence,
            embedder,
            loader,
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<Store> {
        if !self.persistence.is_available() {
            return Err(PersistError::EncryptionUnavailable.into());
        }
        self.persistence
            .load()
            .with_context(|| format!("Failed to load store {}", self.persistence.path().display()))
    }

    fn save(&self, store: &Store) -> Result<()> {
        self.persistence
            .save(store)
            .with_context(|| format!("Failed to save store {}", self.persistence.path().display()))
    }

    async fn read<T>(&self, f: impl FnOnce(&Store) -> T) -> Result<T> {
        let _guard = self.lock.lock().await;
        let store = self.load()?;
        Ok(f(&store))
    }

    async fn mutate<T>(&self, f: impl FnOnce(&mut Store) -> Result<T>) -> Result<T> {
        let _guard = self.lock.lock().await;
        let mut store = self.load()?;
        let out = f(&mut store)?;
        self.save(&store)?;
        Ok(out)
    }

    // ============ Sources ============

    pub async fn list_sources(&self) -> Result<Vec<Source>> {
        self.read(store::list_sources).await
    }

    pub async fn add_source(&self, payload: NewSource) -> Result<Source> {
        self.mutate(|s| Ok(store::add_source(s, payload)?)).await
    }

    pub async fn update_source(&self, payload: SourceUpdate) -> Result<Source> {
        self.mutate(|s| Ok(store::update_source(s, payload)?)).await
    }

    pub async fn delete_source(&self, source_id: &str) -> Result<bool> {
        self.mutate(|s| Ok(store::delete_source(s, source_id))).await
    }

    // ============ Corpora ============

    pub async fn list_corpora(&self) -> Result<Vec<Corpus>> {
        self.read(store::list_corpora).await
    }

    pub async fn upsert_corpus(&self, payload: CorpusInput) -> Result<Corpus> {
        self.mutate(|s| Ok(store::upsert_corpus(s, payload)?)).await
    }

    pub async fn delete_corpus(&self, corpus_id: &str) -> Result<bool> {
        self.mutate(|s| Ok(store::delete_corpus(s, corpus_id))).await
    }

    // ============ Conversation selection ============

    pub async fn get_conversation_selection(&self, thread_id: &str) -> Result<Vec<String>> {
        self.read(|s| store::get_conversation_selection(s, thread_id))
            .await
    }

    pub async fn set_conversation_selection(
        &self,
        thread_id: &str,
        corpus_ids: &[String],
    ) -> Result<ConversationSelection> {
        self.mutate(|s| Ok(store::set_conversation_selection(s, thread_id, corpus_ids)?))
            .await
    }

    // ============ Config ============

    pub async fn get_config(&self) -> Result<RagConfig> {
        self.read(store::get_config).await
    }

    pub async fn set_config(&self, patch: RagConfigPatch) -> Result<RagConfig> {
        self.mutate(|s| Ok(store::set_config(s, patch)?)).await
    }

    // ============ Indexing & retrieval ============

    /// Index the given sources and persist the updated indexes.
    pub async fn index_sources(&self, source_ids: &[String]) -> Result<IndexRun> {
        let _guard = self.lock.lock().await;
        let mut store = self.load()?;

        let result = ingest::index_sources(
            &mut store,
            source_ids,
            self.embedder.as_ref(),
            self.loader.as_ref(),
        )
        .await;
        self.save(&store)?;

        tracing::info!(
            requested = source_ids.len(),
            indexed = result.indexed,
            skipped = result.skipped,
            errors = result.errors.len(),
            "index run complete"
        );

        Ok(IndexRun {
            status: index_status(&store),
            result,
        })
    }

    /// Retrieve context for `query_text`. Read-only.
    pub async fn query(&self, target: QueryTarget, query_text: &str) -> Result<QueryResponse> {
        let _guard = self.lock.lock().await;
        let store = self.load()?;

        let corpus_ids = match (target.corpus_ids, target.thread_id.as_deref()) {
            (Some(ids), _) => ids,
            (None, Some(thread)) => store::get_conversation_selection(&store, thread),
            (None, None) => Vec::new(),
        };

        let result = search::query(&store, &corpus_ids, query_text, self.embedder.as_ref()).await?;
        tracing::debug!(corpora = corpus_ids.len(), citations = result.sources.len(), "query answered");

        Ok(QueryResponse {
            corpus_ids,
            context: result.context,
            sources: result.sources,
        })
    }

    pub async fn status(&self) -> Result<Overview> {
        self.read(|s| Overview {
            status: index_status(s),
            sources: store::list_sources(s),
            corpora: store::list_corpora(s),
            config: store::get_config(s),
        })
        .await
    }
}
