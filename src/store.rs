//! In-memory mutations of the [`Store`].
//!
//! Every function here operates on an already-loaded store and performs no
//! I/O; the service layer wraps them in a load → mutate → save cycle.
//! Validation happens before any field is touched, so a rejected call leaves
//! the store unchanged.
//!
//! | Entity | Operations |
//! |--------|------------|
//! | Sources | [`list_sources`], [`add_source`], [`update_source`], [`delete_source`] |
//! | Corpora | [`list_corpora`], [`upsert_corpus`], [`delete_corpus`] |
//! | Selections | [`get_conversation_selection`], [`set_conversation_selection`] |
//! | Config | [`get_config`], [`set_config`] |

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

use crate::models::{
    now_ms, ConversationSelection, Corpus, RagConfig, RagConfigPatch, Source, SourceKind, Store,
};

/// Rejected input. Raised before the store is mutated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid source kind '{0}' (expected file, folder or note)")]
    InvalidKind(String),
    #[error("missing path")]
    MissingPath,
    #[error("missing label for note")]
    MissingNoteLabel,
    #[error("source not found: {0}")]
    SourceNotFound(String),
    #[error("corpus name is required")]
    MissingCorpusName,
    #[error("thread id is required")]
    MissingThreadId,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Payload for [`add_source`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSource {
    pub kind: SourceKind,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Payload for [`update_source`]. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceUpdate {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Payload for [`upsert_corpus`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusInput {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub source_ids: Vec<String>,
}

fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

/// Order-preserving dedup, first occurrence wins.
pub(crate) fn dedup_ids(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

// ============ Sources ============

/// All sources, most recently updated first.
pub fn list_sources(store: &Store) -> Vec<Source> {
    let mut sources = store.sources.clone();
    sources.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    sources
}

/// Register a new source.
///
/// Files and folders require a path; notes require a label. A blank label
/// on a file or folder defaults to the path's final component.
pub fn add_source(store: &mut Store, payload: NewSource) -> Result<Source, ValidationError> {
    let label = payload.label.trim().to_string();
    let path = payload.path;

    if payload.kind != SourceKind::Note && path.is_empty() {
        return Err(ValidationError::MissingPath);
    }
    if payload.kind == SourceKind::Note && label.is_empty() {
        return Err(ValidationError::MissingNoteLabel);
    }

    let label = if label.is_empty() {
        basename(&path)
    } else {
        label
    };
    let note = match payload.kind {
        SourceKind::Note => Some(payload.note.unwrap_or_default()),
        _ => None,
    };

    let ts = now_ms();
    let source = Source {
        id: new_id("src"),
        kind: payload.kind,
        label,
        path,
        note,
        enabled: payload.enabled,
        created_at: ts,
        updated_at: ts,
    };

    tracing::debug!(id = %source.id, kind = %source.kind, "source added");
    store.sources.push(source.clone());
    Ok(source)
}

/// Change a source's label, enabled flag, or (for notes) note text.
///
/// A blank label keeps the current one. Note text on a non-note source is
/// ignored. Always bumps `updated_at`.
pub fn update_source(store: &mut Store, payload: SourceUpdate) -> Result<Source, ValidationError> {
    let source = store
        .sources
        .iter_mut()
        .find(|s| s.id == payload.id)
        .ok_or_else(|| ValidationError::SourceNotFound(payload.id.clone()))?;

    if let Some(label) = payload.label {
        let label = label.trim();
        if !label.is_empty() {
            source.label = label.to_string();
        }
    }
    if let Some(enabled) = payload.enabled {
        source.enabled = enabled;
    }
    if source.kind == SourceKind::Note {
        if let Some(note) = payload.note {
            source.note = Some(note);
        }
    }
    source.updated_at = now_ms();

    Ok(source.clone())
}

/// Remove a source, its membership in every corpus, and its index entry.
///
/// Returns whether a source was actually removed; the cascade runs either way.
pub fn delete_source(store: &mut Store, source_id: &str) -> bool {
    let before = store.sources.len();
    store.sources.retain(|s| s.id != source_id);

    for corpus in &mut store.corpora {
        corpus.source_ids.retain(|id| id != source_id);
    }
    store.index.remove(source_id);

    let removed = store.sources.len() != before;
    if removed {
        tracing::debug!(id = source_id, "source deleted");
    }
    removed
}

// ============ Corpora ============

/// All corpora, ordered by name.
pub fn list_corpora(store: &Store) -> Vec<Corpus> {
    let mut corpora = store.corpora.clone();
    corpora.sort_by(|a, b| a.name.cmp(&b.name));
    corpora
}

/// Update the corpus with `payload.id` if it exists, otherwise create one.
///
/// Source ids are deduplicated keeping first occurrence. They are not checked
/// against existing sources; dangling ids resolve to nothing at query time.
pub fn upsert_corpus(store: &mut Store, payload: CorpusInput) -> Result<Corpus, ValidationError> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(ValidationError::MissingCorpusName);
    }

    let source_ids = dedup_ids(&payload.source_ids);
    let ts = now_ms();

    let existing = payload
        .id
        .as_deref()
        .and_then(|id| store.corpora.iter_mut().find(|c| c.id == id));

    let corpus = match existing {
        Some(corpus) => {
            corpus.name = name;
            corpus.source_ids = source_ids;
            corpus.updated_at = ts;
            corpus.clone()
        }
        None => {
            let corpus = Corpus {
                id: new_id("corpus"),
                name,
                source_ids,
                created_at: ts,
                updated_at: ts,
            };
            store.corpora.push(corpus.clone());
            corpus
        }
    };

    Ok(corpus)
}

/// Remove a corpus and prune it from every conversation selection.
pub fn delete_corpus(store: &mut Store, corpus_id: &str) -> bool {
    let before = store.corpora.len();
    store.corpora.retain(|c| c.id != corpus_id);

    for selection in store.convo.values_mut() {
        selection.corpus_ids.retain(|id| id != corpus_id);
    }

    store.corpora.len() != before
}

// ============ Conversation selection ============

/// Corpus ids selected for a thread; empty when the thread has none.
pub fn get_conversation_selection(store: &Store, thread_id: &str) -> Vec<String> {
    store
        .convo
        .get(thread_id)
        .map(|s| s.corpus_ids.clone())
        .unwrap_or_default()
}

/// Replace a thread's selection wholesale (deduplicated).
pub fn set_conversation_selection(
    store: &mut Store,
    thread_id: &str,
    corpus_ids: &[String],
) -> Result<ConversationSelection, ValidationError> {
    if thread_id.is_empty() {
        return Err(ValidationError::MissingThreadId);
    }

    let selection = ConversationSelection {
        corpus_ids: dedup_ids(corpus_ids),
    };
    store
        .convo
        .insert(thread_id.to_string(), selection.clone());
    Ok(selection)
}

// ============ Config ============

pub fn get_config(store: &Store) -> RagConfig {
    store.config.clone()
}

/// Merge a partial config.
///
/// Zero for any integer field keeps the previous value. A non-finite
/// `min_score` is rejected and nothing is applied.
pub fn set_config(store: &mut Store, patch: RagConfigPatch) -> Result<RagConfig, ValidationError> {
    if let Some(score) = patch.min_score {
        if !score.is_finite() {
            return Err(ValidationError::InvalidConfig(
                "minScore must be a finite number".to_string(),
            ));
        }
    }

    let cfg = &mut store.config;

    if let Some(url) = patch.ollama_base_url {
        cfg.ollama_base_url = url;
    }
    if let Some(model) = patch.embeddings_model {
        cfg.embeddings_model = model;
    }
    if let Some(score) = patch.min_score {
        cfg.min_score = score;
    }
    keep_nonzero(&mut cfg.top_k, patch.top_k);
    keep_nonzero(&mut cfg.chunk_max_chars, patch.chunk_max_chars);
    keep_nonzero(&mut cfg.chunk_min_chars, patch.chunk_min_chars);
    keep_nonzero(&mut cfg.chunk_overlap_chars, patch.chunk_overlap_chars);
    keep_nonzero(&mut cfg.max_context_chars, patch.max_context_chars);

    Ok(cfg.clone())
}

fn keep_nonzero(field: &mut usize, value: Option<usize>) {
    if let Some(v) = value.filter(|v| *v > 0) {
        *field = v;
    }
}

fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}
