//! Core data models used throughout ragdesk.
//!
//! These types represent the sources, corpora, per-source indexes, and
//! retrieval results that flow through the indexing and query pipeline.
//! Everything hangs off a single root [`Store`], which is serialized as one
//! JSON document by the persistence layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current on-disk schema version of the [`Store`].
pub const STORE_VERSION: u32 = 1;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// What kind of origin a [`Source`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    File,
    Folder,
    Note,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::File => "file",
            SourceKind::Folder => "folder",
            SourceKind::Note => "note",
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = crate::store::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(SourceKind::File),
            "folder" => Ok(SourceKind::Folder),
            "note" => Ok(SourceKind::Note),
            other => Err(crate::store::ValidationError::InvalidKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a single indexed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocKind {
    File,
    Note,
}

impl DocKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocKind::File => "file",
            DocKind::Note => "note",
        }
    }
}

/// A user-registered origin of indexable text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: String,
    pub kind: SourceKind,
    pub label: String,
    /// Filesystem path; empty for notes.
    #[serde(default)]
    pub path: String,
    /// Inline note text, only present for [`SourceKind::Note`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub enabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A named set of sources selected together for retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Corpus {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub source_ids: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Corpora chosen for one conversation thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSelection {
    #[serde(default)]
    pub corpus_ids: Vec<String>,
}

/// Provenance of a chunk, carried into citations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMeta {
    pub source_id: String,
    pub doc_id: String,
    pub title: String,
    #[serde(default)]
    pub path: String,
    pub kind: DocKind,
    pub idx: usize,
}

/// A bounded span of normalized text paired with its embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// `"<docId>::<ordinal>"`.
    pub chunk_id: String,
    pub text: String,
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub meta: ChunkMeta,
}

/// One physical unit of text: a file, or the synthetic document of a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub doc_id: String,
    pub kind: DocKind,
    pub title: String,
    #[serde(default)]
    pub path: String,
    pub mtime_ms: i64,
    pub size: u64,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
    pub updated_at: i64,
}

/// Per-source index: document records plus a flattened chunk list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceIndex {
    pub updated_at: i64,
    pub docs: BTreeMap<String, DocumentRecord>,
    pub chunks: Vec<Chunk>,
}

impl SourceIndex {
    /// Rebuild `chunks` as the concatenation of every document's chunks,
    /// in document-id order.
    pub fn rebuild_flat_chunks(&mut self) {
        self.chunks = self
            .docs
            .values()
            .flat_map(|doc| doc.chunks.iter().cloned())
            .collect();
    }
}

/// Retrieval and chunking parameters persisted alongside the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RagConfig {
    pub ollama_base_url: String,
    pub embeddings_model: String,
    pub top_k: usize,
    pub min_score: f32,
    pub chunk_max_chars: usize,
    pub chunk_min_chars: usize,
    pub chunk_overlap_chars: usize,
    pub max_context_chars: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            ollama_base_url: "http://127.0.0.1:11434".to_string(),
            embeddings_model: "nomic-embed-text".to_string(),
            top_k: 6,
            min_score: 0.18,
            chunk_max_chars: 1400,
            chunk_min_chars: 250,
            chunk_overlap_chars: 250,
            max_context_chars: 9000,
        }
    }
}

/// Partial update for [`RagConfig`]. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RagConfigPatch {
    pub ollama_base_url: Option<String>,
    pub embeddings_model: Option<String>,
    pub top_k: Option<usize>,
    pub min_score: Option<f32>,
    pub chunk_max_chars: Option<usize>,
    pub chunk_min_chars: Option<usize>,
    pub chunk_overlap_chars: Option<usize>,
    pub max_context_chars: Option<usize>,
}

/// Root object holding every entity. Owned by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Store {
    pub version: u32,
    pub sources: Vec<Source>,
    pub corpora: Vec<Corpus>,
    /// Conversation selections keyed by thread id.
    pub convo: BTreeMap<String, ConversationSelection>,
    /// Per-source indexes keyed by source id.
    pub index: BTreeMap<String, SourceIndex>,
    pub config: RagConfig,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            sources: Vec::new(),
            corpora: Vec::new(),
            convo: BTreeMap::new(),
            index: BTreeMap::new(),
            config: RagConfig::default(),
        }
    }
}

impl Store {
    pub fn source(&self, id: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn corpus(&self, id: &str) -> Option<&Corpus> {
        self.corpora.iter().find(|c| c.id == id)
    }
}

/// A per-item failure recorded during an indexing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    pub error: String,
}

impl IndexError {
    pub fn for_file(path: &str, err: impl std::fmt::Display) -> Self {
        Self {
            file_path: Some(path.to_string()),
            source_id: None,
            error: err.to_string(),
        }
    }

    pub fn for_source(source_id: &str, err: impl std::fmt::Display) -> Self {
        Self {
            file_path: None,
            source_id: Some(source_id.to_string()),
            error: err.to_string(),
        }
    }
}

/// Summary of an indexing run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexReport {
    /// Number of chunks (re)embedded.
    pub indexed: usize,
    /// Number of files left untouched because their stat was unchanged.
    pub skipped: usize,
    pub errors: Vec<IndexError>,
}

impl IndexReport {
    pub fn merge(&mut self, other: IndexReport) {
        self.indexed += other.indexed;
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
    }
}

/// A numbered citation for one chunk included in the assembled context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub n: usize,
    pub score: f32,
    pub title: String,
    pub path: String,
    pub kind: DocKind,
    pub snippet: String,
}

/// Context string plus the citations actually included in it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub context: String,
    pub sources: Vec<Citation>,
}

/// Aggregate counters over all source indexes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub sources_indexed: usize,
    pub chunks: usize,
    pub updated_at: i64,
}
