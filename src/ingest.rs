//! Index maintenance.
//!
//! Brings the per-source indexes of a [`Store`] up to date for an explicit
//! list of source ids:
//!
//! ```text
//! source ─▶ loader (list/stat/extract) ─▶ normalize ─▶ chunk ─▶ embed ─▶ store.index
//! ```
//!
//! Files are re-embedded only when their mtime or size changed since the
//! last run. Notes carry no file metadata and are re-embedded every time.
//!
//! Failures never abort a run. A file that cannot be extracted or embedded is
//! recorded in [`IndexReport::errors`] and keeps its previous record; a
//! failure affecting a whole source is recorded against the source id.
//!
//! Work is strictly sequential: at most one embedding request is in flight.

use anyhow::{bail, Result};
use std::path::Path;

use crate::chunk::{chunk_text, ChunkOptions};
use crate::connector_fs::{DocumentLoader, FileStat};
use crate::embedding::{EmbedRequest, Embedder};
use crate::models::{
    now_ms, Chunk, ChunkMeta, DocKind, DocumentRecord, IndexError, IndexReport, RagConfig, Source,
    SourceIndex, SourceKind, Store,
};
use crate::text::normalize_whitespace;

/// Index the given sources, mutating only `store.index`.
///
/// Ids that are unknown or name a disabled source are ignored. Ids are
/// processed in the order given, duplicates included.
pub async fn index_sources(
    store: &mut Store,
    source_ids: &[String],
    embedder: &dyn Embedder,
    loader: &dyn DocumentLoader,
) -> IndexReport {
    let config = store.config.clone();
    let mut report = IndexReport::default();

    for id in source_ids {
        let Some(source) = store.source(id).filter(|s| s.enabled).cloned() else {
            tracing::debug!(source_id = %id, "skipping unknown or disabled source");
            continue;
        };

        let result = match source.kind {
            SourceKind::Note => index_note_source(store, &source, &config, embedder).await,
            SourceKind::File | SourceKind::Folder => {
                index_file_source(store, &source, &config, embedder, loader).await
            }
        };

        match result {
            Ok(r) => {
                tracing::info!(
                    source_id = %source.id,
                    kind = %source.kind,
                    indexed = r.indexed,
                    skipped = r.skipped,
                    errors = r.errors.len(),
                    "source indexed"
                );
                report.merge(r);
            }
            Err(e) => {
                tracing::warn!(source_id = %source.id, error = %e, "source indexing failed");
                report.errors.push(IndexError::for_source(&source.id, e));
            }
        }
    }

    report
}

async fn index_note_source(
    store: &mut Store,
    source: &Source,
    config: &RagConfig,
    embedder: &dyn Embedder,
) -> Result<IndexReport> {
    let text = normalize_whitespace(source.note.as_deref().unwrap_or_default());
    let doc_id = format!("{}::note", source.id);
    let title = source_title(source, None);

    let texts = chunk_text(&text, &ChunkOptions::from(config));
    let embeddings = embed_chunks(embedder, config, &texts).await?;
    let chunks = build_chunks(&source.id, &doc_id, &title, "", DocKind::Note, texts, embeddings);
    let indexed = chunks.len();

    let ts = now_ms();
    let record = DocumentRecord {
        doc_id: doc_id.clone(),
        kind: DocKind::Note,
        title,
        path: String::new(),
        mtime_ms: ts,
        size: text.chars().count() as u64,
        chunks,
        updated_at: ts,
    };

    let index = store.index.entry(source.id.clone()).or_default();
    index.docs.insert(doc_id, record);
    finish(index);

    Ok(IndexReport {
        indexed,
        ..Default::default()
    })
}

async fn index_file_source(
    store: &mut Store,
    source: &Source,
    config: &RagConfig,
    embedder: &dyn Embedder,
    loader: &dyn DocumentLoader,
) -> Result<IndexReport> {
    let root = Path::new(&source.path);
    let files = match source.kind {
        SourceKind::File if !source.path.is_empty() && loader.is_supported_file(root) => {
            vec![root.to_path_buf()]
        }
        SourceKind::Folder if !source.path.is_empty() => loader.list_files(root, loader.max_files()),
        _ => Vec::new(),
    };

    let options = ChunkOptions::from(config);
    let mut report = IndexReport::default();
    let index = store.index.entry(source.id.clone()).or_default();

    for file in &files {
        let Some(stat) = loader.stat(file).filter(|st| st.is_file) else {
            continue;
        };

        let doc_id = loader.build_doc_id(&source.id, file);
        if !should_reindex(index.docs.get(&doc_id), &stat) {
            tracing::debug!(%doc_id, "unchanged, skipping");
            report.skipped += 1;
            continue;
        }

        let file_path = file.display().to_string();
        let title = source_title(source, Some(file));

        let raw = match loader.extract_text(file) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %file_path, error = %e, "text extraction failed");
                report.errors.push(IndexError::for_file(&file_path, e));
                continue;
            }
        };

        let clean = normalize_whitespace(&raw);
        let chunks = if clean.is_empty() {
            // Record the stat anyway so the file is skipped next run.
            Vec::new()
        } else {
            let texts = chunk_text(&clean, &options);
            let embeddings = match embed_chunks(embedder, config, &texts).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(path = %file_path, error = %e, "embedding failed");
                    report.errors.push(IndexError::for_file(&file_path, e));
                    continue;
                }
            };
            build_chunks(&source.id, &doc_id, &title, &file_path, DocKind::File, texts, embeddings)
        };

        report.indexed += chunks.len();
        index.docs.insert(
            doc_id.clone(),
            DocumentRecord {
                doc_id,
                kind: DocKind::File,
                title,
                path: file_path,
                mtime_ms: stat.mtime_ms,
                size: stat.size,
                chunks,
                updated_at: now_ms(),
            },
        );
    }

    finish(index);
    Ok(report)
}

/// One batched embedding call for all chunks of a document.
async fn embed_chunks(
    embedder: &dyn Embedder,
    config: &RagConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    let embeddings = embedder
        .embed_texts(&EmbedRequest::from_config(config, texts))
        .await?;
    if embeddings.len() != texts.len() {
        bail!(
            "embedding count mismatch: sent {} texts, got {} vectors",
            texts.len(),
            embeddings.len()
        );
    }
    Ok(embeddings)
}

fn build_chunks(
    source_id: &str,
    doc_id: &str,
    title: &str,
    path: &str,
    kind: DocKind,
    texts: Vec<String>,
    embeddings: Vec<Vec<f32>>,
) -> Vec<Chunk> {
    texts
        .into_iter()
        .zip(embeddings)
        .enumerate()
        .map(|(idx, (text, embedding))| Chunk {
            chunk_id: format!("{}::{}", doc_id, idx),
            text,
            embedding,
            meta: ChunkMeta {
                source_id: source_id.to_string(),
                doc_id: doc_id.to_string(),
                title: title.to_string(),
                path: path.to_string(),
                kind,
                idx,
            },
        })
        .collect()
}

fn finish(index: &mut SourceIndex) {
    index.rebuild_flat_chunks();
    index.updated_at = now_ms();
}

/// A file needs work when it has no record yet or its mtime or size moved.
pub fn should_reindex(previous: Option<&DocumentRecord>, stat: &FileStat) -> bool {
    match previous {
        None => true,
        Some(doc) => doc.mtime_ms != stat.mtime_ms || doc.size != stat.size,
    }
}

/// Human-readable document title.
///
/// Notes use their label (or `"Note"`). Files read
/// `"<label or source basename> — <file basename>"`.
pub fn source_title(source: &Source, file: Option<&Path>) -> String {
    let base = |p: &Path| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| p.display().to_string())
    };

    if source.kind == SourceKind::Note {
        return non_empty_or(&source.label, "Note");
    }

    let prefix = if source.label.is_empty() {
        match (source.path.is_empty(), file) {
            (false, _) => base(Path::new(&source.path)),
            (true, Some(f)) => base(f),
            (true, None) => "Source".to_string(),
        }
    } else {
        source.label.clone()
    };

    match file {
        Some(f) => format!("{} — {}", prefix, base(f)),
        None => prefix,
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
