//! Brute-force semantic retrieval over a corpus selection.
//!
//! # Pipeline
//!
//! 1. Normalize the query. Blank queries return an empty result without
//!    contacting the embedding service.
//! 2. Collect candidate chunks for the selected corpora
//!    ([`chunks_for_corpora`]). No candidates → empty result, again without
//!    an embedding call.
//! 3. Embed the query and score every candidate by cosine similarity.
//! 4. Keep the top `top_k` ([`top_k`]), then drop anything under `min_score`.
//! 5. Assemble the budgeted context ([`build_context`]).
//!
//! There is no approximate index: every candidate is scored on every query.
//!
//! # Ordering
//!
//! Results are sorted by score descending. Ties are broken by ascending
//! chunk id, then by candidate order, so identical inputs always rank
//! identically. A NaN score ranks as `0.0`.

use anyhow::Result;
use std::cmp::Ordering;

use crate::context::build_context;
use crate::corpus::chunks_for_corpora;
use crate::embedding::{cosine_similarity, embed_query, Embedder};
use crate::models::{Chunk, QueryResult, Store};
use crate::text::normalize_whitespace;

/// A candidate chunk paired with its similarity to the query.
#[derive(Debug, Clone, Copy)]
pub struct ScoredChunk<'a> {
    pub score: f32,
    pub chunk: &'a Chunk,
}

fn rank_score(score: f32) -> f32 {
    if score.is_nan() {
        0.0
    } else {
        score
    }
}

/// The `k` highest-scoring items, best first. `k == 0` → empty.
pub fn top_k(mut items: Vec<ScoredChunk<'_>>, k: usize) -> Vec<ScoredChunk<'_>> {
    if k == 0 {
        return Vec::new();
    }
    // Stable sort keeps candidate order as the last tie-break.
    items.sort_by(|a, b| {
        rank_score(b.score)
            .partial_cmp(&rank_score(a.score))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk.chunk_id.cmp(&b.chunk.chunk_id))
    });
    items.truncate(k);
    items
}

/// Score the selection's chunks against an already-normalized query and
/// keep the top `top_k` with `score >= min_score`.
pub async fn retrieve_top_chunks<'a>(
    store: &'a Store,
    corpus_ids: &[String],
    query_text: &str,
    embedder: &dyn Embedder,
) -> Result<Vec<ScoredChunk<'a>>> {
    let candidates = chunks_for_corpora(store, corpus_ids);
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let config = &store.config;
    let query_embedding = embed_query(embedder, config, query_text).await?;

    let scored: Vec<ScoredChunk<'a>> = candidates
        .into_iter()
        .map(|chunk| ScoredChunk {
            score: cosine_similarity(&query_embedding, &chunk.embedding),
            chunk,
        })
        .collect();
    let total = scored.len();

    let kept: Vec<ScoredChunk<'a>> = top_k(scored, config.top_k)
        .into_iter()
        .filter(|s| rank_score(s.score) >= config.min_score)
        .collect();

    tracing::debug!(candidates = total, kept = kept.len(), "retrieval scored");
    Ok(kept)
}

/// Retrieve and assemble context for `query_text` over `corpus_ids`.
///
/// Embedding failures propagate; nothing is mutated.
pub async fn query(
    store: &Store,
    corpus_ids: &[String],
    query_text: &str,
    embedder: &dyn Embedder,
) -> Result<QueryResult> {
    let query_text = normalize_whitespace(query_text);
    if query_text.is_empty() {
        return Ok(QueryResult::default());
    }

    let top = retrieve_top_chunks(store, corpus_ids, &query_text, embedder).await?;
    Ok(build_context(&top, store.config.max_context_chars))
}
