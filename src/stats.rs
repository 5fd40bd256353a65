//! Index statistics.
//!
//! Summarizes what is indexed: how many sources have searchable chunks, the
//! total chunk count, and when an index was last touched. Used by
//! `ragdesk index` / `ragdesk status` and by the service overview.

use crate::models::{Corpus, IndexStatus, RagConfig, Source, Store};

/// Aggregate counters over every per-source index.
///
/// A source counts as indexed only when its flat chunk list is non-empty.
/// `updated_at` is the latest index stamp, or `0` with no entries.
pub fn index_status(store: &Store) -> IndexStatus {
    let mut status = IndexStatus::default();
    for index in store.index.values() {
        if !index.chunks.is_empty() {
            status.sources_indexed += 1;
        }
        status.chunks += index.chunks.len();
        status.updated_at = status.updated_at.max(index.updated_at);
    }
    status
}

/// Human-readable summary for terminal output.
pub fn render_status(
    status: &IndexStatus,
    sources: &[Source],
    corpora: &[Corpus],
    config: &RagConfig,
) -> String {
    let enabled = sources.iter().filter(|s| s.enabled).count();
    let last = if status.updated_at > 0 {
        chrono::DateTime::from_timestamp_millis(status.updated_at)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    } else {
        "never".to_string()
    };

    let mut out = String::new();
    out.push_str("ragdesk — Index Status\n");
    out.push_str("======================\n\n");
    out.push_str(&format!(
        "  Sources:     {} ({} enabled)\n",
        sources.len(),
        enabled
    ));
    out.push_str(&format!("  Corpora:     {}\n", corpora.len()));
    out.push_str(&format!("  Indexed:     {}\n", status.sources_indexed));
    out.push_str(&format!("  Chunks:      {}\n", status.chunks));
    out.push_str(&format!("  Last index:  {}\n", last));
    out.push_str(&format!(
        "  Model:       {} @ {}\n",
        config.embeddings_model, config.ollama_base_url
    ));
    out
}
