//! Corpus resolution: from selected corpus ids to candidate chunks.
//!
//! A corpus only references sources by id. At query time those references
//! are narrowed to sources that still exist and are enabled, deduplicated
//! across corpora, and expanded into each source's flat chunk list.

use std::collections::HashSet;

use crate::models::{Chunk, Store};

/// Enabled source ids of one corpus, in corpus order. Unknown corpus → empty.
pub fn enabled_source_ids_for_corpus<'a>(store: &'a Store, corpus_id: &str) -> Vec<&'a str> {
    let Some(corpus) = store.corpus(corpus_id) else {
        return Vec::new();
    };
    let enabled: HashSet<&str> = store
        .sources
        .iter()
        .filter(|s| s.enabled)
        .map(|s| s.id.as_str())
        .collect();
    corpus
        .source_ids
        .iter()
        .map(String::as_str)
        .filter(|id| enabled.contains(id))
        .collect()
}

/// Candidate chunks for a corpus selection.
///
/// Sources are taken first-seen across corpora, each at most once; sources
/// without an index entry contribute nothing.
pub fn chunks_for_corpora<'a>(store: &'a Store, corpus_ids: &[String]) -> Vec<&'a Chunk> {
    let mut seen = HashSet::new();
    let mut chunks = Vec::new();

    for corpus_id in corpus_ids {
        for source_id in enabled_source_ids_for_corpus(store, corpus_id) {
            if !seen.insert(source_id) {
                continue;
            }
            if let Some(index) = store.index.get(source_id) {
                chunks.extend(index.chunks.iter());
            }
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkMeta, Corpus, DocKind, Source, SourceIndex, SourceKind};

    fn source(id: &str, enabled: bool) -> Source {
        Source {
            id: id.into(),
            kind: SourceKind::Note,
            label: id.into(),
            path: String::new(),
            note: Some(String::new()),
            enabled,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn corpus(id: &str, sources: &[&str]) -> Corpus {
        Corpus {
            id: id.into(),
            name: id.into(),
            source_ids: sources.iter().map(|s| s.to_string()).collect(),
            created_at: 0,
            updated_at: 0,
        }
    }

    fn index_with(source_id: &str, n: usize) -> SourceIndex {
        SourceIndex {
            updated_at: 1,
            docs: Default::default(),
            chunks: (0..n)
                .map(|i| Chunk {
                    chunk_id: format!("{}::note::{}", source_id, i),
                    text: "t".into(),
                    embedding: vec![1.0],
                    meta: ChunkMeta {
                        source_id: source_id.into(),
                        doc_id: format!("{}::note", source_id),
                        title: source_id.into(),
                        path: String::new(),
                        kind: DocKind::Note,
                        idx: i,
                    },
                })
                .collect(),
        }
    }

    fn fixture() -> Store {
        let mut store = Store::default();
        store.sources = vec![source("s1", true), source("s2", false), source("s3", true)];
        store.corpora = vec![corpus("c1", &["s1", "s2", "ghost"]), corpus("c2", &["s3", "s1"])];
        store.index.insert("s1".into(), index_with("s1", 2));
        store.index.insert("s2".into(), index_with("s2", 5));
        store.index.insert("s3".into(), index_with("s3", 1));
        store
    }

    #[test]
    fn test_enabled_source_ids_for_corpus() {
        let store = fixture();
        assert_eq!(enabled_source_ids_for_corpus(&store, "c1"), vec!["s1"]);
        assert_eq!(enabled_source_ids_for_corpus(&store, "c2"), vec!["s3", "s1"]);
        assert!(enabled_source_ids_for_corpus(&store, "nope").is_empty());
    }

    #[test]
    fn test_union_dedups_sources() {
        let store = fixture();
        let ids: Vec<&str> = chunks_for_corpora(&store, &["c1".into(), "c2".into()])
            .iter()
            .map(|c| c.chunk_id.as_str())
            .collect();
        assert_eq!(ids, vec!["s1::note::0", "s1::note::1", "s3::note::0"]);
    }

    #[test]
    fn test_disabled_source_excluded() {
        let mut store = fixture();
        store.sources[0].enabled = false;
        let chunks = chunks_for_corpora(&store, &["c1".into()]);
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_missing_index_entry_skipped() {
        let mut store = fixture();
        store.index.remove("s3");
        assert_eq!(chunks_for_corpora(&store, &["c2".into()]).len(), 2);
    }
}
