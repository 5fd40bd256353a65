//! Budgeted context assembly.
//!
//! Turns ranked chunks into a single context string for the model prompt,
//! with numbered inline citation markers:
//!
//! ```text
//! [#1] Work — guide.md (/home/me/work/guide.md)
//! <snippet>
//!
//! [#2] Scratch
//! <snippet>
//! ```
//!
//! Each block costs its length plus two characters for the separator.
//! Assembly stops at the first block that would push the running total past
//! `max_context_chars`, so the context never exceeds the budget and later
//! (lower-ranked) chunks never leapfrog a rejected one.

use crate::models::{Citation, QueryResult};
use crate::search::ScoredChunk;

/// Maximum snippet length, in characters.
pub const SNIPPET_CHARS: usize = 900;

const BLOCK_SEP: &str = "\n\n";

/// Build the context string and its citation list from ranked chunks.
pub fn build_context(scored: &[ScoredChunk<'_>], max_context_chars: usize) -> QueryResult {
    let mut blocks: Vec<String> = Vec::new();
    let mut sources: Vec<Citation> = Vec::new();
    let mut used = 0usize;
    let mut n = 0usize;

    for item in scored {
        let text = item.chunk.text.trim();
        if text.is_empty() {
            continue;
        }
        n += 1;

        let meta = &item.chunk.meta;
        let snippet: String = text.chars().take(SNIPPET_CHARS).collect();
        let title = if meta.title.is_empty() {
            "Source"
        } else {
            meta.title.as_str()
        };

        let header = if meta.path.is_empty() {
            format!("[#{}] {}", n, title)
        } else {
            format!("[#{}] {} ({})", n, title, meta.path)
        };
        let block = format!("{}\n{}", header, snippet);

        let cost = block.chars().count() + BLOCK_SEP.len();
        if used + cost > max_context_chars {
            break;
        }
        used += cost;

        blocks.push(block);
        sources.push(Citation {
            n,
            score: item.score,
            title: title.to_string(),
            path: meta.path.clone(),
            kind: meta.kind,
            snippet,
        });
    }

    QueryResult {
        context: blocks.join(BLOCK_SEP),
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, ChunkMeta, DocKind};

    fn chunk(id: &str, title: &str, path: &str, text: &str) -> Chunk {
        Chunk {
            chunk_id: id.into(),
            text: text.into(),
            embedding: vec![1.0],
            meta: ChunkMeta {
                source_id: "s".into(),
                doc_id: "d".into(),
                title: title.into(),
                path: path.into(),
                kind: if path.is_empty() {
                    DocKind::Note
                } else {
                    DocKind::File
                },
                idx: 0,
            },
        }
    }

    fn scored<'a>(chunks: &'a [Chunk], scores: &[f32]) -> Vec<ScoredChunk<'a>> {
        chunks
            .iter()
            .zip(scores)
            .map(|(chunk, &score)| ScoredChunk { score, chunk })
            .collect()
    }

    #[test]
    fn test_blocks_and_citations() {
        let chunks = vec![
            chunk("a", "Work — a.md", "/w/a.md", "alpha text"),
            chunk("b", "Scratch", "", "beta text"),
        ];
        let r = build_context(&scored(&chunks, &[0.9, 0.5]), 9000);
        assert_eq!(
            r.context,
            "[#1] Work — a.md (/w/a.md)\nalpha text\n\n[#2] Scratch\nbeta text"
        );
        assert_eq!(r.sources.len(), 2);
        assert_eq!(r.sources[0].n, 1);
        assert_eq!(r.sources[1].kind, DocKind::Note);
        assert_eq!(r.sources[1].path, "");
    }

    #[test]
    fn test_empty_text_skipped_without_consuming_number() {
        let chunks = vec![
            chunk("a", "A", "", "   "),
            chunk("b", "B", "", "real"),
        ];
        let r = build_context(&scored(&chunks, &[0.9, 0.8]), 9000);
        assert_eq!(r.sources.len(), 1);
        assert_eq!(r.sources[0].n, 1);
        assert!(r.context.starts_with("[#1] B"));
    }

    #[test]
    fn test_budget_stops_at_first_overflow() {
        let long = "x".repeat(200);
        let chunks = vec![
            chunk("a", "A", "", "short"),
            chunk("b", "B", "", &long),
            chunk("c", "C", "", "tiny"),
        ];
        // "[#1] A\nshort" = 12 chars, cost 14.
        let r = build_context(&scored(&chunks, &[0.9, 0.8, 0.7]), 100);
        assert_eq!(r.sources.len(), 1);
        assert_eq!(r.context, "[#1] A\nshort");
    }

    #[test]
    fn test_budget_too_small_for_anything() {
        let chunks = vec![chunk("a", "A", "", "text")];
        let r = build_context(&scored(&chunks, &[0.9]), 5);
        assert_eq!(r, QueryResult::default());
    }

    #[test]
    fn test_context_never_exceeds_budget() {
        let chunks: Vec<Chunk> = (0..20)
            .map(|i| chunk(&i.to_string(), "Doc", "/p", &"word ".repeat(40 + i * 7)))
            .collect();
        let scores = vec![0.5; 20];
        for budget in [0, 1, 50, 300, 999, 2500, 9000] {
            let r = build_context(&scored(&chunks, &scores), budget);
            assert!(r.context.chars().count() <= budget);
        }
    }

    #[test]
    fn test_snippet_truncated_to_900_chars() {
        let text = "é".repeat(1200);
        let chunks = vec![chunk("a", "A", "", &text)];
        let r = build_context(&scored(&chunks, &[0.9]), 9000);
        assert_eq!(r.sources[0].snippet.chars().count(), SNIPPET_CHARS);
        assert_eq!(r.context, format!("[#1] A\n{}", "é".repeat(SNIPPET_CHARS)));
    }
}
