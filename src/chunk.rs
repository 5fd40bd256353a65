//! Paragraph-boundary text chunker with overlap.
//!
//! Splits normalized document text into chunk strings bounded by
//! `max_chars`. Splitting only ever happens on paragraph boundaries
//! (blank lines), so a chunk never starts or ends mid-paragraph.
//!
//! # Algorithm
//!
//! 1. Normalize the text (see [`normalize_whitespace`]). Empty → no chunks.
//! 2. Split on blank lines into paragraphs, dropping empty ones.
//! 3. Accumulate paragraphs into a buffer while `buffer + "\n\n" + paragraph`
//!    fits in `max_chars`.
//! 4. When it does not fit and the buffer is still shorter than `min_chars`,
//!    the paragraph is merged anyway (if it is itself under `max_chars`) and
//!    the buffer flushed, accepting a small overflow over an undersized chunk.
//!    Otherwise the buffer is flushed and the paragraph starts a new one.
//! 5. With `overlap_chars > 0`, every chunk after the first is prefixed with
//!    the last `overlap_chars` characters of the previously emitted chunk.
//!
//! A single paragraph longer than `max_chars` is kept whole.
//!
//! All lengths are counted in characters, not bytes.
//!
//! # Example
//!
//! ```rust
//! use ragdesk::chunk::{chunk_text, ChunkOptions};
//!
//! let opts = ChunkOptions { max_chars: 1400, min_chars: 250, overlap_chars: 250 };
//! let chunks = chunk_text("Hello world.\n\nThis is a test.", &opts);
//! assert_eq!(chunks, vec!["Hello world.\n\nThis is a test.".to_string()]);
//! ```

use regex::Regex;
use std::sync::LazyLock;

use crate::models::RagConfig;
use crate::text::normalize_whitespace;

static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());

const PARAGRAPH_SEP: &str = "\n\n";

/// Size bounds for [`chunk_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    pub max_chars: usize,
    pub min_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            max_chars: 1400,
            min_chars: 250,
            overlap_chars: 250,
        }
    }
}

impl From<&RagConfig> for ChunkOptions {
    fn from(cfg: &RagConfig) -> Self {
        Self {
            max_chars: cfg.chunk_max_chars,
            min_chars: cfg.chunk_min_chars,
            overlap_chars: cfg.chunk_overlap_chars,
        }
    }
}

/// Split text into ordered, size-bounded chunks on paragraph boundaries.
pub fn chunk_text(text: &str, opts: &ChunkOptions) -> Vec<String> {
    let chunks = pack_paragraphs(text, opts);
    if opts.overlap_chars == 0 || chunks.len() < 2 {
        return chunks;
    }
    apply_overlap(chunks, opts.overlap_chars)
}

/// Steps 1–4: greedy paragraph packing without overlap.
fn pack_paragraphs(text: &str, opts: &ChunkOptions) -> Vec<String> {
    let clean = normalize_whitespace(text);
    if clean.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut buf = String::new();

    for para in PARAGRAPH_BREAK
        .split(&clean)
        .map(str::trim)
        .filter(|p| !p.is_empty())
    {
        if buf.is_empty() {
            buf.push_str(para);
            continue;
        }

        let buf_len = char_len(&buf);
        let para_len = char_len(para);

        if buf_len + PARAGRAPH_SEP.len() + para_len <= opts.max_chars {
            buf.push_str(PARAGRAPH_SEP);
            buf.push_str(para);
        } else if buf_len < opts.min_chars && para_len < opts.max_chars {
            buf.push_str(PARAGRAPH_SEP);
            buf.push_str(para);
            flush(&mut buf, &mut chunks);
        } else {
            flush(&mut buf, &mut chunks);
            buf.push_str(para);
        }
    }
    flush(&mut buf, &mut chunks);

    chunks
}

fn flush(buf: &mut String, chunks: &mut Vec<String>) {
    let trimmed = buf.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    buf.clear();
}

fn apply_overlap(chunks: Vec<String>, overlap_chars: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let joined = match out.last() {
            None => chunk,
            Some(prev) => {
                let tail = tail_chars(prev, overlap_chars);
                format!("{}{}{}", tail, PARAGRAPH_SEP, chunk).trim().to_string()
            }
        };
        out.push(joined);
    }
    out
}

/// The last `n` characters of `s` (all of `s` when shorter).
fn tail_chars(s: &str, n: usize) -> &str {
    let len = char_len(s);
    if n >= len {
        return s;
    }
    let start = s
        .char_indices()
        .nth(len - n)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &s[start..]
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
