//! Whitespace normalization.
//!
//! Every piece of text that enters the index (file bodies, note text, query
//! strings) passes through [`normalize_whitespace`] first, so chunk
//! boundaries and change detection never depend on line-ending or
//! indentation noise.

use regex::Regex;
use std::sync::LazyLock;

static TRAILING_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+\n").unwrap());
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static SPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());

/// Collapse whitespace variance into a canonical form.
///
/// - `\r\n` becomes `\n`
/// - spaces/tabs before a newline are dropped
/// - three or more consecutive newlines become exactly two
/// - runs of two or more spaces/tabs become one space
/// - leading and trailing whitespace is trimmed
///
/// The function is idempotent.
pub fn normalize_whitespace(s: &str) -> String {
    let s = s.replace("\r\n", "\n");
    let s = TRAILING_WS.replace_all(&s, "\n");
    let s = BLANK_RUNS.replace_all(&s, "\n\n");
    let s = SPACE_RUNS.replace_all(&s, " ");
    s.trim().to_string()
}
