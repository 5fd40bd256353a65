//! Filesystem document loader.
//!
//! Resolves file and folder sources into concrete file lists, stats files
//! for change detection, and hands supported files to [`extract`](crate::extract).
//!
//! The indexer only talks to the [`DocumentLoader`] trait so tests (and
//! embedders of this crate) can substitute their own file access.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::{DirEntry, WalkDir};

use crate::config::LoaderConfig;
use crate::extract::{self, DocFormat};

/// Stat metadata used for change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub mtime_ms: i64,
    pub size: u64,
    pub is_file: bool,
}

/// File access needed by the indexer.
pub trait DocumentLoader: Send + Sync {
    /// Whether the file has an extension the loader can extract.
    fn is_supported_file(&self, path: &Path) -> bool {
        is_supported_file(path)
    }

    /// Supported files below `folder`, recursively, skipping dot-prefixed
    /// entries, truncated at `max_files`.
    fn list_files(&self, folder: &Path, max_files: usize) -> Vec<PathBuf>;

    /// Plain text of a supported file.
    fn extract_text(&self, path: &Path) -> Result<String>;

    /// Stat metadata, or `None` when the path cannot be stat'ed.
    fn stat(&self, path: &Path) -> Option<FileStat>;

    /// Stable document id for `path` within `source_id`.
    fn build_doc_id(&self, source_id: &str, path: &Path) -> String {
        build_doc_id(source_id, path)
    }

    /// Upper bound on files taken from one folder source.
    fn max_files(&self) -> usize {
        DEFAULT_MAX_FILES
    }
}

pub const DEFAULT_MAX_FILES: usize = 2000;

/// Extension check: `txt`, `md`, `markdown`, `pdf` (case-insensitive).
pub fn is_supported_file(path: &Path) -> bool {
    DocFormat::from_path(path).is_some()
}

/// `"<sourceId>::<absolute path>"`.
///
/// The path is made absolute against the current directory and `.`/`..`
/// components are folded lexically, so the same file always yields the same
/// id across runs.
pub fn build_doc_id(source_id: &str, path: &Path) -> String {
    format!("{}::{}", source_id, lexical_absolute(path).display())
}

fn lexical_absolute(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// [`DocumentLoader`] backed by the local filesystem.
pub struct FsLoader {
    max_files: usize,
    exclude: GlobSet,
}

impl FsLoader {
    pub fn new(config: &LoaderConfig) -> Result<Self> {
        Ok(Self {
            max_files: config.max_files,
            exclude: build_globset(&config.exclude_globs)?,
        })
    }
}

impl Default for FsLoader {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            exclude: GlobSet::empty(),
        }
    }
}

impl DocumentLoader for FsLoader {
    fn max_files(&self) -> usize {
        self.max_files
    }

    fn list_files(&self, folder: &Path, max_files: usize) -> Vec<PathBuf> {
        let mut out = Vec::new();
        if max_files == 0 {
            return out;
        }

        let walker = WalkDir::new(folder)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            // Unreadable directories are skipped, not fatal.
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    tracing::debug!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(folder).unwrap_or(path);
            if self.exclude.is_match(relative) {
                continue;
            }
            if !is_supported_file(path) {
                continue;
            }

            if out.len() >= max_files {
                tracing::warn!(
                    folder = %folder.display(),
                    max_files,
                    "folder file limit reached; remaining files ignored"
                );
                break;
            }
            out.push(path.to_path_buf());
        }

        out
    }

    fn extract_text(&self, path: &Path) -> Result<String> {
        Ok(extract::extract_text(path)?)
    }

    fn stat(&self, path: &Path) -> Option<FileStat> {
        let metadata = std::fs::metadata(path).ok()?;
        let mtime_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Some(FileStat {
            mtime_ms,
            size: metadata.len(),
            is_file: metadata.is_file(),
        })
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
