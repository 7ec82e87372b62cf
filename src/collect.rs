//! Source tree collection.
//!
//! Walks the ingestion root depth-first (pre-order, siblings in file-name
//! order) and returns every regular file that survives the exclusion rules.
//! An entry whose bare name is an excluded directory or file name, or whose
//! extension is excluded, is skipped together with everything beneath it.
//!
//! Traversal is driven by `walkdir`, which keeps pending directories on an
//! explicit stack, so very deep trees do not grow the call stack.
//!
//! Symbolic links are not descended into unless
//! [`ExclusionRules::follow_symlinks`] is set; a link to a regular file is
//! still collected either way.
//!
//! Any unreadable entry (a dangling link included) aborts the whole walk:
//! callers either get the complete file list or a
//! [`PipelineError::Filesystem`].

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::PipelineError;
use crate::models::SourceFile;

/// Names and extensions that are never ingested.
#[derive(Debug, Clone, Default)]
pub struct ExclusionRules {
    dirs: HashSet<String>,
    files: HashSet<String>,
    /// Stored with the leading dot, e.g. `.png`.
    extensions: HashSet<String>,
    follow_symlinks: bool,
}

impl ExclusionRules {
    pub fn new(
        dirs: impl IntoIterator<Item = String>,
        files: impl IntoIterator<Item = String>,
        extensions: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            dirs: dirs.into_iter().collect(),
            files: files.into_iter().collect(),
            extensions: extensions
                .into_iter()
                .map(|e| {
                    if e.starts_with('.') {
                        e
                    } else {
                        format!(".{}", e)
                    }
                })
                .collect(),
            follow_symlinks: false,
        }
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// True if an entry with this bare name must be skipped.
    ///
    /// All three lists apply to every entry kind, so a directory called
    /// `logo.png` is skipped just like a file would be.
    pub fn is_excluded(&self, name: &OsStr) -> bool {
        let name_str = name.to_string_lossy();
        if self.dirs.contains(name_str.as_ref()) || self.files.contains(name_str.as_ref()) {
            return true;
        }
        match Path::new(name).extension() {
            Some(ext) => self
                .extensions
                .contains(&format!(".{}", ext.to_string_lossy())),
            None => false,
        }
    }
}

/// Collect all ingestible file paths under `root`.
///
/// Returned paths are `root`-joined (`root/src/main.rs`), in pre-order.
pub fn collect(root: &Path, rules: &ExclusionRules) -> Result<Vec<PathBuf>, PipelineError> {
    let meta = std::fs::metadata(root).map_err(|e| PipelineError::filesystem(root, e))?;
    if !meta.is_dir() {
        return Err(PipelineError::filesystem(
            root,
            std::io::Error::other("ingestion root is not a directory"),
        ));
    }

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(rules.follow_symlinks)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !rules.is_excluded(entry.file_name()));

    let mut paths = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                let message = err.to_string();
                let io = err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other(message));
                return Err(PipelineError::filesystem(path, io));
            }
        };

        if entry.file_type().is_file() {
            paths.push(entry.into_path());
        } else if entry.path_is_symlink() {
            // Not followed: keep links to regular files, skip links to directories.
            let target = std::fs::metadata(entry.path())
                .map_err(|e| PipelineError::filesystem(entry.path(), e))?;
            if target.is_file() {
                paths.push(entry.into_path());
            }
        }
    }

    debug!(root = %root.display(), files = paths.len(), "collected source files");
    Ok(paths)
}

/// Read each collected path into a [`SourceFile`].
///
/// Content that is not valid UTF-8 is decoded lossily rather than dropped.
pub fn read_sources(root: &Path, paths: &[PathBuf]) -> Result<Vec<SourceFile>, PipelineError> {
    paths
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path).map_err(|e| PipelineError::filesystem(path, e))?;
            Ok(SourceFile {
                path: path.clone(),
                relative_path: relative_path(root, path),
                raw_content: String::from_utf8_lossy(&bytes).into_owned(),
            })
        })
        .collect()
}

/// `/`-joined path of `path` relative to `root`, regardless of platform.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
