//! Local directory enumeration shared by uploads, archives and cleanup.

use std::io;
use std::path::{Path, PathBuf};

use jwalk::WalkDir;

use crate::error::{Error, Result};
use crate::glob::GlobFilter;

/// A regular file found under a walk root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Full path on disk.
    pub path: PathBuf,
    /// Slash-separated path relative to the walk root.
    pub relative: String,
    pub size: u64,
}

/// List regular files under `root` in sorted order, keeping those whose
/// relative path passes `filter`.
pub fn collect_files(root: &Path, filter: &GlobFilter) -> Result<Vec<LocalFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .sort(true)
        .skip_hidden(false) // Dotfiles are regular artifacts here
        .follow_links(false)
    {
        let entry = entry.map_err(|e| Error::io(io::Error::other(e.to_string()), "walking", root))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = relative_slash_path(root, &path);
        if !filter.matches(&relative) {
            continue;
        }

        let size = std::fs::metadata(&path)
            .map_err(|e| Error::io(e, "reading metadata of", &path))?
            .len();
        files.push(LocalFile { path, relative, size });
    }

    Ok(files)
}

/// All regular files under `root`, unfiltered. A missing root yields nothing.
pub fn all_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    Ok(collect_files(root, &GlobFilter::match_all())?
        .into_iter()
        .map(|f| f.path)
        .collect())
}

/// `path` relative to `root`, joined with forward slashes.
pub fn relative_slash_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
