//! Removal of local files that have no remote counterpart.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use jwalk::WalkDir;

use crate::error::{Error, Result};
use crate::walk::all_files;

/// Delete every regular file under `root` that is not in `keep`, then prune
/// the directories that became empty. Returns the number of files deleted.
pub fn delete_extra_files(root: &Path, keep: &HashSet<PathBuf>) -> Result<usize> {
    let mut deleted = 0;
    for path in all_files(root)? {
        if keep.contains(&path) {
            continue;
        }
        fs::remove_file(&path).map_err(|e| Error::io(e, "deleting", &path))?;
        tracing::debug!(path = %path.display(), "deleted extra file");
        deleted += 1;
    }

    let pruned = prune_empty_dirs(root)?;
    if deleted > 0 || pruned > 0 {
        tracing::info!(deleted, pruned, root = %root.display(), "cleaned up extra files");
    }
    Ok(deleted)
}

/// Remove empty directories below `root`, deepest first. `root` itself is kept.
pub fn prune_empty_dirs(root: &Path) -> Result<usize> {
    if !root.is_dir() {
        return Ok(0);
    }

    let mut dirs: Vec<PathBuf> = WalkDir::new(root)
        .skip_hidden(false)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.path())
        .collect();
    // Children before parents
    dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));

    let mut removed = 0;
    for dir in dirs {
        let empty = fs::read_dir(&dir)
            .map_err(|e| Error::io(e, "reading", &dir))?
            .next()
            .is_none();
        if empty {
            fs::remove_dir(&dir).map_err(|e| Error::io(e, "removing", &dir))?;
            removed += 1;
        }
    }
    Ok(removed)
}
