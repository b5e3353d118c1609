use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Resolve an archive entry name against the extraction root.
///
/// The entry is normalised lexically. Absolute names and names whose `..`
/// components climb above `dest` are rejected.
pub fn resolve_entry_path(dest: &Path, entry: &Path) -> Result<PathBuf> {
    let mut relative = PathBuf::new();

    for component in entry.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(Error::PathTraversal(entry.to_path_buf()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::PathTraversal(entry.to_path_buf()));
            }
        }
    }

    Ok(dest.join(relative))
}
