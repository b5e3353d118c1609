//! Remote path arguments and local target resolution.

use std::path::{Path, PathBuf};

use crate::archive::{resolve_entry_path, ArchiveFormat};
use crate::checksum::{ChecksumAlgorithm, Validator};
use crate::error::{Error, Result};
use crate::remote::relative_to;

/// Placeholder replaced by the digest of the `--key-from` file.
pub const KEY_PLACEHOLDER: &str = "{key}";

/// Split `repository/path` on the first slash. The path may be empty
/// (`repository/`) but the slash is required.
pub fn parse_repository_path(arg: &str) -> Result<(String, String)> {
    let (repository, path) = arg
        .split_once('/')
        .ok_or_else(|| Error::argument(format!("invalid argument '{}': expected repository/path", arg)))?;
    if repository.is_empty() {
        return Err(Error::argument(format!("invalid argument '{}': missing repository name", arg)));
    }
    Ok((repository.to_string(), path.trim_matches('/').to_string()))
}

/// Like [`parse_repository_path`], but a bare repository name uploads to its root.
pub fn parse_upload_destination(arg: &str) -> Result<(String, String)> {
    if !arg.contains('/') && !arg.is_empty() {
        return Ok((arg.to_string(), String::new()));
    }
    parse_repository_path(arg)
}

/// `folder/name.tar.gz` -> `("folder", "name.tar.gz")` when the last segment is
/// an archive name.
pub fn split_archive_name(path: &str) -> Option<(&str, &str)> {
    let path = path.trim_matches('/');
    let (folder, name) = match path.rsplit_once('/') {
        Some((folder, name)) => (folder, name),
        None => ("", path),
    };
    ArchiveFormat::has_archive_suffix(name).then_some((folder, name))
}

/// Replace `{key}` in `input` with the sha256 of `key_from`.
///
/// Without a key file the input is returned untouched.
pub fn apply_key_template(input: &str, key_from: Option<&Path>) -> Result<String> {
    let Some(key_file) = key_from else {
        return Ok(input.to_string());
    };
    if !input.contains(KEY_PLACEHOLDER) {
        return Err(Error::argument(format!(
            "'{}' must contain {} when --key-from is used",
            input, KEY_PLACEHOLDER
        )));
    }
    let key = Validator::for_algorithm(ChecksumAlgorithm::Sha256).compute_digest(key_file)?;
    tracing::debug!(key_file = %key_file.display(), %key, "expanded key template");
    Ok(input.replace(KEY_PLACEHOLDER, &key))
}

/// Local file for a remote asset path below `base`.
///
/// With `flatten`, the `base/` prefix is dropped; otherwise the full
/// normalized remote path is kept. Remote paths that would escape `dest`
/// are rejected like archive entries.
pub fn local_target(dest: &Path, asset_path: &str, base: &str, flatten: bool) -> Result<PathBuf> {
    let normalized = asset_path.trim_start_matches('/');
    let relative = if flatten && !base.trim_matches('/').is_empty() {
        relative_to(normalized, base)
    } else {
        normalized
    };
    resolve_entry_path(dest, Path::new(relative))
}
