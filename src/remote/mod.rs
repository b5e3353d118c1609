//! Remote repository abstraction.
//!
//! The transfer engine only talks to a [`Repository`]. [`NexusClient`] speaks
//! the Nexus REST API; [`LocalRepository`] serves a directory tree as if it
//! were a repository server (offline mirrors, tests).

mod local;
mod nexus;

pub use local::LocalRepository;
pub use nexus::NexusClient;

use std::io;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::checksum::Checksum;
use crate::config::Config;
use crate::pipe::PipeReader;

/// Streamed response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Errors reported by repository implementations.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("repository '{0}' not found")]
    RepositoryNotFound(String),

    #[error("asset '{0}' not found")]
    AssetNotFound(String),

    #[error("{operation} failed with status {status}: {message}")]
    Status {
        operation: &'static str,
        status: u16,
        message: String,
    },

    #[error("invalid repository URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A remote file descriptor as returned by asset search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub repository: String,
    /// Slash separated, possibly with a leading slash.
    pub path: String,
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub checksum: Checksum,
    #[serde(default, rename = "fileSize")]
    pub size: u64,
}

impl Asset {
    /// Path without its leading slash.
    pub fn normalized_path(&self) -> &str {
        self.path.trim_start_matches('/')
    }

    /// Path relative to `base`, or the normalized path when it is not under `base`.
    pub fn relative_path(&self, base: &str) -> &str {
        relative_to(self.normalized_path(), base)
    }
}

/// Strip `base/` from the front of `path` (both slash separated).
pub fn relative_to<'a>(path: &'a str, base: &str) -> &'a str {
    let path = path.trim_start_matches('/');
    let base = base.trim_matches('/');
    if base.is_empty() {
        return path;
    }
    path.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(path)
}

/// One file inside an [`UploadComponent`].
#[derive(Debug)]
pub struct UploadAsset {
    /// Path of the file below the component directory.
    pub path: String,
    /// Streamed file content.
    pub body: PipeReader,
}

impl UploadAsset {
    /// Final path segment, used as the multipart file name.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// A multipart component upload: files placed under one directory.
#[derive(Debug)]
pub struct UploadComponent {
    pub repository: String,
    /// Remote directory, without leading or trailing slashes. May be empty.
    pub directory: String,
    pub assets: Vec<UploadAsset>,
}

/// Remote raw repository operations used by the transfer engine.
#[async_trait]
pub trait Repository: Send + Sync {
    // ========== Listing ==========

    /// List assets below `path` in `repository`.
    ///
    /// Returns the direct children of `path` (every descendant when `recursive`),
    /// or the asset whose path is exactly `path` when `path` names a file.
    /// An empty `path` means the repository root.
    async fn list_assets(&self, repository: &str, path: &str, recursive: bool) -> Result<Vec<Asset>, RemoteError>;

    /// Look up a single asset by exact path.
    async fn find_asset(&self, repository: &str, path: &str) -> Result<Option<Asset>, RemoteError> {
        // Default implementation using list_assets
        let wanted = path.trim_matches('/');
        let assets = self.list_assets(repository, wanted, false).await?;
        Ok(assets.into_iter().find(|a| a.normalized_path() == wanted))
    }

    // ========== Transfer ==========

    /// Open the content of `asset` as a byte stream.
    async fn download(&self, asset: &Asset) -> Result<ByteStream, RemoteError>;

    /// Upload a component. A missing repository is [`RemoteError::RepositoryNotFound`].
    async fn upload_component(&self, component: UploadComponent) -> Result<(), RemoteError>;
}

/// Keep the assets that sit below `path` according to the listing contract.
pub(crate) fn select_listed(assets: Vec<Asset>, path: &str, recursive: bool) -> Vec<Asset> {
    let base = path.trim_matches('/');
    assets
        .into_iter()
        .filter(|asset| {
            let p = asset.normalized_path();
            if base.is_empty() {
                return recursive || !p.contains('/');
            }
            if p == base {
                return true;
            }
            match p.strip_prefix(base).and_then(|rest| rest.strip_prefix('/')) {
                Some(rest) => recursive || !rest.contains('/'),
                None => false,
            }
        })
        .collect()
}

/// Build a repository client for `config.url`.
///
/// `file://` URLs are served from the local filesystem; anything else is a
/// Nexus server.
pub fn connect(config: &Config) -> Result<Arc<dyn Repository>, RemoteError> {
    if let Some(root) = config.url.strip_prefix("file://") {
        return Ok(Arc::new(LocalRepository::new(root)));
    }
    Ok(Arc::new(NexusClient::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(path: &str) -> Asset {
        Asset {
            path: path.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(relative_to("/docs/a/b.txt", "docs"), "a/b.txt");
        assert_eq!(relative_to("/docs/a/b.txt", "/docs/a/"), "b.txt");
        assert_eq!(relative_to("/docs/a/b.txt", ""), "docs/a/b.txt");
        // Sibling prefixes are not stripped
        assert_eq!(relative_to("docs2/x", "docs"), "docs2/x");
    }

    #[test]
    fn test_select_listed_direct_children() {
        let assets = vec![
            asset("/docs/a.txt"),
            asset("/docs/sub/b.txt"),
            asset("/docsx/c.txt"),
            asset("/other/d.txt"),
        ];
        let direct = select_listed(assets.clone(), "docs", false);
        assert_eq!(direct, vec![asset("/docs/a.txt")]);

        let all = select_listed(assets, "docs/", true);
        assert_eq!(all, vec![asset("/docs/a.txt"), asset("/docs/sub/b.txt")]);
    }

    #[test]
    fn test_select_listed_exact_file() {
        let assets = vec![asset("/docs/example-1.0.0.txt")];
        let found = select_listed(assets, "docs/example-1.0.0.txt", false);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_asset_deserializes_search_item() {
        let json = r#"{
            "downloadUrl": "http://nexus/repository/libs/docs/a.txt",
            "path": "docs/a.txt",
            "id": "bGlicz",
            "repository": "libs",
            "format": "raw",
            "checksum": {"sha1": "abc", "sha256": "def"},
            "fileSize": 42
        }"#;
        let asset: Asset = serde_json::from_str(json).unwrap();
        assert_eq!(asset.size, 42);
        assert_eq!(asset.checksum.sha256.as_deref(), Some("def"));
        assert_eq!(asset.checksum.md5, None);
        assert_eq!(asset.download_url, "http://nexus/repository/libs/docs/a.txt");
    }
}
