use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use super::{select_listed, Asset, ByteStream, RemoteError, Repository, UploadComponent};
use crate::archive::resolve_entry_path;
use crate::checksum::Checksum;
use crate::glob::GlobFilter;
use crate::pipe::{pipe, PIPE_CAPACITY};
use crate::walk::collect_files;

/// Repository served from a local directory.
///
/// Each top-level directory under `root` is a repository; files below it are
/// its assets. Digests are computed when listing.
#[derive(Debug, Clone)]
pub struct LocalRepository {
    root: PathBuf,
}

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn repository_dir(&self, repository: &str) -> Result<PathBuf, RemoteError> {
        let dir = self.root.join(repository);
        if repository.is_empty() || !dir.is_dir() {
            return Err(RemoteError::RepositoryNotFound(repository.to_string()));
        }
        Ok(dir)
    }
}

fn describe(repository: &str, path: &Path, remote_path: String) -> io::Result<Asset> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    let checksum = Checksum::of_reader(io::BufReader::new(file))?;
    Ok(Asset {
        id: remote_path.clone(),
        repository: repository.to_string(),
        download_url: format!("file://{}", path.display()),
        path: format!("/{}", remote_path),
        checksum,
        size,
    })
}

fn scan(repo_dir: &Path, repository: &str, base: &str) -> Result<Vec<Asset>, RemoteError> {
    let target = if base.is_empty() { repo_dir.to_path_buf() } else { repo_dir.join(base) };

    if target.is_file() {
        return Ok(vec![describe(repository, &target, base.to_string())?]);
    }
    if !target.is_dir() {
        return Ok(Vec::new());
    }

    let files = collect_files(&target, &GlobFilter::match_all())
        .map_err(|e| RemoteError::Io(io::Error::other(e.to_string())))?;
    files
        .into_iter()
        .map(|f| {
            let remote = if base.is_empty() { f.relative } else { format!("{}/{}", base, f.relative) };
            describe(repository, &f.path, remote).map_err(RemoteError::from)
        })
        .collect()
}

#[async_trait]
impl Repository for LocalRepository {
    async fn list_assets(&self, repository: &str, path: &str, recursive: bool) -> Result<Vec<Asset>, RemoteError> {
        let repo_dir = self.repository_dir(repository)?;
        let repository = repository.to_string();
        let base = path.trim_matches('/').to_string();
        let scan_base = base.clone();

        let assets = tokio::task::spawn_blocking(move || scan(&repo_dir, &repository, &scan_base))
            .await
            .map_err(io::Error::other)??;
        Ok(select_listed(assets, &base, recursive))
    }

    async fn download(&self, asset: &Asset) -> Result<ByteStream, RemoteError> {
        let path = asset
            .download_url
            .strip_prefix("file://")
            .map(PathBuf::from)
            .ok_or_else(|| RemoteError::AssetNotFound(asset.path.clone()))?;
        if !path.is_file() {
            return Err(RemoteError::AssetNotFound(asset.path.clone()));
        }

        let (mut writer, reader) = pipe(PIPE_CAPACITY);
        tokio::task::spawn_blocking(move || {
            let copied = File::open(&path).and_then(|mut f| io::copy(&mut f, &mut writer));
            if let Err(e) = copied {
                writer.fail(e);
            }
        });
        Ok(Box::pin(reader))
    }

    async fn upload_component(&self, component: UploadComponent) -> Result<(), RemoteError> {
        let repo_dir = self.repository_dir(&component.repository)?;
        let dir = repo_dir.join(component.directory.trim_matches('/'));

        for asset in component.assets {
            let target = resolve_entry_path(&dir, Path::new(&asset.path))
                .map_err(|e| RemoteError::Io(io::Error::new(io::ErrorKind::InvalidInput, e.to_string())))?;
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            let mut file = tokio::fs::File::create(&target).await?;
            let mut body = asset.body;
            let mut written: io::Result<()> = Ok(());
            while let Some(chunk) = body.next().await {
                written = match chunk {
                    Ok(bytes) => file.write_all(&bytes).await,
                    Err(e) => Err(e),
                };
                if written.is_err() {
                    break;
                }
            }
            if written.is_ok() {
                written = file.flush().await;
            }
            if let Err(e) = written {
                drop(file);
                let _ = tokio::fs::remove_file(&target).await;
                return Err(e.into());
            }
            tracing::debug!(path = %target.display(), "stored uploaded asset");
        }

        Ok(())
    }
}
