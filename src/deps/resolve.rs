use std::sync::Arc;

use super::lock::{LockEntry, LockFile, LockedFiles};
use super::manifest::{Dependency, Manifest};
use crate::error::{Error, Result};
use crate::remote::{Asset, Repository};

/// Build a lock file by looking up every dependency's current digests.
///
/// `connect` yields the repository client for a dependency (its own `url`
/// or the configured server). The first failure aborts, so a partial lock
/// is never produced.
pub async fn resolve<C>(manifest: &Manifest, connect: C) -> Result<LockFile>
where
    C: Fn(&Dependency) -> Result<Arc<dyn Repository>>,
{
    let mut lock = LockFile::new();

    for dep in &manifest.dependencies {
        let algorithm = dep.algorithm()?;
        let expanded = dep.expanded_path();
        tracing::info!(
            dependency = %dep.name,
            repository = %dep.repository,
            path = %expanded,
            checksum = %algorithm,
            "resolving"
        );

        let repo = connect(dep)?;
        let assets = find_assets(repo.as_ref(), dep, &expanded).await?;
        if assets.is_empty() {
            return Err(Error::NoAssets {
                repository: dep.repository.clone(),
                path: expanded,
            });
        }

        let mut files = LockedFiles::new();
        for asset in &assets {
            let digest = asset.checksum.get(algorithm).ok_or_else(|| {
                tracing::error!(dependency = %dep.name, asset = %asset.path, %algorithm, "asset has no digest");
                Error::MissingDigest {
                    algorithm: algorithm.name().to_string(),
                }
            })?;
            files.insert(
                asset.normalized_path().to_string(),
                LockEntry::new(algorithm, digest).encode(),
            );
        }

        tracing::debug!(dependency = %dep.name, files = files.len(), "resolved");
        lock.insert(dep.name.clone(), files);
    }

    Ok(lock)
}

/// Recursive dependencies cover everything below the prefix; others name
/// exactly one asset.
async fn find_assets(repo: &dyn Repository, dep: &Dependency, expanded: &str) -> Result<Vec<Asset>> {
    let path = expanded.trim_matches('/');
    let listing_error = |source| Error::Listing {
        repository: dep.repository.clone(),
        path: path.to_string(),
        source,
    };

    if dep.recursive {
        repo.list_assets(&dep.repository, path, true)
            .await
            .map_err(listing_error)
    } else {
        Ok(repo
            .find_asset(&dep.repository, path)
            .await
            .map_err(listing_error)?
            .into_iter()
            .collect())
    }
}
