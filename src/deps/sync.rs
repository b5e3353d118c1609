use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::lock::{LockEntry, LockFile};
use super::manifest::{Dependency, Manifest};
use crate::checksum::{digests_match, Validator};
use crate::error::{Error, Result};
use crate::remote::Repository;
use crate::transfer::{delete_extra_files, download_folder, FolderStatus, TransferOptions, TransferStatus};

/// Knobs for [`sync`].
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Remove files under output directories that no lock entry tracks.
    pub cleanup: bool,
    pub quiet: bool,
    /// Concurrent downloads per dependency; `None` uses the default.
    pub concurrency: Option<usize>,
}

/// Totals of a successful sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub dependencies: usize,
    pub files_verified: usize,
    pub deleted: usize,
}

/// Download every dependency and verify it against the lock file.
///
/// All lock sections are checked before any network I/O. Dependencies are
/// processed in manifest order and the first download failure or checksum
/// mismatch stops the sync.
pub async fn sync<C>(manifest: &Manifest, lock: &LockFile, connect: C, options: &SyncOptions) -> Result<SyncReport>
where
    C: Fn(&Dependency) -> Result<Arc<dyn Repository>>,
{
    let mut planned = Vec::with_capacity(manifest.dependencies.len());
    for dep in &manifest.dependencies {
        let entries = lock.entries(&dep.name)?;
        let algorithm = dep.algorithm()?;
        for (path, entry) in &entries {
            if entry.algorithm != algorithm {
                tracing::warn!(
                    dependency = %dep.name,
                    path = %path,
                    locked = %entry.algorithm,
                    manifest = %algorithm,
                    "lock file algorithm differs from manifest, verifying with the locked one"
                );
            }
        }
        planned.push((dep, entries));
    }

    let mut report = SyncReport::default();
    let mut tracked: BTreeMap<PathBuf, HashSet<PathBuf>> = BTreeMap::new();

    for (dep, entries) in planned {
        let output_dir = PathBuf::from(&dep.output_dir);
        tracing::info!(
            dependency = %dep.name,
            repository = %dep.repository,
            path = %dep.expanded_path(),
            output = %output_dir.display(),
            files = entries.len(),
            "syncing"
        );

        download_dependency(dep, &output_dir, &connect, options).await?;
        verify_files(&output_dir, entries.clone()).await?;
        report.files_verified += entries.len();
        report.dependencies += 1;

        if options.cleanup {
            let keep = tracked.entry(output_dir.clone()).or_default();
            keep.extend(entries.iter().map(|(path, _)| locked_path(&output_dir, path)));
        }
    }

    for (output_dir, keep) in tracked {
        report.deleted += tokio::task::spawn_blocking(move || delete_extra_files(&output_dir, &keep)).await??;
    }

    Ok(report)
}

async fn download_dependency<C>(dep: &Dependency, output_dir: &Path, connect: &C, options: &SyncOptions) -> Result<()>
where
    C: Fn(&Dependency) -> Result<Arc<dyn Repository>>,
{
    let mut builder = TransferOptions::builder()
        .checksum(dep.checksum.clone())
        .recursive(dep.recursive)
        .quiet(options.quiet);
    if let Some(limit) = options.concurrency {
        builder = builder.concurrency(limit);
    }
    let transfer = builder.build()?;

    let repo = connect(dep)?;
    let source = dep.remote_source();
    let report = download_folder(repo, &source, output_dir, &transfer).await?;

    match report.status {
        FolderStatus::Success => Ok(()),
        FolderStatus::NoAssetsFound => Err(Error::NoAssets {
            repository: dep.repository.clone(),
            path: dep.expanded_path(),
        }),
        FolderStatus::Error => Err(Error::Transfer {
            path: source,
            message: format!(
                "{} file(s) failed to download",
                report.count(TransferStatus::Failed)
            ),
        }),
    }
}

/// Recompute each locked file's digest with the algorithm recorded in the lock.
async fn verify_files(output_dir: &Path, entries: Vec<(String, LockEntry)>) -> Result<()> {
    let output_dir = output_dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        for (path, entry) in entries {
            let local = locked_path(&output_dir, &path);
            let actual = Validator::for_algorithm(entry.algorithm).compute_digest(&local)?;
            if !digests_match(&entry.digest, &actual) {
                return Err(Error::ChecksumMismatch {
                    path: local,
                    expected: entry.digest,
                    actual,
                });
            }
            tracing::debug!(path = %local.display(), "verified");
        }
        Ok(())
    })
    .await?
}

fn locked_path(output_dir: &Path, path: &str) -> PathBuf {
    path.trim_start_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(output_dir.to_path_buf(), |acc, segment| acc.join(segment))
}
