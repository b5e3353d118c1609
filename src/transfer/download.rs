use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use super::cleanup::delete_extra_files;
use super::options::TransferOptions;
use super::outcome::{Direction, FolderReport, TransferOutcome, TransferTracker};
use super::path::{apply_key_template, local_target, parse_repository_path, split_archive_name};
use super::run_bounded;
use crate::archive::ArchiveFormat;
use crate::error::{Error, Result};
use crate::pipe::{pipe, PIPE_CAPACITY};
use crate::progress::{ProgressSink, Tally, TransferProgress};
use crate::remote::{Asset, RemoteError, Repository};

/// Download `repository/path` into `dest`.
///
/// Listing and argument problems are returned as errors. Per-file failures end
/// up in the report with [`FolderStatus::Error`](super::FolderStatus::Error).
pub async fn download_folder(
    repo: Arc<dyn Repository>,
    source: &str,
    dest: &Path,
    options: &TransferOptions,
) -> Result<FolderReport> {
    let source = apply_key_template(source, options.key_from())?;
    let (repository, path) = parse_repository_path(&source)?;

    if options.compress() {
        return download_archive(repo, &repository, &path, dest, options).await;
    }

    let listed = repo
        .list_assets(&repository, &path, options.recursive())
        .await
        .map_err(|source| listing_error(&repository, &path, source))?;
    let assets = options.glob().filter(listed, |asset| match_path(asset, &path));

    if assets.is_empty() {
        tracing::warn!(%repository, %path, glob = options.glob().pattern(), "no assets found");
        if !options.quiet() {
            println!("No assets found in '{}' in repository '{}'", path, repository);
        }
        return Ok(FolderReport::no_assets());
    }

    // Targets of everything the remote has; read-only once built
    let keep: HashSet<PathBuf> = assets
        .iter()
        .filter_map(|asset| local_target(dest, &asset.path, &path, options.flatten()).ok())
        .collect();

    let total_bytes = assets.iter().map(|a| a.size).sum();
    let progress = Arc::new(TransferProgress::new(
        total_bytes,
        Direction::Download.progress_label(),
        assets.len(),
        !options.quiet() && !options.dry_run(),
    ));
    let tracker = Arc::new(TransferTracker::new(
        Direction::Download,
        options.quiet(),
        !progress.is_visible(),
    ));
    tracing::info!(
        %repository,
        %path,
        files = assets.len(),
        bytes = total_bytes,
        concurrency = options.concurrency(),
        "starting download"
    );

    let unit = Arc::new(DownloadUnit {
        repo,
        dest: dest.to_path_buf(),
        base: path.clone(),
        options: options.clone(),
        progress: Arc::clone(&progress),
    });
    let outcomes = run_bounded(assets, options.concurrency(), |asset| {
        let unit = Arc::clone(&unit);
        let tracker = Arc::clone(&tracker);
        async move {
            let outcome = unit.run(asset).await;
            tracker.record(&outcome);
            outcome
        }
    })
    .await?;
    progress.finish();

    let mut report = FolderReport::from_outcomes(outcomes);
    if options.delete_extra() && !options.dry_run() {
        let root = dest.to_path_buf();
        report.deleted = tokio::task::spawn_blocking(move || delete_extra_files(&root, &keep)).await??;
        if report.deleted > 0 && !options.quiet() {
            println!("Deleted {} extra files", report.deleted);
        }
    }

    tracker.print_summary(&report.outcomes);
    Ok(report)
}

/// Path the glob filter sees: relative to the listed folder, or the file name
/// when the folder argument named the file itself.
fn match_path<'a>(asset: &'a Asset, base: &str) -> &'a str {
    let normalized = asset.normalized_path();
    if !base.is_empty() && normalized == base {
        return normalized.rsplit('/').next().unwrap_or(normalized);
    }
    asset.relative_path(base)
}

fn listing_error(repository: &str, path: &str, source: RemoteError) -> Error {
    Error::Listing {
        repository: repository.to_string(),
        path: path.to_string(),
        source,
    }
}

/// Shared state of the per-file download units of one folder operation.
struct DownloadUnit {
    repo: Arc<dyn Repository>,
    dest: PathBuf,
    base: String,
    options: TransferOptions,
    progress: Arc<TransferProgress>,
}

impl DownloadUnit {
    async fn run(&self, asset: Asset) -> TransferOutcome {
        let started = Utc::now();
        let label = asset.normalized_path().to_string();

        let target = match local_target(&self.dest, &asset.path, &self.base, self.options.flatten()) {
            Ok(target) => target,
            Err(e) => return TransferOutcome::failed(label, asset.size, e, started),
        };

        if !self.options.force() && target.is_file() && self.is_current(&asset, &target).await {
            self.progress.file_done();
            return TransferOutcome::skipped(label, asset.size, started);
        }

        if self.options.dry_run() {
            tracing::info!(path = %label, target = %target.display(), "dry run: would download");
            self.progress.file_done();
            return TransferOutcome::success(label, asset.size, started);
        }

        let result = fetch_to_file(self.repo.as_ref(), &asset, &target, self.progress.as_ref()).await;
        self.progress.file_done();
        match result {
            Ok(_) => TransferOutcome::success(label, asset.size, started),
            Err(e) => TransferOutcome::failed(label, asset.size, e, started),
        }
    }

    /// Whether the existing `target` can be kept.
    async fn is_current(&self, asset: &Asset, target: &Path) -> bool {
        if self.options.skip_checksum() {
            self.progress.add_bytes(asset.size);
            tracing::debug!(path = %target.display(), "exists, checksum skipped");
            return true;
        }

        let validator = self.options.validator().clone();
        let expected = asset.checksum.clone();
        let path = target.to_path_buf();
        let progress = Arc::clone(&self.progress);
        let verdict = tokio::task::spawn_blocking(move || {
            let tally = Tally::new(&progress);
            let verdict = validator.validate_with_progress(&path, &expected, &tally);
            // The file is fetched again unless it matched
            if !matches!(verdict, Ok(true)) {
                tally.revert();
            }
            verdict
        })
        .await;

        match verdict {
            Ok(Ok(true)) => {
                tracing::debug!(path = %target.display(), "checksum matches");
                true
            }
            Ok(Ok(false)) => {
                tracing::debug!(path = %target.display(), "checksum differs, downloading");
                false
            }
            Ok(Err(e)) => {
                tracing::debug!(path = %target.display(), error = %e, "cannot validate, downloading");
                false
            }
            Err(e) => {
                tracing::warn!(path = %target.display(), error = %e, "validation task failed");
                false
            }
        }
    }
}

/// Stream `asset` into `target`, creating parent directories. A partially
/// written file is removed on failure.
async fn fetch_to_file(
    repo: &dyn Repository,
    asset: &Asset,
    target: &Path,
    progress: &dyn ProgressSink,
) -> Result<u64> {
    let mut body = repo.download(asset).await?;

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io(e, "creating", parent))?;
    }
    let mut file = tokio::fs::File::create(target)
        .await
        .map_err(|e| Error::io(e, "creating", target))?;

    let mut written = 0u64;
    let copied: io::Result<()> = async {
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            progress.add_bytes(chunk.len() as u64);
            written += chunk.len() as u64;
        }
        file.flush().await
    }
    .await;

    if let Err(e) = copied {
        drop(file);
        let _ = tokio::fs::remove_file(target).await;
        return Err(Error::Transfer {
            path: asset.normalized_path().to_string(),
            message: e.to_string(),
        });
    }
    tracing::debug!(path = %target.display(), bytes = written, "downloaded");
    Ok(written)
}

/// Download one archive and unpack it into `dest` while it streams.
async fn download_archive(
    repo: Arc<dyn Repository>,
    repository: &str,
    path: &str,
    dest: &Path,
    options: &TransferOptions,
) -> Result<FolderReport> {
    let (folder, name) = split_archive_name(path).ok_or_else(|| {
        Error::argument(format!(
            "when using --compress the source must end with the archive file name \
             (e.g. {}/{}/archive.tar.gz); supported suffixes: .tar.gz, .tar.zst, .zip",
            repository, path
        ))
    })?;
    let format = options
        .compression_format()
        .unwrap_or_else(|| ArchiveFormat::from_filename(name));
    tracing::debug!(archive = name, %format, "looking for archive");

    let listed = repo
        .list_assets(repository, folder, options.recursive())
        .await
        .map_err(|source| listing_error(repository, folder, source))?;

    let Some(archive) = listed
        .iter()
        .find(|a| {
            let p = a.normalized_path();
            p == name || p.ends_with(&format!("/{}", name))
        })
        .cloned()
    else {
        tracing::warn!(archive = name, %repository, folder, available = listed.len(), "archive not found");
        for asset in &listed {
            tracing::debug!(path = %asset.path, "available asset");
        }
        if !options.quiet() {
            println!("Archive '{}' not found in '{}' in repository '{}'", name, folder, repository);
        }
        return Ok(if listed.is_empty() {
            FolderReport::no_assets()
        } else {
            FolderReport::from_outcomes(vec![TransferOutcome::failed(
                name,
                0,
                "archive not found",
                Utc::now(),
            )])
        });
    };

    let started = Utc::now();
    if options.dry_run() {
        if !options.quiet() {
            println!(
                "Dry run: would download and extract '{}' from '{}' in repository '{}' to '{}'",
                name,
                folder,
                repository,
                dest.display()
            );
        }
        return Ok(FolderReport::from_outcomes(vec![TransferOutcome::success(
            name,
            archive.size,
            started,
        )]));
    }

    let progress = Arc::new(TransferProgress::new(
        archive.size,
        "Downloading archive",
        1,
        !options.quiet(),
    ));
    let result = stream_and_extract(repo.as_ref(), &archive, format, dest, Arc::clone(&progress)).await;
    progress.file_done();
    progress.finish();

    let outcome = match result {
        Ok(files) => {
            tracing::info!(archive = name, files, dest = %dest.display(), "downloaded and extracted archive");
            if !options.quiet() {
                println!(
                    "Downloaded and extracted '{}' ({} files) to '{}'",
                    name,
                    files,
                    dest.display()
                );
            }
            TransferOutcome::success(name, archive.size, started)
        }
        Err(e) => {
            tracing::error!(archive = name, error = %e, "archive download failed");
            TransferOutcome::failed(name, archive.size, e, started)
        }
    };
    Ok(FolderReport::from_outcomes(vec![outcome]))
}

/// Feed the archive body into a pipe whose other end is unpacked on a
/// blocking thread. Both sides have to succeed.
async fn stream_and_extract(
    repo: &dyn Repository,
    archive: &Asset,
    format: ArchiveFormat,
    dest: &Path,
    progress: Arc<TransferProgress>,
) -> Result<usize> {
    let mut body = repo.download(archive).await?;
    let (writer, mut reader) = pipe(PIPE_CAPACITY);

    let dest_dir = dest.to_path_buf();
    let extractor = tokio::task::spawn_blocking(move || {
        let extracted = format.extract_archive(&mut reader, &dest_dir);
        if extracted.is_ok() {
            // Trailing padding after the last entry
            let _ = io::copy(&mut reader, &mut io::sink());
        }
        // A failed extraction drops the reader here, which stops the feeder
        extracted
    });

    let mut writer = Some(writer);
    let mut fed: io::Result<()> = Ok(());
    while let Some(chunk) = body.next().await {
        match (chunk, writer.as_ref()) {
            (Ok(bytes), Some(w)) => {
                let len = bytes.len() as u64;
                if let Err(e) = w.send(bytes).await {
                    fed = Err(e);
                    break;
                }
                progress.add_bytes(len);
            }
            (Err(e), _) => {
                fed = Err(io::Error::new(e.kind(), e.to_string()));
                if let Some(w) = writer.take() {
                    w.fail_async(e).await;
                }
                break;
            }
            (Ok(_), None) => break,
        }
    }
    // EOF for the extractor
    drop(writer);
    let extracted = extractor.await?;

    match fed {
        Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(Error::Transfer {
            path: archive.normalized_path().to_string(),
            message: e.to_string(),
        }),
        _ => extracted,
    }
}
