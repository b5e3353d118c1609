use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;

use super::options::TransferOptions;
use super::outcome::{Direction, FolderReport, TransferOutcome, TransferTracker};
use super::path::{apply_key_template, parse_upload_destination, split_archive_name};
use crate::archive::ArchiveFormat;
use crate::error::{Error, Result};
use crate::pipe::{pipe, PipeWriter, PIPE_CAPACITY, PIPE_CHUNK_SIZE};
use crate::progress::{ProgressSink, ProgressWriter, Tally, TransferProgress};
use crate::remote::{Asset, Repository, UploadAsset, UploadComponent};
use crate::walk::{collect_files, LocalFile};

/// Upload the files under `source` to `repository[/sub/path]`.
///
/// With compression enabled the tree is sent as a single archive; a trailing
/// archive file name in `dest` picks its name and format.
pub async fn upload_folder(
    repo: Arc<dyn Repository>,
    source: &Path,
    dest: &str,
    options: &TransferOptions,
) -> Result<FolderReport> {
    let dest = apply_key_template(dest, options.key_from())?;
    let (repository, sub) = parse_upload_destination(&dest)?;
    if !source.is_dir() {
        return Err(Error::argument(format!(
            "source '{}' is not a directory",
            source.display()
        )));
    }

    if options.compress() {
        let (directory, archive_name) = match split_archive_name(&sub) {
            Some((folder, name)) => (folder.to_string(), Some(name.to_string())),
            None => (sub.clone(), None),
        };
        return upload_archive(repo, source, &repository, &directory, archive_name, options).await;
    }

    let files = list_local(source, options).await?;
    if files.is_empty() {
        if !options.quiet() {
            println!("No files found in '{}'", source.display());
        }
        return Ok(FolderReport::no_assets());
    }

    let remote = if options.force() {
        HashMap::new()
    } else {
        existing_assets(repo.as_ref(), &repository, &sub).await
    };

    let total_bytes = files.iter().map(|f| f.size).sum();
    let progress = Arc::new(TransferProgress::new(
        total_bytes,
        Direction::Upload.progress_label(),
        files.len(),
        !options.quiet() && !options.dry_run(),
    ));
    let tracker = TransferTracker::new(Direction::Upload, options.quiet(), !progress.is_visible());
    tracing::info!(
        source = %source.display(),
        %repository,
        directory = %sub,
        files = files.len(),
        bytes = total_bytes,
        "starting upload"
    );

    let total_files = files.len();
    let (mut outcomes, pending) = {
        let options = options.clone();
        let progress = Arc::clone(&progress);
        tokio::task::spawn_blocking(move || partition_existing(files, &remote, &options, &progress)).await?
    };
    for outcome in &outcomes {
        tracker.record(outcome);
    }

    if pending.is_empty() {
        progress.finish();
        if !options.quiet() {
            println!("All {} files already exist with matching checksums", total_files);
        }
        return Ok(FolderReport::from_outcomes(outcomes));
    }

    let started = Utc::now();
    let uploaded = if options.dry_run() {
        for file in &pending {
            tracing::info!(path = %file.relative, %repository, directory = %sub, "dry run: would upload");
        }
        Ok(())
    } else {
        send_files(repo.as_ref(), &repository, &sub, &pending, Arc::clone(&progress)).await
    };
    progress.finish();

    for file in &pending {
        let outcome = match &uploaded {
            Ok(()) => TransferOutcome::success(&file.relative, file.size, started),
            Err(e) => TransferOutcome::failed(&file.relative, file.size, e, started),
        };
        tracker.record(&outcome);
        outcomes.push(outcome);
    }

    let report = FolderReport::from_outcomes(outcomes);
    tracker.print_summary(&report.outcomes);
    Ok(report)
}

async fn list_local(source: &Path, options: &TransferOptions) -> Result<Vec<LocalFile>> {
    let root = source.to_path_buf();
    let glob = options.glob().clone();
    tokio::task::spawn_blocking(move || collect_files(&root, &glob)).await?
}

/// Remote assets under `sub`, keyed by their path relative to it. A listing
/// failure means nothing is known to exist.
async fn existing_assets(repo: &dyn Repository, repository: &str, sub: &str) -> HashMap<String, Asset> {
    match repo.list_assets(repository, sub, true).await {
        Ok(assets) => assets
            .into_iter()
            .map(|asset| (asset.relative_path(sub).to_string(), asset))
            .collect(),
        Err(e) => {
            tracing::debug!(error = %e, "could not list existing assets, uploading all files");
            HashMap::new()
        }
    }
}

/// Split `files` into skipped outcomes and files that still need uploading.
fn partition_existing(
    files: Vec<LocalFile>,
    remote: &HashMap<String, Asset>,
    options: &TransferOptions,
    progress: &dyn ProgressSink,
) -> (Vec<TransferOutcome>, Vec<LocalFile>) {
    let mut skipped = Vec::new();
    let mut pending = Vec::new();

    for file in files {
        let started = Utc::now();
        let Some(existing) = remote.get(&file.relative) else {
            pending.push(file);
            continue;
        };

        let keep = if options.skip_checksum() {
            progress.add_bytes(file.size);
            tracing::debug!(path = %file.relative, "exists remotely, checksum skipped");
            true
        } else {
            let tally = Tally::new(progress);
            let matched = match options
                .validator()
                .validate_with_progress(&file.path, &existing.checksum, &tally)
            {
                Ok(matched) => {
                    tracing::debug!(path = %file.relative, matched, "compared with remote checksum");
                    matched
                }
                Err(e) => {
                    tracing::debug!(path = %file.relative, error = %e, "cannot compare checksum, uploading");
                    false
                }
            };
            // Uploading streams the file through the bar again
            if !matched {
                tally.revert();
            }
            matched
        };

        if keep {
            progress.file_done();
            skipped.push(TransferOutcome::skipped(file.relative, file.size, started));
        } else {
            pending.push(file);
        }
    }

    (skipped, pending)
}

/// Upload `files` as one component. Each file gets its own pipe; a single
/// blocking producer fills them in order, matching the order the request
/// body consumes them.
async fn send_files(
    repo: &dyn Repository,
    repository: &str,
    directory: &str,
    files: &[LocalFile],
    progress: Arc<TransferProgress>,
) -> Result<()> {
    let mut assets = Vec::with_capacity(files.len());
    let mut writers = Vec::with_capacity(files.len());
    for file in files {
        let (writer, reader) = pipe(PIPE_CAPACITY);
        assets.push(UploadAsset {
            path: file.relative.clone(),
            body: reader,
        });
        writers.push(writer);
    }

    let to_send = files.to_vec();
    let producer = tokio::task::spawn_blocking(move || feed_files(&to_send, writers, &progress));

    let uploaded = repo
        .upload_component(UploadComponent {
            repository: repository.to_string(),
            directory: directory.to_string(),
            assets,
        })
        .await;
    let produced = producer.await?;

    combine(produced, uploaded.map_err(Error::from))
}

fn feed_files(files: &[LocalFile], writers: Vec<PipeWriter>, progress: &dyn ProgressSink) -> Result<()> {
    let mut writers = writers.into_iter();

    for file in files {
        let Some(mut writer) = writers.next() else {
            break;
        };
        if let Err(e) = copy_into(&file.path, &mut writer, progress) {
            let reported = io::Error::new(e.kind(), e.to_string());
            writer.fail(e);
            for rest in writers {
                rest.fail(io::Error::other("upload aborted"));
            }
            return Err(Error::io(reported, "streaming", &file.path));
        }
        progress.file_done();
        tracing::debug!(path = %file.relative, "streamed");
    }
    Ok(())
}

fn copy_into(path: &Path, writer: &mut PipeWriter, progress: &dyn ProgressSink) -> io::Result<u64> {
    let mut source = File::open(path)?;
    let mut out = BufWriter::with_capacity(PIPE_CHUNK_SIZE, ProgressWriter::new(writer, progress));
    let copied = io::copy(&mut source, &mut out)?;
    out.flush()?;
    Ok(copied)
}

/// Upload the tree under `source` as a single archive.
async fn upload_archive(
    repo: Arc<dyn Repository>,
    source: &Path,
    repository: &str,
    directory: &str,
    archive_name: Option<String>,
    options: &TransferOptions,
) -> Result<FolderReport> {
    let format = options
        .compression_format()
        .or_else(|| archive_name.as_deref().map(ArchiveFormat::from_filename))
        .unwrap_or_default();
    let name = archive_name.unwrap_or_else(|| format!("{}{}", folder_name(source), format.extension()));
    tracing::debug!(archive = %name, %format, "creating archive");

    let files = list_local(source, options).await?;
    if files.is_empty() {
        if !options.quiet() {
            println!("No files found in '{}'", source.display());
        }
        return Ok(FolderReport::no_assets());
    }

    let started = Utc::now();
    let total_bytes: u64 = files.iter().map(|f| f.size).sum();
    if options.dry_run() {
        if !options.quiet() {
            println!(
                "Dry run: would upload {} files from '{}' as '{}' to repository '{}'",
                files.len(),
                source.display(),
                name,
                repository
            );
        }
        return Ok(FolderReport::from_outcomes(vec![TransferOutcome::success(
            &name,
            total_bytes,
            started,
        )]));
    }

    let file_count = files.len();
    let progress = Arc::new(TransferProgress::new(
        total_bytes,
        "Compressing and uploading",
        1,
        !options.quiet(),
    ));
    let (writer, reader) = pipe(PIPE_CAPACITY);

    let producer = {
        let progress = Arc::clone(&progress);
        tokio::task::spawn_blocking(move || {
            let mut writer = writer;
            let packed = pack_into(format, &files, &mut writer, &progress);
            if let Err(e) = &packed {
                writer.fail(io::Error::other(e.to_string()));
            }
            packed
        })
    };

    let uploaded = repo
        .upload_component(UploadComponent {
            repository: repository.to_string(),
            directory: directory.to_string(),
            assets: vec![UploadAsset {
                path: name.clone(),
                body: reader,
            }],
        })
        .await;
    let produced = producer.await?;
    progress.file_done();
    progress.finish();

    let outcome = match combine(produced, uploaded.map_err(Error::from)) {
        Ok(()) => {
            tracing::info!(archive = %name, files = file_count, "uploaded archive");
            if !options.quiet() {
                println!(
                    "Uploaded compressed archive '{}' containing {} files from '{}'",
                    name,
                    file_count,
                    source.display()
                );
            }
            TransferOutcome::success(&name, total_bytes, started)
        }
        Err(e) => {
            tracing::error!(archive = %name, error = %e, "archive upload failed");
            TransferOutcome::failed(&name, total_bytes, e, started)
        }
    };
    Ok(FolderReport::from_outcomes(vec![outcome]))
}

fn pack_into(
    format: ArchiveFormat,
    files: &[LocalFile],
    writer: &mut PipeWriter,
    progress: &dyn ProgressSink,
) -> Result<()> {
    let out = BufWriter::with_capacity(PIPE_CHUNK_SIZE, ProgressWriter::new(writer, progress));
    let out = format.write_files(files, out)?;
    out.into_inner()
        .map_err(|e| Error::io(e.into_error(), "flushing archive stream", ""))?;
    Ok(())
}

/// Last path segment of `source`, used to name archives.
fn folder_name(source: &Path) -> String {
    source
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "archive".to_string())
}

/// Merge the producer and request results. A producer failure explains a
/// failed request better, unless it only saw the request hang up.
fn combine(produced: Result<()>, uploaded: Result<()>) -> Result<()> {
    match (produced, uploaded) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(p), Err(u)) if is_broken_pipe(&p) => Err(u),
        (Err(p), _) => Err(p),
        (Ok(()), Err(u)) => Err(u),
    }
}

fn is_broken_pipe(err: &Error) -> bool {
    match err {
        Error::Io { source, .. } => source.kind() == io::ErrorKind::BrokenPipe,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_prefers_producer_error() {
        let produced = Err(Error::Transfer {
            path: "a.bin".into(),
            message: "permission denied".into(),
        });
        let uploaded = Err(Error::argument("request body failed"));
        let err = combine(produced, uploaded).unwrap_err();
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_combine_ignores_broken_pipe_from_producer() {
        let produced = Err(Error::io(
            io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader closed"),
            "archiving",
            "/src/a.bin",
        ));
        let uploaded = Err(Error::argument("repository 'libs' not found"));
        let err = combine(produced, uploaded).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_folder_name() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("build-output");
        std::fs::create_dir(&source).unwrap();
        assert_eq!(folder_name(&source), "build-output");
    }

    #[test]
    fn test_changed_file_leaves_no_hashed_bytes_on_the_bar() {
        let dir = tempfile::TempDir::new().unwrap();
        let same = dir.path().join("same.txt");
        let changed = dir.path().join("changed.txt");
        std::fs::write(&same, "same").unwrap();
        std::fs::write(&changed, "changed locally").unwrap();

        let remote_asset = |content: &[u8]| Asset {
            checksum: crate::checksum::Checksum::of_reader(content).unwrap(),
            ..Default::default()
        };
        let remote: HashMap<String, Asset> = [
            ("same.txt".to_string(), remote_asset(b"same")),
            ("changed.txt".to_string(), remote_asset(b"remote copy")),
        ]
        .into_iter()
        .collect();
        let files = vec![
            LocalFile { path: same, relative: "same.txt".into(), size: 4 },
            LocalFile { path: changed, relative: "changed.txt".into(), size: 15 },
        ];

        let progress = TransferProgress::new(19, "Uploading", 2, false);
        let options = TransferOptions::default();
        let (skipped, pending) = partition_existing(files, &remote, &options, &progress);

        assert_eq!(skipped.len(), 1);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].relative, "changed.txt");
        assert_eq!(progress.bytes_done(), 4);
    }
}
