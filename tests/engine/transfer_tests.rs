// Tests for folder upload and download against a local repository

use std::fs;
use std::time::Duration;

use nexus_cli::glob::filter_with_glob;
use nexus_cli::transfer::{download_folder, upload_folder, FolderStatus, TransferOptions, TransferStatus};
use nexus_cli::Error;
use tempfile::TempDir;

use crate::{local_repo, write_file};

fn quiet() -> nexus_cli::transfer::TransferOptionsBuilder {
    TransferOptions::builder().quiet(true)
}

/// Remote `libs/docs` holding three files, two of them nested.
fn seeded_remote() -> TempDir {
    let remote = TempDir::new().unwrap();
    write_file(remote.path(), "libs/docs/a.txt", "alpha");
    write_file(remote.path(), "libs/docs/sub/b.txt", "bravo");
    write_file(remote.path(), "libs/docs/sub/c.log", "charlie");
    remote
}

#[tokio::test]
async fn test_upload_then_download_round_trip() {
    let source = TempDir::new().unwrap();
    write_file(source.path(), "a.txt", "alpha");
    write_file(source.path(), "sub/b.txt", "bravo");
    let remote = TempDir::new().unwrap();
    let repo = local_repo(remote.path(), &["libs"]);

    let options = quiet().build().unwrap();
    let report = upload_folder(repo.clone(), source.path(), "libs/docs", &options).await.unwrap();
    assert_eq!(report.status, FolderStatus::Success);
    assert_eq!(report.count(TransferStatus::Success), 2);
    assert_eq!(fs::read_to_string(remote.path().join("libs/docs/sub/b.txt")).unwrap(), "bravo");

    let dest = TempDir::new().unwrap();
    let options = quiet().recursive(true).build().unwrap();
    let report = download_folder(repo, "libs/docs", dest.path(), &options).await.unwrap();
    assert!(report.is_success());
    assert_eq!(fs::read_to_string(dest.path().join("docs/a.txt")).unwrap(), "alpha");
    assert_eq!(fs::read_to_string(dest.path().join("docs/sub/b.txt")).unwrap(), "bravo");
}

#[tokio::test]
async fn test_download_without_recursive_takes_direct_children() {
    let remote = seeded_remote();
    let repo = local_repo(remote.path(), &[]);
    let dest = TempDir::new().unwrap();

    let options = quiet().flatten(true).build().unwrap();
    let report = download_folder(repo, "libs/docs", dest.path(), &options).await.unwrap();
    assert_eq!(report.outcomes.len(), 1);
    assert!(dest.path().join("a.txt").exists());
    assert!(!dest.path().join("sub").exists());
}

#[tokio::test]
async fn test_second_download_skips_unchanged_files() {
    let remote = seeded_remote();
    let repo = local_repo(remote.path(), &[]);
    let dest = TempDir::new().unwrap();
    let options = quiet().recursive(true).build().unwrap();

    download_folder(repo.clone(), "libs/docs", dest.path(), &options).await.unwrap();
    let target = dest.path().join("docs/a.txt");
    let before = fs::metadata(&target).unwrap().modified().unwrap();
    std::thread::sleep(Duration::from_millis(20));

    let report = download_folder(repo, "libs/docs", dest.path(), &options).await.unwrap();
    assert_eq!(report.status, FolderStatus::Success);
    assert_eq!(report.count(TransferStatus::Skipped), 3);
    assert_eq!(fs::metadata(&target).unwrap().modified().unwrap(), before);
}

#[tokio::test]
async fn test_changed_local_file_is_replaced_and_force_downloads_everything() {
    let remote = seeded_remote();
    let repo = local_repo(remote.path(), &[]);
    let dest = TempDir::new().unwrap();
    let options = quiet().recursive(true).build().unwrap();

    download_folder(repo.clone(), "libs/docs", dest.path(), &options).await.unwrap();
    fs::write(dest.path().join("docs/a.txt"), "tampered").unwrap();

    let report = download_folder(repo.clone(), "libs/docs", dest.path(), &options).await.unwrap();
    assert_eq!(report.count(TransferStatus::Success), 1);
    assert_eq!(report.count(TransferStatus::Skipped), 2);
    assert_eq!(fs::read_to_string(dest.path().join("docs/a.txt")).unwrap(), "alpha");

    let forced = quiet().recursive(true).force(true).build().unwrap();
    let report = download_folder(repo, "libs/docs", dest.path(), &forced).await.unwrap();
    assert_eq!(report.count(TransferStatus::Success), 3);
}

#[tokio::test]
async fn test_skip_checksum_trusts_existing_files() {
    let remote = seeded_remote();
    let repo = local_repo(remote.path(), &[]);
    let dest = TempDir::new().unwrap();
    write_file(dest.path(), "a.txt", "stale but present");

    let options = quiet().flatten(true).skip_checksum(true).build().unwrap();
    let report = download_folder(repo, "libs/docs", dest.path(), &options).await.unwrap();
    assert_eq!(report.count(TransferStatus::Skipped), 1);
    assert_eq!(fs::read_to_string(dest.path().join("a.txt")).unwrap(), "stale but present");
}

#[tokio::test]
async fn test_glob_filters_and_reports_no_assets() {
    let remote = seeded_remote();
    let repo = local_repo(remote.path(), &[]);
    let dest = TempDir::new().unwrap();

    let options = quiet().recursive(true).glob("**/*.txt,!a.txt").build().unwrap();
    let report = download_folder(repo.clone(), "libs/docs", dest.path(), &options).await.unwrap();
    assert_eq!(report.outcomes.len(), 1);
    assert!(dest.path().join("docs/sub/b.txt").exists());
    assert!(!dest.path().join("docs/a.txt").exists());

    let options = quiet().recursive(true).glob("*.iso").build().unwrap();
    let report = download_folder(repo, "libs/docs", dest.path(), &options).await.unwrap();
    assert_eq!(report.status, FolderStatus::NoAssetsFound);
    assert_eq!(report.status.code(), 66);
}

#[tokio::test]
async fn test_one_unwritable_target_fails_only_that_file() {
    let remote = seeded_remote();
    let repo = local_repo(remote.path(), &[]);
    let dest = TempDir::new().unwrap();
    // A directory where docs/a.txt has to go
    fs::create_dir_all(dest.path().join("docs/a.txt/occupied")).unwrap();

    let options = quiet().recursive(true).build().unwrap();
    let report = download_folder(repo, "libs/docs", dest.path(), &options).await.unwrap();
    assert_eq!(report.status, FolderStatus::Error);
    assert_eq!(report.count(TransferStatus::Success), 2);
    assert_eq!(report.count(TransferStatus::Failed), 1);
    assert_eq!(fs::read_to_string(dest.path().join("docs/sub/b.txt")).unwrap(), "bravo");
}

#[tokio::test]
async fn test_listing_filtered_by_pattern_string() {
    let remote = seeded_remote();
    let repo = local_repo(remote.path(), &[]);

    let assets = repo.list_assets("libs", "docs", true).await.unwrap();
    assert_eq!(assets.len(), 3);
    let logs = filter_with_glob(assets, "**/*.log", |a| a.relative_path("docs")).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].normalized_path(), "docs/sub/c.log");

    let err = filter_with_glob(Vec::<String>::new(), "[", |s| s.as_str()).unwrap_err();
    assert!(matches!(err, Error::InvalidGlob { .. }));
}

#[tokio::test]
async fn test_delete_removes_files_missing_remotely() {
    let remote = seeded_remote();
    let repo = local_repo(remote.path(), &[]);
    let dest = TempDir::new().unwrap();
    write_file(dest.path(), "stray.txt", "left over");
    write_file(dest.path(), "old/gone.txt", "left over");

    let options = quiet().recursive(true).flatten(true).delete_extra(true).build().unwrap();
    let report = download_folder(repo, "libs/docs", dest.path(), &options).await.unwrap();
    assert_eq!(report.deleted, 2);
    assert!(!dest.path().join("stray.txt").exists());
    assert!(!dest.path().join("old").exists());
    assert!(dest.path().join("sub/c.log").exists());
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let remote = seeded_remote();
    let repo = local_repo(remote.path(), &[]);
    let dest = TempDir::new().unwrap();

    let options = quiet().recursive(true).dry_run(true).build().unwrap();
    let report = download_folder(repo, "libs/docs", dest.path(), &options).await.unwrap();
    assert_eq!(report.count(TransferStatus::Success), 3);
    assert!(fs::read_dir(dest.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_missing_repository_is_a_listing_error() {
    let remote = TempDir::new().unwrap();
    let repo = local_repo(remote.path(), &[]);
    let dest = TempDir::new().unwrap();

    let result = download_folder(repo, "nope/docs", dest.path(), &quiet().build().unwrap()).await;
    let err = result.unwrap_err();
    assert!(matches!(err, Error::Listing { .. }));
    assert_eq!(FolderStatus::from_error(&err), FolderStatus::Error);
}

#[tokio::test]
async fn test_upload_skips_files_with_matching_remote_checksums() {
    let source = TempDir::new().unwrap();
    write_file(source.path(), "a.txt", "alpha");
    write_file(source.path(), "b.txt", "bravo");
    let remote = TempDir::new().unwrap();
    let repo = local_repo(remote.path(), &["libs"]);
    let options = quiet().build().unwrap();

    upload_folder(repo.clone(), source.path(), "libs/docs", &options).await.unwrap();
    fs::write(source.path().join("b.txt"), "bravo v2").unwrap();

    let report = upload_folder(repo, source.path(), "libs/docs", &options).await.unwrap();
    assert_eq!(report.count(TransferStatus::Skipped), 1);
    assert_eq!(report.count(TransferStatus::Success), 1);
    assert_eq!(fs::read_to_string(remote.path().join("libs/docs/b.txt")).unwrap(), "bravo v2");
}

#[tokio::test]
async fn test_upload_of_empty_folder_reports_no_assets() {
    let source = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    let repo = local_repo(remote.path(), &["libs"]);

    let report = upload_folder(repo, source.path(), "libs", &quiet().build().unwrap()).await.unwrap();
    assert_eq!(report.status, FolderStatus::NoAssetsFound);
}

#[tokio::test]
async fn test_upload_to_missing_repository_fails_every_file() {
    let source = TempDir::new().unwrap();
    write_file(source.path(), "a.txt", "alpha");
    let remote = TempDir::new().unwrap();
    let repo = local_repo(remote.path(), &[]);

    let report = upload_folder(repo, source.path(), "ghost/docs", &quiet().build().unwrap()).await.unwrap();
    assert_eq!(report.status, FolderStatus::Error);
    assert_eq!(report.count(TransferStatus::Failed), 1);
}

#[tokio::test]
async fn test_compressed_round_trip_for_each_format() {
    let source = TempDir::new().unwrap();
    write_file(source.path(), "a.txt", "alpha");
    write_file(source.path(), "sub/b.txt", "bravo");
    let remote = TempDir::new().unwrap();
    let repo = local_repo(remote.path(), &["libs"]);

    for name in ["bundle.tar.gz", "bundle.tar.zst", "bundle.zip"] {
        let options = quiet().compress(true).build().unwrap();
        let dest_path = format!("libs/bundles/{}", name);
        let report = upload_folder(repo.clone(), source.path(), &dest_path, &options).await.unwrap();
        assert!(report.is_success(), "{}", name);
        assert!(remote.path().join("libs/bundles").join(name).is_file());

        let dest = TempDir::new().unwrap();
        let report = download_folder(repo.clone(), &dest_path, dest.path(), &options).await.unwrap();
        assert!(report.is_success(), "{}", name);
        assert_eq!(fs::read_to_string(dest.path().join("a.txt")).unwrap(), "alpha");
        assert_eq!(fs::read_to_string(dest.path().join("sub/b.txt")).unwrap(), "bravo");
    }
}

#[tokio::test]
async fn test_compressed_download_of_missing_archive() {
    let remote = seeded_remote();
    let repo = local_repo(remote.path(), &["empty"]);
    let dest = TempDir::new().unwrap();
    let options = quiet().compress(true).build().unwrap();

    let report = download_folder(repo.clone(), "libs/docs/none.tar.gz", dest.path(), &options)
        .await
        .unwrap();
    assert_eq!(report.status, FolderStatus::Error);

    let report = download_folder(repo, "empty/none.tar.gz", dest.path(), &options).await.unwrap();
    assert_eq!(report.status, FolderStatus::NoAssetsFound);
}

#[tokio::test]
async fn test_key_template_in_destination() {
    let source = TempDir::new().unwrap();
    write_file(source.path(), "a.txt", "alpha");
    let key_dir = TempDir::new().unwrap();
    write_file(key_dir.path(), "Cargo.lock", "locked");
    let remote = TempDir::new().unwrap();
    let repo = local_repo(remote.path(), &["cache"]);

    let options = quiet().key_from(key_dir.path().join("Cargo.lock")).build().unwrap();
    upload_folder(repo, source.path(), "cache/build-{key}", &options).await.unwrap();

    let stored: Vec<String> = fs::read_dir(remote.path().join("cache"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].starts_with("build-"));
    assert_eq!(stored[0].len(), "build-".len() + 64);
}
