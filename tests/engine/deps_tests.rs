// Tests for the dependency lock and sync cycle

use std::fs;
use std::path::Path;
use std::sync::Arc;

use nexus_cli::deps::{resolve, sync, Dependency, LockFile, Manifest, SyncOptions};
use nexus_cli::remote::Repository;
use nexus_cli::Error;
use tempfile::TempDir;

use crate::{local_repo, write_file};

struct Workspace {
    remote: TempDir,
    output: TempDir,
    repo: Arc<dyn Repository>,
}

impl Workspace {
    fn new() -> Self {
        let remote = TempDir::new().unwrap();
        write_file(remote.path(), "libs/thirdparty/libfoo-1.2.3.txt", "libfoo 1.2.3");
        write_file(remote.path(), "libs/thirdparty/libfoo-1.2.4.txt", "libfoo 1.2.4");
        write_file(remote.path(), "libs/docs/2025/index.html", "<h1>docs</h1>");
        write_file(remote.path(), "libs/docs/2025/img/logo.svg", "<svg/>");
        let repo = local_repo(remote.path(), &[]);
        Self {
            remote,
            output: TempDir::new().unwrap(),
            repo,
        }
    }

    fn manifest(&self) -> Manifest {
        let content = format!(
            "[defaults]\nrepository = libs\nchecksum = sha256\noutput_dir = {}\n\n\
             [libfoo]\npath = thirdparty/libfoo-${{version}}.txt\nversion = 1.2.3\n\n\
             [docs]\npath = docs/${{version}}/\nversion = 2025\nrecursive = true\nchecksum = sha1\n",
            self.output.path().display()
        );
        Manifest::parse(&content, Path::new("deps.ini")).unwrap()
    }

    fn connect(&self) -> impl Fn(&Dependency) -> nexus_cli::Result<Arc<dyn Repository>> + '_ {
        move |_: &Dependency| Ok(self.repo.clone())
    }
}

fn quiet() -> SyncOptions {
    SyncOptions {
        quiet: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_lock_then_sync_places_and_verifies_files() {
    let ws = Workspace::new();
    let manifest = ws.manifest();

    let lock = resolve(&manifest, ws.connect()).await.unwrap();
    assert_eq!(lock.len(), 2);
    let libfoo = lock.get("libfoo").unwrap();
    assert_eq!(libfoo.len(), 1);
    assert!(libfoo["thirdparty/libfoo-1.2.3.txt"].starts_with("sha256:"));
    let docs = lock.get("docs").unwrap();
    assert_eq!(docs.len(), 2);
    assert!(docs.values().all(|v| v.starts_with("sha1:")));

    let report = sync(&manifest, &lock, ws.connect(), &quiet()).await.unwrap();
    assert_eq!(report.dependencies, 2);
    assert_eq!(report.files_verified, 3);
    let out = ws.output.path();
    assert_eq!(
        fs::read_to_string(out.join("thirdparty/libfoo-1.2.3.txt")).unwrap(),
        "libfoo 1.2.3"
    );
    assert!(out.join("docs/2025/img/logo.svg").is_file());
    assert!(!out.join("thirdparty/libfoo-1.2.4.txt").exists());
}

#[tokio::test]
async fn test_lock_file_survives_save_and_load() {
    let ws = Workspace::new();
    let lock = resolve(&ws.manifest(), ws.connect()).await.unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("deps-lock.ini");
    lock.save(&path).unwrap();
    let loaded = LockFile::load(&path).unwrap();
    assert_eq!(loaded.get("libfoo"), lock.get("libfoo"));
    assert_eq!(loaded.get("docs"), lock.get("docs"));
}

#[tokio::test]
async fn test_sync_fails_when_remote_content_no_longer_matches_lock() {
    let ws = Workspace::new();
    let manifest = ws.manifest();
    let lock = resolve(&manifest, ws.connect()).await.unwrap();

    fs::write(ws.remote.path().join("libs/thirdparty/libfoo-1.2.3.txt"), "republished").unwrap();

    let err = sync(&manifest, &lock, ws.connect(), &quiet()).await.unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch { .. }), "{:?}", err);
    // docs comes after libfoo and is never fetched
    assert!(!ws.output.path().join("docs").exists());
}

#[tokio::test]
async fn test_missing_lock_entry_fails_before_any_download() {
    let ws = Workspace::new();
    let manifest = ws.manifest();
    let full = resolve(&manifest, ws.connect()).await.unwrap();

    let mut lock = LockFile::new();
    lock.insert("libfoo", full.get("libfoo").unwrap().clone());

    let err = sync(&manifest, &lock, ws.connect(), &quiet()).await.unwrap_err();
    assert!(matches!(err, Error::MissingLockEntry(ref name) if name == "docs"));
    assert!(fs::read_dir(ws.output.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_cleanup_removes_untracked_files() {
    let ws = Workspace::new();
    let manifest = ws.manifest();
    let lock = resolve(&manifest, ws.connect()).await.unwrap();
    write_file(ws.output.path(), "thirdparty/libfoo-1.0.0.txt", "old");
    write_file(ws.output.path(), "scratch/notes.txt", "mine");

    let options = SyncOptions {
        cleanup: true,
        ..quiet()
    };
    let report = sync(&manifest, &lock, ws.connect(), &options).await.unwrap();
    assert_eq!(report.deleted, 2);
    assert!(!ws.output.path().join("scratch").exists());
    assert!(ws.output.path().join("thirdparty/libfoo-1.2.3.txt").is_file());
}

#[tokio::test]
async fn test_resolve_reports_missing_artifact() {
    let ws = Workspace::new();
    let mut manifest = ws.manifest();
    manifest.dependencies[0].version = "9.9.9".to_string();

    let err = resolve(&manifest, ws.connect()).await.unwrap_err();
    assert!(matches!(err, Error::NoAssets { .. }));
}
