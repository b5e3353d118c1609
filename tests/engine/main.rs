// Integration tests for the transfer engine
// Every test runs against a file-backed repository in a temporary directory

mod archive_tests;
mod deps_tests;
mod transfer_tests;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use nexus_cli::remote::{LocalRepository, Repository};

/// Write `content` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A local repository under `root` with the given repositories created.
pub fn local_repo(root: &Path, repositories: &[&str]) -> Arc<dyn Repository> {
    for name in repositories {
        fs::create_dir_all(root.join(name)).unwrap();
    }
    Arc::new(LocalRepository::new(root))
}
