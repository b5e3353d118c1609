//! Dependency Consistency Protocol.
//!
//! `deps.ini` declares remote artifacts by path template and version,
//! [`resolve`] pins each one to its current digests in `deps-lock.ini`, and
//! [`sync`] downloads them and refuses to finish unless every file on disk
//! matches the lock.

mod env;
mod ini;
mod lock;
mod manifest;
mod resolve;
mod sync;

pub use env::{normalize_name, render_env, write_env, ENV_FILE};
pub use lock::{LockEntry, LockFile, LockedFiles, LOCK_FILE};
pub use manifest::{Defaults, Dependency, Manifest, MANIFEST_FILE, MANIFEST_TEMPLATE, VERSION_PLACEHOLDER};
pub use resolve::resolve;
pub use sync::{sync, SyncOptions, SyncReport};

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use crate::error::{Error, Result};

/// Write the template manifest to `path`. An existing file is never touched.
pub fn init_manifest(path: &Path) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => Error::argument(format!("{} already exists", path.display())),
            _ => Error::io(e, "creating", path),
        })?;
    file.write_all(MANIFEST_TEMPLATE.as_bytes())
        .map_err(|e| Error::io(e, "writing", path))
}
