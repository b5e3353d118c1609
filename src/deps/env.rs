use std::fmt::Write as _;
use std::path::Path;

use super::manifest::Manifest;
use crate::error::{Error, Result};

/// Default output of `deps env`.
pub const ENV_FILE: &str = "deps.env";

/// `my-lib` -> `MY_LIB`.
pub fn normalize_name(name: &str) -> String {
    name.replace('-', "_").to_uppercase()
}

/// Render `DEPS_<NAME>_NAME`, `_VERSION` and `_PATH` lines for every dependency.
pub fn render_env(manifest: &Manifest) -> String {
    let mut out = String::new();
    for dep in &manifest.dependencies {
        let prefix = format!("DEPS_{}", normalize_name(&dep.name));
        let _ = writeln!(out, "{}_NAME=\"{}\"", prefix, dep.name);
        let _ = writeln!(out, "{}_VERSION=\"{}\"", prefix, dep.version);
        let _ = writeln!(out, "{}_PATH=\"{}\"", prefix, dep.local_path().display());
        out.push('\n');
    }
    out
}

pub fn write_env(manifest: &Manifest, path: &Path) -> Result<()> {
    std::fs::write(path, render_env(manifest)).map_err(|e| Error::io(e, "writing", path))
}
