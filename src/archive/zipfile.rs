//! zip container handling.
//!
//! The zip central directory sits at the end of the archive, so both directions
//! spool through an anonymous temporary file instead of holding the archive in
//! memory.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::sanitize::resolve_entry_path;
use super::tarball::set_mode;
use crate::error::{Error, Result};
use crate::walk::LocalFile;

const LARGE_FILE_THRESHOLD: u64 = u32::MAX as u64;

fn zip_error(err: zip::result::ZipError, operation: &str, path: &Path) -> Error {
    Error::io(io::Error::other(err), operation, path)
}

fn spool() -> Result<File> {
    tempfile::tempfile().map_err(|e| Error::io(e, "creating spool file in", std::env::temp_dir()))
}

/// Write `files` as a deflated zip archive into `writer`.
pub fn write_zip<W: Write>(files: &[LocalFile], mut writer: W) -> Result<W> {
    let mut zip = ZipWriter::new(spool()?);

    for file in files {
        let mut options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(file.size >= LARGE_FILE_THRESHOLD);
        if let Some(mode) = file_mode(&file.path) {
            options = options.unix_permissions(mode);
        }

        zip.start_file(file.relative.as_str(), options)
            .map_err(|e| zip_error(e, "archiving", &file.path))?;
        let mut input = File::open(&file.path).map_err(|e| Error::io(e, "opening", &file.path))?;
        io::copy(&mut input, &mut zip).map_err(|e| Error::io(e, "archiving", &file.path))?;
    }

    let mut spooled = zip
        .finish()
        .map_err(|e| zip_error(e, "finishing zip archive in", &std::env::temp_dir()))?;
    spooled
        .seek(SeekFrom::Start(0))
        .map_err(|e| Error::io(e, "rewinding spool file in", std::env::temp_dir()))?;
    io::copy(&mut spooled, &mut writer).map_err(|e| Error::io(e, "streaming zip archive from", std::env::temp_dir()))?;
    Ok(writer)
}

/// Unpack a zip stream under `dest`.
pub fn read_zip<R: Read>(mut reader: R, dest: &Path) -> Result<usize> {
    let mut spooled = spool()?;
    io::copy(&mut reader, &mut spooled).map_err(|e| Error::io(e, "receiving zip archive for", dest))?;
    spooled
        .seek(SeekFrom::Start(0))
        .map_err(|e| Error::io(e, "rewinding spool file for", dest))?;

    let mut archive = ZipArchive::new(spooled).map_err(|e| zip_error(e, "opening zip archive for", dest))?;
    let mut extracted = 0;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| zip_error(e, "reading zip entry for", dest))?;
        let target = resolve_entry_path(dest, Path::new(entry.name()))?;

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::io(e, "creating", &target))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(e, "creating", parent))?;
        }
        let mut out = File::create(&target).map_err(|e| Error::io(e, "creating", &target))?;
        io::copy(&mut entry, &mut out).map_err(|e| Error::io(e, "extracting", &target))?;
        if let Some(mode) = entry.unix_mode() {
            set_mode(&target, mode);
        }
        extracted += 1;
    }

    Ok(extracted)
}

#[cfg(unix)]
fn file_mode(path: &Path) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).ok().map(|m| m.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> Option<u32> {
    None
}
