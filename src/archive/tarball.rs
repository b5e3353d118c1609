//! tar container handling for the gzip and zstd formats.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use tar::{Archive, Builder, EntryType};

use super::compression::{CompressedReader, CompressedWriter, TarCompression};
use super::sanitize::resolve_entry_path;
use crate::error::{Error, Result};
use crate::walk::LocalFile;

/// Write `files` as a compressed tar stream into `writer`.
///
/// Closes the tar builder first, then the compressor, so every trailing block
/// reaches `writer` before the caller closes it.
pub fn write_tar<W: Write>(files: &[LocalFile], writer: W, compression: TarCompression) -> Result<W> {
    let encoder = CompressedWriter::new(writer, compression)
        .map_err(|e| Error::io(e, "initialising compressor for", ""))?;
    let mut builder = Builder::new(encoder);
    builder.mode(tar::HeaderMode::Complete);

    for file in files {
        builder
            .append_path_with_name(&file.path, &file.relative)
            .map_err(|e| Error::io(e, "archiving", &file.path))?;
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| Error::io(e, "finishing tar stream for", ""))?;
    encoder
        .finish()
        .map_err(|e| Error::io(e, "finishing compressed stream for", ""))
}

/// Unpack a compressed tar stream under `dest`.
pub fn read_tar<R: Read>(reader: R, dest: &Path, compression: TarCompression) -> Result<usize> {
    let decoder = CompressedReader::new(reader, compression)
        .map_err(|e| Error::io(e, "initialising decompressor for", dest))?;
    let mut archive = Archive::new(decoder);
    let mut extracted = 0;

    let entries = archive
        .entries()
        .map_err(|e| Error::io(e, "reading archive into", dest))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| Error::io(e, "reading archive into", dest))?;
        let name = entry
            .path()
            .map_err(|e| Error::io(e, "reading entry name in", dest))?
            .into_owned();
        let target = resolve_entry_path(dest, &name)?;

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&target).map_err(|e| Error::io(e, "creating", &target))?;
            }
            EntryType::Regular | EntryType::Continuous => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| Error::io(e, "creating", parent))?;
                }
                let mut out = fs::File::create(&target).map_err(|e| Error::io(e, "creating", &target))?;
                io::copy(&mut entry, &mut out).map_err(|e| Error::io(e, "extracting", &target))?;
                if let Ok(mode) = entry.header().mode() {
                    set_mode(&target, mode);
                }
                extracted += 1;
            }
            other => {
                tracing::debug!(entry = %name.display(), kind = ?other, "skipping non-regular archive entry");
            }
        }
    }

    Ok(extracted)
}

#[cfg(unix)]
pub(super) fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777)) {
        tracing::warn!(path = %path.display(), error = %e, "could not restore file mode");
    }
}

#[cfg(not(unix))]
pub(super) fn set_mode(_path: &Path, _mode: u32) {}
