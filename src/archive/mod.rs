//! Streaming archive creation and extraction.
//!
//! An archive carries a directory tree as one remote asset. All codecs work on
//! plain `Read`/`Write` streams so they can sit on one end of a
//! [`pipe`](crate::pipe) while the network transfer runs on the other.

mod compression;
mod sanitize;
mod tarball;
mod zipfile;

pub use compression::{CompressedReader, CompressedWriter, TarCompression};
pub use sanitize::resolve_entry_path;

use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::glob::GlobFilter;
use crate::walk::{collect_files, LocalFile};

/// Archive container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveFormat {
    /// tar compressed with gzip (widely compatible).
    #[default]
    Gzip,
    /// tar compressed with zstd (fast, good ratio).
    Zstd,
    /// zip with deflate entries.
    Zip,
}

impl ArchiveFormat {
    pub const ALL: [ArchiveFormat; 3] = [Self::Gzip, Self::Zstd, Self::Zip];

    /// Get a human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
            Self::Zip => "zip",
        }
    }

    /// File name suffix, including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gzip => ".tar.gz",
            Self::Zstd => ".tar.zst",
            Self::Zip => ".zip",
        }
    }

    /// Parse a format name (`gzip`, `gz`, `zstd`, `zst`, `zip`).
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "gzip" | "gz" => Ok(Self::Gzip),
            "zstd" | "zst" => Ok(Self::Zstd),
            "zip" => Ok(Self::Zip),
            _ => Err(Error::UnsupportedFormat(name.to_string())),
        }
    }

    /// Infer the format from an archive file name. Unknown suffixes are gzip.
    pub fn from_filename(filename: &str) -> Self {
        let lower = filename.to_lowercase();
        if lower.ends_with(".tar.zst") {
            Self::Zstd
        } else if lower.ends_with(".zip") {
            Self::Zip
        } else {
            Self::Gzip
        }
    }

    /// Whether `filename` ends with one of the known archive suffixes.
    pub fn has_archive_suffix(filename: &str) -> bool {
        let lower = filename.to_lowercase();
        Self::ALL.iter().any(|f| lower.ends_with(f.extension()))
    }

    /// Pack the files under `source_dir` that pass `filter` into `writer`.
    ///
    /// The container is fully closed before returning, so the caller only needs
    /// to close `writer` itself.
    pub fn create_archive<W: Write>(&self, source_dir: &Path, writer: W, filter: &GlobFilter) -> Result<W> {
        let files = collect_files(source_dir, filter)?;
        self.write_files(&files, writer)
    }

    /// Pack an explicit list of files.
    pub fn write_files<W: Write>(&self, files: &[LocalFile], writer: W) -> Result<W> {
        tracing::debug!(format = self.name(), files = files.len(), "creating archive");
        match self {
            Self::Gzip => tarball::write_tar(files, writer, TarCompression::Gzip),
            Self::Zstd => tarball::write_tar(files, writer, TarCompression::Zstd),
            Self::Zip => zipfile::write_zip(files, writer),
        }
    }

    /// Unpack an archive stream into `dest_dir`, returning the number of files written.
    ///
    /// Entries that would land outside `dest_dir` fail with [`Error::PathTraversal`].
    pub fn extract_archive<R: Read>(&self, reader: R, dest_dir: &Path) -> Result<usize> {
        std::fs::create_dir_all(dest_dir).map_err(|e| Error::io(e, "creating", dest_dir))?;
        let count = match self {
            Self::Gzip => tarball::read_tar(reader, dest_dir, TarCompression::Gzip)?,
            Self::Zstd => tarball::read_tar(reader, dest_dir, TarCompression::Zstd)?,
            Self::Zip => zipfile::read_zip(reader, dest_dir)?,
        };
        tracing::debug!(format = self.name(), files = count, dest = %dest_dir.display(), "extracted archive");
        Ok(count)
    }
}

impl FromStr for ArchiveFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(ArchiveFormat::parse("GZ").unwrap(), ArchiveFormat::Gzip);
        assert_eq!(ArchiveFormat::parse("zst").unwrap(), ArchiveFormat::Zstd);
        assert_eq!(ArchiveFormat::parse("zip").unwrap(), ArchiveFormat::Zip);
        assert!(matches!(ArchiveFormat::parse("rar"), Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_from_filename() {
        assert_eq!(ArchiveFormat::from_filename("out.tar.zst"), ArchiveFormat::Zstd);
        assert_eq!(ArchiveFormat::from_filename("OUT.ZIP"), ArchiveFormat::Zip);
        assert_eq!(ArchiveFormat::from_filename("out.tar.gz"), ArchiveFormat::Gzip);
        assert_eq!(ArchiveFormat::from_filename("whatever.bin"), ArchiveFormat::Gzip);
    }

    #[test]
    fn test_archive_suffix_detection() {
        assert!(ArchiveFormat::has_archive_suffix("build/site.tar.gz"));
        assert!(ArchiveFormat::has_archive_suffix("site.zip"));
        assert!(!ArchiveFormat::has_archive_suffix("site.tar"));
        assert!(!ArchiveFormat::has_archive_suffix("folder"));
    }
}
