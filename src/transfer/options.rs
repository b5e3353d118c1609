//! Per-operation transfer configuration.

use std::path::{Path, PathBuf};

use crate::archive::ArchiveFormat;
use crate::checksum::Validator;
use crate::error::Result;
use crate::glob::GlobFilter;

/// Checksum algorithm used when none is requested.
pub const DEFAULT_CHECKSUM: &str = "sha1";

/// Default number of concurrent transfers.
pub fn default_concurrency() -> usize {
    (num_cpus::get() * 4).max(1)
}

/// Fully resolved transfer options. Built once with [`TransferOptions::builder`]
/// and only read afterwards, so it can be shared freely between tasks.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    validator: Validator,
    skip_checksum: bool,
    force: bool,
    flatten: bool,
    delete_extra: bool,
    dry_run: bool,
    recursive: bool,
    glob: GlobFilter,
    compress: bool,
    compression_format: Option<ArchiveFormat>,
    key_from: Option<PathBuf>,
    concurrency: usize,
    quiet: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            validator: Validator::for_algorithm(crate::checksum::ChecksumAlgorithm::Sha1),
            skip_checksum: false,
            force: false,
            flatten: false,
            delete_extra: false,
            dry_run: false,
            recursive: false,
            glob: GlobFilter::match_all(),
            compress: false,
            compression_format: None,
            key_from: None,
            concurrency: default_concurrency(),
            quiet: false,
        }
    }
}

impl TransferOptions {
    pub fn builder() -> TransferOptionsBuilder {
        TransferOptionsBuilder::default()
    }

    /// Validator for the selected checksum algorithm.
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Existing files are skipped by presence alone.
    pub fn skip_checksum(&self) -> bool {
        self.skip_checksum
    }

    /// Transfer unconditionally; overrides every skip rule.
    pub fn force(&self) -> bool {
        self.force
    }

    pub fn flatten(&self) -> bool {
        self.flatten
    }

    pub fn delete_extra(&self) -> bool {
        self.delete_extra
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    pub fn glob(&self) -> &GlobFilter {
        &self.glob
    }

    pub fn compress(&self) -> bool {
        self.compress
    }

    /// Explicitly requested archive format, if any.
    pub fn compression_format(&self) -> Option<ArchiveFormat> {
        self.compression_format
    }

    pub fn key_from(&self) -> Option<&Path> {
        self.key_from.as_deref()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn quiet(&self) -> bool {
        self.quiet
    }
}

/// Builder for [`TransferOptions`]. String inputs are validated by
/// [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct TransferOptionsBuilder {
    checksum: Option<String>,
    skip_checksum: bool,
    force: bool,
    flatten: bool,
    delete_extra: bool,
    dry_run: bool,
    recursive: bool,
    glob: Option<String>,
    compress: bool,
    compression_format: Option<String>,
    key_from: Option<PathBuf>,
    concurrency: Option<usize>,
    quiet: bool,
}

impl TransferOptionsBuilder {
    /// Checksum algorithm name (sha1, sha256, sha512, md5).
    pub fn checksum(mut self, algorithm: impl Into<String>) -> Self {
        self.checksum = Some(algorithm.into());
        self
    }

    pub fn skip_checksum(mut self, yes: bool) -> Self {
        self.skip_checksum = yes;
        self
    }

    pub fn force(mut self, yes: bool) -> Self {
        self.force = yes;
        self
    }

    pub fn flatten(mut self, yes: bool) -> Self {
        self.flatten = yes;
        self
    }

    pub fn delete_extra(mut self, yes: bool) -> Self {
        self.delete_extra = yes;
        self
    }

    pub fn dry_run(mut self, yes: bool) -> Self {
        self.dry_run = yes;
        self
    }

    pub fn recursive(mut self, yes: bool) -> Self {
        self.recursive = yes;
        self
    }

    /// Comma-separated include/exclude glob pattern.
    pub fn glob(mut self, pattern: impl Into<String>) -> Self {
        self.glob = Some(pattern.into());
        self
    }

    pub fn compress(mut self, yes: bool) -> Self {
        self.compress = yes;
        self
    }

    /// Archive format name (gzip, zstd, zip). Empty means "infer".
    pub fn compression_format(mut self, format: impl Into<String>) -> Self {
        self.compression_format = Some(format.into());
        self
    }

    /// File whose sha256 replaces `{key}` in the remote path.
    pub fn key_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_from = Some(path.into());
        self
    }

    /// Maximum number of concurrent transfers (at least 1).
    pub fn concurrency(mut self, limit: usize) -> Self {
        self.concurrency = Some(limit);
        self
    }

    pub fn quiet(mut self, yes: bool) -> Self {
        self.quiet = yes;
        self
    }

    /// Validate and resolve everything into an immutable [`TransferOptions`].
    pub fn build(self) -> Result<TransferOptions> {
        let algorithm = self
            .checksum
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(DEFAULT_CHECKSUM);
        let validator = Validator::new(algorithm)?;

        let glob = match self.glob.as_deref() {
            Some(pattern) => GlobFilter::parse(pattern)?,
            None => GlobFilter::match_all(),
        };

        let compression_format = match self.compression_format.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Some(ArchiveFormat::parse(name)?),
            _ => None,
        };

        Ok(TransferOptions {
            validator,
            skip_checksum: self.skip_checksum,
            force: self.force,
            flatten: self.flatten,
            delete_extra: self.delete_extra,
            dry_run: self.dry_run,
            recursive: self.recursive,
            glob,
            compress: self.compress,
            compression_format,
            key_from: self.key_from.filter(|p| !p.as_os_str().is_empty()),
            concurrency: self.concurrency.unwrap_or_else(default_concurrency).max(1),
            quiet: self.quiet,
        })
    }
}
