//! Checksum computation and validation.
//!
//! A [`Validator`] is bound to one algorithm. It streams a file through the
//! hash function and compares the result against the digest a remote asset
//! advertises, optionally reporting the bytes read to a progress sink in the
//! same pass.

mod hasher;

pub use hasher::{new_hasher, DigestHasher, Hasher};

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::progress::{NoProgress, ProgressSink};

/// Read buffer used when streaming files through a hasher.
const BUFFER_SIZE: usize = 64 * 1024;

/// Supported checksum algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    Sha1,
    Sha256,
    Sha512,
    Md5,
}

impl ChecksumAlgorithm {
    pub const ALL: [ChecksumAlgorithm; 4] = [Self::Sha1, Self::Sha256, Self::Sha512, Self::Md5];

    /// Lowercase name as used on the command line and in lock files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::Md5 => "md5",
        }
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            "md5" => Ok(Self::Md5),
            _ => Err(Error::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Digests advertised for a remote asset, one optional hex string per algorithm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha512: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
}

impl Checksum {
    /// Digest for `algorithm`, treating an empty string as absent.
    pub fn get(&self, algorithm: ChecksumAlgorithm) -> Option<&str> {
        let value = match algorithm {
            ChecksumAlgorithm::Sha1 => &self.sha1,
            ChecksumAlgorithm::Sha256 => &self.sha256,
            ChecksumAlgorithm::Sha512 => &self.sha512,
            ChecksumAlgorithm::Md5 => &self.md5,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }

    /// Set the digest for `algorithm`.
    pub fn set(&mut self, algorithm: ChecksumAlgorithm, digest: impl Into<String>) {
        let slot = match algorithm {
            ChecksumAlgorithm::Sha1 => &mut self.sha1,
            ChecksumAlgorithm::Sha256 => &mut self.sha256,
            ChecksumAlgorithm::Sha512 => &mut self.sha512,
            ChecksumAlgorithm::Md5 => &mut self.md5,
        };
        *slot = Some(digest.into());
    }

    /// Compute every supported digest in a single pass over `reader`.
    pub fn of_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut hashers: Vec<_> = ChecksumAlgorithm::ALL
            .iter()
            .map(|&algorithm| (algorithm, new_hasher(algorithm)))
            .collect();
        let mut buffer = vec![0u8; BUFFER_SIZE];

        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            for (_, hasher) in hashers.iter_mut() {
                hasher.update(&buffer[..n]);
            }
        }

        let mut checksum = Checksum::default();
        for (algorithm, hasher) in hashers {
            checksum.set(algorithm, hex::encode(hasher.finalize()));
        }
        Ok(checksum)
    }
}

/// Hex digests are compared without regard to case.
pub fn digests_match(expected: &str, actual: &str) -> bool {
    expected.eq_ignore_ascii_case(actual)
}

/// Computes and validates file digests for one algorithm.
#[derive(Debug, Clone)]
pub struct Validator {
    algorithm: ChecksumAlgorithm,
    buffer_size: usize,
}

impl Validator {
    /// Create a validator from an algorithm name (case-insensitive).
    pub fn new(algorithm: &str) -> Result<Self> {
        Ok(Self::for_algorithm(algorithm.parse()?))
    }

    pub fn for_algorithm(algorithm: ChecksumAlgorithm) -> Self {
        Self {
            algorithm,
            buffer_size: BUFFER_SIZE,
        }
    }

    /// Override the read chunk size. The digest does not depend on it.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Stream a file through the hash function and return the lowercase hex digest.
    pub fn compute_digest(&self, path: &Path) -> Result<String> {
        self.compute_digest_with_progress(path, &NoProgress)
    }

    /// Like [`compute_digest`](Self::compute_digest), reporting bytes read to `progress`.
    pub fn compute_digest_with_progress(
        &self,
        path: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<String> {
        let file = File::open(path).map_err(|e| Error::io(e, "opening", path))?;
        self.digest_reader(file, progress)
            .map_err(|e| Error::io(e, "reading", path))
    }

    /// Hash everything `reader` yields.
    pub fn digest_reader<R: Read>(&self, mut reader: R, progress: &dyn ProgressSink) -> io::Result<String> {
        let mut hasher = new_hasher(self.algorithm);
        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buffer[..n]);
            progress.add_bytes(n as u64);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Check a local file against the digest advertised in `expected`.
    ///
    /// Fails with [`Error::MissingDigest`] when `expected` has no value for this
    /// validator's algorithm.
    pub fn validate(&self, path: &Path, expected: &Checksum) -> Result<bool> {
        self.validate_with_progress(path, expected, &NoProgress)
    }

    /// Like [`validate`](Self::validate), reporting bytes hashed to `progress`.
    pub fn validate_with_progress(
        &self,
        path: &Path,
        expected: &Checksum,
        progress: &dyn ProgressSink,
    ) -> Result<bool> {
        let expected = expected
            .get(self.algorithm)
            .ok_or_else(|| Error::MissingDigest {
                algorithm: self.algorithm.name().to_string(),
            })?;

        let actual = self.compute_digest_with_progress(path, progress)?;
        Ok(digests_match(expected, &actual))
    }
}
