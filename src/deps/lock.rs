use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use super::ini::{ini_lines, IniLine};
use crate::checksum::ChecksumAlgorithm;
use crate::error::{Error, Result};

/// Default lock file name.
pub const LOCK_FILE: &str = "deps-lock.ini";

/// Locked files of one dependency: normalized remote path to `algorithm:digest`.
pub type LockedFiles = BTreeMap<String, String>;

/// `deps-lock.ini`: one section per dependency, one line per file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockFile {
    dependencies: BTreeMap<String, LockedFiles>,
    /// File this lock was read from, for error messages.
    source: PathBuf,
}

/// A parsed `algorithm:digest` lock value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockEntry {
    pub algorithm: ChecksumAlgorithm,
    pub digest: String,
}

impl LockEntry {
    pub fn new(algorithm: ChecksumAlgorithm, digest: impl Into<String>) -> Self {
        Self {
            algorithm,
            digest: digest.into(),
        }
    }

    /// Parse `sha256:abcd...`.
    pub fn parse(value: &str) -> std::result::Result<Self, String> {
        let (algorithm, digest) = value
            .split_once(':')
            .ok_or_else(|| format!("invalid checksum format '{}'", value))?;
        if digest.is_empty() {
            return Err(format!("missing digest in '{}'", value));
        }
        let algorithm = algorithm.parse().map_err(|e: Error| e.to_string())?;
        Ok(Self::new(algorithm, digest))
    }

    /// Lock file representation.
    pub fn encode(&self) -> String {
        format!("{}:{}", self.algorithm, self.digest)
    }
}

impl LockFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(e, "reading", path))?;
        let mut lock = Self::parse(&content);
        lock.source = path.to_path_buf();
        Ok(lock)
    }

    /// Parse lock text. Entries before the first section are ignored.
    pub fn parse(content: &str) -> Self {
        let mut lock = Self::default();
        let mut section: Option<String> = None;

        for (_, item) in ini_lines(content) {
            match item {
                IniLine::Section(name) => {
                    lock.dependencies.entry(name.to_string()).or_default();
                    section = Some(name.to_string());
                }
                IniLine::Entry { key, value } => {
                    if let Some(files) = section.as_ref().and_then(|s| lock.dependencies.get_mut(s)) {
                        files.insert(key.to_string(), value.to_string());
                    }
                }
            }
        }
        lock
    }

    pub fn insert(&mut self, dependency: impl Into<String>, files: LockedFiles) {
        self.dependencies.insert(dependency.into(), files);
    }

    pub fn get(&self, dependency: &str) -> Option<&LockedFiles> {
        self.dependencies.get(dependency)
    }

    pub fn dependencies(&self) -> impl Iterator<Item = (&String, &LockedFiles)> {
        self.dependencies.iter()
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Parse every locked value of `dependency`.
    pub fn entries(&self, dependency: &str) -> Result<Vec<(String, LockEntry)>> {
        let files = self
            .get(dependency)
            .ok_or_else(|| Error::MissingLockEntry(dependency.to_string()))?;
        files
            .iter()
            .map(|(path, value)| {
                LockEntry::parse(value)
                    .map(|entry| (path.clone(), entry))
                    .map_err(|message| Error::Lock {
                        path: self.source.clone(),
                        message: format!("[{}] {}: {}", dependency, path, message),
                    })
            })
            .collect()
    }

    pub fn to_ini_string(&self) -> String {
        let mut out = String::new();
        for (name, files) in &self.dependencies {
            let _ = writeln!(out, "[{}]", name);
            for (path, value) in files {
                let _ = writeln!(out, "{} = {}", path, value);
            }
            out.push('\n');
        }
        out
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_ini_string()).map_err(|e| Error::io(e, "writing", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_encode_entries() {
        let entry = LockEntry::parse("SHA256:ABCDEF").unwrap();
        assert_eq!(entry.algorithm, ChecksumAlgorithm::Sha256);
        assert_eq!(entry.digest, "ABCDEF");
        assert_eq!(LockEntry::new(ChecksumAlgorithm::Md5, "00ff").encode(), "md5:00ff");

        assert!(LockEntry::parse("abcdef").is_err());
        assert!(LockEntry::parse("sha256:").is_err());
        assert!(LockEntry::parse("crc32:1234").is_err());
    }

    #[test]
    fn test_output_is_sorted() {
        let mut lock = LockFile::new();
        let mut files = LockedFiles::new();
        files.insert("docs/b.txt".into(), "sha1:02".into());
        files.insert("docs/a.txt".into(), "sha1:01".into());
        lock.insert("zeta", files.clone());
        lock.insert("alpha", files);

        assert_eq!(
            lock.to_ini_string(),
            "[alpha]\ndocs/a.txt = sha1:01\ndocs/b.txt = sha1:02\n\n\
             [zeta]\ndocs/a.txt = sha1:01\ndocs/b.txt = sha1:02\n\n"
        );
        assert_eq!(LockFile::parse(&lock.to_ini_string()), lock);
    }

    #[test]
    fn test_entries_report_missing_and_malformed() {
        let lock = LockFile::parse("[tool]\nbin/tool = nonsense\n");
        assert!(matches!(lock.entries("other"), Err(Error::MissingLockEntry(_))));
        assert!(matches!(lock.entries("tool"), Err(Error::Lock { .. })));
    }
}
