use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};

use super::ini::{ini_lines, IniLine};
use crate::checksum::ChecksumAlgorithm;
use crate::error::{Error, Result};

/// Default manifest file name.
pub const MANIFEST_FILE: &str = "deps.ini";

/// Placeholder in dependency paths replaced by the version.
pub const VERSION_PLACEHOLDER: &str = "${version}";

/// Manifest written by `deps init`.
pub const MANIFEST_TEMPLATE: &str = "[defaults]
url = http://localhost:8081
repository = libs
checksum = sha256
output_dir = ./local

[example_txt]
path = docs/example-${version}.txt
version = 1.0.0

[libfoo_tar]
path = thirdparty/libfoo-${version}.tar.gz
version = 1.2.3
checksum = sha512

[docs_folder]
path = docs/${version}/
version = 2025-10-15
recursive = true
";

const DEFAULTS_SECTION: &str = "defaults";

/// Values inherited by every dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub repository: String,
    pub checksum: String,
    pub output_dir: String,
    pub url: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            repository: String::new(),
            checksum: "sha256".to_string(),
            output_dir: "./local".to_string(),
            url: String::new(),
        }
    }
}

/// One `[name]` section of the manifest, with defaults already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub repository: String,
    /// Remote path template, may contain `${version}`.
    pub path: String,
    pub version: String,
    pub checksum: String,
    pub output_dir: String,
    /// Explicit local location reported by `deps env`.
    pub dest: Option<String>,
    pub recursive: bool,
    /// Server for this dependency; empty means the configured one.
    pub url: String,
}

impl Dependency {
    fn inheriting(name: &str, defaults: &Defaults) -> Self {
        Self {
            name: name.to_string(),
            repository: defaults.repository.clone(),
            path: String::new(),
            version: String::new(),
            checksum: defaults.checksum.clone(),
            output_dir: defaults.output_dir.clone(),
            dest: None,
            recursive: false,
            url: defaults.url.clone(),
        }
    }

    /// Path template with the version substituted.
    pub fn expanded_path(&self) -> String {
        self.path.replace(VERSION_PLACEHOLDER, &self.version)
    }

    /// Where the dependency lives locally: `dest`, or `output_dir/<expanded path>`.
    pub fn local_path(&self) -> PathBuf {
        match &self.dest {
            Some(dest) => PathBuf::from(dest),
            None => Path::new(&self.output_dir).join(self.expanded_path().trim_matches('/')),
        }
    }

    /// `repository/expanded/path` as accepted by the download operation.
    pub fn remote_source(&self) -> String {
        format!("{}/{}", self.repository, self.expanded_path().trim_matches('/'))
    }

    pub fn algorithm(&self) -> Result<ChecksumAlgorithm> {
        self.checksum.parse()
    }

    /// Server URL override, if any.
    pub fn url(&self) -> Option<&str> {
        Some(self.url.as_str()).filter(|u| !u.is_empty())
    }
}

/// Parsed `deps.ini`. Dependencies keep their file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub defaults: Defaults,
    pub dependencies: Vec<Dependency>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(e, "reading", path))?;
        Self::parse(&content, path)
    }

    /// Parse manifest text; `path` is only used in error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let error = |line: usize, message: String| Error::Manifest {
            path: path.to_path_buf(),
            line,
            message,
        };

        let mut manifest = Manifest::default();
        let mut section: Option<String> = None;
        let mut header_lines = Vec::new();

        for (line, item) in ini_lines(content) {
            match item {
                IniLine::Section(name) => {
                    if name != DEFAULTS_SECTION {
                        if manifest.dependencies.iter().any(|d| d.name == name) {
                            return Err(error(line, format!("duplicate dependency [{}]", name)));
                        }
                        manifest
                            .dependencies
                            .push(Dependency::inheriting(name, &manifest.defaults));
                        header_lines.push(line);
                    }
                    section = Some(name.to_string());
                }
                IniLine::Entry { key, value } => match section.as_deref() {
                    None => {}
                    Some(DEFAULTS_SECTION) => {
                        let defaults = &mut manifest.defaults;
                        match key {
                            "repository" => defaults.repository = value.to_string(),
                            "checksum" => defaults.checksum = value.to_string(),
                            "output_dir" => {
                                validate_output_dir(value)
                                    .map_err(|m| error(line, format!("invalid output_dir in [defaults]: {}", m)))?;
                                defaults.output_dir = value.to_string();
                            }
                            "url" => defaults.url = value.to_string(),
                            _ => tracing::debug!(key, line, "ignoring unknown key in [defaults]"),
                        }
                    }
                    Some(name) => {
                        // Every other section pushed a dependency
                        let Some(dep) = manifest.dependencies.last_mut() else {
                            continue;
                        };
                        match key {
                            "repository" => dep.repository = value.to_string(),
                            "path" => dep.path = value.to_string(),
                            "version" => dep.version = value.to_string(),
                            "checksum" => dep.checksum = value.to_string(),
                            "output_dir" => {
                                validate_output_dir(value)
                                    .map_err(|m| error(line, format!("invalid output_dir in [{}]: {}", name, m)))?;
                                dep.output_dir = value.to_string();
                            }
                            "dest" => dep.dest = Some(value.to_string()).filter(|d| !d.is_empty()),
                            "recursive" => dep.recursive = value.eq_ignore_ascii_case("true"),
                            "url" => dep.url = value.to_string(),
                            _ => tracing::debug!(key, line, section = name, "ignoring unknown key"),
                        }
                    }
                },
            }
        }

        for (dep, &line) in manifest.dependencies.iter().zip(&header_lines) {
            let invalid = |message: String| error(line, format!("dependency {} {}", dep.name, message));
            if dep.path.is_empty() {
                return Err(invalid("is missing required 'path' field".to_string()));
            }
            if dep.repository.is_empty() {
                return Err(invalid(
                    "is missing 'repository' (not set in defaults or dependency)".to_string(),
                ));
            }
            validate_output_dir(&dep.output_dir).map_err(|m| invalid(format!("has invalid output_dir: {}", m)))?;
            dep.algorithm()
                .map_err(|e| invalid(format!("has invalid checksum: {}", e)))?;
        }

        Ok(manifest)
    }

    pub fn dependency(&self, name: &str) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| d.name == name)
    }

    /// Serialise back to INI. Values equal to the defaults are omitted.
    pub fn to_ini_string(&self) -> String {
        let mut out = String::new();
        let d = &self.defaults;

        let _ = writeln!(out, "[{}]", DEFAULTS_SECTION);
        for (key, value) in [
            ("url", &d.url),
            ("repository", &d.repository),
            ("checksum", &d.checksum),
            ("output_dir", &d.output_dir),
        ] {
            if !value.is_empty() {
                let _ = writeln!(out, "{} = {}", key, value);
            }
        }
        out.push('\n');

        for dep in &self.dependencies {
            let _ = writeln!(out, "[{}]", dep.name);
            let _ = writeln!(out, "path = {}", dep.path);
            if !dep.version.is_empty() {
                let _ = writeln!(out, "version = {}", dep.version);
            }
            for (key, value, default) in [
                ("url", &dep.url, &d.url),
                ("repository", &dep.repository, &d.repository),
                ("checksum", &dep.checksum, &d.checksum),
                ("output_dir", &dep.output_dir, &d.output_dir),
            ] {
                if !value.is_empty() && value != default {
                    let _ = writeln!(out, "{} = {}", key, value);
                }
            }
            if let Some(dest) = &dep.dest {
                let _ = writeln!(out, "dest = {}", dest);
            }
            if dep.recursive {
                out.push_str("recursive = true\n");
            }
            out.push('\n');
        }
        out
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_ini_string()).map_err(|e| Error::io(e, "writing", path))
    }
}

/// Reject output directories that would make cleanup dangerous.
fn validate_output_dir(dir: &str) -> std::result::Result<(), String> {
    if dir.is_empty() {
        return Err("output_dir cannot be empty".to_string());
    }
    let mut components = Path::new(dir)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .peekable();
    match components.next() {
        None => Err("output_dir cannot be '.' (current directory)".to_string()),
        Some(Component::RootDir) if components.peek().is_none() => {
            Err("output_dir cannot be '/' (root directory)".to_string())
        }
        _ => Ok(()),
    }
}
