//! Connection settings for the repository server.
//!
//! Resolved in layers: built-in defaults, then the optional TOML file at
//! `<config dir>/nexus-cli/config.toml`, then the `NEXUS_URL`, `NEXUS_USER`
//! and `NEXUS_PASS` environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const ENV_URL: &str = "NEXUS_URL";
pub const ENV_USER: &str = "NEXUS_USER";
pub const ENV_PASS: &str = "NEXUS_PASS";

/// Repository server connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the server (`http(s)://...` or `file://<dir>`).
    pub url: String,
    pub username: String,
    pub password: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: "http://localhost:8081".to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
        }
    }
}

impl Config {
    /// Load defaults, the config file if present, and environment overrides.
    pub fn load() -> Result<Self> {
        let config = match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("nexus-cli").join("config.toml"))
    }

    /// Parse a TOML config file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(e, "reading", path))?;
        toml::from_str(&content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Apply overrides from a key lookup (the environment, normally).
    /// Empty values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key| lookup(key).filter(|v: &String| !v.is_empty());
        if let Some(url) = get(ENV_URL) {
            self.url = url;
        }
        if let Some(user) = get(ENV_USER) {
            self.username = user;
        }
        if let Some(pass) = get(ENV_PASS) {
            self.password = pass;
        }
        self
    }

    /// Same credentials against a different server, when `url` is given.
    pub fn for_url(&self, url: Option<&str>) -> Self {
        match url.filter(|u| !u.is_empty()) {
            Some(url) => Self {
                url: url.to_string(),
                ..self.clone()
            },
            None => self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_env_overrides_win() {
        let env: HashMap<&str, &str> = [(ENV_URL, "https://nexus.example.com"), (ENV_PASS, "")].into();
        let config = Config::default().with_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.url, "https://nexus.example.com");
        assert_eq!(config.username, "admin");
        // Empty values do not clobber
        assert_eq!(config.password, "admin");
    }

    #[test]
    fn test_partial_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "username = \"ci\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.username, "ci");
        assert_eq!(config.url, "http://localhost:8081");
    }

    #[test]
    fn test_invalid_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "url = [").unwrap();
        assert!(matches!(Config::from_file(&path), Err(Error::Config { .. })));
    }

    #[test]
    fn test_for_url() {
        let base = Config::default();
        assert_eq!(base.for_url(Some("http://other:8081")).url, "http://other:8081");
        assert_eq!(base.for_url(Some("")).url, base.url);
        assert_eq!(base.for_url(None), base);
    }
}
