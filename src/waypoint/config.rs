// SPDX-License-Identifier: MIT

//! Runtime configuration
//!
//! Loaded from a YAML file, or from the environment when no file is given.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";
pub const DEFAULT_STORE_DIR: &str = ".waypoint";

/// Which store backs the pipes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    #[default]
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,
    /// Directory for `file` stores
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            dir: default_store_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
}

impl Config {
    /// Load a configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Parse a configuration from a YAML string
    pub fn parse_yaml(content: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Defaults overridden by `WAYPOINT_STORE_DIR`, `OLLAMA_BASE_URL` and
    /// `OLLAMA_MODEL`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(dir) = lookup("WAYPOINT_STORE_DIR").filter(|v| !v.is_empty()) {
            config.store.dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("OLLAMA_BASE_URL").filter(|v| !v.is_empty()) {
            config.ollama.base_url = url;
        }
        if let Some(model) = lookup("OLLAMA_MODEL").filter(|v| !v.is_empty()) {
            config.ollama.model = model;
        }
        config
    }
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_DIR)
}

fn default_base_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_OLLAMA_MODEL.to_string()
}

fn default_timeout() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
store:
  kind: memory
  dir: /tmp/runs
ollama:
  base_url: http://gpu-box:11434
  model: qwen2.5
  timeout_secs: 120
"#;
        let config = Config::parse_yaml(yaml).unwrap();
        assert_eq!(config.store.kind, StoreKind::Memory);
        assert_eq!(config.store.dir, PathBuf::from("/tmp/runs"));
        assert_eq!(config.ollama.base_url, "http://gpu-box:11434");
        assert_eq!(config.ollama.model, "qwen2.5");
        assert_eq!(config.ollama.timeout_secs, 120);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = Config::parse_yaml("ollama:\n  model: mistral\n").unwrap();
        assert_eq!(config.store, StoreConfig::default());
        assert_eq!(config.ollama.base_url, DEFAULT_OLLAMA_URL);
        assert_eq!(config.ollama.model, "mistral");
        assert_eq!(config.ollama.timeout_secs, 60);
    }

    #[test]
    fn test_unknown_store_kind_is_rejected() {
        assert!(Config::parse_yaml("store:\n  kind: redis\n").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("WAYPOINT_STORE_DIR", "/var/lib/waypoint"),
            ("OLLAMA_MODEL", "llama3.1"),
            ("OLLAMA_BASE_URL", ""),
        ]);
        let config = Config::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.store.dir, PathBuf::from("/var/lib/waypoint"));
        assert_eq!(config.ollama.model, "llama3.1");
        assert_eq!(config.ollama.base_url, DEFAULT_OLLAMA_URL);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waypoint.yaml");
        fs::write(&path, "store:\n  kind: file\n  dir: runs\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.store.kind, StoreKind::File);
        assert_eq!(config.store.dir, PathBuf::from("runs"));
    }
}
