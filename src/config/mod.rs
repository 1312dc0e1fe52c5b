//! Configuration management for memeseek
//!
//! Loads the TOML configuration, applies `MEMESEEK_SECTION__KEY` environment
//! overrides and validates the result before anything is wired together.

use crate::error::{MemeseekError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub dialog: DialogConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite catalog of memes
    pub catalog_path: PathBuf,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimension: usize,
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    pub vector_dim: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_m: usize,
    pub hnsw_ef_search: usize,
    /// Upper bound on vectors held by the HNSW graph
    pub max_elements: usize,
}

/// Hybrid retrieval tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Candidates requested per topic search, independent of the user's count
    pub overfetch_limit: usize,
    /// Lexical search asks for `limit * lexical_multiplier` candidates
    pub lexical_multiplier: usize,
    /// Queries shorter than this (in chars) are matched exactly
    pub fuzzy_min_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            overfetch_limit: 100,
            lexical_multiplier: 2,
            fuzzy_min_chars: 4,
        }
    }
}

/// Dialog limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogConfig {
    /// Requested counts are clamped to `1..=max_count`
    pub max_count: usize,
    /// Caption and description truncation before delivery
    pub text_limit: usize,
    /// Sessions untouched for this long are dropped
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

fn default_session_idle_secs() -> u64 {
    24 * 60 * 60
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            max_count: 20,
            text_limit: 1000,
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MemeseekError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| MemeseekError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| MemeseekError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: MEMESEEK_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("MEMESEEK_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "STORAGE__CATALOG_PATH" => {
                self.storage.catalog_path = PathBuf::from(value);
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "EMBEDDING__DIMENSION" => {
                self.embedding.dimension = parse_usize(path, value)?;
            }
            "INDEXING__HNSW_EF_SEARCH" => {
                self.indexing.hnsw_ef_search = parse_usize(path, value)?;
            }
            "RETRIEVAL__OVERFETCH_LIMIT" => {
                self.retrieval.overfetch_limit = parse_usize(path, value)?;
            }
            "RETRIEVAL__FUZZY_MIN_CHARS" => {
                self.retrieval.fuzzy_min_chars = parse_usize(path, value)?;
            }
            "DIALOG__MAX_COUNT" => {
                self.dialog.max_count = parse_usize(path, value)?;
            }
            "DIALOG__TEXT_LIMIT" => {
                self.dialog.text_limit = parse_usize(path, value)?;
            }
            "DIALOG__SESSION_IDLE_SECS" => {
                self.dialog.session_idle_secs = parse_usize(path, value)? as u64;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            MemeseekError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("memeseek").join("config.toml"))
    }
}

fn parse_usize(path: &str, value: &str) -> Result<usize> {
    value.parse().map_err(|_| MemeseekError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}' as unsigned integer", value),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                catalog_path: PathBuf::from("memes.db"),
            },
            embedding: EmbeddingConfig {
                model: "all-MiniLM-L6-v2".to_string(),
                dimension: 384,
            },
            indexing: IndexingConfig {
                vector_dim: 384,
                hnsw_ef_construction: 200,
                hnsw_m: 16,
                hnsw_ef_search: 64,
                max_elements: 100_000,
            },
            retrieval: RetrievalConfig::default(),
            dialog: DialogConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.dialog.max_count = 15;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.dialog.max_count, 15);
        assert_eq!(loaded.retrieval.overfetch_limit, 100);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/nonexistent/memeseek.toml"));
        assert!(matches!(result, Err(MemeseekError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_optional_sections_default() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[_meta]
schema_version = "1.0.0"

[storage]
catalog_path = "memes.db"

[embedding]
model = "all-MiniLM-L6-v2"
dimension = 384

[indexing]
vector_dim = 384
hnsw_ef_construction = 200
hnsw_m = 16
hnsw_ef_search = 64
max_elements = 1000
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.dialog.max_count, 20);
        assert_eq!(config.dialog.text_limit, 1000);
        assert_eq!(config.dialog.session_idle_secs, 86_400);
        assert_eq!(config.retrieval.lexical_multiplier, 2);
    }

    #[test]
    fn test_env_value_parsing() {
        let mut config = Config::default();
        config.set_value_from_env("DIALOG__MAX_COUNT", "7").unwrap();
        assert_eq!(config.dialog.max_count, 7);
        config
            .set_value_from_env("DIALOG__SESSION_IDLE_SECS", "600")
            .unwrap();
        assert_eq!(config.dialog.session_idle_secs, 600);

        let err = config.set_value_from_env("DIALOG__MAX_COUNT", "many");
        assert!(matches!(
            err,
            Err(MemeseekError::InvalidConfigValue { .. })
        ));
    }
}
