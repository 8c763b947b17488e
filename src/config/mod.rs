//! Configuration management for SkyWise
//!
//! Loads the TOML configuration, applies profile and environment overrides,
//! and validates the result before anything is built from it.

use crate::error::{Result, SkywiseError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub recommend: RecommendConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
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
    /// SQLite database holding the catalog, progress and embedding tables
    pub database_path: PathBuf,
    pub pool_size: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("~/.skywise/skywise.db"),
            pool_size: 8,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "online" (hosted endpoint) or "offline" (local FastEmbed model)
    pub mode: String,
    pub model: String,
    pub dimension: usize,
    /// Texts per embedding request during a rebuild
    pub batch_size: usize,
    pub api_base_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub request_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: "online".to_string(),
            model: crate::embedding::DEFAULT_MODEL.to_string(),
            dimension: crate::embedding::DEFAULT_DIMENSION,
            batch_size: 512,
            api_base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Run `ensure_synced` in the background when the process starts
    pub sync_on_startup: bool,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            sync_on_startup: true,
        }
    }
}

/// Recommendation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendConfig {
    pub default_top_n: usize,
    /// Drop courses the user has already completed from user recommendations.
    /// Enrolled courses are never recommended, so this only has an effect
    /// with a progress store that reports completion for courses outside the
    /// user's enrollments.
    pub exclude_completed: bool,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            default_top_n: 3,
            exclude_completed: true,
        }
    }
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_top_n: Option<usize>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SkywiseError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| SkywiseError::Io {
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
        std::fs::write(path, content).map_err(|e| SkywiseError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| SkywiseError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(mode) = overrides.embedding_mode {
            self.embedding.mode = mode;
        }
        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(top_n) = overrides.default_top_n {
            self.recommend.default_top_n = top_n;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: SKYWISE_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("SKYWISE_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "EMBEDDING__MODE" => {
                self.embedding.mode = value.to_string();
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "EMBEDDING__BATCH_SIZE" => {
                self.embedding.batch_size = parse_value(path, value)?;
            }
            "STORAGE__DATABASE_PATH" => {
                self.storage.database_path = PathBuf::from(value);
            }
            "RECOMMEND__DEFAULT_TOP_N" => {
                self.recommend.default_top_n = parse_value(path, value)?;
            }
            "INDEXING__SYNC_ON_STARTUP" => {
                self.indexing.sync_on_startup = parse_value(path, value)?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Database path with a leading `~/` expanded
    pub fn database_path(&self) -> Result<PathBuf> {
        expand_tilde(&self.storage.database_path)
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SkywiseError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("skywise").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            indexing: IndexingConfig::default(),
            recommend: RecommendConfig::default(),
            profiles: HashMap::new(),
        }
    }
}

fn parse_value<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| SkywiseError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

/// Expand a leading `~/` to the home directory
pub fn expand_tilde(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| SkywiseError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| SkywiseError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_roundtrip_keeps_sections() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.recommend.default_top_n = 5;
        config.embedding.mode = "offline".to_string();
        config.embedding.model = "all-MiniLM-L6-v2".to_string();
        config.embedding.dimension = 384;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.recommend.default_top_n, 5);
        assert_eq!(loaded.embedding.dimension, 384);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[_meta]\nschema_version = \"1.0.0\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.recommend.default_top_n, 3);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert!(config.indexing.sync_on_startup);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/definitely/not/here/config.toml"));
        assert!(matches!(result, Err(SkywiseError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_apply_profile() {
        let mut config = Config::default();
        config.profiles.insert(
            "local".to_string(),
            ProfileOverrides {
                embedding_mode: Some("offline".to_string()),
                embedding_model: Some("bge-small-en-v1.5".to_string()),
                default_top_n: Some(10),
            },
        );

        config.apply_profile("local").unwrap();
        assert_eq!(config.embedding.mode, "offline");
        assert_eq!(config.embedding.model, "bge-small-en-v1.5");
        assert_eq!(config.recommend.default_top_n, 10);

        assert!(config.apply_profile("missing").is_err());
    }

    #[test]
    fn test_set_value_from_env() {
        let mut config = Config::default();
        config
            .set_value_from_env("RECOMMEND__DEFAULT_TOP_N", "7")
            .unwrap();
        config
            .set_value_from_env("INDEXING__SYNC_ON_STARTUP", "false")
            .unwrap();
        assert_eq!(config.recommend.default_top_n, 7);
        assert!(!config.indexing.sync_on_startup);

        let result = config.set_value_from_env("EMBEDDING__BATCH_SIZE", "lots");
        assert!(matches!(
            result,
            Err(SkywiseError::InvalidConfigValue { .. })
        ));
    }

    #[test]
    fn test_expand_tilde_leaves_absolute_paths() {
        let path = Path::new("/var/lib/skywise.db");
        assert_eq!(expand_tilde(path).unwrap(), PathBuf::from("/var/lib/skywise.db"));
    }
}
