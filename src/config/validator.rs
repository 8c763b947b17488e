use crate::config::Config;
use crate::error::{Result, SkywiseError, ValidationError};

/// Largest number of inputs the hosted endpoint accepts per request
const MAX_BATCH_SIZE: usize = 2048;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem found
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_recommend(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SkywiseError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.database_path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.database_path",
                "Database path cannot be empty",
            ));
        }

        if config.storage.pool_size == 0 {
            errors.push(ValidationError::new(
                "storage.pool_size",
                "Pool size must be greater than 0",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let embedding = &config.embedding;

        let mode = &embedding.mode;
        if mode != "offline" && mode != "online" {
            errors.push(ValidationError::new(
                "embedding.mode",
                format!("Mode must be 'offline' or 'online', got '{}'", mode),
            ));
        }

        if embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Dimension must be greater than 0",
            ));
        }

        if embedding.batch_size == 0 || embedding.batch_size > MAX_BATCH_SIZE {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                format!(
                    "Batch size must be between 1 and {}, got {}",
                    MAX_BATCH_SIZE, embedding.batch_size
                ),
            ));
        }

        if mode == "online" {
            if !embedding.api_base_url.starts_with("http") {
                errors.push(ValidationError::new(
                    "embedding.api_base_url",
                    format!("Base URL must be an http(s) URL, got '{}'", embedding.api_base_url),
                ));
            }

            if embedding.api_key_env.is_empty() {
                errors.push(ValidationError::new(
                    "embedding.api_key_env",
                    "API key environment variable name cannot be empty",
                ));
            }
        }

        if embedding.request_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "embedding.request_timeout_secs",
                "Request timeout must be greater than 0",
            ));
        }
    }

    fn validate_recommend(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.recommend.default_top_n == 0 {
            errors.push(ValidationError::new(
                "recommend.default_top_n",
                "Default result count must be greater than 0",
            ));
        }
    }
}
