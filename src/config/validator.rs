use crate::config::Config;
use crate::error::{MemeseekError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem found
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_indexing(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_dialog(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(MemeseekError::ConfigValidation { errors })
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
        if config.storage.catalog_path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.catalog_path",
                "Catalog path cannot be empty",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Embedding dimension must be greater than 0",
            ));
        }
    }

    fn validate_indexing(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.indexing.vector_dim != config.embedding.dimension {
            errors.push(ValidationError::new(
                "indexing.vector_dim",
                format!(
                    "Vector dimension {} does not match embedding dimension {}",
                    config.indexing.vector_dim, config.embedding.dimension
                ),
            ));
        }

        if config.indexing.hnsw_ef_construction == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_ef_construction",
                "HNSW ef_construction must be greater than 0",
            ));
        }

        if config.indexing.hnsw_m == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_m",
                "HNSW M must be greater than 0",
            ));
        }

        if config.indexing.hnsw_ef_search == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_ef_search",
                "HNSW ef_search must be greater than 0",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.retrieval.overfetch_limit == 0 {
            errors.push(ValidationError::new(
                "retrieval.overfetch_limit",
                "Over-fetch limit must be greater than 0",
            ));
        }

        if config.retrieval.lexical_multiplier == 0 {
            errors.push(ValidationError::new(
                "retrieval.lexical_multiplier",
                "Lexical multiplier must be greater than 0",
            ));
        }
    }

    fn validate_dialog(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.dialog.max_count == 0 {
            errors.push(ValidationError::new(
                "dialog.max_count",
                "Maximum count must be greater than 0",
            ));
        }

        if config.dialog.max_count > config.retrieval.overfetch_limit {
            errors.push(ValidationError::new(
                "dialog.max_count",
                format!(
                    "Maximum count {} exceeds the over-fetch limit {}",
                    config.dialog.max_count, config.retrieval.overfetch_limit
                ),
            ));
        }

        if config.dialog.text_limit == 0 {
            errors.push(ValidationError::new(
                "dialog.text_limit",
                "Text limit must be greater than 0",
            ));
        }

        if config.dialog.session_idle_secs == 0 {
            errors.push(ValidationError::new(
                "dialog.session_idle_secs",
                "Session idle timeout must be greater than 0",
            ));
        }
    }
}
