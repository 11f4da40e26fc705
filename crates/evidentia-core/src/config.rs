//! Layered configuration: compiled-in defaults → `evidentia.toml` → environment
//! variables. See spec §6 and SPEC_FULL §4.8.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Recognized configuration keys (spec §6 plus the ambient connection
/// settings from SPEC_FULL §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Candidate auto-accept threshold for gap resolution.
    pub auto_resolve_confidence_threshold: f64,
    /// Auto-merge threshold for duplicate candidates.
    pub duplicate_auto_merge_threshold: f64,
    /// OCR step timeout, in milliseconds.
    pub max_ocr_timeout_ms: u64,
    /// Global cap on documents in flight across the Workflow Engine.
    pub max_inflight_documents: usize,
    /// Maximum number of queue items `bulkApply` processes per call.
    pub bulk_apply_batch: usize,
    /// PostgreSQL connection string for the Knowledge Graph Store.
    pub database_url: Option<String>,
    /// Qdrant gRPC endpoint.
    pub qdrant_url: String,
    /// Anthropic Messages API model id used for OCR/classify/extract.
    pub anthropic_model: String,
    /// Dimensionality of the embedding backend's output vectors; must match
    /// the Qdrant collection's configured vector size.
    pub embedding_dimensions: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_resolve_confidence_threshold: 0.90,
            duplicate_auto_merge_threshold: 0.98,
            max_ocr_timeout_ms: 300_000,
            max_inflight_documents: 16,
            bulk_apply_batch: 100,
            database_url: None,
            qdrant_url: "http://localhost:6334".to_string(),
            anthropic_model: "claude-3-5-sonnet-20241022".to_string(),
            embedding_dimensions: 1536,
        }
    }
}

impl Config {
    /// Load configuration from (in increasing priority order): compiled-in
    /// defaults, an optional TOML file, then environment variables prefixed
    /// `EVIDENTIA_`.
    pub fn load(toml_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = toml_path {
            if path.exists() {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
                config = toml::from_str(&text)
                    .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))?;
            }
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("AUTO_RESOLVE_CONFIDENCE_THRESHOLD") {
            if let Ok(parsed) = v.parse() {
                self.auto_resolve_confidence_threshold = parsed;
            }
        }
        if let Ok(v) = std::env::var("DUPLICATE_AUTO_MERGE_THRESHOLD") {
            if let Ok(parsed) = v.parse() {
                self.duplicate_auto_merge_threshold = parsed;
            }
        }
        if let Ok(v) = std::env::var("MAX_OCR_TIMEOUT_MS") {
            if let Ok(parsed) = v.parse() {
                self.max_ocr_timeout_ms = parsed;
            }
        }
        if let Ok(v) = std::env::var("MAX_INFLIGHT_DOCUMENTS") {
            if let Ok(parsed) = v.parse() {
                self.max_inflight_documents = parsed;
            }
        }
        if let Ok(v) = std::env::var("BULK_APPLY_BATCH") {
            if let Ok(parsed) = v.parse() {
                self.bulk_apply_batch = parsed;
            }
        }
        if let Ok(v) = std::env::var("DATABASE_URL") {
            self.database_url = Some(v);
        }
        if let Ok(v) = std::env::var("QDRANT_URL") {
            self.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("ANTHROPIC_MODEL") {
            self.anthropic_model = v;
        }
        if let Ok(v) = std::env::var("EMBEDDING_DIMENSIONS") {
            if let Ok(parsed) = v.parse() {
                self.embedding_dimensions = parsed;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            (
                "AUTO_RESOLVE_CONFIDENCE_THRESHOLD",
                self.auto_resolve_confidence_threshold,
            ),
            (
                "DUPLICATE_AUTO_MERGE_THRESHOLD",
                self.duplicate_auto_merge_threshold,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "{name} must be in [0,1], got {value}"
                )));
            }
        }
        if self.max_inflight_documents == 0 {
            return Err(Error::Config(
                "MAX_INFLIGHT_DOCUMENTS must be at least 1".to_string(),
            ));
        }
        if self.bulk_apply_batch == 0 {
            return Err(Error::Config(
                "BULK_APPLY_BATCH must be at least 1".to_string(),
            ));
        }
        if self.embedding_dimensions == 0 {
            return Err(Error::Config(
                "EMBEDDING_DIMENSIONS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.auto_resolve_confidence_threshold, 0.90);
        assert_eq!(config.duplicate_auto_merge_threshold, 0.98);
        assert_eq!(config.max_ocr_timeout_ms, 300_000);
        assert_eq!(config.max_inflight_documents, 16);
        assert_eq!(config.bulk_apply_batch, 100);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut config = Config::default();
        config.duplicate_auto_merge_threshold = 1.5;
        assert!(config.validate().is_err());
    }
}
