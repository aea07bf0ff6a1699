//! Embedding configuration.

use docent_core::config::EmbeddingSettings;
use docent_core::AppConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Everything needed to construct an embedding provider.
///
/// Also serves as the provider cache key, so two configs that differ in any
/// field produce distinct providers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EmbeddingConfig {
    /// Provider name: "ollama", "gemini", "trigram"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Custom API endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// API key for hosted providers
    #[serde(skip)]
    pub api_key: Option<String>,

    /// Maximum texts per provider request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Timeout for a single provider request, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_batch_size() -> usize {
    64
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
            api_key: None,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    /// Build from the application configuration, resolving the API key.
    pub fn from_app_config(config: &AppConfig) -> Self {
        let EmbeddingSettings {
            provider,
            model,
            dimensions,
            endpoint,
            batch_size,
            ..
        } = config.embedding.clone();

        Self {
            provider,
            model,
            dimensions,
            endpoint,
            api_key: config.embedding_api_key(),
            batch_size,
            timeout_secs: config.pipeline.request_timeout_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
