//! Embedding provider trait and factory.

use crate::embeddings::config::EmbeddingConfig;
use crate::embeddings::providers::{gemini::GeminiProvider, ollama::OllamaProvider, trigram::TrigramProvider};
use docent_core::{AppError, AppResult};
use std::sync::Arc;

/// Trait for embedding providers.
///
/// Implementations report failures as `AppError::EmbeddingService` and never
/// retry internally.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Provider name (e.g., "ollama", "gemini", "trigram")
    fn provider_name(&self) -> &str;

    /// Model identifier recorded in the index manifest
    fn model_id(&self) -> &str;

    /// Embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in one request.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate the embedding for a single text.
    async fn embed_one(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::embedding(self.provider_name(), "no embedding returned"))
    }
}

/// Create an embedding provider based on configuration.
pub fn create_provider(config: &EmbeddingConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    if config.dimensions == 0 {
        return Err(AppError::Config(
            "embedding dimensions must be greater than zero".to_string(),
        ));
    }

    match config.provider.as_str() {
        "trigram" => Ok(Arc::new(TrigramProvider::new(config.dimensions))),

        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),

        "gemini" => {
            let api_key = config.api_key.as_deref().ok_or_else(|| {
                AppError::Config(
                    "Gemini embeddings require an API key (set GOOGLE_API_KEY)".to_string(),
                )
            })?;
            Ok(Arc::new(GeminiProvider::new(config, api_key)?))
        }

        other => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: ollama, gemini, trigram",
            other
        ))),
    }
}

/// Check that a provider response matches the request shape.
pub(crate) fn check_batch(
    provider: &str,
    expected_count: usize,
    dimensions: usize,
    vectors: &[Vec<f32>],
) -> AppResult<()> {
    if vectors.len() != expected_count {
        return Err(AppError::embedding(
            provider,
            format!(
                "expected {} embeddings, received {}",
                expected_count,
                vectors.len()
            ),
        ));
    }

    if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
        return Err(AppError::embedding(
            provider,
            format!(
                "expected {}-dimensional embeddings, received {}",
                dimensions,
                bad.len()
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_trigram_provider() {
        let config = EmbeddingConfig::default();
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.model_id(), "trigram-v1");
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "unknown".to_string(),
            ..Default::default()
        };

        let result = create_provider(&config);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_gemini_requires_key() {
        let config = EmbeddingConfig {
            provider: "gemini".to_string(),
            model: "models/embedding-001".to_string(),
            dimensions: 768,
            ..Default::default()
        };
        assert!(matches!(create_provider(&config), Err(AppError::Config(_))));

        let with_key = EmbeddingConfig {
            api_key: Some("key".to_string()),
            ..config
        };
        let provider = create_provider(&with_key).unwrap();
        assert_eq!(provider.model_id(), "models/embedding-001");
    }

    #[test]
    fn test_check_batch_rejects_shape_mismatch() {
        let vectors = vec![vec![0.0; 3], vec![0.0; 3]];
        assert!(check_batch("p", 2, 3, &vectors).is_ok());
        assert!(matches!(
            check_batch("p", 3, 3, &vectors),
            Err(AppError::EmbeddingService { .. })
        ));
        assert!(matches!(
            check_batch("p", 2, 4, &vectors),
            Err(AppError::EmbeddingService { .. })
        ));
    }

    #[tokio::test]
    async fn test_embed_one_uses_batch() {
        let provider = create_provider(&EmbeddingConfig::default()).unwrap();
        let embedding = provider.embed_one("inverter grounding").await.unwrap();
        assert_eq!(embedding.len(), 384);
    }
}
