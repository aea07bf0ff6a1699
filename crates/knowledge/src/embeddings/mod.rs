//! Embedding engine.
//!
//! Provider-agnostic embedding generation: a process-wide provider cache
//! keyed by configuration, and batched, bounded-concurrency embedding of
//! large text sets.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};

use crate::embeddings::provider::check_batch;
use crate::progress::ProgressReporter;
use docent_core::{AppError, AppResult};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// Caches embedding providers keyed by their full configuration.
#[derive(Default)]
pub struct EmbeddingEngine {
    providers: RwLock<HashMap<EmbeddingConfig, Arc<dyn EmbeddingProvider>>>,
}

impl EmbeddingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide engine.
    pub fn global() -> &'static EmbeddingEngine {
        static ENGINE: OnceLock<EmbeddingEngine> = OnceLock::new();
        ENGINE.get_or_init(EmbeddingEngine::new)
    }

    /// Get or create the provider for a configuration.
    pub fn provider(&self, config: &EmbeddingConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
        {
            let providers = self.providers.read().unwrap_or_else(|e| e.into_inner());
            if let Some(provider) = providers.get(config) {
                return Ok(Arc::clone(provider));
            }
        }

        tracing::debug!(
            "Creating embedding provider: provider={}, model={}, dimensions={}",
            config.provider,
            config.model,
            config.dimensions
        );

        let provider = create_provider(config)?;

        let mut providers = self.providers.write().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(
            providers.entry(config.clone()).or_insert(provider),
        ))
    }

    /// Drop every cached provider.
    pub fn invalidate(&self) {
        self.providers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Number of cached providers.
    pub fn cached(&self) -> usize {
        self.providers.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// How a large embedding job is split up.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub batch_size: usize,
    pub max_concurrency: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 64,
            max_concurrency: 4,
        }
    }
}

/// Embed `texts` in batches dispatched concurrently, preserving input order.
///
/// Emits an `embed` progress event as each batch completes.
pub async fn embed_all(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    options: BatchOptions,
    progress: &ProgressReporter,
) -> AppResult<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    if options.batch_size == 0 || options.max_concurrency == 0 {
        return Err(AppError::InvalidInput(
            "batch size and concurrency must be greater than zero".to_string(),
        ));
    }

    let total = texts.len() as u64;
    tracing::info!(
        "Embedding {} texts using provider '{}' (model: {})",
        texts.len(),
        provider.provider_name(),
        provider.model_id()
    );

    let mut done = 0u64;
    let batches: Vec<Vec<Vec<f32>>> = stream::iter(texts.chunks(options.batch_size))
        .map(|batch| async move {
            let vectors = provider.embed_batch(batch).await?;
            check_batch(
                provider.provider_name(),
                batch.len(),
                provider.dimensions(),
                &vectors,
            )?;
            Ok::<_, AppError>(vectors)
        })
        .buffered(options.max_concurrency)
        .inspect_ok(|vectors| {
            done += vectors.len() as u64;
            progress.embed(done, Some(total), provider.model_id());
        })
        .try_collect()
        .await?;

    Ok(batches.into_iter().flatten().collect())
}
