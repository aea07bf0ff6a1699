//! Similarity retrieval, optionally fanned out over expanded queries.

use crate::embeddings::provider::check_batch;
use crate::embeddings::EmbeddingProvider;
use crate::index::VectorIndex;
use crate::rag::expander::QueryExpander;
use crate::types::ScoredChunk;
use docent_core::{AppError, AppResult};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::Arc;

/// Turns a question into the most relevant chunks of an index.
#[derive(Clone)]
pub struct Retriever {
    provider: Arc<dyn EmbeddingProvider>,
    expander: Option<QueryExpander>,
    expansion_queries: usize,
    max_concurrency: usize,
}

impl Retriever {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            expander: None,
            expansion_queries: 3,
            max_concurrency: 4,
        }
    }

    /// Enable multi-query retrieval with `queries` LLM-generated variants.
    pub fn with_expander(mut self, expander: QueryExpander, queries: usize) -> Self {
        self.expander = Some(expander);
        self.expansion_queries = queries;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Up to `k` chunks, most relevant first.
    ///
    /// With `expand`, the question and its variants are all searched and the
    /// results merged. Any expansion failure falls back to the plain search.
    pub async fn retrieve(
        &self,
        index: &VectorIndex,
        query: &str,
        k: usize,
        expand: bool,
    ) -> AppResult<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(AppError::InvalidInput("k must be at least 1".to_string()));
        }

        if expand {
            match self.variants(query).await {
                Ok(variants) => return self.multi_query(index, query, variants, k).await,
                Err(e) => {
                    tracing::warn!("Query expansion failed, using the original query only: {}", e)
                }
            }
        }

        let vector = self.provider.embed_one(query).await?;
        let results = index.query(&vector, k)?;
        tracing::debug!(k, hits = results.len(), "Retrieved chunks");
        Ok(results)
    }

    async fn variants(&self, query: &str) -> AppResult<Vec<String>> {
        let expander = self
            .expander
            .as_ref()
            .ok_or_else(|| AppError::Config("query expansion is not configured".to_string()))?;
        expander.expand(query, self.expansion_queries).await
    }

    async fn multi_query(
        &self,
        index: &VectorIndex,
        query: &str,
        variants: Vec<String>,
        k: usize,
    ) -> AppResult<Vec<ScoredChunk>> {
        let mut queries = Vec::with_capacity(variants.len() + 1);
        queries.push(query.to_string());
        queries.extend(variants);

        let vectors = self.provider.embed_batch(&queries).await?;
        check_batch(
            self.provider.provider_name(),
            queries.len(),
            self.provider.dimensions(),
            &vectors,
        )?;

        let per_query: Vec<Vec<ScoredChunk>> = stream::iter(vectors)
            .map(|vector| async move { index.query(&vector, k) })
            .buffered(self.max_concurrency)
            .try_collect()
            .await?;

        tracing::debug!(queries = queries.len(), k, "Merging multi-query results");
        Ok(merge_results(per_query, k))
    }
}

/// Merge ranked lists, keeping the best score per chunk id.
///
/// Ties are ordered by first appearance across the lists.
pub fn merge_results(lists: Vec<Vec<ScoredChunk>>, k: usize) -> Vec<ScoredChunk> {
    let mut merged: Vec<ScoredChunk> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for hit in lists.into_iter().flatten() {
        match positions.get(&hit.chunk.chunk_id) {
            Some(&i) => {
                if hit.score > merged[i].score {
                    merged[i].score = hit.score;
                }
            }
            None => {
                positions.insert(hit.chunk.chunk_id.clone(), merged.len());
                merged.push(hit);
            }
        }
    }

    merged.sort_by(|a, b| b.score.total_cmp(&a.score));
    merged.truncate(k);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Metric;
    use crate::types::Chunk;

    fn scored(id: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                chunk_id: id.to_string(),
                source_id: "doc.pdf".to_string(),
                page_number: 0,
                page_end: 0,
                position: 0,
                start: 0,
                end: 1,
                text: id.to_string(),
            },
            score,
        }
    }

    fn ids(results: &[ScoredChunk]) -> Vec<&str> {
        results.iter().map(|r| r.chunk.chunk_id.as_str()).collect()
    }

    #[test]
    fn test_merge_keeps_best_score_per_chunk() {
        let merged = merge_results(
            vec![
                vec![scored("a", 0.9), scored("b", 0.5)],
                vec![scored("b", 0.95), scored("c", 0.4)],
            ],
            10,
        );
        assert_eq!(ids(&merged), vec!["b", "a", "c"]);
        assert_eq!(merged[0].score, 0.95);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_merge_ties_keep_first_appearance_and_truncate() {
        let merged = merge_results(
            vec![
                vec![scored("x", 0.5), scored("y", 0.5)],
                vec![scored("z", 0.5)],
            ],
            2,
        );
        assert_eq!(ids(&merged), vec!["x", "y"]);
    }

    /// Embeds "north"/"east" onto fixed axes so rankings are predictable.
    #[derive(Debug)]
    struct CompassProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for CompassProvider {
        fn provider_name(&self) -> &str {
            "compass"
        }

        fn model_id(&self) -> &str {
            "compass-v1"
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| match t.as_str() {
                    "north" => vec![0.0, 1.0],
                    "east" => vec![1.0, 0.0],
                    _ => vec![0.6, 0.8],
                })
                .collect())
        }
    }

    fn compass_index() -> VectorIndex {
        VectorIndex::from_entries(
            "compass",
            "compass-v1",
            2,
            Metric::Cosine,
            vec![
                (vec![0.0, 1.0], scored("north", 0.0).chunk),
                (vec![1.0, 0.0], scored("east", 0.0).chunk),
                (vec![0.6, 0.8], scored("mixed", 0.0).chunk),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_plain_retrieval() {
        let retriever = Retriever::new(Arc::new(CompassProvider));
        let results = retriever
            .retrieve(&compass_index(), "east", 1, false)
            .await
            .unwrap();
        assert_eq!(ids(&results), vec!["east"]);
    }

    #[tokio::test]
    async fn test_expand_without_expander_falls_back() {
        let retriever = Retriever::new(Arc::new(CompassProvider));
        let results = retriever
            .retrieve(&compass_index(), "north", 2, true)
            .await
            .unwrap();
        assert_eq!(ids(&results), vec!["north", "mixed"]);
    }

    #[tokio::test]
    async fn test_zero_k_is_invalid() {
        let retriever = Retriever::new(Arc::new(CompassProvider));
        assert!(matches!(
            retriever.retrieve(&compass_index(), "north", 0, false).await,
            Err(AppError::InvalidInput(_))
        ));
    }
}
