//! Offline embedding provider built from hashed character trigrams.

use crate::embeddings::provider::EmbeddingProvider;
use docent_core::AppResult;
use std::collections::{BTreeMap, HashSet};

const MODEL_ID: &str = "trigram-v1";

/// Words too common to carry meaning in technical prose.
const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "el", "la", "los", "las", "de", "del", "en", "y", "que",
    "por", "para", "con", "una", "uno", "se", "su", "al",
];

/// Deterministic, content-aware embeddings without any network access.
///
/// Each non-stop word contributes its character trigrams and its whole-word
/// hash to a fixed-size vector, which is then normalized to unit length.
/// Suitable for tests and air-gapped use; not a semantic model.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
    stop_words: HashSet<&'static str>,
}

impl TrigramProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        let lower = text.to_lowercase();

        // BTreeMap keeps accumulation order stable across runs
        let mut frequencies: BTreeMap<&str, u32> = BTreeMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2 && !self.stop_words.contains(*w))
        {
            *frequencies.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &frequencies {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let hash = window.iter().fold(0u64, |acc, c| {
                    acc.wrapping_mul(37).wrapping_add(*c as u64)
                });
                embedding[(hash % self.dimensions as u64) as usize] += (*freq as f32).sqrt();
            }

            let word_hash = word
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            embedding[(word_hash % self.dimensions as u64) as usize] += *freq as f32;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_id(&self) -> &str {
        MODEL_ID
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_unit_length_and_dimensions() {
        let provider = TrigramProvider::new(256);
        let embedding = provider.embed_one("Grounding of photovoltaic arrays").await.unwrap();
        assert_eq!(embedding.len(), 256);
        assert!((norm(&embedding) - 1.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_deterministic() {
        let provider = TrigramProvider::new(384);
        let first = provider.embed_one("deterministic test").await.unwrap();
        let second = provider.embed_one("deterministic test").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_similar_text_scores_higher() {
        let provider = TrigramProvider::new(384);
        let query = provider.embed_one("inverter installation clearance").await.unwrap();
        let close = provider
            .embed_one("Clearance around the inverter installation must be kept free.")
            .await
            .unwrap();
        let far = provider
            .embed_one("Cable trays are painted according to the colour code.")
            .await
            .unwrap();

        assert!(dot(&query, &close) > dot(&query, &far));
    }

    #[tokio::test]
    async fn test_empty_and_stop_words_give_zero_vector() {
        let provider = TrigramProvider::new(64);
        for text in ["", "the and of"] {
            let embedding = provider.embed_one(text).await.unwrap();
            assert!(embedding.iter().all(|&x| x == 0.0));
        }
    }

    #[tokio::test]
    async fn test_non_ascii_text() {
        let provider = TrigramProvider::new(128);
        let embedding = provider
            .embed_one("Protección contra sobretensiones en módulos fotovoltaicos")
            .await
            .unwrap();
        assert!((norm(&embedding) - 1.0).abs() < 1e-3);
    }
}
