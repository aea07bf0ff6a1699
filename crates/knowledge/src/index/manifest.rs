//! Index manifest and distance metrics.

use chrono::{DateTime, Utc};
use docent_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Version of the on-disk layout written by this crate.
pub const FORMAT_VERSION: u32 = 1;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const VECTORS_FILE: &str = "vectors.bin";
pub const CHUNKS_FILE: &str = "chunks.jsonl";

/// Similarity metric. Scores are always "higher is better".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    /// Euclidean distance, negated
    L2,
}

impl Metric {
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => cosine_similarity(a, b),
            Metric::L2 => -a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::L2 => "l2",
        }
    }
}

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Describes the contents of a persisted index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub format_version: u32,
    pub provider: String,
    pub model_id: String,
    pub dimensions: usize,
    pub metric: Metric,
    pub count: usize,
    pub created_at: DateTime<Utc>,
}

impl Manifest {
    /// Read and parse `manifest.json` from an index directory.
    pub fn read(dir: &Path) -> AppResult<Self> {
        let path = dir.join(MANIFEST_FILE);
        let contents = fs::read_to_string(&path)
            .map_err(|e| AppError::corrupt(dir, format!("cannot read {}: {}", MANIFEST_FILE, e)))?;

        let manifest: Manifest = serde_json::from_str(&contents)
            .map_err(|e| AppError::corrupt(dir, format!("invalid {}: {}", MANIFEST_FILE, e)))?;

        if manifest.format_version != FORMAT_VERSION {
            return Err(AppError::corrupt(
                dir,
                format!(
                    "unsupported format version {} (expected {})",
                    manifest.format_version, FORMAT_VERSION
                ),
            ));
        }
        if manifest.dimensions == 0 {
            return Err(AppError::corrupt(dir, "manifest declares zero dimensions"));
        }

        Ok(manifest)
    }

    /// Size in bytes `vectors.bin` must have, `None` if it overflows.
    pub fn vector_bytes(&self) -> Option<usize> {
        self.count
            .checked_mul(self.dimensions)?
            .checked_mul(std::mem::size_of::<f32>())
    }

    pub fn write(&self, dir: &Path) -> AppResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(MANIFEST_FILE), json)?;
        Ok(())
    }
}
