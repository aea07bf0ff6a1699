//! In-memory vector index with directory persistence.
//!
//! An index is built in full from a chunk set, written to disk as a
//! manifest, a little-endian `f32` vector blob and a JSON-lines payload
//! file, and loaded back read-only. Directory lifecycle (state, reset,
//! locking) lives in [`store`].

pub mod manifest;
pub mod store;

pub use manifest::{Manifest, Metric};
pub use store::{IndexLock, IndexState, IndexStats, IndexStore, LockHolder, ResetOutcome};

use crate::embeddings::{embed_all, BatchOptions, EmbeddingProvider};
use crate::progress::ProgressReporter;
use crate::types::{Chunk, ScoredChunk};
use chrono::Utc;
use docent_core::{AppError, AppResult};
use manifest::{CHUNKS_FILE, FORMAT_VERSION, VECTORS_FILE};
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Options for [`VectorIndex::build`].
#[derive(Clone)]
pub struct BuildOptions {
    pub batch: BatchOptions,
    pub metric: Metric,
    pub progress: ProgressReporter,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            batch: BatchOptions::default(),
            metric: Metric::Cosine,
            progress: ProgressReporter::noop(),
        }
    }
}

/// Read-only collection of (vector, chunk) entries of one dimensionality.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    manifest: Manifest,
    /// Row-major, `count * dimensions` values
    vectors: Vec<f32>,
    chunks: Vec<Chunk>,
}

impl VectorIndex {
    /// Embed every chunk and assemble a ready index.
    pub async fn build(
        chunks: Vec<Chunk>,
        provider: &dyn EmbeddingProvider,
        options: &BuildOptions,
    ) -> AppResult<Self> {
        if chunks.is_empty() {
            return Err(AppError::EmptyCorpus(
                "no text chunks were produced from the documents".to_string(),
            ));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embed_all(provider, &texts, options.batch, &options.progress).await?;

        Self::from_entries(
            provider.provider_name(),
            provider.model_id(),
            provider.dimensions(),
            options.metric,
            vectors.into_iter().zip(chunks).collect(),
        )
    }

    /// Assemble an index from precomputed vectors.
    pub fn from_entries(
        provider: &str,
        model_id: &str,
        dimensions: usize,
        metric: Metric,
        entries: Vec<(Vec<f32>, Chunk)>,
    ) -> AppResult<Self> {
        if entries.is_empty() {
            return Err(AppError::EmptyCorpus("index has no entries".to_string()));
        }
        if dimensions == 0 {
            return Err(AppError::InvalidInput(
                "embedding dimensions must be at least 1".to_string(),
            ));
        }

        let mut vectors = Vec::with_capacity(entries.len() * dimensions);
        let mut chunks = Vec::with_capacity(entries.len());
        for (vector, chunk) in entries {
            if vector.len() != dimensions {
                return Err(AppError::SchemaMismatch {
                    expected: format!("{} dimensions", dimensions),
                    found: format!("{} dimensions", vector.len()),
                });
            }
            vectors.extend(vector);
            chunks.push(chunk);
        }

        Ok(Self {
            manifest: Manifest {
                format_version: FORMAT_VERSION,
                provider: provider.to_string(),
                model_id: model_id.to_string(),
                dimensions,
                metric,
                count: chunks.len(),
                created_at: Utc::now(),
            },
            vectors,
            chunks,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn model_id(&self) -> &str {
        &self.manifest.model_id
    }

    pub fn dimensions(&self) -> usize {
        self.manifest.dimensions
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Return up to `k` entries, best first; ties keep insertion order.
    pub fn query(&self, vector: &[f32], k: usize) -> AppResult<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(AppError::InvalidInput("k must be at least 1".to_string()));
        }
        if vector.len() != self.dimensions() {
            return Err(AppError::SchemaMismatch {
                expected: format!("{} dimensions", self.dimensions()),
                found: format!("{} dimensions", vector.len()),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimensions())
            .map(|row| self.manifest.metric.score(vector, row))
            .enumerate()
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.chunks[i].clone(),
                score,
            })
            .collect())
    }

    /// Write the index to `dir`, replacing any previous index there.
    ///
    /// Files are written into a temporary sibling directory which is then
    /// renamed into place, so a failed write never leaves a loadable
    /// partial index behind.
    pub fn persist(&self, dir: &Path) -> AppResult<()> {
        let staging = sibling_path(dir, "tmp")?;
        if let Some(parent) = staging.parent() {
            fs::create_dir_all(parent)?;
        }

        if let Err(e) = self.write_files(&staging) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        if let Err(e) = swap_into_place(&staging, dir) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        tracing::info!(
            entries = self.len(),
            model = %self.manifest.model_id,
            "Persisted index to {:?}",
            dir
        );
        Ok(())
    }

    fn write_files(&self, staging: &Path) -> AppResult<()> {
        fs::create_dir_all(staging)?;

        let mut blob = BufWriter::new(fs::File::create(staging.join(VECTORS_FILE))?);
        for value in &self.vectors {
            blob.write_all(&value.to_le_bytes())?;
        }
        blob.into_inner().map_err(|e| e.into_error())?.sync_all()?;

        let mut payloads = BufWriter::new(fs::File::create(staging.join(CHUNKS_FILE))?);
        for chunk in &self.chunks {
            serde_json::to_writer(&mut payloads, chunk)?;
            payloads.write_all(b"\n")?;
        }
        payloads.into_inner().map_err(|e| e.into_error())?.sync_all()?;

        // Manifest last: its presence marks a complete index
        self.manifest.write(staging)
    }

    /// Load a persisted index, checking it against the expected model.
    pub fn load(dir: &Path, expected_model: &str) -> AppResult<Self> {
        let manifest = Manifest::read(dir)?;

        if manifest.model_id != expected_model {
            return Err(AppError::SchemaMismatch {
                expected: expected_model.to_string(),
                found: manifest.model_id,
            });
        }

        let blob = fs::read(dir.join(VECTORS_FILE))
            .map_err(|e| AppError::corrupt(dir, format!("cannot read {}: {}", VECTORS_FILE, e)))?;
        let expected_bytes = manifest.vector_bytes().ok_or_else(|| {
            AppError::corrupt(
                dir,
                format!(
                    "manifest size {} x {} is out of range",
                    manifest.count, manifest.dimensions
                ),
            )
        })?;
        if blob.len() != expected_bytes {
            return Err(AppError::corrupt(
                dir,
                format!(
                    "{} holds {} bytes, manifest implies {}",
                    VECTORS_FILE,
                    blob.len(),
                    expected_bytes
                ),
            ));
        }
        let vectors: Vec<f32> = blob
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let file = fs::File::open(dir.join(CHUNKS_FILE))
            .map_err(|e| AppError::corrupt(dir, format!("cannot read {}: {}", CHUNKS_FILE, e)))?;
        let mut chunks = Vec::with_capacity(manifest.count.min(vectors.len()));
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let chunk: Chunk = serde_json::from_str(&line).map_err(|e| {
                AppError::corrupt(dir, format!("{} line {}: {}", CHUNKS_FILE, line_no + 1, e))
            })?;
            chunks.push(chunk);
        }
        if chunks.len() != manifest.count {
            return Err(AppError::corrupt(
                dir,
                format!(
                    "{} holds {} entries, manifest declares {}",
                    CHUNKS_FILE,
                    chunks.len(),
                    manifest.count
                ),
            ));
        }

        tracing::debug!(entries = chunks.len(), "Loaded index from {:?}", dir);
        Ok(Self {
            manifest,
            vectors,
            chunks,
        })
    }
}

/// Hidden sibling of `dir` used for staging and swaps: `.<name>.<tag>-<uuid>`.
pub(crate) fn sibling_path(dir: &Path, tag: &str) -> AppResult<PathBuf> {
    let name = dir
        .file_name()
        .ok_or_else(|| AppError::Config(format!("invalid index directory: {:?}", dir)))?
        .to_string_lossy();
    let parent = dir.parent().unwrap_or_else(|| Path::new("."));
    Ok(parent.join(format!(".{}.{}-{}", name, tag, uuid::Uuid::new_v4())))
}

fn swap_into_place(staging: &Path, dir: &Path) -> AppResult<()> {
    if !dir.exists() {
        fs::rename(staging, dir)?;
        return Ok(());
    }

    let retired = sibling_path(dir, "old")?;
    fs::rename(dir, &retired)?;
    if let Err(e) = fs::rename(staging, dir) {
        // Put the previous index back
        let _ = fs::rename(&retired, dir);
        return Err(e.into());
    }
    if let Err(e) = fs::remove_dir_all(&retired) {
        tracing::warn!("Failed to remove previous index {:?}: {}", retired, e);
    }
    Ok(())
}
