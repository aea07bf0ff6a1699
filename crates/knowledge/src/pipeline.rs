//! Pipeline orchestrator.
//!
//! Composes the loader, chunker, embedding provider, vector index,
//! retriever and synthesizer into the two caller-facing paths: building an
//! index from a documents directory, and answering a question from it.

use crate::chunker::{chunk_pages, ChunkConfig};
use crate::embeddings::{BatchOptions, EmbeddingConfig, EmbeddingEngine, EmbeddingProvider};
use crate::index::{
    BuildOptions, IndexState, IndexStats, IndexStore, Manifest, Metric, ResetOutcome,
    VectorIndex,
};
use crate::loader::DocumentLoader;
use crate::progress::ProgressReporter;
use crate::types::Page;
use crate::rag::{Answer, AnswerSynthesizer, GenerationSettings, QueryExpander, Retriever};
use docent_core::{AppConfig, AppError, AppResult};
use docent_llm::{create_client, LlmClient};
use docent_prompt::{builtin_prompts, load_prompt, PromptDefinition, ANSWER_PROMPT_ID, EXPAND_PROMPT_ID};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Everything the pipeline needs besides its two providers.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub index_dir: PathBuf,
    pub chunking: ChunkConfig,
    pub batch: BatchOptions,
    pub metric: Metric,
    pub top_k: usize,
    pub expansion_queries: usize,
    pub context_budget_chars: usize,
    pub generation: GenerationSettings,
    pub answer_prompt: PromptDefinition,
    pub expand_prompt: PromptDefinition,
}

impl PipelineConfig {
    /// Defaults with the built-in prompts.
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        let mut answer_prompt = None;
        let mut expand_prompt = None;
        for prompt in builtin_prompts() {
            match prompt.id.as_str() {
                ANSWER_PROMPT_ID => answer_prompt = Some(prompt),
                EXPAND_PROMPT_ID => expand_prompt = Some(prompt),
                _ => {}
            }
        }

        Self {
            index_dir: index_dir.into(),
            chunking: ChunkConfig::default(),
            batch: BatchOptions::default(),
            metric: Metric::Cosine,
            top_k: 7,
            expansion_queries: 3,
            context_budget_chars: 60_000,
            generation: GenerationSettings::default(),
            answer_prompt: answer_prompt.unwrap_or_else(|| fallback_prompt(ANSWER_PROMPT_ID)),
            expand_prompt: expand_prompt.unwrap_or_else(|| fallback_prompt(EXPAND_PROMPT_ID)),
        }
    }

    /// Derive from the application configuration, honouring workspace
    /// prompt overrides.
    pub fn from_app_config(config: &AppConfig) -> AppResult<Self> {
        let pipeline = &config.pipeline;
        Ok(Self {
            index_dir: config.index_dir.clone(),
            chunking: ChunkConfig::from_settings(pipeline),
            batch: BatchOptions {
                batch_size: config.embedding.batch_size,
                max_concurrency: pipeline.max_concurrency,
            },
            metric: Metric::Cosine,
            top_k: pipeline.top_k,
            expansion_queries: pipeline.expansion_queries,
            context_budget_chars: pipeline.context_budget_chars,
            generation: GenerationSettings {
                model: config.llm.model.clone(),
                temperature: config.llm.temperature,
                max_tokens: config.llm.max_tokens,
                timeout: Duration::from_secs(pipeline.request_timeout_secs),
            },
            answer_prompt: load_prompt(&config.workspace, ANSWER_PROMPT_ID)?,
            expand_prompt: load_prompt(&config.workspace, EXPAND_PROMPT_ID)?,
        })
    }
}

fn fallback_prompt(id: &str) -> PromptDefinition {
    PromptDefinition {
        id: id.to_string(),
        title: id.to_string(),
        api_version: "1.0".to_string(),
        system: None,
        variables: Vec::new(),
        template: "{{question}}".to_string(),
    }
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    pub index: Arc<VectorIndex>,
    pub dir: PathBuf,
    pub documents: usize,
    pub pages: usize,
}

impl IndexHandle {
    pub fn chunks(&self) -> usize {
        self.index.len()
    }
}

/// Caller-facing entry point for building and querying an index.
pub struct Pipeline {
    config: PipelineConfig,
    provider: Arc<dyn EmbeddingProvider>,
    store: IndexStore,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    progress: ProgressReporter,
    /// Loaded index; reused while its manifest matches the one on disk
    cached: Mutex<Option<Arc<VectorIndex>>>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        provider: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        let expander = QueryExpander::new(
            Arc::clone(&llm),
            config.expand_prompt.clone(),
            config.generation.clone(),
        );
        let retriever = Retriever::new(Arc::clone(&provider))
            .with_expander(expander, config.expansion_queries)
            .with_max_concurrency(config.batch.max_concurrency);
        let synthesizer = AnswerSynthesizer::new(
            llm,
            config.answer_prompt.clone(),
            config.generation.clone(),
            config.context_budget_chars,
        );

        Self {
            store: IndexStore::new(config.index_dir.clone()),
            config,
            provider,
            retriever,
            synthesizer,
            progress: ProgressReporter::noop(),
            cached: Mutex::new(None),
        }
    }

    /// Build a pipeline from the application configuration.
    pub fn from_config(app: &AppConfig) -> AppResult<Self> {
        app.validate()?;

        let embedding = EmbeddingConfig::from_app_config(app);
        let provider = EmbeddingEngine::global().provider(&embedding)?;

        let llm_key = app.llm_api_key();
        let llm = create_client(
            &app.llm.provider,
            app.llm.endpoint.as_deref(),
            llm_key.as_deref(),
        )?;

        tracing::debug!(
            embedding_provider = provider.provider_name(),
            embedding_model = provider.model_id(),
            llm_provider = llm.provider_name(),
            "Pipeline configured"
        );

        Ok(Self::new(PipelineConfig::from_app_config(app)?, provider, llm))
    }

    /// Report build progress through `progress`.
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> IndexState {
        self.store.state()
    }

    pub fn stats(&self) -> AppResult<IndexStats> {
        self.store.stats()
    }

    /// Load, chunk and embed every PDF in `doc_dir`, then persist the index.
    ///
    /// Holds the directory lock for the whole build. On any failure the
    /// previously persisted index, if there was one, is left untouched.
    pub async fn build_index(&self, doc_dir: &Path) -> AppResult<IndexHandle> {
        self.config.chunking.validate()?;
        let _lock = self.store.lock().await?;
        self.invalidate_cache();

        tracing::info!("Building index from {:?} into {:?}", doc_dir, self.store.dir());

        let page_iter = DocumentLoader::pages(doc_dir)?;
        let documents = page_iter.file_count();
        self.progress.discover(documents, doc_dir);
        if documents == 0 {
            return Err(AppError::EmptyCorpus(format!(
                "no PDF files found in {:?}",
                doc_dir
            )));
        }

        let progress = self.progress.clone();
        let pages: Vec<Page> = page_iter
            .on_file(move |done, path, page_count| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                progress.load(done, documents, &name, page_count);
            })
            .collect::<AppResult<_>>()?;

        let chunks = chunk_pages(&pages, &self.config.chunking)?;
        self.progress.chunk(pages.len(), chunks.len());
        if chunks.is_empty() {
            return Err(AppError::EmptyCorpus(format!(
                "the documents in {:?} contain no extractable text",
                doc_dir
            )));
        }

        let options = BuildOptions {
            batch: self.config.batch,
            metric: self.config.metric,
            progress: self.progress.clone(),
        };
        let index = Arc::new(VectorIndex::build(chunks, self.provider.as_ref(), &options).await?);

        index.persist(self.store.dir())?;
        self.progress.persist(index.len(), self.store.dir());

        tracing::info!(
            documents,
            pages = pages.len(),
            chunks = index.len(),
            "Index build complete"
        );

        *self.cache() = Some(Arc::clone(&index));

        Ok(IndexHandle {
            index,
            dir: self.store.dir().to_path_buf(),
            documents,
            pages: pages.len(),
        })
    }

    /// Answer `question` from the persisted index.
    ///
    /// `k` defaults to the configured top-k.
    pub async fn ask(&self, question: &str, k: Option<usize>, expand: bool) -> AppResult<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::InvalidInput("question must not be empty".to_string()));
        }
        let k = k.unwrap_or(self.config.top_k);
        if k == 0 {
            return Err(AppError::InvalidInput("k must be at least 1".to_string()));
        }

        let index = self.loaded_index()?;
        let retrieved = self.retriever.retrieve(&index, question, k, expand).await?;

        tracing::info!(
            retrieved = retrieved.len(),
            top_score = retrieved.first().map(|r| r.score).unwrap_or(0.0),
            expand,
            "Retrieved context"
        );

        self.synthesizer.answer(question, retrieved).await
    }

    /// Delete the persisted index and forget the cached copy.
    pub async fn reset_index(&self) -> AppResult<ResetOutcome> {
        self.invalidate_cache();
        self.store.reset().await
    }

    /// Like [`Pipeline::reset_index`], but also clears a lock file left by a
    /// build that no longer runs.
    pub async fn force_reset_index(&self) -> AppResult<ResetOutcome> {
        self.invalidate_cache();
        self.store.force_reset().await
    }

    fn loaded_index(&self) -> AppResult<Arc<VectorIndex>> {
        match self.store.state() {
            IndexState::Ready => {}
            IndexState::Building if self.store.has_index() => {
                tracing::warn!("A build is in progress; answering from the previous index")
            }
            _ => return Err(AppError::IndexMissing(self.store.dir().to_path_buf())),
        }

        // Another pipeline or process may have rebuilt the index since it
        // was cached; the manifest is rewritten on every persist.
        let on_disk = Manifest::read(self.store.dir())?;
        let mut cached = self.cache();
        if let Some(index) = cached.as_ref() {
            if index.model_id() == self.provider.model_id() && index.manifest() == &on_disk {
                return Ok(Arc::clone(index));
            }
            tracing::debug!(
                cached_model = index.model_id(),
                current_model = self.provider.model_id(),
                cached_created_at = %index.manifest().created_at,
                disk_created_at = %on_disk.created_at,
                "Cached index is stale, reloading"
            );
        }

        let index = VectorIndex::load(self.store.dir(), self.provider.model_id())?;
        if index.dimensions() != self.provider.dimensions() {
            return Err(AppError::SchemaMismatch {
                expected: format!("{} dimensions", self.provider.dimensions()),
                found: format!("{} dimensions", index.dimensions()),
            });
        }

        let index = Arc::new(index);
        *cached = Some(Arc::clone(&index));
        Ok(index)
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, Option<Arc<VectorIndex>>> {
        self.cached.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn invalidate_cache(&self) {
        *self.cache() = None;
    }
}
