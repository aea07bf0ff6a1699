//! Configuration management for Docent.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults (local-first: Ollama for both generation and embeddings)
//! - Config file (.docent/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with persisted state stored in `.docent/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers accepted for text generation.
pub const LLM_PROVIDERS: [&str; 2] = ["ollama", "gemini"];

/// Providers accepted for embeddings.
pub const EMBEDDING_PROVIDERS: [&str; 3] = ["ollama", "gemini", "trigram"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .docent/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Directory holding the PDF corpus
    pub documents_dir: PathBuf,

    /// Directory holding the persisted vector index
    pub index_dir: PathBuf,

    /// Generative model settings
    pub llm: LlmSettings,

    /// Embedding model settings
    pub embedding: EmbeddingSettings,

    /// Chunking, retrieval and synthesis tunables
    pub pipeline: PipelineSettings,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit log lines as JSON objects
    #[serde(default)]
    pub log_json: bool,
}

/// Generative LLM settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSettings {
    /// Provider identifier ("ollama", "gemini")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Custom endpoint URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Name of the environment variable holding the API key
    #[serde(rename = "apiKeyEnv", default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Sampling temperature for answers
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens generated per answer
    #[serde(rename = "maxTokens", default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Embedding provider settings.
///
/// Changing `provider` or `model` invalidates any persisted index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingSettings {
    /// Provider identifier ("ollama", "gemini", "trigram")
    pub provider: String,

    /// Model identifier, recorded in the index manifest
    pub model: String,

    /// Expected vector dimensionality
    pub dimensions: usize,

    /// Custom endpoint URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Name of the environment variable holding the API key
    #[serde(rename = "apiKeyEnv", default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Texts per embedding request
    #[serde(rename = "batchSize", default = "default_batch_size")]
    pub batch_size: usize,
}

/// Pipeline tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineSettings {
    /// Chunk length in characters
    #[serde(rename = "chunkSize", default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[serde(rename = "chunkOverlap", default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// How far back from the window edge a paragraph or sentence break may
    /// pull a cut. Defaults to a tenth of `chunk_size`.
    #[serde(rename = "boundaryWindow", default, skip_serializing_if = "Option::is_none")]
    pub boundary_window: Option<usize>,

    /// Chunks retrieved per question
    #[serde(rename = "topK", default = "default_top_k")]
    pub top_k: usize,

    /// Paraphrases requested when query expansion is on
    #[serde(rename = "expansionQueries", default = "default_expansion_queries")]
    pub expansion_queries: usize,

    /// Upper bound on the rendered answer prompt, in characters
    #[serde(rename = "contextBudgetChars", default = "default_context_budget")]
    pub context_budget_chars: usize,

    /// Concurrent provider calls during embedding and query fan-out
    #[serde(rename = "maxConcurrency", default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Timeout applied to every provider call, in seconds
    #[serde(rename = "requestTimeoutSecs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_temperature() -> f32 {
    0.1
}

fn default_batch_size() -> usize {
    64
}

fn default_chunk_size() -> usize {
    5000
}

fn default_chunk_overlap() -> usize {
    500
}

fn default_top_k() -> usize {
    7
}

fn default_expansion_queries() -> usize {
    3
}

fn default_context_budget() -> usize {
    60_000
}

fn default_max_concurrency() -> usize {
    4
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            endpoint: None,
            api_key_env: None,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            endpoint: None,
            api_key_env: None,
            batch_size: default_batch_size(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            boundary_window: None,
            top_k: default_top_k(),
            expansion_queries: default_expansion_queries(),
            context_budget_chars: default_context_budget(),
            max_concurrency: default_max_concurrency(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl PipelineSettings {
    /// Effective boundary window in characters.
    pub fn boundary_window(&self) -> usize {
        self.boundary_window.unwrap_or(self.chunk_size / 10)
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    documents: Option<String>,
    index: Option<String>,
    llm: Option<LlmSettings>,
    embedding: Option<EmbeddingSettings>,
    pipeline: Option<PipelineSettings>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    /// "text" or "json"
    format: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let workspace = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::for_workspace(workspace)
    }
}

impl AppConfig {
    /// Defaults rooted at the given workspace.
    pub fn for_workspace(workspace: impl Into<PathBuf>) -> Self {
        let workspace = workspace.into();
        Self {
            documents_dir: workspace.join("documents"),
            index_dir: workspace.join(".docent").join("index"),
            workspace,
            config_file: None,
            llm: LlmSettings::default(),
            embedding: EmbeddingSettings::default(),
            pipeline: PipelineSettings::default(),
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
        }
    }

    /// Load configuration from environment variables, the workspace config
    /// file and defaults.
    ///
    /// Environment variables:
    /// - `DOCENT_WORKSPACE`: Override workspace path
    /// - `DOCENT_CONFIG`: Path to config file
    /// - `DOCENT_DOCS`: Documents directory
    /// - `DOCENT_INDEX`: Index directory
    /// - `DOCENT_LLM_PROVIDER` / `DOCENT_LLM_MODEL`
    /// - `DOCENT_EMBEDDING_PROVIDER` / `DOCENT_EMBEDDING_MODEL`
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    /// - `DOCENT_LOG_FORMAT`: `text` or `json`
    ///
    /// # Example
    /// ```no_run
    /// use docent_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Index: {:?}", config.index_dir);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], with an explicit workspace and config file
    /// taking precedence over `DOCENT_WORKSPACE` and `DOCENT_CONFIG`.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let workspace = match workspace {
            Some(workspace) => workspace,
            None => match std::env::var("DOCENT_WORKSPACE") {
                Ok(workspace) => PathBuf::from(workspace),
                Err(_) => std::env::current_dir()?,
            },
        };
        let config_file =
            config_file.or_else(|| std::env::var("DOCENT_CONFIG").ok().map(PathBuf::from));

        let mut config = Self::from_workspace(&workspace, config_file)?;

        // Environment variables override YAML config
        if let Ok(docs) = std::env::var("DOCENT_DOCS") {
            config.documents_dir = config.resolve(&docs);
        }
        if let Ok(index) = std::env::var("DOCENT_INDEX") {
            config.index_dir = config.resolve(&index);
        }
        if let Ok(provider) = std::env::var("DOCENT_LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(model) = std::env::var("DOCENT_LLM_MODEL") {
            config.llm.model = model;
        }
        if let Ok(provider) = std::env::var("DOCENT_EMBEDDING_PROVIDER") {
            config.embedding.provider = provider;
        }
        if let Ok(model) = std::env::var("DOCENT_EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }
        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }
        if let Ok(format) = std::env::var("DOCENT_LOG_FORMAT") {
            config.log_json = parse_log_format(&format)?;
        }

        Ok(config)
    }

    /// Build configuration for a workspace, merging its YAML file if present.
    ///
    /// Does not consult environment variables.
    pub fn from_workspace(workspace: &Path, config_file: Option<PathBuf>) -> AppResult<Self> {
        if !workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                workspace
            )));
        }

        let mut config = Self::for_workspace(workspace);
        config.config_file = config_file;

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.docent_dir().join("config.yaml"));

        if config_path.exists() {
            config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &Path) -> AppResult<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        if let Some(docs) = config_file.documents {
            self.documents_dir = self.resolve(&docs);
        }
        if let Some(index) = config_file.index {
            self.index_dir = self.resolve(&index);
        }
        if let Some(llm) = config_file.llm {
            self.llm = llm;
        }
        if let Some(embedding) = config_file.embedding {
            self.embedding = embedding;
        }
        if let Some(pipeline) = config_file.pipeline {
            self.pipeline = pipeline;
        }
        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
            if let Some(format) = logging.format {
                self.log_json = parse_log_format(&format)?;
            }
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// This method merges command-line flags with the loaded configuration,
    /// giving precedence to CLI flags over environment variables.
    pub fn with_overrides(mut self, overrides: CliOverrides) -> Self {
        if let Some(docs) = overrides.documents_dir {
            self.documents_dir = docs;
        }
        if let Some(index) = overrides.index_dir {
            self.index_dir = index;
        }
        if let Some(provider) = overrides.llm_provider {
            self.llm.provider = provider;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(provider) = overrides.embedding_provider {
            self.embedding.provider = provider;
        }
        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(log_level) = overrides.log_level {
            self.log_level = Some(log_level);
        }

        if overrides.verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if overrides.no_color {
            self.no_color = true;
        }
        if overrides.log_json {
            self.log_json = true;
        }

        self
    }

    /// Get the path to the .docent directory.
    pub fn docent_dir(&self) -> PathBuf {
        self.workspace.join(".docent")
    }

    /// Ensure the .docent directory exists.
    pub fn ensure_docent_dir(&self) -> AppResult<()> {
        let docent_dir = self.docent_dir();
        if !docent_dir.exists() {
            std::fs::create_dir_all(&docent_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .docent directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolve the LLM API key from its configured environment variable.
    pub fn llm_api_key(&self) -> Option<String> {
        resolve_key(&self.llm.provider, self.llm.api_key_env.as_deref())
    }

    /// Resolve the embedding API key from its configured environment variable.
    pub fn embedding_api_key(&self) -> Option<String> {
        resolve_key(&self.embedding.provider, self.embedding.api_key_env.as_deref())
    }

    /// Validate provider names and pipeline tunables.
    pub fn validate(&self) -> AppResult<()> {
        if !LLM_PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown LLM provider: {}. Supported: {}",
                self.llm.provider,
                LLM_PROVIDERS.join(", ")
            )));
        }

        if !EMBEDDING_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding.provider,
                EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if self.llm.provider == "gemini" && self.llm_api_key().is_none() {
            return Err(AppError::Config(
                "Gemini LLM requires an API key (set GOOGLE_API_KEY or llm.apiKeyEnv)".to_string(),
            ));
        }

        if self.embedding.provider == "gemini" && self.embedding_api_key().is_none() {
            return Err(AppError::Config(
                "Gemini embeddings require an API key (set GOOGLE_API_KEY or embedding.apiKeyEnv)"
                    .to_string(),
            ));
        }

        let p = &self.pipeline;
        if p.chunk_size == 0 || p.chunk_overlap >= p.chunk_size {
            return Err(AppError::Config(format!(
                "chunkOverlap ({}) must be smaller than chunkSize ({})",
                p.chunk_overlap, p.chunk_size
            )));
        }
        if p.top_k == 0 {
            return Err(AppError::Config("topK must be positive".to_string()));
        }
        if p.max_concurrency == 0 {
            return Err(AppError::Config(
                "maxConcurrency must be positive".to_string(),
            ));
        }
        if self.embedding.dimensions == 0 || self.embedding.batch_size == 0 {
            return Err(AppError::Config(
                "embedding dimensions and batchSize must be positive".to_string(),
            ));
        }

        Ok(())
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            path
        } else {
            self.workspace.join(path)
        }
    }
}

/// Command-line overrides, applied last.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub documents_dir: Option<PathBuf>,
    pub index_dir: Option<PathBuf>,
    pub llm_provider: Option<String>,
    pub llm_model: Option<String>,
    pub embedding_provider: Option<String>,
    pub embedding_model: Option<String>,
    pub log_level: Option<String>,
    pub verbose: bool,
    pub no_color: bool,
    pub log_json: bool,
}

fn parse_log_format(format: &str) -> AppResult<bool> {
    match format.trim().to_ascii_lowercase().as_str() {
        "text" | "pretty" => Ok(false),
        "json" => Ok(true),
        other => Err(AppError::Config(format!(
            "Unknown log format '{}' (expected text or json)",
            other
        ))),
    }
}

fn resolve_key(provider: &str, env_var: Option<&str>) -> Option<String> {
    let env_var = match env_var {
        Some(var) => var,
        None if provider == "gemini" => "GOOGLE_API_KEY",
        None => return None,
    };
    std::env::var(env_var).ok().filter(|key| !key.is_empty())
}
