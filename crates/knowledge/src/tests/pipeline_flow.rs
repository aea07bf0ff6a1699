//! Build and ask through the full pipeline with the offline trigram embedder
//! and a scripted LLM.

use super::write_pdf;
use crate::chunker::ChunkConfig;
use crate::embeddings::providers::trigram::TrigramProvider;
use crate::embeddings::EmbeddingProvider;
use crate::index::{IndexState, ResetOutcome};
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::rag::synthesizer::format_chunk;
use async_trait::async_trait;
use docent_core::{AppError, AppResult};
use docent_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use docent_prompt::build_prompt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const ANSWER: &str = "Inverters go in ventilated rooms.";

/// Answers every prompt from a script and records what it was sent.
struct ScriptedLlm {
    expansion: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new(expansion: Result<&str, &str>) -> Arc<Self> {
        Arc::new(Self {
            expansion: expansion.map(str::to_string).map_err(str::to_string),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn answer_prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| !p.contains("rewordings"))
            .cloned()
            .collect()
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.prompts.lock().unwrap().push(request.prompt.clone());

        let content = if request.prompt.contains("rewordings") {
            self.expansion
                .clone()
                .map_err(AppError::Generation)?
        } else {
            ANSWER.to_string()
        };

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::default(),
        })
    }
}

/// Same vector space as the trigram embedder, different model id.
#[derive(Debug)]
struct RenamedProvider(TrigramProvider);

#[async_trait]
impl EmbeddingProvider for RenamedProvider {
    fn provider_name(&self) -> &str {
        "renamed"
    }

    fn model_id(&self) -> &str {
        "renamed-v2"
    }

    fn dimensions(&self) -> usize {
        self.0.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.0.embed_batch(texts).await
    }
}

struct Workspace {
    _temp: TempDir,
    docs: PathBuf,
    index: PathBuf,
}

fn workspace() -> Workspace {
    let temp = TempDir::new().unwrap();
    let docs = temp.path().join("documents");
    std::fs::create_dir(&docs).unwrap();
    let index = temp.path().join(".docent").join("index");
    Workspace {
        _temp: temp,
        docs,
        index,
    }
}

fn write_corpus(docs: &Path) {
    write_pdf(
        &docs.join("inverters.pdf"),
        &[
            "Solar inverters must be installed in ventilated rooms away from direct sunlight.",
            "Inverter enclosures require periodic inspection of cooling fans.",
        ],
    );
    write_pdf(
        &docs.join("cables.pdf"),
        &["Copper cables buried underground require mechanical protection against impact."],
    );
}

fn config(index: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::new(index);
    config.chunking = ChunkConfig::new(1000, 100);
    config
}

fn pipeline(index: &Path, llm: Arc<ScriptedLlm>) -> Pipeline {
    Pipeline::new(config(index), Arc::new(TrigramProvider::new(256)), llm)
}

#[tokio::test]
async fn test_build_then_ask_cites_file_and_page() {
    let ws = workspace();
    write_corpus(&ws.docs);
    let llm = ScriptedLlm::new(Ok(""));

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let pipeline = pipeline(&ws.index, llm.clone()).with_progress(ProgressReporter::new(Arc::new(
        move |event: ProgressEvent| sink.lock().unwrap().push(event.phase.as_str()),
    )));

    assert_eq!(pipeline.state(), IndexState::Absent);
    let handle = pipeline.build_index(&ws.docs).await.unwrap();
    assert_eq!(handle.documents, 2);
    assert_eq!(handle.pages, 3);
    assert_eq!(handle.chunks(), 2);
    assert_eq!(pipeline.state(), IndexState::Ready);

    let phases = events.lock().unwrap().clone();
    for phase in ["discover", "load", "chunk", "embed", "persist"] {
        assert!(phases.contains(&phase), "missing {} event", phase);
    }

    let answer = pipeline
        .ask("Where must solar inverters be installed?", Some(1), false)
        .await
        .unwrap();
    assert_eq!(answer.answer, ANSWER);
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].source, "inverters.pdf");
    assert!(answer.sources[0].location.starts_with("page"));

    let prompts = llm.answer_prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("[Source: inverters.pdf | Page: 1"));
    assert!(prompts[0].contains("Where must solar inverters be installed?"));

    let stats = pipeline.stats().unwrap();
    let manifest = stats.manifest.unwrap();
    assert_eq!(manifest.count, 2);
    assert_eq!(manifest.model_id, "trigram-v1");
    assert_eq!(manifest.dimensions, 256);
}

#[tokio::test]
async fn test_empty_documents_dir_leaves_no_index() {
    let ws = workspace();
    let pipeline = pipeline(&ws.index, ScriptedLlm::new(Ok("")));

    let result = pipeline.build_index(&ws.docs).await;
    assert!(matches!(result, Err(AppError::EmptyCorpus(_))));
    assert_eq!(pipeline.state(), IndexState::Absent);
    assert!(!ws.index.exists());
}

#[tokio::test]
async fn test_corrupt_pdf_fails_build_without_persisting() {
    let ws = workspace();
    write_corpus(&ws.docs);
    std::fs::write(ws.docs.join("broken.pdf"), b"not a pdf").unwrap();
    let pipeline = pipeline(&ws.index, ScriptedLlm::new(Ok("")));

    let result = pipeline.build_index(&ws.docs).await;
    assert!(matches!(result, Err(AppError::Load { .. })));
    assert!(!ws.index.exists());
}

#[tokio::test]
async fn test_ask_before_build_is_index_missing() {
    let ws = workspace();
    let pipeline = pipeline(&ws.index, ScriptedLlm::new(Ok("")));

    assert!(matches!(
        pipeline.ask("anything?", None, false).await,
        Err(AppError::IndexMissing(_))
    ));
    assert!(matches!(
        pipeline.ask("   ", None, false).await,
        Err(AppError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_other_embedding_model_is_schema_mismatch() {
    let ws = workspace();
    write_corpus(&ws.docs);
    pipeline(&ws.index, ScriptedLlm::new(Ok("")))
        .build_index(&ws.docs)
        .await
        .unwrap();

    let renamed = Pipeline::new(
        config(&ws.index),
        Arc::new(RenamedProvider(TrigramProvider::new(256))),
        ScriptedLlm::new(Ok("")),
    );
    match renamed.ask("inverters?", None, false).await {
        Err(AppError::SchemaMismatch { expected, found }) => {
            assert_eq!(expected, "renamed-v2");
            assert_eq!(found, "trigram-v1");
        }
        other => panic!("expected schema mismatch, got {:?}", other.map(|a| a.answer)),
    }
}

#[tokio::test]
async fn test_reset_is_idempotent() {
    let ws = workspace();
    write_corpus(&ws.docs);
    let pipeline = pipeline(&ws.index, ScriptedLlm::new(Ok("")));

    assert_eq!(pipeline.reset_index().await.unwrap(), ResetOutcome::NothingToRemove);

    pipeline.build_index(&ws.docs).await.unwrap();
    assert_eq!(pipeline.reset_index().await.unwrap(), ResetOutcome::Removed);
    assert_eq!(pipeline.state(), IndexState::Absent);
    assert!(matches!(
        pipeline.ask("inverters?", None, false).await,
        Err(AppError::IndexMissing(_))
    ));
    assert_eq!(pipeline.reset_index().await.unwrap(), ResetOutcome::NothingToRemove);
}

#[tokio::test]
async fn test_rebuild_by_another_pipeline_refreshes_cached_index() {
    let ws = workspace();
    write_corpus(&ws.docs);
    let question = "Where must solar inverters be installed?";

    let reader = pipeline(&ws.index, ScriptedLlm::new(Ok("")));
    reader.build_index(&ws.docs).await.unwrap();
    let before = reader.ask(question, Some(5), false).await.unwrap();
    assert!(before.sources.iter().any(|s| s.source == "inverters.pdf"));

    std::fs::remove_file(ws.docs.join("inverters.pdf")).unwrap();
    let writer = pipeline(&ws.index, ScriptedLlm::new(Ok("")));
    writer.build_index(&ws.docs).await.unwrap();

    let after = reader.ask(question, Some(5), false).await.unwrap();
    assert_eq!(after.sources.len(), 1);
    assert_eq!(after.sources[0].source, "cables.pdf");
}

#[tokio::test]
async fn test_force_reset_clears_abandoned_build_lock() {
    let ws = workspace();
    write_corpus(&ws.docs);
    let pipeline = pipeline(&ws.index, ScriptedLlm::new(Ok("")));
    pipeline.build_index(&ws.docs).await.unwrap();

    let lock_file = ws.index.parent().unwrap().join(".index.lock");
    std::fs::write(&lock_file, "").unwrap();
    assert_eq!(pipeline.state(), IndexState::Building);
    assert!(matches!(
        pipeline.build_index(&ws.docs).await,
        Err(AppError::IndexLocked { .. })
    ));

    assert_eq!(pipeline.force_reset_index().await.unwrap(), ResetOutcome::Removed);
    assert!(!lock_file.exists());
    assert_eq!(pipeline.state(), IndexState::Absent);
    pipeline.build_index(&ws.docs).await.unwrap();
}

#[tokio::test]
async fn test_k_larger_than_index_returns_every_chunk() {
    let ws = workspace();
    write_corpus(&ws.docs);
    let pipeline = pipeline(&ws.index, ScriptedLlm::new(Ok("")));
    pipeline.build_index(&ws.docs).await.unwrap();

    let answer = pipeline.ask("cables", Some(50), false).await.unwrap();
    assert_eq!(answer.sources.len(), 2);
    assert!(answer.sources[0].score >= answer.sources[1].score);
    assert_ne!(answer.chunks[0].chunk.chunk_id, answer.chunks[1].chunk.chunk_id);
}

#[tokio::test]
async fn test_expansion_merges_without_duplicates() {
    let ws = workspace();
    write_corpus(&ws.docs);
    let llm = ScriptedLlm::new(Ok(
        "1. Inverter installation location\n2. Buried copper cable protection\n3. Cooling fan inspection",
    ));
    let pipeline = pipeline(&ws.index, llm.clone());
    pipeline.build_index(&ws.docs).await.unwrap();

    let answer = pipeline
        .ask("Where must solar inverters be installed?", Some(5), true)
        .await
        .unwrap();

    // One expansion call plus one answer call
    assert_eq!(llm.calls(), 2);
    assert_eq!(answer.sources.len(), 2);
    assert_ne!(answer.chunks[0].chunk.chunk_id, answer.chunks[1].chunk.chunk_id);
    assert!(answer.sources[0].score >= answer.sources[1].score);
}

#[tokio::test]
async fn test_expansion_failure_falls_back_to_plain_query() {
    let ws = workspace();
    write_corpus(&ws.docs);
    let llm = ScriptedLlm::new(Err("model not loaded"));
    let pipeline = pipeline(&ws.index, llm.clone());
    pipeline.build_index(&ws.docs).await.unwrap();

    let answer = pipeline
        .ask("Where must solar inverters be installed?", Some(1), true)
        .await
        .unwrap();
    assert_eq!(answer.answer, ANSWER);
    assert_eq!(answer.sources[0].source, "inverters.pdf");
    assert_eq!(llm.calls(), 2);
}

#[tokio::test]
async fn test_over_budget_chunk_is_dropped_from_prompt_and_sources() {
    let ws = workspace();
    write_corpus(&ws.docs);
    let question = "Where must solar inverters be installed?";

    let roomy = pipeline(&ws.index, ScriptedLlm::new(Ok("")));
    roomy.build_index(&ws.docs).await.unwrap();
    let full = roomy.ask(question, Some(2), false).await.unwrap();
    assert_eq!(full.sources.len(), 2);

    let mut variables = HashMap::new();
    variables.insert("question".to_string(), question.to_string());
    variables.insert("context".to_string(), String::new());
    let base = build_prompt(&config(&ws.index).answer_prompt, variables)
        .unwrap()
        .char_len();
    let first = format_chunk(&full.chunks[0].chunk).chars().count();

    let mut tight_config = config(&ws.index);
    tight_config.context_budget_chars = base + first;
    let llm = ScriptedLlm::new(Ok(""));
    let tight = Pipeline::new(tight_config, Arc::new(TrigramProvider::new(256)), llm.clone());

    let answer = tight.ask(question, Some(2), false).await.unwrap();
    assert_eq!(answer.sources, vec![full.sources[0].clone()]);
    assert_eq!(answer.dropped, 1);

    let prompt = &llm.answer_prompts()[0];
    assert!(prompt.chars().count() <= base + first);
    assert!(!prompt.contains(&full.chunks[1].chunk.text));
}
