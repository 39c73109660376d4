//! The task operations: document ingestion, retrieval-augmented Q&A,
//! summarization, sentiment, entities, code generation, and open QA.
//!
//! # Pipeline
//!
//! ```text
//! Document ─► extract ─► chunk ─► embed ─► VectorIndex ─► Session
//!                                                │
//! query ─► embed ─► top-k ─► context ─► ModelRequest ─► dispatch ─► text
//! ```
//!
//! An [`Assistant`] holds the long-lived pieces (chunking options, the
//! embedder, the dispatcher); everything per-user lives in the [`Session`]
//! passed to each call. A failure anywhere leaves the session as it was:
//! an index is only installed after a complete build, and a turn is only
//! appended after a successful dispatch.

use anyhow::Context;
use serde::Serialize;

use ragdesk_core::backend::{BackendRegistry, DispatchState, ModelDispatcher, ResponseFormat};
use ragdesk_core::chunk::{chunk_text, ChunkingOptions};
use ragdesk_core::embedding::Embedder;
use ragdesk_core::index::{DistanceMetric, VectorIndex};
use ragdesk_core::models::{Document, DocumentKind};
use ragdesk_core::prompt::{ModelRequest, Task};
use ragdesk_core::session::Session;
use ragdesk_core::tasks::{parse_entity_groups, EntityGroup, Sentiment};
use ragdesk_core::{AssistantError, Result};

use crate::config::Config;
use crate::extract::extract_text;

/// Outcome of a successful [`Assistant::ingest`].
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub document: String,
    pub kind: DocumentKind,
    pub chars: usize,
    pub segments: usize,
    pub dims: usize,
    pub model: String,
}

pub struct Assistant {
    chunking: ChunkingOptions,
    top_k: usize,
    summary_k: usize,
    metric: DistanceMetric,
    embedder: Box<dyn Embedder>,
    dispatcher: ModelDispatcher,
}

impl Assistant {
    pub fn new(
        config: &Config,
        embedder: Box<dyn Embedder>,
        registry: BackendRegistry,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            chunking: config.chunking.options(),
            top_k: config.retrieval.top_k,
            summary_k: config.retrieval.summary_k,
            metric: config.retrieval.metric()?,
            embedder,
            dispatcher: ModelDispatcher::new(registry),
        })
    }

    /// Wire up the configured embedder and every hosted backend.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder = crate::embedding::create_embedder(&config.embedding)
            .context("Failed to create embedder")?;
        let registry =
            crate::backends::build_registry(config).context("Failed to build backend registry")?;
        Self::new(config, embedder, registry)
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn registry(&self) -> &BackendRegistry {
        self.dispatcher.registry()
    }

    pub fn dispatch_state(&self) -> &DispatchState {
        self.dispatcher.state()
    }

    /// Extract, chunk, embed and index `document`, then install the index
    /// in the session. The previous index stays in place if any step fails.
    pub async fn ingest(&self, session: &mut Session, document: Document) -> Result<IngestReport> {
        let text = extract_text(&document)?;
        if text.trim().is_empty() {
            return Err(AssistantError::EmptyInput("document text"));
        }

        let index = self.index_text(&text).await?;
        let report = IngestReport {
            document: document.name.clone(),
            kind: document.kind,
            chars: text.chars().count(),
            segments: index.len(),
            dims: index.dims(),
            model: self.embedder.model_name().to_string(),
        };
        session.replace_index(document.name, index);

        tracing::info!(
            document = %report.document,
            segments = report.segments,
            model = %report.model,
            "document indexed"
        );
        Ok(report)
    }

    /// Answer `query` from the session's document.
    pub async fn ask_document(&mut self, session: &mut Session, query: &str) -> Result<String> {
        let query = non_empty(query, "query")?;
        let index = session
            .index()
            .ok_or(AssistantError::EmptyInput("document index"))?;
        let context = self.retrieve(&index, query, self.top_k).await?;

        let request = ModelRequest::new(session.persona, Task::DocumentQa, context, query);
        let answer = self
            .dispatcher
            .dispatch(session.backend, &request, ResponseFormat::Plain)
            .await?;
        session.transcript.append(query, answer.clone());
        Ok(answer)
    }

    /// Summarize `text`, using the segments closest to the summarization
    /// instruction as context.
    pub async fn summarize(&mut self, session: &Session, text: &str) -> Result<String> {
        let text = non_empty(text, "text")?;
        let index = self.index_text(text).await?;
        let instruction = Task::Summarize.instructions();
        let context = self.retrieve(&index, instruction, self.summary_k).await?;

        let request = ModelRequest::new(session.persona, Task::Summarize, context, "");
        self.dispatcher
            .dispatch(session.backend, &request, ResponseFormat::Plain)
            .await
    }

    pub async fn classify_sentiment(&mut self, session: &Session, text: &str) -> Result<Sentiment> {
        let text = non_empty(text, "text")?;
        let request = ModelRequest::new(session.persona, Task::Sentiment, "", text);
        let raw = self
            .dispatcher
            .dispatch(session.backend, &request, ResponseFormat::Plain)
            .await?;
        Sentiment::parse_label(&raw)
    }

    pub async fn extract_entities(
        &mut self,
        session: &Session,
        text: &str,
    ) -> Result<Vec<EntityGroup>> {
        let text = non_empty(text, "text")?;
        let request = ModelRequest::new(session.persona, Task::Entities, "", text);
        let raw = self
            .dispatcher
            .dispatch(session.backend, &request, ResponseFormat::Plain)
            .await?;
        Ok(parse_entity_groups(&raw))
    }

    /// Generate Python code for `query`; markdown fences are removed.
    pub async fn generate_code(&mut self, session: &mut Session, query: &str) -> Result<String> {
        let query = non_empty(query, "query")?;
        let request = ModelRequest::new(session.persona, Task::CodeGeneration, "", query);
        let code = self
            .dispatcher
            .dispatch(session.backend, &request, ResponseFormat::Code)
            .await?;
        session.transcript.append(query, code.clone());
        Ok(code)
    }

    pub async fn answer_question(&mut self, session: &mut Session, query: &str) -> Result<String> {
        let query = non_empty(query, "query")?;
        let request = ModelRequest::new(session.persona, Task::QuestionAnswering, "", query);
        let answer = self
            .dispatcher
            .dispatch(session.backend, &request, ResponseFormat::Plain)
            .await?;
        session.transcript.append(query, answer.clone());
        Ok(answer)
    }

    /// Chunk, embed and index `text` without touching any session.
    pub async fn index_text(&self, text: &str) -> Result<VectorIndex> {
        let segments = chunk_text(text, &self.chunking);
        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        tracing::debug!(
            segments = segments.len(),
            vectors = vectors.len(),
            model = self.embedder.model_name(),
            "embedded segments"
        );
        VectorIndex::build(segments, vectors, self.metric)
    }

    /// Top-`k` segment texts for `query`, joined by blank lines.
    async fn retrieve(&self, index: &VectorIndex, query: &str, k: usize) -> Result<String> {
        let vector = self.embedder.embed_one(query).await?;
        let hits = index.query(&vector, k)?;
        tracing::debug!(
            k,
            hits = hits.len(),
            segments = ?hits.iter().map(|h| h.segment.index).collect::<Vec<_>>(),
            "retrieved context"
        );
        Ok(hits
            .iter()
            .map(|h| h.segment.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

fn non_empty<'a>(input: &'a str, what: &'static str) -> Result<&'a str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AssistantError::EmptyInput(what));
    }
    Ok(trimmed)
}
