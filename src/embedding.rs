//! Embedder implementations and provider selection.
//!
//! - **[`LocalEmbedder`]**: runs a sentence-embedding model in-process via
//!   fastembed (feature `local-embeddings`). The model is downloaded once and
//!   cached; inference runs on the blocking pool.
//! - **[`OllamaEmbedder`]**: `POST {url}/api/embed` on a local Ollama.
//! - **[`OpenAIEmbedder`]**: `POST /v1/embeddings`, key from `OPENAI_API_KEY`.
//! - [`HashEmbedder`]: offline feature hashing, re-exported from the core crate.
//!
//! Every failure maps to [`AssistantError::Unavailable`]. Nothing is retried:
//! a failed embedding aborts indexing of the current document and the caller
//! decides whether to try again.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

pub use ragdesk_core::embedding::{Embedder, HashEmbedder, DEFAULT_HASH_DIMS};
use ragdesk_core::AssistantError;

use crate::config::EmbeddingConfig;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Build the embedder named by `embedding.provider`.
///
/// | Config Value | Embedder |
/// |-------------|----------|
/// | `"local"` | [`LocalEmbedder`] (needs the `local-embeddings` feature) |
/// | `"hash"` | [`HashEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "hash" => Ok(Box::new(HashEmbedder::new(
            config.dims.unwrap_or(DEFAULT_HASH_DIMS),
        ))),
        "ollama" => Ok(Box::new(OllamaEmbedder::new(config)?)),
        "openai" => Ok(Box::new(OpenAIEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Box::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => bail!(
            "Local embedding provider requires --features local-embeddings; \
             use provider = \"hash\", \"ollama\" or \"openai\" instead"
        ),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Read a JSON array of numbers as a vector.
fn json_vector(value: &serde_json::Value) -> Option<Vec<f32>> {
    value
        .as_array()
        .map(|a| a.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect())
}

fn check_count(service: &str, inputs: usize, vectors: &[Vec<f32>]) -> ragdesk_core::Result<()> {
    if vectors.len() != inputs {
        return Err(AssistantError::unavailable(
            service,
            format!("returned {} vectors for {} inputs", vectors.len(), inputs),
        ));
    }
    Ok(())
}

/// POST `body` and return the JSON reply, mapping every failure to `Unavailable`.
async fn post_json(
    service: &str,
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
) -> ragdesk_core::Result<serde_json::Value> {
    let response = request
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| AssistantError::unavailable(service, e))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(AssistantError::unavailable(
            service,
            format!("API error {}: {}", status, body_text),
        ));
    }

    response
        .json()
        .await
        .map_err(|e| AssistantError::unavailable(service, format!("invalid JSON: {}", e)))
}

// ============ Ollama ============

/// Embedder backed by a local Ollama instance.
///
/// Requires Ollama to be running with an embedding model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    batch_size: usize,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        Ok(Self {
            model,
            dims,
            url: url.trim_end_matches('/').to_string(),
            batch_size: config.batch_size,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> ragdesk_core::Result<Vec<Vec<f32>>> {
        let service = format!("Ollama at {}", self.url);
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size.max(1)) {
            let body = serde_json::json!({ "model": self.model, "input": batch });
            let request = self.client.post(format!("{}/api/embed", self.url));
            let json = post_json(&service, request, &body).await?;
            let vectors = parse_ollama_response(&json)
                .ok_or_else(|| AssistantError::unavailable(&service, "missing embeddings array"))?;
            check_count(&service, batch.len(), &vectors)?;
            out.extend(vectors);
        }
        Ok(out)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Option<Vec<Vec<f32>>> {
    json.get("embeddings")?
        .as_array()?
        .iter()
        .map(json_vector)
        .collect()
}

// ============ OpenAI ============

/// Embedder using the OpenAI embeddings API.
pub struct OpenAIEmbedder {
    model: String,
    dims: usize,
    api_key: Option<String>,
    batch_size: usize,
    client: reqwest::Client,
}

impl OpenAIEmbedder {
    /// The key is looked up now but only required on first use.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config.dims.unwrap_or(match model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        });

        Ok(Self {
            model,
            dims,
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            batch_size: config.batch_size,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> ragdesk_core::Result<Vec<Vec<f32>>> {
        const SERVICE: &str = "OpenAI embeddings";
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AssistantError::unavailable(SERVICE, "OPENAI_API_KEY not set"))?;

        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size.max(1)) {
            let body = serde_json::json!({ "model": self.model, "input": batch });
            let request = self
                .client
                .post(OPENAI_EMBEDDINGS_URL)
                .header("Authorization", format!("Bearer {}", api_key));
            let json = post_json(SERVICE, request, &body).await?;
            let vectors = parse_openai_response(&json)
                .ok_or_else(|| AssistantError::unavailable(SERVICE, "missing data array"))?;
            check_count(SERVICE, batch.len(), &vectors)?;
            out.extend(vectors);
        }
        Ok(out)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Option<Vec<Vec<f32>>> {
    let data = json.get("data")?.as_array()?;
    let mut items = data
        .iter()
        .enumerate()
        .map(|(pos, item)| {
            let index = item
                .get("index")
                .and_then(|i| i.as_u64())
                .map(|i| i as usize)
                .unwrap_or(pos);
            json_vector(item.get("embedding")?).map(|v| (index, v))
        })
        .collect::<Option<Vec<_>>>()?;
    items.sort_by_key(|(index, _)| *index);
    Some(items.into_iter().map(|(_, v)| v).collect())
}

// ============ Local (fastembed) ============

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;

#[cfg(feature = "local-embeddings")]
mod local {
    use super::*;
    use std::sync::{Arc, Mutex};

    pub const DEFAULT_LOCAL_MODEL: &str = "all-minilm-l6-v2";

    /// In-process sentence embeddings. No network calls after the first
    /// model download.
    pub struct LocalEmbedder {
        model_name: String,
        dims: usize,
        model: fastembed::EmbeddingModel,
        batch_size: usize,
        loaded: Arc<Mutex<Option<fastembed::TextEmbedding>>>,
    }

    impl LocalEmbedder {
        pub fn new(config: &EmbeddingConfig) -> Result<Self> {
            let model_name = config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());
            let model = config_to_fastembed_model(&model_name)?;
            let dims = config.dims.unwrap_or(match model_name.as_str() {
                "bge-base-en-v1.5" | "nomic-embed-text-v1.5" | "multilingual-e5-base" => 768,
                "bge-large-en-v1.5" | "multilingual-e5-large" => 1024,
                _ => 384,
            });
            Ok(Self {
                model_name,
                dims,
                model,
                batch_size: config.batch_size,
                loaded: Arc::new(Mutex::new(None)),
            })
        }
    }

    fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
        match name {
            "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
            "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
            "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
            "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
            "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
            "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
            other => bail!(
                "Unknown local embedding model: '{}'. Supported models: \
                 all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
                 nomic-embed-text-v1.5, \
                 multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
                other
            ),
        }
    }

    #[async_trait]
    impl Embedder for LocalEmbedder {
        fn model_name(&self) -> &str {
            &self.model_name
        }

        fn dims(&self) -> usize {
            self.dims
        }

        async fn embed(&self, texts: &[String]) -> ragdesk_core::Result<Vec<Vec<f32>>> {
            let service = format!("local embedding model {}", self.model_name);
            let model = self.model.clone();
            let batch_size = self.batch_size;
            let loaded = Arc::clone(&self.loaded);
            let texts = texts.to_vec();
            let task_service = service.clone();

            tokio::task::spawn_blocking(move || {
                let mut guard = loaded
                    .lock()
                    .map_err(|_| AssistantError::unavailable(&task_service, "model lock poisoned"))?;
                if guard.is_none() {
                    tracing::info!(model = ?model, "loading local embedding model");
                    let instance = fastembed::TextEmbedding::try_new(
                        fastembed::InitOptions::new(model).with_show_download_progress(false),
                    )
                    .map_err(|e| AssistantError::unavailable(&task_service, e))?;
                    *guard = Some(instance);
                }
                match guard.as_mut() {
                    Some(embedding) => embedding
                        .embed(texts, Some(batch_size))
                        .map_err(|e| AssistantError::unavailable(&task_service, e)),
                    None => Err(AssistantError::unavailable(&task_service, "model not loaded")),
                }
            })
            .await
            .map_err(|e| AssistantError::unavailable(&service, e))?
        }
    }

}
