//! TOML configuration.
//!
//! Every field has a default, so an empty file (or no file at all, via
//! [`Config::minimal`]) yields a working setup: local embeddings, the
//! Llama backend, professional persona, 1000/200 chunking, top-3 retrieval.
//!
//! Credentials are never stored in the file. Each backend names the
//! environment variable its key is read from.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer};
use std::path::Path;

use ragdesk_core::backend::BackendId;
use ragdesk_core::chunk::{ChunkingOptions, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, DEFAULT_SEPARATOR};
use ragdesk_core::index::DistanceMetric;
use ragdesk_core::prompt::Persona;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub backends: BackendsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

impl ChunkingConfig {
    pub fn options(&self) -> ChunkingOptions {
        ChunkingOptions {
            chunk_size: self.chunk_size,
            overlap: self.overlap,
            separator: self.separator.clone(),
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}
fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Segments retrieved as context for a document question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Segments retrieved as context for a summary.
    #[serde(default = "default_summary_k")]
    pub summary_k: usize,
    #[serde(default = "default_metric")]
    pub metric: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            summary_k: default_summary_k(),
            metric: default_metric(),
        }
    }
}

impl RetrievalConfig {
    pub fn metric(&self) -> Result<DistanceMetric> {
        self.metric
            .parse()
            .map_err(|e: String| anyhow::anyhow!("retrieval.metric: {}", e))
    }
}

fn default_top_k() -> usize {
    3
}
fn default_summary_k() -> usize {
    1
}
fn default_metric() -> String {
    "cosine".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `local`, `hash`, `ollama`, or `openai`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the `ollama` provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embed_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendsConfig {
    /// Backend used when `--backend` is not given.
    #[serde(default = "default_backend")]
    pub default: String,
    /// Persona used when `--persona` is not given; `"none"` disables it.
    #[serde(default = "default_persona")]
    pub persona: String,
    /// Upper bound on each model call; embedding is not counted.
    #[serde(default = "default_dispatch_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "BackendConfig::llama", deserialize_with = "llama_table")]
    pub llama: BackendConfig,
    #[serde(default = "BackendConfig::gemini", deserialize_with = "gemini_table")]
    pub gemini: BackendConfig,
    #[serde(default = "BackendConfig::deepseek", deserialize_with = "deepseek_table")]
    pub deepseek: BackendConfig,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            default: default_backend(),
            persona: default_persona(),
            timeout_secs: default_dispatch_timeout_secs(),
            llama: BackendConfig::llama(),
            gemini: BackendConfig::gemini(),
            deepseek: BackendConfig::deepseek(),
        }
    }
}

impl BackendsConfig {
    pub fn default_backend(&self) -> Result<BackendId> {
        self.default
            .parse()
            .map_err(|e: String| anyhow::anyhow!("backends.default: {}", e))
    }

    pub fn default_persona(&self) -> Result<Option<Persona>> {
        parse_persona(&self.persona).context("backends.persona")
    }

    pub fn get(&self, id: BackendId) -> &BackendConfig {
        match id {
            BackendId::Llama => &self.llama,
            BackendId::Gemini => &self.gemini,
            BackendId::DeepSeek => &self.deepseek,
        }
    }
}

fn default_backend() -> String {
    "llama".to_string()
}
fn default_persona() -> String {
    "professional".to_string()
}
fn default_dispatch_timeout_secs() -> u64 {
    120
}

/// Connection settings for one hosted backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub model: String,
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

pub const TOGETHER_API_BASE: &str = "https://api.together.xyz/v1";
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

impl BackendConfig {
    pub fn llama() -> Self {
        Self {
            model: "meta-llama/Llama-3.3-70B-Instruct-Turbo".to_string(),
            api_base: TOGETHER_API_BASE.to_string(),
            api_key_env: "TOGETHER_AI_API_KEY".to_string(),
        }
    }

    pub fn gemini() -> Self {
        Self {
            model: "gemini-2.0-flash-exp".to_string(),
            api_base: GEMINI_API_BASE.to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
        }
    }

    pub fn deepseek() -> Self {
        Self {
            model: "deepseek-ai/DeepSeek-R1-Distill-Llama-70B-free".to_string(),
            api_base: TOGETHER_API_BASE.to_string(),
            api_key_env: "TOGETHER_AI_API_KEY".to_string(),
        }
    }

    /// Read the key from the environment. Absence is not an error here;
    /// it surfaces as an authentication failure at first dispatch.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// A `[backends.<name>]` table; keys left out keep the backend's preset.
#[derive(Debug, Deserialize)]
struct BackendTable {
    model: Option<String>,
    api_base: Option<String>,
    api_key_env: Option<String>,
}

impl BackendTable {
    fn over(self, preset: BackendConfig) -> BackendConfig {
        BackendConfig {
            model: self.model.unwrap_or(preset.model),
            api_base: self.api_base.unwrap_or(preset.api_base),
            api_key_env: self.api_key_env.unwrap_or(preset.api_key_env),
        }
    }
}

fn llama_table<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<BackendConfig, D::Error> {
    Ok(BackendTable::deserialize(d)?.over(BackendConfig::llama()))
}

fn gemini_table<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<BackendConfig, D::Error> {
    Ok(BackendTable::deserialize(d)?.over(BackendConfig::gemini()))
}

fn deepseek_table<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<BackendConfig, D::Error> {
    Ok(BackendTable::deserialize(d)?.over(BackendConfig::deepseek()))
}

/// Parse a persona name, where `"none"` (or empty) means no persona.
pub fn parse_persona(s: &str) -> Result<Option<Persona>> {
    match s.trim().to_ascii_lowercase().as_str() {
        "" | "none" => Ok(None),
        other => other.parse().map(Some).map_err(|e: String| anyhow::anyhow!(e)),
    }
}

impl Config {
    /// Defaults for every section, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.overlap,
                self.chunking.chunk_size
            );
        }

        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be >= 1");
        }
        if self.retrieval.summary_k == 0 {
            bail!("retrieval.summary_k must be >= 1");
        }
        self.retrieval.metric()?;

        match self.embedding.provider.as_str() {
            "local" | "hash" | "ollama" => {}
            "openai" => {
                if self.embedding.model.is_none() {
                    bail!("embedding.model must be specified when provider is 'openai'");
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be local, hash, ollama, or openai.",
                other
            ),
        }
        if self.embedding.dims == Some(0) {
            bail!("embedding.dims must be > 0");
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        self.backends.default_backend()?;
        self.backends.default_persona()?;
        Ok(())
    }
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(Config::minimal())
    }
}
