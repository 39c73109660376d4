//! Hosted model backends and the dispatcher that routes prompts to them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │            BackendRegistry               │
//! │  ┌─────────┐ ┌─────────┐ ┌────────────┐  │
//! │  │  Llama  │ │ Gemini  │ │  DeepSeek  │  │
//! │  └─────────┘ └─────────┘ └────────────┘  │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!   ModelDispatcher::dispatch(id, request, format)
//!     Idle → Dispatching → Succeeded | Failed
//! ```
//!
//! Adding a backend means implementing [`ModelBackend`] and registering
//! it; the dispatcher never branches on backend names.
//!
//! Dispatch performs exactly one request: no retries and no caching. The
//! dispatcher imposes no timeout either; callers wrap the future in their
//! own.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{AssistantError, Result};
use crate::prompt::ModelRequest;

/// Identifier of a hosted model backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    Llama,
    Gemini,
    DeepSeek,
}

impl BackendId {
    pub const ALL: [BackendId; 3] = [BackendId::Llama, BackendId::Gemini, BackendId::DeepSeek];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Llama => "llama",
            BackendId::Gemini => "gemini",
            BackendId::DeepSeek => "deepseek",
        }
    }
}

impl FromStr for BackendId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "llama" => Ok(BackendId::Llama),
            "gemini" => Ok(BackendId::Gemini),
            "deepseek" => Ok(BackendId::DeepSeek),
            other => Err(format!(
                "unknown backend '{}'. Use llama, gemini, or deepseek.",
                other
            )),
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hosted text-generation endpoint.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use ragdesk_core::backend::{BackendId, ModelBackend};
/// use ragdesk_core::Result;
///
/// struct Echo;
///
/// #[async_trait]
/// impl ModelBackend for Echo {
///     fn id(&self) -> BackendId { BackendId::Llama }
///     fn model(&self) -> &str { "echo" }
///     async fn generate(&self, prompt: &str) -> Result<String> {
///         Ok(prompt.to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Which registry slot this backend fills.
    fn id(&self) -> BackendId;

    /// Model identifier sent to the provider.
    fn model(&self) -> &str;

    /// Send one prompt and return the generated text.
    ///
    /// Errors map onto the dispatch taxonomy: `Authentication`,
    /// `Unavailable`, `Rejected`, or `MalformedResponse`.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Remove provider-specific wrapping from a raw completion.
    fn strip_envelope(&self, raw: &str) -> String {
        raw.to_string()
    }
}

/// How the caller wants the normalized text shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Plain,
    /// Markdown code fences are removed.
    Code,
}

impl ResponseFormat {
    pub fn apply(&self, text: &str) -> String {
        match self {
            ResponseFormat::Plain => text.trim().to_string(),
            ResponseFormat::Code => strip_code_fences(text),
        }
    }
}

/// Drop markdown fence lines (```` ``` ```` with an optional language tag).
pub fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Registered backends keyed by [`BackendId`].
#[derive(Default)]
pub struct BackendRegistry {
    backends: HashMap<BackendId, Box<dyn ModelBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend, replacing any previous one with the same id.
    pub fn register(&mut self, backend: Box<dyn ModelBackend>) {
        self.backends.insert(backend.id(), backend);
    }

    pub fn get(&self, id: BackendId) -> Option<&dyn ModelBackend> {
        self.backends.get(&id).map(|b| b.as_ref())
    }

    /// Registered ids in declaration order.
    pub fn ids(&self) -> Vec<BackendId> {
        BackendId::ALL
            .into_iter()
            .filter(|id| self.backends.contains_key(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

/// Lifecycle of the most recent dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DispatchState {
    #[default]
    Idle,
    Dispatching { backend: BackendId },
    Succeeded { backend: BackendId },
    Failed { backend: BackendId, reason: String },
}

/// Routes composed prompts to registered backends and normalizes replies.
pub struct ModelDispatcher {
    registry: BackendRegistry,
    state: DispatchState,
}

impl ModelDispatcher {
    pub fn new(registry: BackendRegistry) -> Self {
        Self {
            registry,
            state: DispatchState::Idle,
        }
    }

    pub fn state(&self) -> &DispatchState {
        &self.state
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Send `request` to `backend` and return the normalized text.
    pub async fn dispatch(
        &mut self,
        backend: BackendId,
        request: &ModelRequest,
        format: ResponseFormat,
    ) -> Result<String> {
        self.state = DispatchState::Dispatching { backend };

        let result = match self.registry.get(backend) {
            Some(b) => {
                let prompt = request.compose();
                tracing::debug!(
                    backend = %backend,
                    model = b.model(),
                    prompt_chars = prompt.chars().count(),
                    "dispatching prompt"
                );
                b.generate(&prompt)
                    .await
                    .map(|raw| format.apply(&b.strip_envelope(&raw)))
            }
            None => Err(AssistantError::unavailable(
                backend.as_str(),
                "backend is not registered",
            )),
        };

        self.state = match &result {
            Ok(_) => DispatchState::Succeeded { backend },
            Err(e) => DispatchState::Failed {
                backend,
                reason: e.to_string(),
            },
        };

        match &result {
            Ok(text) => tracing::info!(backend = %backend, chars = text.len(), "dispatch succeeded"),
            Err(e) => tracing::warn!(backend = %backend, error = %e, "dispatch failed"),
        }

        result
    }
}
