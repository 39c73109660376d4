//! Hosted LLM backends.
//!
//! Two wire protocols cover the three [`BackendId`]s:
//!
//! - [`TogetherBackend`]: OpenAI-compatible chat completions. Serves Llama and
//!   DeepSeek; the DeepSeek variant strips `<think>` reasoning blocks.
//! - [`GeminiBackend`]: Google `generateContent`.
//!
//! Credentials are read from the environment when the registry is built but
//! only checked when a prompt is sent, so a missing key fails the first
//! dispatch with `Authentication` rather than startup.
//!
//! Every registered backend is wrapped in a [`Deadline`], so
//! `backends.timeout_secs` bounds the model call alone, not embedding or
//! retrieval.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;

use ragdesk_core::backend::{BackendId, BackendRegistry, ModelBackend};
use ragdesk_core::AssistantError;

use crate::config::{BackendConfig, Config};

/// Register one backend per [`BackendId`] from the `[backends]` section.
pub fn build_registry(config: &Config) -> Result<BackendRegistry> {
    let client = reqwest::Client::builder().build()?;
    let limit = Duration::from_secs(config.backends.timeout_secs);
    let mut registry = BackendRegistry::new();
    for id in BackendId::ALL {
        let settings = config.backends.get(id);
        let backend: Box<dyn ModelBackend> = match id {
            BackendId::Llama | BackendId::DeepSeek => {
                Box::new(TogetherBackend::new(id, settings, client.clone()))
            }
            BackendId::Gemini => Box::new(GeminiBackend::new(settings, client.clone())),
        };
        tracing::debug!(
            backend = %id,
            model = backend.model(),
            credential = settings.api_key().is_some(),
            "registered backend"
        );
        registry.register(Box::new(Deadline::new(backend, limit)));
    }
    Ok(registry)
}

/// Bounds each `generate` call of the wrapped backend.
///
/// Expiry is reported as `Unavailable` for that backend.
pub struct Deadline {
    inner: Box<dyn ModelBackend>,
    limit: Duration,
}

impl Deadline {
    pub fn new(inner: Box<dyn ModelBackend>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl ModelBackend for Deadline {
    fn id(&self) -> BackendId {
        self.inner.id()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn generate(&self, prompt: &str) -> ragdesk_core::Result<String> {
        match tokio::time::timeout(self.limit, self.inner.generate(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(AssistantError::unavailable(
                self.inner.id().as_str(),
                format!("no response within {:?}", self.limit),
            )),
        }
    }

    fn strip_envelope(&self, raw: &str) -> String {
        self.inner.strip_envelope(raw)
    }
}

/// Map a non-success HTTP status onto the dispatch error taxonomy.
pub fn classify_status(backend: BackendId, status: StatusCode, body: &str) -> AssistantError {
    let backend_name = backend.as_str().to_string();
    let message = format!("HTTP {}: {}", status, body.trim());
    match status.as_u16() {
        401 | 403 => AssistantError::Authentication {
            backend: backend_name,
            message,
        },
        // Gemini reports a bad key as 400 with a reason code.
        400 if body.contains("API_KEY_INVALID") => AssistantError::Authentication {
            backend: backend_name,
            message,
        },
        429 => AssistantError::Unavailable {
            service: backend_name,
            message,
        },
        s if s >= 500 => AssistantError::Unavailable {
            service: backend_name,
            message,
        },
        _ => AssistantError::Rejected {
            backend: backend_name,
            message,
        },
    }
}

fn missing_key(backend: BackendId, env: &str) -> AssistantError {
    AssistantError::Authentication {
        backend: backend.as_str().to_string(),
        message: format!("{} environment variable not set", env),
    }
}

fn malformed(backend: BackendId, message: impl Into<String>) -> AssistantError {
    AssistantError::MalformedResponse {
        backend: backend.as_str().to_string(),
        message: message.into(),
    }
}

/// Send a prepared request and return the parsed JSON body of a success.
async fn send(
    backend: BackendId,
    request: reqwest::RequestBuilder,
) -> ragdesk_core::Result<serde_json::Value> {
    let response = request
        .send()
        .await
        .map_err(|e| AssistantError::unavailable(backend.as_str(), e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(backend, status, &body));
    }

    let text = response
        .text()
        .await
        .map_err(|e| AssistantError::unavailable(backend.as_str(), e))?;
    serde_json::from_str(&text).map_err(|e| malformed(backend, format!("invalid JSON: {}", e)))
}

// ============ Together (OpenAI-compatible) ============

pub struct TogetherBackend {
    id: BackendId,
    model: String,
    api_base: String,
    api_key_env: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl TogetherBackend {
    pub fn new(id: BackendId, config: &BackendConfig, client: reqwest::Client) -> Self {
        Self {
            id,
            model: config.model.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key_env: config.api_key_env.clone(),
            api_key: config.api_key(),
            client,
        }
    }
}

#[async_trait]
impl ModelBackend for TogetherBackend {
    fn id(&self) -> BackendId {
        self.id
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> ragdesk_core::Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| missing_key(self.id, &self.api_key_env))?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let request = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body);

        let json = send(self.id, request).await?;
        parse_chat_completion(self.id, &json)
    }

    fn strip_envelope(&self, raw: &str) -> String {
        match self.id {
            BackendId::DeepSeek => strip_think_blocks(raw),
            _ => raw.to_string(),
        }
    }
}

/// Extract `choices[0].message.content` from a chat completion.
pub fn parse_chat_completion(
    backend: BackendId,
    json: &serde_json::Value,
) -> ragdesk_core::Result<String> {
    if let Some(error) = json.get("error") {
        return Err(AssistantError::Rejected {
            backend: backend.as_str().to_string(),
            message: error.to_string(),
        });
    }

    let choice = json
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| malformed(backend, "missing choices"))?;

    if choice.get("finish_reason").and_then(|f| f.as_str()) == Some("content_filter") {
        return Err(AssistantError::Rejected {
            backend: backend.as_str().to_string(),
            message: "completion stopped by content filter".to_string(),
        });
    }

    choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| malformed(backend, "missing content in choices"))
}

/// Remove `<think>…</think>` reasoning blocks. A dangling `</think>` with no
/// opening tag drops everything before it.
pub fn strip_think_blocks(raw: &str) -> String {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    let mut rest = raw;
    if let Some(close) = rest.find(CLOSE) {
        if rest.find(OPEN).map_or(true, |open| open > close) {
            rest = &rest[close + CLOSE.len()..];
        }
    }

    let mut out = String::with_capacity(rest.len());
    while let Some(open) = rest.find(OPEN) {
        out.push_str(&rest[..open]);
        match rest[open..].find(CLOSE) {
            Some(close) => rest = &rest[open + close + CLOSE.len()..],
            // Unterminated block: the model never finished thinking.
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

// ============ Gemini ============

pub struct GeminiBackend {
    model: String,
    api_base: String,
    api_key_env: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(config: &BackendConfig, client: reqwest::Client) -> Self {
        Self {
            model: config.model.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key_env: config.api_key_env.clone(),
            api_key: config.api_key(),
            client,
        }
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    fn id(&self) -> BackendId {
        BackendId::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> ragdesk_core::Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| missing_key(BackendId::Gemini, &self.api_key_env))?;

        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });
        let request = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.api_base, self.model
            ))
            .header("x-goog-api-key", api_key)
            .json(&body);

        let json = send(BackendId::Gemini, request).await?;
        parse_gemini(&json)
    }
}

/// Join the text parts of the first candidate. Blocked prompts and
/// candidates stopped for safety are rejections, not malformed replies.
pub fn parse_gemini(json: &serde_json::Value) -> ragdesk_core::Result<String> {
    let rejected = |message: String| AssistantError::Rejected {
        backend: BackendId::Gemini.as_str().to_string(),
        message,
    };

    if let Some(reason) = json
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(|r| r.as_str())
    {
        return Err(rejected(format!("prompt blocked: {}", reason)));
    }

    let candidate = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .ok_or_else(|| malformed(BackendId::Gemini, "missing candidates"))?;

    let parts = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array());

    let text: String = parts
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return match candidate.get("finishReason").and_then(|r| r.as_str()) {
            Some(reason @ ("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT")) => {
                Err(rejected(format!("candidate stopped: {}", reason)))
            }
            _ => Err(malformed(BackendId::Gemini, "candidate has no text")),
        };
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_mapping() {
        let id = BackendId::Llama;
        assert!(matches!(
            classify_status(id, StatusCode::UNAUTHORIZED, "bad key"),
            AssistantError::Authentication { .. }
        ));
        assert!(matches!(
            classify_status(id, StatusCode::FORBIDDEN, ""),
            AssistantError::Authentication { .. }
        ));
        assert!(matches!(
            classify_status(id, StatusCode::TOO_MANY_REQUESTS, ""),
            AssistantError::Unavailable { .. }
        ));
        assert!(matches!(
            classify_status(id, StatusCode::BAD_GATEWAY, ""),
            AssistantError::Unavailable { .. }
        ));
        assert!(matches!(
            classify_status(id, StatusCode::NOT_FOUND, "no such model"),
            AssistantError::Rejected { .. }
        ));
        assert!(matches!(
            classify_status(id, StatusCode::UNPROCESSABLE_ENTITY, ""),
            AssistantError::Rejected { .. }
        ));
    }

    #[test]
    fn test_gemini_invalid_key_is_authentication() {
        let body = r#"{"error":{"code":400,"status":"INVALID_ARGUMENT","details":[{"reason":"API_KEY_INVALID"}]}}"#;
        assert!(matches!(
            classify_status(BackendId::Gemini, StatusCode::BAD_REQUEST, body),
            AssistantError::Authentication { .. }
        ));
        assert!(matches!(
            classify_status(BackendId::Gemini, StatusCode::BAD_REQUEST, "{}"),
            AssistantError::Rejected { .. }
        ));
    }

    #[test]
    fn test_parses_chat_completion_content() {
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": "positive" }, "finish_reason": "stop" }]
        });
        assert_eq!(parse_chat_completion(BackendId::Llama, &body).unwrap(), "positive");
    }

    #[test]
    fn test_chat_completion_without_content_is_malformed() {
        let err = parse_chat_completion(BackendId::Llama, &json!({ "choices": [] })).unwrap_err();
        assert!(matches!(err, AssistantError::MalformedResponse { .. }));
        let err = parse_chat_completion(BackendId::Llama, &json!({ "id": "x" })).unwrap_err();
        assert!(matches!(err, AssistantError::MalformedResponse { .. }));
    }

    #[test]
    fn test_content_filter_finish_is_rejected() {
        let body = json!({
            "choices": [{ "message": { "content": "" }, "finish_reason": "content_filter" }]
        });
        let err = parse_chat_completion(BackendId::DeepSeek, &body).unwrap_err();
        assert!(matches!(err, AssistantError::Rejected { .. }));
    }

    #[test]
    fn test_parses_gemini_parts() {
        let body = json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Hello, " }, { "text": "world" }] },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(parse_gemini(&body).unwrap(), "Hello, world");
    }

    #[test]
    fn test_gemini_safety_is_rejected() {
        let blocked = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert!(matches!(parse_gemini(&blocked), Err(AssistantError::Rejected { .. })));

        let stopped = json!({ "candidates": [{ "finishReason": "SAFETY" }] });
        assert!(matches!(parse_gemini(&stopped), Err(AssistantError::Rejected { .. })));

        let empty = json!({ "candidates": [{ "finishReason": "STOP" }] });
        assert!(matches!(
            parse_gemini(&empty),
            Err(AssistantError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_think_blocks_are_removed() {
        assert_eq!(
            strip_think_blocks("<think>\nreasoning here\n</think>\n\nThe answer is 4."),
            "The answer is 4."
        );
        assert_eq!(strip_think_blocks("reasoning</think>Answer"), "Answer");
        assert_eq!(strip_think_blocks("A <think>x</think>B <think>y</think>C"), "A B C");
        assert_eq!(strip_think_blocks("Answer <think>never closed"), "Answer");
        assert_eq!(strip_think_blocks("no envelope"), "no envelope");
    }

    #[test]
    fn test_only_deepseek_strips_envelope() {
        let client = reqwest::Client::new();
        let llama = TogetherBackend::new(BackendId::Llama, &BackendConfig::llama(), client.clone());
        let deepseek =
            TogetherBackend::new(BackendId::DeepSeek, &BackendConfig::deepseek(), client);
        let raw = "<think>hmm</think>ok";
        assert_eq!(llama.strip_envelope(raw), raw);
        assert_eq!(deepseek.strip_envelope(raw), "ok");
    }

    #[tokio::test]
    async fn test_missing_key_fails_at_dispatch_with_authentication() {
        let config = BackendConfig {
            api_key_env: "RAGDESK_TEST_MISSING_TOGETHER_KEY".to_string(),
            ..BackendConfig::llama()
        };
        let backend = TogetherBackend::new(BackendId::Llama, &config, reqwest::Client::new());
        let err = backend.generate("hello").await.unwrap_err();
        match err {
            AssistantError::Authentication { backend, message } => {
                assert_eq!(backend, "llama");
                assert!(message.contains("RAGDESK_TEST_MISSING_TOGETHER_KEY"));
            }
            other => panic!("expected Authentication, got {other:?}"),
        }
    }

    struct Stalled;

    #[async_trait]
    impl ModelBackend for Stalled {
        fn id(&self) -> BackendId {
            BackendId::DeepSeek
        }
        fn model(&self) -> &str {
            "stalled"
        }
        async fn generate(&self, _prompt: &str) -> ragdesk_core::Result<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_string())
        }
        fn strip_envelope(&self, raw: &str) -> String {
            strip_think_blocks(raw)
        }
    }

    #[tokio::test]
    async fn test_deadline_expiry_is_unavailable() {
        let backend = Deadline::new(Box::new(Stalled), Duration::from_millis(50));
        assert_eq!(backend.id(), BackendId::DeepSeek);
        assert_eq!(backend.strip_envelope("<think>x</think>ok"), "ok");
        let err = backend.generate("hello").await.unwrap_err();
        assert_eq!(err.to_string(), "deepseek unavailable: no response within 50ms");
    }

    #[test]
    fn test_registry_has_every_backend() {
        let registry = build_registry(&Config::minimal()).unwrap();
        assert_eq!(registry.ids(), BackendId::ALL.to_vec());
        assert_eq!(
            registry.get(BackendId::Gemini).map(|b| b.model().to_string()),
            Some("gemini-2.0-flash-exp".to_string())
        );
    }
}
