//! OpenAI-Compatible Backend Implementation
//!
//! One HTTP client for every hosted provider in the registry. Google,
//! OpenAI, Anthropic and OpenRouter all expose an OpenAI-style
//! `/chat/completions` endpoint that streams server-sent events:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//! data: {"choices":[{"delta":{"content":"lo"}}]}
//! data: [DONE]
//! ```
//!
//! The model identifier picks the provider, the provider picks the base URL
//! and the credential.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

use super::traits::{CompletionError, CompletionRequest, CompletionService, StreamingToken};
use crate::registry::{Credentials, ModelRegistry, Provider};

/// One parsed server-sent event line
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SseLine {
    /// A content delta
    Delta(String),
    /// The terminal `[DONE]` marker
    Done,
    /// An error object sent inside the stream
    Error(String),
    /// Blank lines, comments, role-only deltas, unparseable data
    Skip,
}

/// Parse a single line of an OpenAI-style event stream
pub(crate) fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return SseLine::Done;
    }

    let Ok(value) = serde_json::from_str::<serde_json::Value>(data) else {
        tracing::debug!(data, "Skipping unparseable stream line");
        return SseLine::Skip;
    };

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map_or_else(|| error.to_string(), String::from);
        return SseLine::Error(message);
    }

    value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
        .filter(|c| !c.is_empty())
        .map_or(SseLine::Skip, |c| SseLine::Delta(c.to_string()))
}

/// Splits a chunked byte stream into lines.
///
/// Works on raw bytes because a chunk may end inside a multi-byte character.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    /// Append a chunk
    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Take the next complete line, newline included
    pub(crate) fn next_line(&mut self) -> Option<String> {
        let pos = self.bytes.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.bytes.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&raw).into_owned())
    }

    /// Take whatever follows the last newline
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.bytes.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.bytes);
        Some(String::from_utf8_lossy(&raw).into_owned())
    }
}

/// Forward one stream line; returns whether the stream goes on
async fn forward_line(
    line: &str,
    tx: &mpsc::Sender<StreamingToken>,
    full_response: &mut String,
) -> bool {
    match parse_sse_line(line) {
        SseLine::Delta(token) => {
            full_response.push_str(&token);
            // A closed receiver ends the stream
            tx.send(StreamingToken::Token(token)).await.is_ok()
        }
        SseLine::Done => {
            let _ = tx
                .send(StreamingToken::Complete {
                    message: std::mem::take(full_response),
                })
                .await;
            false
        }
        SseLine::Error(message) => {
            let _ = tx.send(StreamingToken::Error(message)).await;
            false
        }
        SseLine::Skip => true,
    }
}

/// OpenAI-compatible streaming client
#[derive(Clone)]
pub struct OpenAiCompatibleBackend {
    /// Supported models and their providers
    registry: ModelRegistry,
    /// API key source
    credentials: Credentials,
    /// Per-provider endpoint overrides
    base_urls: HashMap<Provider, String>,
    /// HTTP client
    http_client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    /// Create a backend with default endpoints
    #[must_use]
    pub fn new(registry: ModelRegistry, credentials: Credentials) -> Self {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            registry,
            credentials,
            base_urls: HashMap::new(),
            http_client,
        }
    }

    /// Create from environment variables (API keys and base URL overrides)
    #[must_use]
    pub fn from_env(registry: ModelRegistry) -> Self {
        let mut backend = Self::new(registry, Credentials::Environment);
        for provider in Provider::ALL {
            if let Ok(url) = std::env::var(provider.base_url_env()) {
                if !url.trim().is_empty() {
                    backend = backend.with_base_url(provider, url);
                }
            }
        }
        backend
    }

    /// Override a provider's endpoint root
    #[must_use]
    pub fn with_base_url(mut self, provider: Provider, url: impl Into<String>) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        self.base_urls.insert(provider, url);
        self
    }

    /// Endpoint root for a provider
    fn base_url(&self, provider: Provider) -> &str {
        self.base_urls
            .get(&provider)
            .map_or(provider.default_base_url(), String::as_str)
    }

    /// Chat completions URL for a provider
    fn completions_url(&self, provider: Provider) -> String {
        format!("{}/chat/completions", self.base_url(provider))
    }

    /// Build the JSON request body
    fn build_body(request: &CompletionRequest) -> serde_json::Value {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(ref system) = request.system {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        for message in &request.messages {
            messages.push(serde_json::json!({
                "role": message.role.as_str(),
                "content": message.content,
            }));
        }

        serde_json::json!({
            "model": request.model,
            "messages": messages,
            "stream": true,
            "temperature": request.temperature,
        })
    }
}

#[async_trait]
impl CompletionService for OpenAiCompatibleBackend {
    fn name(&self) -> &str {
        "OpenAI-compatible"
    }

    async fn send_streaming(
        &self,
        request: &CompletionRequest,
    ) -> Result<mpsc::Receiver<StreamingToken>, CompletionError> {
        let spec = self
            .registry
            .resolve(&request.model)
            .map_err(|_| CompletionError::UnknownModel(request.model.clone()))?;
        let provider = spec.provider;
        let api_key = self
            .credentials
            .lookup(provider)
            .ok_or_else(|| CompletionError::missing_credential(provider))?;

        let url = self.completions_url(provider);
        tracing::debug!(model = %request.model, provider = provider.display_name(), %url, "Sending completion request");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(api_key)
            .json(&Self::build_body(request))
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => CompletionError::Authentication(body),
                code => CompletionError::Service { status: code, body },
            });
        }

        let (tx, rx) = mpsc::channel(100);
        let mut stream = response.bytes_stream();

        // Spawn task to process stream
        tokio::spawn(async move {
            let mut lines = LineBuffer::default();
            let mut full_response = String::new();

            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        lines.push(&bytes);
                        while let Some(line) = lines.next_line() {
                            if !forward_line(&line, &tx, &mut full_response).await {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(StreamingToken::Error(e.to_string())).await;
                        return;
                    }
                }
            }

            // Body ended without [DONE]; its last line may lack a newline
            if let Some(line) = lines.finish() {
                if !forward_line(&line, &tx, &mut full_response).await {
                    return;
                }
            }
            let _ = tx
                .send(StreamingToken::Complete {
                    message: full_response,
                })
                .await;
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_without_keys() -> OpenAiCompatibleBackend {
        OpenAiCompatibleBackend::new(
            ModelRegistry::builtin(),
            Credentials::Fixed(HashMap::new()),
        )
    }

    #[test]
    fn test_parse_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_sse_line(line), SseLine::Delta("Hel".to_string()));
    }

    #[test]
    fn test_parse_done() {
        assert_eq!(parse_sse_line("data: [DONE]\n"), SseLine::Done);
        assert_eq!(parse_sse_line("data:[DONE]"), SseLine::Done);
    }

    #[test]
    fn test_parse_skips_noise() {
        assert_eq!(parse_sse_line(""), SseLine::Skip);
        assert_eq!(parse_sse_line(": keep-alive"), SseLine::Skip);
        assert_eq!(parse_sse_line("event: ping"), SseLine::Skip);
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            SseLine::Skip
        );
        assert_eq!(parse_sse_line("data: {not json"), SseLine::Skip);
    }

    #[test]
    fn test_parse_inline_error() {
        let line = r#"data: {"error":{"message":"Rate limit exceeded","code":429}}"#;
        assert_eq!(
            parse_sse_line(line),
            SseLine::Error("Rate limit exceeded".to_string())
        );
    }

    #[test]
    fn test_line_buffer_joins_chunks() {
        let mut lines = LineBuffer::default();
        let text = "data: {\"choices\":[{\"delta\":{\"content\":\"héllo\"}}]}\n";
        let bytes = text.as_bytes();
        // Split inside the two-byte 'é'
        let split = text.find('é').unwrap() + 1;
        lines.push(&bytes[..split]);
        assert_eq!(lines.next_line(), None);
        lines.push(&bytes[split..]);
        let line = lines.next_line().unwrap();
        assert_eq!(parse_sse_line(&line), SseLine::Delta("héllo".to_string()));
        assert_eq!(lines.finish(), None);
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline_is_forwarded() {
        let mut lines = LineBuffer::default();
        lines.push(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}",
        );
        let (tx, mut rx) = mpsc::channel(8);
        let mut full = String::new();

        while let Some(line) = lines.next_line() {
            assert!(forward_line(&line, &tx, &mut full).await);
        }
        let tail = lines.finish().unwrap();
        assert!(forward_line(&tail, &tx, &mut full).await);

        assert_eq!(full, "Hello");
        assert_eq!(rx.recv().await, Some(StreamingToken::Token("Hel".into())));
        assert_eq!(rx.recv().await, Some(StreamingToken::Token("lo".into())));
    }

    #[tokio::test]
    async fn test_done_line_completes_with_full_text() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut full = "Hello".to_string();
        assert!(!forward_line("data: [DONE]", &tx, &mut full).await);
        assert_eq!(
            rx.recv().await,
            Some(StreamingToken::Complete {
                message: "Hello".into()
            })
        );
    }

    #[test]
    fn test_base_url_override() {
        let backend = backend_without_keys().with_base_url(Provider::OpenAi, "http://localhost:8080/v1/");
        assert_eq!(
            backend.completions_url(Provider::OpenAi),
            "http://localhost:8080/v1/chat/completions"
        );
        assert_eq!(
            backend.completions_url(Provider::OpenRouter),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn test_build_body() {
        let request = CompletionRequest::new("gpt-4o")
            .with_system("Be brief")
            .with_message(crate::messages::MessageRole::User, "Hello");
        let body = OpenAiCompatibleBackend::build_body(&request);

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Hello");
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_network() {
        let backend = backend_without_keys();
        let request = CompletionRequest::new("gpt-4o");
        let err = backend.send_streaming(&request).await.unwrap_err();
        assert_eq!(err, CompletionError::missing_credential(Provider::OpenAi));
    }

    #[tokio::test]
    async fn test_unknown_model_rejected() {
        let backend = backend_without_keys();
        let request = CompletionRequest::new("gpt-9000");
        let err = backend.send_streaming(&request).await.unwrap_err();
        assert_eq!(err, CompletionError::UnknownModel("gpt-9000".to_string()));
    }
}
