//! Chat-completions client seam for the extraction and reasoning services.
//!
//! Both external model services (the vision OCR model and the structuring/
//! solving reasoning model) speak the same chat-completions wire format, so a
//! single [`ChatClient`] trait covers them. The trait is object-safe
//! (`BoxFuture`) so a constructed, explicitly owned client can be injected
//! into [`crate::config::PipelineConfig`] — tests inject scripted mocks, the
//! API layer injects one [`HttpChatClient`] per provider. No ambient global
//! client exists anywhere in the crate.
//!
//! There is intentionally no retry loop here: a timeout or 5xx surfaces as a
//! [`ClientError`] after one attempt and the calling stage applies its
//! fail-soft contract. Retry policy belongs to the job runner.

use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// A base64 image payload ready to embed in a multimodal request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    /// Base64-encoded image bytes.
    pub data: String,
    /// MIME type, e.g. `"image/png"`.
    pub mime_type: String,
}

impl ImageAttachment {
    /// Render as the data URI the chat-completions image block expects.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// One chat-completions request: an optional system instruction, the user
/// text, and an optional image attachment.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: Option<String>,
    pub user_text: String,
    pub image: Option<ImageAttachment>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Errors from a single service call. Every variant is recovered fail-soft
/// by the calling stage; none escapes a pipeline run.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The call exceeded the configured timeout.
    #[error("service call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Authentication failed (401/403) — retry will not help.
    #[error("authentication failed for '{endpoint}': {detail}")]
    Auth { endpoint: String, detail: String },

    /// The service returned HTTP 429.
    #[error("rate limit exceeded at '{endpoint}'")]
    RateLimited { endpoint: String },

    /// Any other non-success HTTP status.
    #[error("service returned HTTP {status}: {detail}")]
    Api { status: u16, detail: String },

    /// Connection-level failure (DNS, TLS, refused).
    #[error("network error: {detail}")]
    Network { detail: String },

    /// The response body did not have the chat-completions shape.
    #[error("malformed service response: {detail}")]
    MalformedResponse { detail: String },
}

/// An external chat-completions service.
///
/// Implementations must be stateless across calls; the pipeline makes
/// exactly one call per stage invocation.
pub trait ChatClient: Send + Sync {
    /// Submit one request and return the assistant message content.
    fn chat(&self, request: ChatRequest) -> BoxFuture<'_, Result<String, ClientError>>;

    /// Short name used in logs and diagnostics, e.g. `"mistral"`.
    fn name(&self) -> &str;
}

/// Production [`ChatClient`] over a chat-completions HTTP endpoint.
///
/// Works against any OpenAI-compatible API (OpenAI, Mistral, self-hosted
/// gateways); the endpoint must be the full chat-completions URL.
pub struct HttpChatClient {
    http: reqwest::Client,
    name: String,
    endpoint: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl HttpChatClient {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, crate::error::PipelineError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| crate::error::PipelineError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            http,
            name: name.into(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs,
        })
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(ref system) = request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        // The image block rides next to the text block in the same user turn;
        // the model sees both at once (single combined request, never two).
        let user_content = match request.image {
            Some(ref image) => json!([
                { "type": "text", "text": request.user_text },
                { "type": "image_url", "image_url": { "url": image.data_uri() } }
            ]),
            None => Value::String(request.user_text.clone()),
        };
        messages.push(json!({ "role": "user", "content": user_content }));

        json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        })
    }
}

impl ChatClient for HttpChatClient {
    fn chat(&self, request: ChatRequest) -> BoxFuture<'_, Result<String, ClientError>> {
        Box::pin(async move {
            let body = self.build_body(&request);
            debug!(client = %self.name, model = %self.model, "sending chat request");

            let response = self
                .http
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        ClientError::Timeout {
                            secs: self.timeout_secs,
                        }
                    } else {
                        ClientError::Network {
                            detail: e.to_string(),
                        }
                    }
                })?;

            let status = response.status();
            if status.as_u16() == 429 {
                return Err(ClientError::RateLimited {
                    endpoint: self.endpoint.clone(),
                });
            }
            if status.as_u16() == 401 || status.as_u16() == 403 {
                let detail = response.text().await.unwrap_or_default();
                return Err(ClientError::Auth {
                    endpoint: self.endpoint.clone(),
                    detail,
                });
            }
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                warn!(client = %self.name, %status, "service returned error status");
                return Err(ClientError::Api {
                    status: status.as_u16(),
                    detail,
                });
            }

            let parsed: Value = response.json().await.map_err(|e| {
                ClientError::MalformedResponse {
                    detail: format!("body was not JSON: {e}"),
                }
            })?;

            let content = parsed["choices"][0]["message"]["content"]
                .as_str()
                .ok_or_else(|| ClientError::MalformedResponse {
                    detail: "missing choices[0].message.content".to_string(),
                })?;

            debug!(client = %self.name, chars = content.len(), "chat response received");
            Ok(content.to_string())
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
