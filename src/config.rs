//! Pipeline configuration and external-client resolution.
//!
//! Clients are explicit, owned values injected by the caller — there is no
//! ambient global client anywhere in the crate. When a client is not
//! injected, [`PipelineConfig::resolve_vision_client`] and
//! [`PipelineConfig::resolve_reasoning_client`] fall back to environment
//! configuration, in this order:
//!
//! 1. the injected client,
//! 2. `SNAPSOLVE_VISION_*` / `SNAPSOLVE_REASONING_*` (endpoint, key, model),
//! 3. the provider default: `MISTRAL_API_KEY` for vision,
//!    `OPENAI_API_KEY` for reasoning.
//!
//! Resolution failure is the fatal [`PipelineError::MissingClient`] — the
//! one configuration problem no fail-soft contract can paper over.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::client::{ChatClient, HttpChatClient};
use crate::error::PipelineError;

/// Extraction confidence below which the original image is attached to the
/// structuring request (and a failed text-only parse is retried once with
/// the image). The single branching threshold in the pipeline; every other
/// confidence value is report-only.
pub const IMAGE_FALLBACK_CONFIDENCE: f64 = 0.7;

const DEFAULT_VISION_ENDPOINT: &str = "https://api.mistral.ai/v1/chat/completions";
const DEFAULT_VISION_MODEL: &str = "pixtral-large-latest";
const DEFAULT_REASONING_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_REASONING_MODEL: &str = "gpt-4.1-mini";

/// Configuration for one pipeline run.
#[derive(Clone)]
pub struct PipelineConfig {
    /// Vision model used by the Extraction Stage.
    pub vision_client: Option<Arc<dyn ChatClient>>,
    /// Reasoning model used by the Structuring and Solving Stages.
    pub reasoning_client: Option<Arc<dyn ChatClient>>,
    /// Sampling temperature for extraction calls.
    pub extraction_temperature: f32,
    /// Token cap for extraction calls.
    pub extraction_max_tokens: u32,
    /// Sampling temperature for structuring and MCQ reasoning calls.
    pub reasoning_temperature: f32,
    /// Token cap for structuring and MCQ reasoning calls.
    pub reasoning_max_tokens: u32,
    /// Per-call timeout for model service requests, in seconds.
    pub api_timeout_secs: u64,
    /// Timeout for downloading a source image by URL, in seconds.
    pub download_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            vision_client: None,
            reasoning_client: None,
            extraction_temperature: 0.1,
            extraction_max_tokens: 2000,
            reasoning_temperature: 0.2,
            reasoning_max_tokens: 4096,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field(
                "vision_client",
                &self.vision_client.as_ref().map(|c| c.name().to_string()),
            )
            .field(
                "reasoning_client",
                &self.reasoning_client.as_ref().map(|c| c.name().to_string()),
            )
            .field("extraction_temperature", &self.extraction_temperature)
            .field("extraction_max_tokens", &self.extraction_max_tokens)
            .field("reasoning_temperature", &self.reasoning_temperature)
            .field("reasoning_max_tokens", &self.reasoning_max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .finish()
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// The vision client for extraction, resolving through the fallback
    /// chain when none was injected.
    pub fn resolve_vision_client(&self) -> Result<Arc<dyn ChatClient>, PipelineError> {
        if let Some(ref client) = self.vision_client {
            debug!(client = client.name(), "using injected vision client");
            return Ok(Arc::clone(client));
        }
        self.client_from_env(
            "vision",
            "SNAPSOLVE_VISION",
            "MISTRAL_API_KEY",
            DEFAULT_VISION_ENDPOINT,
            DEFAULT_VISION_MODEL,
        )
    }

    /// The reasoning client for structuring and solving, resolving through
    /// the fallback chain when none was injected.
    pub fn resolve_reasoning_client(&self) -> Result<Arc<dyn ChatClient>, PipelineError> {
        if let Some(ref client) = self.reasoning_client {
            debug!(client = client.name(), "using injected reasoning client");
            return Ok(Arc::clone(client));
        }
        self.client_from_env(
            "reasoning",
            "SNAPSOLVE_REASONING",
            "OPENAI_API_KEY",
            DEFAULT_REASONING_ENDPOINT,
            DEFAULT_REASONING_MODEL,
        )
    }

    fn client_from_env(
        &self,
        role: &'static str,
        env_prefix: &str,
        default_key_var: &str,
        default_endpoint: &str,
        default_model: &str,
    ) -> Result<Arc<dyn ChatClient>, PipelineError> {
        let var = |suffix: &str| std::env::var(format!("{env_prefix}_{suffix}")).ok();

        if let (Some(endpoint), Some(api_key)) = (var("ENDPOINT"), var("API_KEY")) {
            let model = var("MODEL").unwrap_or_else(|| default_model.to_string());
            debug!(role, %endpoint, %model, "constructing {role} client from environment");
            let client =
                HttpChatClient::new(role, endpoint, api_key, model, self.api_timeout_secs)?;
            return Ok(Arc::new(client));
        }

        if let Ok(api_key) = std::env::var(default_key_var) {
            debug!(role, endpoint = default_endpoint, "constructing {role} client from provider default");
            let client = HttpChatClient::new(
                role,
                default_endpoint,
                api_key,
                default_model,
                self.api_timeout_secs,
            )?;
            return Ok(Arc::new(client));
        }

        Err(PipelineError::MissingClient {
            role,
            hint: format!(
                "Inject a client into PipelineConfig, or set {env_prefix}_ENDPOINT + \
{env_prefix}_API_KEY (optionally {env_prefix}_MODEL), or set {default_key_var}."
            ),
        })
    }
}

/// Builder for [`PipelineConfig`] with range validation at `build()`.
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn vision_client(mut self, client: Arc<dyn ChatClient>) -> Self {
        self.config.vision_client = Some(client);
        self
    }

    pub fn reasoning_client(mut self, client: Arc<dyn ChatClient>) -> Self {
        self.config.reasoning_client = Some(client);
        self
    }

    pub fn extraction_temperature(mut self, temperature: f32) -> Self {
        self.config.extraction_temperature = temperature;
        self
    }

    pub fn extraction_max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.extraction_max_tokens = max_tokens;
        self
    }

    pub fn reasoning_temperature(mut self, temperature: f32) -> Self {
        self.config.reasoning_temperature = temperature;
        self
    }

    pub fn reasoning_max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.reasoning_max_tokens = max_tokens;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        for (name, value) in [
            ("extraction_temperature", c.extraction_temperature),
            ("reasoning_temperature", c.reasoning_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be within [0.0, 2.0], got {value}"
                )));
            }
        }
        if c.extraction_max_tokens == 0 || c.reasoning_max_tokens == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_tokens must be positive".to_string(),
            ));
        }
        if c.api_timeout_secs == 0 || c.download_timeout_secs == 0 {
            return Err(PipelineError::InvalidConfig(
                "timeouts must be positive".to_string(),
            ));
        }
        Ok(self.config)
    }
}
