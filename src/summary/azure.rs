//! Blocking client for Azure `OpenAI` chat completions.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::SummarizerConfig;
use crate::summary::errors::UpstreamError;

/// Instruction sent with every request.
pub const SYSTEM_INSTRUCTION: &str = "You are an assistive medical record summarization system. \
Do NOT provide diagnosis, treatment, or medication advice. \
Return a concise summary (2-4 sentences).";

/// Connection establishment limit, capped by the overall timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A fully configured external service, borrowed from [`SummarizerConfig`].
#[derive(Clone, Copy, Debug)]
pub struct ExternalTarget<'a> {
    /// Resource endpoint.
    pub endpoint: &'a str,
    /// API key.
    pub api_key: &'a str,
    /// Deployment identifier.
    pub deployment: &'a str,
    /// API version.
    pub api_version: &'a str,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// Sampling temperature.
    pub temperature: f32,
}

impl<'a> ExternalTarget<'a> {
    /// Resolve the external target, or `None` when the service is not configured.
    #[must_use]
    pub fn from_config(config: &'a SummarizerConfig) -> Option<Self> {
        if !config.is_external_configured() {
            return None;
        }

        Some(Self {
            endpoint: config.endpoint.as_deref()?.trim(),
            api_key: config.api_key.as_deref()?.trim(),
            deployment: config.deployment.as_deref()?.trim(),
            api_version: &config.api_version,
            timeout: Duration::from_secs(config.timeout_secs),
            temperature: config.temperature,
        })
    }

    /// Chat completions URL for this deployment.
    ///
    /// # Errors
    /// Returns an error if the endpoint cannot be parsed as a base URL.
    pub fn completions_url(&self) -> Result<Url, UpstreamError> {
        let mut url = Url::parse(self.endpoint)
            .map_err(|e| UpstreamError::InvalidEndpoint(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| UpstreamError::InvalidEndpoint(self.endpoint.to_string()))?
            .pop_if_empty()
            .extend(["openai", "deployments", self.deployment, "chat", "completions"]);
        url.query_pairs_mut()
            .append_pair("api-version", self.api_version);
        Ok(url)
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Blocking chat-completions client for one deployment.
///
/// Must not be built or dropped on an async executor thread; callers on a
/// runtime go through `spawn_blocking`.
pub struct AzureChatClient {
    client: Client,
    url: Url,
    api_key: String,
    temperature: f32,
}

impl AzureChatClient {
    /// Build a client for `target`.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(target: &ExternalTarget<'_>) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(target.timeout))
            .timeout(target.timeout)
            .build()?;
        Self::with_http_client(client, target)
    }

    /// Build a client for `target` on top of an existing HTTP client.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid.
    pub fn with_http_client(client: Client, target: &ExternalTarget<'_>) -> Result<Self, UpstreamError> {
        Ok(Self {
            client,
            url: target.completions_url()?,
            api_key: target.api_key.to_string(),
            temperature: target.temperature,
        })
    }

    /// Ask the model for a short summary of `text`; the reply is returned verbatim.
    ///
    /// # Errors
    /// Returns an error on transport failure, non-success status, or a reply
    /// without text content.
    pub fn summarize(&self, text: &str) -> Result<String, UpstreamError> {
        let request = ChatRequest {
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_INSTRUCTION,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: self.temperature,
        };

        debug!(url = %self.url.path(), text_chars = text.chars().count(), "requesting external summary");

        let response = self
            .client
            .post(self.url.clone())
            .header("api-key", &self.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body: ChatResponse = response
            .json()
            .map_err(|e| UpstreamError::MalformedResponse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                UpstreamError::MalformedResponse("response contained no summary text".to_string())
            })
    }
}
