//! GLM chat-completion client.
//!
//! [`GlmClient`] wraps one synchronous round-trip to the ZhipuAI
//! chat-completions endpoint (OpenAI-compatible wire shape). Before
//! dispatch it augments the system message with the configured skill
//! prompts and the long-term memory summary; after a successful reply it
//! records the exchange into history. All wire types are private to this
//! module — callers never see them.
//!
//! Errors propagate uninterpreted: the client never retries. Callers that
//! want the documented fallback-model behavior detect rate limiting with
//! [`is_rate_limited`] and retry once themselves.

use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, trace, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::memory::{HistoryRole, MemoryManager};

// ── Messages ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("memory error: {0}")]
    Memory(String),
}

/// The documented rate-limit sniff: a `"429"` substring anywhere in the
/// error's string form.
pub fn is_rate_limited(err: &ProviderError) -> bool {
    err.to_string().contains("429")
}

// ── Construction options ──────────────────────────────────────────────────────

/// Explicit constructor arguments. Every `Some` here beats both the
/// environment and the config file.
#[derive(Debug, Default)]
pub struct ClientOptions {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub streaming: Option<bool>,
    pub max_tokens: Option<u32>,
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Chat client with optional long-term memory and skill-prompt injection.
///
/// Constructed once, then cheaply cloned: `reqwest::Client` is an `Arc`
/// internally and the memory handle is shared.
#[derive(Clone)]
pub struct GlmClient {
    client: Client,
    api_base_url: String,
    model: String,
    temperature: f32,
    streaming: bool,
    max_tokens: Option<u32>,
    api_key: String,
    memory: Option<Arc<MemoryManager>>,
    skills_context: String,
}

const REQUEST_TIMEOUT_SECS: u64 = 60;

impl GlmClient {
    /// Build a client from resolved config plus explicit overrides.
    ///
    /// A missing API key is a configuration error raised here, before any
    /// network traffic.
    pub fn from_config(
        config: &Config,
        opts: ClientOptions,
        memory: Option<Arc<MemoryManager>>,
        skills_context: String,
    ) -> Result<Self, AppError> {
        let api_key = opts
            .api_key
            .or_else(|| config.api_key.clone())
            .ok_or_else(|| {
                AppError::Config("ZHIPUAI_API_KEY is not set (env var or explicit argument)".into())
            })?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base_url: config.glm.api_base_url.clone(),
            model: opts.model.unwrap_or_else(|| config.glm.model.clone()),
            temperature: opts.temperature.unwrap_or(config.glm.temperature),
            streaming: opts.streaming.unwrap_or(config.glm.streaming),
            max_tokens: opts.max_tokens.or(config.glm.max_tokens),
            api_key,
            memory,
            skills_context,
        })
    }

    /// Rebuild with a different model, keeping everything else (including
    /// the memory handle) shared. Used by callers for the fallback-model
    /// retry after a rate limit.
    pub fn with_model(&self, model: &str) -> Self {
        let mut clone = self.clone();
        clone.model = model.to_string();
        clone
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn memory(&self) -> Option<&Arc<MemoryManager>> {
        self.memory.as_ref()
    }

    /// Send `messages` and return the assistant's reply text.
    ///
    /// Skill prompts and the memory summary are injected into the system
    /// message before dispatch; the user messages and the reply are recorded
    /// into history afterwards.
    pub async fn invoke(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let memory_summary = match &self.memory {
            Some(memory) => Some(memory.summary().map_err(|e| ProviderError::Memory(e.to_string()))?),
            None => None,
        };

        let outgoing = augment_messages(messages, &self.skills_context, memory_summary.as_deref());
        let reply = self.dispatch(&outgoing).await?;

        if let Some(memory) = &self.memory {
            for msg in messages {
                if msg.role == Role::User {
                    if let Err(e) = memory.add_to_history(HistoryRole::User, &msg.content, None) {
                        warn!(error = %e, "failed to record user message");
                    }
                }
            }
            if let Err(e) = memory.add_to_history(HistoryRole::Assistant, &reply, None) {
                warn!(error = %e, "failed to record assistant reply");
            }
        }

        Ok(reply)
    }

    async fn dispatch(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let payload = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            stream: self.streaming,
            max_tokens: self.max_tokens,
        };

        debug!(
            model = %payload.model,
            temperature = payload.temperature,
            messages = messages.len(),
            "sending chat request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full chat request payload");
        }

        let response = self
            .client
            .post(&self.api_base_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.api_base_url, error = %e, "chat HTTP request failed (transport)");
                ProviderError::Request(e.to_string())
            })?;

        let response = check_status(response).await?;

        let parsed = response.json::<ChatCompletionResponse>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize chat response");
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })?;

        debug!(choices = parsed.choices.len(), "received chat response");

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Request("empty or missing content in response".into()))
    }
}

/// Inject skill prompts and the memory summary into the outgoing batch.
///
/// Skills are appended to the first system message, or prepended as a new
/// system message when the batch has none. The memory summary is appended
/// to the first system message only — a batch that still has no system
/// message after skill injection gets no memory block.
fn augment_messages(
    messages: &[ChatMessage],
    skills_context: &str,
    memory_summary: Option<&str>,
) -> Vec<ChatMessage> {
    let mut out: Vec<ChatMessage> = messages.to_vec();

    if !skills_context.is_empty() {
        match out.iter_mut().find(|m| m.role == Role::System) {
            Some(system) => {
                system.content =
                    format!("{}\n\n# Available Skills\n\n{skills_context}", system.content);
            }
            None => {
                out.insert(0, ChatMessage::system(format!("# Available Skills\n\n{skills_context}")));
            }
        }
    }

    if let Some(summary) = memory_summary.filter(|s| !s.trim().is_empty()) {
        if let Some(system) = out.iter_mut().find(|m| m.role == Role::System) {
            system.content = format!("{}\n\n{summary}", system.content);
        }
    }

    out
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: String,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// Error envelope used by ZhipuAI and other OpenAI-compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Consume the response and return it if successful, or a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let message = if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(&body) {
        let code = env
            .error
            .code
            .map(|v| match v {
                serde_json::Value::String(s) => format!(" [code={s}]"),
                other => format!(" [code={other}]"),
            })
            .unwrap_or_default();
        format!("HTTP {status}{code}: {}", env.error.message)
    } else {
        format!("HTTP {status}: {body}")
    };

    error!(%status, %message, "chat request returned HTTP error");
    Err(ProviderError::Request(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skills_appended_to_existing_system_message() {
        let messages = vec![ChatMessage::system("base prompt"), ChatMessage::user("hi")];
        let out = augment_messages(&messages, "skill text", None);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].role, Role::System);
        assert!(out[0].content.starts_with("base prompt"));
        assert!(out[0].content.contains("# Available Skills"));
        assert!(out[0].content.contains("skill text"));
    }

    #[test]
    fn skills_prepended_when_no_system_message() {
        let messages = vec![ChatMessage::user("hi")];
        let out = augment_messages(&messages, "skill text", None);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].role, Role::System);
        assert!(out[0].content.starts_with("# Available Skills"));
    }

    #[test]
    fn memory_summary_appended_after_skills() {
        let messages = vec![ChatMessage::system("base"), ChatMessage::user("hi")];
        let out = augment_messages(&messages, "skills", Some("## Your Long-Term Memory"));
        let system = &out[0].content;
        let skills_pos = system.find("# Available Skills").unwrap();
        let memory_pos = system.find("## Your Long-Term Memory").unwrap();
        assert!(skills_pos < memory_pos);
    }

    #[test]
    fn blank_memory_summary_not_injected() {
        let messages = vec![ChatMessage::system("base")];
        let out = augment_messages(&messages, "", Some("  \n"));
        assert_eq!(out[0].content, "base");
    }

    #[test]
    fn no_injection_leaves_batch_untouched() {
        let messages = vec![ChatMessage::user("hi")];
        let out = augment_messages(&messages, "", None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].role, Role::User);
    }

    #[test]
    fn rate_limit_sniff_matches_status_substring() {
        let err = ProviderError::Request("HTTP 429 Too Many Requests: rate limit".into());
        assert!(is_rate_limited(&err));
        let other = ProviderError::Request("HTTP 500: boom".into());
        assert!(!is_rate_limited(&other));
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert!(json.contains("\"role\":\"user\""));
    }

    #[test]
    fn max_tokens_omitted_when_unset() {
        let messages = [ChatMessage::user("hi")];
        let req = ChatCompletionRequest {
            model: "glm-4.7".into(),
            messages: &messages,
            temperature: 0.5,
            stream: false,
            max_tokens: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("max_tokens"));
    }
}
