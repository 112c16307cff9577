//! Language model providers
//!
//! [`GeminiProvider`] talks to the Gemini REST API; [`MockProvider`] returns
//! canned replies for tests.

use crate::{ContractError, ServiceConfig};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::error::Error as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, instrument};

const GEMINI_SERVICE: &str = "Gemini";

/// Trait for text generation backends
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Get the name of the provider
    fn name(&self) -> &str;

    /// Generate a completion for a fully assembled prompt
    async fn generate(&self, prompt: &str) -> Result<String, ContractError>;

    /// Cheap reachability check; must not consume generation quota
    async fn probe(&self) -> Result<(), ContractError>;
}

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
    /// Set on reasoning summaries, which are not part of the answer
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

impl GeminiProvider {
    pub fn new(config: &ServiceConfig) -> Result<Self, ContractError> {
        if config.api_key.trim().is_empty() {
            return Err(ContractError::InvalidConfiguration(
                "Gemini API key cannot be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.generation_timeout)
            .build()
            .map_err(|e| ContractError::InvalidConfiguration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            timeout: config.generation_timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn model_url(&self) -> String {
        format!("{}/v1beta/models/{}", self.base_url, self.model)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> ContractError {
        if e.is_timeout() {
            return ContractError::GenerationTimeout(self.timeout.as_secs());
        }
        if e.is_connect() {
            let cause = e
                .source()
                .map(|s| s.to_string())
                .unwrap_or_else(|| e.to_string());
            return ContractError::ServiceUnavailable {
                service: GEMINI_SERVICE.to_string(),
                message: cause,
            };
        }
        ContractError::GenerationError(e.to_string())
    }

    async fn map_status_error(response: reqwest::Response) -> ContractError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or(body);

        if is_unavailable_status(status) {
            ContractError::ServiceUnavailable {
                service: GEMINI_SERVICE.to_string(),
                message: format!("{status}: {message}"),
            }
        } else {
            ContractError::GenerationError(format!("{status}: {message}"))
        }
    }
}

fn is_unavailable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

#[async_trait]
impl LanguageModel for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(level = "debug", skip_all, fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String, ContractError> {
        let request_body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "candidateCount": 1
            }
        });

        let response = self
            .client
            .post(format!("{}:generateContent", self.model_url()))
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            let err = Self::map_status_error(response).await;
            debug!(error = %err, "Gemini request rejected");
            return Err(err);
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ContractError::GenerationTimeout(self.timeout.as_secs())
            } else {
                ContractError::GenerationError(format!("unreadable Gemini response: {e}"))
            }
        })?;

        if let Some(reason) = parsed
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(ContractError::GenerationError(format!(
                "prompt blocked: {reason}"
            )));
        }

        let candidate = parsed.candidates.into_iter().next();
        let finish_reason = candidate
            .as_ref()
            .and_then(|c| c.finish_reason.clone())
            .unwrap_or_default();
        let text: String = candidate
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter(|part| !part.thought)
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        debug!(finish_reason = %finish_reason, text_len = text.len(), "Gemini responded");

        if text.trim().is_empty() {
            return Err(ContractError::EmptyResponse);
        }
        Ok(text)
    }

    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn probe(&self) -> Result<(), ContractError> {
        let response = self
            .client
            .get(self.model_url())
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::map_status_error(response).await)
        }
    }
}

#[derive(Debug, Clone)]
pub enum MockBehavior {
    Reply(String),
    Unavailable,
    Fail(String),
    Delay(Duration, String),
}

/// Mock LLM provider for testing
pub struct MockProvider {
    behavior: MockBehavior,
    probe_ok: bool,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl MockProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            probe_ok: true,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self::new(MockBehavior::Reply(reply.into()))
    }

    pub fn with_probe(mut self, ok: bool) -> Self {
        self.probe_ok = ok;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|p| p.clone())
    }
}

#[async_trait]
impl LanguageModel for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ContractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = Some(prompt.to_string());
        }

        match &self.behavior {
            MockBehavior::Reply(reply) => Ok(reply.clone()),
            MockBehavior::Unavailable => Err(ContractError::ServiceUnavailable {
                service: "mock".to_string(),
                message: "service unavailable".to_string(),
            }),
            MockBehavior::Fail(message) => Err(ContractError::GenerationError(message.clone())),
            MockBehavior::Delay(delay, reply) => {
                tokio::time::sleep(*delay).await;
                Ok(reply.clone())
            }
        }
    }

    async fn probe(&self) -> Result<(), ContractError> {
        if self.probe_ok {
            Ok(())
        } else {
            Err(ContractError::ServiceUnavailable {
                service: "mock".to_string(),
                message: "probe failed".to_string(),
            })
        }
    }
}
