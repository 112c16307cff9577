mod config;
mod contract_service;
mod error;
mod extractor;
mod fetcher;
mod generator;
mod llm_providers;
mod logging;
mod security;
pub mod server;
mod utils;

use serde::{Deserialize, Serialize};

pub use config::{load_system_prompt, ServiceConfig, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT};
pub use contract_service::ContractService;
pub use error::{ContractError, ErrorKind};
pub use extractor::{ContentExtractor, ExtractedContent, ExtractorConfig, ReadabilityExtractor};
pub use fetcher::{FetchResult, Fetcher, FetcherConfig};
pub use generator::ContractGenerator;
pub use llm_providers::{GeminiProvider, LanguageModel, MockBehavior, MockProvider};
pub use logging::{log_contract_card, log_error_card, setup_logging, LogConfig};
pub use security::{UrlValidationConfig, UrlValidator};
pub use utils::{normalize_whitespace, truncate_chars, truncate_str};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractRequest {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractResponse {
    pub contract: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub gemini_api: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            gemini_api: "connected".to_string(),
            detail: None,
        }
    }

    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            status: "unhealthy".to_string(),
            gemini_api: "disconnected".to_string(),
            detail: Some(detail.into()),
        }
    }
}
