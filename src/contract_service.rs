use crate::extractor::{ContentExtractor, ExtractorConfig, ReadabilityExtractor};
use crate::fetcher::{Fetcher, FetcherConfig};
use crate::generator::ContractGenerator;
use crate::llm_providers::{GeminiProvider, LanguageModel};
use crate::security::{UrlValidationConfig, UrlValidator};
use crate::{ContractError, ContractResponse, HealthStatus, ServiceConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Runs fetch → extract → generate for one URL.
///
/// Cheap to clone; every clone shares the same clients and model handle.
#[derive(Clone)]
pub struct ContractService {
    validator: UrlValidator,
    fetcher: Fetcher,
    extractor: Arc<dyn ContentExtractor>,
    generator: ContractGenerator,
    request_timeout: Duration,
}

impl ContractService {
    /// Production wiring: Gemini backend and readability extraction.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ContractError> {
        let model: Arc<dyn LanguageModel> = Arc::new(GeminiProvider::new(config)?);
        Self::with_model(config, model)
    }

    /// Same wiring with a caller-supplied model.
    pub fn with_model(
        config: &ServiceConfig,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self, ContractError> {
        let extractor = Arc::new(ReadabilityExtractor::new(ExtractorConfig {
            max_text_chars: config.max_text_chars,
            min_text_chars: config.min_text_chars,
            ..Default::default()
        }));
        Self::with_components(config, model, extractor)
    }

    pub fn with_components(
        config: &ServiceConfig,
        model: Arc<dyn LanguageModel>,
        extractor: Arc<dyn ContentExtractor>,
    ) -> Result<Self, ContractError> {
        config.validate()?;

        let fetcher = Fetcher::new_with_config(FetcherConfig {
            user_agent: config.user_agent.clone(),
            timeout: config.fetch_timeout,
            max_body_bytes: config.max_body_bytes,
            ..Default::default()
        })?;
        let validator = UrlValidator::new(UrlValidationConfig {
            block_private_hosts: config.block_private_hosts,
            ..Default::default()
        });
        let generator = ContractGenerator::new(model, config.system_prompt.clone())
            .with_max_chars(config.max_contract_chars);

        debug!(model = generator.model().name(), "ContractService initialized");

        Ok(Self {
            validator,
            fetcher,
            extractor,
            generator,
            request_timeout: config.request_timeout,
        })
    }

    /// Validates first; nothing touches the network for a rejected URL.
    #[instrument(level = "info", skip(self))]
    pub async fn generate_contract(&self, url: &str) -> Result<ContractResponse, ContractError> {
        let parsed = self.validator.validate(url)?;

        match tokio::time::timeout(self.request_timeout, self.run_pipeline(parsed.as_str())).await
        {
            Ok(Ok(contract)) => {
                info!(url = %url, "Contract generated");
                Ok(ContractResponse {
                    contract,
                    url: url.to_string(),
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                debug!(url = %url, timeout = ?self.request_timeout, "Pipeline timed out");
                Err(ContractError::PipelineTimeout(self.request_timeout.as_secs()))
            }
        }
    }

    async fn run_pipeline(&self, url: &str) -> Result<String, ContractError> {
        let page = self.fetcher.fetch(url).await?;
        debug!(final_url = %page.final_url, bytes = page.body.len(), "Fetch stage complete");

        let content = self.extractor.extract(&page.body)?;
        debug!(chars = content.char_count(), "Extraction stage complete");

        self.generator.generate(&content.text).await
    }

    /// Never fails; a failed probe is reported in the returned status.
    #[instrument(level = "debug", skip(self))]
    pub async fn health(&self) -> HealthStatus {
        match self.generator.model().probe().await {
            Ok(()) => HealthStatus::healthy(),
            Err(e) => {
                e.log();
                HealthStatus::unhealthy(e.to_string())
            }
        }
    }
}
