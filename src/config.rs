//! Startup configuration
//!
//! Everything the service needs is read once into an immutable
//! [`ServiceConfig`] and handed to the components that use it.

use crate::ContractError;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_MAX_TEXT_CHARS: usize = 150_000;
pub const DEFAULT_MIN_TEXT_CHARS: usize = 50;
pub const DEFAULT_MAX_CONTRACT_CHARS: usize = 60;
pub const DEFAULT_MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// System instruction shipped with the binary.
pub const DEFAULT_SYSTEM_PROMPT: &str = include_str!("../prompts/system_prompt.txt");

#[derive(Clone)]
pub struct ServiceConfig {
    pub api_key: String,
    pub model: String,
    pub gemini_base_url: String,
    pub system_prompt: String,
    pub user_agent: String,
    pub fetch_timeout: Duration,
    pub generation_timeout: Duration,
    /// Upper bound on one whole fetch → extract → generate run
    pub request_timeout: Duration,
    pub max_text_chars: usize,
    pub min_text_chars: usize,
    pub max_contract_chars: usize,
    pub max_body_bytes: u64,
    pub block_private_hosts: bool,
    pub bind_addr: SocketAddr,
}

// The API key stays out of logs.
impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("system_prompt_chars", &self.system_prompt.chars().count())
            .field("fetch_timeout", &self.fetch_timeout)
            .field("generation_timeout", &self.generation_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("max_text_chars", &self.max_text_chars)
            .field("min_text_chars", &self.min_text_chars)
            .field("max_contract_chars", &self.max_contract_chars)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("block_private_hosts", &self.block_private_hosts)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

impl ServiceConfig {
    /// Defaults for everything except the credential.
    pub fn new(api_key: impl Into<String>) -> Self {
        let fetch_timeout = Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS);
        let generation_timeout = Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS);

        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.trim().to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_timeout,
            generation_timeout,
            request_timeout: fetch_timeout + generation_timeout,
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
            max_contract_chars: DEFAULT_MAX_CONTRACT_CHARS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            block_private_hosts: false,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
        }
    }

    pub fn from_env() -> Result<Self, ContractError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ContractError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("GOOGLE_API_KEY")
            .or_else(|| get("GEMINI_API_KEY"))
            .ok_or_else(|| {
                ContractError::InvalidConfiguration(
                    "GOOGLE_API_KEY environment variable not set".to_string(),
                )
            })?;

        let mut config = Self::new(api_key);

        if let Some(model) = get("GEMINI_MODEL") {
            config.model = model;
        }
        if let Some(base_url) = get("GEMINI_BASE_URL") {
            config.gemini_base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(path) = get("SYSTEM_PROMPT_FILE") {
            config.system_prompt = load_system_prompt(Path::new(&path))?;
        }
        if let Some(secs) = parse_var::<u64>(&get, "FETCH_TIMEOUT_SECS")? {
            config.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&get, "GENERATION_TIMEOUT_SECS")? {
            config.generation_timeout = Duration::from_secs(secs);
        }
        config.request_timeout = match parse_var::<u64>(&get, "REQUEST_TIMEOUT_SECS")? {
            Some(secs) => Duration::from_secs(secs),
            None => config.fetch_timeout + config.generation_timeout,
        };
        if let Some(n) = parse_var::<usize>(&get, "MAX_TEXT_CHARS")? {
            config.max_text_chars = n;
        }
        if let Some(n) = parse_var::<usize>(&get, "MIN_TEXT_CHARS")? {
            config.min_text_chars = n;
        }
        if let Some(n) = parse_var::<usize>(&get, "MAX_CONTRACT_CHARS")? {
            config.max_contract_chars = n;
        }
        if let Some(n) = parse_var::<u64>(&get, "MAX_BODY_BYTES")? {
            config.max_body_bytes = n;
        }
        if let Some(flag) = parse_var::<bool>(&get, "BLOCK_PRIVATE_HOSTS")? {
            config.block_private_hosts = flag;
        }
        if let Some(addr) = parse_var::<SocketAddr>(&get, "BIND_ADDR")? {
            config.bind_addr = addr;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ContractError> {
        if self.api_key.trim().is_empty() {
            return Err(ContractError::InvalidConfiguration(
                "API key cannot be empty".to_string(),
            ));
        }
        if self.system_prompt.trim().is_empty() {
            return Err(ContractError::InvalidConfiguration(
                "system prompt cannot be empty".to_string(),
            ));
        }
        if self.fetch_timeout.is_zero()
            || self.generation_timeout.is_zero()
            || self.request_timeout.is_zero()
        {
            return Err(ContractError::InvalidConfiguration(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        // A shorter overall budget would turn a slow fetch into a pipeline timeout.
        if self.request_timeout <= self.fetch_timeout {
            return Err(ContractError::InvalidConfiguration(format!(
                "REQUEST_TIMEOUT_SECS ({}s) must exceed FETCH_TIMEOUT_SECS ({}s)",
                self.request_timeout.as_secs_f64(),
                self.fetch_timeout.as_secs_f64()
            )));
        }
        if self.max_text_chars == 0 || self.max_contract_chars == 0 || self.max_body_bytes == 0 {
            return Err(ContractError::InvalidConfiguration(
                "length limits must be greater than zero".to_string(),
            ));
        }
        if self.min_text_chars > self.max_text_chars {
            return Err(ContractError::InvalidConfiguration(format!(
                "MIN_TEXT_CHARS ({}) exceeds MAX_TEXT_CHARS ({})",
                self.min_text_chars, self.max_text_chars
            )));
        }
        Ok(())
    }
}

pub fn load_system_prompt(path: &Path) -> Result<String, ContractError> {
    let prompt = std::fs::read_to_string(path).map_err(|e| {
        ContractError::InvalidConfiguration(format!(
            "cannot read system prompt file {}: {e}",
            path.display()
        ))
    })?;
    Ok(prompt.trim().to_string())
}

fn parse_var<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ContractError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| {
                ContractError::InvalidConfiguration(format!("{key}={raw:?} is invalid: {e}"))
            })
        })
        .transpose()
}
