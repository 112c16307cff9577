use crate::error::ContractError;
use std::collections::HashSet;
use std::net::IpAddr;
use url::Url;

/// Configuration for URL validation
#[derive(Debug, Clone)]
pub struct UrlValidationConfig {
    /// Allowed URL schemes (default: ["http", "https"])
    pub allowed_schemes: HashSet<String>,
    /// Reject loopback and private network hosts (default: false)
    pub block_private_hosts: bool,
}

impl Default for UrlValidationConfig {
    fn default() -> Self {
        let allowed_schemes = ["http", "https"].iter().map(|s| s.to_string()).collect();

        Self {
            allowed_schemes,
            block_private_hosts: false,
        }
    }
}

/// Validates a submitted URL before any network activity happens.
#[derive(Debug, Clone)]
pub struct UrlValidator {
    config: UrlValidationConfig,
}

impl UrlValidator {
    pub fn new(config: UrlValidationConfig) -> Self {
        Self { config }
    }

    pub fn with_default_config() -> Self {
        Self::new(UrlValidationConfig::default())
    }

    pub fn validate(&self, url_str: &str) -> Result<Url, ContractError> {
        let trimmed = url_str.trim();
        if trimmed.is_empty() {
            return Err(ContractError::InvalidUrl("URL is empty".to_string()));
        }

        let url = Url::parse(trimmed)?;

        if !self.config.allowed_schemes.contains(url.scheme()) {
            return Err(ContractError::InvalidUrlScheme(url.scheme().to_string()));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ContractError::InvalidUrl("No host in URL".to_string()))?;

        if self.config.block_private_hosts && is_private_host(host) {
            return Err(ContractError::InvalidUrl(format!(
                "private or loopback host not allowed: {host}"
            )));
        }

        Ok(url)
    }
}

fn is_private_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }

    let ip_str = host.trim_start_matches('[').trim_end_matches(']');
    match ip_str.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => {
            ip.is_private() || ip.is_loopback() || ip.is_link_local() || ip.is_unspecified()
        }
        // fc00::/7 unique local, fe80::/10 link local
        Ok(IpAddr::V6(ip)) => {
            let first = ip.segments()[0];
            ip.is_loopback()
                || ip.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
        }
        Err(_) => false,
    }
}
