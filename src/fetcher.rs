use crate::config::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MAX_BODY_BYTES, DEFAULT_USER_AGENT};
use crate::ContractError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::Client;
use std::error::Error as _;
use std::time::Duration;
use encoding_rs::{Encoding, UTF_8};
use tracing::{debug, error, instrument};

/// Content types accepted as an HTML page.
const HTML_CONTENT_TYPES: [&str; 2] = ["text/html", "application/xhtml"];

#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    max_body_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub body: String,
    pub content_type: String,
    pub final_url: String,
    pub status: u16,
}

/// HTTP client settings for page retrieval.
///
/// # Examples
/// ```ignore
/// let fetcher = Fetcher::new_with_config(FetcherConfig {
///     timeout: Duration::from_secs(5),
///     ..Default::default()
/// })?;
/// ```
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub headers: Option<HeaderMap>,
    pub max_redirects: usize,
    /// Upper bound on the downloaded body, checked against `Content-Length`
    /// and again while reading.
    pub max_body_bytes: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            headers: None,
            max_redirects: 10,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("ja,en-US;q=0.7,en;q=0.3"),
    );
    headers
}

impl Fetcher {
    pub fn new() -> Result<Self, ContractError> {
        Self::new_with_config(FetcherConfig::default())
    }

    pub fn new_with_config(config: FetcherConfig) -> Result<Self, ContractError> {
        let mut headers = browser_headers();
        if let Some(extra) = config.headers {
            headers.extend(extra);
        }

        let client = Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| {
                error!(error = %e, "Failed to create HTTP client");
                ContractError::InvalidConfiguration(format!("HTTP client: {e}"))
            })?;

        debug!(timeout = ?config.timeout, max_body_bytes = config.max_body_bytes, "Fetcher initialized");
        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// One GET, no retries. Only 2xx HTML responses succeed.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<FetchResult, ContractError> {
        let scheme = url.split_once("://").map(|(s, _)| s).unwrap_or_default();
        if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
            return Err(ContractError::InvalidUrlScheme(scheme.to_string()));
        }

        debug!(url = %url, "Sending request");
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_request_error(e, url))?;

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            debug!(url = %url, status = %status, "Non-success status");
            return Err(match status.as_u16() {
                404 => ContractError::NotFound(url.to_string()),
                code => ContractError::HttpStatus {
                    status: code,
                    url: url.to_string(),
                },
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if !is_html_content_type(&content_type) {
            debug!(url = %url, content_type = %content_type, "Rejected non-HTML response");
            return Err(ContractError::InvalidContentType(if content_type.is_empty() {
                "missing".to_string()
            } else {
                content_type
            }));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_body_bytes {
                debug!(url = %url, length, limit = self.max_body_bytes, "Declared body too large");
                return Err(ContractError::ContentTooLarge {
                    limit: self.max_body_bytes,
                });
            }
        }

        // Content-Length may be absent or wrong, so the cap also applies per chunk.
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| classify_request_error(e, url))?
        {
            if (bytes.len() + chunk.len()) as u64 > self.max_body_bytes {
                debug!(url = %url, limit = self.max_body_bytes, "Body exceeded limit while reading");
                return Err(ContractError::ContentTooLarge {
                    limit: self.max_body_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }
        let body = decode_body(&bytes, &content_type);

        debug!(url = %url, content_length = bytes.len(), "Fetched page");
        Ok(FetchResult {
            body,
            content_type,
            final_url,
            status: status.as_u16(),
        })
    }
}

/// Decode with the `charset` from the content type, UTF-8 when absent or unknown.
fn decode_body(bytes: &[u8], content_type: &str) -> String {
    let encoding = content_type
        .split(';')
        .filter_map(|param| param.trim().strip_prefix("charset="))
        .next()
        .and_then(|label| Encoding::for_label(label.trim_matches('"').as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

pub fn is_html_content_type(content_type: &str) -> bool {
    let lowered = content_type.to_ascii_lowercase();
    HTML_CONTENT_TYPES.iter().any(|ct| lowered.contains(ct))
}

fn classify_request_error(e: reqwest::Error, url: &str) -> ContractError {
    if e.is_timeout() {
        debug!(url = %url, "Request timed out");
        return ContractError::TimeoutError(url.to_string());
    }

    // reqwest only surfaces the resolver failure in the source chain.
    let mut chain = String::new();
    let mut source = e.source();
    while let Some(inner) = source {
        chain.push_str(&inner.to_string().to_lowercase());
        chain.push(' ');
        source = inner.source();
    }

    if e.is_connect() {
        if chain.contains("dns error") || chain.contains("failed to lookup") {
            debug!(url = %url, error = %e, "DNS resolution failed");
            return ContractError::DnsError(e.to_string());
        }
        debug!(url = %url, error = %e, "Connection failed");
        return ContractError::ConnectionError(e.to_string());
    }

    debug!(url = %url, error = %e, "Request failed");
    ContractError::FetchError(e.to_string())
}
