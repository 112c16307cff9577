use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("Failed to parse URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported URL scheme: {0}")]
    InvalidUrlScheme(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to fetch content: {0}")]
    FetchError(String),

    #[error("DNS resolution failed: {0}")]
    DnsError(String),

    #[error("Connection failed: {0}")]
    ConnectionError(String),

    #[error("Request timeout: {0}")]
    TimeoutError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("HTTP error {status}: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    #[error("Response body exceeds {limit} bytes")]
    ContentTooLarge { limit: u64 },

    #[error("Failed to extract content: {0}")]
    ExtractError(String),

    #[error("Extracted text too short: {length} characters (minimum {minimum})")]
    ContentTooShort { length: usize, minimum: usize },

    #[error("Generation failed: {0}")]
    GenerationError(String),

    #[error("Generation timed out after {0} seconds")]
    GenerationTimeout(u64),

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Request processing exceeded {0} seconds")]
    PipelineTimeout(u64),

    #[error("External service unavailable: {service} - {message}")]
    ServiceUnavailable { service: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Coarse failure classes; each one maps to exactly one HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Fetch,
    Extraction,
    Generation,
    Unavailable,
    Configuration,
}

impl ErrorKind {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Validation | ErrorKind::Fetch | ErrorKind::Extraction => 400,
            ErrorKind::Generation | ErrorKind::Configuration => 500,
            ErrorKind::Unavailable => 503,
        }
    }
}

impl ContractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContractError::UrlParseError(_)
            | ContractError::InvalidUrl(_)
            | ContractError::InvalidUrlScheme(_)
            | ContractError::InvalidRequest(_) => ErrorKind::Validation,
            ContractError::FetchError(_)
            | ContractError::DnsError(_)
            | ContractError::ConnectionError(_)
            | ContractError::TimeoutError(_)
            | ContractError::NotFound(_)
            | ContractError::HttpStatus { .. }
            | ContractError::InvalidContentType(_)
            | ContractError::ContentTooLarge { .. } => ErrorKind::Fetch,
            ContractError::ExtractError(_) | ContractError::ContentTooShort { .. } => {
                ErrorKind::Extraction
            }
            ContractError::GenerationError(_)
            | ContractError::GenerationTimeout(_)
            | ContractError::EmptyResponse
            | ContractError::PipelineTimeout(_) => ErrorKind::Generation,
            ContractError::ServiceUnavailable { .. } => ErrorKind::Unavailable,
            ContractError::InvalidConfiguration(_) => ErrorKind::Configuration,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// User-facing message for the `detail` field of an error response.
    pub fn detail(&self) -> String {
        match self {
            ContractError::UrlParseError(e) => {
                format!("無効なURLです（{e}）。http または https で始まるURLを指定してください。")
            }
            ContractError::InvalidUrl(reason) => {
                format!("無効なURLです（{reason}）。http または https で始まるURLを指定してください。")
            }
            ContractError::InvalidUrlScheme(scheme) => format!(
                "無効なURLです（スキーム '{scheme}' は未対応）。http または https で始まるURLを指定してください。"
            ),
            ContractError::InvalidRequest(reason) => {
                format!("リクエストが不正です: {reason}")
            }
            ContractError::TimeoutError(_) => {
                "URLの取得がタイムアウトしました。別のURLを試してください。".to_string()
            }
            ContractError::DnsError(_) | ContractError::ConnectionError(_) => {
                "URLに接続できませんでした。URLが正しいかご確認ください。".to_string()
            }
            ContractError::NotFound(_) => {
                "URLの取得に失敗しました。ステータスコード: 404".to_string()
            }
            ContractError::HttpStatus { status, .. } => {
                format!("URLの取得に失敗しました。ステータスコード: {status}")
            }
            ContractError::InvalidContentType(_) => {
                "HTMLページではありません。HTMLページのURLを指定してください。".to_string()
            }
            ContractError::ContentTooLarge { limit } => format!(
                "ページのサイズが大きすぎます（上限: {limit} バイト）。別のURLを指定してください。"
            ),
            ContractError::FetchError(reason) => {
                format!("URLの取得中にエラーが発生しました: {reason}")
            }
            ContractError::ExtractError(_) => {
                "ページから有効なコンテンツを抽出できませんでした。".to_string()
            }
            ContractError::ContentTooShort { .. } => {
                "抽出されたテキストが短すぎます。有効なWebページのURLを指定してください。"
                    .to_string()
            }
            ContractError::GenerationError(_) | ContractError::EmptyResponse => {
                "契約文の生成に失敗しました。しばらく時間をおいて再試行してください。".to_string()
            }
            ContractError::GenerationTimeout(_) | ContractError::PipelineTimeout(_) => {
                "契約文の生成がタイムアウトしました。しばらく時間をおいて再試行してください。"
                    .to_string()
            }
            ContractError::ServiceUnavailable { service, .. } => format!(
                "{service} API が利用できません。しばらく時間をおいて再試行してください。"
            ),
            ContractError::InvalidConfiguration(_) => {
                "サーバーの設定に問題があります。".to_string()
            }
        }
    }

    pub fn log(&self) {
        match self.kind() {
            ErrorKind::Validation => {
                warn!(error = %self, "Request validation failed");
            }
            ErrorKind::Fetch => {
                warn!(error = %self, "Content fetch failed");
            }
            ErrorKind::Extraction => {
                warn!(error = %self, "Content extraction failed");
            }
            ErrorKind::Generation => {
                error!(error = %self, "Contract generation failed");
            }
            ErrorKind::Unavailable => {
                if let ContractError::ServiceUnavailable { service, message } = self {
                    error!(
                        service = %service,
                        error = %message,
                        "External service unavailable"
                    );
                }
            }
            ErrorKind::Configuration => {
                error!(error = %self, "Service misconfigured");
            }
        }
    }
}
