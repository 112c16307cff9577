use crate::utils::truncate_str;
use crate::{ContractError, ContractResponse};
use std::path::PathBuf;
use unicode_width::UnicodeWidthStr;
use tracing::{debug, error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt as subscriber_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    pub log_level: String,
    pub console_output: bool,
    pub file_output: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".into(),
            log_level: "info".into(),
            console_output: true,
            file_output: false,
        }
    }
}

const CARD_WIDTH: usize = 80;
const LABEL_WIDTH: usize = 10;
const CONTENT_WIDTH: usize = CARD_WIDTH - LABEL_WIDTH - 4;

fn create_separator(width: usize, ch: char) -> String {
    std::iter::repeat(ch).take(width).collect()
}

/// One `║ label value ║` row, padded by display width so CJK text lines up.
fn card_row(label: &str, value: &str) -> String {
    let value = truncate_str(value, CONTENT_WIDTH);
    let padding = CONTENT_WIDTH.saturating_sub(value.width());
    format!(
        "║ {:<label_width$}{}{} ║",
        label,
        value,
        " ".repeat(padding),
        label_width = LABEL_WIDTH
    )
}

fn render_card(rows: &[String]) -> String {
    let top = create_separator(CARD_WIDTH - 2, '═');
    let middle = create_separator(CARD_WIDTH - 2, '─');

    let mut card = format!("\n╔{top}╗");
    for (i, row) in rows.iter().enumerate() {
        if i == 1 {
            card.push_str(&format!("\n║{middle}║"));
        }
        card.push('\n');
        card.push_str(row);
    }
    card.push_str(&format!("\n╚{top}╝"));
    card
}

pub fn log_contract_card(response: &ContractResponse) {
    let card = render_card(&[
        card_row("URL:", &response.url),
        card_row("Contract:", &response.contract),
        card_row(
            "Length:",
            &format!("{} chars", response.contract.chars().count()),
        ),
    ]);
    info!("{}", card);
}

/// Client-side failures (4xx) go out at WARN, everything else at ERROR.
pub fn log_error_card(url: &str, err: &ContractError) {
    let card = render_card(&[
        card_row("URL:", url),
        card_row("Error:", &err.to_string()),
        card_row(
            "Kind:",
            &format!("{:?} (HTTP {})", err.kind(), err.status_code()),
        ),
    ]);
    if err.status_code() < 500 {
        warn!("{}", card);
    } else {
        error!("{}", card);
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `config.log_level`.
pub fn setup_logging(config: LogConfig) -> Result<(), ContractError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let mut layers = Vec::new();

    if config.console_output {
        let console_layer = subscriber_fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_file(true);
        layers.push(console_layer.boxed());
    }

    if config.file_output {
        std::fs::create_dir_all(&config.log_dir).map_err(|e| {
            ContractError::InvalidConfiguration(format!(
                "cannot create log directory {}: {e}",
                config.log_dir.display()
            ))
        })?;

        let file_appender =
            RollingFileAppender::new(Rotation::DAILY, &config.log_dir, "quick-contract.log");

        let file_layer = subscriber_fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_file(true)
            .with_writer(file_appender);

        layers.push(file_layer.boxed());
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(|e| {
            ContractError::InvalidConfiguration(format!("failed to install log subscriber: {e}"))
        })?;

    debug!("Logging system initialized with config: {:?}", config);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContractService, MockProvider, ServiceConfig};
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn capture_logs() -> (SharedBuffer, tracing::subscriber::DefaultGuard) {
        let buffer = SharedBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        (buffer, tracing::subscriber::set_default(subscriber))
    }

    #[test]
    fn test_client_errors_log_at_warn() {
        let (logs, _guard) = capture_logs();

        log_error_card("ftp://x", &ContractError::InvalidUrlScheme("ftp".into()));
        let output = logs.contents();
        assert!(output.contains("WARN"), "{output}");
        assert!(!output.contains("ERROR"), "{output}");

        log_error_card("https://example.com", &ContractError::EmptyResponse);
        assert!(logs.contents().contains("ERROR"));
    }

    #[tokio::test]
    async fn test_rejected_url_logs_no_errors() {
        let (logs, _guard) = capture_logs();
        let service = ContractService::with_model(
            &ServiceConfig::new("key"),
            Arc::new(MockProvider::with_reply("unused")),
        )
        .unwrap();

        let err = service.generate_contract("ftp://x").await.unwrap_err();
        log_error_card("ftp://x", &err);

        let output = logs.contents();
        assert!(!output.contains("ERROR"), "{output}");
        assert_eq!(output.matches("Kind:").count(), 1, "{output}");
    }

    #[test]
    fn test_card_rows_share_one_width() {
        let card = render_card(&[
            card_row("URL:", "https://example.com/terms"),
            card_row("Contract:", "利用者は月額980円を支払い、いつでも解約できるものとする。"),
            card_row("Error:", &"長い説明".repeat(40)),
        ]);

        let widths: Vec<usize> = card.lines().skip(1).map(|line| line.width()).collect();
        assert_eq!(widths.len(), 6);
        assert!(widths.iter().all(|w| *w == CARD_WIDTH), "{widths:?}");
        assert!(card.lines().skip(1).all(|line| line.starts_with(['╔', '║', '╚'])));
    }
}
