use clap::Parser;
use quick_contract::{server, setup_logging, ContractService, LogConfig, ServiceConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on (overrides BIND_ADDR)
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Log level filter, e.g. "info" or "quick_contract=debug"
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Directory for rolling log files
    #[arg(long, env = "LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    /// Also write logs to a daily rolling file
    #[arg(long, env = "LOG_TO_FILE", default_value_t = false)]
    log_to_file: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    if let Err(e) = setup_logging(LogConfig {
        log_dir: args.log_dir.clone(),
        log_level: args.log_level.clone(),
        console_output: true,
        file_output: args.log_to_file,
    }) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    // A missing credential stops the process here, before the port opens.
    let mut config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            e.log();
            return ExitCode::FAILURE;
        }
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    info!(?config, "Configuration loaded");

    let service = match ContractService::from_config(&config) {
        Ok(service) => service,
        Err(e) => {
            e.log();
            return ExitCode::FAILURE;
        }
    };

    match server::serve(service, config.bind_addr).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server stopped with an error");
            ExitCode::FAILURE
        }
    }
}
