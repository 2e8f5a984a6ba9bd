use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tasklink::args::CommonArgs;
use tasklink::config::Config;
use tasklink::logging::{self, LogConfig};
use tasklink::observability::LogObserver;
use tasklink::{ErrorKind, InvocationClient, InvocationMode, InvocationRequest, InvokeError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

// sysexits.h
const EX_USAGE: u8 = 64;
const EX_DATAERR: u8 = 65;
const EX_UNAVAILABLE: u8 = 69;
const EX_TEMPFAIL: u8 = 75;
const EX_CONFIG: u8 = 78;
const EX_INTERRUPTED: u8 = 130;

// ── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "tasklink",
    version,
    about = "Invoke remote operations, streaming results when the endpoint supports it"
)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Invoke an operation and print its text result
    Invoke(InvokeArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Debug, clap::Args)]
struct InvokeArgs {
    /// Operation name
    operation: String,
    /// Arguments as a JSON object, or @path to read them from a file
    #[arg(long, value_name = "JSON|@FILE")]
    args: Option<String>,
    /// Session id (default: a fresh UUID)
    #[arg(long, value_name = "ID")]
    session: Option<String>,
    /// Delivery mode (default from config)
    #[arg(long, value_name = "MODE")]
    mode: Option<InvocationMode>,
    /// Liveness timeout in seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,
    /// Overall deadline in seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    deadline: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0:#}")]
    Usage(anyhow::Error),
    #[error("{0:#}")]
    Config(anyhow::Error),
    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => EX_USAGE,
            Self::Config(_) => EX_CONFIG,
            Self::Invoke(e) => exit_code_for(e.kind()),
        }
    }
}

fn exit_code_for(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::CancellationRequested => EX_INTERRUPTED,
        ErrorKind::IdleTimeout | ErrorKind::DeadlineExceeded => EX_TEMPFAIL,
        ErrorKind::SingleShotParseError => EX_DATAERR,
        ErrorKind::ConnectionOpenFailed
        | ErrorKind::TransportError
        | ErrorKind::TriggerCallFailed
        | ErrorKind::SingleShotHttpError
        | ErrorKind::RetriesExhausted => EX_UNAVAILABLE,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(if cli.common.verbose {
        LogConfig::debug()
    } else {
        LogConfig::from_env()
    });

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = Config::load(cli.common.config_path()).map_err(CliError::Config)?;
    cli.common.apply_overrides(&mut config);

    match cli.command {
        Commands::Config => {
            let rendered = toml::to_string_pretty(&config)
                .context("failed to render configuration")
                .map_err(CliError::Config)?;
            print!("{rendered}");
            Ok(())
        }
        Commands::Invoke(args) => invoke(&config, args).await,
    }
}

async fn invoke(config: &Config, args: InvokeArgs) -> Result<(), CliError> {
    let request = build_request(config, &args).map_err(CliError::Usage)?;
    let options = config.client_options().map_err(CliError::Config)?;
    let client = InvocationClient::http(options, config.http_options())
        .map_err(CliError::Config)?
        .with_observer(Arc::new(LogObserver::new()));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        debug!("interrupt received; cancelling invocation");
        on_signal.cancel();
    });

    let text = client.invoke_with_cancel(&request, cancel).await?;
    println!("{text}");
    Ok(())
}

fn build_request(config: &Config, args: &InvokeArgs) -> Result<InvocationRequest> {
    let arguments = match args.args.as_deref() {
        Some(raw) => parse_arguments(raw)?,
        None => Value::Object(Default::default()),
    };
    let session_id = args
        .session
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let liveness = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.liveness_timeout());

    let mut request = InvocationRequest::new(&args.operation, session_id)
        .with_arguments(arguments)
        .with_mode(args.mode.unwrap_or(config.client.default_mode))
        .with_liveness_timeout(liveness);
    if let Some(deadline) = args.deadline.map(Duration::from_secs).or(config.deadline()) {
        request = request.with_deadline(deadline);
    }
    Ok(request)
}

fn parse_arguments(raw: &str) -> Result<Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => {
            let path = PathBuf::from(path);
            std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read arguments from {}", path.display()))?
        }
        None => raw.to_string(),
    };
    let value: Value = serde_json::from_str(&text).context("arguments are not valid JSON")?;
    anyhow::ensure!(value.is_object(), "arguments must be a JSON object");
    Ok(value)
}
