//! CLI entry point for the TfNSW realtime poller.
//!
//! Provides subcommands for running one poll pass over the live feeds,
//! decoding a saved feed dump, and listing the polled modes.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tfnsw_rt_poller::config::{Endpoints, PollerConfig};
use tfnsw_rt_poller::mode::{FeedKind, FeedRequest, Mode};
use tfnsw_rt_poller::parser::FeedDecoder;
use tfnsw_rt_poller::poll::FailurePolicy;
use tfnsw_rt_poller::schema::{Schema, SchemaSource};
use tfnsw_rt_poller::sink::{FeedSink, LogSink, OutputFormat};
use tfnsw_rt_poller::startup::{bootstrap, default_http};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "tfnsw_rt_poller")]
#[command(about = "Poll the Transport for NSW GTFS-Realtime feeds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch trip updates and vehicle positions for every mode, once
    Poll {
        /// Only poll these modes (repeatable); defaults to all
        #[arg(short, long = "mode", value_enum)]
        modes: Vec<Mode>,

        /// Keep polling the remaining modes after a mode fails
        #[arg(short, long, default_value_t = false)]
        keep_going: bool,

        /// How decoded feeds are logged
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },
    /// Decode a saved feed dump with the same decoder and sink
    Inspect {
        /// Path to a protobuf FeedMessage
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Feed kind the dump was taken from
        #[arg(short, long, value_enum, default_value_t = FeedKind::TripUpdate)]
        kind: FeedKind,

        /// Mode the dump was taken from
        #[arg(short, long, value_enum, default_value_t = Mode::Metro)]
        mode: Mode,

        /// Optional descriptor set to decode with instead of the embedded one
        #[arg(long)]
        schema: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },
    /// List the polled modes and the URLs they resolve to
    Modes,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Poll {
            modes,
            keep_going,
            format,
        } => poll(modes, keep_going, format).await,
        Commands::Inspect {
            file,
            kind,
            mode,
            schema,
            format,
        } => {
            inspect(&file, FeedRequest::new(kind, mode), schema, format).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Modes => {
            list_modes();
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Logging setup: colored stderr + JSON rolling log file.
fn init_logging() -> WorkerGuard {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/tfnsw_rt_poller.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("tfnsw_rt_poller.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(env_filter("RUST_LOG", "info"));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(env_filter("RUST_LOG_JSON", "debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    file_guard
}

fn env_filter(var: &str, default: &str) -> EnvFilter {
    EnvFilter::try_from_env(var).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Runs one pass. Exit status is non-zero on startup failure, an aborted pass,
/// or any mode skipped under `--keep-going`.
#[tracing::instrument(skip(modes))]
async fn poll(modes: Vec<Mode>, keep_going: bool, format: OutputFormat) -> Result<ExitCode> {
    let poller = match bootstrap(|key| std::env::var(key).ok(), default_http).await {
        Ok(poller) => poller,
        Err(e) => {
            error!(error = %e, "Startup failed");
            return Err(e).context("cannot start polling");
        }
    };

    let policy = if keep_going {
        FailurePolicy::SkipMode
    } else {
        FailurePolicy::Abort
    };
    let poller = if modes.is_empty() {
        poller
    } else {
        poller.with_modes(&modes)
    }
    .with_policy(policy);

    let mut sink = LogSink::new(format);
    match poller.run_pass(&mut sink).await {
        Ok(report) if report.is_clean() => {
            info!(feeds = sink.emitted(), "Poll pass complete");
            Ok(ExitCode::SUCCESS)
        }
        Ok(report) => {
            for failure in &report.failures {
                warn!(mode = %failure.mode, kind = %failure.kind, error = %failure, "Mode skipped");
            }
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            error!(mode = %e.mode, kind = %e.kind, error = %e, "Poll pass failed");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Decodes a local feed dump and emits it like a polled feed.
#[tracing::instrument(skip(format))]
async fn inspect(
    file: &Path,
    request: FeedRequest,
    schema: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let source = schema.map_or(SchemaSource::Embedded, SchemaSource::File);
    let schema = Schema::load(&source).await?;
    let decoder = FeedDecoder::new(Arc::new(schema))?;

    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let feed = decoder.decode(&bytes)?;

    let mut sink = LogSink::new(format);
    sink.emit(request, feed);
    Ok(())
}

fn list_modes() {
    // Modes need no credential; fall back to default URLs if config is incomplete.
    let endpoints = PollerConfig::from_env()
        .map(|c| c.endpoints)
        .unwrap_or_else(|_| Endpoints::default());

    for mode in Mode::ALL {
        info!(
            mode = %mode,
            trip_updates = %format!("{}/{}", endpoints.trip_update_url, mode.path()),
            vehicle_positions = %format!("{}/{}", endpoints.vehicle_position_url, mode.path()),
            "Mode"
        );
    }
}
