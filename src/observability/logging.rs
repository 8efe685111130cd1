//! Structured logging.
//!
//! Console output plus three daily-rolling JSON files under the log directory:
//! `combined.log` (everything the filter lets through), `error.log` (errors
//! only) and `access.log` (the HTTP trace layer).

use std::io;
use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::{LogFormat, ObservabilityConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps the non-blocking file writers flushing; hold it until exit.
#[derive(Debug, Default)]
pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Calling this twice
/// keeps the first subscriber.
pub fn init_logging(config: &ObservabilityConfig) -> io::Result<LoggingGuard> {
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guards = Vec::new();

    let console: BoxedLayer = match config.format {
        LogFormat::Pretty => fmt::layer().with_target(true).boxed(),
        LogFormat::Json => fmt::layer().json().with_target(false).boxed(),
    };
    layers.push(console.with_filter(env_filter(&config.log_level)).boxed());

    if !config.log_dir.as_os_str().is_empty() {
        let dir = config.log_dir.as_path();
        std::fs::create_dir_all(dir)?;

        let (combined, guard) = file_writer(dir, "combined.log");
        guards.push(guard);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(combined)
                .with_filter(env_filter(&config.log_level))
                .boxed(),
        );

        let (errors, guard) = file_writer(dir, "error.log");
        guards.push(guard);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(errors)
                .with_filter(LevelFilter::ERROR)
                .boxed(),
        );

        let (access, guard) = file_writer(dir, "access.log");
        guards.push(guard);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(access)
                .with_filter(Targets::new().with_target("tower_http::trace", Level::DEBUG))
                .boxed(),
        );
    }

    if tracing_subscriber::registry().with(layers).try_init().is_err() {
        eprintln!("tracing subscriber already installed; keeping the existing one");
    }

    tracing::info!(
        log_level = %config.log_level,
        log_dir = %config.log_dir.display(),
        format = ?config.format,
        "Logging initialised"
    );

    Ok(LoggingGuard { _guards: guards })
}

fn file_writer(dir: &Path, name: &str) -> (tracing_appender::non_blocking::NonBlocking, WorkerGuard) {
    tracing_appender::non_blocking(rolling::daily(dir, name))
}

/// Filter from `RUST_LOG`, else this crate and tower-http at `level`.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

fn default_directives(level: &str) -> String {
    format!("track_server={level},tower_http={level}")
}
