//! Track Server
//!
//! HTTPS service for stored GPS activities.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                    TRACK SERVER                       │
//!                    │                                                       │
//!                    │  ┌──────────────── lifecycle ──────────────────────┐  │
//!                    │  │  ListenerSupervisor                             │  │
//!                    │  │    reclaim → probe → bind (retry + backoff)     │  │
//!                    │  │         │                                       │  │
//!                    │  │         ▼ owns                                  │  │
//!     Client  ───────┼─▶│    TlsListener ◀── weak ── ShutdownCoordinator  │  │
//!                    │  └─────────┬───────────────────────▲───────────────┘  │
//!                    │            │                       │ SIGINT/SIGTERM,  │
//!                    │            ▼                       │ panics, failed   │
//!                    │  ┌──────────────────┐              │ tasks            │
//!                    │  │ http (axum)      │    ┌───────────┴──┐              │
//!                    │  │  /gpx, /health,  │───▶│ store (JSON) │              │
//!                    │  │  static files    │    └──────────────┘              │
//!                    │  └──────────────────┘                                  │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use track_server::config::{load_config, ServerConfig};
use track_server::http::HttpServer;
use track_server::lifecycle::{
    signals, start_or_exit, ListenerSupervisor, ShutdownCoordinator, StdProcessExit, SupervisorSettings,
    EXIT_CONFIGURATION,
};
use track_server::net::{SocketReclaimer, TcpPortProbe, TlsBinder, TlsMaterial};
use track_server::observability::{self, init_logging};
use track_server::resilience::TokioSleeper;
use track_server::store::JsonFileStore;

#[derive(Parser)]
#[command(name = "track-server")]
#[command(about = "HTTPS service for stored GPS activities", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "TRACK_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listener port.
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("track-server: {e}");
            return exit_code(EXIT_CONFIGURATION);
        }
    };
    if let Some(port) = cli.port {
        config.listener.port = port;
    }

    let log_guard = match init_logging(&config.observability) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("track-server: cannot initialise logging: {e}");
            return exit_code(EXIT_CONFIGURATION);
        }
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "track-server starting");

    let exit = Arc::new(StdProcessExit::new(log_guard));
    match run(config, exit).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => exit_code(code),
    }
}

async fn run(config: ServerConfig, exit: Arc<StdProcessExit>) -> Result<(), i32> {
    tracing::info!(
        address = %config.listener.socket_addr(),
        max_retries = config.startup.max_retries,
        retry_delay_ms = config.startup.retry_delay_ms,
        close_timeout_ms = config.shutdown.close_timeout_ms,
        "Configuration loaded"
    );

    let material = TlsMaterial::load(&config.listener.tls.cert_path, &config.listener.tls.key_path)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Cannot load TLS material");
            EXIT_CONFIGURATION
        })?;

    let store = JsonFileStore::load(&config.store.data_path).map_err(|e| {
        tracing::error!(error = %e, path = %config.store.data_path.display(), "Cannot load activities");
        EXIT_CONFIGURATION
    })?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(e) => tracing::warn!(
                address = %config.observability.metrics_address,
                error = %e,
                "Invalid metrics address, metrics disabled"
            ),
        }
    }

    let close_timeout = config.shutdown.close_timeout();
    let mut supervisor = ListenerSupervisor::new(
        SupervisorSettings::from_config(&config),
        TcpPortProbe,
        SocketReclaimer::new(config.startup.settle_delay(), close_timeout, TokioSleeper),
        TlsBinder::new(material, close_timeout),
        TokioSleeper,
    );

    let coordinator = Arc::new(ShutdownCoordinator::new(
        supervisor.listener_ref(),
        Arc::clone(&exit),
        close_timeout,
    ));
    let (triggers, trigger_rx) = signals::channel();
    signals::install_panic_hook(triggers.clone());
    tokio::spawn(signals::dispatch(Arc::clone(&coordinator), trigger_rx));

    let Some(listener) = start_or_exit(&mut supervisor, &*coordinator).await else {
        // Whichever path claimed the shutdown latch ends the process.
        std::future::pending::<()>().await;
        return Ok(());
    };

    let server = HttpServer::new(&config.http, Arc::new(store));
    let serving = tokio::spawn(server.run(listener));
    signals::watch_task("https-server", serving, triggers);

    // The shutdown coordinator ends the process; the supervisor must outlive serving.
    std::future::pending::<()>().await;
    drop(supervisor);
    Ok(())
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
