//! student-server: serves the student registry over a line protocol.
//!
//! Features:
//! - One request line in, one response line out
//! - Bounded pool of concurrent connections with accept backpressure
//! - Graceful shutdown on Ctrl-C or SIGTERM
//! - Configuration via CLI arguments or TOML file

use student_registry::config::{Config, DEFAULT_PORT};
use student_registry::{sample, Repository, Server};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Some(raw) = &config.invalid_port {
        warn!(port = %raw, default = DEFAULT_PORT, "Invalid port number, using default");
    }

    info!(
        address = %config.listen_addr(),
        max_connections = config.max_connections,
        threads = ?config.threads,
        io_timeout = ?config.io_timeout,
        sample_data = config.sample_data,
        "Starting student server"
    );

    let mut runtime = tokio::runtime::Builder::new_multi_thread();
    if let Some(threads) = config.threads {
        runtime.worker_threads(threads);
    }
    runtime.enable_all().build()?.block_on(run(config))
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let repository = if config.sample_data {
        Repository::with_students(sample::students()?)
    } else {
        Repository::new()
    };

    let server = Server::new(&config, repository).start().await?;

    shutdown_signal().await;
    server.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
