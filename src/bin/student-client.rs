//! student-client: interactive client for the student registry.

use student_registry::client::{run_interactive, Client};
use student_registry::config::{ClientConfig, DEFAULT_PORT};
use tokio::io::BufReader;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::load();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Some(raw) = &config.invalid_port {
        warn!(port = %raw, default = DEFAULT_PORT, "Invalid port number, using default");
    }

    let client = Client::from_config(&config);
    run_interactive(&client, BufReader::new(tokio::io::stdin())).await?;
    Ok(())
}
