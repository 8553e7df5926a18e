//! Configuration for the server and client binaries.
//!
//! The server supports both command-line arguments and a TOML configuration
//! file; CLI arguments take precedence over config file values. The client
//! is configured from the command line only.
//!
//! Ports are taken as text so that an unparsable value can fall back to the
//! default with a warning instead of aborting startup.

use crate::error::ConfigError;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Port used when none, or an invalid one, is given
pub const DEFAULT_PORT: u16 = 8080;

/// Command-line arguments for the student server
#[derive(Parser, Debug)]
#[command(name = "student-server")]
#[command(version)]
#[command(about = "Serves the student registry over TCP", long_about = None)]
pub struct ServerArgs {
    /// Port to listen on
    pub port: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Maximum number of connections served at once
    #[arg(short = 'w', long)]
    pub max_connections: Option<u32>,

    /// Number of runtime worker threads (defaults to number of CPU cores)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Per read/write timeout in seconds (0 = no timeout)
    #[arg(long)]
    pub io_timeout: Option<u64>,

    /// Start with an empty registry instead of the sample students
    #[arg(long)]
    pub empty: bool,

    /// Log level (trace, debug, info, warn, error) [default: info]
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    pub threads: Option<usize>,
    #[serde(default = "default_io_timeout")]
    pub io_timeout: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
            threads: None,
            io_timeout: default_io_timeout(),
        }
    }
}

/// Storage-related configuration
#[derive(Debug, Deserialize)]
pub struct StorageSection {
    /// Load the sample students at startup
    #[serde(default = "default_sample_data")]
    pub sample_data: bool,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            sample_data: default_sample_data(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_connections() -> u32 {
    10
}

fn default_io_timeout() -> u64 {
    300
}

fn default_sample_data() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    pub threads: Option<usize>,
    pub io_timeout: Option<Duration>,
    pub sample_data: bool,
    pub log_level: String,
    /// Port text that could not be parsed, if any
    pub invalid_port: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config::merge(ServerArgs::default_args(), TomlConfig::default())
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(ServerArgs::parse())
    }

    pub fn from_args(cli: ServerArgs) -> Result<Self, ConfigError> {
        let toml_config = match cli.config {
            Some(ref path) => read_toml(path)?,
            None => TomlConfig::default(),
        };

        let config = Self::merge(cli, toml_config);
        if config.max_connections == 0 {
            return Err(ConfigError::ZeroConnections);
        }
        Ok(config)
    }

    fn merge(cli: ServerArgs, toml_config: TomlConfig) -> Self {
        let (port, invalid_port) = match cli.port.as_deref() {
            Some(raw) => parse_port(raw, toml_config.server.port),
            None => (toml_config.server.port, None),
        };
        let io_timeout = cli.io_timeout.unwrap_or(toml_config.server.io_timeout);

        Config {
            host: cli.host.unwrap_or(toml_config.server.host),
            port,
            max_connections: cli
                .max_connections
                .unwrap_or(toml_config.server.max_connections),
            threads: cli.threads.or(toml_config.server.threads),
            io_timeout: (io_timeout > 0).then(|| Duration::from_secs(io_timeout)),
            sample_data: !cli.empty && toml_config.storage.sample_data,
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
            invalid_port,
        }
    }

    /// `host:port`, bracketing IPv6 literals
    pub fn listen_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl ServerArgs {
    fn default_args() -> Self {
        ServerArgs {
            port: None,
            config: None,
            host: None,
            max_connections: None,
            threads: None,
            io_timeout: None,
            empty: false,
            log_level: None,
        }
    }
}

fn read_toml(path: &PathBuf) -> Result<TomlConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
        path: path.clone(),
        source,
    })
}

/// Parse a port, falling back to `default` and returning the rejected text.
pub fn parse_port(raw: &str, default: u16) -> (u16, Option<String>) {
    match raw.trim().parse::<u16>() {
        Ok(port) => (port, None),
        Err(_) => (default, Some(raw.to_string())),
    }
}

/// Command-line arguments for the student client
#[derive(Parser, Debug)]
#[command(name = "student-client")]
#[command(version)]
#[command(about = "Interactive client for the student registry", long_about = None)]
pub struct ClientArgs {
    /// Server host
    #[arg(default_value = "localhost")]
    pub host: String,

    /// Server port
    pub port: Option<String>,

    /// Connect and response timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Resolved client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    pub log_level: String,
    /// Port text that could not be parsed, if any
    pub invalid_port: Option<String>,
}

impl ClientConfig {
    pub fn load() -> Self {
        Self::from(ClientArgs::parse())
    }
}

impl From<ClientArgs> for ClientConfig {
    fn from(args: ClientArgs) -> Self {
        let (port, invalid_port) = match args.port.as_deref() {
            Some(raw) => parse_port(raw, DEFAULT_PORT),
            None => (DEFAULT_PORT, None),
        };
        ClientConfig {
            host: args.host,
            port,
            timeout: Duration::from_secs(args.timeout),
            log_level: args.log_level,
            invalid_port,
        }
    }
}
