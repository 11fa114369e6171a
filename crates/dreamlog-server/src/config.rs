//! Server configuration
//!
//! CLI flags win; every flag falls back to a `DREAMLOG_*` environment variable.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use dreamlog_core::{DEFAULT_DB_FILE, HttpGeneratorConfig, RateLimitConfig};

pub const DEFAULT_PORT: u16 = 3940;
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Dreamlog HTTP server
#[derive(Debug, Default, Parser)]
#[command(name = "dreamlog-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Dream journal backend: rate-limited conversations, rolling summaries, interpretations")]
pub struct Cli {
    /// Directory holding the database [env: DREAMLOG_DATA_DIR]
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Listen address [env: DREAMLOG_HOST, default 127.0.0.1]
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port [env: DREAMLOG_PORT, default 3940]
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Text generation endpoint [env: DREAMLOG_LLM_URL]
    #[arg(long)]
    pub llm_url: Option<String>,

    /// Model name sent to the text generation endpoint [env: DREAMLOG_LLM_MODEL]
    #[arg(long)]
    pub llm_model: Option<String>,

    /// Requests per window for conversation turns [env: DREAMLOG_RATE_LIMIT_MAX]
    #[arg(long)]
    pub rate_limit_max: Option<u32>,

    /// Window length in milliseconds [env: DREAMLOG_RATE_LIMIT_WINDOW_MS]
    #[arg(long)]
    pub rate_limit_window_ms: Option<u64>,

    /// Log as JSON lines [env: DREAMLOG_LOG_JSON]
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required (flag or environment variable)")]
    Missing(&'static str),
    #[error("invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `None` uses the platform data directory
    pub db_path: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub llm: HttpGeneratorConfig,
    pub rate_limit: RateLimitConfig,
    pub log_json: bool,
}

impl ServerConfig {
    /// Merge CLI flags with the process environment
    pub fn from_env(cli: Cli) -> Result<Self, ConfigError> {
        Self::resolve(cli, |name| std::env::var(name).ok())
    }

    /// Merge CLI flags with variables looked up through `env`
    pub fn resolve<F>(cli: Cli, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let data_dir = cli
            .data_dir
            .or_else(|| lookup("DREAMLOG_DATA_DIR").map(PathBuf::from));

        let port = flag_or_var(cli.port, &lookup, "DREAMLOG_PORT")?.unwrap_or(DEFAULT_PORT);

        let endpoint = cli
            .llm_url
            .or_else(|| lookup("DREAMLOG_LLM_URL"))
            .ok_or(ConfigError::Missing("DREAMLOG_LLM_URL"))?;
        let mut llm = HttpGeneratorConfig::new(endpoint);
        llm.api_key = lookup("DREAMLOG_LLM_API_KEY");
        llm.model = cli.llm_model.or_else(|| lookup("DREAMLOG_LLM_MODEL"));

        let mut rate_limit = RateLimitConfig::default();
        if let Some(max) = flag_or_var(cli.rate_limit_max, &lookup, "DREAMLOG_RATE_LIMIT_MAX")? {
            rate_limit.default_max_requests = max;
        }
        if let Some(window) = flag_or_var(
            cli.rate_limit_window_ms,
            &lookup,
            "DREAMLOG_RATE_LIMIT_WINDOW_MS",
        )? {
            if window == 0 {
                return Err(ConfigError::Invalid {
                    name: "DREAMLOG_RATE_LIMIT_WINDOW_MS",
                    value: window.to_string(),
                });
            }
            rate_limit.default_window_ms = window;
        }

        let log_json = cli.log_json
            || lookup("DREAMLOG_LOG_JSON")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false);

        Ok(Self {
            db_path: data_dir.map(|dir| dir.join(DEFAULT_DB_FILE)),
            host: cli
                .host
                .or_else(|| lookup("DREAMLOG_HOST"))
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            llm,
            rate_limit,
            log_json,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::Invalid {
                name: "DREAMLOG_HOST",
                value: self.host.clone(),
            })
    }
}

/// The flag if given, otherwise the parsed environment variable
fn flag_or_var<T, F>(flag: Option<T>, lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    if flag.is_some() {
        return Ok(flag);
    }
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(None),
    }
}
