use std::env;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_FAVICON_SERVICE_URL: &str = "https://www.google.com/s2/favicons?sz=128";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be a non-negative integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must be 'true' or 'false', got '{value}'")]
    InvalidBool { name: &'static str, value: String },
}

/// Tunables for a single resolution. Everything here is request-independent and
/// read once at startup.
#[derive(Clone, Debug)]
pub struct ResolverConfig {
    /// Shared deadline covering every attempt of one resolution.
    pub timeout: Duration,
    /// Hard cap on body bytes read per attempt.
    pub max_body_bytes: usize,
    /// Bytes still accepted after `</head>` has been seen.
    pub head_tail_bytes: usize,
    /// Prefix length requested by byte-range attempts.
    pub range_bytes: usize,
    pub favicon_service_url: String,
    pub block_private_addresses: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            timeout: Duration::from_millis(8_000),
            max_body_bytes: 500_000,
            head_tail_bytes: 32 * 1024,
            range_bytes: 64 * 1024,
            favicon_service_url: DEFAULT_FAVICON_SERVICE_URL.to_string(),
            block_private_addresses: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub is_dev: bool,
    pub resolver: ResolverConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = ResolverConfig::default();
        let resolver = ResolverConfig {
            timeout: Duration::from_millis(parse_number(
                "RESOLVE_TIMEOUT_MS",
                defaults.timeout.as_millis() as u64,
            )?),
            max_body_bytes: parse_number("MAX_BODY_BYTES", defaults.max_body_bytes as u64)?
                as usize,
            head_tail_bytes: parse_number("HEAD_TAIL_BYTES", defaults.head_tail_bytes as u64)?
                as usize,
            range_bytes: parse_number("RANGE_BYTES", defaults.range_bytes as u64)? as usize,
            favicon_service_url: env::var("FAVICON_SERVICE_URL")
                .unwrap_or(defaults.favicon_service_url),
            block_private_addresses: parse_bool(
                "BLOCK_PRIVATE_ADDRESSES",
                defaults.block_private_addresses,
            )?,
        };

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: parse_number("SERVER_PORT", 8080)?
                .try_into()
                .map_err(|_| ConfigError::InvalidNumber {
                    name: "SERVER_PORT",
                    value: env::var("SERVER_PORT").unwrap_or_default(),
                })?,
            is_dev: env::var("APP_ENV").as_deref() != Ok("production"),
            resolver,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_number(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
        Err(_) => Ok(default),
    }
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidBool { name, value }),
        },
        Err(_) => Ok(default),
    }
}
