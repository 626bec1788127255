//! Configuration module
//!
//! Settings are read from the environment (optionally seeded from a `.env`
//! file). Every value has a default so a bare `stash-api` starts with a
//! `./data` root, a 14 day TTL and a 15 MB upload limit.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{BYTES_PER_MB, INDEX_FILE};

const DATA_ROOT: &str = "data";
const TTL_DAYS: i64 = 14;
const CLEANUP_INTERVAL_SECONDS: u64 = 6 * 60 * 60;
const MAX_FILE_MB: u64 = 15;
/// Upper bound for `MAX_FILE_MB` (1 TiB); keeps byte arithmetic far from overflow.
const MAX_FILE_MB_CEILING: u64 = 1024 * 1024;
const SERVER_PORT: u16 = 8080;
const DB_MAX_CONNECTIONS: u32 = 5;
const ALLOWED_HOSTS: &str = "localhost,127.0.0.1";

/// Log output format for the tracing subscriber
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub data_root: PathBuf,
    pub ttl_days: i64,
    pub cleanup_interval_secs: u64,
    pub max_file_mb: u64,
    pub server_port: u16,
    /// Host header values accepted by the HTTP layer. Empty means any host.
    pub allowed_hosts: Vec<String>,
    pub environment: String,
    pub db_max_connections: u32,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from(DATA_ROOT),
            ttl_days: TTL_DAYS,
            cleanup_interval_secs: CLEANUP_INTERVAL_SECONDS,
            max_file_mb: MAX_FILE_MB,
            server_port: SERVER_PORT,
            allowed_hosts: split_list(ALLOWED_HOSTS),
            environment: "development".to_string(),
            db_max_connections: DB_MAX_CONNECTIONS,
            log_format: LogFormat::Text,
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let config = Config {
            data_root: env::var("DATA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DATA_ROOT)),
            ttl_days: env::var("TTL_DAYS")
                .unwrap_or_else(|_| TTL_DAYS.to_string())
                .parse()
                .unwrap_or(TTL_DAYS),
            cleanup_interval_secs: env::var("CLEANUP_INTERVAL_SECONDS")
                .unwrap_or_else(|_| CLEANUP_INTERVAL_SECONDS.to_string())
                .parse()
                .unwrap_or(CLEANUP_INTERVAL_SECONDS),
            max_file_mb: env::var("MAX_FILE_MB")
                .unwrap_or_else(|_| MAX_FILE_MB.to_string())
                .parse()
                .unwrap_or(MAX_FILE_MB),
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .unwrap_or(SERVER_PORT),
            allowed_hosts: split_list(
                &env::var("ALLOWED_HOSTS").unwrap_or_else(|_| ALLOWED_HOSTS.to_string()),
            ),
            environment,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| DB_MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(DB_MAX_CONNECTIONS),
            log_format: match env::var("LOG_FORMAT")
                .unwrap_or_default()
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Text,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.ttl_days <= 0 {
            return Err(anyhow::anyhow!("TTL_DAYS must be a positive number of days"));
        }

        if self.cleanup_interval_secs == 0 {
            return Err(anyhow::anyhow!(
                "CLEANUP_INTERVAL_SECONDS must be greater than zero"
            ));
        }

        if self.max_file_mb == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_MB must be greater than zero"));
        }

        if self.max_file_mb > MAX_FILE_MB_CEILING {
            return Err(anyhow::anyhow!(
                "MAX_FILE_MB must not exceed {}",
                MAX_FILE_MB_CEILING
            ));
        }

        if self.db_max_connections == 0 {
            return Err(anyhow::anyhow!("DB_MAX_CONNECTIONS must be greater than zero"));
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_mb.saturating_mul(BYTES_PER_MB)
    }

    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.ttl_days)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Location of the SQLite metadata index inside the data root.
    pub fn index_path(&self) -> PathBuf {
        self.data_root.join(INDEX_FILE)
    }
}
