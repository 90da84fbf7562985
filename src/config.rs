/* src/config.rs */

use crate::error::{MonitorError, Result};
use crate::requester::{DEFAULT_MAX_ATTEMPTS, RETRY_DELAY, RetryPolicy};
use crate::tracker::Account;
use fancy_log::LogLevel;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

// --- Main Application Configuration ---
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log_level: LogLevel,
    pub poll_interval: Duration,
    pub report_interval: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub dir_path: PathBuf,
    pub bind_port: u16,
}

fn env_secs(key: &str, default: u64) -> Duration {
    let secs = env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|s| *s > 0)
        .unwrap_or(default);
    Duration::from_secs(secs)
}

impl AppConfig {
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        let log_level_str = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_level = match log_level_str.to_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        };

        let dir_path_str = env::var("DIR_PATH").unwrap_or_else(|_| "~/queue-watch".to_string());
        let dir_path = PathBuf::from(shellexpand::tilde(&dir_path_str).into_owned());

        let bind_port = env::var("BIND_PORT")
            .unwrap_or_else(|_| "33302".to_string())
            .parse::<u16>()
            .unwrap_or(33302);

        Self {
            log_level,
            poll_interval: env_secs("POLL_INTERVAL_SECS", 10),
            report_interval: env_secs("REPORT_INTERVAL_SECS", 60),
            request_timeout: env_secs("REQUEST_TIMEOUT_SECS", 30),
            retry: RetryPolicy {
                max_attempts: env::var("RETRY_ATTEMPTS")
                    .ok()
                    .and_then(|v| v.trim().parse::<u32>().ok())
                    .filter(|n| *n > 0)
                    .unwrap_or(DEFAULT_MAX_ATTEMPTS),
                delay: env_secs("RETRY_DELAY_SECS", RETRY_DELAY.as_secs()),
            },
            dir_path,
            bind_port,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir_path.join("config.toml")
    }

    pub fn proxies_path(&self) -> PathBuf {
        self.dir_path.join("proxies.txt")
    }
}

// --- TOML Configuration Structs ---

/// Remote endpoints polled for every account.
#[derive(Deserialize, Debug, Clone)]
pub struct Endpoints {
    pub position: String,
    pub ping: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Chat id or `@channel` handle.
    pub chat_id: String,
    /// Self-hosted Bot API server; defaults to api.telegram.org.
    #[serde(default)]
    pub api_base: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct MonitorConfig {
    pub endpoints: Endpoints,
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl MonitorConfig {
    fn validate(&self) -> Result<()> {
        for (key, url) in [
            ("endpoints.position", &self.endpoints.position),
            ("endpoints.ping", &self.endpoints.ping),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(MonitorError::Config(format!(
                    "{} must be an http(s) URL, got '{}'",
                    key, url
                )));
            }
        }

        if self.accounts.is_empty() {
            return Err(MonitorError::Config("no [[accounts]] configured".into()));
        }
        let mut seen = HashSet::new();
        for (idx, account) in self.accounts.iter().enumerate() {
            if account.name.trim().is_empty() {
                return Err(MonitorError::Config(format!(
                    "account #{} has an empty name",
                    idx + 1
                )));
            }
            if account.token.trim().is_empty() {
                return Err(MonitorError::Config(format!(
                    "account '{}' has an empty token",
                    account.name
                )));
            }
            if !seen.insert(account.name.as_str()) {
                return Err(MonitorError::Config(format!(
                    "duplicate account name '{}'",
                    account.name
                )));
            }
        }
        Ok(())
    }
}

pub fn parse_monitor_config(content: &str) -> Result<MonitorConfig> {
    let config: MonitorConfig =
        toml::from_str(content).map_err(|e| MonitorError::Config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Reads and validates config.toml. Any problem here is fatal.
pub async fn load_monitor_config(path: &Path) -> Result<MonitorConfig> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| MonitorError::Config(format!("cannot read {:?}: {}", path, e)))?;
    parse_monitor_config(&content)
}
