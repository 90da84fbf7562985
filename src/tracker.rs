/* src/tracker.rs */

use crate::config::Endpoints;
use crate::error::{MonitorError, Result};
use crate::proxy::redact_credentials;
use crate::requester::{DIRECT, Requester};
use chrono::{DateTime, Local};
use fancy_log::{LogLevel, log};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::sync::Arc;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One monitored account, as listed in `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub name: String,
    pub token: String,
}

/// Payload of the position endpoint. Both fields are reported as received.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Position {
    pub behind: Number,
    #[serde(rename = "timeRemaining", default)]
    pub time_remaining: Value,
}

impl Position {
    /// The ETA as display text: strings unchanged, `null` as `unknown`.
    pub fn eta(&self) -> String {
        match &self.time_remaining {
            Value::String(s) => s.clone(),
            Value::Null => "unknown".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct PositionState {
    position: Position,
    updated_at: DateTime<Local>,
}

/// Point-in-time view of one account.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusSnapshot {
    pub name: String,
    pub behind: Number,
    pub eta: String,
    pub last_ping: String,
    pub last_update: String,
    pub proxy: String,
}

/// Polls the remote service for a single account and keeps its last-known-good state.
///
/// Position and liveness are refreshed independently. Each writes only its
/// own field group, so they never wait on each other.
pub struct AccountTracker {
    account: Account,
    requester: Arc<Requester>,
    endpoints: Arc<Endpoints>,
    position: RwLock<Option<PositionState>>,
    last_ping: RwLock<Option<DateTime<Local>>>,
    last_proxy: Mutex<String>,
}

impl StatusSnapshot {
    /// Queue depth as a sortable float.
    pub fn depth(&self) -> f64 {
        self.behind.as_f64().unwrap_or(f64::INFINITY)
    }
}

impl AccountTracker {
    pub fn new(account: Account, requester: Arc<Requester>, endpoints: Arc<Endpoints>) -> Self {
        Self {
            account,
            requester,
            endpoints,
            position: RwLock::new(None),
            last_ping: RwLock::new(None),
            last_proxy: Mutex::new(DIRECT.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        &self.account.name
    }

    async fn fetch_position(&self) -> Result<Position> {
        let body = self
            .requester
            .fetch(&self.endpoints.position, &self.account.token, &self.last_proxy)
            .await?;
        serde_json::from_value(body).map_err(|e| MonitorError::Decode(e.to_string()))
    }

    /// Fetches the queue position. Failures are logged and leave the old position in place.
    pub async fn refresh_position(&self) {
        match self.fetch_position().await {
            Ok(position) => {
                log(
                    LogLevel::Info,
                    &format!(
                        "[{}] {} ahead in queue, ETA {}",
                        self.account.name,
                        position.behind,
                        position.eta()
                    ),
                );
                *self.position.write() = Some(PositionState {
                    position,
                    updated_at: Local::now(),
                });
            }
            Err(e) => log(
                LogLevel::Error,
                &format!(
                    "[{}] Position refresh failed: {}",
                    self.account.name,
                    redact_credentials(&e.to_string())
                ),
            ),
        }
    }

    /// Pings the liveness endpoint. Failures are logged and leave the old timestamp in place.
    pub async fn refresh_liveness(&self) {
        let result = self
            .requester
            .fetch(&self.endpoints.ping, &self.account.token, &self.last_proxy)
            .await;
        match result {
            Ok(_) => {
                log(LogLevel::Debug, &format!("[{}] Ping ok", self.account.name));
                *self.last_ping.write() = Some(Local::now());
            }
            Err(e) => log(
                LogLevel::Error,
                &format!(
                    "[{}] Ping failed: {}",
                    self.account.name,
                    redact_credentials(&e.to_string())
                ),
            ),
        }
    }

    /// `None` until the first successful position fetch.
    pub fn snapshot(&self) -> Option<StatusSnapshot> {
        let state = self.position.read().clone()?;
        let last_ping = self
            .last_ping
            .read()
            .map(|t| t.format(TIME_FORMAT).to_string())
            .unwrap_or_else(|| "never".to_string());
        let proxy = self.last_proxy.lock().clone();

        Some(StatusSnapshot {
            name: self.account.name.clone(),
            eta: state.position.eta(),
            behind: state.position.behind,
            last_ping,
            last_update: state.updated_at.format(TIME_FORMAT).to_string(),
            proxy: if proxy.is_empty() {
                DIRECT.to_string()
            } else {
                proxy
            },
        })
    }
}
