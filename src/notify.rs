/* src/notify.rs */

use crate::config::TelegramConfig;
use crate::error::{MonitorError, Result};
use async_trait::async_trait;
use fancy_log::{LogLevel, log};
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Somewhere to deliver formatted status messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
}

/// Sends HTML messages through the Telegram Bot API.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            api_base: config
                .api_base
                .as_deref()
                .unwrap_or(TELEGRAM_API)
                .trim_end_matches('/')
                .to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": message,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            }))
            .send()
            .await
            // The bot token is part of the URL; keep it out of the error text.
            .map_err(|e| MonitorError::Notification(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MonitorError::Notification(format!(
                "Telegram returned {} for a {}-character message: {}",
                status,
                message.chars().count(),
                body
            )));
        }
        Ok(())
    }
}

/// Used when no sink is configured: messages only go to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        log(LogLevel::Info, &format!("Notification:\n{}", message));
        Ok(())
    }
}

pub fn from_config(telegram: Option<&TelegramConfig>) -> Result<Arc<dyn Notifier>> {
    match telegram {
        Some(cfg) => {
            log(
                LogLevel::Info,
                &format!("Reports will be sent to Telegram chat {}", cfg.chat_id),
            );
            Ok(Arc::new(TelegramNotifier::new(cfg)?))
        }
        None => {
            log(
                LogLevel::Warn,
                "No [telegram] section configured. Reports will only be logged.",
            );
            Ok(Arc::new(LogNotifier))
        }
    }
}

/// Sends and logs the outcome. Never fails.
pub async fn deliver(notifier: &dyn Notifier, message: &str) {
    if let Err(e) = notifier.send(message).await {
        log(LogLevel::Error, &format!("Failed to send notification: {}", e));
    }
}

/// Like [`deliver`] but gives up after `limit`, for shutdown paths.
pub async fn deliver_within(notifier: &dyn Notifier, message: &str, limit: Duration) {
    if tokio::time::timeout(limit, deliver(notifier, message))
        .await
        .is_err()
    {
        log(
            LogLevel::Warn,
            &format!("Notification not delivered within {:?}, giving up.", limit),
        );
    }
}

/// Escapes text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
