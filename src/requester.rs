/* src/requester.rs */

use crate::error::{MonitorError, Result};
use crate::proxy::{ProxyDescriptor, ProxyRotator, redact_credentials};
use fancy_log::{LogLevel, log};
use parking_lot::Mutex;
use reqwest::{Client, header};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_secs(2);
/// Attribution recorded when a request goes out without a proxy.
pub const DIRECT: &str = "direct";

const USER_AGENT: &str = concat!("queue-watch/", env!("CARGO_PKG_VERSION"));
const NON_JSON_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: RETRY_DELAY,
        }
    }
}

/// Issues authenticated GETs through the shared proxy rotation, retrying on failure.
pub struct Requester {
    rotator: Arc<ProxyRotator>,
    policy: RetryPolicy,
    timeout: Duration,
    direct: Client,
    // One client per proxy, built on first use.
    proxied: Mutex<HashMap<String, Client>>,
}

impl Requester {
    pub fn new(rotator: Arc<ProxyRotator>, timeout: Duration) -> Result<Self> {
        let direct = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .no_proxy()
            .build()?;
        Ok(Self {
            rotator,
            policy: RetryPolicy::default(),
            timeout,
            direct,
            proxied: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn client_for(&self, proxy: Option<&ProxyDescriptor>) -> Result<Client> {
        let Some(proxy) = proxy else {
            return Ok(self.direct.clone());
        };
        if let Some(client) = self.proxied.lock().get(&proxy.raw) {
            return Ok(client.clone());
        }
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .proxy(ProxyRotator::build_transport(proxy)?)
            .build()?;
        self.proxied
            .lock()
            .insert(proxy.raw.clone(), client.clone());
        Ok(client)
    }

    /// GETs `url` with the configured attempt budget.
    ///
    /// `last_proxy` receives the label of the proxy used by each attempt
    /// (or [`DIRECT`]), whether or not the attempt succeeds.
    pub async fn fetch(&self, url: &str, token: &str, last_proxy: &Mutex<String>) -> Result<Value> {
        self.fetch_with_attempts(url, token, last_proxy, self.policy.max_attempts)
            .await
    }

    pub async fn fetch_with_attempts(
        &self,
        url: &str,
        token: &str,
        last_proxy: &Mutex<String>,
        max_attempts: u32,
    ) -> Result<Value> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let proxy = self.rotator.next();
            let via = proxy.map(|p| p.label()).unwrap_or_else(|| DIRECT.to_string());
            *last_proxy.lock() = via.clone();

            let result = match self.client_for(proxy) {
                Ok(client) => self.send_once(&client, url, token).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(body) => return Ok(body),
                Err(e) if attempt >= max_attempts => {
                    return Err(MonitorError::RequestExhausted {
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    log(
                        LogLevel::Warn,
                        &format!(
                            "Attempt {}/{} for {} via {} failed: {}. Retrying in {:?}.",
                            attempt,
                            max_attempts,
                            url,
                            via,
                            redact_credentials(&e.to_string()),
                            self.policy.delay
                        ),
                    );
                }
            }
            tokio::time::sleep(self.policy.delay).await;
            attempt += 1;
        }
    }

    async fn send_once(&self, client: &Client, url: &str, token: &str) -> Result<Value> {
        let response = client
            .get(url)
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Network(format!("{} returned {}", url, status)));
        }

        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        match serde_json::from_slice(&body) {
            Ok(value) => Ok(value),
            Err(e) => {
                // Non-JSON bodies come back as text.
                let text: String = String::from_utf8_lossy(&body)
                    .chars()
                    .take(NON_JSON_PREVIEW_CHARS)
                    .collect();
                log(
                    LogLevel::Debug,
                    &format!("{} returned a non-JSON body ({}): {}", url, e, text),
                );
                Ok(Value::String(text))
            }
        }
    }
}
