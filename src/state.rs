/* src/state.rs */

use crate::config::{self, AppConfig};
use crate::error::Result;
use crate::notify::{self, Notifier};
use crate::proxy::ProxyRotator;
use crate::requester::Requester;
use crate::tracker::AccountTracker;
use parking_lot::RwLock;
use std::sync::Arc;

/// The global, thread-safe state for the entire application.
#[derive(Clone)]
pub struct AppState {
    // The loaded application config, shared across all tasks.
    pub config: Arc<AppConfig>,
    // Tracks whether the periodic polling tasks are active.
    pub task_running: Arc<RwLock<bool>>,
    // One tracker per configured account, in config order.
    pub trackers: Arc<Vec<Arc<AccountTracker>>>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        trackers: Vec<Arc<AccountTracker>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            task_running: Arc::new(RwLock::new(false)),
            trackers: Arc::new(trackers),
            notifier,
        }
    }

    /// Loads every config source and builds the trackers.
    ///
    /// Fails only when config.toml is unreadable or invalid; a missing proxy
    /// list just means direct connections.
    pub async fn bootstrap(config: AppConfig) -> Result<Self> {
        let rotator = Arc::new(ProxyRotator::from_file(&config.proxies_path()).await);
        let monitor = config::load_monitor_config(&config.config_path()).await?;
        let notifier = notify::from_config(monitor.telegram.as_ref())?;

        let requester =
            Arc::new(Requester::new(rotator, config.request_timeout)?.with_policy(config.retry));
        let endpoints = Arc::new(monitor.endpoints);
        let trackers = monitor
            .accounts
            .into_iter()
            .map(|account| {
                Arc::new(AccountTracker::new(
                    account,
                    requester.clone(),
                    endpoints.clone(),
                ))
            })
            .collect();

        Ok(Self::new(config, trackers, notifier))
    }
}
