/* src/main.rs */

use fancy_log::{LogLevel, log, set_log_level};
use lazy_motd::lazy_motd;
use std::time::Duration;

mod config;
mod error;
mod handlers;
mod init;
mod notify;
mod proxy;
mod report;
mod requester;
mod response;
mod server;
mod state;
mod tasks;
mod tracker;

// Upper bound for the final message on the way out.
const EXIT_NOTICE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // --- Initialization ---
    let config = config::AppConfig::load();
    set_log_level(config.log_level);
    lazy_motd!();

    // --- First-time setup check ---
    let is_first_run = init::initialize_app(&config).await?;
    if is_first_run {
        log(
            LogLevel::Info,
            "First-time setup complete. Please edit the configuration files and restart.",
        );
        log(
            LogLevel::Info,
            &format!("Configuration directory: {:?}", config.dir_path),
        );
        return Ok(());
    }

    // --- Load accounts, proxies and the notification sink ---
    let app_state = match state::AppState::bootstrap(config).await {
        Ok(s) => s,
        Err(e) => {
            log(LogLevel::Error, &format!("Startup aborted: {}", e));
            return Err(e.into());
        }
    };
    log(
        LogLevel::Info,
        &format!(
            "Configuration loaded for {} accounts. Starting tasks...",
            app_state.trackers.len()
        ),
    );

    // Spawn background tasks
    tasks::spawn_monitor_tasks(app_state.clone());
    let announcing = app_state.clone();
    tokio::spawn(async move { tasks::announce_startup(&announcing).await });

    // The status API runs alongside; losing it does not stop monitoring.
    server::spawn_server(app_state.clone());

    server::shutdown_signal().await;
    notify::deliver_within(
        app_state.notifier.as_ref(),
        "🛑 <b>Queue monitor stopped</b>",
        EXIT_NOTICE_TIMEOUT,
    )
    .await;
    log(LogLevel::Info, "Application has shut down gracefully.");
    Ok(())
}
