/* src/server.rs */

use crate::{handlers, notify, state::AppState};
use axum::{Router, routing::get};
use fancy_log::{LogLevel, log};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;

/// Runs the status API in its own task.
///
/// A failure (port taken, serve error) is logged and reported to the sink;
/// the pollers and the report task keep running without the API.
pub fn spawn_server(state: AppState) -> JoinHandle<()> {
    let notifier = state.notifier.clone();
    tokio::spawn(async move {
        let Err(e) = run_server(state).await else {
            return;
        };
        let reason = e.to_string();
        log(LogLevel::Error, &format!("Status server failed: {}", reason));
        notify::deliver(
            notifier.as_ref(),
            &format!(
                "⚠️ <b>Status API failed</b>\n{}\nMonitoring continues.",
                notify::escape_html(&reason)
            ),
        )
        .await;
    })
}

/// Creates the Axum router and serves the status API. Ends with the runtime
/// when `main` returns after a shutdown signal.
async fn run_server(state: AppState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let bind_port = state.config.bind_port;
    let app = Router::new()
        .route("/v1/task", get(handlers::get_task_status))
        .route("/v1/status", get(handlers::get_status))
        .route("/v1/status/{name}", get(handlers::get_account_status))
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], bind_port));
    let listener = TcpListener::bind(&addr).await?;

    log(
        LogLevel::Info,
        &format!("Status API listening on: http://{}", addr),
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Listens for shutdown signals (Ctrl+C, SIGTERM)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log(
                LogLevel::Error,
                &format!("Failed to listen for Ctrl+C: {}", e),
            );
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log(
                    LogLevel::Error,
                    &format!("Failed to install SIGTERM handler: {}", e),
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log(
        LogLevel::Warn,
        "Signal received, starting graceful shutdown...",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::RecordingNotifier;
    use crate::state::testing::monitored_state;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn occupied_port_leaves_monitoring_running() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/position"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"behind": 1, "timeRemaining": "1m"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let mut state = monitored_state(
            &server.uri(),
            &["a"],
            Duration::from_millis(50),
            Duration::from_secs(3600),
            notifier.clone(),
        );
        let mut config = (*state.config).clone();
        config.bind_port = taken.local_addr().unwrap().port();
        state.config = Arc::new(config);

        let handles = crate::tasks::spawn_monitor_tasks(state.clone());
        tokio::time::timeout(Duration::from_secs(5), spawn_server(state.clone()))
            .await
            .expect("server task ends on bind failure")
            .unwrap();

        {
            let messages = notifier.messages.lock();
            assert_eq!(messages.len(), 1);
            assert!(messages[0].contains("Status API failed"));
        }

        let before = server.received_requests().await.unwrap().len();
        tokio::time::sleep(Duration::from_millis(250)).await;
        let after = server.received_requests().await.unwrap().len();
        assert!(handles.iter().all(|h| !h.is_finished()));
        assert!(after > before, "pollers stopped after the server failed");
        assert!(state.trackers[0].snapshot().is_some());

        for h in &handles {
            h.abort();
        }
        drop(taken);
    }
}
