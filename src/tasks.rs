/* src/tasks.rs */

use crate::{notify, report, state::AppState};
use chrono::Local;
use fancy_log::{LogLevel, log};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Runs `job` every `period`, starting immediately.
///
/// An invocation always finishes before the next one starts; ticks missed
/// while it runs are dropped.
fn spawn_periodic<F, Fut>(period: Duration, delay_first: bool, job: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        if delay_first {
            interval.tick().await;
        }
        loop {
            interval.tick().await;
            job().await;
        }
    })
}

/// Spawns the position and liveness pollers for every account plus the report task.
pub fn spawn_monitor_tasks(app_state: AppState) -> Vec<JoinHandle<()>> {
    let poll_interval = app_state.config.poll_interval;
    let report_interval = app_state.config.report_interval;
    let mut handles = Vec::with_capacity(app_state.trackers.len() * 2 + 1);

    for tracker in app_state.trackers.iter() {
        let t = tracker.clone();
        handles.push(spawn_periodic(poll_interval, false, move || {
            let t = t.clone();
            async move { t.refresh_position().await }
        }));

        let t = tracker.clone();
        handles.push(spawn_periodic(poll_interval, false, move || {
            let t = t.clone();
            async move { t.refresh_liveness().await }
        }));
    }
    log(
        LogLevel::Info,
        &format!(
            "Polling {} accounts every {:?}",
            app_state.trackers.len(),
            poll_interval
        ),
    );

    let state = app_state.clone();
    handles.push(spawn_periodic(report_interval, true, move || {
        let state = state.clone();
        async move {
            send_report(&state).await;
        }
    }));
    log(
        LogLevel::Info,
        &format!("Status report scheduled every {:?}", report_interval),
    );

    *app_state.task_running.write() = true;
    handles
}

pub fn startup_message(account_count: usize) -> String {
    format!(
        "🚀 <b>Queue monitor started</b>\nTracking {} accounts.",
        account_count
    )
}

/// Sends the one-time startup notice. Call after the tasks are spawned.
pub async fn announce_startup(app_state: &AppState) {
    let message = startup_message(app_state.trackers.len());
    notify::deliver(app_state.notifier.as_ref(), &message).await;
}

/// Builds and sends one aggregate report. Returns whether a message went out.
pub async fn send_report(app_state: &AppState) -> bool {
    let Some(message) = report::build_report(&app_state.trackers, Local::now()) else {
        log(
            LogLevel::Debug,
            "No account has a position yet, skipping report.",
        );
        return false;
    };
    log(LogLevel::Debug, "Sending status report...");
    notify::deliver(app_state.notifier.as_ref(), &message).await;
    true
}
