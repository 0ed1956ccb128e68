//! Background scheduled tasks for the application.
//!
//! Two recurring jobs: the lesson status sweep and the weekly-series
//! extension. Both are stateless and idempotent, so a crashed or timed-out
//! run is simply retried on the next tick. Call `spawn_all` once during
//! startup to launch them.

use crate::config::SchedulerConfig;
use crate::services::{RecurringService, StatusService};
use chrono::Utc;
use std::time::Duration;

/// Spawn all background tasks.
///
/// Notes
/// - Each run is wrapped in a timeout so a stuck database call cannot stall
///   the loop forever.
/// - This function detaches tasks via `tokio::spawn`; it does not block.
pub fn spawn_all(
    status_service: StatusService,
    recurring_service: RecurringService,
    config: SchedulerConfig,
) {
    let timeout = Duration::from_secs(config.task_timeout_secs);

    // 课程状态扫描（每分钟）
    {
        let svc = status_service.clone();
        let interval = Duration::from_secs(config.sweep_interval_secs);
        tokio::spawn(async move {
            loop {
                match tokio::time::timeout(timeout, svc.sweep(Utc::now(), None)).await {
                    Ok(Ok(outcome)) if outcome.started > 0 || outcome.completed > 0 => {
                        log::debug!(
                            "Status sweep finished: {} started, {} completed",
                            outcome.started,
                            outcome.completed
                        );
                    }
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => log::error!("Status sweep failed: {e:?}"),
                    Err(_) => log::error!("Status sweep timed out after {timeout:?}"),
                }
                tokio::time::sleep(interval).await;
            }
        });
    }

    // 规律课程向 3 个月滚动窗口补课（每天一次）
    {
        let svc = recurring_service.clone();
        let interval = Duration::from_secs(config.extension_interval_secs);
        tokio::spawn(async move {
            loop {
                match tokio::time::timeout(timeout, svc.extend_series(Utc::now())).await {
                    Ok(Ok(n)) if n > 0 => log::info!("Recurring series extended: {n} lessons"),
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => log::error!("Failed to extend recurring series: {e:?}"),
                    Err(_) => log::error!("Series extension timed out after {timeout:?}"),
                }
                tokio::time::sleep(interval).await;
            }
        });
    }
}
