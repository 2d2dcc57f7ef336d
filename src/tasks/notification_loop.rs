use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::config::Settings;
use crate::events::queue::CacheUpdate;
use crate::service::meeting_cache::{LookupWindow, MeetingCache};
use crate::service::notification_service::{
    MeetingEndedHook, MeetingNotifier, NotificationService,
};

const TICK_SECS: u64 = 60;

// Drives the scheduler on a fixed 60-second cadence and once per cache
// update. Status depends purely on wall-clock time, so the timer tick keeps
// notifications flowing even when no fetch has happened.
pub async fn run_notification_loop(
    cache: Arc<Mutex<MeetingCache>>,
    scheduler: Arc<Mutex<NotificationService>>,
    notifier: Arc<dyn MeetingNotifier>,
    ended_hook: Option<Arc<dyn MeetingEndedHook>>,
    settings: Settings,
    mut updates: Receiver<CacheUpdate>,
) {
    loop {
        tokio::select! {
            _ = sleep(Duration::from_secs(TICK_SECS)) => {}
            received = updates.recv() => {
                match received {
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => {
                        // No more publishers; fall back to timer-only ticks.
                        sleep(Duration::from_secs(TICK_SECS)).await;
                    }
                }
            }
        }

        let now = Utc::now();
        let snapshot = {
            let cache = cache.lock().await;
            cache.get_all(LookupWindow::Today, now)
        };
        let mut scheduler = scheduler.lock().await;
        scheduler
            .tick(
                &snapshot,
                &settings,
                notifier.as_ref(),
                ended_hook.as_deref(),
                now,
            )
            .await;
    }
}
