use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;

use crate::service::fetch_service::FetchService;
use crate::service::meeting_cache::LookupWindow;

// Background refresh cadence, independent of the notification tick. Each
// window is fetched on every cycle; failures are already classified and
// cached by the fetch service, so the loop just keeps going.
pub async fn run_refresh_loop(fetch: Arc<FetchService>, interval_secs: u64) {
    loop {
        for window in LookupWindow::ALL {
            if let Err(error) = fetch.fetch(window, Utc::now()).await {
                log::debug!("Background refresh ({}) failed: {}", window.label(), error);
            }
        }
        sleep(Duration::from_secs(interval_secs.max(1))).await;
    }
}
