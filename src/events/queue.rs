use tokio::sync::broadcast;

use crate::models::meeting::Meeting;
use crate::service::fetch_service::FetchError;
use crate::service::meeting_cache::LookupWindow;

// Published after every fetch attempt, success or failure, carrying the
// current (possibly stale) snapshot so subscribers can always clear a
// loading state.
#[derive(Debug, Clone)]
pub struct CacheUpdate {
    pub window: LookupWindow,
    pub meetings: Vec<Meeting>,
    pub error: Option<FetchError>,
}

#[derive(Clone)]
pub struct UpdateBus {
    tx: broadcast::Sender<CacheUpdate>,
}

impl UpdateBus {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheUpdate> {
        self.tx.subscribe()
    }

    pub fn publish(&self, update: CacheUpdate) {
        // Nobody listening is fine.
        let _ = self.tx.send(update);
    }
}
