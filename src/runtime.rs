use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::Settings;
use crate::events::queue::UpdateBus;
use crate::service::fetch_service::{FetchService, MeetingDataClient};
use crate::service::focus_service::{DndController, FocusService};
use crate::service::meeting_cache::MeetingCache;
use crate::service::notification_service::{MeetingEndedHook, MeetingNotifier, NotificationService};
use crate::service::response_parser::ResponseParser;
use crate::tasks::notification_loop;
use crate::tasks::refresh_loop;
use crate::tasks::task_runner::TaskRunner;

// Composition root. Owns every component and every background task handle;
// nothing lives in module-global state, and shutdown() tears all of it down.
pub struct Companion {
    pub cache: Arc<Mutex<MeetingCache>>,
    pub fetch: Arc<FetchService>,
    pub scheduler: Arc<Mutex<NotificationService>>,
    pub focus: Arc<FocusService>,
    pub updates: UpdateBus,
    pub settings: Settings,
    tasks: TaskRunner,
}

impl Companion {
    pub fn start(
        settings: Settings,
        client: Arc<dyn MeetingDataClient>,
        notifier: Arc<dyn MeetingNotifier>,
        dnd: Arc<dyn DndController>,
    ) -> Self {
        let cache = Arc::new(Mutex::new(MeetingCache::new()));
        let updates = UpdateBus::new(16);
        let parser = ResponseParser::new(settings.timezone);
        let fetch = Arc::new(FetchService::new(
            cache.clone(),
            client,
            parser,
            updates.clone(),
        ));
        let scheduler = Arc::new(Mutex::new(NotificationService::new()));
        let focus = Arc::new(FocusService::new(
            dnd,
            settings.focus_minutes,
            settings.focus_after_meetings,
        ));

        let mut tasks = TaskRunner::new();
        tasks.spawn({
            let fetch = fetch.clone();
            let interval = settings.refresh_interval_secs;
            async move {
                refresh_loop::run_refresh_loop(fetch, interval).await;
            }
        });
        tasks.spawn({
            let cache = cache.clone();
            let scheduler = scheduler.clone();
            let settings = settings.clone();
            let updates = updates.subscribe();
            let hook: Arc<dyn MeetingEndedHook> = focus.clone();
            let ended_hook = Some(hook);
            async move {
                notification_loop::run_notification_loop(
                    cache, scheduler, notifier, ended_hook, settings, updates,
                )
                .await;
            }
        });

        Self {
            cache,
            fetch,
            scheduler,
            focus,
            updates,
            settings,
            tasks,
        }
    }

    // Cancels the background loops; in-flight fetches are aborted with them.
    pub async fn shutdown(mut self) {
        self.tasks.abort_all();
        self.focus.stop().await;
    }
}
