use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::models::meeting::Meeting;
use crate::models::session::FocusSession;
use crate::service::notification_service::MeetingEndedHook;

// System do-not-disturb seam; the real OS automation lives outside this
// crate.
#[async_trait]
pub trait DndController: Send + Sync {
    async fn suppress(&self) -> Result<(), String>;
    async fn restore(&self) -> Result<(), String>;
}

struct FocusState {
    session: Option<FocusSession>,
    // Two timers per active session: a per-minute tick for remaining-time
    // logging and a single terminal timer for session end.
    tick_task: Option<JoinHandle<()>>,
    end_task: Option<JoinHandle<()>>,
}

impl FocusState {
    fn abort_timers(&mut self) {
        if let Some(handle) = self.tick_task.take() {
            handle.abort();
        }
        if let Some(handle) = self.end_task.take() {
            handle.abort();
        }
    }
}

pub struct FocusService {
    state: Arc<Mutex<FocusState>>,
    dnd: Arc<dyn DndController>,
    default_minutes: i64,
    start_after_meetings: bool,
}

impl FocusService {
    pub fn new(
        dnd: Arc<dyn DndController>,
        default_minutes: i64,
        start_after_meetings: bool,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(FocusState {
                session: None,
                tick_task: None,
                end_task: None,
            })),
            dnd,
            default_minutes,
            start_after_meetings,
        }
    }

    // Starts a session, implicitly terminating any active one. Prior timers
    // are aborted before the new ones are armed so an old terminal callback
    // can never fire into the new session.
    pub async fn start(&self, minutes: i64, reason: Option<String>) -> FocusSession {
        let minutes = if minutes > 0 { minutes } else { self.default_minutes };
        let session = FocusSession::new(minutes, reason, Utc::now());

        let mut state = self.state.lock().await;
        state.abort_timers();
        state.session = Some(session.clone());

        if let Err(error) = self.dnd.suppress().await {
            log::warn!("Failed to enable do-not-disturb: {}", error);
        }

        state.tick_task = Some(spawn_tick(self.state.clone(), session.id.clone()));
        state.end_task = Some(spawn_terminal(
            self.state.clone(),
            self.dnd.clone(),
            session.id.clone(),
            minutes,
        ));
        session
    }

    // Extends the active session and re-arms the terminal timer.
    pub async fn extend(&self, minutes: i64) -> Option<FocusSession> {
        let mut state = self.state.lock().await;
        let session = state.session.as_mut().filter(|s| s.is_active)?;
        session.planned_duration_minutes += minutes.max(0);
        let remaining = session.remaining_minutes(Utc::now());
        let session_id = session.id.clone();
        let snapshot = session.clone();

        if let Some(handle) = state.end_task.take() {
            handle.abort();
        }
        state.end_task = Some(spawn_terminal(
            self.state.clone(),
            self.dnd.clone(),
            session_id,
            remaining,
        ));
        Some(snapshot)
    }

    pub async fn stop(&self) -> Option<FocusSession> {
        let mut state = self.state.lock().await;
        state.abort_timers();
        // An expired session already restored notifications; stopping it
        // again must not restore twice.
        let mut session = state.session.take().filter(|s| s.is_active)?;
        session.is_active = false;
        if let Err(error) = self.dnd.restore().await {
            log::warn!("Failed to restore notifications: {}", error);
        }
        Some(session)
    }

    pub async fn current(&self) -> Option<FocusSession> {
        let state = self.state.lock().await;
        state.session.as_ref().filter(|s| s.is_active).cloned()
    }
}

fn spawn_tick(state: Arc<Mutex<FocusState>>, session_id: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(StdDuration::from_secs(60)).await;
            let state = state.lock().await;
            match state.session.as_ref().filter(|s| s.id == session_id && s.is_active) {
                Some(session) => {
                    log::info!(
                        "Focus session: {} minute(s) remaining",
                        session.remaining_minutes(Utc::now())
                    );
                }
                None => break,
            }
        }
    })
}

fn spawn_terminal(
    state: Arc<Mutex<FocusState>>,
    dnd: Arc<dyn DndController>,
    session_id: String,
    minutes: i64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(StdDuration::from_secs((minutes.max(0) as u64) * 60)).await;
        let mut state = state.lock().await;
        // A new session may have replaced this one while the timer slept.
        let matches = state
            .session
            .as_ref()
            .is_some_and(|s| s.id == session_id && s.is_active);
        if !matches {
            return;
        }
        if let Some(session) = state.session.as_mut() {
            session.is_active = false;
        }
        if let Some(handle) = state.tick_task.take() {
            handle.abort();
        }
        state.end_task = None;
        if let Err(error) = dnd.restore().await {
            log::warn!("Failed to restore notifications: {}", error);
        }
        log::info!("Focus session complete");
    })
}

#[async_trait]
impl MeetingEndedHook for FocusService {
    async fn meeting_ended(&self, meeting: &Meeting) {
        if !self.start_after_meetings {
            return;
        }
        log::info!("Meeting '{}' ended; starting focus time", meeting.title);
        self.start(
            self.default_minutes,
            Some(format!("Focus time after {}", meeting.title)),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingDnd {
        calls: std::sync::Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl DndController for RecordingDnd {
        async fn suppress(&self) -> Result<(), String> {
            self.calls.lock().unwrap().push("suppress");
            Ok(())
        }

        async fn restore(&self) -> Result<(), String> {
            self.calls.lock().unwrap().push("restore");
            Ok(())
        }
    }

    #[tokio::test]
    async fn start_suppresses_and_stop_restores() {
        let dnd = Arc::new(RecordingDnd::default());
        let service = FocusService::new(dnd.clone(), 25, false);

        let session = service.start(0, Some("deep work".to_string())).await;
        assert!(session.is_active);
        assert_eq!(session.planned_duration_minutes, 25);
        assert!(service.current().await.is_some());

        let stopped = service.stop().await.unwrap();
        assert!(!stopped.is_active);
        assert!(service.current().await.is_none());
        assert_eq!(*dnd.calls.lock().unwrap(), vec!["suppress", "restore"]);
    }

    #[tokio::test]
    async fn starting_again_replaces_the_active_session() {
        let dnd = Arc::new(RecordingDnd::default());
        let service = FocusService::new(dnd, 25, false);

        let first = service.start(10, None).await;
        let second = service.start(40, None).await;
        assert_ne!(first.id, second.id);

        let current = service.current().await.unwrap();
        assert_eq!(current.id, second.id);
        assert_eq!(current.planned_duration_minutes, 40);
    }

    #[tokio::test]
    async fn extend_adds_minutes_to_the_plan() {
        let dnd = Arc::new(RecordingDnd::default());
        let service = FocusService::new(dnd, 25, false);

        service.start(20, None).await;
        let extended = service.extend(10).await.unwrap();
        assert_eq!(extended.planned_duration_minutes, 30);
    }

    #[tokio::test]
    async fn extend_without_a_session_is_a_no_op() {
        let dnd = Arc::new(RecordingDnd::default());
        let service = FocusService::new(dnd, 25, false);
        assert!(service.extend(10).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_timer_expires_the_session_and_restores_dnd() {
        let dnd = Arc::new(RecordingDnd::default());
        let service = FocusService::new(dnd.clone(), 25, false);

        service.start(1, None).await;
        // Let the spawned timer tasks register their sleeps before advancing.
        tokio::task::yield_now().await;
        tokio::time::advance(StdDuration::from_secs(61)).await;
        // The paused clock auto-advances once all tasks are idle, so this
        // lets the terminal task run to completion.
        tokio::time::sleep(StdDuration::from_secs(1)).await;

        assert!(service.current().await.is_none());
        assert!(dnd.calls.lock().unwrap().contains(&"restore"));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_after_expiry_does_not_restore_again() {
        let dnd = Arc::new(RecordingDnd::default());
        let service = FocusService::new(dnd.clone(), 25, false);

        service.start(1, None).await;
        // Let the spawned timer tasks register their sleeps before advancing.
        tokio::task::yield_now().await;
        tokio::time::advance(StdDuration::from_secs(61)).await;
        tokio::time::sleep(StdDuration::from_secs(1)).await;

        assert!(service.stop().await.is_none());
        let calls = dnd.calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|call| **call == "restore").count(), 1);
    }

    #[tokio::test]
    async fn meeting_ended_hook_starts_focus_when_enabled() {
        let dnd = Arc::new(RecordingDnd::default());
        let service = FocusService::new(dnd, 15, true);
        let now = Utc::now();
        let meeting = Meeting::new(
            "Retro".to_string(),
            now - chrono::Duration::minutes(30),
            now - chrono::Duration::minutes(1),
            None,
            now,
        );

        service.meeting_ended(&meeting).await;
        let session = service.current().await.unwrap();
        assert_eq!(session.planned_duration_minutes, 15);
        assert!(session.reason.as_deref().unwrap().contains("Retro"));
    }

    #[tokio::test]
    async fn meeting_ended_hook_is_inert_when_disabled() {
        let dnd = Arc::new(RecordingDnd::default());
        let service = FocusService::new(dnd, 15, false);
        let now = Utc::now();
        let meeting = Meeting::new(
            "Retro".to_string(),
            now - chrono::Duration::minutes(30),
            now - chrono::Duration::minutes(1),
            None,
            now,
        );

        service.meeting_ended(&meeting).await;
        assert!(service.current().await.is_none());
    }
}
