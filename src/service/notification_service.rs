use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::config::Settings;
use crate::models::meeting::{classify_status, Meeting, MeetingStatus};

const LEDGER_RETENTION_MINUTES: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Reminder,
    Starting,
}

// User-facing alert seam. Delivery is fire-and-forget: the scheduler records
// an attempt whether or not the user ever interacts with it.
#[async_trait]
pub trait MeetingNotifier: Send + Sync {
    async fn notify(&self, message: &str, join_url: Option<&str>) -> Result<(), String>;
}

// Invoked when a previously in-progress meeting is observed to have ended.
#[async_trait]
pub trait MeetingEndedHook: Send + Sync {
    async fn meeting_ended(&self, meeting: &Meeting);
}

// At most one entry per (meeting id, kind); entries age out after an hour,
// which also lets ids from superseded fetches drain away naturally.
#[derive(Debug, Default)]
pub struct SentLedger {
    entries: HashMap<(String, NotificationKind), DateTime<Utc>>,
}

impl SentLedger {
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::minutes(LEDGER_RETENTION_MINUTES);
        self.entries.retain(|_, sent_at| *sent_at >= cutoff);
    }

    pub fn already_sent(&self, meeting_id: &str, kind: NotificationKind) -> bool {
        self.entries
            .contains_key(&(meeting_id.to_string(), kind))
    }

    pub fn record(&mut self, meeting_id: &str, kind: NotificationKind, now: DateTime<Utc>) {
        self.entries
            .entry((meeting_id.to_string(), kind))
            .or_insert(now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Default)]
pub struct NotificationService {
    ledger: SentLedger,
    // Single pointer, not a set: the last meeting observed in progress.
    last_in_progress: Option<Meeting>,
}

impl NotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    // One scheduler pass over a fresh cache snapshot. Runs every 60 seconds
    // and once per cache update; both drivers call in here.
    pub async fn tick<N, H>(
        &mut self,
        meetings: &[Meeting],
        settings: &Settings,
        notifier: &N,
        ended_hook: Option<&H>,
        now: DateTime<Utc>,
    ) where
        N: MeetingNotifier + ?Sized,
        H: MeetingEndedHook + ?Sized,
    {
        self.ledger.prune(now);

        let muted = !settings.notifications_enabled || !settings.within_working_hours(now);
        if !muted {
            for meeting in meetings {
                if meeting.status == MeetingStatus::Ended {
                    continue;
                }
                let minutes_until = meeting.minutes_until_start(now);

                if meeting.status == MeetingStatus::Upcoming
                    && minutes_until > 0
                    && minutes_until <= settings.reminder_minutes
                    && !self.ledger.already_sent(&meeting.id, NotificationKind::Reminder)
                {
                    let message = format!(
                        "{} starts in {} minute{}",
                        meeting.title,
                        minutes_until,
                        if minutes_until == 1 { "" } else { "s" }
                    );
                    self.fire(notifier, meeting, NotificationKind::Reminder, &message, now)
                        .await;
                }

                if (0..=1).contains(&minutes_until)
                    && !self.ledger.already_sent(&meeting.id, NotificationKind::Starting)
                {
                    let message = format!("{} is starting now", meeting.title);
                    self.fire(notifier, meeting, NotificationKind::Starting, &message, now)
                        .await;
                }
            }
        }

        // Ended-meeting transition runs even while notifications are muted.
        let current = meetings
            .iter()
            .find(|meeting| meeting.status == MeetingStatus::InProgress)
            .cloned();
        if let Some(previous) = &self.last_in_progress {
            let changed = current
                .as_ref()
                .map_or(true, |meeting| meeting.id != previous.id);
            if changed
                && classify_status(previous.start_time, previous.end_time, now)
                    == MeetingStatus::Ended
            {
                if let Some(hook) = ended_hook {
                    hook.meeting_ended(previous).await;
                }
            }
        }
        self.last_in_progress = current;
    }

    async fn fire<N: MeetingNotifier + ?Sized>(
        &mut self,
        notifier: &N,
        meeting: &Meeting,
        kind: NotificationKind,
        message: &str,
        now: DateTime<Utc>,
    ) {
        // Recorded before the outcome is known: the contract is "attempted
        // at most once", not "acknowledged". Failures are not retried.
        self.ledger.record(&meeting.id, kind, now);
        if let Err(error) = notifier.notify(message, meeting.join_url.as_deref()).await {
            log::warn!("Notification delivery failed for '{}': {}", meeting.title, error);
        }
    }
}
