use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeetingStatus {
    Upcoming,
    InProgress,
    Ended,
}

// Boundary policy: an instant equal to start or end counts as InProgress.
// "Starting now" detection depends on this, so keep the comparisons strict.
pub fn classify_status(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> MeetingStatus {
    if now < start {
        MeetingStatus::Upcoming
    } else if now > end {
        MeetingStatus::Ended
    } else {
        MeetingStatus::InProgress
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Meeting {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub join_url: Option<String>,
    pub status: MeetingStatus,
}

impl Meeting {
    // Ids are scoped to a single parse call; callers must not rely on them
    // being stable across refetches.
    pub fn new(
        title: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        join_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            start_time,
            end_time,
            join_url,
            status: classify_status(start_time, end_time, now),
        }
    }

    pub fn duration_minutes(&self) -> i64 {
        let millis = (self.end_time - self.start_time).num_milliseconds();
        (millis as f64 / 60_000.0).round() as i64
    }

    pub fn is_online(&self) -> bool {
        self.join_url.as_deref().is_some_and(|url| !url.is_empty())
    }

    pub fn with_status(&self, now: DateTime<Utc>) -> Meeting {
        let mut meeting = self.clone();
        meeting.status = classify_status(self.start_time, self.end_time, now);
        meeting
    }

    pub fn minutes_until_start(&self, now: DateTime<Utc>) -> i64 {
        let millis = (self.start_time - now).num_milliseconds();
        (millis as f64 / 60_000.0).round() as i64
    }
}
