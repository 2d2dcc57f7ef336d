use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_FOCUS_MINUTES: i64 = 25;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FocusSession {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub planned_duration_minutes: i64,
    pub is_active: bool,
    pub reason: Option<String>,
}

impl FocusSession {
    pub fn new(planned_duration_minutes: i64, reason: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            start_time: now,
            planned_duration_minutes,
            is_active: true,
            reason,
        }
    }

    // Remaining time is derived on read, never stored.
    pub fn remaining_minutes(&self, now: DateTime<Utc>) -> i64 {
        if !self.is_active {
            return 0;
        }
        let elapsed = (now - self.start_time).num_minutes();
        (self.planned_duration_minutes - elapsed).max(0)
    }
}
