use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::meeting::{Meeting, MeetingStatus};
use crate::service::fetch_service::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupWindow {
    Today,
    Tomorrow,
    Week,
}

impl LookupWindow {
    pub const ALL: [LookupWindow; 3] = [
        LookupWindow::Today,
        LookupWindow::Tomorrow,
        LookupWindow::Week,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LookupWindow::Today => "today",
            LookupWindow::Tomorrow => "tomorrow",
            LookupWindow::Week => "week",
        }
    }
}

#[derive(Debug, Default)]
struct WindowState {
    meetings: Vec<Meeting>,
    last_refresh: Option<DateTime<Utc>>,
    last_error: Option<FetchError>,
    // Generation counters for the supersession guard: a completed fetch only
    // applies if no later-initiated fetch for this window already did.
    last_started: u64,
    last_applied: u64,
}

#[derive(Debug, Default)]
pub struct MeetingCache {
    windows: HashMap<LookupWindow, WindowState>,
}

impl MeetingCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn window(&self, window: LookupWindow) -> Option<&WindowState> {
        self.windows.get(&window)
    }

    fn window_mut(&mut self, window: LookupWindow) -> &mut WindowState {
        self.windows.entry(window).or_default()
    }

    // Marks a fetch as initiated and hands back its generation token.
    pub fn begin_fetch(&mut self, window: LookupWindow) -> u64 {
        let state = self.window_mut(window);
        state.last_started += 1;
        state.last_started
    }

    // Applies a successful parse: swaps the collection, stamps the refresh
    // time and clears the last error. An empty-but-successful result counts
    // as a refresh. Returns false when a later-initiated fetch already
    // applied, in which case nothing changes.
    pub fn apply_success(
        &mut self,
        window: LookupWindow,
        generation: u64,
        mut meetings: Vec<Meeting>,
        now: DateTime<Utc>,
    ) -> bool {
        let state = self.window_mut(window);
        if generation <= state.last_applied {
            return false;
        }
        meetings.sort_by_key(|meeting| meeting.start_time);
        state.meetings = meetings;
        state.last_refresh = Some(now);
        state.last_error = None;
        state.last_applied = generation;
        true
    }

    // A failed fetch keeps the prior snapshot and refresh stamp; stale data
    // beats no data.
    pub fn record_failure(&mut self, window: LookupWindow, error: FetchError) {
        self.window_mut(window).last_error = Some(error);
    }

    pub fn get_all(&self, window: LookupWindow, now: DateTime<Utc>) -> Vec<Meeting> {
        self.window(window)
            .map(|state| {
                state
                    .meetings
                    .iter()
                    .map(|meeting| meeting.with_status(now))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_next(&self, now: DateTime<Utc>) -> Option<Meeting> {
        self.get_all(LookupWindow::Today, now)
            .into_iter()
            .find(|meeting| meeting.status == MeetingStatus::Upcoming)
    }

    pub fn get_current(&self, now: DateTime<Utc>) -> Option<Meeting> {
        self.get_all(LookupWindow::Today, now)
            .into_iter()
            .find(|meeting| meeting.status == MeetingStatus::InProgress)
    }

    pub fn minutes_until_next(&self, now: DateTime<Utc>) -> Option<i64> {
        self.get_next(now)
            .map(|meeting| meeting.minutes_until_start(now))
    }

    pub fn last_refresh(&self, window: LookupWindow) -> Option<DateTime<Utc>> {
        self.window(window).and_then(|state| state.last_refresh)
    }

    pub fn last_error(&self, window: LookupWindow) -> Option<FetchError> {
        self.window(window).and_then(|state| state.last_error.clone())
    }
}
