use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use meetingMate::events::queue::UpdateBus;
use meetingMate::service::fetch_service::{FetchError, FetchService, MeetingDataClient};
use meetingMate::service::meeting_cache::{LookupWindow, MeetingCache};
use meetingMate::service::response_parser::ResponseParser;
use tokio::sync::Mutex;

struct ScriptedClient {
    available: bool,
    responses: Mutex<Vec<Result<String, String>>>,
}

impl ScriptedClient {
    fn new(responses: Vec<Result<String, String>>) -> Self {
        Self {
            available: true,
            responses: Mutex::new(responses),
        }
    }
}

#[async_trait]
impl MeetingDataClient for ScriptedClient {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn ask(
        &self,
        _question: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let mut responses = self.responses.lock().await;
        match responses.pop() {
            Some(Ok(text)) => Ok(text),
            Some(Err(error)) => Err(error.into()),
            None => Err("no scripted response".to_string().into()),
        }
    }
}

fn service(client: ScriptedClient) -> (FetchService, Arc<Mutex<MeetingCache>>, UpdateBus) {
    let cache = Arc::new(Mutex::new(MeetingCache::new()));
    let updates = UpdateBus::new(16);
    let fetch = FetchService::new(
        cache.clone(),
        Arc::new(client),
        ResponseParser::new(chrono_tz::UTC),
        updates.clone(),
    );
    (fetch, cache, updates)
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 19, 12, 0, 0).unwrap()
}

fn three_meetings_response() -> String {
    "```json\n[\
     {\"title\":\"One\",\"startTime\":\"2026-01-19T13:00:00Z\",\"endTime\":\"2026-01-19T13:30:00Z\"},\
     {\"title\":\"Two\",\"startTime\":\"2026-01-19T14:00:00Z\",\"endTime\":\"2026-01-19T14:30:00Z\"},\
     {\"title\":\"Three\",\"startTime\":\"2026-01-19T15:00:00Z\",\"endTime\":\"2026-01-19T15:30:00Z\"}\
     ]\n```"
        .to_string()
}

#[tokio::test]
async fn failed_refresh_preserves_the_previous_snapshot() {
    // Responses pop from the back: success first, then a transport error.
    let client = ScriptedClient::new(vec![
        Err("connection refused".to_string()),
        Ok(three_meetings_response()),
    ]);
    let (fetch, cache, _updates) = service(client);
    let t0 = now();

    fetch.fetch(LookupWindow::Today, t0).await.unwrap();
    {
        let cache = cache.lock().await;
        assert_eq!(cache.get_all(LookupWindow::Today, t0).len(), 3);
        assert_eq!(cache.last_refresh(LookupWindow::Today), Some(t0));
    }

    let t1 = t0 + chrono::Duration::minutes(5);
    let result = fetch.fetch(LookupWindow::Today, t1).await;
    assert_eq!(result.unwrap_err(), FetchError::Network);

    let cache = cache.lock().await;
    // Stale data is preferred over no data, and the stamp is unchanged.
    assert_eq!(cache.get_all(LookupWindow::Today, t1).len(), 3);
    assert_eq!(cache.last_refresh(LookupWindow::Today), Some(t0));
    assert_eq!(cache.last_error(LookupWindow::Today), Some(FetchError::Network));
}

#[tokio::test]
async fn successful_empty_fetch_still_stamps_the_refresh() {
    let client = ScriptedClient::new(vec![Ok(
        "You have no meetings today. Enjoy the free time!".to_string()
    )]);
    let (fetch, cache, _updates) = service(client);

    let meetings = fetch.fetch(LookupWindow::Today, now()).await.unwrap();
    assert!(meetings.is_empty());

    let cache = cache.lock().await;
    assert_eq!(cache.last_refresh(LookupWindow::Today), Some(now()));
    assert_eq!(cache.last_error(LookupWindow::Today), None);
}

#[tokio::test]
async fn prose_license_problem_on_success_is_classified() {
    let client = ScriptedClient::new(vec![Ok(
        "I'm sorry, but a Microsoft 365 Copilot license is required to read your calendar."
            .to_string(),
    )]);
    let (fetch, cache, _updates) = service(client);

    let result = fetch.fetch(LookupWindow::Today, now()).await;
    assert_eq!(result.unwrap_err(), FetchError::LicenseRequired);
    let cache = cache.lock().await;
    assert_eq!(
        cache.last_error(LookupWindow::Today),
        Some(FetchError::LicenseRequired)
    );
    // A prose error is not meeting data; nothing was cached.
    assert!(cache.last_refresh(LookupWindow::Today).is_none());
}

#[tokio::test]
async fn unavailable_tool_reports_not_configured() {
    let mut client = ScriptedClient::new(vec![Ok(three_meetings_response())]);
    client.available = false;
    let (fetch, _cache, _updates) = service(client);

    let result = fetch.fetch(LookupWindow::Today, now()).await;
    assert_eq!(result.unwrap_err(), FetchError::NotConfigured);
}

#[tokio::test]
async fn every_fetch_attempt_publishes_exactly_one_update() {
    let client = ScriptedClient::new(vec![
        Err("connection refused".to_string()),
        Ok(three_meetings_response()),
    ]);
    let (fetch, _cache, updates) = service(client);
    let mut rx = updates.subscribe();

    fetch.fetch(LookupWindow::Today, now()).await.unwrap();
    let first = rx.recv().await.unwrap();
    assert_eq!(first.meetings.len(), 3);
    assert!(first.error.is_none());

    let _ = fetch.fetch(LookupWindow::Today, now()).await;
    let second = rx.recv().await.unwrap();
    // The failure event still carries the stale snapshot for display.
    assert_eq!(second.meetings.len(), 3);
    assert_eq!(second.error, Some(FetchError::Network));
}

#[tokio::test]
async fn windows_fetch_and_fail_independently() {
    let client = ScriptedClient::new(vec![
        Err("request timed out".to_string()),
        Ok(three_meetings_response()),
    ]);
    let (fetch, cache, _updates) = service(client);

    fetch.fetch(LookupWindow::Today, now()).await.unwrap();
    let _ = fetch.fetch(LookupWindow::Week, now()).await;

    let cache = cache.lock().await;
    assert_eq!(cache.get_all(LookupWindow::Today, now()).len(), 3);
    assert_eq!(cache.last_error(LookupWindow::Today), None);
    assert!(cache.get_all(LookupWindow::Week, now()).is_empty());
    assert_eq!(cache.last_error(LookupWindow::Week), Some(FetchError::Network));
}
