use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::events::queue::{CacheUpdate, UpdateBus};
use crate::models::meeting::Meeting;
use crate::service::meeting_cache::{LookupWindow, MeetingCache};
use crate::service::response_parser::ResponseParser;

// Boundary to the external AI-backed data tool. One-shot question in, raw
// prose/JSON hybrid text out.
#[async_trait]
pub trait MeetingDataClient: Send + Sync {
    async fn is_available(&self) -> bool;

    async fn ask(&self, question: &str)
        -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Work IQ is not configured in this environment")]
    NotConfigured,
    #[error("Work IQ server is not running")]
    NotStarted,
    #[error("A Work IQ license is required to query meeting data")]
    LicenseRequired,
    #[error("An administrator must grant consent before Work IQ can be used")]
    AdminConsent,
    #[error("Sign-in is required before meetings can be fetched")]
    AuthRequired,
    #[error("Network error while contacting Work IQ")]
    Network,
    #[error("Meeting fetch failed: {0}")]
    Unknown(String),
}

// Heuristic classification of a transport/availability failure.
pub fn classify_failure(text: &str) -> FetchError {
    let lower = text.to_lowercase();
    if lower.contains("not configured") || lower.contains("not installed") {
        return FetchError::NotConfigured;
    }
    if lower.contains("not running") || lower.contains("not started") {
        return FetchError::NotStarted;
    }
    if lower.contains("admin consent") || lower.contains("administrator") {
        return FetchError::AdminConsent;
    }
    if lower.contains("license") {
        return FetchError::LicenseRequired;
    }
    if lower.contains("sign in")
        || lower.contains("signed in")
        || lower.contains("log in")
        || lower.contains("unauthorized")
        || lower.contains("authentication")
    {
        return FetchError::AuthRequired;
    }
    if lower.contains("network")
        || lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection")
        || lower.contains("dns")
    {
        return FetchError::Network;
    }
    // Counted in chars, not bytes: byte truncation can split a multibyte
    // character and panic.
    let summary: String = text.trim().chars().take(200).collect();
    FetchError::Unknown(summary)
}

// The tool sometimes answers a nominally successful query with prose that
// describes a license/consent/auth problem instead of raising, so success
// bodies are scanned for those patterns before parsing.
pub fn scan_for_tool_error(text: &str) -> Option<FetchError> {
    let lower = text.to_lowercase();
    if lower.contains("license is required")
        || lower.contains("requires a license")
        || lower.contains("license required")
    {
        return Some(FetchError::LicenseRequired);
    }
    if lower.contains("admin consent") || lower.contains("administrator consent") {
        return Some(FetchError::AdminConsent);
    }
    if lower.contains("sign in to") || lower.contains("please sign in") {
        return Some(FetchError::AuthRequired);
    }
    if lower.contains("server is not running") || lower.contains("is not running") {
        return Some(FetchError::NotStarted);
    }
    if lower.contains("is not configured") {
        return Some(FetchError::NotConfigured);
    }
    None
}

pub struct FetchService {
    cache: Arc<Mutex<MeetingCache>>,
    client: Arc<dyn MeetingDataClient>,
    parser: ResponseParser,
    updates: UpdateBus,
}

impl FetchService {
    pub fn new(
        cache: Arc<Mutex<MeetingCache>>,
        client: Arc<dyn MeetingDataClient>,
        parser: ResponseParser,
        updates: UpdateBus,
    ) -> Self {
        Self {
            cache,
            client,
            parser,
            updates,
        }
    }

    // Fetches one window and reconciles the cache. Exactly one CacheUpdate
    // is published per call, success or failure; a failure never clears
    // previously cached meetings.
    pub async fn fetch(
        &self,
        window: LookupWindow,
        now: DateTime<Utc>,
    ) -> Result<Vec<Meeting>, FetchError> {
        let generation = {
            let mut cache = self.cache.lock().await;
            cache.begin_fetch(window)
        };

        let outcome = self.query_and_parse(window, now).await;

        let snapshot = {
            let mut cache = self.cache.lock().await;
            match &outcome {
                Ok(meetings) => {
                    if !cache.apply_success(window, generation, meetings.clone(), now) {
                        log::warn!(
                            "Discarding superseded fetch result for {} window",
                            window.label()
                        );
                    }
                }
                Err(error) => {
                    log::warn!("Fetch for {} window failed: {}", window.label(), error);
                    cache.record_failure(window, error.clone());
                }
            }
            cache.get_all(window, now)
        };

        self.updates.publish(CacheUpdate {
            window,
            meetings: snapshot,
            error: outcome.as_ref().err().cloned(),
        });

        outcome
    }

    async fn query_and_parse(
        &self,
        window: LookupWindow,
        now: DateTime<Utc>,
    ) -> Result<Vec<Meeting>, FetchError> {
        if !self.client.is_available().await {
            return Err(FetchError::NotConfigured);
        }
        let question = crate::clients::workiq_client::question_for(window);
        let raw = self
            .client
            .ask(&question)
            .await
            .map_err(|error| classify_failure(&error.to_string()))?;
        if let Some(error) = scan_for_tool_error(&raw) {
            return Err(error);
        }
        Ok(self.parser.parse(&raw, now))
    }
}
