use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::service::fetch_service::MeetingDataClient;
use crate::service::meeting_cache::LookupWindow;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    question: &'a str,
}

#[derive(Debug, Deserialize)]
struct AskResponse {
    text: String,
}

// Builds the natural-language question for one lookup window. The tool is
// instructed to answer with a fenced JSON array; real deployments still
// wrap it in prose and footnotes, which the parser handles.
pub fn question_for(window: LookupWindow) -> String {
    let range = match window {
        LookupWindow::Today => "today",
        LookupWindow::Tomorrow => "tomorrow",
        LookupWindow::Week => "over the next seven days",
    };
    format!(
        "What meetings do I have {range}?\n\
         For each meeting include:\n\
         - \"title\": the meeting subject\n\
         - \"startTime\" and \"endTime\": RFC3339 timestamps with offset\n\
         - \"onlineJoinUrl\": the Teams join link, or null when there is none\n\
         Respond with a JSON array of those objects inside a fenced code block.\n\
         List meetings in chronological order.",
        range = range
    )
}

pub struct WorkIqClient {
    base_url: String,
    api_token: Option<String>,
    http: reqwest::Client,
}

impl WorkIqClient {
    pub fn new(base_url: String, api_token: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            http,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = &self.api_token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder
    }
}

#[async_trait]
impl MeetingDataClient for WorkIqClient {
    async fn is_available(&self) -> bool {
        match self.request(reqwest::Method::GET, "/status").send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn ask(
        &self,
        question: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let response = self
            .request(reqwest::Method::POST, "/ask")
            .json(&AskRequest { question })
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?; // read the body once

        if !status.is_success() {
            log::warn!("Work IQ returned {}: {}", status, text);
            return Err(format!("Request failed with status {}: {}", status, text).into());
        }

        let parsed: AskResponse = serde_json::from_str(&text)
            .map_err(|e| format!("Failed to parse Work IQ response JSON: {}\nRaw body: {}", e, text))?;
        Ok(parsed.text)
    }
}
