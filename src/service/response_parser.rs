use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;

use crate::models::meeting::Meeting;

pub const TEAMS_URL_PREFIX: &str = "https://teams.microsoft.com/";

const FALLBACK_DURATION_MINUTES: i64 = 30;

// Footnote citations look like [1](https://teams.microsoft.com/...). The
// generating tool puts placeholder URLs inline and the real one in the
// footnote, so footnotes are scanned over the whole text and win over any
// inline field.
static FOOTNOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(\d+)\]\((https://teams\.microsoft\.com/[^)\s]+)\)").unwrap()
});

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[a-zA-Z]*\r?\n?(.*?)```").unwrap());

static NUMBERED_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+[.)]\s+").unwrap());

static BOLD_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());

static START_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)start\s*time[^\d\n]*(\d[^\n]*)").unwrap());

static END_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)end\s*time[^\d\n]*(\d[^\n]*)").unwrap());

static CLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d{1,2}):(\d{2})\s*([ap]\.?m\.?)?").unwrap());

static INLINE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((https://teams\.microsoft\.com/[^)\s]+)\)").unwrap());

pub struct ResponseParser {
    tz: Tz,
}

impl ResponseParser {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    // Turns one raw tool response into meetings sorted by start time. Never
    // fails: malformed input degrades to a partial or empty result.
    pub fn parse(&self, raw: &str, now: DateTime<Utc>) -> Vec<Meeting> {
        if raw.trim().is_empty() {
            return Vec::new();
        }
        let footnotes = footnote_urls(raw);
        let scope = json_scope(raw);
        let mut meetings = match structured_meetings(scope, &footnotes, now) {
            Some(found) => found,
            None => self.fallback_meetings(raw, &footnotes, now),
        };
        meetings.sort_by_key(|meeting| meeting.start_time);
        meetings
    }

    // Unstructured path: numbered-list blocks with a bold title and
    // "Start Time:" / "End Time:" lines. A block missing a title or a
    // parseable start time is dropped wholesale.
    fn fallback_meetings(
        &self,
        raw: &str,
        footnotes: &HashMap<usize, String>,
        now: DateTime<Utc>,
    ) -> Vec<Meeting> {
        let mut blocks: Vec<String> = Vec::new();
        for line in raw.lines() {
            if NUMBERED_LINE_RE.is_match(line) {
                blocks.push(format!("{}\n", line));
            } else if let Some(block) = blocks.last_mut() {
                block.push_str(line);
                block.push('\n');
            }
        }

        let mut meetings = Vec::new();
        for (index, block) in blocks.iter().enumerate() {
            let Some(title) = block_title(block) else {
                continue;
            };
            let Some(start) = START_TIME_RE
                .captures(block)
                .and_then(|cap| self.parse_time_value(&cap[1], now))
            else {
                continue;
            };
            let end = END_TIME_RE
                .captures(block)
                .and_then(|cap| self.parse_time_value(&cap[1], now))
                .unwrap_or(start + Duration::minutes(FALLBACK_DURATION_MINUTES));
            if end < start {
                continue;
            }
            let join_url = footnotes.get(&index).cloned().or_else(|| {
                INLINE_LINK_RE
                    .captures(block)
                    .map(|cap| cap[1].to_string())
            });
            meetings.push(Meeting::new(title, start, end, join_url, now));
        }
        meetings
    }

    // Accepts either a full RFC3339 timestamp or a bare clock time. Bare
    // clock times are anchored to today's date in the configured timezone.
    fn parse_time_value(&self, value: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let value = value.trim().trim_end_matches('*').trim();
        if let Some(instant) = parse_timestamp(value) {
            return Some(instant);
        }

        let cap = CLOCK_RE.captures(value)?;
        let mut hour: u32 = cap[1].parse().ok()?;
        let minute: u32 = cap[2].parse().ok()?;
        match cap.get(3).map(|m| m.as_str().to_lowercase()) {
            Some(meridiem) => {
                if hour == 0 || hour > 12 {
                    return None;
                }
                if meridiem.starts_with('p') && hour != 12 {
                    hour += 12;
                } else if meridiem.starts_with('a') && hour == 12 {
                    hour = 0;
                }
            }
            None => {
                if hour > 23 {
                    return None;
                }
            }
        }
        let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
        let local_date = now.with_timezone(&self.tz).date_naive();
        let local = self.tz.from_local_datetime(&local_date.and_time(time)).earliest()?;
        Some(local.with_timezone(&Utc))
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|instant| instant.with_timezone(&Utc))
}

// Maps 1-based footnote numbers to 0-based element indexes. The first
// occurrence of a number wins.
fn footnote_urls(raw: &str) -> HashMap<usize, String> {
    let mut urls = HashMap::new();
    for cap in FOOTNOTE_RE.captures_iter(raw) {
        let Ok(number) = cap[1].parse::<usize>() else {
            continue;
        };
        if number == 0 {
            continue;
        }
        urls.entry(number - 1).or_insert_with(|| cap[2].to_string());
    }
    urls
}

// The JSON search scope is the interior of the first fenced code block when
// one exists, otherwise the whole text.
fn json_scope(raw: &str) -> &str {
    match FENCE_RE.captures(raw) {
        Some(cap) => cap.get(1).map_or(raw, |m| m.as_str()),
        None => raw,
    }
}

// Structured path. Returns None both when no JSON array parses and when the
// array parsed but produced zero valid elements, so the caller can try the
// unstructured fallback.
fn structured_meetings(
    scope: &str,
    footnotes: &HashMap<usize, String>,
    now: DateTime<Utc>,
) -> Option<Vec<Meeting>> {
    let span = first_array_span(scope)?;
    let elements: Vec<serde_json::Value> = serde_json::from_str(span).ok()?;

    let mut meetings = Vec::new();
    for (index, element) in elements.iter().enumerate() {
        let Some(object) = element.as_object() else {
            continue;
        };
        let Some(title) = object.get("title").and_then(|v| v.as_str()) else {
            continue;
        };
        let title = title.trim();
        if title.is_empty() {
            continue;
        }
        let Some(start) = object
            .get("startTime")
            .and_then(|v| v.as_str())
            .and_then(parse_timestamp)
        else {
            continue;
        };
        let Some(end) = object
            .get("endTime")
            .and_then(|v| v.as_str())
            .and_then(parse_timestamp)
        else {
            continue;
        };
        if end < start {
            continue;
        }
        let join_url = footnotes
            .get(&index)
            .cloned()
            .or_else(|| inline_join_url(object));
        meetings.push(Meeting::new(title.to_string(), start, end, join_url, now));
    }

    if meetings.is_empty() {
        None
    } else {
        Some(meetings)
    }
}

fn inline_join_url(object: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    for key in ["onlineJoinUrl", "joinUrl", "onlineMeetingUrl"] {
        if let Some(url) = object.get(key).and_then(|v| v.as_str()) {
            let url = url.trim();
            if !url.is_empty() && url.starts_with(TEAMS_URL_PREFIX) {
                return Some(url.to_string());
            }
        }
    }
    None
}

// Locates the first top-level [...] span, skipping brackets inside JSON
// strings so titles containing "[" do not break the match.
fn first_array_span(scope: &str) -> Option<&str> {
    let bytes = scope.as_bytes();
    let open = scope.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &byte) in bytes[open..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'[' if !in_string => depth += 1,
            b']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&scope[open..=open + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn block_title(block: &str) -> Option<String> {
    let first_line = block.lines().next()?;
    if let Some(cap) = BOLD_TITLE_RE.captures(first_line) {
        let title = cap[1].trim();
        if !title.is_empty() {
            return Some(title.to_string());
        }
    }
    let rest = NUMBERED_LINE_RE.replace(first_line, "");
    let title = rest.trim().trim_matches('*').trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}
