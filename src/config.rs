use std::collections::HashMap;
use std::env;
use std::fs;
use std::str::FromStr;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;

#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    // KEY=VALUE lines, "export " prefixes and surrounding quotes tolerated.
    pub fn from_file(path: &str) -> Result<Self, String> {
        let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(format!("Invalid config line {}: {}", idx + 1, line));
            };
            let key = key.trim();
            let mut value = value.trim().to_string();
            if (value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\''))
            {
                value = value[1..value.len() - 1].to_string();
            }
            values.insert(key.to_string(), value);
        }
        Ok(Self { values })
    }

    // Config file first, environment second.
    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .cloned()
            .or_else(|| env::var(key).ok())
    }

    fn get_parsed<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }
}

// Read-only inputs to the core, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub reminder_minutes: i64,
    pub refresh_interval_secs: u64,
    pub notifications_enabled: bool,
    pub work_start_hour: u32,
    pub work_end_hour: u32,
    pub timezone: Tz,
    pub focus_after_meetings: bool,
    pub focus_minutes: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reminder_minutes: 5,
            refresh_interval_secs: 300,
            notifications_enabled: true,
            work_start_hour: 8,
            work_end_hour: 18,
            timezone: chrono_tz::America::New_York,
            focus_after_meetings: false,
            focus_minutes: 25,
        }
    }
}

impl Settings {
    pub fn from_config(config: &AppConfig) -> Self {
        let defaults = Settings::default();
        let timezone = config
            .get("TIMEZONE")
            .and_then(|name| name.parse::<Tz>().ok())
            .unwrap_or(defaults.timezone);
        Self {
            reminder_minutes: config.get_parsed("REMINDER_MINUTES", defaults.reminder_minutes),
            refresh_interval_secs: config
                .get_parsed("REFRESH_INTERVAL_SECS", defaults.refresh_interval_secs),
            notifications_enabled: config
                .get_parsed("NOTIFICATIONS_ENABLED", defaults.notifications_enabled),
            work_start_hour: config.get_parsed("WORK_START_HOUR", defaults.work_start_hour),
            work_end_hour: config.get_parsed("WORK_END_HOUR", defaults.work_end_hour),
            timezone,
            focus_after_meetings: config
                .get_parsed("FOCUS_AFTER_MEETINGS", defaults.focus_after_meetings),
            focus_minutes: config.get_parsed("FOCUS_MINUTES", defaults.focus_minutes),
        }
    }

    pub fn within_working_hours(&self, now: DateTime<Utc>) -> bool {
        let hour = now.with_timezone(&self.timezone).hour();
        hour >= self.work_start_hour && hour < self.work_end_hour
    }
}
