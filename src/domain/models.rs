use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_INTERVAL_MINUTES: u32 = 30;
pub const FALLBACK_INTERVAL_MINUTES: u32 = 25;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TodoCategory {
    Urgent,
    Important,
    Normal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoItem {
    pub id: String,
    pub text: String,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<TodoCategory>,
}

impl TodoItem {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "todo.id")?;
        validate_non_empty(&self.text, "todo.text")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IntervalLog {
    pub id: String,
    pub timestamp: i64,
    pub content: String,
    pub duration_minutes: u32,
}

impl IntervalLog {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "log.id")?;
        validate_non_empty(&self.content, "log.content")?;
        if self.timestamp < 0 {
            return Err("log.timestamp must be a non-negative epoch-millis value".to_string());
        }
        if self.duration_minutes == 0 {
            return Err("log.duration_minutes must be > 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DayRecord {
    pub date: String,
    #[serde(default)]
    pub todos: Vec<TodoItem>,
    #[serde(default)]
    pub logs: Vec<IntervalLog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub morning_review: Option<String>,
    pub status: DayStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_summary: Option<String>,
}

impl DayRecord {
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            todos: Vec::new(),
            logs: Vec::new(),
            morning_review: None,
            status: DayStatus::Active,
            daily_summary: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_date(&self.date, "record.date")?;
        for todo in &self.todos {
            todo.validate()?;
        }
        for log in &self.logs {
            log.validate()?;
        }
        Ok(())
    }

    pub fn completed_todo_count(&self) -> usize {
        self.todos.iter().filter(|todo| todo.completed).count()
    }

    pub fn total_focus_minutes(&self) -> u64 {
        self.logs
            .iter()
            .map(|log| u64::from(log.duration_minutes))
            .sum()
    }

    /// True while the day has seen no briefing, no logs, and no todos.
    pub fn is_untouched(&self) -> bool {
        self.morning_review.is_none() && self.logs.is_empty() && self.todos.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AiProvider {
    #[default]
    Gemini,
    Openai,
    Deepseek,
    Qwen,
    Custom,
}

impl AiProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Openai => "openai",
            Self::Deepseek => "deepseek",
            Self::Qwen => "qwen",
            Self::Custom => "custom",
        }
    }
}

/// Persisted settings merge over these defaults field by field, so a partial
/// settings file from an older version still loads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub interval_minutes: u32,
    pub sound_enabled: bool,
    pub notifications_enabled: bool,
    pub ai_provider: AiProvider,
    pub ai_api_key: String,
    pub ai_base_url: String,
    pub ai_model: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            sound_enabled: true,
            notifications_enabled: true,
            ai_provider: AiProvider::Gemini,
            ai_api_key: String::new(),
            ai_base_url: String::new(),
            ai_model: String::new(),
        }
    }
}

impl AppSettings {
    /// Interval duration with the zero-coercion rule applied: an invalid
    /// configured value degrades to the fallback, never to an error.
    pub fn normalized_interval_minutes(&self) -> u32 {
        if self.interval_minutes == 0 {
            FALLBACK_INTERVAL_MINUTES
        } else {
            self.interval_minutes
        }
    }

    pub fn interval_seconds(&self) -> u32 {
        self.normalized_interval_minutes() * 60
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_date(value: &str, field_name: &str) -> Result<(), String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("{field_name} must be YYYY-MM-DD"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_todo() -> TodoItem {
        TodoItem {
            id: "todo-1".to_string(),
            text: "Review pull requests".to_string(),
            completed: false,
            category: Some(TodoCategory::Important),
        }
    }

    fn sample_log() -> IntervalLog {
        IntervalLog {
            id: "log-1".to_string(),
            timestamp: 1_760_000_000_000,
            content: "Drafted the sync protocol".to_string(),
            duration_minutes: 30,
        }
    }

    fn sample_record() -> DayRecord {
        DayRecord {
            date: "2026-02-16".to_string(),
            todos: vec![sample_todo()],
            logs: vec![sample_log()],
            morning_review: Some("Completed".to_string()),
            status: DayStatus::Active,
            daily_summary: None,
        }
    }

    #[test]
    fn record_validate_accepts_valid_record() {
        assert!(sample_record().validate().is_ok());
    }

    #[test]
    fn record_validate_rejects_bad_date() {
        let mut record = sample_record();
        record.date = "16/02/2026".to_string();
        assert!(record.validate().is_err());
    }

    #[test]
    fn todo_validate_rejects_blank_text() {
        let mut todo = sample_todo();
        todo.text = "   ".to_string();
        assert!(todo.validate().is_err());
    }

    #[test]
    fn log_validate_rejects_zero_duration() {
        let mut log = sample_log();
        log.duration_minutes = 0;
        assert!(log.validate().is_err());
    }

    #[test]
    fn new_record_is_untouched_and_active() {
        let record = DayRecord::new("2026-02-16");
        assert!(record.is_untouched());
        assert_eq!(record.status, DayStatus::Active);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn record_serializes_with_camel_case_wire_names() {
        let value = serde_json::to_value(sample_record()).expect("serialize record");
        assert_eq!(value["morningReview"], "Completed");
        assert_eq!(value["logs"][0]["durationMinutes"], 30);
        assert_eq!(value["status"], "active");
        assert!(value.get("dailySummary").is_none());
    }

    #[test]
    fn record_serde_roundtrip() {
        let record = sample_record();
        let roundtrip: DayRecord =
            serde_json::from_str(&serde_json::to_string(&record).expect("serialize record"))
                .expect("deserialize record");
        assert_eq!(roundtrip, record);
    }

    #[test]
    fn settings_merge_partial_json_over_defaults() {
        let settings: AppSettings =
            serde_json::from_str(r#"{"intervalMinutes": 45, "aiProvider": "deepseek"}"#)
                .expect("deserialize partial settings");
        assert_eq!(settings.interval_minutes, 45);
        assert_eq!(settings.ai_provider, AiProvider::Deepseek);
        assert!(settings.sound_enabled);
        assert!(settings.notifications_enabled);
        assert_eq!(settings.ai_api_key, "");
    }

    #[test]
    fn settings_coerce_zero_interval_to_fallback() {
        let settings = AppSettings {
            interval_minutes: 0,
            ..AppSettings::default()
        };
        assert_eq!(
            settings.normalized_interval_minutes(),
            FALLBACK_INTERVAL_MINUTES
        );
        assert_eq!(settings.interval_seconds(), FALLBACK_INTERVAL_MINUTES * 60);
    }

    #[test]
    fn focus_minutes_and_todo_counts() {
        let mut record = sample_record();
        record.logs.push(IntervalLog {
            id: "log-2".to_string(),
            timestamp: 1_760_000_100_000,
            content: "Wrote reconciliation tests".to_string(),
            duration_minutes: 25,
        });
        record.todos.push(TodoItem {
            id: "todo-2".to_string(),
            text: "Ship the backup exporter".to_string(),
            completed: true,
            category: None,
        });
        assert_eq!(record.total_focus_minutes(), 55);
        assert_eq!(record.completed_todo_count(), 1);
    }
}
