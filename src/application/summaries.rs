//! Prompt assembly for the daily summary, morning plan suggestion, and weekly
//! review. The formatting helpers are pure so prompt shape is testable without
//! a provider; the generators themselves return prose, never errors.

use crate::domain::models::{DayRecord, IntervalLog};
use crate::infrastructure::ai_client::TextGenerator;
use chrono::{Local, TimeZone};

const DAY_SUMMARY_SYSTEM: &str = "You are a concise productivity coach. Summarize the user's \
day from their focus logs in two or three sentences, then add one short suggestion for \
tomorrow. Write in plain prose, no headings or bullet lists.";

const MORNING_PLAN_SYSTEM: &str = "You are a concise productivity coach helping the user plan \
their morning. Suggest two or three concrete priorities in plain prose, no headings.";

const WEEKLY_REVIEW_SYSTEM: &str = "You are a concise productivity coach. Review the user's \
week of focus logs and todos: name what went well, what slipped, and one adjustment for next \
week. Keep it under 150 words, plain prose.";

pub const EMPTY_DAY_SUMMARY: &str = "No focus intervals were logged on this day.";
pub const EMPTY_WEEK_REVIEW: &str = "No focus intervals were logged this week.";

/// One line per log: `- [HH:MM] (N min): content`, in timestamp order.
pub fn format_logs_for_prompt(logs: &[IntervalLog]) -> String {
    let mut ordered = logs.to_vec();
    ordered.sort_by_key(|log| log.timestamp);
    ordered
        .iter()
        .map(|log| {
            let clock = Local
                .timestamp_millis_opt(log.timestamp)
                .single()
                .map(|time| time.format("%H:%M").to_string())
                .unwrap_or_else(|| "--:--".to_string());
            format!(
                "- [{clock}] ({} min): {}",
                log.duration_minutes, log.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn day_summary_prompt(record: &DayRecord) -> String {
    format!(
        "Focus log for {}:\n{}\n\nTotal focused time: {} minutes.",
        record.date,
        format_logs_for_prompt(&record.logs),
        record.total_focus_minutes()
    )
}

pub fn morning_plan_prompt(yesterday: Option<&DayRecord>) -> String {
    match yesterday {
        Some(record) if !record.logs.is_empty() => format!(
            "Yesterday ({}) the user logged:\n{}\n\nSuggest priorities for today.",
            record.date,
            format_logs_for_prompt(&record.logs)
        ),
        _ => "The user has no logs from yesterday. Suggest how to start a focused day."
            .to_string(),
    }
}

pub fn weekly_review_prompt(records: &[DayRecord]) -> String {
    let total_minutes: u64 = records.iter().map(DayRecord::total_focus_minutes).sum();
    let completed_todos: usize = records.iter().map(DayRecord::completed_todo_count).sum();
    let total_todos: usize = records.iter().map(|record| record.todos.len()).sum();

    let mut sections = Vec::new();
    for record in records {
        if record.logs.is_empty() {
            continue;
        }
        sections.push(format!(
            "{}:\n{}",
            record.date,
            format_logs_for_prompt(&record.logs)
        ));
    }

    format!(
        "Week overview: {} focused minutes, {} of {} todos completed.\n\n{}",
        total_minutes,
        completed_todos,
        total_todos,
        sections.join("\n\n")
    )
}

/// Day summary for a finished day; an empty log yields a fixed sentence
/// without calling the provider.
pub async fn generate_day_summary(generator: &dyn TextGenerator, record: &DayRecord) -> String {
    if record.logs.is_empty() {
        return EMPTY_DAY_SUMMARY.to_string();
    }
    generator
        .generate(&day_summary_prompt(record), Some(DAY_SUMMARY_SYSTEM))
        .await
}

pub async fn generate_morning_plan_suggestion(
    generator: &dyn TextGenerator,
    yesterday: Option<&DayRecord>,
) -> String {
    generator
        .generate(&morning_plan_prompt(yesterday), Some(MORNING_PLAN_SYSTEM))
        .await
}

pub async fn generate_weekly_review(
    generator: &dyn TextGenerator,
    records: &[DayRecord],
) -> String {
    if records.iter().all(|record| record.logs.is_empty()) {
        return EMPTY_WEEK_REVIEW.to_string();
    }
    generator
        .generate(&weekly_review_prompt(records), Some(WEEKLY_REVIEW_SYSTEM))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TodoItem;
    use crate::infrastructure::ai_client::CannedTextGenerator;

    fn record_with_logs(date: &str) -> DayRecord {
        let mut record = DayRecord::new(date);
        record.logs.push(IntervalLog {
            id: "log-2".to_string(),
            timestamp: 1_760_000_900_000,
            content: "Reviewed the import path".to_string(),
            duration_minutes: 25,
        });
        record.logs.push(IntervalLog {
            id: "log-1".to_string(),
            timestamp: 1_760_000_000_000,
            content: "Wrote the sync engine".to_string(),
            duration_minutes: 30,
        });
        record
    }

    #[test]
    fn log_lines_are_ordered_by_timestamp() {
        let record = record_with_logs("2026-02-16");
        let formatted = format_logs_for_prompt(&record.logs);

        let lines = formatted.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("(30 min): Wrote the sync engine"));
        assert!(lines[1].contains("(25 min): Reviewed the import path"));
        assert!(lines[0].starts_with("- ["));
    }

    #[test]
    fn day_summary_prompt_includes_totals() {
        let prompt = day_summary_prompt(&record_with_logs("2026-02-16"));
        assert!(prompt.contains("Focus log for 2026-02-16"));
        assert!(prompt.contains("Total focused time: 55 minutes."));
    }

    #[test]
    fn weekly_prompt_counts_todos_across_days() {
        let mut monday = record_with_logs("2026-02-16");
        monday.todos.push(TodoItem {
            id: "todo-1".to_string(),
            text: "Ship exporter".to_string(),
            completed: true,
            category: None,
        });
        let tuesday = DayRecord::new("2026-02-17");

        let prompt = weekly_review_prompt(&[monday, tuesday]);
        assert!(prompt.contains("55 focused minutes"));
        assert!(prompt.contains("1 of 1 todos completed"));
        // Empty days contribute no log section.
        assert!(!prompt.contains("2026-02-17"));
    }

    #[tokio::test]
    async fn empty_day_short_circuits_without_provider() {
        let generator = CannedTextGenerator::new("should not be used");
        let summary = generate_day_summary(&generator, &DayRecord::new("2026-02-16")).await;
        assert_eq!(summary, EMPTY_DAY_SUMMARY);
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn day_summary_passes_system_instruction() {
        let generator = CannedTextGenerator::new("A productive day.");
        let summary = generate_day_summary(&generator, &record_with_logs("2026-02-16")).await;
        assert_eq!(summary, "A productive day.");

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].1.as_deref(), Some(DAY_SUMMARY_SYSTEM));
    }

    #[tokio::test]
    async fn empty_week_short_circuits_without_provider() {
        let generator = CannedTextGenerator::new("should not be used");
        let review = generate_weekly_review(
            &generator,
            &[DayRecord::new("2026-02-16"), DayRecord::new("2026-02-17")],
        )
        .await;
        assert_eq!(review, EMPTY_WEEK_REVIEW);
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn morning_plan_mentions_yesterday_when_present() {
        let generator = CannedTextGenerator::new("Plan the parser work first.");
        let _ = generate_morning_plan_suggestion(
            &generator,
            Some(&record_with_logs("2026-02-15")),
        )
        .await;

        let prompts = generator.prompts();
        assert!(prompts[0].0.contains("Yesterday (2026-02-15)"));
    }
}
