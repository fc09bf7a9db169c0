//! Per-window command layer.
//!
//! Each window owns a `WindowState` wrapping its private countdown engine plus
//! handles to the shared store and broadcast bus. Commands mutate under the
//! runtime lock, collect engine effects, then carry the effects out with the
//! lock released so completion side effects can re-enter.

use crate::application::bootstrap::bootstrap_workspace;
use crate::application::summaries;
use crate::domain::models::{
    AiProvider, AppSettings, DayRecord, IntervalLog, TodoCategory, TodoItem,
};
use crate::domain::timer::{EngineEffect, SyncMessage, TimerAction, TimerEngine, TimerSnapshot};
use crate::infrastructure::ai_client::TextGenerator;
use crate::infrastructure::bus::{Envelope, MessageBus};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::platform::{AttentionSignal, CompletionCue};
use crate::infrastructure::store::{
    FileStore, export_file_name, today_date_string, week_start_date, yesterday_date_string,
};
use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

pub const NOTIFICATION_TAG: &str = "focusflow-timer";
const NOTIFICATION_TITLE: &str = "Time's Up!";
const NOTIFICATION_BODY: &str = "Click here to log your accomplishment.";

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

/// The main window runs the briefing and review surfaces; the mini window is
/// the floating timer. The role is fixed for the lifetime of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    Main,
    Mini,
}

impl WindowMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Mini => "mini",
        }
    }

    /// A `mode=mini` query parameter selects the mini window; anything else,
    /// including no parameter at all, is the main window.
    pub fn from_url(url: &str) -> Result<Self, InfraError> {
        let parsed = Url::parse(url.trim())
            .map_err(|error| InfraError::InvalidConfig(format!("invalid window url: {error}")))?;
        let is_mini = parsed
            .query_pairs()
            .any(|(key, value)| key == "mode" && value == "mini");
        Ok(if is_mini { Self::Mini } else { Self::Main })
    }
}

pub fn mini_window_url(base: &str) -> Result<String, InfraError> {
    let mut url = Url::parse(base.trim())
        .map_err(|error| InfraError::InvalidConfig(format!("invalid window url: {error}")))?;
    url.query_pairs_mut().append_pair("mode", "mini");
    Ok(url.into())
}

pub struct WindowState {
    window_id: String,
    mode: WindowMode,
    store: FileStore,
    bus: Arc<dyn MessageBus>,
    cue: Arc<dyn CompletionCue>,
    attention: Arc<dyn AttentionSignal>,
    logs_dir: PathBuf,
    runtime: Mutex<RuntimeState>,
    log_guard: Mutex<()>,
}

#[derive(Debug)]
struct RuntimeState {
    settings: AppSettings,
    today: DayRecord,
    engine: TimerEngine,
    prompt_open: bool,
    notifications_granted: bool,
}

impl WindowState {
    pub fn new(
        workspace_root: &Path,
        mode: WindowMode,
        bus: Arc<dyn MessageBus>,
        cue: Arc<dyn CompletionCue>,
        attention: Arc<dyn AttentionSignal>,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(workspace_root)?;
        let store = FileStore::new(&bootstrap.state_dir, &bootstrap.config_dir);
        let settings = store.load_settings();
        let today = store.get_or_init_today_record()?;
        let engine = TimerEngine::new(settings.normalized_interval_minutes());

        Ok(Self {
            window_id: next_id("win"),
            mode,
            store,
            bus,
            cue,
            attention,
            logs_dir: bootstrap.logs_dir,
            runtime: Mutex::new(RuntimeState {
                settings,
                today,
                engine,
                prompt_open: false,
                notifications_granted: false,
            }),
            log_guard: Mutex::new(()),
        })
    }

    pub fn window_id(&self) -> &str {
        &self.window_id
    }

    pub fn mode(&self) -> WindowMode {
        self.mode
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "window": self.window_id,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    /// Fire-and-forget: an unreachable bus degrades to a single-window
    /// experience, so publish failures are logged and swallowed.
    fn publish(&self, message: SyncMessage) {
        let envelope = Envelope {
            sender: self.window_id.clone(),
            message,
        };
        if let Err(error) = self.bus.publish(envelope) {
            self.log_error("publish", &error.to_string());
        }
    }
}

fn lock_runtime(state: &WindowState) -> Result<MutexGuard<'_, RuntimeState>, InfraError> {
    state
        .runtime
        .lock()
        .map_err(|error| InfraError::InvalidConfig(format!("runtime lock poisoned: {error}")))
}

fn apply_effects(state: &WindowState, effects: Vec<EngineEffect>) -> Result<(), InfraError> {
    for effect in effects {
        match effect {
            EngineEffect::Publish(message) => state.publish(message),
            EngineEffect::RequestNotificationPermission => {
                let granted = state.attention.request_permission();
                lock_runtime(state)?.notifications_granted = granted;
            }
            EngineEffect::Complete { originated_locally } => {
                run_completion(state, originated_locally)?;
            }
        }
    }
    Ok(())
}

/// Interval close-out: cue, attention, and the open log prompt. The cue is
/// best-effort; a playback failure never blocks the prompt.
fn run_completion(state: &WindowState, originated_locally: bool) -> Result<(), InfraError> {
    let (settings, notifications_granted) = {
        let mut runtime = lock_runtime(state)?;
        runtime.prompt_open = true;
        (runtime.settings.clone(), runtime.notifications_granted)
    };

    if settings.sound_enabled {
        if let Err(error) = state.cue.play() {
            state.log_error("completion", &format!("completion cue failed: {error}"));
        }
    }

    match state.mode {
        WindowMode::Mini => state.attention.focus_window(),
        WindowMode::Main => {
            if settings.notifications_enabled && notifications_granted {
                state
                    .attention
                    .notify(NOTIFICATION_TITLE, NOTIFICATION_BODY, NOTIFICATION_TAG);
            }
        }
    }

    state.log_info(
        "completion",
        if originated_locally {
            "interval completed locally"
        } else {
            "interval completed by a sibling window"
        },
    );
    Ok(())
}

pub fn toggle_timer_impl(state: &WindowState) -> Result<TimerSnapshot, InfraError> {
    let (effects, snapshot) = {
        let mut runtime = lock_runtime(state)?;
        let effects = runtime.engine.toggle();
        (effects, runtime.engine.snapshot())
    };
    apply_effects(state, effects)?;

    state.log_info(
        "toggle_timer",
        if snapshot.is_active {
            "timer started"
        } else {
            "timer paused"
        },
    );
    Ok(snapshot)
}

/// One firing of this window's one-second clock.
pub fn tick_impl(state: &WindowState) -> Result<TimerSnapshot, InfraError> {
    let (effects, snapshot) = {
        let mut runtime = lock_runtime(state)?;
        let effects = runtime.engine.tick();
        (effects, runtime.engine.snapshot())
    };
    apply_effects(state, effects)?;
    Ok(snapshot)
}

/// Apply a broadcast envelope. The window's own messages are dropped here,
/// matching a channel that never delivers to its own sender.
pub fn handle_envelope_impl(state: &WindowState, envelope: &Envelope) -> Result<(), InfraError> {
    if envelope.sender == state.window_id {
        return Ok(());
    }

    if envelope.message == SyncMessage::DataUpdated {
        let mut runtime = lock_runtime(state)?;
        let previous_interval = runtime.settings.normalized_interval_minutes();
        runtime.settings = state.store.load_settings();
        runtime.today = state.store.get_or_init_today_record()?;
        // Only an actual interval change may touch the countdown; a record
        // update from a sibling must not disturb a paused timer.
        let interval_minutes = runtime.settings.normalized_interval_minutes();
        if interval_minutes != previous_interval {
            runtime.engine.set_interval_minutes(interval_minutes);
        }
        return Ok(());
    }

    let effects = {
        let mut runtime = lock_runtime(state)?;
        runtime.engine.apply_remote(&envelope.message)
    };
    apply_effects(state, effects)
}

/// Close out a completed interval with what was accomplished. Blank content is
/// rejected and the prompt stays open.
pub fn submit_interval_log_impl(
    state: &WindowState,
    content: String,
) -> Result<DayRecord, InfraError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(InfraError::InvalidConfig(
            "log content must not be empty".to_string(),
        ));
    }

    let record = {
        let mut runtime = lock_runtime(state)?;
        let log = IntervalLog {
            id: next_id("log"),
            timestamp: Utc::now().timestamp_millis(),
            content: content.to_string(),
            duration_minutes: runtime.settings.normalized_interval_minutes(),
        };
        runtime.today.logs.push(log);
        state.store.save_day_record(&runtime.today)?;
        runtime.prompt_open = false;
        runtime.engine.reset();
        runtime.today.clone()
    };

    state.publish(SyncMessage::DataUpdated);
    state.publish(SyncMessage::Action {
        action: TimerAction::Reset,
    });
    state.log_info(
        "submit_interval_log",
        &format!("logged interval for {}", record.date),
    );
    Ok(record)
}

pub fn is_prompt_open_impl(state: &WindowState) -> Result<bool, InfraError> {
    Ok(lock_runtime(state)?.prompt_open)
}

pub fn get_timer_state_impl(state: &WindowState) -> Result<TimerSnapshot, InfraError> {
    Ok(lock_runtime(state)?.engine.snapshot())
}

pub fn get_today_impl(state: &WindowState) -> Result<DayRecord, InfraError> {
    Ok(lock_runtime(state)?.today.clone())
}

pub fn list_day_records_impl(
    state: &WindowState,
) -> Result<BTreeMap<String, DayRecord>, InfraError> {
    Ok(state.store.load_all_data())
}

pub fn add_todo_impl(
    state: &WindowState,
    text: String,
    category: Option<TodoCategory>,
) -> Result<TodoItem, InfraError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(InfraError::InvalidConfig(
            "todo text must not be empty".to_string(),
        ));
    }

    let todo = TodoItem {
        id: next_id("todo"),
        text: text.to_string(),
        completed: false,
        category,
    };
    {
        let mut runtime = lock_runtime(state)?;
        runtime.today.todos.push(todo.clone());
        state.store.save_day_record(&runtime.today)?;
    }

    state.publish(SyncMessage::DataUpdated);
    state.log_info("add_todo", &format!("added todo_id={}", todo.id));
    Ok(todo)
}

pub fn toggle_todo_impl(state: &WindowState, todo_id: String) -> Result<TodoItem, InfraError> {
    let todo_id = todo_id.trim();
    if todo_id.is_empty() {
        return Err(InfraError::InvalidConfig(
            "todo_id must not be empty".to_string(),
        ));
    }

    let updated = {
        let mut runtime = lock_runtime(state)?;
        let Some(todo) = runtime
            .today
            .todos
            .iter_mut()
            .find(|todo| todo.id == todo_id)
        else {
            return Err(InfraError::InvalidConfig(format!(
                "todo not found: {}",
                todo_id
            )));
        };
        todo.completed = !todo.completed;
        let updated = todo.clone();
        state.store.save_day_record(&runtime.today)?;
        updated
    };

    state.publish(SyncMessage::DataUpdated);
    state.log_info("toggle_todo", &format!("toggled todo_id={todo_id}"));
    Ok(updated)
}

/// Partial settings update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub interval_minutes: Option<u32>,
    pub sound_enabled: Option<bool>,
    pub notifications_enabled: Option<bool>,
    pub ai_provider: Option<AiProvider>,
    pub ai_api_key: Option<String>,
    pub ai_base_url: Option<String>,
    pub ai_model: Option<String>,
}

pub fn update_settings_impl(
    state: &WindowState,
    patch: SettingsPatch,
) -> Result<AppSettings, InfraError> {
    let settings = {
        let mut runtime = lock_runtime(state)?;
        let previous_interval = runtime.settings.normalized_interval_minutes();
        if let Some(interval_minutes) = patch.interval_minutes {
            runtime.settings.interval_minutes = interval_minutes;
        }
        if let Some(sound_enabled) = patch.sound_enabled {
            runtime.settings.sound_enabled = sound_enabled;
        }
        if let Some(notifications_enabled) = patch.notifications_enabled {
            runtime.settings.notifications_enabled = notifications_enabled;
        }
        if let Some(ai_provider) = patch.ai_provider {
            runtime.settings.ai_provider = ai_provider;
        }
        if let Some(ai_api_key) = patch.ai_api_key {
            runtime.settings.ai_api_key = ai_api_key;
        }
        if let Some(ai_base_url) = patch.ai_base_url {
            runtime.settings.ai_base_url = ai_base_url;
        }
        if let Some(ai_model) = patch.ai_model {
            runtime.settings.ai_model = ai_model;
        }

        let interval_minutes = runtime.settings.normalized_interval_minutes();
        if interval_minutes != previous_interval {
            runtime.engine.set_interval_minutes(interval_minutes);
        }
        state.store.save_settings(&runtime.settings)?;
        runtime.settings.clone()
    };

    state.publish(SyncMessage::DataUpdated);
    state.log_info("update_settings", "settings updated");
    Ok(settings)
}

pub fn get_settings_impl(state: &WindowState) -> Result<AppSettings, InfraError> {
    Ok(lock_runtime(state)?.settings.clone())
}

/// The briefing belongs to the main window and only offers itself while the
/// day record is still untouched.
pub fn should_open_morning_briefing_impl(state: &WindowState) -> Result<bool, InfraError> {
    if state.mode != WindowMode::Main {
        return Ok(false);
    }
    Ok(lock_runtime(state)?.today.is_untouched())
}

pub fn complete_morning_briefing_impl(
    state: &WindowState,
    todo_texts: Vec<String>,
) -> Result<DayRecord, InfraError> {
    let record = {
        let mut runtime = lock_runtime(state)?;
        for raw_text in todo_texts {
            let text = raw_text.trim();
            if text.is_empty() {
                continue;
            }
            runtime.today.todos.push(TodoItem {
                id: next_id("todo"),
                text: text.to_string(),
                completed: false,
                category: None,
            });
        }
        runtime.today.morning_review = Some("Completed".to_string());
        state.store.save_day_record(&runtime.today)?;
        runtime.today.clone()
    };

    state.publish(SyncMessage::DataUpdated);
    state.log_info(
        "complete_morning_briefing",
        &format!("briefing completed with {} todos", record.todos.len()),
    );
    Ok(record)
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExportBundle {
    pub file_name: String,
    pub contents: String,
}

pub fn export_data_impl(state: &WindowState) -> Result<ExportBundle, InfraError> {
    let bundle = ExportBundle {
        file_name: export_file_name(&today_date_string()),
        contents: state.store.export_contents()?,
    };
    state.log_info("export_data", &format!("exported to {}", bundle.file_name));
    Ok(bundle)
}

pub fn import_data_impl(state: &WindowState, raw: &str) -> Result<usize, InfraError> {
    let imported = state.store.import_contents(raw)?;
    {
        let mut runtime = lock_runtime(state)?;
        runtime.today = state.store.get_or_init_today_record()?;
    }

    state.publish(SyncMessage::DataUpdated);
    state.log_info("import_data", &format!("imported {imported} day records"));
    Ok(imported)
}

/// Summary of a finished day, persisted onto that day's record. Defaults to
/// yesterday, the usual review target.
pub async fn generate_day_summary_impl(
    state: &WindowState,
    generator: &dyn TextGenerator,
    date: Option<String>,
) -> Result<String, InfraError> {
    let date = date
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(yesterday_date_string);

    let Some(mut record) = state.store.get_day_record(&date) else {
        return Ok(summaries::EMPTY_DAY_SUMMARY.to_string());
    };

    let summary = summaries::generate_day_summary(generator, &record).await;
    record.daily_summary = Some(summary.clone());
    state.store.save_day_record(&record)?;
    {
        let mut runtime = lock_runtime(state)?;
        if runtime.today.date == record.date {
            runtime.today = record.clone();
        }
    }

    state.publish(SyncMessage::DataUpdated);
    state.log_info(
        "generate_day_summary",
        &format!("summarized {}", record.date),
    );
    Ok(summary)
}

/// Review over the Monday-to-today stretch of the current week.
pub async fn generate_weekly_review_impl(
    state: &WindowState,
    generator: &dyn TextGenerator,
) -> Result<String, InfraError> {
    let today = today_date_string();
    let week_dates = week_dates(&week_start_date(&today)?)?;
    let all_data = state.store.load_all_data();
    let records = week_dates
        .iter()
        .filter_map(|date| all_data.get(date).cloned())
        .collect::<Vec<_>>();

    let review = summaries::generate_weekly_review(generator, &records).await;
    state.log_info(
        "generate_weekly_review",
        &format!("reviewed week starting {}", week_dates[0]),
    );
    Ok(review)
}

fn week_dates(week_start: &str) -> Result<Vec<String>, InfraError> {
    let start = NaiveDate::parse_from_str(week_start, "%Y-%m-%d")
        .map_err(|error| InfraError::InvalidConfig(format!("date must be YYYY-MM-DD: {error}")))?;
    Ok((0..7)
        .filter_map(|offset| start.checked_add_days(Days::new(offset)))
        .map(|date| date.format("%Y-%m-%d").to_string())
        .collect())
}
