//! JSON file persistence mirroring the two browser storage keys: one blob of
//! day records keyed by date, one settings document.
//!
//! The store is the only resource shared between windows, and writes are
//! whole-record replace after a fresh read with no versioning. Two windows
//! updating the same day in quick succession keep the last writer's record;
//! this is an accepted property of the format, not an oversight.

use crate::domain::models::{AppSettings, DayRecord};
use crate::infrastructure::error::InfraError;
use chrono::{Datelike, Days, Local, NaiveDate, Weekday};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DATA_FILE: &str = "focusflow_data.json";
pub const SETTINGS_FILE: &str = "focusflow_settings.json";

pub fn today_date_string() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

pub fn yesterday_date_string() -> String {
    let today = Local::now().date_naive();
    let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
    yesterday.format("%Y-%m-%d").to_string()
}

/// Monday of the week containing `date`, for weekly review windows.
pub fn week_start_date(date: &str) -> Result<String, InfraError> {
    let parsed = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|error| InfraError::InvalidConfig(format!("date must be YYYY-MM-DD: {error}")))?;
    let offset = parsed.weekday().days_since(Weekday::Mon);
    let monday = parsed
        .checked_sub_days(Days::new(u64::from(offset)))
        .unwrap_or(parsed);
    Ok(monday.format("%Y-%m-%d").to_string())
}

pub fn export_file_name(date: &str) -> String {
    format!("focusflow_backup_{date}.json")
}

#[derive(Debug, Clone)]
pub struct FileStore {
    data_path: PathBuf,
    settings_path: PathBuf,
}

impl FileStore {
    pub fn new(state_dir: &Path, config_dir: &Path) -> Self {
        Self {
            data_path: state_dir.join(DATA_FILE),
            settings_path: config_dir.join(SETTINGS_FILE),
        }
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Missing or malformed data is treated as an empty store, never as a
    /// fatal error.
    pub fn load_all_data(&self) -> BTreeMap<String, DayRecord> {
        let Ok(raw) = fs::read_to_string(&self.data_path) else {
            return BTreeMap::new();
        };
        serde_json::from_str(&raw).unwrap_or_default()
    }

    pub fn get_day_record(&self, date: &str) -> Option<DayRecord> {
        self.load_all_data().remove(date)
    }

    /// Replaces the entry keyed by `record.date` (read-modify-write of the
    /// whole blob, last writer wins).
    pub fn save_day_record(&self, record: &DayRecord) -> Result<(), InfraError> {
        record.validate().map_err(InfraError::InvalidConfig)?;
        let mut all_data = self.load_all_data();
        all_data.insert(record.date.clone(), record.clone());
        self.write_all_data(&all_data)
    }

    pub fn get_or_init_today_record(&self) -> Result<DayRecord, InfraError> {
        let today = today_date_string();
        if let Some(existing) = self.get_day_record(&today) {
            return Ok(existing);
        }
        let record = DayRecord::new(today);
        self.save_day_record(&record)?;
        Ok(record)
    }

    /// Persisted values merge over defaults; a missing or malformed file
    /// degrades to the defaults.
    pub fn load_settings(&self) -> AppSettings {
        let Ok(raw) = fs::read_to_string(&self.settings_path) else {
            return AppSettings::default();
        };
        serde_json::from_str(&raw).unwrap_or_default()
    }

    pub fn save_settings(&self, settings: &AppSettings) -> Result<(), InfraError> {
        let formatted = serde_json::to_string_pretty(settings)?;
        fs::write(&self.settings_path, format!("{formatted}\n"))?;
        Ok(())
    }

    pub fn export_contents(&self) -> Result<String, InfraError> {
        let all_data = self.load_all_data();
        Ok(serde_json::to_string_pretty(&all_data)?)
    }

    /// Full overwrite with a pre-validated bundle; any parse or validation
    /// failure leaves the store untouched.
    pub fn import_contents(&self, raw: &str) -> Result<usize, InfraError> {
        let imported = parse_import(raw)?;
        let count = imported.len();
        self.write_all_data(&imported)?;
        Ok(count)
    }

    fn write_all_data(&self, all_data: &BTreeMap<String, DayRecord>) -> Result<(), InfraError> {
        let formatted = serde_json::to_string_pretty(all_data)?;
        fs::write(&self.data_path, format!("{formatted}\n"))?;
        Ok(())
    }
}

pub fn parse_import(raw: &str) -> Result<BTreeMap<String, DayRecord>, InfraError> {
    let imported: BTreeMap<String, DayRecord> = serde_json::from_str(raw)?;
    for (date, record) in &imported {
        record.validate().map_err(InfraError::InvalidConfig)?;
        if *date != record.date {
            return Err(InfraError::InvalidConfig(format!(
                "record keyed by {} has date {}",
                date, record.date
            )));
        }
    }
    Ok(imported)
}
