//! FocusFlow backend: a multi-window focus timer with cross-window
//! synchronization, JSON persistence, and AI-assisted reviews.
//!
//! Every window runs its own countdown engine; windows converge through a
//! broadcast bus carrying periodic state snapshots, control actions, and an
//! exactly-once completion signal. Day records and settings live in a shared
//! JSON file store.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::commands::{SettingsPatch, WindowMode, WindowState};
pub use application::session::run_window_session;
pub use domain::models::{AppSettings, DayRecord, IntervalLog, TodoItem};
pub use domain::timer::{SyncMessage, TimerEngine, TimerSnapshot};
pub use infrastructure::bus::{BroadcastBus, Envelope, MessageBus};
pub use infrastructure::error::InfraError;
pub use infrastructure::store::FileStore;
