//! Per-window countdown state machine and the cross-window sync protocol.
//!
//! The engine is deliberately pure: commands come in, effects go out, and the
//! session layer owns clocks, channels, and side effects. Sibling windows tick
//! independently and converge through periodic `SYNC_STATE` broadcasts with a
//! dead-band reconciliation rule, so normal one-second skew never causes
//! oscillation.

use crate::domain::models::FALLBACK_INTERVAL_MINUTES;
use serde::{Deserialize, Serialize};

/// Countdown seconds between periodic state broadcasts while active.
pub const SYNC_PERIOD_SECONDS: u32 = 2;
/// Maximum disagreement between sibling countdowns before snapping to the
/// received value.
pub const DRIFT_TOLERANCE_SECONDS: u32 = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerAction {
    Start,
    Pause,
    Reset,
}

/// Wire messages exchanged between windows over the broadcast channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncMessage {
    #[serde(rename_all = "camelCase")]
    SyncState { time_left: u32, is_active: bool },
    Action { action: TimerAction },
    TimerComplete,
    DataUpdated,
}

/// Side effects the session layer must carry out after a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEffect {
    Publish(SyncMessage),
    /// Best-effort, fire-and-forget; never blocks or fails the transition
    /// that produced it.
    RequestNotificationPermission,
    Complete {
        originated_locally: bool,
    },
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub time_left: u32,
    pub is_active: bool,
}

/// Dead-band reconciliation: keep the local countdown unless the received one
/// disagrees by more than the drift tolerance.
pub fn reconcile_time_left(local: u32, remote: u32) -> u32 {
    if local.abs_diff(remote) > DRIFT_TOLERANCE_SECONDS {
        remote
    } else {
        local
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEngine {
    interval_seconds: u32,
    time_left: u32,
    is_active: bool,
}

impl TimerEngine {
    pub fn new(interval_minutes: u32) -> Self {
        let interval_seconds = coerce_interval_minutes(interval_minutes) * 60;
        Self {
            interval_seconds,
            time_left: interval_seconds,
            is_active: false,
        }
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn interval_seconds(&self) -> u32 {
        self.interval_seconds
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            time_left: self.time_left,
            is_active: self.is_active,
        }
    }

    /// Start/pause toggle. Local-first: the state flips regardless of whether
    /// the published action ever reaches a sibling.
    pub fn toggle(&mut self) -> Vec<EngineEffect> {
        self.is_active = !self.is_active;
        if self.is_active {
            vec![
                EngineEffect::RequestNotificationPermission,
                EngineEffect::Publish(SyncMessage::Action {
                    action: TimerAction::Start,
                }),
            ]
        } else {
            vec![EngineEffect::Publish(SyncMessage::Action {
                action: TimerAction::Pause,
            })]
        }
    }

    /// One firing of the per-window one-second callback.
    pub fn tick(&mut self) -> Vec<EngineEffect> {
        if !self.is_active || self.time_left == 0 {
            return Vec::new();
        }

        self.time_left -= 1;
        if self.time_left == 0 {
            // Clearing the active flag here is the exactly-once guard: a
            // second zero observation cannot re-enter completion.
            self.is_active = false;
            return vec![
                EngineEffect::Complete {
                    originated_locally: true,
                },
                EngineEffect::Publish(SyncMessage::TimerComplete),
            ];
        }

        if self.time_left % SYNC_PERIOD_SECONDS == 0 {
            return vec![EngineEffect::Publish(SyncMessage::SyncState {
                time_left: self.time_left,
                is_active: true,
            })];
        }

        Vec::new()
    }

    /// Apply a sibling window's message. Never re-publishes, which is what
    /// breaks the echo cycle between windows.
    pub fn apply_remote(&mut self, message: &SyncMessage) -> Vec<EngineEffect> {
        match message {
            SyncMessage::SyncState {
                time_left,
                is_active,
            } => {
                self.time_left = reconcile_time_left(self.time_left, *time_left);
                self.is_active = *is_active;
                Vec::new()
            }
            SyncMessage::Action { action } => {
                match action {
                    TimerAction::Start => self.is_active = true,
                    TimerAction::Pause => self.is_active = false,
                    TimerAction::Reset => {
                        self.is_active = false;
                        self.time_left = self.interval_seconds;
                    }
                }
                Vec::new()
            }
            SyncMessage::TimerComplete => {
                if !self.is_active && self.time_left == 0 {
                    // Already completed this interval; duplicates are no-ops.
                    return Vec::new();
                }
                self.is_active = false;
                self.time_left = 0;
                vec![EngineEffect::Complete {
                    originated_locally: false,
                }]
            }
            // Record reloads happen at the session layer.
            SyncMessage::DataUpdated => Vec::new(),
        }
    }

    /// Fresh inactive countdown (interval close-out path).
    pub fn reset(&mut self) {
        self.is_active = false;
        self.time_left = self.interval_seconds;
    }

    /// A new duration applies immediately while idle; an in-flight countdown
    /// is never truncated or extended and picks the new duration up on the
    /// next reset.
    pub fn set_interval_minutes(&mut self, interval_minutes: u32) {
        self.interval_seconds = coerce_interval_minutes(interval_minutes) * 60;
        if !self.is_active {
            self.time_left = self.interval_seconds;
        }
    }
}

fn coerce_interval_minutes(interval_minutes: u32) -> u32 {
    if interval_minutes == 0 {
        FALLBACK_INTERVAL_MINUTES
    } else {
        interval_minutes
    }
}
