//! Platform attention surfaces behind trait seams: the completion sound cue
//! and the notification/focus mechanisms. Real playback and notification
//! delivery live outside this crate; failures here degrade a single feature
//! and never reach the timer state machine.

use crate::infrastructure::error::InfraError;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Audio cue played when an interval completes.
pub trait CompletionCue: Send + Sync {
    fn play(&self) -> Result<(), InfraError>;
}

/// Cue that plays nothing, for headless use.
#[derive(Debug, Default)]
pub struct SilentCue;

impl CompletionCue for SilentCue {
    fn play(&self) -> Result<(), InfraError> {
        Ok(())
    }
}

/// Attention mechanisms: permission-gated desktop notifications for the main
/// window, foreground focus for the mini window.
pub trait AttentionSignal: Send + Sync {
    /// Idempotent permission request; returns whether notifications are
    /// currently granted.
    fn request_permission(&self) -> bool;
    fn notify(&self, title: &str, body: &str, tag: &str);
    fn focus_window(&self);
}

/// Signal that grants nothing and surfaces nothing, for headless use.
#[derive(Debug, Default)]
pub struct NoopAttention;

impl AttentionSignal for NoopAttention {
    fn request_permission(&self) -> bool {
        false
    }

    fn notify(&self, _title: &str, _body: &str, _tag: &str) {}

    fn focus_window(&self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedNotification {
    pub title: String,
    pub body: String,
    pub tag: String,
}

/// Test double that counts plays and optionally fails, to exercise the
/// swallow-and-continue policy.
#[derive(Debug, Default)]
pub struct RecordingCue {
    plays: AtomicUsize,
    fail: bool,
}

impl RecordingCue {
    pub fn failing() -> Self {
        Self {
            plays: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::Relaxed)
    }
}

impl CompletionCue for RecordingCue {
    fn play(&self) -> Result<(), InfraError> {
        self.plays.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            return Err(InfraError::InvalidConfig(
                "audio playback blocked".to_string(),
            ));
        }
        Ok(())
    }
}

/// Test double with a configurable permission grant that records every
/// notification and focus request.
#[derive(Debug)]
pub struct RecordingAttention {
    granted: bool,
    permission_requests: AtomicUsize,
    focus_requests: AtomicUsize,
    notifications: Mutex<Vec<RecordedNotification>>,
}

impl RecordingAttention {
    pub fn granting(granted: bool) -> Self {
        Self {
            granted,
            permission_requests: AtomicUsize::new(0),
            focus_requests: AtomicUsize::new(0),
            notifications: Mutex::new(Vec::new()),
        }
    }

    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::Relaxed)
    }

    pub fn focus_requests(&self) -> usize {
        self.focus_requests.load(Ordering::Relaxed)
    }

    pub fn notifications(&self) -> Vec<RecordedNotification> {
        self.notifications
            .lock()
            .map(|notifications| notifications.clone())
            .unwrap_or_default()
    }
}

impl AttentionSignal for RecordingAttention {
    fn request_permission(&self) -> bool {
        self.permission_requests.fetch_add(1, Ordering::Relaxed);
        self.granted
    }

    fn notify(&self, title: &str, body: &str, tag: &str) {
        if let Ok(mut notifications) = self.notifications.lock() {
            notifications.push(RecordedNotification {
                title: title.to_string(),
                body: body.to_string(),
                tag: tag.to_string(),
            });
        }
    }

    fn focus_window(&self) {
        self.focus_requests.fetch_add(1, Ordering::Relaxed);
    }
}
