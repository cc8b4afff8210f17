//! Alert side effects for triggered reminders.
//!
//! The dispatcher fans each trigger out to three best-effort channels
//! (haptics, a system notification and speech). Every channel runs as a
//! detached blocking job with no join point, so a slow or failing channel can
//! never hold up fix processing. Failures are logged and dropped.

mod channels;

pub use channels::{CommandSpeaker, ConsoleNotifier, LogHaptics, NoHaptics, SilentSpeaker};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::NotificationError;
use crate::reminder::Reminder;

/// Platform notification permission, as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Not asked yet.
    Default,
    Granted,
    Denied,
}

/// Vibration motor or equivalent.
pub trait Haptics: Send + Sync {
    /// `pattern` alternates vibrate/pause durations in milliseconds.
    fn vibrate(&self, pattern: &[u64]) -> Result<(), NotificationError>;
}

/// System-level notifications.
pub trait Notifier: Send + Sync {
    fn permission(&self) -> Permission;

    /// Ask the user for permission. Defaults to reporting the current state.
    fn request_permission(&self) -> Permission {
        self.permission()
    }

    fn show(&self, title: &str, body: &str) -> Result<(), NotificationError>;
}

/// Text-to-speech output.
pub trait Speaker: Send + Sync {
    fn speak(&self, text: &str) -> Result<(), NotificationError>;
}

/// Which channels fire and how.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    pub notifications: bool,
    pub vibration: bool,
    pub vibration_pattern: Vec<u64>,
    pub title: String,
    pub speech: bool,
    /// `{text}` is replaced with the reminder's spoken phrase.
    pub speech_template: String,
    pub max_in_flight: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            notifications: true,
            vibration: true,
            vibration_pattern: vec![400, 200, 400],
            title: "📍 Arrival Alert".into(),
            speech: true,
            speech_template: "You are near to {text}. Buy the product.".into(),
            max_in_flight: 8,
        }
    }
}

impl DispatcherConfig {
    pub fn speech_for(&self, reminder: &Reminder) -> String {
        self.speech_template.replace("{text}", reminder.speakable_text())
    }
}

/// Fans triggered reminders out to the alert channels.
#[derive(Clone)]
pub struct NotificationDispatcher {
    haptics: Arc<dyn Haptics>,
    notifier: Arc<dyn Notifier>,
    speaker: Arc<dyn Speaker>,
    config: DispatcherConfig,
    permits: Arc<Semaphore>,
}

impl NotificationDispatcher {
    pub fn new(
        haptics: Arc<dyn Haptics>,
        notifier: Arc<dyn Notifier>,
        speaker: Arc<dyn Speaker>,
        config: DispatcherConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
        Self {
            haptics,
            notifier,
            speaker,
            config,
            permits,
        }
    }

    /// Dispatcher with every channel disabled.
    pub fn silent() -> Self {
        Self::new(
            Arc::new(NoHaptics),
            Arc::new(ConsoleNotifier::denied()),
            Arc::new(SilentSpeaker),
            DispatcherConfig {
                notifications: false,
                vibration: false,
                speech: false,
                ..DispatcherConfig::default()
            },
        )
    }

    /// Ask for notification permission once, if it has never been asked.
    /// Runs detached like every other alert job.
    pub fn request_permission_if_needed(&self) {
        if !self.config.notifications {
            return;
        }
        let notifier = Arc::clone(&self.notifier);
        self.spawn("permission", move || {
            if notifier.permission() == Permission::Default {
                let granted = notifier.request_permission();
                tracing::info!(permission = ?granted, "notification permission requested");
            }
            Ok(())
        });
    }

    /// Fire every enabled channel for `reminder`. Returns how many jobs were
    /// started; jobs that do not fit under `max_in_flight` are dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, reminder: &Reminder) -> usize {
        let mut started = 0;

        if self.config.vibration {
            let haptics = Arc::clone(&self.haptics);
            let pattern = self.config.vibration_pattern.clone();
            started += usize::from(self.spawn("haptics", move || haptics.vibrate(&pattern)));
        }

        if self.config.notifications {
            let notifier = Arc::clone(&self.notifier);
            let title = self.config.title.clone();
            let body = reminder.speakable_text().to_string();
            started += usize::from(self.spawn("notification", move || {
                if notifier.permission() != Permission::Granted {
                    return Err(NotificationError::PermissionDenied);
                }
                notifier.show(&title, &body)
            }));
        }

        if self.config.speech {
            let speaker = Arc::clone(&self.speaker);
            let text = self.config.speech_for(reminder);
            started += usize::from(self.spawn("speech", move || speaker.speak(&text)));
        }

        started
    }

    fn spawn<F>(&self, channel: &'static str, job: F) -> bool
    where
        F: FnOnce() -> Result<(), NotificationError> + Send + 'static,
    {
        let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
            tracing::warn!(channel, "alert jobs saturated, dropping");
            return false;
        };
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            match job() {
                Ok(()) => tracing::debug!(channel, "alert delivered"),
                Err(e @ NotificationError::Unsupported { .. })
                | Err(e @ NotificationError::PermissionDenied) => {
                    tracing::debug!(channel, reason = %e, "alert skipped")
                }
                Err(e) => tracing::warn!(channel, error = %e, "alert failed"),
            }
        });
        true
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("config", &self.config)
            .field("available_permits", &self.permits.available_permits())
            .finish()
    }
}
