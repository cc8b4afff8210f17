use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reminder::{Reminder, TrackingStatus, UserLocation};
use crate::tracking::WatchOptions;

/// Every state change in a tracking session produces an Event.
/// Presentation layers subscribe to them; the CLI prints them as JSON lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    ReminderAdded {
        reminder: Reminder,
        at: DateTime<Utc>,
    },
    ReminderRemoved {
        id: String,
        at: DateTime<Utc>,
    },
    ReminderCompleted {
        reminder: Reminder,
        at: DateTime<Utc>,
    },
    TrackingStarted {
        options: WatchOptions,
        at: DateTime<Utc>,
    },
    /// Subscription closed, either on request or because the source ended it.
    TrackingStopped {
        reason: Option<String>,
        at: DateTime<Utc>,
    },
    PositionUpdated {
        location: UserLocation,
        at: DateTime<Utc>,
    },
    /// The position source reported an error. Terminal errors also stop
    /// tracking.
    PositionFailed {
        message: String,
        terminal: bool,
        at: DateTime<Utc>,
    },
    /// A reminder crossed into its radius on the latest fix.
    ReminderTriggered {
        reminder: Reminder,
        distance_meters: f64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        status: TrackingStatus,
        location: Option<UserLocation>,
        active: usize,
        triggered: usize,
        completed: usize,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Reminder carried by a trigger event.
    pub fn triggered_reminder(&self) -> Option<&Reminder> {
        match self {
            Event::ReminderTriggered { reminder, .. } => Some(reminder),
            _ => None,
        }
    }
}
