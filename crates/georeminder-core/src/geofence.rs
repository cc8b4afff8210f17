//! Geofence evaluation.
//!
//! [`evaluate`] is a pure transform: given a fix, the current reminders and the
//! evaluation time, it returns the updated collection and the reminders that
//! crossed into their radius on this fix. It has no side effects; speech and
//! notifications are layered on top of `newly_triggered` by the caller.
//!
//! Triggering is a one-shot latch. Only `Active` reminders are measured, so a
//! reminder that is already `Triggered` or `Completed` passes through
//! untouched and can never fire again.

use serde::{Deserialize, Serialize};

use crate::reminder::{Reminder, ReminderStatus, UserLocation};

/// Output of one evaluation cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Every input reminder, in input order, with updated distance/status.
    pub updated: Vec<Reminder>,
    /// Reminders that transitioned `Active -> Triggered` on this fix.
    pub newly_triggered: Vec<Reminder>,
}

impl Evaluation {
    pub fn triggered_ids(&self) -> Vec<&str> {
        self.newly_triggered.iter().map(|r| r.id.as_str()).collect()
    }
}

/// Evaluates `reminders` against `fix` at time `now_ms` (epoch ms).
pub fn evaluate(fix: &UserLocation, reminders: &[Reminder], now_ms: i64) -> Evaluation {
    let mut newly_triggered = Vec::new();

    let updated = reminders
        .iter()
        .map(|reminder| {
            if !reminder.is_active() {
                return reminder.clone();
            }

            let d = fix.coordinate().distance_to(&reminder.coordinate());
            if d <= reminder.radius_meters {
                let triggered = Reminder {
                    status: ReminderStatus::Triggered,
                    triggered_at: Some(now_ms),
                    last_distance: Some(d),
                    ..reminder.clone()
                };
                newly_triggered.push(triggered.clone());
                triggered
            } else {
                Reminder {
                    last_distance: Some(d),
                    ..reminder.clone()
                }
            }
        })
        .collect();

    Evaluation {
        updated,
        newly_triggered,
    }
}
