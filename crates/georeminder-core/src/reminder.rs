//! Reminder data model.
//!
//! ## Status Transitions
//!
//! ```text
//! Active -> Triggered -> Completed
//! Active -> Completed
//! ```
//!
//! Removal is not a status; a removed reminder simply leaves the store.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::geo::Coordinate;

/// Radius used by the creation form when the user does not pick one.
pub const DEFAULT_RADIUS_METERS: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Active,
    Triggered,
    Completed,
}

impl ReminderStatus {
    /// Whether `self -> next` is a legal (forward-only) transition.
    pub fn can_transition_to(self, next: ReminderStatus) -> bool {
        next.rank() > self.rank()
    }

    /// Position in the lifecycle; never decreases for a given reminder.
    pub fn rank(self) -> u8 {
        match self {
            ReminderStatus::Active => 0,
            ReminderStatus::Triggered => 1,
            ReminderStatus::Completed => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReminderStatus::Active => "active",
            ReminderStatus::Triggered => "triggered",
            ReminderStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReminderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(ReminderStatus::Active),
            "triggered" => Ok(ReminderStatus::Triggered),
            "completed" => Ok(ReminderStatus::Completed),
            other => Err(ValidationError::InvalidValue {
                field: "status".into(),
                message: format!("unknown status '{other}'"),
            }),
        }
    }
}

/// A location-bound reminder.
///
/// Serialized with the camelCase field names the persisted collection has
/// always used; optional fields are omitted when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub original_input: String,
    pub lat: f64,
    pub lng: f64,
    pub radius_meters: f64,
    /// Epoch milliseconds.
    pub created_at: i64,
    pub status: ReminderStatus,
    /// Epoch milliseconds; set once, on `Active -> Triggered`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_at: Option<i64>,
    /// Meters from the user at the last evaluation while active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_distance: Option<f64>,
}

impl Reminder {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }

    /// Text spoken and shown on trigger: `original_input`, or the title if
    /// that is blank.
    pub fn speakable_text(&self) -> &str {
        if self.original_input.trim().is_empty() {
            &self.title
        } else {
            &self.original_input
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ReminderStatus::Active
    }
}

/// Candidate reminder handed to `ReminderStore::add`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReminder {
    pub title: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub original_input: String,
    pub lat: f64,
    pub lng: f64,
    pub radius_meters: f64,
}

impl NewReminder {
    /// Builds a candidate the way the creation form does: the spoken phrase is
    /// `"title: notes"`, or just the title when there are no notes.
    pub fn new(
        title: impl Into<String>,
        notes: impl Into<String>,
        lat: f64,
        lng: f64,
        radius_meters: f64,
    ) -> Self {
        let title = title.into();
        let notes = notes.into();
        let original_input = if notes.is_empty() {
            title.clone()
        } else {
            format!("{title}: {notes}")
        };
        Self {
            title,
            notes,
            original_input,
            lat,
            lng,
            radius_meters,
        }
    }

    /// Checks the constraints the store itself does not enforce.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::Empty("title".into()));
        }
        if !self.radius_meters.is_finite() || self.radius_meters <= 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "radiusMeters".into(),
                message: format!("must be a positive number, got {}", self.radius_meters),
            });
        }
        Coordinate::new(self.lat, self.lng).validate()
    }

    /// Materializes the candidate as an `Active` reminder.
    pub(crate) fn into_reminder(self, id: String, created_at: i64) -> Reminder {
        Reminder {
            id,
            title: self.title,
            notes: self.notes,
            original_input: self.original_input,
            lat: self.lat,
            lng: self.lng,
            radius_meters: self.radius_meters,
            created_at,
            status: ReminderStatus::Active,
            triggered_at: None,
            last_distance: None,
        }
    }
}

/// A single position reading published by the tracking controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserLocation {
    pub lat: f64,
    pub lng: f64,
    /// Radius of uncertainty in meters.
    pub accuracy: f64,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl UserLocation {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

/// Derived tracking state exposed to presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStatus {
    pub active: bool,
    pub error: Option<String>,
    pub last_update: Option<i64>,
}

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Reminder {
        NewReminder::new("Milk", "", 1.0, 2.0, 100.0).into_reminder("r1".into(), 42)
    }

    #[test]
    fn transitions_only_move_forward() {
        use ReminderStatus::*;
        assert!(Active.can_transition_to(Triggered));
        assert!(Active.can_transition_to(Completed));
        assert!(Triggered.can_transition_to(Completed));
        assert!(!Triggered.can_transition_to(Active));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Completed.can_transition_to(Triggered));
        assert!(!Active.can_transition_to(Active));
    }

    #[test]
    fn original_input_joins_title_and_notes() {
        let with_notes = NewReminder::new("Pharmacy", "pick up prescription", 0.0, 0.0, 50.0);
        assert_eq!(with_notes.original_input, "Pharmacy: pick up prescription");
        let bare = NewReminder::new("Pharmacy", "", 0.0, 0.0, 50.0);
        assert_eq!(bare.original_input, "Pharmacy");
    }

    #[test]
    fn speakable_text_falls_back_to_title() {
        let mut r = sample();
        r.original_input = "  ".into();
        assert_eq!(r.speakable_text(), "Milk");
        r.original_input = "Buy milk".into();
        assert_eq!(r.speakable_text(), "Buy milk");
    }

    #[test]
    fn serializes_with_camel_case_and_omits_unset_options() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["radiusMeters"], 100.0);
        assert_eq!(json["createdAt"], 42);
        assert_eq!(json["originalInput"], "Milk");
        assert_eq!(json["status"], "active");
        assert!(json.get("triggeredAt").is_none());
        assert!(json.get("lastDistance").is_none());
    }

    #[test]
    fn validate_rejects_bad_candidates() {
        assert!(NewReminder::new(" ", "", 0.0, 0.0, 10.0).validate().is_err());
        assert!(NewReminder::new("a", "", 0.0, 0.0, 0.0).validate().is_err());
        assert!(NewReminder::new("a", "", 0.0, 0.0, f64::INFINITY).validate().is_err());
        assert!(NewReminder::new("a", "", 95.0, 0.0, 10.0).validate().is_err());
        assert!(NewReminder::new("a", "", 45.0, 9.0, DEFAULT_RADIUS_METERS).validate().is_ok());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Triggered".parse::<ReminderStatus>().unwrap(), ReminderStatus::Triggered);
        assert!("snoozed".parse::<ReminderStatus>().is_err());
    }
}
