//! # GeoReminder Core Library
//!
//! This library provides the core logic for location-based reminders: a
//! reminder is tied to a point and a radius, and fires once when a position
//! fix lands inside that radius. It follows a CLI-first layout where every
//! operation is reachable from the standalone `georeminder-cli` binary.
//!
//! ## Architecture
//!
//! - **Geofence Evaluator**: a pure function from (fix, reminders) to the
//!   updated reminders plus the ones that just crossed into their radius
//! - **Reminder Store**: ordered collection with a one-way status latch,
//!   persisted to SQLite and observable through a `watch` channel
//! - **Tracking**: position sources, a controller state machine, and a
//!   single-writer session actor that serializes fixes with user edits
//! - **Notify**: fire-and-forget haptic, notification and speech alerts
//!
//! ## Key Components
//!
//! - [`evaluate`]: geofence evaluation
//! - [`ReminderStore`]: canonical reminder collection
//! - [`TrackingSession`]: async actor driving a tracking session
//! - [`NotificationDispatcher`]: bounded alert side effects
//! - [`Config`]: application configuration management

pub mod assist;
pub mod error;
pub mod events;
pub mod geo;
pub mod geofence;
pub mod notify;
pub mod reminder;
pub mod session;
pub mod storage;
pub mod store;
pub mod tracking;

pub use assist::{HeuristicAssist, Suggestion, TextAssist};
pub use error::{
    ConfigError, CoreError, NotificationError, PersistenceError, PositionError, TrackingError,
    ValidationError,
};
pub use events::Event;
pub use geo::{distance_meters, format_distance, Coordinate};
pub use geofence::{evaluate, Evaluation};
pub use notify::{DispatcherConfig, Haptics, NotificationDispatcher, Notifier, Permission, Speaker};
pub use reminder::{
    NewReminder, Reminder, ReminderStatus, TrackingStatus, UserLocation, DEFAULT_RADIUS_METERS,
};
pub use session::{SessionHandle, TrackingSession};
pub use storage::{Config, Database};
pub use store::{MemoryRepository, ReminderRepository, ReminderStore};
pub use tracking::{PositionSource, TrackingController, TrackingState, WatchOptions};
