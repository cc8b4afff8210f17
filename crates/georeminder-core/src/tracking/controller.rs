//! Location tracking controller.
//!
//! The controller is a plain state machine with no internal task: the caller
//! owns the receiving end of the position channel and hands each event to
//! [`TrackingController::handle_fix`] or [`TrackingController::handle_error`].
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Tracking -> Idle
//! ```
//!
//! A terminal position error (permission denied, provider gone) also moves
//! Tracking back to Idle. Transient errors only update the status text.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::source::{Fix, PositionSink, PositionSource, WatchId, WatchOptions};
use crate::error::{PositionError, TrackingError};
use crate::events::Event;
use crate::geofence::evaluate;
use crate::reminder::{TrackingStatus, UserLocation};
use crate::store::ReminderStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingState {
    Idle,
    Tracking,
}

#[derive(Debug, Clone)]
pub struct TrackingController {
    state: TrackingState,
    options: WatchOptions,
    watch: Option<WatchId>,
    status: TrackingStatus,
    location: Option<UserLocation>,
}

impl TrackingController {
    pub fn new(options: WatchOptions) -> Self {
        Self {
            state: TrackingState::Idle,
            options,
            watch: None,
            status: TrackingStatus::default(),
            location: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.state == TrackingState::Tracking
    }

    pub fn options(&self) -> &WatchOptions {
        &self.options
    }

    pub fn status(&self) -> &TrackingStatus {
        &self.status
    }

    pub fn location(&self) -> Option<&UserLocation> {
        self.location.as_ref()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Open a watch on `source` delivering into `sink`.
    ///
    /// On failure the controller stays Idle and the error text is recorded
    /// in the status.
    pub fn start(
        &mut self,
        source: &dyn PositionSource,
        sink: PositionSink,
    ) -> Result<Event, TrackingError> {
        if self.is_tracking() {
            return Err(TrackingError::AlreadyTracking);
        }
        if !source.is_supported() {
            return Err(self.record_start_failure(TrackingError::UnsupportedPositioning));
        }
        let id = source
            .watch(&self.options, sink)
            .map_err(|e| self.record_start_failure(e))?;

        self.watch = Some(id);
        self.state = TrackingState::Tracking;
        self.status.active = true;
        self.status.error = None;
        tracing::info!(watch = id.0, high_accuracy = self.options.high_accuracy, "tracking started");
        Ok(Event::TrackingStarted {
            options: self.options,
            at: Utc::now(),
        })
    }

    fn record_start_failure(&mut self, error: TrackingError) -> TrackingError {
        tracing::warn!(error = %error, "failed to start tracking");
        self.status.error = Some(error.to_string());
        error
    }

    /// Cancel the watch. Returns `None` when already Idle.
    pub fn stop(&mut self, source: &dyn PositionSource) -> Option<Event> {
        self.close(source)?;
        tracing::info!("tracking stopped");
        Some(Event::TrackingStopped {
            reason: None,
            at: Utc::now(),
        })
    }

    /// The source dropped its end of the channel; nothing more will arrive.
    pub fn source_closed(&mut self, source: &dyn PositionSource) -> Option<Event> {
        self.close(source)?;
        tracing::info!("position source closed the subscription");
        Some(Event::TrackingStopped {
            reason: Some("position source closed".into()),
            at: Utc::now(),
        })
    }

    fn close(&mut self, source: &dyn PositionSource) -> Option<()> {
        if !self.is_tracking() {
            return None;
        }
        if let Some(id) = self.watch.take() {
            source.clear_watch(id);
        }
        self.state = TrackingState::Idle;
        self.status.active = false;
        Some(())
    }

    /// Process one fix: publish the location, evaluate every reminder in the
    /// store and apply the result. Returns the position update followed by
    /// one `ReminderTriggered` per crossing. A fix with impossible
    /// coordinates is recorded as a transient error and never evaluated.
    pub fn handle_fix(&mut self, fix: Fix, store: &mut ReminderStore, now_ms: i64) -> Vec<Event> {
        if let Err(error) = fix.validate() {
            return vec![self.record_error(&error)];
        }
        let location = UserLocation {
            lat: fix.lat,
            lng: fix.lng,
            accuracy: fix.accuracy_meters,
            timestamp: now_ms,
        };
        self.location = Some(location);
        self.status.last_update = Some(now_ms);
        self.status.error = None;

        let evaluation = evaluate(&location, store.reminders(), now_ms);
        let triggered = store.apply_evaluation(evaluation);
        tracing::debug!(
            lat = fix.lat,
            lng = fix.lng,
            accuracy = fix.accuracy_meters,
            triggered = triggered.len(),
            "fix evaluated"
        );

        let at = Utc::now();
        let mut events = Vec::with_capacity(triggered.len() + 1);
        events.push(Event::PositionUpdated { location, at });
        for reminder in triggered {
            tracing::info!(id = %reminder.id, title = %reminder.title, "reminder triggered");
            events.push(Event::ReminderTriggered {
                distance_meters: reminder.last_distance.unwrap_or_default(),
                reminder,
                at,
            });
        }
        events
    }

    /// Record a source error. Terminal errors close the watch.
    pub fn handle_error(&mut self, error: PositionError, source: &dyn PositionSource) -> Vec<Event> {
        let mut events = vec![self.record_error(&error)];
        if error.is_terminal() && self.close(source).is_some() {
            events.push(Event::TrackingStopped {
                reason: self.status.error.clone(),
                at: Utc::now(),
            });
        }
        events
    }
}

impl TrackingController {
    fn record_error(&mut self, error: &PositionError) -> Event {
        let terminal = error.is_terminal();
        let message = error.to_string();
        tracing::warn!(error = %message, terminal, "position error");
        self.status.error = Some(message.clone());
        Event::PositionFailed {
            message,
            terminal,
            at: Utc::now(),
        }
    }
}

impl Default for TrackingController {
    fn default() -> Self {
        Self::new(WatchOptions::default())
    }
}
