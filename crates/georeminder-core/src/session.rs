//! Tracking session actor.
//!
//! One task owns the [`ReminderStore`], the [`TrackingController`] and the
//! receiving end of the position channel. User commands and position events
//! are handled one at a time in that task, so an evaluation never races a
//! user edit and `stop()` is a hard barrier: once it resolves the receiver has
//! been dropped and no further fix can be evaluated.
//!
//! Callers talk to the actor through a cloneable [`SessionHandle`].

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{PositionError, TrackingError};
use crate::events::Event;
use crate::notify::NotificationDispatcher;
use crate::reminder::{now_ms, NewReminder, Reminder, ReminderStatus, TrackingStatus, UserLocation};
use crate::store::ReminderStore;
use crate::tracking::{PositionEvent, PositionSource, TrackingController, WatchOptions};

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 256;

enum Command {
    Start(oneshot::Sender<Result<(), TrackingError>>),
    Stop(oneshot::Sender<bool>),
    Add(NewReminder, oneshot::Sender<Reminder>),
    Remove(String, oneshot::Sender<bool>),
    Complete(String, oneshot::Sender<Option<Reminder>>),
    Snapshot(Option<ReminderStatus>, oneshot::Sender<Vec<Reminder>>),
    Status(oneshot::Sender<TrackingStatus>),
    Location(oneshot::Sender<Option<UserLocation>>),
    State(oneshot::Sender<Event>),
    Shutdown(oneshot::Sender<()>),
}

enum Wake {
    Position(PositionEvent),
    Closed,
    TimedOut,
}

pub struct TrackingSession {
    store: ReminderStore,
    controller: TrackingController,
    source: Arc<dyn PositionSource>,
    dispatcher: NotificationDispatcher,
    events: broadcast::Sender<Event>,
    commands: mpsc::Receiver<Command>,
    positions: Option<mpsc::UnboundedReceiver<PositionEvent>>,
    fix_deadline: Option<Instant>,
}

impl TrackingSession {
    /// Spawn the session on the current tokio runtime. The join handle hands
    /// the store back after [`SessionHandle::shutdown`].
    pub fn spawn(
        store: ReminderStore,
        source: Arc<dyn PositionSource>,
        dispatcher: NotificationDispatcher,
        options: WatchOptions,
    ) -> (SessionHandle, JoinHandle<ReminderStore>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let handle = SessionHandle {
            commands: cmd_tx,
            events: events.clone(),
            reminders: store.subscribe(),
        };
        let session = Self {
            store,
            controller: TrackingController::new(options),
            source,
            dispatcher,
            events,
            commands: cmd_rx,
            positions: None,
            fix_deadline: None,
        };
        (handle, tokio::spawn(session.run()))
    }

    async fn run(mut self) -> ReminderStore {
        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        self.stop_tracking();
                        break;
                    };
                    if self.handle_command(command).is_break() {
                        break;
                    }
                }
                wake = next_position(&mut self.positions, self.fix_deadline) => {
                    self.handle_wake(wake);
                }
            }
        }
        tracing::debug!("tracking session ended");
        self.store
    }

    fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Start(reply) => {
                let _ = reply.send(self.start_tracking());
            }
            Command::Stop(reply) => {
                let _ = reply.send(self.stop_tracking());
            }
            Command::Add(candidate, reply) => {
                let reminder = self.store.add(candidate);
                self.publish(Event::ReminderAdded {
                    reminder: reminder.clone(),
                    at: Utc::now(),
                });
                let _ = reply.send(reminder);
            }
            Command::Remove(id, reply) => {
                let removed = self.store.remove(&id);
                if removed {
                    self.publish(Event::ReminderRemoved { id, at: Utc::now() });
                }
                let _ = reply.send(removed);
            }
            Command::Complete(id, reply) => {
                let completed = self.store.complete(&id);
                if let Some(reminder) = &completed {
                    self.publish(Event::ReminderCompleted {
                        reminder: reminder.clone(),
                        at: Utc::now(),
                    });
                }
                let _ = reply.send(completed);
            }
            Command::Snapshot(filter, reply) => {
                let snapshot = match filter {
                    Some(status) => self.store.snapshot_filtered(status),
                    None => self.store.snapshot(),
                };
                let _ = reply.send(snapshot);
            }
            Command::Status(reply) => {
                let _ = reply.send(self.controller.status().clone());
            }
            Command::Location(reply) => {
                let _ = reply.send(self.controller.location().copied());
            }
            Command::State(reply) => {
                let _ = reply.send(self.state_snapshot());
            }
            Command::Shutdown(ack) => {
                self.stop_tracking();
                let _ = ack.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn start_tracking(&mut self) -> Result<(), TrackingError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let event = self.controller.start(self.source.as_ref(), tx)?;
        self.positions = Some(rx);
        self.arm_deadline();
        self.dispatcher.request_permission_if_needed();
        self.publish(event);
        Ok(())
    }

    fn stop_tracking(&mut self) -> bool {
        let event = self.controller.stop(self.source.as_ref());
        self.disarm();
        match event {
            Some(event) => {
                self.publish(event);
                true
            }
            None => false,
        }
    }

    fn handle_wake(&mut self, wake: Wake) {
        let events = match wake {
            Wake::Position(PositionEvent::Fix(fix)) => {
                let events = self.controller.handle_fix(fix, &mut self.store, now_ms());
                for reminder in events.iter().filter_map(Event::triggered_reminder) {
                    self.dispatcher.dispatch(reminder);
                }
                events
            }
            Wake::Position(PositionEvent::Error(error)) => {
                self.controller.handle_error(error, self.source.as_ref())
            }
            Wake::TimedOut => {
                let timeout_ms = self.controller.options().timeout_ms;
                self.controller
                    .handle_error(PositionError::Timeout { timeout_ms }, self.source.as_ref())
            }
            Wake::Closed => self
                .controller
                .source_closed(self.source.as_ref())
                .into_iter()
                .collect(),
        };

        if self.controller.is_tracking() {
            self.arm_deadline();
        } else {
            self.disarm();
        }
        for event in events {
            self.publish(event);
        }
    }

    fn arm_deadline(&mut self) {
        let timeout_ms = self.controller.options().timeout_ms;
        self.fix_deadline =
            (timeout_ms > 0).then(|| Instant::now() + Duration::from_millis(timeout_ms));
    }

    fn disarm(&mut self) {
        self.positions = None;
        self.fix_deadline = None;
    }

    fn state_snapshot(&self) -> Event {
        let count = |status: ReminderStatus| {
            self.store
                .reminders()
                .iter()
                .filter(|r| r.status == status)
                .count()
        };
        Event::StateSnapshot {
            status: self.controller.status().clone(),
            location: self.controller.location().copied(),
            active: count(ReminderStatus::Active),
            triggered: count(ReminderStatus::Triggered),
            completed: count(ReminderStatus::Completed),
            at: Utc::now(),
        }
    }

    fn publish(&self, event: Event) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

async fn next_position(
    positions: &mut Option<mpsc::UnboundedReceiver<PositionEvent>>,
    deadline: Option<Instant>,
) -> Wake {
    let Some(rx) = positions.as_mut() else {
        return std::future::pending().await;
    };
    let received = match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(received) => received,
            Err(_) => return Wake::TimedOut,
        },
        None => rx.recv().await,
    };
    match received {
        Some(event) => Wake::Position(event),
        None => Wake::Closed,
    }
}

/// Cloneable front door to a running [`TrackingSession`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<Event>,
    reminders: watch::Receiver<Vec<Reminder>>,
}

impl SessionHandle {
    /// Stream of every event the session produces from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Latest reminder collection, updated after every mutation.
    pub fn reminders(&self) -> watch::Receiver<Vec<Reminder>> {
        self.reminders.clone()
    }

    pub async fn start(&self) -> Result<(), TrackingError> {
        self.request(Command::Start).await?
    }

    /// Stop tracking. Returns false when tracking was not running.
    pub async fn stop(&self) -> Result<bool, TrackingError> {
        self.request(Command::Stop).await
    }

    pub async fn add(&self, candidate: NewReminder) -> Result<Reminder, TrackingError> {
        self.request(|reply| Command::Add(candidate, reply)).await
    }

    pub async fn remove(&self, id: impl Into<String>) -> Result<bool, TrackingError> {
        let id = id.into();
        self.request(|reply| Command::Remove(id, reply)).await
    }

    pub async fn complete(&self, id: impl Into<String>) -> Result<Option<Reminder>, TrackingError> {
        let id = id.into();
        self.request(|reply| Command::Complete(id, reply)).await
    }

    pub async fn snapshot(
        &self,
        filter: Option<ReminderStatus>,
    ) -> Result<Vec<Reminder>, TrackingError> {
        self.request(|reply| Command::Snapshot(filter, reply)).await
    }

    pub async fn status(&self) -> Result<TrackingStatus, TrackingError> {
        self.request(Command::Status).await
    }

    pub async fn location(&self) -> Result<Option<UserLocation>, TrackingError> {
        self.request(Command::Location).await
    }

    /// Counts, status and location in one [`Event::StateSnapshot`].
    pub async fn state(&self) -> Result<Event, TrackingError> {
        self.request(Command::State).await
    }

    /// Stop tracking and end the session task.
    pub async fn shutdown(&self) -> Result<(), TrackingError> {
        self.request(Command::Shutdown).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, TrackingError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| TrackingError::SessionClosed)?;
        rx.await.map_err(|_| TrackingError::SessionClosed)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}
