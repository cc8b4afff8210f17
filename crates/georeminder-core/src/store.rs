//! Reminder store: the canonical, ordered reminder collection.
//!
//! The store is the only writer of `status`, `triggered_at` and
//! `last_distance`. Every mutation is saved through a [`ReminderRepository`]
//! and published to subscribers. Persistence failures never propagate: they
//! are logged and the in-memory collection stays authoritative.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use uuid::Uuid;

use crate::error::PersistenceError;
use crate::geofence::Evaluation;
use crate::reminder::{now_ms, NewReminder, Reminder, ReminderStatus};

/// Durable backing for the reminder collection.
pub trait ReminderRepository: Send {
    /// Short backend name used in log lines.
    fn name(&self) -> &str;

    fn load(&self) -> Result<Vec<Reminder>, PersistenceError>;

    fn save(&self, reminders: &[Reminder]) -> Result<(), PersistenceError>;
}

/// Repository kept in memory. Clones share the same backing vector, so a test
/// can hold one clone and inspect what the store saved.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    saved: Arc<Mutex<Vec<Reminder>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last saved collection.
    pub fn saved(&self) -> Vec<Reminder> {
        self.saved.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl ReminderRepository for MemoryRepository {
    fn name(&self) -> &str {
        "memory"
    }

    fn load(&self) -> Result<Vec<Reminder>, PersistenceError> {
        Ok(self.saved())
    }

    fn save(&self, reminders: &[Reminder]) -> Result<(), PersistenceError> {
        let mut saved = self
            .saved
            .lock()
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        *saved = reminders.to_vec();
        Ok(())
    }
}

/// Ordered reminder collection, newest first.
pub struct ReminderStore {
    reminders: Vec<Reminder>,
    repo: Box<dyn ReminderRepository>,
    tx: watch::Sender<Vec<Reminder>>,
}

impl ReminderStore {
    /// Open the store, loading whatever the repository holds.
    ///
    /// A failed load is logged and the store starts empty.
    pub fn open(repo: impl ReminderRepository + 'static) -> Self {
        let reminders = match repo.load() {
            Ok(reminders) => reminders,
            Err(e) => {
                tracing::warn!(backend = repo.name(), error = %e, "failed to load reminders, starting empty");
                Vec::new()
            }
        };
        tracing::debug!(backend = repo.name(), count = reminders.len(), "reminder store opened");
        let (tx, _rx) = watch::channel(reminders.clone());
        Self {
            reminders,
            repo: Box::new(repo),
            tx,
        }
    }

    /// Store without durable backing.
    pub fn in_memory() -> Self {
        Self::open(MemoryRepository::new())
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn reminders(&self) -> &[Reminder] {
        &self.reminders
    }

    pub fn snapshot(&self) -> Vec<Reminder> {
        self.reminders.clone()
    }

    pub fn snapshot_filtered(&self, status: ReminderStatus) -> Vec<Reminder> {
        self.reminders
            .iter()
            .filter(|r| r.status == status)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Reminder> {
        self.reminders.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.reminders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reminders.is_empty()
    }

    /// Receive a fresh snapshot after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Reminder>> {
        self.tx.subscribe()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Insert a new `Active` reminder at the front.
    pub fn add(&mut self, candidate: NewReminder) -> Reminder {
        let reminder = candidate.into_reminder(Uuid::new_v4().to_string(), now_ms());
        self.reminders.insert(0, reminder.clone());
        tracing::info!(id = %reminder.id, title = %reminder.title, "reminder added");
        self.commit();
        reminder
    }

    /// Delete a reminder. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.reminders.len();
        self.reminders.retain(|r| r.id != id);
        let removed = self.reminders.len() != before;
        if removed {
            tracing::info!(id, "reminder removed");
            self.commit();
        }
        removed
    }

    /// Mark a reminder completed.
    ///
    /// Returns the updated reminder, or `None` when it does not exist or was
    /// already completed. `triggered_at` is left as it was.
    pub fn complete(&mut self, id: &str) -> Option<Reminder> {
        let reminder = self.reminders.iter_mut().find(|r| r.id == id)?;
        if !reminder.status.can_transition_to(ReminderStatus::Completed) {
            return None;
        }
        reminder.status = ReminderStatus::Completed;
        let completed = reminder.clone();
        tracing::info!(id, "reminder completed");
        self.commit();
        Some(completed)
    }

    /// Merge an evaluation computed from an earlier snapshot.
    ///
    /// Only reminders that are still `Active` in the store take the evaluated
    /// record; anything the user completed or removed since the snapshot keeps
    /// its current state, and reminders the evaluation never saw are left
    /// alone. Returns the triggers that were actually applied.
    pub fn apply_evaluation(&mut self, evaluation: Evaluation) -> Vec<Reminder> {
        let Evaluation {
            updated,
            newly_triggered,
        } = evaluation;

        let mut changed = false;
        for next in updated {
            let Some(current) = self.reminders.iter_mut().find(|r| r.id == next.id) else {
                continue;
            };
            if current.status != ReminderStatus::Active {
                continue;
            }
            if next.status != ReminderStatus::Active
                && !current.status.can_transition_to(next.status)
            {
                continue;
            }
            if *current != next {
                *current = next;
                changed = true;
            }
        }

        let applied: Vec<Reminder> = newly_triggered
            .into_iter()
            .filter(|t| {
                self.get(&t.id)
                    .is_some_and(|r| r.status == ReminderStatus::Triggered && r.triggered_at == t.triggered_at)
            })
            .collect();

        if changed {
            self.commit();
        }
        applied
    }

    fn commit(&mut self) {
        if let Err(e) = self.repo.save(&self.reminders) {
            tracing::warn!(backend = self.repo.name(), error = %e, "failed to persist reminders");
        }
        self.tx.send_replace(self.reminders.clone());
    }
}

impl std::fmt::Debug for ReminderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReminderStore")
            .field("backend", &self.repo.name())
            .field("reminders", &self.reminders.len())
            .finish()
    }
}
