//! Reminder management commands for CLI.

use clap::Subcommand;
use georeminder_core::{
    Config, Database, HeuristicAssist, NewReminder, ReminderStatus, ReminderStore, TextAssist,
};

#[derive(Subcommand)]
pub enum ReminderAction {
    /// Create a new reminder
    Add {
        /// Reminder title
        title: String,
        /// Additional context
        #[arg(long, default_value = "")]
        notes: String,
        /// Latitude in degrees
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Longitude in degrees
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        /// Trigger radius in meters (default: reminders.default_radius_meters)
        #[arg(long)]
        radius: Option<f64>,
        /// Rewrite title and notes with the text assist first
        #[arg(long)]
        suggest: bool,
    },
    /// List reminders, newest first
    List {
        /// Filter by status (active, triggered, completed)
        #[arg(long)]
        status: Option<ReminderStatus>,
    },
    /// Show one reminder
    Show {
        /// Reminder ID
        id: String,
    },
    /// Mark a reminder as completed
    Complete {
        /// Reminder ID
        id: String,
    },
    /// Delete a reminder
    Remove {
        /// Reminder ID
        id: String,
    },
    /// Suggest a short title and notes for free-form text
    Suggest {
        /// Free-form reminder text
        text: String,
    },
}

pub(crate) fn open_store() -> Result<ReminderStore, Box<dyn std::error::Error>> {
    let db = Database::open()?;
    tracing::debug!(path = ?db.path(), "reminder database opened");
    Ok(ReminderStore::open(db))
}

pub fn run(action: ReminderAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ReminderAction::Add {
            title,
            notes,
            lat,
            lng,
            radius,
            suggest,
        } => {
            let (title, notes) = if suggest {
                let text = if notes.is_empty() {
                    title.clone()
                } else {
                    format!("{title} {notes}")
                };
                match HeuristicAssist::default().suggest(&text) {
                    Some(s) => (s.title, s.notes),
                    None => (title, notes),
                }
            } else {
                (title, notes)
            };
            let radius = match radius {
                Some(r) => r,
                None => Config::load()?.reminders.default_radius_meters,
            };

            let candidate = NewReminder::new(title, notes, lat, lng, radius);
            candidate.validate()?;
            let reminder = open_store()?.add(candidate);
            println!("Reminder added: {}", reminder.id);
            println!("{}", serde_json::to_string_pretty(&reminder)?);
        }
        ReminderAction::List { status } => {
            let store = open_store()?;
            let reminders = match status {
                Some(status) => store.snapshot_filtered(status),
                None => store.snapshot(),
            };
            println!("{}", serde_json::to_string_pretty(&reminders)?);
        }
        ReminderAction::Show { id } => {
            let store = open_store()?;
            let reminder = store.get(&id).ok_or(format!("Reminder not found: {id}"))?;
            println!("{}", serde_json::to_string_pretty(reminder)?);
        }
        ReminderAction::Complete { id } => {
            let reminder = open_store()?
                .complete(&id)
                .ok_or(format!("Reminder not found or already completed: {id}"))?;
            println!("Reminder completed: {id}");
            println!("{}", serde_json::to_string_pretty(&reminder)?);
        }
        ReminderAction::Remove { id } => {
            if open_store()?.remove(&id) {
                println!("Reminder removed: {id}");
            } else {
                println!("No reminder with id {id}");
            }
        }
        ReminderAction::Suggest { text } => {
            let suggestion = HeuristicAssist::default()
                .suggest(&text)
                .ok_or("nothing to suggest for empty text")?;
            println!("{}", serde_json::to_string_pretty(&suggestion)?);
        }
    }
    Ok(())
}
