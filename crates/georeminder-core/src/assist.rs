//! Reminder text suggestions.
//!
//! A [`TextAssist`] turns free-form input ("buy milk and eggs when I pass
//! the corner shop") into a short title plus notes. Suggestions only ever
//! pre-fill the creation form; nothing in triggering depends on them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub title: String,
    pub notes: String,
}

pub trait TextAssist: Send + Sync {
    /// Returns `None` when there is nothing worth suggesting.
    fn suggest(&self, text: &str) -> Option<Suggestion>;
}

/// Local rule-based assist.
///
/// The title is the first sentence or clause, trimmed to `max_title_chars`
/// on a word boundary. Everything after it becomes the notes.
#[derive(Debug, Clone)]
pub struct HeuristicAssist {
    pub max_title_chars: usize,
}

impl Default for HeuristicAssist {
    fn default() -> Self {
        Self { max_title_chars: 40 }
    }
}

const CLAUSE_BREAKS: [char; 5] = ['.', '!', '?', ';', '\n'];
const SOFT_BREAKS: [&str; 4] = [", ", " when ", " at ", " near "];

impl TextAssist for HeuristicAssist {
    fn suggest(&self, text: &str) -> Option<Suggestion> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let (head, rest) = split_first_clause(text);
        let (title, overflow) = truncate_words(head, self.max_title_chars.max(1));

        let notes = [overflow, rest]
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Some(Suggestion {
            title: capitalize(title.trim()),
            notes,
        })
    }
}

fn split_first_clause(text: &str) -> (&str, &str) {
    if let Some(i) = text.find(CLAUSE_BREAKS) {
        let (head, rest) = text.split_at(i);
        if !head.trim().is_empty() {
            return (head, &rest[1..]);
        }
    }
    let soft = SOFT_BREAKS
        .iter()
        .filter_map(|b| text.find(b).map(|i| (i, b.len())))
        .min();
    match soft {
        Some((i, len)) if i > 0 => {
            let rest = &text[i..];
            // Keep the connective word ("when", "at") in the notes.
            let rest = if rest.starts_with(", ") { &rest[len..] } else { rest };
            (&text[..i], rest)
        }
        _ => (text, ""),
    }
}

fn truncate_words(text: &str, max_chars: usize) -> (&str, &str) {
    if text.chars().count() <= max_chars {
        return (text, "");
    }
    let cut = text
        .char_indices()
        .nth(max_chars)
        .map_or(text.len(), |(i, _)| i);
    let split = text[..cut].rfind(char::is_whitespace).unwrap_or(cut);
    (&text[..split], &text[split..])
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
