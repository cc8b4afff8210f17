pub mod completions;
pub mod config;
pub mod distance;
pub mod reminder;
pub mod track;
