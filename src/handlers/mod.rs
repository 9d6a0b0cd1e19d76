pub mod completions;
pub mod health;
pub mod reminders;
