use std::collections::HashMap;

/// Notification category carrying the action buttons.
pub const ACTION_CATEGORY: &str = "LOCKIN_ACTIONS";

pub const ACTION_SNOOZE: &str = "SNOOZE_15";
pub const ACTION_REMIND_TONIGHT: &str = "REMIND_TONIGHT";
pub const ACTION_SKIP_TODAY: &str = "SKIP_TODAY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderAction {
    /// One-shot reminder 15 minutes from now.
    Snooze15,
    /// One-shot reminder at the habit's evening anchor today.
    RemindTonight,
    /// Cancel today's occurrence; counts as an ignored reminder.
    SkipToday,
}

/// Action-identifier dispatch table, registered once at startup. Keeps
/// response handling a lookup instead of a conditional that grows with
/// every new button.
pub struct ActionRegistry {
    handlers: HashMap<&'static str, ReminderAction>,
}

impl ActionRegistry {
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
        };
        registry.register(ACTION_SNOOZE, ReminderAction::Snooze15);
        registry.register(ACTION_REMIND_TONIGHT, ReminderAction::RemindTonight);
        registry.register(ACTION_SKIP_TODAY, ReminderAction::SkipToday);
        registry
    }

    pub fn register(&mut self, identifier: &'static str, action: ReminderAction) {
        self.handlers.insert(identifier, action);
    }

    pub fn resolve(&self, identifier: &str) -> Option<ReminderAction> {
        self.handlers.get(identifier).copied()
    }
}
