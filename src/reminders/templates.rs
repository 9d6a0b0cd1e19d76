use std::collections::BTreeSet;

use crate::models::habit::HabitCategory;
use crate::models::reminder::{hm, ReminderConfig, ReminderMode};

/// Default reminder shape for a habit category: configuration plus an
/// optional weekly quota. Quota-based categories auto-spread.
#[derive(Debug, Clone)]
pub struct ReminderTemplate {
    pub config: ReminderConfig,
    pub weekly_quota: Option<u32>,
}

impl ReminderTemplate {
    pub fn auto_spread(&self) -> bool {
        self.weekly_quota.is_some()
    }
}

const WEEKDAYS: [u8; 5] = [1, 2, 3, 4, 5]; // Mon-Fri
const WEEKEND_PLUS_FRIDAY: [u8; 3] = [5, 6, 7];

/// Static lookup, not computed: each category maps to a fixed tuple of
/// mode, time, weekdays, evening anchor, and quota.
pub fn template_for(category: HabitCategory) -> ReminderTemplate {
    let smart = |time, weekdays: Option<BTreeSet<u8>>, evening| ReminderConfig {
        mode: ReminderMode::Smart,
        time: Some(time),
        selected_weekdays: weekdays,
        evening_anchor: Some(evening),
        enable_evening_nudge: true,
    };

    match category {
        HabitCategory::Fitness => ReminderTemplate {
            config: smart(hm(7, 0), None, hm(18, 30)),
            weekly_quota: Some(5),
        },
        HabitCategory::Mindfulness => ReminderTemplate {
            config: smart(hm(8, 0), None, hm(21, 0)),
            weekly_quota: None,
        },
        HabitCategory::Learning => ReminderTemplate {
            config: smart(hm(8, 30), Some(BTreeSet::from(WEEKDAYS)), hm(19, 0)),
            weekly_quota: Some(5),
        },
        HabitCategory::Productivity => ReminderTemplate {
            config: smart(hm(8, 30), Some(BTreeSet::from(WEEKDAYS)), hm(17, 0)),
            weekly_quota: Some(5),
        },
        HabitCategory::Wellness => ReminderTemplate {
            config: smart(hm(7, 30), None, hm(20, 0)),
            weekly_quota: None,
        },
        HabitCategory::Creativity => ReminderTemplate {
            config: smart(hm(19, 0), None, hm(21, 30)),
            weekly_quota: None,
        },
        HabitCategory::Social => ReminderTemplate {
            config: smart(
                hm(18, 0),
                Some(BTreeSet::from(WEEKEND_PLUS_FRIDAY)),
                hm(20, 0),
            ),
            weekly_quota: Some(3),
        },
        HabitCategory::Gratitude => ReminderTemplate {
            config: smart(hm(21, 0), None, hm(22, 0)),
            weekly_quota: None,
        },
    }
}
