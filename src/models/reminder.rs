use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Consecutive ignored reminders after which a habit's reminders pause.
pub const PAUSE_AFTER_IGNORED: u32 = 3;

/// Build a time-of-day from literal hour/minute values.
pub(crate) fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("literal time out of range")
}

/// ISO week bucket ("2026-W32") used for weekly quota rollover.
pub fn week_key(at: DateTime<Utc>) -> String {
    let iso = at.date_naive().iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReminderMode {
    #[default]
    Off,
    Daily,
    SelectedDays,
    Smart,
}

/// Per-habit reminder settings. Which fields matter depends on `mode`:
/// `SelectedDays` needs a non-empty weekday set, every mode except `Off`
/// needs a resolvable time (its own or the global default).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReminderConfig {
    pub mode: ReminderMode,
    #[serde(default)]
    pub time: Option<NaiveTime>,
    /// ISO weekday numbers, 1 = Monday .. 7 = Sunday.
    #[serde(default)]
    pub selected_weekdays: Option<BTreeSet<u8>>,
    #[serde(default)]
    pub evening_anchor: Option<NaiveTime>,
    #[serde(default = "default_true")]
    pub enable_evening_nudge: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            mode: ReminderMode::Off,
            time: None,
            selected_weekdays: None,
            evening_anchor: None,
            enable_evening_nudge: true,
        }
    }
}

impl ReminderConfig {
    /// Boundary validation: clampable values are clamped elsewhere, this
    /// rejects the shapes that have no safe default.
    pub fn validate(&self) -> Result<(), String> {
        if self.mode == ReminderMode::SelectedDays {
            match &self.selected_weekdays {
                None => return Err("selected_days mode requires a weekday set".into()),
                Some(days) if days.is_empty() => {
                    return Err("selected_days mode requires at least one weekday".into())
                }
                Some(days) => {
                    if let Some(bad) = days.iter().find(|d| !(1..=7).contains(*d)) {
                        return Err(format!("weekday {bad} out of range 1-7"));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.mode != ReminderMode::Off
    }

    pub fn effective_time(&self, global: &GlobalReminderSettings) -> NaiveTime {
        self.time.unwrap_or(global.default_reminder_time)
    }

    pub fn effective_evening_anchor(&self, global: &GlobalReminderSettings) -> NaiveTime {
        self.evening_anchor.unwrap_or(global.default_evening_anchor)
    }
}

/// Multiple evenly spaced daily pings, for habits like hydration.
/// Constructed values are always in range; out-of-range input clamps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "MultiPingInput")]
pub struct MultiPingConfig {
    times_per_day: u8,
    start_hour: u8,
    end_hour: u8,
}

#[derive(Debug, Deserialize)]
struct MultiPingInput {
    times_per_day: i32,
    start_hour: i32,
    end_hour: i32,
}

impl From<MultiPingInput> for MultiPingConfig {
    fn from(raw: MultiPingInput) -> Self {
        MultiPingConfig::new(raw.times_per_day, raw.start_hour, raw.end_hour)
    }
}

impl MultiPingConfig {
    pub fn new(times_per_day: i32, start_hour: i32, end_hour: i32) -> Self {
        Self {
            times_per_day: times_per_day.clamp(2, 6) as u8,
            start_hour: start_hour.clamp(0, 23) as u8,
            end_hour: end_hour.clamp(0, 23) as u8,
        }
    }

    pub fn times_per_day(&self) -> u8 {
        self.times_per_day
    }

    pub fn start_hour(&self) -> u8 {
        self.start_hour
    }

    pub fn end_hour(&self) -> u8 {
        self.end_hour
    }

    /// Evenly spaced times between start and end hour, both inclusive.
    /// Collapses to a single ping at the start hour when the window is
    /// empty or inverted.
    pub fn reminder_times(&self) -> Vec<NaiveTime> {
        if self.times_per_day <= 1 || self.end_hour <= self.start_hour {
            return vec![hm(self.start_hour as u32, 0)];
        }

        let total_minutes = (self.end_hour - self.start_hour) as u32 * 60;
        let interval = total_minutes / (self.times_per_day as u32 - 1);

        (0..self.times_per_day as u32)
            .map(|i| {
                let from_start = i * interval;
                hm(self.start_hour as u32 + from_start / 60, from_start % 60)
            })
            .collect()
    }
}

/// Adaptive reminder state, one per habit per installation. Owned
/// exclusively by the reminder subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeReminderState {
    pub habit_id: Uuid,
    pub config: ReminderConfig,
    pub weekly_quota: Option<u32>,
    pub auto_spread: bool,
    /// When set, replaces the single daily trigger with evenly spaced pings.
    #[serde(default)]
    pub multi_ping: Option<MultiPingConfig>,
    pub completions_this_week: u32,
    pub week_key: String,
    pub last_completion_at: Option<DateTime<Utc>>,
    pub ignored_reminders_count: u32,
    pub last_ignored_at: Option<DateTime<Utc>>,
    pub is_paused: bool,
}

impl ChallengeReminderState {
    pub fn new(
        habit_id: Uuid,
        config: ReminderConfig,
        weekly_quota: Option<u32>,
        auto_spread: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            habit_id,
            config,
            weekly_quota,
            auto_spread,
            multi_ping: None,
            completions_this_week: 0,
            week_key: week_key(now),
            last_completion_at: None,
            ignored_reminders_count: 0,
            last_ignored_at: None,
            is_paused: false,
        }
    }

    pub fn is_completed_today(&self, now: DateTime<Utc>) -> bool {
        self.last_completion_at
            .is_some_and(|at| at.date_naive() == now.date_naive())
    }

    /// Whether a reminder is still owed today, given mode, pause state,
    /// and completion state.
    pub fn needs_reminder_today(&self, now: DateTime<Utc>) -> bool {
        if self.is_paused || !self.config.is_enabled() || self.is_completed_today(now) {
            return false;
        }

        match self.config.mode {
            ReminderMode::Off => false,
            ReminderMode::Daily | ReminderMode::Smart => true,
            ReminderMode::SelectedDays => {
                let today = now.weekday().number_from_monday() as u8;
                self.config
                    .selected_weekdays
                    .as_ref()
                    .is_some_and(|days| days.contains(&today))
            }
        }
    }

    /// Reset weekly tracking when the ISO week has rolled over. Returns
    /// true when a reset happened.
    pub fn roll_week(&mut self, now: DateTime<Utc>) -> bool {
        let current = week_key(now);
        if self.week_key != current {
            self.week_key = current;
            self.completions_this_week = 0;
            true
        } else {
            false
        }
    }

    /// Repeated non-engagement throttles future interruptions: the third
    /// consecutive ignore pauses the habit's reminders.
    pub fn record_ignored(&mut self, at: DateTime<Utc>) {
        self.ignored_reminders_count += 1;
        self.last_ignored_at = Some(at);

        if self.ignored_reminders_count >= PAUSE_AFTER_IGNORED {
            self.is_paused = true;
        }
    }

    /// A completion clears the ignore backpressure and counts toward the
    /// weekly quota.
    pub fn record_completion(&mut self, at: DateTime<Utc>) {
        self.ignored_reminders_count = 0;
        self.last_ignored_at = None;
        self.is_paused = false;
        self.last_completion_at = Some(at);
        self.completions_this_week += 1;
    }
}

/// Process-wide reminder defaults; per-habit config falls back to these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalReminderSettings {
    pub default_reminder_time: NaiveTime,
    pub default_evening_anchor: NaiveTime,
    pub enable_smart_reminders: bool,
    pub max_daily_notifications: u32,
    pub enable_notification_summary: bool,
}

impl Default for GlobalReminderSettings {
    fn default() -> Self {
        Self {
            default_reminder_time: hm(8, 0),
            default_evening_anchor: hm(20, 30),
            enable_smart_reminders: true,
            max_daily_notifications: 6,
            enable_notification_summary: true,
        }
    }
}
