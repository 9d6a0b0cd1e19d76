use std::collections::VecDeque;

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of completion timestamps retained per habit.
pub const ANALYTICS_WINDOW: usize = 30;

/// How much earlier than the observed average a reminder is suggested.
const SUGGESTION_LEAD_HOURS: f64 = 0.25;

/// Rolling window of completion timestamps used to suggest a reminder
/// time. The suggestion is surfaced to the user, never auto-applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderAnalytics {
    pub habit_id: Uuid,
    pub completion_times: VecDeque<DateTime<Utc>>,
    pub average_completion_hour: Option<f64>,
    /// Reserved: share of reminders that led to a completion. Not yet
    /// computed by the engine.
    pub reminder_effectiveness: f64,
    pub last_analyzed_at: Option<DateTime<Utc>>,
}

impl ReminderAnalytics {
    pub fn new(habit_id: Uuid) -> Self {
        Self {
            habit_id,
            completion_times: VecDeque::new(),
            average_completion_hour: None,
            reminder_effectiveness: 0.0,
            last_analyzed_at: None,
        }
    }

    /// Ingest one completion: append (evicting the oldest beyond the
    /// window) and recompute the average completion hour.
    pub fn record_completion(&mut self, at: DateTime<Utc>) {
        self.completion_times.push_back(at);
        while self.completion_times.len() > ANALYTICS_WINDOW {
            self.completion_times.pop_front();
        }

        let total: f64 = self
            .completion_times
            .iter()
            .map(|t| t.hour() as f64 + t.minute() as f64 / 60.0)
            .sum();
        self.average_completion_hour = Some(total / self.completion_times.len() as f64);
        self.last_analyzed_at = Some(at);
    }

    /// Suggested reminder time: 15 minutes before the average completion
    /// hour, wrapped across midnight.
    pub fn suggested_time(&self) -> Option<NaiveTime> {
        let average = self.average_completion_hour?;
        let adjusted = (average - SUGGESTION_LEAD_HOURS).rem_euclid(24.0);

        let hour = adjusted.floor();
        let mut minute = ((adjusted - hour) * 60.0).round() as u32;
        let mut hour = hour as u32;
        if minute == 60 {
            hour = (hour + 1) % 24;
            minute = 0;
        }

        NaiveTime::from_hms_opt(hour, minute, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reminder::hm;
    use chrono::{Datelike, TimeZone};

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, h, m, 0).unwrap()
    }

    #[test]
    fn test_no_data_no_suggestion() {
        let analytics = ReminderAnalytics::new(Uuid::new_v4());
        assert!(analytics.suggested_time().is_none());
        assert!(analytics.average_completion_hour.is_none());
    }

    #[test]
    fn test_window_keeps_thirty_most_recent() {
        let mut analytics = ReminderAnalytics::new(Uuid::new_v4());
        for day in 1..=31 {
            for _ in 0..2 {
                analytics.record_completion(at(day, 9, 0));
            }
        }
        // 62 inserts, 30 retained, all from the most recent days.
        assert_eq!(analytics.completion_times.len(), ANALYTICS_WINDOW);
        assert_eq!(analytics.completion_times.front().unwrap().day(), 17);
        assert_eq!(analytics.completion_times.back().unwrap().day(), 31);
    }

    #[test]
    fn test_average_and_suggestion() {
        let mut analytics = ReminderAnalytics::new(Uuid::new_v4());
        analytics.record_completion(at(1, 8, 30));
        analytics.record_completion(at(2, 9, 30));

        assert_eq!(analytics.average_completion_hour, Some(9.0));
        // 15 minutes before 9:00.
        assert_eq!(analytics.suggested_time(), Some(hm(8, 45)));
        assert_eq!(analytics.last_analyzed_at, Some(at(2, 9, 30)));
    }

    #[test]
    fn test_single_completion_suggests_quarter_hour_earlier() {
        let mut analytics = ReminderAnalytics::new(Uuid::new_v4());
        analytics.record_completion(at(1, 8, 30));
        assert_eq!(analytics.suggested_time(), Some(hm(8, 15)));
    }

    #[test]
    fn test_suggestion_wraps_across_midnight() {
        let mut analytics = ReminderAnalytics::new(Uuid::new_v4());
        analytics.record_completion(at(1, 0, 5));
        // Average 00:05, a quarter hour earlier wraps to 23:50.
        assert_eq!(analytics.suggested_time(), Some(hm(23, 50)));
    }

    #[test]
    fn test_eviction_shifts_average() {
        let mut analytics = ReminderAnalytics::new(Uuid::new_v4());
        for day in 1..=30 {
            analytics.record_completion(at(day, 6, 0));
        }
        assert_eq!(analytics.average_completion_hour, Some(6.0));

        // Thirty later completions push the 6:00 cluster out entirely.
        for _ in 0..30 {
            analytics.record_completion(at(31, 12, 0));
        }
        assert_eq!(analytics.average_completion_hour, Some(12.0));
    }
}
