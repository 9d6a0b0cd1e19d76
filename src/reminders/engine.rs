use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::catalog::HabitCatalog;
use crate::dispatch::{
    AuthorizationStatus, DispatchError, NotificationContent, NotificationPort,
    NotificationRequest, Trigger,
};
use crate::models::habit::HabitInfo;
use crate::models::reminder::{
    ChallengeReminderState, GlobalReminderSettings, MultiPingConfig, ReminderConfig, ReminderMode,
};
use crate::reminders::actions::{ReminderAction, ACTION_CATEGORY};
use crate::reminders::analytics::ReminderAnalytics;
use crate::reminders::spread::spread;
use crate::reminders::templates::template_for;
use crate::storage::{get_typed, put_typed, BlobStore, StoreError};

const SNOOZE_DELAY_SECS: u64 = 900;
const SETTINGS_KEY: &str = "global_reminder_settings";

#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    #[error("notifications are not authorized")]
    NotAuthorized,

    #[error("incomplete schedule: {scheduled} of {requested} triggers created")]
    IncompleteSchedule { scheduled: usize, requested: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("unknown habit {0}")]
    UnknownHabit(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dispatch(DispatchError),
}

impl From<DispatchError> for ReminderError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NotAuthorized => ReminderError::NotAuthorized,
            other => ReminderError::Dispatch(other),
        }
    }
}

fn state_key(habit_id: Uuid) -> String {
    format!("reminder_state:{habit_id}")
}

fn analytics_key(habit_id: Uuid) -> String {
    format!("reminder_analytics:{habit_id}")
}

fn primary_id(habit_id: Uuid) -> String {
    habit_id.to_string()
}

fn weekday_id(habit_id: Uuid, weekday: u8) -> String {
    format!("{habit_id}-{weekday}")
}

fn nudge_id(habit_id: Uuid) -> String {
    format!("{habit_id}-nudge")
}

fn ping_id(habit_id: Uuid, index: usize) -> String {
    format!("{habit_id}-ping-{index}")
}

/// Every identifier a habit can have scheduled under it.
fn all_identifiers(habit_id: Uuid) -> Vec<String> {
    let mut ids = vec![primary_id(habit_id), nudge_id(habit_id)];
    ids.extend((1..=7).map(|day| weekday_id(habit_id, day)));
    ids.extend((0..6).map(|i| ping_id(habit_id, i)));
    ids
}

/// Identifiers covering today's occurrence only: the primary trigger, the
/// nudge, and the trigger scoped to today's weekday. Weekday triggers for
/// other days stay untouched.
fn todays_identifiers(habit_id: Uuid, now: DateTime<Utc>) -> Vec<String> {
    let today = now.weekday().number_from_monday() as u8;
    vec![
        primary_id(habit_id),
        nudge_id(habit_id),
        weekday_id(habit_id, today),
    ]
}

fn reminder_content(habit_id: Uuid, body: &str) -> NotificationContent {
    NotificationContent {
        title: "Lock In".into(),
        body: body.into(),
        thread_id: format!("lockin.challenge.{habit_id}"),
        category_id: ACTION_CATEGORY.into(),
    }
}

fn nudge_content(title: &str) -> NotificationContent {
    NotificationContent {
        title: "Still time to Lock In".into(),
        body: format!("{title} - a tiny action counts."),
        thread_id: "lockin.nudges".into(),
        category_id: ACTION_CATEGORY.into(),
    }
}

/// One lock per habit id: operations for the same habit are sequenced so a
/// cancel-then-recreate pass cannot interleave with a completion-triggered
/// cancellation. Different habits proceed independently.
#[derive(Clone, Default)]
struct HabitLocks {
    inner: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl HabitLocks {
    async fn acquire(&self, habit_id: Uuid) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().await;
            map.entry(habit_id).or_default().clone()
        };
        slot.lock_owned().await
    }
}

/// Decides, per habit, whether, when, and how often to notify, and adapts
/// to ignored reminders. All platform effects go through the notification
/// port; all durable state goes through the blob store.
pub struct ReminderEngine {
    port: Arc<dyn NotificationPort>,
    store: Arc<dyn BlobStore>,
    catalog: Arc<dyn HabitCatalog>,
    locks: HabitLocks,
}

impl ReminderEngine {
    pub fn new(
        port: Arc<dyn NotificationPort>,
        store: Arc<dyn BlobStore>,
        catalog: Arc<dyn HabitCatalog>,
    ) -> Self {
        Self {
            port,
            store,
            catalog,
            locks: HabitLocks::default(),
        }
    }

    async fn habit_info(&self, habit_id: Uuid) -> Result<HabitInfo, ReminderError> {
        self.catalog
            .lookup(habit_id)
            .await?
            .ok_or(ReminderError::UnknownHabit(habit_id))
    }

    pub async fn global_settings(&self) -> Result<GlobalReminderSettings, ReminderError> {
        Ok(get_typed(self.store.as_ref(), SETTINGS_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn update_global_settings(
        &self,
        settings: &GlobalReminderSettings,
    ) -> Result<(), ReminderError> {
        put_typed(self.store.as_ref(), SETTINGS_KEY, settings).await?;
        Ok(())
    }

    /// Per-habit state, template-initialized on first touch and with the
    /// weekly quota rollover applied.
    async fn load_state(
        &self,
        habit_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ChallengeReminderState, ReminderError> {
        let key = state_key(habit_id);
        let mut state = match get_typed::<ChallengeReminderState>(self.store.as_ref(), &key).await?
        {
            Some(state) => state,
            None => {
                let info = self.habit_info(habit_id).await?;
                let template = template_for(info.category);
                let state = ChallengeReminderState::new(
                    habit_id,
                    template.config.clone(),
                    template.weekly_quota,
                    template.auto_spread(),
                    now,
                );
                put_typed(self.store.as_ref(), &key, &state).await?;
                state
            }
        };

        if state.roll_week(now) {
            put_typed(self.store.as_ref(), &key, &state).await?;
        }
        Ok(state)
    }

    async fn save_state(&self, state: &ChallengeReminderState) -> Result<(), StoreError> {
        put_typed(self.store.as_ref(), &state_key(state.habit_id), state).await
    }

    pub async fn reminder_state(
        &self,
        habit_id: Uuid,
    ) -> Result<ChallengeReminderState, ReminderError> {
        self.reminder_state_at(habit_id, Utc::now()).await
    }

    pub async fn reminder_state_at(
        &self,
        habit_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ChallengeReminderState, ReminderError> {
        let _guard = self.locks.acquire(habit_id).await;
        self.load_state(habit_id, now).await
    }

    pub async fn suggested_time(&self, habit_id: Uuid) -> Result<Option<NaiveTime>, ReminderError> {
        let analytics =
            get_typed::<ReminderAnalytics>(self.store.as_ref(), &analytics_key(habit_id)).await?;
        Ok(analytics.and_then(|a| a.suggested_time()))
    }

    /// Replace a habit's reminder configuration and rebuild its entire
    /// platform schedule (cancel-then-recreate, never incremental).
    pub async fn apply_configuration(
        &self,
        habit_id: Uuid,
        config: ReminderConfig,
        weekly_quota: Option<u32>,
        auto_spread: bool,
        multi_ping: Option<MultiPingConfig>,
    ) -> Result<ChallengeReminderState, ReminderError> {
        self.apply_configuration_at(habit_id, config, weekly_quota, auto_spread, multi_ping, Utc::now())
            .await
    }

    pub async fn apply_configuration_at(
        &self,
        habit_id: Uuid,
        config: ReminderConfig,
        weekly_quota: Option<u32>,
        auto_spread: bool,
        multi_ping: Option<MultiPingConfig>,
        now: DateTime<Utc>,
    ) -> Result<ChallengeReminderState, ReminderError> {
        config
            .validate()
            .map_err(ReminderError::InvalidConfiguration)?;
        let info = self.habit_info(habit_id).await?;

        let _guard = self.locks.acquire(habit_id).await;
        let mut state = self.load_state(habit_id, now).await?;
        state.config = config;
        state.weekly_quota = weekly_quota;
        state.auto_spread = auto_spread;
        state.multi_ping = multi_ping;
        self.save_state(&state).await?;

        self.reschedule(&state, &info, now).await?;
        Ok(state)
    }

    /// Rebuild the full schedule for the state as saved. Requires the lock
    /// for `state.habit_id` to be held.
    async fn reschedule(
        &self,
        state: &ChallengeReminderState,
        info: &HabitInfo,
        now: DateTime<Utc>,
    ) -> Result<(), ReminderError> {
        if self.port.authorization_status().await != AuthorizationStatus::Authorized {
            return Err(ReminderError::NotAuthorized);
        }

        self.port.cancel(&all_identifiers(state.habit_id)).await?;

        if !state.config.is_enabled() || state.is_paused {
            return Ok(());
        }

        let settings = self.global_settings().await?;
        let time = state.config.effective_time(&settings);
        let content = reminder_content(state.habit_id, &info.title);

        let mut requests: Vec<NotificationRequest> = Vec::new();
        if let Some(ping) = state.multi_ping {
            let mut times = ping.reminder_times();
            let cap = settings.max_daily_notifications as usize;
            if times.len() > cap {
                tracing::warn!(
                    habit_id = %state.habit_id,
                    dropped = times.len() - cap,
                    "Ping count exceeds daily notification cap, truncating"
                );
                times.truncate(cap);
            }
            for (i, ping_time) in times.into_iter().enumerate() {
                requests.push(NotificationRequest {
                    identifier: ping_id(state.habit_id, i),
                    content: content.clone(),
                    trigger: Trigger::Calendar {
                        time: ping_time,
                        weekday: None,
                        repeats: true,
                    },
                });
            }
        } else {
            match self.scheduled_weekdays(state) {
                Some(days) => {
                    for day in days {
                        requests.push(NotificationRequest {
                            identifier: weekday_id(state.habit_id, day),
                            content: content.clone(),
                            trigger: Trigger::Calendar {
                                time,
                                weekday: Some(day),
                                repeats: true,
                            },
                        });
                    }
                }
                None => {
                    requests.push(NotificationRequest {
                        identifier: primary_id(state.habit_id),
                        content: content.clone(),
                        trigger: Trigger::Calendar {
                            time,
                            weekday: None,
                            repeats: true,
                        },
                    });
                }
            }
        }

        if state.config.enable_evening_nudge && !state.is_completed_today(now) {
            requests.push(NotificationRequest {
                identifier: nudge_id(state.habit_id),
                content: nudge_content(&info.title),
                trigger: Trigger::Calendar {
                    time: state.config.effective_evening_anchor(&settings),
                    weekday: None,
                    repeats: true,
                },
            });
        }

        let requested = requests.len();
        let mut scheduled = 0usize;
        for request in requests {
            match self.port.schedule(request).await {
                Ok(()) => scheduled += 1,
                Err(DispatchError::NotAuthorized) => return Err(ReminderError::NotAuthorized),
                Err(e) => {
                    tracing::warn!(habit_id = %state.habit_id, error = %e, "Failed to schedule trigger");
                }
            }
        }

        tracing::info!(
            habit_id = %state.habit_id,
            mode = ?state.config.mode,
            scheduled,
            "Reminder schedule rebuilt"
        );

        if scheduled < requested {
            return Err(ReminderError::IncompleteSchedule {
                scheduled,
                requested,
            });
        }
        Ok(())
    }

    /// Weekday set the schedule should cover, or `None` for an everyday
    /// trigger. A weekly quota turns the habit into selected-days form,
    /// auto-spread or user-picked.
    fn scheduled_weekdays(&self, state: &ChallengeReminderState) -> Option<BTreeSet<u8>> {
        if let Some(quota) = state.weekly_quota {
            let days = if state.auto_spread {
                spread(quota)
            } else {
                state
                    .config
                    .selected_weekdays
                    .clone()
                    .unwrap_or_else(|| BTreeSet::from([1, 2, 3, 4, 5]))
            };
            return Some(days);
        }

        match state.config.mode {
            ReminderMode::SelectedDays => state.config.selected_weekdays.clone(),
            _ => None,
        }
    }

    /// Schedule or clear the same-day fallback nudge. Must be re-run
    /// whenever completion state changes, not just at configuration time.
    pub async fn schedule_evening_nudge(
        &self,
        habit_id: Uuid,
        completed_today: bool,
    ) -> Result<(), ReminderError> {
        self.schedule_evening_nudge_at(habit_id, completed_today, Utc::now())
            .await
    }

    pub async fn schedule_evening_nudge_at(
        &self,
        habit_id: Uuid,
        completed_today: bool,
        now: DateTime<Utc>,
    ) -> Result<(), ReminderError> {
        let info = self.habit_info(habit_id).await?;
        let _guard = self.locks.acquire(habit_id).await;
        let state = self.load_state(habit_id, now).await?;
        self.evening_nudge_locked(&state, &info.title, completed_today)
            .await
    }

    /// Clears any prior nudge, then schedules a fresh one unless the habit
    /// is already done today, disabled, or paused. Quietly a no-op without
    /// notification permission.
    async fn evening_nudge_locked(
        &self,
        state: &ChallengeReminderState,
        title: &str,
        completed_today: bool,
    ) -> Result<(), ReminderError> {
        self.port.cancel(&[nudge_id(state.habit_id)]).await?;

        if completed_today
            || !state.config.enable_evening_nudge
            || !state.config.is_enabled()
            || state.is_paused
        {
            return Ok(());
        }

        if self.port.authorization_status().await != AuthorizationStatus::Authorized {
            return Ok(());
        }

        let settings = self.global_settings().await?;
        self.port
            .schedule(NotificationRequest {
                identifier: nudge_id(state.habit_id),
                content: nudge_content(title),
                trigger: Trigger::Calendar {
                    time: state.config.effective_evening_anchor(&settings),
                    weekday: None,
                    repeats: true,
                },
            })
            .await?;
        Ok(())
    }

    /// A completion lands: cancel today's triggers, clear the ignore
    /// backpressure, and feed the suggestion model.
    pub async fn on_completion(
        &self,
        habit_id: Uuid,
    ) -> Result<ChallengeReminderState, ReminderError> {
        self.on_completion_at(habit_id, Utc::now()).await
    }

    pub async fn on_completion_at(
        &self,
        habit_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ChallengeReminderState, ReminderError> {
        let info = self.habit_info(habit_id).await?;
        let _guard = self.locks.acquire(habit_id).await;
        let mut state = self.load_state(habit_id, now).await?;

        self.port.cancel(&todays_identifiers(habit_id, now)).await?;

        state.record_completion(now);
        self.save_state(&state).await?;

        let key = analytics_key(habit_id);
        let mut analytics = get_typed::<ReminderAnalytics>(self.store.as_ref(), &key)
            .await?
            .unwrap_or_else(|| ReminderAnalytics::new(habit_id));
        analytics.record_completion(now);
        put_typed(self.store.as_ref(), &key, &analytics).await?;

        self.evening_nudge_locked(&state, &info.title, true).await?;

        Ok(state)
    }

    /// A reminder went unanswered. The third consecutive ignore pauses the
    /// habit and cancels everything scheduled for it.
    pub async fn on_reminder_ignored(
        &self,
        habit_id: Uuid,
    ) -> Result<ChallengeReminderState, ReminderError> {
        self.on_reminder_ignored_at(habit_id, Utc::now()).await
    }

    pub async fn on_reminder_ignored_at(
        &self,
        habit_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ChallengeReminderState, ReminderError> {
        let _guard = self.locks.acquire(habit_id).await;
        let mut state = self.load_state(habit_id, now).await?;
        self.ignored_locked(&mut state, now).await?;
        Ok(state)
    }

    async fn ignored_locked(
        &self,
        state: &mut ChallengeReminderState,
        now: DateTime<Utc>,
    ) -> Result<(), ReminderError> {
        state.record_ignored(now);
        self.save_state(state).await?;

        if state.is_paused {
            tracing::info!(
                habit_id = %state.habit_id,
                ignored = state.ignored_reminders_count,
                "Reminders paused after repeated ignores"
            );
            self.port.cancel(&all_identifiers(state.habit_id)).await?;
        }
        Ok(())
    }

    /// Dispatch a notification action button press.
    pub async fn handle_action(
        &self,
        habit_id: Uuid,
        action: ReminderAction,
    ) -> Result<(), ReminderError> {
        self.handle_action_at(habit_id, action, Utc::now()).await
    }

    pub async fn handle_action_at(
        &self,
        habit_id: Uuid,
        action: ReminderAction,
        now: DateTime<Utc>,
    ) -> Result<(), ReminderError> {
        match action {
            ReminderAction::Snooze15 => {
                self.habit_info(habit_id).await?;
                self.port
                    .schedule(NotificationRequest {
                        identifier: format!("{habit_id}-snooze-{}", Uuid::new_v4()),
                        content: reminder_content(habit_id, "Time to complete your challenge!"),
                        trigger: Trigger::OneShot {
                            delay_secs: SNOOZE_DELAY_SECS,
                        },
                    })
                    .await?;
            }
            ReminderAction::RemindTonight => {
                self.habit_info(habit_id).await?;
                let _guard = self.locks.acquire(habit_id).await;
                let state = self.load_state(habit_id, now).await?;
                let settings = self.global_settings().await?;
                self.port
                    .schedule(NotificationRequest {
                        identifier: format!("{habit_id}-tonight-{}", Uuid::new_v4()),
                        content: reminder_content(habit_id, "Don't forget your challenge!"),
                        trigger: Trigger::Calendar {
                            time: state.config.effective_evening_anchor(&settings),
                            weekday: None,
                            repeats: false,
                        },
                    })
                    .await?;
            }
            ReminderAction::SkipToday => {
                let _guard = self.locks.acquire(habit_id).await;
                let mut state = self.load_state(habit_id, now).await?;
                self.port.cancel(&todays_identifiers(habit_id, now)).await?;
                self.ignored_locked(&mut state, now).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::dispatch::InProcessDispatcher;
    use crate::models::habit::HabitCategory;
    use crate::models::reminder::hm;
    use crate::storage::MemoryBlobStore;
    use chrono::TimeZone;

    // Monday 2026-08-03.
    fn monday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 3, 9, 0, 0).unwrap()
    }

    struct Fixture {
        engine: ReminderEngine,
        port: Arc<InProcessDispatcher>,
        habit_id: Uuid,
    }

    fn fixture_with_status(status: AuthorizationStatus) -> Fixture {
        let habit_id = Uuid::new_v4();
        let port = InProcessDispatcher::with_status(status);
        let catalog = StaticCatalog::new().with(
            habit_id,
            HabitInfo {
                title: "Morning run".into(),
                category: HabitCategory::Fitness,
                aura_points: 20,
            },
        );
        let engine = ReminderEngine::new(
            port.clone(),
            Arc::new(MemoryBlobStore::new()),
            Arc::new(catalog),
        );
        Fixture {
            engine,
            port,
            habit_id,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_status(AuthorizationStatus::Authorized)
    }

    fn daily_config() -> ReminderConfig {
        ReminderConfig {
            mode: ReminderMode::Daily,
            time: Some(hm(8, 0)),
            evening_anchor: Some(hm(20, 0)),
            ..Default::default()
        }
    }

    async fn pending_ids(port: &InProcessDispatcher) -> Vec<String> {
        port.pending()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.identifier)
            .collect()
    }

    // ── apply_configuration ──────────────────────────────────────────────

    #[tokio::test]
    async fn test_daily_config_schedules_primary_and_nudge() {
        let f = fixture();
        f.engine
            .apply_configuration_at(f.habit_id, daily_config(), None, false, None, monday())
            .await
            .unwrap();

        let ids = pending_ids(&f.port).await;
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&f.habit_id.to_string()));
        assert!(ids.contains(&format!("{}-nudge", f.habit_id)));
    }

    #[tokio::test]
    async fn test_selected_days_schedules_per_weekday() {
        let f = fixture();
        let config = ReminderConfig {
            mode: ReminderMode::SelectedDays,
            time: Some(hm(7, 30)),
            selected_weekdays: Some(BTreeSet::from([1, 3, 5])),
            enable_evening_nudge: false,
            ..Default::default()
        };
        f.engine
            .apply_configuration_at(f.habit_id, config, None, false, None, monday())
            .await
            .unwrap();

        let ids = pending_ids(&f.port).await;
        assert_eq!(ids.len(), 3);
        for day in [1, 3, 5] {
            assert!(ids.contains(&format!("{}-{}", f.habit_id, day)));
        }
    }

    #[tokio::test]
    async fn test_weekly_quota_auto_spreads() {
        let f = fixture();
        let mut config = daily_config();
        config.enable_evening_nudge = false;
        f.engine
            .apply_configuration_at(f.habit_id, config, Some(5), true, None, monday())
            .await
            .unwrap();

        let ids = pending_ids(&f.port).await;
        assert_eq!(ids.len(), 5);
        for day in spread(5) {
            assert!(ids.contains(&format!("{}-{}", f.habit_id, day)));
        }
    }

    #[tokio::test]
    async fn test_multi_ping_replaces_primary_trigger() {
        let f = fixture();
        let mut config = daily_config();
        config.enable_evening_nudge = false;
        f.engine
            .apply_configuration_at(
                f.habit_id,
                config,
                None,
                false,
                Some(MultiPingConfig::new(3, 9, 21)),
                monday(),
            )
            .await
            .unwrap();

        let ids = pending_ids(&f.port).await;
        assert_eq!(ids.len(), 3);
        for i in 0..3 {
            assert!(ids.contains(&format!("{}-ping-{}", f.habit_id, i)));
        }
        assert!(!ids.contains(&f.habit_id.to_string()));
    }

    #[tokio::test]
    async fn test_multi_ping_respects_daily_notification_cap() {
        let f = fixture();
        let settings = GlobalReminderSettings {
            max_daily_notifications: 2,
            ..Default::default()
        };
        f.engine.update_global_settings(&settings).await.unwrap();

        let mut config = daily_config();
        config.enable_evening_nudge = false;
        f.engine
            .apply_configuration_at(
                f.habit_id,
                config,
                None,
                false,
                Some(MultiPingConfig::new(6, 8, 20)),
                monday(),
            )
            .await
            .unwrap();

        assert_eq!(pending_ids(&f.port).await.len(), 2);
    }

    #[tokio::test]
    async fn test_off_mode_cancels_everything() {
        let f = fixture();
        f.engine
            .apply_configuration_at(f.habit_id, daily_config(), None, false, None, monday())
            .await
            .unwrap();
        assert!(!pending_ids(&f.port).await.is_empty());

        let config = ReminderConfig {
            mode: ReminderMode::Off,
            ..Default::default()
        };
        f.engine
            .apply_configuration_at(f.habit_id, config, None, false, None, monday())
            .await
            .unwrap();
        assert!(pending_ids(&f.port).await.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_port_reports_and_schedules_nothing() {
        let f = fixture_with_status(AuthorizationStatus::Denied);
        let result = f
            .engine
            .apply_configuration_at(f.habit_id, daily_config(), None, false, None, monday())
            .await;

        assert!(matches!(result, Err(ReminderError::NotAuthorized)));
        assert!(pending_ids(&f.port).await.is_empty());
    }

    #[tokio::test]
    async fn test_selected_days_without_weekdays_is_rejected() {
        let f = fixture();
        let config = ReminderConfig {
            mode: ReminderMode::SelectedDays,
            time: Some(hm(8, 0)),
            ..Default::default()
        };
        let result = f
            .engine
            .apply_configuration_at(f.habit_id, config, None, false, None, monday())
            .await;
        assert!(matches!(
            result,
            Err(ReminderError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_habit_is_reported() {
        let f = fixture();
        let result = f
            .engine
            .apply_configuration_at(Uuid::new_v4(), daily_config(), None, false, None, monday())
            .await;
        assert!(matches!(result, Err(ReminderError::UnknownHabit(_))));
    }

    // ── first touch & weekly rollover ────────────────────────────────────

    #[tokio::test]
    async fn test_first_touch_initializes_from_template() {
        let f = fixture();
        let state = f.engine.reminder_state_at(f.habit_id, monday()).await.unwrap();

        // Fitness template: smart mode, 5x/week with auto-spread.
        assert_eq!(state.config.mode, ReminderMode::Smart);
        assert_eq!(state.weekly_quota, Some(5));
        assert!(state.auto_spread);
        assert!(!state.is_paused);
    }

    #[tokio::test]
    async fn test_week_rollover_resets_weekly_completions() {
        let f = fixture();
        f.engine.on_completion_at(f.habit_id, monday()).await.unwrap();

        let state = f.engine.reminder_state_at(f.habit_id, monday()).await.unwrap();
        assert_eq!(state.completions_this_week, 1);

        let next_monday = Utc.with_ymd_and_hms(2026, 8, 10, 9, 0, 0).unwrap();
        let state = f
            .engine
            .reminder_state_at(f.habit_id, next_monday)
            .await
            .unwrap();
        assert_eq!(state.completions_this_week, 0);
    }

    // ── completion ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_completion_cancels_todays_triggers_only() {
        let f = fixture();
        let config = ReminderConfig {
            mode: ReminderMode::SelectedDays,
            time: Some(hm(7, 0)),
            selected_weekdays: Some(BTreeSet::from([1, 2, 3])),
            evening_anchor: Some(hm(20, 0)),
            enable_evening_nudge: true,
        };
        f.engine
            .apply_configuration_at(f.habit_id, config, None, false, None, monday())
            .await
            .unwrap();
        assert_eq!(pending_ids(&f.port).await.len(), 4); // Mon, Tue, Wed + nudge

        let state = f.engine.on_completion_at(f.habit_id, monday()).await.unwrap();
        assert_eq!(state.last_completion_at, Some(monday()));
        assert_eq!(state.completions_this_week, 1);

        let ids = pending_ids(&f.port).await;
        // Monday's trigger and the nudge are gone; Tuesday and Wednesday stay.
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&format!("{}-2", f.habit_id)));
        assert!(ids.contains(&format!("{}-3", f.habit_id)));
    }

    #[tokio::test]
    async fn test_completion_resets_ignore_backpressure() {
        let f = fixture();
        f.engine
            .on_reminder_ignored_at(f.habit_id, monday())
            .await
            .unwrap();
        f.engine
            .on_reminder_ignored_at(f.habit_id, monday())
            .await
            .unwrap();

        let state = f.engine.on_completion_at(f.habit_id, monday()).await.unwrap();
        assert_eq!(state.ignored_reminders_count, 0);
        assert!(state.last_ignored_at.is_none());
        assert!(!state.is_paused);
    }

    #[tokio::test]
    async fn test_completion_feeds_suggestion_model() {
        let f = fixture();
        let at = Utc.with_ymd_and_hms(2026, 8, 3, 8, 30, 0).unwrap();
        f.engine.on_completion_at(f.habit_id, at).await.unwrap();

        let suggested = f.engine.suggested_time(f.habit_id).await.unwrap();
        assert_eq!(suggested, Some(hm(8, 15)));
    }

    // ── ignore backpressure ──────────────────────────────────────────────

    #[tokio::test]
    async fn test_third_ignore_pauses_and_cancels() {
        let f = fixture();
        f.engine
            .apply_configuration_at(f.habit_id, daily_config(), None, false, None, monday())
            .await
            .unwrap();
        assert!(!pending_ids(&f.port).await.is_empty());

        for _ in 0..2 {
            let state = f
                .engine
                .on_reminder_ignored_at(f.habit_id, monday())
                .await
                .unwrap();
            assert!(!state.is_paused);
        }

        let state = f
            .engine
            .on_reminder_ignored_at(f.habit_id, monday())
            .await
            .unwrap();
        assert!(state.is_paused);
        assert!(pending_ids(&f.port).await.is_empty());
    }

    #[tokio::test]
    async fn test_paused_habit_is_not_rescheduled() {
        let f = fixture();
        for _ in 0..3 {
            f.engine
                .on_reminder_ignored_at(f.habit_id, monday())
                .await
                .unwrap();
        }

        f.engine
            .apply_configuration_at(f.habit_id, daily_config(), None, false, None, monday())
            .await
            .unwrap();
        assert!(pending_ids(&f.port).await.is_empty());
    }

    // ── evening nudge ────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_evening_nudge_suppressed_when_completed() {
        let f = fixture();
        f.engine
            .apply_configuration_at(f.habit_id, daily_config(), None, false, None, monday())
            .await
            .unwrap();
        assert!(pending_ids(&f.port)
            .await
            .contains(&format!("{}-nudge", f.habit_id)));

        f.engine
            .schedule_evening_nudge_at(f.habit_id, true, monday())
            .await
            .unwrap();
        assert!(!pending_ids(&f.port)
            .await
            .contains(&format!("{}-nudge", f.habit_id)));
    }

    #[tokio::test]
    async fn test_evening_nudge_scheduled_when_incomplete() {
        let f = fixture();
        f.engine
            .apply_configuration_at(f.habit_id, daily_config(), None, false, None, monday())
            .await
            .unwrap();

        f.engine
            .schedule_evening_nudge_at(f.habit_id, false, monday())
            .await
            .unwrap();

        let pending = f.port.pending().await.unwrap();
        let nudge = pending
            .iter()
            .find(|r| r.identifier == format!("{}-nudge", f.habit_id))
            .expect("nudge scheduled");
        assert_eq!(
            nudge.trigger,
            Trigger::Calendar {
                time: hm(20, 0),
                weekday: None,
                repeats: true,
            }
        );
    }

    // ── notification actions ─────────────────────────────────────────────

    #[tokio::test]
    async fn test_snooze_schedules_one_shot() {
        let f = fixture();
        f.engine
            .handle_action_at(f.habit_id, ReminderAction::Snooze15, monday())
            .await
            .unwrap();

        let pending = f.port.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0]
            .identifier
            .starts_with(&format!("{}-snooze-", f.habit_id)));
        assert_eq!(pending[0].trigger, Trigger::OneShot { delay_secs: 900 });
    }

    #[tokio::test]
    async fn test_remind_tonight_targets_evening_anchor() {
        let f = fixture();
        f.engine
            .handle_action_at(f.habit_id, ReminderAction::RemindTonight, monday())
            .await
            .unwrap();

        let pending = f.port.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        // Fitness template anchors the evening at 18:30.
        assert_eq!(
            pending[0].trigger,
            Trigger::Calendar {
                time: hm(18, 30),
                weekday: None,
                repeats: false,
            }
        );
    }

    #[tokio::test]
    async fn test_skip_today_counts_as_ignored() {
        let f = fixture();
        f.engine
            .handle_action_at(f.habit_id, ReminderAction::SkipToday, monday())
            .await
            .unwrap();

        let state = f.engine.reminder_state_at(f.habit_id, monday()).await.unwrap();
        assert_eq!(state.ignored_reminders_count, 1);
        assert!(state.last_ignored_at.is_some());
    }

    #[tokio::test]
    async fn test_three_skips_pause_reminders() {
        let f = fixture();
        for _ in 0..3 {
            f.engine
                .handle_action_at(f.habit_id, ReminderAction::SkipToday, monday())
                .await
                .unwrap();
        }
        let state = f.engine.reminder_state_at(f.habit_id, monday()).await.unwrap();
        assert!(state.is_paused);
    }
}
