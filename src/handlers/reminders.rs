use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::dispatch::NotificationRequest;
use crate::error::{AppError, AppResult};
use crate::models::reminder::{
    ChallengeReminderState, GlobalReminderSettings, MultiPingConfig, ReminderConfig,
};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ApplyReminderRequest {
    pub config: ReminderConfig,
    #[validate(range(min = 1, max = 7, message = "Weekly quota must be between 1 and 7"))]
    pub weekly_quota: Option<u32>,
    #[serde(default)]
    pub auto_spread: bool,
    #[serde(default)]
    pub multi_ping: Option<MultiPingConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ReminderActionRequest {
    pub action_id: String,
}

#[derive(Debug, Serialize)]
pub struct ReminderStateResponse {
    #[serde(flatten)]
    pub state: ChallengeReminderState,
    pub suggested_time: Option<NaiveTime>,
    pub needs_reminder_today: bool,
}

pub async fn get_reminder_state(
    State(state): State<AppState>,
    Path(habit_id): Path<Uuid>,
) -> AppResult<Json<ReminderStateResponse>> {
    let reminder_state = state.engine.reminder_state(habit_id).await?;
    let suggested_time = state.engine.suggested_time(habit_id).await?;
    let needs_reminder_today = reminder_state.needs_reminder_today(Utc::now());

    Ok(Json(ReminderStateResponse {
        state: reminder_state,
        suggested_time,
        needs_reminder_today,
    }))
}

/// Replace a habit's reminder configuration. The engine cancels the old
/// schedule and recreates it; permission problems come back as errors the
/// UI turns into a re-prompt.
pub async fn apply_reminder_config(
    State(state): State<AppState>,
    Path(habit_id): Path<Uuid>,
    Json(body): Json<ApplyReminderRequest>,
) -> AppResult<Json<ReminderStateResponse>> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let reminder_state = state
        .engine
        .apply_configuration(
            habit_id,
            body.config,
            body.weekly_quota,
            body.auto_spread,
            body.multi_ping,
        )
        .await?;
    let suggested_time = state.engine.suggested_time(habit_id).await?;
    let needs_reminder_today = reminder_state.needs_reminder_today(Utc::now());

    Ok(Json(ReminderStateResponse {
        state: reminder_state,
        suggested_time,
        needs_reminder_today,
    }))
}

/// The client reports a completion to the reminder side synchronously
/// (the ledger is notified separately): cancel today's triggers and
/// update the adaptive state.
pub async fn reminder_completion(
    State(state): State<AppState>,
    Path(habit_id): Path<Uuid>,
) -> AppResult<Json<ChallengeReminderState>> {
    let reminder_state = state.engine.on_completion(habit_id).await?;
    Ok(Json(reminder_state))
}

pub async fn reminder_ignored(
    State(state): State<AppState>,
    Path(habit_id): Path<Uuid>,
) -> AppResult<Json<ChallengeReminderState>> {
    let reminder_state = state.engine.on_reminder_ignored(habit_id).await?;
    Ok(Json(reminder_state))
}

/// Re-evaluate the evening nudge. "Completed today" comes from the
/// ledger's counters, read-only.
pub async fn reevaluate_nudge(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(habit_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let counters = state.ledger.counters(auth_user.id).await?;
    let completed_today = counters
        .last_completed
        .is_some_and(|at| at.date_naive() == Utc::now().date_naive());

    state
        .engine
        .schedule_evening_nudge(habit_id, completed_today)
        .await?;

    Ok(Json(serde_json::json!({ "completed_today": completed_today })))
}

/// Notification action button press, forwarded by the platform callback.
pub async fn reminder_action(
    State(state): State<AppState>,
    Path(habit_id): Path<Uuid>,
    Json(body): Json<ReminderActionRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let action = state
        .actions
        .resolve(&body.action_id)
        .ok_or_else(|| AppError::Validation(format!("Unknown action {}", body.action_id)))?;

    state.engine.handle_action(habit_id, action).await?;

    Ok(Json(serde_json::json!({ "handled": body.action_id })))
}

pub async fn get_global_settings(
    State(state): State<AppState>,
) -> AppResult<Json<GlobalReminderSettings>> {
    Ok(Json(state.engine.global_settings().await?))
}

pub async fn update_global_settings(
    State(state): State<AppState>,
    Json(settings): Json<GlobalReminderSettings>,
) -> AppResult<Json<GlobalReminderSettings>> {
    state.engine.update_global_settings(&settings).await?;
    Ok(Json(settings))
}

/// Scheduled-notification introspection, useful when debugging why a
/// reminder did or did not fire.
pub async fn pending_notifications(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<NotificationRequest>>> {
    let pending = state.dispatcher.pending().await.map_err(AppError::from)?;
    Ok(Json(pending))
}
