use axum::{extract::State, Extension, Json};

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::models::completion::{LedgerReceipt, RecordCompletionRequest};
use crate::models::user::UserCounters;
use crate::AppState;

/// Record a completion. The ledger assigns the timestamp server-side and
/// deduplicates retried submissions; conflicts are retried transparently
/// and only exhaustion surfaces to the caller.
pub async fn record_completion(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<RecordCompletionRequest>,
) -> AppResult<Json<LedgerReceipt>> {
    let receipt = state
        .ledger
        .record_completion(auth_user.id, body.habit_id)
        .await?;

    Ok(Json(receipt))
}

pub async fn get_counters(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<UserCounters>> {
    let counters = state.ledger.counters(auth_user.id).await?;
    Ok(Json(counters))
}
