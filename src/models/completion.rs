use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A completion event as stored durably. The id doubles as the idempotency
/// key: one event per user, habit, and UTC calendar day, so retried
/// submissions of the same completion collapse while distinct habits
/// completed on the same day each keep their own event.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompletionEvent {
    pub id: String,
    pub user_id: Uuid,
    pub habit_id: Uuid,
    pub completed_at: DateTime<Utc>,
}

impl CompletionEvent {
    pub fn new(user_id: Uuid, habit_id: Uuid, completed_at: DateTime<Utc>) -> Self {
        Self {
            id: Self::idempotency_key(user_id, habit_id, completed_at),
            user_id,
            habit_id,
            completed_at,
        }
    }

    pub fn idempotency_key(user_id: Uuid, habit_id: Uuid, at: DateTime<Utc>) -> String {
        format!("{}:{}:{}", user_id, habit_id, at.format("%Y-%m-%d"))
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordCompletionRequest {
    pub habit_id: Uuid,
}

/// Result of a ledger transaction, echoed back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerReceipt {
    pub total_count: i64,
    pub streak_count: i64,
    pub total_aura: i64,
    /// Whether this completion advanced a new calendar day.
    pub counted_new_day: bool,
    /// Whether the event was a duplicate of one already recorded.
    pub deduplicated: bool,
}
