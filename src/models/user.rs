use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Per-user completion counters. Mutated only inside the ledger's
/// compare-and-swap write; everyone else reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserCounters {
    pub total_count: i64,
    pub streak_count: i64,
    pub total_aura: i64,
    pub last_completed: Option<DateTime<Utc>>,
}
