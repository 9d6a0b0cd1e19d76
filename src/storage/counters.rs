use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::StoreError;
use crate::models::completion::CompletionEvent;
use crate::models::user::UserCounters;

/// The ledger's view of the document store: versioned read, conditional
/// write, and create-with-chosen-id for the idempotency key. The version
/// returned by `load` must be passed back to `store`; a mismatch means
/// another writer got there first and surfaces as `StoreError::Conflict`.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current counters and their version; zeros and version 0 when the
    /// user has no record yet.
    async fn load(&self, user_id: Uuid) -> Result<(UserCounters, i64), StoreError>;

    /// Conditional write: succeeds only when the stored version still
    /// equals `expected_version` (0 = "no record existed").
    async fn store(
        &self,
        user_id: Uuid,
        expected_version: i64,
        counters: &UserCounters,
    ) -> Result<(), StoreError>;

    /// Insert the event under its caller-chosen id. Returns false when an
    /// event with that id already exists (duplicate submission).
    async fn create_event(&self, event: &CompletionEvent) -> Result<bool, StoreError>;
}

pub struct PgCounterStore {
    db: PgPool,
}

impl PgCounterStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CounterStore for PgCounterStore {
    async fn load(&self, user_id: Uuid) -> Result<(UserCounters, i64), StoreError> {
        let row = sqlx::query_as::<_, (i64, i64, i64, Option<DateTime<Utc>>, i64)>(
            r#"
            SELECT total_count, streak_count, total_aura, last_completed, version
            FROM user_counters WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(match row {
            Some((total_count, streak_count, total_aura, last_completed, version)) => (
                UserCounters {
                    total_count,
                    streak_count,
                    total_aura,
                    last_completed,
                },
                version,
            ),
            None => (UserCounters::default(), 0),
        })
    }

    async fn store(
        &self,
        user_id: Uuid,
        expected_version: i64,
        counters: &UserCounters,
    ) -> Result<(), StoreError> {
        let result = if expected_version == 0 {
            sqlx::query(
                r#"
                INSERT INTO user_counters
                    (user_id, total_count, streak_count, total_aura, last_completed, version)
                VALUES ($1, $2, $3, $4, $5, 1)
                ON CONFLICT (user_id) DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(counters.total_count)
            .bind(counters.streak_count)
            .bind(counters.total_aura)
            .bind(counters.last_completed)
            .execute(&self.db)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE user_counters SET
                    total_count = $3,
                    streak_count = $4,
                    total_aura = $5,
                    last_completed = $6,
                    version = version + 1,
                    updated_at = NOW()
                WHERE user_id = $1 AND version = $2
                "#,
            )
            .bind(user_id)
            .bind(expected_version)
            .bind(counters.total_count)
            .bind(counters.streak_count)
            .bind(counters.total_aura)
            .bind(counters.last_completed)
            .execute(&self.db)
            .await?
        };

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn create_event(&self, event: &CompletionEvent) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO completion_events (id, user_id, habit_id, completed_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&event.id)
        .bind(event.user_id)
        .bind(event.habit_id)
        .bind(event.completed_at)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// In-memory counter store with the same CAS semantics, for tests.
#[derive(Clone, Default)]
pub struct MemoryCounterStore {
    counters: Arc<RwLock<HashMap<Uuid, (UserCounters, i64)>>>,
    events: Arc<RwLock<HashMap<String, CompletionEvent>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn load(&self, user_id: Uuid) -> Result<(UserCounters, i64), StoreError> {
        Ok(self
            .counters
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or((UserCounters::default(), 0)))
    }

    async fn store(
        &self,
        user_id: Uuid,
        expected_version: i64,
        counters: &UserCounters,
    ) -> Result<(), StoreError> {
        let mut guard = self.counters.write().await;
        let current_version = guard.get(&user_id).map(|(_, v)| *v).unwrap_or(0);
        if current_version != expected_version {
            return Err(StoreError::Conflict);
        }
        guard.insert(user_id, (counters.clone(), expected_version + 1));
        Ok(())
    }

    async fn create_event(&self, event: &CompletionEvent) -> Result<bool, StoreError> {
        let mut guard = self.events.write().await;
        if guard.contains_key(&event.id) {
            return Ok(false);
        }
        guard.insert(event.id.clone(), event.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_memory_cas_rejects_stale_version() {
        let store = MemoryCounterStore::new();
        let user = Uuid::new_v4();

        let (counters, version) = store.load(user).await.unwrap();
        assert_eq!(version, 0);

        store.store(user, version, &counters).await.unwrap();

        // A second writer using the stale version must conflict.
        let result = store.store(user, version, &counters).await;
        assert!(matches!(result, Err(StoreError::Conflict)));

        // Re-reading yields the new version, and the write goes through.
        let (_, version) = store.load(user).await.unwrap();
        assert_eq!(version, 1);
        store.store(user, version, &counters).await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_event_dedup() {
        let store = MemoryCounterStore::new();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let event = CompletionEvent::new(Uuid::new_v4(), Uuid::new_v4(), at);

        assert!(store.create_event(&event).await.unwrap());
        assert!(!store.create_event(&event).await.unwrap());
    }
}
