use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::catalog::HabitCatalog;
use crate::models::completion::{CompletionEvent, LedgerReceipt};
use crate::models::habit::DEFAULT_AURA_POINTS;
use crate::models::user::UserCounters;
use crate::storage::{CounterStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The optimistic transaction kept losing to concurrent writers. The
    /// event itself is stored, so the caller may simply retry.
    #[error("counter update conflicted {attempts} times")]
    RetryExhausted { attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Atomic counter service: turns a stream of completion events into
/// consistent streak/day/point totals. The user record is the unit of
/// serialization; per-habit state never enters these transactions.
pub struct CompletionLedger {
    store: Arc<dyn CounterStore>,
    catalog: Arc<dyn HabitCatalog>,
    max_retries: u32,
    backoff: Duration,
}

impl CompletionLedger {
    pub fn new(
        store: Arc<dyn CounterStore>,
        catalog: Arc<dyn HabitCatalog>,
        max_retries: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            store,
            catalog,
            max_retries,
            backoff,
        }
    }

    pub async fn counters(&self, user_id: Uuid) -> Result<UserCounters, LedgerError> {
        let (counters, _) = self.store.load(user_id).await?;
        Ok(counters)
    }

    /// Record one completion with a server-assigned timestamp.
    pub async fn record_completion(
        &self,
        user_id: Uuid,
        habit_id: Uuid,
    ) -> Result<LedgerReceipt, LedgerError> {
        self.record_completion_at(user_id, habit_id, Utc::now())
            .await
    }

    pub async fn record_completion_at(
        &self,
        user_id: Uuid,
        habit_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<LedgerReceipt, LedgerError> {
        let points = match self.catalog.lookup(habit_id).await? {
            Some(info) => info.aura_points,
            None => DEFAULT_AURA_POINTS,
        };

        // The event is stored durably before the counter transaction, under
        // its idempotency key. A duplicate submission stops here.
        let event = CompletionEvent::new(user_id, habit_id, now);
        if !self.store.create_event(&event).await? {
            tracing::debug!(user_id = %user_id, habit_id = %habit_id, "Duplicate completion event");
            let (counters, _) = self.store.load(user_id).await?;
            return Ok(receipt(counters, false, true));
        }

        let mut attempts: u32 = 0;
        loop {
            let (counters, version) = self.store.load(user_id).await?;
            let (next, counted_new_day) = apply(&counters, points, now);

            match self.store.store(user_id, version, &next).await {
                Ok(()) => return Ok(receipt(next, counted_new_day, false)),
                Err(StoreError::Conflict) => {
                    attempts += 1;
                    if attempts >= self.max_retries {
                        return Err(LedgerError::RetryExhausted { attempts });
                    }
                    let jitter = rand::thread_rng().gen_range(0..=self.backoff.as_millis() as u64);
                    tokio::time::sleep(self.backoff * attempts + Duration::from_millis(jitter))
                        .await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn receipt(counters: UserCounters, counted_new_day: bool, deduplicated: bool) -> LedgerReceipt {
    LedgerReceipt {
        total_count: counters.total_count,
        streak_count: counters.streak_count,
        total_aura: counters.total_aura,
        counted_new_day,
        deduplicated,
    }
}

/// The counter transition. Day and streak totals advance at most once per
/// UTC calendar day; points accrue for every distinct event.
fn apply(current: &UserCounters, points: i64, now: DateTime<Utc>) -> (UserCounters, bool) {
    let today = now.date_naive();

    if let Some(last) = current.last_completed {
        if last.date_naive() == today {
            let next = UserCounters {
                total_aura: current.total_aura + points,
                last_completed: Some(now),
                ..current.clone()
            };
            return (next, false);
        }
    }

    let continues_streak = match (current.last_completed, today.pred_opt()) {
        (Some(last), Some(yesterday)) => last.date_naive() == yesterday,
        _ => false,
    };

    let next = UserCounters {
        total_count: current.total_count + 1,
        streak_count: if continues_streak {
            current.streak_count + 1
        } else {
            1
        },
        total_aura: current.total_aura + points,
        last_completed: Some(now),
    };
    (next, true)
}
