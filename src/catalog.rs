use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::habit::{Habit, HabitInfo};
use crate::storage::StoreError;

/// Read-only lookup from habit id to title, category, and point value.
/// The catalog rows are owned by the selection subsystem; this service
/// only reads them.
#[async_trait]
pub trait HabitCatalog: Send + Sync {
    async fn lookup(&self, habit_id: Uuid) -> Result<Option<HabitInfo>, StoreError>;
}

pub struct PgCatalog {
    db: PgPool,
}

impl PgCatalog {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HabitCatalog for PgCatalog {
    async fn lookup(&self, habit_id: Uuid) -> Result<Option<HabitInfo>, StoreError> {
        let habit = sqlx::query_as::<_, Habit>(
            "SELECT * FROM habits WHERE id = $1 AND is_active = true",
        )
        .bind(habit_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(habit.map(|h| HabitInfo {
            aura_points: h.aura_points(),
            title: h.title,
            category: h.category,
        }))
    }
}

/// Fixed in-memory catalog, for tests.
#[derive(Clone, Default)]
pub struct StaticCatalog {
    entries: HashMap<Uuid, HabitInfo>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, habit_id: Uuid, info: HabitInfo) -> Self {
        self.entries.insert(habit_id, info);
        self
    }
}

#[async_trait]
impl HabitCatalog for StaticCatalog {
    async fn lookup(&self, habit_id: Uuid) -> Result<Option<HabitInfo>, StoreError> {
        Ok(self.entries.get(&habit_id).cloned())
    }
}
