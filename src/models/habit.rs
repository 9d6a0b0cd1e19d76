use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Flat point value for completions of habits the catalog does not know
/// about (user-created challenges without a configured reward).
pub const DEFAULT_AURA_POINTS: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Habit {
    pub id: Uuid,
    pub title: String,
    pub category: HabitCategory,
    pub difficulty: i32,
    pub custom_aura: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "habit_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum HabitCategory {
    Mindfulness,
    Fitness,
    Learning,
    Creativity,
    Social,
    Productivity,
    Wellness,
    Gratitude,
}

impl Habit {
    /// Points awarded per completion: the custom reward if one was set,
    /// otherwise 10 points per difficulty step.
    pub fn aura_points(&self) -> i64 {
        self.custom_aura
            .unwrap_or(self.difficulty as i64 * DEFAULT_AURA_POINTS)
    }
}

/// Catalog projection consumed by the reminder engine and the ledger.
#[derive(Debug, Clone)]
pub struct HabitInfo {
    pub title: String,
    pub category: HabitCategory,
    pub aura_points: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn habit(difficulty: i32, custom_aura: Option<i64>) -> Habit {
        Habit {
            id: Uuid::new_v4(),
            title: "Test".into(),
            category: HabitCategory::Fitness,
            difficulty,
            custom_aura,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_aura_points_from_difficulty() {
        assert_eq!(habit(1, None).aura_points(), 10);
        assert_eq!(habit(3, None).aura_points(), 30);
        assert_eq!(habit(5, None).aura_points(), 50);
    }

    #[test]
    fn test_aura_points_custom_override() {
        assert_eq!(habit(3, Some(75)).aura_points(), 75);
    }

    #[test]
    fn test_category_serializes_lowercase() {
        let json = serde_json::to_value(HabitCategory::Mindfulness).unwrap();
        assert_eq!(json, serde_json::json!("mindfulness"));
    }
}
