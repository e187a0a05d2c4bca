use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::UserId;

/// Per-user fetch settings. Users without a row get the pipeline defaults.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserPreferences {
    pub user_id: UserId,
    /// Only items published within this many days are kept.
    pub recency_days: i32,
    pub max_items_per_creator: i32,
}

impl UserPreferences {
    pub fn defaults(user_id: UserId, recency_days: i32, max_items_per_creator: i32) -> Self {
        Self {
            user_id,
            recency_days,
            max_items_per_creator,
        }
    }

    pub async fn find_for_user(user_id: UserId, pool: &PgPool) -> Result<Option<Self>> {
        let prefs = sqlx::query_as::<_, Self>(
            "SELECT user_id, recency_days, max_items_per_creator FROM user_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(prefs)
    }

    pub async fn upsert(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_preferences (user_id, recency_days, max_items_per_creator)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
                SET recency_days = EXCLUDED.recency_days,
                    max_items_per_creator = EXCLUDED.max_items_per_creator,
                    updated_at = NOW()
            "#,
        )
        .bind(self.user_id)
        .bind(self.recency_days)
        .bind(self.max_items_per_creator)
        .execute(pool)
        .await?;
        Ok(())
    }
}
