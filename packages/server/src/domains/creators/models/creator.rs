use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{CreatorId, Platform, UserId};
use crate::kernel::jobs::CreatorDescriptor;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Creator {
    pub id: CreatorId,
    pub platform: Platform,
    pub handle: String,
    pub display_name: Option<String>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Creator {
    pub fn new(platform: Platform, handle: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: CreatorId::new(),
            platform,
            handle: handle.into(),
            display_name: None,
            last_fetched_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn descriptor(&self) -> CreatorDescriptor {
        CreatorDescriptor {
            creator_id: self.id,
            platform: self.platform,
            handle: self.handle.clone(),
        }
    }
}

// =============================================================================
// SQL Queries
// =============================================================================

const CREATOR_COLUMNS: &str =
    "c.id, c.platform, c.handle, c.display_name, c.last_fetched_at, c.created_at, c.updated_at";

impl Creator {
    /// Insert a creator, or return the existing row for the same platform + handle.
    pub async fn find_or_create(
        platform: Platform,
        handle: &str,
        display_name: Option<&str>,
        pool: &PgPool,
    ) -> Result<Self> {
        let creator = sqlx::query_as::<_, Self>(&format!(
            r#"
            INSERT INTO creators AS c (id, platform, handle, display_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (platform, handle) DO UPDATE
                SET display_name = COALESCE(EXCLUDED.display_name, c.display_name)
            RETURNING {CREATOR_COLUMNS}
            "#
        ))
        .bind(CreatorId::new())
        .bind(platform)
        .bind(handle.trim_start_matches('@'))
        .bind(display_name)
        .fetch_one(pool)
        .await?;
        Ok(creator)
    }

    pub async fn find_by_id(id: CreatorId, pool: &PgPool) -> Result<Option<Self>> {
        let creator = sqlx::query_as::<_, Self>(&format!(
            "SELECT {CREATOR_COLUMNS} FROM creators c WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(creator)
    }

    pub async fn find_by_ids(ids: &[CreatorId], pool: &PgPool) -> Result<Vec<Self>> {
        let creators = sqlx::query_as::<_, Self>(&format!(
            "SELECT {CREATOR_COLUMNS} FROM creators c WHERE c.id = ANY($1) ORDER BY c.handle"
        ))
        .bind(ids)
        .fetch_all(pool)
        .await?;
        Ok(creators)
    }

    /// Creators a user follows.
    pub async fn find_followed_by(user_id: UserId, pool: &PgPool) -> Result<Vec<Self>> {
        let creators = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {CREATOR_COLUMNS}
            FROM creators c
            JOIN user_creators uc ON uc.creator_id = c.id
            WHERE uc.user_id = $1
            ORDER BY c.handle
            "#
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(creators)
    }

    pub async fn follow(user_id: UserId, creator_id: CreatorId, pool: &PgPool) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_creators (user_id, creator_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(creator_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_fetched(id: CreatorId, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE creators SET last_fetched_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
