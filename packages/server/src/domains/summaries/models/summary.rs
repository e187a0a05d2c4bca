use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::ContentId;

/// AI summary of one content item. Upserted by `content_id`; last write wins.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Summary {
    pub content_id: ContentId,
    pub summary: String,
    pub key_points: Vec<String>,
    pub topics: Vec<String>,
    pub sentiment: String,
    pub content_type: Option<String>,
    pub key_information: Option<serde_json::Value>,
    pub model: String,
    /// The model reply did not parse and the summary is the raw reply prefix.
    pub is_fallback: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const SUMMARY_COLUMNS: &str = "content_id, summary, key_points, topics, sentiment, content_type, \
     key_information, model, is_fallback, created_at, updated_at";

impl Summary {
    pub async fn upsert(&self, pool: &PgPool) -> Result<Self> {
        let summary = sqlx::query_as::<_, Self>(&format!(
            r#"
            INSERT INTO summaries (
                content_id, summary, key_points, topics, sentiment, content_type,
                key_information, model, is_fallback
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (content_id) DO UPDATE SET
                summary = EXCLUDED.summary,
                key_points = EXCLUDED.key_points,
                topics = EXCLUDED.topics,
                sentiment = EXCLUDED.sentiment,
                content_type = EXCLUDED.content_type,
                key_information = EXCLUDED.key_information,
                model = EXCLUDED.model,
                is_fallback = EXCLUDED.is_fallback,
                updated_at = NOW()
            RETURNING {SUMMARY_COLUMNS}
            "#
        ))
        .bind(self.content_id)
        .bind(&self.summary)
        .bind(&self.key_points)
        .bind(&self.topics)
        .bind(&self.sentiment)
        .bind(&self.content_type)
        .bind(&self.key_information)
        .bind(&self.model)
        .bind(self.is_fallback)
        .fetch_one(pool)
        .await?;
        Ok(summary)
    }

    pub async fn find_by_content(content_id: ContentId, pool: &PgPool) -> Result<Option<Self>> {
        let summary = sqlx::query_as::<_, Self>(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM summaries WHERE content_id = $1"
        ))
        .bind(content_id)
        .fetch_optional(pool)
        .await?;
        Ok(summary)
    }
}
