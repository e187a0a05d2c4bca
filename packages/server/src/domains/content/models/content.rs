use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{ContentId, CreatorId, Platform};
use crate::kernel::jobs::ContentMetadata;
use crate::kernel::{ContentStats, SourceItem};

/// A fetched post or video, unique per `(platform, platform_content_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Content {
    pub id: ContentId,
    pub platform: Platform,
    pub platform_content_id: String,
    pub creator_id: CreatorId,
    pub creator_handle: String,
    pub title: Option<String>,
    pub caption: Option<String>,
    pub hashtags: Vec<String>,
    pub media_url: Option<String>,
    pub source_url: String,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub comment_count: Option<i64>,
    pub share_count: Option<i64>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written by an upsert.
#[derive(Debug, Clone)]
pub struct ContentInput {
    pub platform: Platform,
    pub creator_id: CreatorId,
    pub creator_handle: String,
    pub item: SourceItem,
}

impl Content {
    pub fn from_input(input: ContentInput) -> Self {
        let now = Utc::now();
        let item = input.item;
        Self {
            id: ContentId::new(),
            platform: input.platform,
            platform_content_id: item.external_id,
            creator_id: input.creator_id,
            creator_handle: input.creator_handle,
            title: item.title,
            caption: item.caption,
            hashtags: item.hashtags,
            media_url: item.media_url,
            source_url: item.source_url,
            view_count: item.stats.views,
            like_count: item.stats.likes,
            comment_count: item.stats.comments,
            share_count: item.stats.shares,
            published_at: item.published_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites the fields that change between fetches.
    pub fn refresh_stats(&mut self, stats: &ContentStats) {
        self.view_count = stats.views.or(self.view_count);
        self.like_count = stats.likes.or(self.like_count);
        self.comment_count = stats.comments.or(self.comment_count);
        self.share_count = stats.shares.or(self.share_count);
        self.updated_at = Utc::now();
    }

    pub fn metadata(&self) -> ContentMetadata {
        ContentMetadata {
            title: self.title.clone(),
            caption: self.caption.clone(),
            platform: Some(self.platform),
            creator_handle: Some(self.creator_handle.clone()),
            hashtags: self.hashtags.clone(),
            source_url: Some(self.source_url.clone()),
            published_at: self.published_at,
        }
    }

    /// Characters of title plus caption, a rough proxy for duration.
    pub fn text_length(&self) -> usize {
        self.title.as_deref().map_or(0, |t| t.chars().count())
            + self.caption.as_deref().map_or(0, |c| c.chars().count())
    }
}

// =============================================================================
// SQL Queries
// =============================================================================

const CONTENT_COLUMNS: &str = "id, platform, platform_content_id, creator_id, creator_handle, \
     title, caption, hashtags, media_url, source_url, view_count, like_count, comment_count, \
     share_count, published_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UpsertRow {
    #[sqlx(flatten)]
    content: Content,
    inserted: bool,
}

impl Content {
    /// Insert if new, else refresh the mutable stats in place. Returns the
    /// row and whether it was inserted.
    pub async fn upsert(input: ContentInput, pool: &PgPool) -> Result<(Self, bool)> {
        let c = Self::from_input(input);
        let row = sqlx::query_as::<_, UpsertRow>(&format!(
            r#"
            INSERT INTO content_items (
                id, platform, platform_content_id, creator_id, creator_handle, title, caption,
                hashtags, media_url, source_url, view_count, like_count, comment_count,
                share_count, published_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (platform, platform_content_id) DO UPDATE SET
                view_count = COALESCE(EXCLUDED.view_count, content_items.view_count),
                like_count = COALESCE(EXCLUDED.like_count, content_items.like_count),
                comment_count = COALESCE(EXCLUDED.comment_count, content_items.comment_count),
                share_count = COALESCE(EXCLUDED.share_count, content_items.share_count),
                updated_at = NOW()
            RETURNING {CONTENT_COLUMNS}, (xmax = 0) AS inserted
            "#
        ))
        .bind(c.id)
        .bind(c.platform)
        .bind(&c.platform_content_id)
        .bind(c.creator_id)
        .bind(&c.creator_handle)
        .bind(&c.title)
        .bind(&c.caption)
        .bind(&c.hashtags)
        .bind(&c.media_url)
        .bind(&c.source_url)
        .bind(c.view_count)
        .bind(c.like_count)
        .bind(c.comment_count)
        .bind(c.share_count)
        .bind(c.published_at)
        .fetch_one(pool)
        .await?;
        Ok((row.content, row.inserted))
    }

    pub async fn find_by_id(id: ContentId, pool: &PgPool) -> Result<Option<Self>> {
        let content = sqlx::query_as::<_, Self>(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(content)
    }
}
