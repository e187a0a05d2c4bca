//! Storage seam for pipeline artifacts (creators, content, transcripts,
//! summaries). Stage bodies use this trait; the jobs themselves live in
//! [`crate::kernel::jobs::JobStore`].

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::common::{ContentId, CreatorId, UserId};
use crate::domains::content::{Content, ContentInput};
use crate::domains::creators::{Creator, UserPreferences};
use crate::domains::summaries::Summary;
use crate::domains::transcripts::Transcript;

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn find_creator(&self, id: CreatorId) -> Result<Option<Creator>>;

    async fn find_creators(&self, ids: &[CreatorId]) -> Result<Vec<Creator>>;

    async fn followed_creators(&self, user_id: UserId) -> Result<Vec<Creator>>;

    async fn user_preferences(&self, user_id: UserId) -> Result<Option<UserPreferences>>;

    async fn mark_creator_fetched(&self, id: CreatorId) -> Result<()>;

    /// Insert if new, else refresh stats. Returns the row and whether it was inserted.
    async fn upsert_content(&self, input: ContentInput) -> Result<(Content, bool)>;

    async fn find_content(&self, id: ContentId) -> Result<Option<Content>>;

    async fn upsert_transcript(&self, transcript: Transcript) -> Result<Transcript>;

    async fn find_transcript(&self, content_id: ContentId) -> Result<Option<Transcript>>;

    async fn pending_async_transcripts(&self, limit: i64) -> Result<Vec<Transcript>>;

    /// Records a poll that left the transcript pending.
    async fn mark_transcript_polled(&self, content_id: ContentId) -> Result<()>;

    async fn upsert_summary(&self, summary: Summary) -> Result<Summary>;

    async fn find_summary(&self, content_id: ContentId) -> Result<Option<Summary>>;
}

/// Postgres implementation delegating to the domain models.
#[derive(Clone)]
pub struct PostgresContentStore {
    pool: PgPool,
}

impl PostgresContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentStore for PostgresContentStore {
    async fn find_creator(&self, id: CreatorId) -> Result<Option<Creator>> {
        Creator::find_by_id(id, &self.pool).await
    }

    async fn find_creators(&self, ids: &[CreatorId]) -> Result<Vec<Creator>> {
        Creator::find_by_ids(ids, &self.pool).await
    }

    async fn followed_creators(&self, user_id: UserId) -> Result<Vec<Creator>> {
        Creator::find_followed_by(user_id, &self.pool).await
    }

    async fn user_preferences(&self, user_id: UserId) -> Result<Option<UserPreferences>> {
        UserPreferences::find_for_user(user_id, &self.pool).await
    }

    async fn mark_creator_fetched(&self, id: CreatorId) -> Result<()> {
        Creator::mark_fetched(id, &self.pool).await
    }

    async fn upsert_content(&self, input: ContentInput) -> Result<(Content, bool)> {
        Content::upsert(input, &self.pool).await
    }

    async fn find_content(&self, id: ContentId) -> Result<Option<Content>> {
        Content::find_by_id(id, &self.pool).await
    }

    async fn upsert_transcript(&self, transcript: Transcript) -> Result<Transcript> {
        transcript.upsert(&self.pool).await
    }

    async fn find_transcript(&self, content_id: ContentId) -> Result<Option<Transcript>> {
        Transcript::find_by_content(content_id, &self.pool).await
    }

    async fn pending_async_transcripts(&self, limit: i64) -> Result<Vec<Transcript>> {
        Transcript::find_pending_async(limit, &self.pool).await
    }

    async fn mark_transcript_polled(&self, content_id: ContentId) -> Result<()> {
        Transcript::touch_polled(content_id, &self.pool).await
    }

    async fn upsert_summary(&self, summary: Summary) -> Result<Summary> {
        summary.upsert(&self.pool).await
    }

    async fn find_summary(&self, content_id: ContentId) -> Result<Option<Summary>> {
        Summary::find_by_content(content_id, &self.pool).await
    }
}
