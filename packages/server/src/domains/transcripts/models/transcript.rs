use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{ContentId, SessionId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transcript_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TranscriptStatus {
    /// The provider is still working; `async_handle` is set.
    PendingAsync,
    Completed,
    Failed,
}

/// Transcript of one content item, keyed by `content_id`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transcript {
    pub content_id: ContentId,
    pub status: TranscriptStatus,
    pub text: Option<String>,
    /// Timed segments as returned by the provider.
    pub aux_format: Option<serde_json::Value>,
    pub language: Option<String>,
    pub async_handle: Option<String>,
    pub error_message: Option<String>,
    /// Owner of the job that produced the row; carried to the summarize job.
    pub user_id: UserId,
    pub session_id: Option<SessionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transcript {
    fn base(content_id: ContentId, user_id: UserId, session_id: Option<SessionId>) -> Self {
        let now = Utc::now();
        Self {
            content_id,
            status: TranscriptStatus::Completed,
            text: None,
            aux_format: None,
            language: None,
            async_handle: None,
            error_message: None,
            user_id,
            session_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn completed(
        content_id: ContentId,
        user_id: UserId,
        session_id: Option<SessionId>,
        text: String,
        aux_format: Option<serde_json::Value>,
        language: Option<String>,
    ) -> Self {
        Self {
            text: Some(text),
            aux_format,
            language,
            ..Self::base(content_id, user_id, session_id)
        }
    }

    pub fn pending_async(
        content_id: ContentId,
        user_id: UserId,
        session_id: Option<SessionId>,
        handle: String,
    ) -> Self {
        Self {
            status: TranscriptStatus::PendingAsync,
            async_handle: Some(handle),
            ..Self::base(content_id, user_id, session_id)
        }
    }

    pub fn failed(
        content_id: ContentId,
        user_id: UserId,
        session_id: Option<SessionId>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            status: TranscriptStatus::Failed,
            error_message: Some(reason.into()),
            ..Self::base(content_id, user_id, session_id)
        }
    }

    /// Completed text, if any.
    pub fn completed_text(&self) -> Option<&str> {
        match self.status {
            TranscriptStatus::Completed => self.text.as_deref().filter(|t| !t.trim().is_empty()),
            _ => None,
        }
    }
}

// =============================================================================
// SQL Queries
// =============================================================================

const TRANSCRIPT_COLUMNS: &str = "content_id, status, text, aux_format, language, async_handle, \
     error_message, user_id, session_id, created_at, updated_at";

impl Transcript {
    /// Insert or replace the transcript of a content item.
    pub async fn upsert(&self, pool: &PgPool) -> Result<Self> {
        let transcript = sqlx::query_as::<_, Self>(&format!(
            r#"
            INSERT INTO transcripts (
                content_id, status, text, aux_format, language, async_handle,
                error_message, user_id, session_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (content_id) DO UPDATE SET
                status = EXCLUDED.status,
                text = EXCLUDED.text,
                aux_format = EXCLUDED.aux_format,
                language = EXCLUDED.language,
                async_handle = EXCLUDED.async_handle,
                error_message = EXCLUDED.error_message,
                user_id = EXCLUDED.user_id,
                session_id = COALESCE(EXCLUDED.session_id, transcripts.session_id),
                updated_at = NOW()
            RETURNING {TRANSCRIPT_COLUMNS}
            "#
        ))
        .bind(self.content_id)
        .bind(self.status)
        .bind(&self.text)
        .bind(&self.aux_format)
        .bind(&self.language)
        .bind(&self.async_handle)
        .bind(&self.error_message)
        .bind(self.user_id)
        .bind(self.session_id)
        .fetch_one(pool)
        .await?;
        Ok(transcript)
    }

    pub async fn find_by_content(content_id: ContentId, pool: &PgPool) -> Result<Option<Self>> {
        let transcript = sqlx::query_as::<_, Self>(&format!(
            "SELECT {TRANSCRIPT_COLUMNS} FROM transcripts WHERE content_id = $1"
        ))
        .bind(content_id)
        .fetch_optional(pool)
        .await?;
        Ok(transcript)
    }

    /// Least recently polled first, so every handle eventually gets polled.
    pub async fn find_pending_async(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let transcripts = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {TRANSCRIPT_COLUMNS}
            FROM transcripts
            WHERE status = 'pending_async' AND async_handle IS NOT NULL
            ORDER BY updated_at ASC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(transcripts)
    }

    /// Moves a still-pending handle to the back of the polling order.
    pub async fn touch_polled(content_id: ContentId, pool: &PgPool) -> Result<()> {
        sqlx::query(
            "UPDATE transcripts SET updated_at = NOW() \
             WHERE content_id = $1 AND status = 'pending_async'",
        )
        .bind(content_id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
