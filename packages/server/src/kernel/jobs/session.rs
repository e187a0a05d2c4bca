//! Pipeline session model.
//!
//! A session is one user-initiated batch of pipeline work. Its counters are
//! cached aggregates over the jobs that reference it and are refreshed after
//! every drain cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};

use super::error::{unique_violation, ACTIVE_SESSION_CONSTRAINT};
use super::QueueError;
use crate::common::{SessionId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "session_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Completed,
}

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub status: SessionStatus,
    pub total_jobs: i32,
    pub completed_jobs: i32,
    pub failed_jobs: i32,
    pub error_summary: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: UserId, total_jobs: i32, now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            status: SessionStatus::Active,
            total_jobs: total_jobs.max(0),
            completed_jobs: 0,
            failed_jobs: 0,
            error_summary: Vec::new(),
            started_at: now,
            completed_at: None,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Jobs that reached a terminal state.
    pub fn resolved_jobs(&self) -> i32 {
        self.completed_jobs + self.failed_jobs
    }
}

const SESSION_COLUMNS: &str = "id, user_id, status, total_jobs, completed_jobs, failed_jobs, \
     error_summary, started_at, completed_at, updated_at";

impl Session {
    /// Inserts a new active session. The partial unique index on
    /// `(user_id) WHERE status = 'active'` rejects a second one.
    pub async fn insert(session: &Session, pool: &PgPool) -> Result<Self, QueueError> {
        let result = sqlx::query_as::<_, Self>(&format!(
            r#"
            INSERT INTO pipeline_sessions (
                id, user_id, status, total_jobs, completed_jobs, failed_jobs,
                error_summary, started_at
            )
            VALUES ($1, $2, 'active', $3, 0, 0, '{{}}', $4)
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.total_jobs)
        .bind(session.started_at)
        .fetch_one(pool)
        .await;

        match result {
            Ok(session) => Ok(session),
            Err(err) => match unique_violation(&err) {
                Some(constraint) if constraint == ACTIVE_SESSION_CONSTRAINT => {
                    Err(QueueError::ActiveSessionExists(session.user_id))
                }
                _ => Err(err.into()),
            },
        }
    }

    pub async fn find_by_id(id: SessionId, pool: &PgPool) -> Result<Option<Self>, QueueError> {
        let session = sqlx::query_as::<_, Self>(&format!(
            "SELECT {SESSION_COLUMNS} FROM pipeline_sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(session)
    }

    pub async fn find_active_for_user(
        user_id: UserId,
        pool: &PgPool,
    ) -> Result<Option<Self>, QueueError> {
        let session = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM pipeline_sessions
            WHERE user_id = $1 AND status = 'active'
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(session)
    }

    pub async fn find_latest_for_user(
        user_id: UserId,
        pool: &PgPool,
    ) -> Result<Option<Self>, QueueError> {
        let session = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM pipeline_sessions
            WHERE user_id = $1
            ORDER BY started_at DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(session)
    }

    pub async fn update_progress(
        id: SessionId,
        total_jobs: i32,
        completed_jobs: i32,
        failed_jobs: i32,
        pool: &PgPool,
    ) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE pipeline_sessions
            SET total_jobs = $2,
                completed_jobs = $3,
                failed_jobs = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(total_jobs)
        .bind(completed_jobs)
        .bind(failed_jobs)
        .execute(pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(QueueError::SessionNotFound(id));
        }
        Ok(())
    }

    /// Moves an active session to `completed`. Returns false when the
    /// session was already completed, so callers act on completion once.
    pub async fn complete(
        id: SessionId,
        errors: &[String],
        pool: &PgPool,
    ) -> Result<bool, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE pipeline_sessions
            SET status = 'completed',
                error_summary = $2,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(id)
        .bind(errors)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Re-opens a completed session so retried jobs are tracked again.
    pub async fn reopen(
        id: SessionId,
        user_id: UserId,
        conn: &mut PgConnection,
    ) -> Result<bool, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE pipeline_sessions
            SET status = 'active',
                completed_at = NULL,
                error_summary = '{}',
                updated_at = NOW()
            WHERE id = $1 AND status = 'completed'
            "#,
        )
        .bind(id)
        .execute(conn)
        .await;

        match result {
            Ok(result) => Ok(result.rows_affected() == 1),
            Err(err) => match unique_violation(&err) {
                Some(constraint) if constraint == ACTIVE_SESSION_CONSTRAINT => {
                    Err(QueueError::ActiveSessionExists(user_id))
                }
                _ => Err(err.into()),
            },
        }
    }
}
