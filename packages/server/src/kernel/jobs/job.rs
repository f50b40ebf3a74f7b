//! Job model for durable background work.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Backoff ceiling for retries, in seconds.
const MAX_RETRY_DELAY_SECS: i64 = 3600;

/// Extra lease time on top of the job timeout before another worker may reclaim it.
const LEASE_GRACE_MS: i64 = 30_000;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    DeadLetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_error_kind", rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transient error - will retry if attempts remain
    #[default]
    Retryable,
    /// Permanent error - will not retry
    NonRetryable,
}

impl ErrorKind {
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorKind::Retryable)
    }
}

// ============================================================================
// Job Model
// ============================================================================

#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Job {
    #[builder(default = Uuid::now_v7())]
    pub id: Uuid,
    pub job_type: String,
    pub args: serde_json::Value,

    #[builder(default)]
    pub status: JobStatus,
    pub max_retries: i32,
    #[builder(default)]
    pub retry_count: i32,
    /// Per-attempt execution limit.
    pub timeout_ms: i64,

    #[builder(default = Utc::now())]
    pub next_run_at: DateTime<Utc>,
    #[builder(default)]
    pub lease_expires_at: Option<DateTime<Utc>>,
    #[builder(default)]
    pub worker_id: Option<String>,

    #[builder(default)]
    pub error_message: Option<String>,
    #[builder(default)]
    pub error_kind: Option<ErrorKind>,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Whether a failure of `kind` should be retried rather than dead-lettered.
    pub fn can_retry(&self, kind: ErrorKind) -> bool {
        kind.should_retry() && self.retry_count < self.max_retries
    }

    /// Exponential backoff: 2^retry_count seconds, capped at one hour.
    pub fn retry_delay(retry_count: i32) -> chrono::Duration {
        let exponent = retry_count.clamp(0, 12) as u32;
        chrono::Duration::seconds(2i64.pow(exponent).min(MAX_RETRY_DELAY_SECS))
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Job {
    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        let job = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO jobs (
                id, job_type, args, status, max_retries, retry_count, timeout_ms,
                next_run_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(&self.job_type)
        .bind(&self.args)
        .bind(self.status)
        .bind(self.max_retries)
        .bind(self.retry_count)
        .bind(self.timeout_ms)
        .bind(self.next_run_at)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(pool)
        .await?;

        Ok(job)
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Self> {
        let job = sqlx::query_as::<_, Self>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(job)
    }

    /// Claim jobs atomically using FOR UPDATE SKIP LOCKED
    /// Also recovers running jobs whose lease expired
    pub async fn claim_jobs(limit: i64, worker_id: &str, pool: &PgPool) -> Result<Vec<Self>> {
        let jobs = sqlx::query_as::<_, Self>(
            r#"
            WITH next_jobs AS (
                SELECT id
                FROM jobs
                WHERE
                    (status = 'pending' AND next_run_at <= NOW())
                    OR (status = 'running' AND lease_expires_at < NOW())
                ORDER BY next_run_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET
                status = 'running',
                lease_expires_at = NOW() + ((timeout_ms + $2) || ' milliseconds')::INTERVAL,
                worker_id = $3,
                updated_at = NOW()
            WHERE id IN (SELECT id FROM next_jobs)
            RETURNING *
            "#,
        )
        .bind(limit)
        .bind(LEASE_GRACE_MS)
        .bind(worker_id)
        .fetch_all(pool)
        .await?;

        Ok(jobs)
    }

    pub async fn mark_succeeded(id: Uuid, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'succeeded',
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Put the job back in the queue after `Job::retry_delay`.
    pub async fn schedule_retry(&self, error: &str, kind: ErrorKind, pool: &PgPool) -> Result<()> {
        let retry_at = Utc::now() + Self::retry_delay(self.retry_count);
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending',
                retry_count = retry_count + 1,
                next_run_at = $1,
                lease_expires_at = NULL,
                worker_id = NULL,
                error_message = $2,
                error_kind = $3,
                updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(retry_at)
        .bind(error)
        .bind(kind)
        .bind(self.id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn dead_letter(&self, error: &str, kind: ErrorKind, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'dead_letter',
                lease_expires_at = NULL,
                error_message = $1,
                error_kind = $2,
                updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(error)
        .bind(kind)
        .bind(self.id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
