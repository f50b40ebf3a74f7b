//! PostgreSQL-backed job queue implementation.
//!
//! The same type is both the producer-side [`BaseJobQueue`] and the
//! worker-side [`JobStore`].

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use super::job::{ErrorKind, Job};
use crate::kernel::{BaseJobQueue, EnqueueOptions};

/// Storage operations the worker needs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Claim up to `limit` ready jobs for `worker_id`.
    async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<Job>>;

    async fn mark_succeeded(&self, job_id: Uuid) -> Result<()>;

    /// Retry with backoff while attempts remain, otherwise dead-letter.
    async fn mark_failed(&self, job_id: Uuid, error: &str, kind: ErrorKind) -> Result<()>;
}

#[derive(Clone)]
pub struct PostgresJobQueue {
    pool: PgPool,
}

impl PostgresJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseJobQueue for PostgresJobQueue {
    async fn enqueue(
        &self,
        job_type: &str,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<Uuid> {
        let job = Job::builder()
            .job_type(job_type)
            .args(payload)
            .max_retries(options.max_retries)
            .timeout_ms(options.timeout.as_millis() as i64)
            .build();

        let inserted = job.insert(&self.pool).await?;
        debug!(job_id = %inserted.id, job_type = %job_type, "job enqueued");
        Ok(inserted.id)
    }
}

#[async_trait]
impl JobStore for PostgresJobQueue {
    async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<Job>> {
        Job::claim_jobs(limit, worker_id, &self.pool).await
    }

    async fn mark_succeeded(&self, job_id: Uuid) -> Result<()> {
        Job::mark_succeeded(job_id, &self.pool).await
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str, kind: ErrorKind) -> Result<()> {
        let job = Job::find_by_id(job_id, &self.pool).await?;

        if job.can_retry(kind) {
            job.schedule_retry(error, kind, &self.pool).await
        } else {
            warn!(
                job_id = %job_id,
                job_type = %job.job_type,
                retry_count = job.retry_count,
                error = %error,
                "job moved to dead letter"
            );
            job.dead_letter(error, kind, &self.pool).await
        }
    }
}
