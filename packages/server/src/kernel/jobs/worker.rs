//! Job worker service for processing background jobs.
//!
//! The `JobWorker` is a long-running service that:
//! - Polls the store for ready jobs
//! - Routes each job to the handler registered for its `job_type`
//! - Enforces the per-job timeout
//! - Reports success or failure so the store can retry or dead-letter
//!
//! ```text
//! JobWorker
//!     │
//!     ├─► Poll store (claim jobs via JobStore)
//!     ├─► Look up handler by job_type
//!     ├─► handler.handle(job) under tokio::time::timeout
//!     └─► Mark succeeded/failed via JobStore
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::job::{ErrorKind, Job};
use super::queue::JobStore;

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct JobWorkerConfig {
    /// Maximum number of jobs to claim at once
    pub batch_size: i64,
    /// How long to wait when no jobs are available
    pub poll_interval: Duration,
    /// Worker ID for this instance
    pub worker_id: String,
}

impl Default for JobWorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            poll_interval: Duration::from_secs(1),
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }
}

impl JobWorkerConfig {
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }
}

/// A failure that retrying cannot fix (bad payload, rejected recipient).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PermanentFailure(pub String);

/// Executes jobs of one or more job types.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Return [`PermanentFailure`] (wrapped in `anyhow`) to skip remaining retries.
    async fn handle(&self, job: &Job) -> Result<()>;
}

pub struct JobWorker<S: JobStore> {
    store: Arc<S>,
    handlers: HashMap<String, Arc<dyn JobHandler>>,
    config: JobWorkerConfig,
}

impl<S: JobStore + 'static> JobWorker<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, JobWorkerConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: JobWorkerConfig) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
            config,
        }
    }

    pub fn register(mut self, job_type: impl Into<String>, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(job_type.into(), handler);
        self
    }

    /// Claim one batch and process it. Returns how many jobs were claimed.
    pub async fn run_once(&self) -> Result<usize> {
        let jobs = self
            .store
            .claim(&self.config.worker_id, self.config.batch_size)
            .await?;
        let count = jobs.len();
        if count > 0 {
            debug!(count, "claimed jobs");
            futures::future::join_all(jobs.into_iter().map(|job| self.process_job(job))).await;
        }
        Ok(count)
    }

    /// Poll until `shutdown` fires. In-flight jobs finish before this returns.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        info!(
            worker_id = %self.config.worker_id,
            batch_size = self.config.batch_size,
            job_types = ?self.handlers.keys().collect::<Vec<_>>(),
            "job worker starting"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let claimed = match self.run_once().await {
                Ok(count) => count,
                Err(e) => {
                    error!(error = %e, "failed to claim jobs");
                    0
                }
            };

            if claimed == 0 {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
            }
        }

        info!(worker_id = %self.config.worker_id, "job worker stopped");
        Ok(())
    }

    async fn process_job(&self, job: Job) {
        let job_id = job.id;

        let Some(handler) = self.handlers.get(&job.job_type) else {
            error!(job_id = %job_id, job_type = %job.job_type, "no handler registered for job type");
            self.fail(&job, &format!("unknown job type: {}", job.job_type), ErrorKind::NonRetryable)
                .await;
            return;
        };

        let timeout = Duration::from_millis(job.timeout_ms.max(0) as u64);
        match tokio::time::timeout(timeout, handler.handle(&job)).await {
            Ok(Ok(())) => {
                debug!(job_id = %job_id, job_type = %job.job_type, "job succeeded");
                if let Err(e) = self.store.mark_succeeded(job_id).await {
                    error!(job_id = %job_id, error = %e, "failed to mark job as succeeded");
                }
            }
            Ok(Err(e)) => {
                let kind = if e.downcast_ref::<PermanentFailure>().is_some() {
                    ErrorKind::NonRetryable
                } else {
                    ErrorKind::Retryable
                };
                warn!(
                    job_id = %job_id,
                    job_type = %job.job_type,
                    attempt = job.retry_count + 1,
                    error = %e,
                    "job failed"
                );
                self.fail(&job, &format!("{e:#}"), kind).await;
            }
            Err(_) => {
                warn!(job_id = %job_id, job_type = %job.job_type, timeout_ms = job.timeout_ms, "job timed out");
                self.fail(&job, &format!("timed out after {}ms", job.timeout_ms), ErrorKind::Retryable)
                    .await;
            }
        }
    }

    async fn fail(&self, job: &Job, error: &str, kind: ErrorKind) {
        if let Err(e) = self.store.mark_failed(job.id, error, kind).await {
            error!(job_id = %job.id, error = %e, "failed to mark job as failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        ready: Mutex<Vec<Job>>,
        succeeded: Mutex<Vec<Uuid>>,
        failed: Mutex<Vec<(Uuid, ErrorKind)>>,
    }

    #[async_trait]
    impl JobStore for MemoryStore {
        async fn claim(&self, _worker_id: &str, limit: i64) -> Result<Vec<Job>> {
            let mut ready = self.ready.lock().unwrap();
            let take = (limit as usize).min(ready.len());
            Ok(ready.drain(..take).collect())
        }

        async fn mark_succeeded(&self, job_id: Uuid) -> Result<()> {
            self.succeeded.lock().unwrap().push(job_id);
            Ok(())
        }

        async fn mark_failed(&self, job_id: Uuid, _error: &str, kind: ErrorKind) -> Result<()> {
            self.failed.lock().unwrap().push((job_id, kind));
            Ok(())
        }
    }

    struct Scripted {
        calls: AtomicUsize,
        outcome: fn() -> Result<()>,
        delay: Duration,
    }

    #[async_trait]
    impl JobHandler for Scripted {
        async fn handle(&self, _job: &Job) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            (self.outcome)()
        }
    }

    fn job(job_type: &str, timeout_ms: i64) -> Job {
        Job::builder()
            .job_type(job_type)
            .args(serde_json::json!({}))
            .max_retries(3)
            .timeout_ms(timeout_ms)
            .build()
    }

    fn handler(outcome: fn() -> Result<()>, delay: Duration) -> Arc<Scripted> {
        Arc::new(Scripted {
            calls: AtomicUsize::new(0),
            outcome,
            delay,
        })
    }

    #[test]
    fn test_config_defaults() {
        let config = JobWorkerConfig::default();
        assert_eq!(config.batch_size, 10);
        assert!(config.worker_id.starts_with("worker-"));
    }

    #[test]
    fn test_config_with_worker_id() {
        let config = JobWorkerConfig::with_worker_id("my-worker");
        assert_eq!(config.worker_id, "my-worker");
    }

    #[tokio::test]
    async fn test_successful_job_is_marked_succeeded() {
        let store = Arc::new(MemoryStore::default());
        let job = job("email:verification", 1_000);
        let id = job.id;
        store.ready.lock().unwrap().push(job);

        let ok = handler(|| Ok(()), Duration::ZERO);
        let worker = JobWorker::new(store.clone()).register("email:verification", ok.clone());

        assert_eq!(worker.run_once().await.unwrap(), 1);
        assert_eq!(ok.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*store.succeeded.lock().unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_error_is_retryable_unless_permanent() {
        let store = Arc::new(MemoryStore::default());
        let transient = job("transient", 1_000);
        let permanent = job("permanent", 1_000);
        let (transient_id, permanent_id) = (transient.id, permanent.id);
        store.ready.lock().unwrap().extend([transient, permanent]);

        let worker = JobWorker::new(store.clone())
            .register(
                "transient",
                handler(|| Err(anyhow::anyhow!("smtp 503")), Duration::ZERO),
            )
            .register(
                "permanent",
                handler(
                    || Err(PermanentFailure("bad payload".into()).into()),
                    Duration::ZERO,
                ),
            );

        worker.run_once().await.unwrap();

        let failed = store.failed.lock().unwrap();
        assert!(failed.contains(&(transient_id, ErrorKind::Retryable)));
        assert!(failed.contains(&(permanent_id, ErrorKind::NonRetryable)));
    }

    #[tokio::test]
    async fn test_unknown_job_type_is_not_retried() {
        let store = Arc::new(MemoryStore::default());
        let job = job("nobody:handles:this", 1_000);
        let id = job.id;
        store.ready.lock().unwrap().push(job);

        JobWorker::new(store.clone()).run_once().await.unwrap();

        assert_eq!(*store.failed.lock().unwrap(), vec![(id, ErrorKind::NonRetryable)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_retryable_failure() {
        let store = Arc::new(MemoryStore::default());
        let job = job("slow", 50);
        let id = job.id;
        store.ready.lock().unwrap().push(job);

        let worker = JobWorker::new(store.clone())
            .register("slow", handler(|| Ok(()), Duration::from_secs(60)));

        worker.run_once().await.unwrap();

        assert!(store.succeeded.lock().unwrap().is_empty());
        assert_eq!(*store.failed.lock().unwrap(), vec![(id, ErrorKind::Retryable)]);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::default());
        let worker = JobWorker::new(store);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        worker.run(shutdown).await.unwrap();
    }
}
