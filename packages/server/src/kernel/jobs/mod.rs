//! Job infrastructure for background work.
//!
//! - [`PostgresJobQueue`] - database-backed queue; producers see it as
//!   [`BaseJobQueue`](crate::kernel::BaseJobQueue), the worker as [`JobStore`]
//! - [`JobWorker`] - long-running service that polls and executes jobs
//! - [`Job`] - job model with its queries
//!
//! ```text
//! Domain code calls deps.job_queue.enqueue(job_type, payload, options)
//!     │
//!     └─► INSERT INTO jobs
//!
//! JobWorker
//!     │
//!     ├─► Claim jobs (FOR UPDATE SKIP LOCKED)
//!     ├─► Route to the JobHandler registered for job_type
//!     └─► Mark succeeded, retry with backoff, or dead-letter
//! ```
//!
//! Handlers live in their domains. This module only provides the infrastructure.

mod job;
mod queue;
mod worker;

pub use job::{ErrorKind, Job, JobStatus};
pub use queue::{JobStore, PostgresJobQueue};
pub use worker::{JobHandler, JobWorker, JobWorkerConfig, PermanentFailure};
