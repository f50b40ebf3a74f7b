//! Email task types, payloads and the enqueue side of delivery.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

use crate::common::{AppError, AppResult};
use crate::kernel::{BaseJobQueue, EnqueueOptions};

pub const TYPE_EMAIL_VERIFICATION: &str = "email:verification";
pub const TYPE_EMAIL_FORGOT_PASSWORD: &str = "email:forgot-password";

/// Worker-side limits for every email job.
pub const EMAIL_JOB_OPTIONS: EnqueueOptions = EnqueueOptions {
    timeout: Duration::from_secs(5),
    max_retries: 10,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailTask {
    Verification,
    ForgotPassword,
}

impl EmailTask {
    pub fn job_type(self) -> &'static str {
        match self {
            EmailTask::Verification => TYPE_EMAIL_VERIFICATION,
            EmailTask::ForgotPassword => TYPE_EMAIL_FORGOT_PASSWORD,
        }
    }

    pub fn from_job_type(job_type: &str) -> Option<Self> {
        match job_type {
            TYPE_EMAIL_VERIFICATION => Some(EmailTask::Verification),
            TYPE_EMAIL_FORGOT_PASSWORD => Some(EmailTask::ForgotPassword),
            _ => None,
        }
    }
}

/// Same shape for both tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailPayload {
    pub email: String,
    pub token: String,
}

/// Fire-and-forget submission of lifecycle emails.
///
/// Each enqueue is bounded by its own timeout, independent of the caller.
#[derive(Clone)]
pub struct EmailGateway {
    queue: Arc<dyn BaseJobQueue>,
    timeout: Duration,
}

impl EmailGateway {
    pub fn new(queue: Arc<dyn BaseJobQueue>, timeout: Duration) -> Self {
        Self { queue, timeout }
    }

    pub async fn queue_verification_email(&self, email: &str, token: Uuid) -> AppResult<Uuid> {
        self.enqueue(EmailTask::Verification, email, token).await
    }

    pub async fn queue_forgot_password_email(&self, email: &str, token: Uuid) -> AppResult<Uuid> {
        self.enqueue(EmailTask::ForgotPassword, email, token).await
    }

    async fn enqueue(&self, task: EmailTask, email: &str, token: Uuid) -> AppResult<Uuid> {
        let payload = serde_json::to_value(EmailPayload {
            email: email.to_string(),
            token: token.to_string(),
        })
        .map_err(AppError::server)?;

        let enqueued = tokio::time::timeout(
            self.timeout,
            self.queue.enqueue(task.job_type(), payload, EMAIL_JOB_OPTIONS),
        )
        .await;

        match enqueued {
            Ok(Ok(job_id)) => {
                debug!(job_id = %job_id, job_type = task.job_type(), "email queued");
                Ok(job_id)
            }
            Ok(Err(e)) => {
                error!(job_type = task.job_type(), error = %e, "failed to queue email");
                Err(AppError::server(e))
            }
            Err(_) => {
                error!(
                    job_type = task.job_type(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "timed out queueing email"
                );
                Err(AppError::server(anyhow!(
                    "enqueue of {} timed out",
                    task.job_type()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::SpyJobQueue;

    #[test]
    fn test_job_type_round_trip() {
        for task in [EmailTask::Verification, EmailTask::ForgotPassword] {
            assert_eq!(EmailTask::from_job_type(task.job_type()), Some(task));
        }
        assert_eq!(EmailTask::from_job_type("email:newsletter"), None);
    }

    #[tokio::test]
    async fn test_enqueue_carries_payload_and_options() {
        let queue = Arc::new(SpyJobQueue::new());
        let gateway = EmailGateway::new(queue.clone(), Duration::from_secs(2));
        let token = Uuid::new_v4();

        gateway
            .queue_verification_email("alice@example.com", token)
            .await
            .unwrap();

        let job = queue.last().unwrap();
        assert_eq!(job.job_type, TYPE_EMAIL_VERIFICATION);
        assert_eq!(job.options, EMAIL_JOB_OPTIONS);
        let payload: EmailPayload = serde_json::from_value(job.payload).unwrap();
        assert_eq!(payload.email, "alice@example.com");
        assert_eq!(payload.token, token.to_string());
    }

    #[tokio::test]
    async fn test_queue_failure_is_a_server_error() {
        let queue = Arc::new(SpyJobQueue::new());
        queue.set_failing(true);
        let gateway = EmailGateway::new(queue, Duration::from_secs(2));

        let result = gateway
            .queue_forgot_password_email("alice@example.com", Uuid::new_v4())
            .await;
        assert!(matches!(result, Err(AppError::ServerError(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_queue_is_cut_off() {
        let queue = Arc::new(SpyJobQueue::new());
        queue.set_stall(Some(Duration::from_secs(30)));
        let gateway = EmailGateway::new(queue.clone(), Duration::from_millis(100));

        let result = gateway
            .queue_verification_email("alice@example.com", Uuid::new_v4())
            .await;
        assert!(matches!(result, Err(AppError::ServerError(_))));
        assert!(queue.jobs().is_empty());
    }
}
