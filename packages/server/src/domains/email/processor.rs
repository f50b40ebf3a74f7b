//! Worker-side handler that turns email jobs into outbound messages.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::tasks::{EmailPayload, EmailTask};
use crate::common::encoding::encode_url;
use crate::kernel::jobs::{Job, JobHandler, PermanentFailure};
use crate::kernel::{BaseEmailSender, OutboundEmail};

pub const VERIFICATION_SUBJECT: &str = "authservice - Verify your account";
pub const RESET_PASSWORD_SUBJECT: &str = "authservice - Please reset your password";

pub struct EmailTaskProcessor {
    sender: Arc<dyn BaseEmailSender>,
    client_url: String,
}

impl EmailTaskProcessor {
    pub fn new(sender: Arc<dyn BaseEmailSender>, client_url: impl Into<String>) -> Self {
        Self {
            sender,
            client_url: client_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Link the client app opens; both values are unpadded base64url.
    pub fn link(&self, task: EmailTask, payload: &EmailPayload) -> String {
        let path = match task {
            EmailTask::Verification => "verify-account",
            EmailTask::ForgotPassword => "reset-password",
        };
        format!(
            "{}/{}?token={}&email={}",
            self.client_url,
            path,
            encode_url(&payload.token),
            encode_url(&payload.email)
        )
    }

    pub fn render(&self, task: EmailTask, payload: &EmailPayload) -> OutboundEmail {
        let link = self.link(task, payload);
        let (subject, html) = match task {
            EmailTask::Verification => (VERIFICATION_SUBJECT, verification_template(&link)),
            EmailTask::ForgotPassword => (RESET_PASSWORD_SUBJECT, reset_password_template(&link)),
        };
        OutboundEmail {
            to: payload.email.clone(),
            subject: subject.to_string(),
            html,
        }
    }
}

#[async_trait]
impl JobHandler for EmailTaskProcessor {
    async fn handle(&self, job: &Job) -> Result<()> {
        let task = EmailTask::from_job_type(&job.job_type)
            .ok_or_else(|| PermanentFailure(format!("not an email job: {}", job.job_type)))?;
        let payload: EmailPayload = serde_json::from_value(job.args.clone())
            .map_err(|e| PermanentFailure(format!("invalid email payload: {e}")))?;

        let email = self.render(task, &payload);
        self.sender.send(&email).await?;

        info!(job_id = %job.id, job_type = %job.job_type, "email sent");
        Ok(())
    }
}

fn verification_template(link: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <body style="font-family: sans-serif;">
    <h2>Verify your account</h2>
    <p>Thanks for signing up. Confirm your email address to activate your account.</p>
    <p><a href="{link}">Verify account</a></p>
    <p>If you did not create an account, you can ignore this email.</p>
  </body>
</html>"#
    )
}

fn reset_password_template(link: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <body style="font-family: sans-serif;">
    <h2>Reset your password</h2>
    <p>We received a request to reset your password. The link below expires soon.</p>
    <p><a href="{link}">Reset password</a></p>
    <p>If you did not ask for this, your password stays unchanged.</p>
  </body>
</html>"#
    )
}
