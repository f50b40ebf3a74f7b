use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::config::EmailConfig;
use crate::kernel::{BaseEmailSender, OutboundEmail};

const BREVO_SEND_URL: &str = "https://api.brevo.com/v3/smtp/email";

/// Brevo transactional email client
pub struct BrevoEmailSender {
    api_key: String,
    sender: Contact,
    client: reqwest::Client,
}

#[derive(Debug, Clone, Serialize)]
struct Contact {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

/// Brevo API request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoRequest<'a> {
    sender: &'a Contact,
    to: Vec<Contact>,
    subject: &'a str,
    html_content: &'a str,
}

impl BrevoEmailSender {
    pub fn new(api_key: String, config: &EmailConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            sender: Contact {
                email: config.sender_address.clone(),
                name: Some(config.sender_name.clone()),
            },
            client,
        })
    }
}

#[async_trait]
impl BaseEmailSender for BrevoEmailSender {
    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        let request = BrevoRequest {
            sender: &self.sender,
            to: vec![Contact {
                email: email.to.clone(),
                name: None,
            }],
            subject: &email.subject,
            html_content: &email.html,
        };

        let response = self
            .client
            .post(BREVO_SEND_URL)
            .header("api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send Brevo email request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Brevo API error {}: {}", status, body);
        }

        Ok(())
    }
}

/// Sender used when no Brevo API key is configured
pub struct LogEmailSender;

#[async_trait]
impl BaseEmailSender for LogEmailSender {
    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        tracing::warn!(
            to = %email.to,
            subject = %email.subject,
            "LogEmailSender: no BREVO_API_KEY configured, email not delivered"
        );
        tracing::debug!(html = %email.html, "undelivered email body");
        Ok(())
    }
}
