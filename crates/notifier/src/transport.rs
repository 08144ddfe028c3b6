//! Mail transport seam and the Resend HTTP API implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use quill_common::config::AppConfig;

use crate::error::NotifyError;

/// Result of a send attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The transport has no host or credentials; nothing was sent.
    Skipped,
}

/// Outbound email delivery.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Whether a send could reach a real server. Unconfigured transports
    /// answer every `send` with [`Delivery::Skipped`].
    fn is_configured(&self) -> bool {
        true
    }

    async fn send(
        &self,
        recipients: &[String],
        subject: &str,
        html_body: &str,
    ) -> Result<Delivery, NotifyError>;
}

/// Sends mail through the Resend HTTP API.
///
/// The request timeout is enforced here; the dispatcher itself never cancels
/// a task, so a hung request would otherwise hold its slot.
pub struct ResendMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    from: Option<String>,
}

impl ResendMailer {
    pub fn new(
        api_url: impl Into<String>,
        api_key: Option<String>,
        from: Option<String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key,
            from,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, NotifyError> {
        Self::new(
            config.mail_api_url.clone(),
            config.resend_api_key.clone(),
            config.email_from.clone(),
            Duration::from_secs(config.mail_timeout_secs),
        )
    }
}

#[async_trait]
impl MailTransport for ResendMailer {
    fn is_configured(&self) -> bool {
        !self.api_url.is_empty() && self.api_key.is_some() && self.from.is_some()
    }

    async fn send(
        &self,
        recipients: &[String],
        subject: &str,
        html_body: &str,
    ) -> Result<Delivery, NotifyError> {
        let (Some(api_key), Some(from)) = (&self.api_key, &self.from) else {
            return Ok(Delivery::Skipped);
        };
        if self.api_url.is_empty() {
            return Ok(Delivery::Skipped);
        }

        let response = self
            .client
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(api_key)
            .json(&json!({
                "from": from,
                "to": recipients,
                "subject": subject,
                "html": html_body,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(NotifyError::TransportFailure(format!(
                "mail API returned {}: {}",
                status, detail
            )));
        }

        tracing::debug!(
            recipients = recipients.len(),
            subject,
            "Email accepted by mail API"
        );
        Ok(Delivery::Sent)
    }
}
