//! HTTP email-relay providers.
//!
//! Both providers receive the same content as the SMTP path: the plain-text
//! notice and the HTML body under one subject.

use super::Deliver;
use crate::error::DeliveryError;
use crate::outputs::html::PLAIN_TEXT_NOTICE;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

pub const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Debug, Clone)]
pub enum Provider {
    /// Form POST with basic auth `api:<key>`.
    Mailgun { url: String, api_key: String },
    /// JSON POST with a bearer key.
    SendGrid { url: String, api_key: String },
}

#[derive(Debug)]
pub struct RelaySender {
    client: Client,
    provider: Provider,
    from: String,
    recipients: Vec<String>,
    timeout_secs: u64,
}

impl RelaySender {
    /// Creates a sender for one relay provider.
    ///
    /// # Arguments
    ///
    /// * `provider` - Endpoint and credentials of the relay
    /// * `from` - Sender address
    /// * `recipients` - Every address the message goes to
    /// * `timeout_secs` - Total time allowed for one API request
    ///
    /// # Returns
    ///
    /// The sender, or [`DeliveryError::Relay`] if the HTTP client cannot be built.
    pub fn new(
        provider: Provider,
        from: String,
        recipients: Vec<String>,
        timeout_secs: u64,
    ) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            provider,
            from,
            recipients,
            timeout_secs,
        })
    }

    #[cfg(test)]
    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    fn request(&self, subject: &str, html_body: &str) -> reqwest::RequestBuilder {
        match &self.provider {
            Provider::Mailgun { url, api_key } => {
                let mut form: Vec<(&str, &str)> = vec![
                    ("from", self.from.as_str()),
                    ("subject", subject),
                    ("text", PLAIN_TEXT_NOTICE),
                    ("html", html_body),
                ];
                form.extend(self.recipients.iter().map(|r| ("to", r.as_str())));
                self.client
                    .post(url)
                    .basic_auth("api", Some(api_key))
                    .form(&form)
            }
            Provider::SendGrid { url, api_key } => {
                let to: Vec<_> = self.recipients.iter().map(|r| json!({ "email": r })).collect();
                let payload = json!({
                    "personalizations": [{ "to": to }],
                    "from": { "email": self.from },
                    "subject": subject,
                    "content": [
                        { "type": "text/plain", "value": PLAIN_TEXT_NOTICE },
                        { "type": "text/html", "value": html_body },
                    ],
                });
                self.client.post(url).bearer_auth(api_key).json(&payload)
            }
        }
    }
}

impl Deliver for RelaySender {
    async fn deliver(&self, subject: &str, html_body: &str) -> Result<(), DeliveryError> {
        if self.recipients.is_empty() {
            return Err(DeliveryError::NoRecipients);
        }

        let response = self
            .request(subject, html_body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(self.timeout_secs)
                } else {
                    DeliveryError::Relay(e)
                }
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Relay rejected message");
            return Err(DeliveryError::Rejected { status, body });
        }
        debug!(%status, "Relay accepted message");
        Ok(())
    }
}
