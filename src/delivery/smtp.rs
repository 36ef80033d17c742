//! SMTP delivery through a relay, normally the local MTA.

use super::Deliver;
use crate::config::SmtpSettings;
use crate::error::DeliveryError;
use crate::outputs::html::PLAIN_TEXT_NOTICE;
use lettre::message::{Mailbox, MultiPart};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
pub struct SmtpSender {
    host: String,
    port: u16,
    from: String,
    recipients: Vec<String>,
    timeout_secs: u64,
}

impl SmtpSender {
    pub fn new(
        settings: &SmtpSettings,
        from: String,
        recipients: Vec<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            from,
            recipients,
            timeout_secs,
        }
    }

    /// Build the multipart/alternative message: a plain-text notice plus
    /// the HTML body.
    pub fn message(&self, subject: &str, html_body: &str) -> Result<Message, DeliveryError> {
        if self.recipients.is_empty() {
            return Err(DeliveryError::NoRecipients);
        }

        let mut builder = Message::builder()
            .from(mailbox(&self.from)?)
            .subject(subject);
        for recipient in &self.recipients {
            builder = builder.to(mailbox(recipient)?);
        }

        builder
            .multipart(MultiPart::alternative_plain_html(
                PLAIN_TEXT_NOTICE.to_string(),
                html_body.to_string(),
            ))
            .map_err(|e| DeliveryError::Message(e.to_string()))
    }
}

fn mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address.parse().map_err(|e: lettre::address::AddressError| DeliveryError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

impl Deliver for SmtpSender {
    async fn deliver(&self, subject: &str, html_body: &str) -> Result<(), DeliveryError> {
        let message = self.message(subject, html_body)?;
        // Plain SMTP to a trusted relay; no TLS negotiation.
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(self.host.as_str())
            .port(self.port)
            .timeout(Some(Duration::from_secs(self.timeout_secs)))
            .build();

        let response = transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::Smtp(e.to_string()))?;
        debug!(code = %response.code(), host = %self.host, "SMTP relay accepted message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender(recipients: &[&str]) -> SmtpSender {
        SmtpSender::new(
            &SmtpSettings::default(),
            "notifier@example.com".to_string(),
            recipients.iter().map(|r| r.to_string()).collect(),
            30,
        )
    }

    #[test]
    fn test_message_has_both_parts() {
        let message = sender(&["a@example.com", "b@example.com"])
            .message("Newsfeed 2026-10-14 08:00:00", "<p>hi</p>")
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: Newsfeed 2026-10-14 08:00:00"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("a@example.com"));
        assert!(raw.contains("b@example.com"));
    }

    #[test]
    fn test_no_recipients() {
        let err = sender(&[]).message("s", "b").unwrap_err();
        assert!(matches!(err, DeliveryError::NoRecipients));
    }

    #[test]
    fn test_bad_address() {
        let err = sender(&["not an address"]).message("s", "b").unwrap_err();
        assert!(matches!(err, DeliveryError::Address { .. }));
    }
}
