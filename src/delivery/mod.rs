//! Delivery of rendered pages.
//!
//! Jobs only ever see the [`Deliver`] capability: hand over a subject and an
//! HTML body, get back success or a [`DeliveryError`]. Which backend sits
//! behind it is decided once from the job's [`JobDelivery`] settings.
//!
//! | Method     | Backend                 | Module    |
//! |------------|-------------------------|-----------|
//! | `smtp`     | SMTP relay via `lettre` | [`smtp`]  |
//! | `mailgun`  | Mailgun HTTP API        | [`relay`] |
//! | `sendgrid` | SendGrid v3 HTTP API    | [`relay`] |
//! | `file`     | Overwrite a local file  | [`file`]  |

pub mod file;
pub mod relay;
pub mod smtp;

use crate::config::{JobDelivery, Method};
use crate::error::{ConfigError, DeliveryError, JobError};
use tracing::{info, instrument};

pub use file::FileSink;
pub use relay::{Provider, RelaySender};
pub use smtp::SmtpSender;

/// Something that can deliver a rendered page.
pub trait Deliver {
    /// Delivers one page.
    ///
    /// # Arguments
    ///
    /// * `subject` - Subject line (or document title for file output)
    /// * `html_body` - Complete HTML document
    ///
    /// # Returns
    ///
    /// `Ok(())` once the backend has accepted the page. Callers record
    /// items as seen only after this returns.
    async fn deliver(&self, subject: &str, html_body: &str) -> Result<(), DeliveryError>;
}

/// The configured delivery backend.
#[derive(Debug)]
pub enum Delivery {
    Smtp(SmtpSender),
    Relay(RelaySender),
    File(FileSink),
}

impl Delivery {
    /// Build the backend selected by `settings`.
    ///
    /// Network backends give up after `settings.timeout_secs`.
    pub fn from_settings(settings: &JobDelivery) -> Result<Self, JobError> {
        let delivery = match settings.method {
            Method::Smtp => Self::Smtp(SmtpSender::new(
                &settings.smtp,
                required(&settings.from, "delivery.from")?,
                settings.recipients.clone(),
                settings.timeout_secs,
            )),
            Method::Mailgun => {
                let mailgun = settings
                    .mailgun
                    .as_ref()
                    .ok_or(ConfigError::Missing("delivery.mailgun"))?;
                Self::Relay(RelaySender::new(
                    Provider::Mailgun {
                        url: mailgun.url.clone(),
                        api_key: mailgun.api_key.clone(),
                    },
                    required(&settings.from, "delivery.from")?,
                    settings.recipients.clone(),
                    settings.timeout_secs,
                )?)
            }
            Method::Sendgrid => {
                let sendgrid = settings
                    .sendgrid
                    .as_ref()
                    .ok_or(ConfigError::Missing("delivery.sendgrid"))?;
                Self::Relay(RelaySender::new(
                    Provider::SendGrid {
                        url: sendgrid
                            .url
                            .clone()
                            .unwrap_or_else(|| relay::SENDGRID_URL.to_string()),
                        api_key: sendgrid.api_key.clone(),
                    },
                    required(&settings.from, "delivery.from")?,
                    settings.recipients.clone(),
                    settings.timeout_secs,
                )?)
            }
            Method::File => Self::File(FileSink::new(
                settings
                    .file_path
                    .clone()
                    .ok_or(ConfigError::Missing("delivery.file.path"))?,
            )),
        };
        info!(method = ?settings.method, "Delivery configured");
        Ok(delivery)
    }
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value.clone().ok_or(ConfigError::Missing(name))
}

impl Deliver for Delivery {
    #[instrument(level = "info", skip(self, html_body), fields(bytes = html_body.len()))]
    async fn deliver(&self, subject: &str, html_body: &str) -> Result<(), DeliveryError> {
        match self {
            Self::Smtp(s) => s.deliver(subject, html_body).await,
            Self::Relay(r) => r.deliver(subject, html_body).await,
            Self::File(f) => f.deliver(subject, html_body).await,
        }?;
        info!("Delivered");
        Ok(())
    }
}
