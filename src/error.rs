//! Error types shared by the notifier jobs.
//!
//! Each layer owns a narrow error enum; [`JobError`] aggregates them for the
//! job runners. Only the variants documented as fatal ever reach `main`:
//! fetch and feed failures are rendered into the delivered output instead.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the persistent seen-set.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot access seen-set at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("seen-set at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("seen-set entry {key:?} has malformed timestamp {value:?}")]
    MalformedTimestamp { key: String, value: String },
}

/// Failures while retrieving a remote resource.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Timeout - waited {0} seconds")]
    Timeout(u64),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    Status(reqwest::StatusCode),
}

/// Failures while turning fetched bytes into feed items.
#[derive(Debug, Error)]
pub enum FeedError {
    /// A parse warning outside the known benign set.
    #[error("{0}")]
    Rejected(String),

    #[error("failed to parse feed: {0}")]
    Malformed(String),
}

/// Failures of the delivery backends. Never recovered.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid mail address {address:?}: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("relay request failed: {0}")]
    Relay(#[from] reqwest::Error),

    #[error("mail backend did not answer within {0} seconds")]
    Timeout(u64),

    #[error("relay rejected the message with {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("cannot write {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no recipients configured")]
    NoRecipients,
}

/// Failures loading settings or source lists.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing configuration: {0}")]
    Missing(&'static str),

    #[error("cannot determine home directory")]
    NoHome,
}

/// Everything a job runner can fail with.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("unexpected API response: {0}")]
    Api(String),

    #[error("{0} not found")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_matches_rendered_text() {
        assert_eq!(
            FetchError::Timeout(30).to_string(),
            "Timeout - waited 30 seconds"
        );
    }

    #[test]
    fn test_job_error_is_transparent() {
        let inner = StoreError::MalformedTimestamp {
            key: "k".into(),
            value: "yesterday".into(),
        };
        let msg = inner.to_string();
        let job: JobError = inner.into();
        assert_eq!(job.to_string(), msg);
    }
}
