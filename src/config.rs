//! Settings, file locations and source lists.
//!
//! Everything a job needs from its environment is resolved once in `main`
//! and handed to the job explicitly: the YAML [`Settings`] file, the
//! [`Paths`] of per-job state files, and the JSON feed source lists.
//!
//! # Settings file
//!
//! ```yaml
//! http: { timeout_secs: 30 }
//! delivery:
//!   method: smtp            # smtp | mailgun | sendgrid | file
//!   from: me@example.com
//!   to: [me@example.com]
//!   smtp: { host: localhost, port: 25 }
//! jobs:
//!   podgrabr: { additional_to: [family@example.com] }
//!   comics: { method: file, file_path: /var/www/comics.html }
//! lichess: { token: lip_xxx }
//! trello: { api_key: k, token: t, board: Todo }
//! ```
//!
//! Every section is optional; defaults match a local SMTP relay.

use crate::error::ConfigError;
use crate::fetch::DEFAULT_TIMEOUT_SECS;
use crate::models::FeedSource;
use itertools::Itertools;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the settings file in the home directory, without prefix.
pub const SETTINGS_FILE: &str = "notifier.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding state and source files instead of the home directory.
    pub state_dir: Option<PathBuf>,
    pub http: HttpSettings,
    pub delivery: DeliverySettings,
    /// Per-job delivery overrides, keyed by job name.
    pub jobs: HashMap<String, JobOverrides>,
    pub lichess: Option<LichessSettings>,
    pub trello: Option<TrelloSettings>,
    pub datatilsynet: DatatilsynetSettings,
    pub comics: ComicsSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    /// Replaces every job's own User-Agent when set.
    pub user_agent: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    #[default]
    Smtp,
    Mailgun,
    Sendgrid,
    File,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeliverySettings {
    pub method: Method,
    pub from: Option<String>,
    pub to: Vec<String>,
    pub smtp: SmtpSettings,
    pub mailgun: Option<MailgunSettings>,
    pub sendgrid: Option<SendGridSettings>,
    pub file: Option<FileSettings>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailgunSettings {
    /// Full messages endpoint, e.g. `https://api.mailgun.net/v3/<domain>/messages`.
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendGridSettings {
    pub api_key: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobOverrides {
    pub method: Option<Method>,
    pub file_path: Option<PathBuf>,
    pub additional_to: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LichessSettings {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrelloSettings {
    pub api_key: String,
    pub token: String,
    pub board: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatatilsynetSettings {
    pub feed_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ComicsSettings {
    /// Replaces the built-in strip list when non-empty.
    pub strips: Vec<crate::scrapers::ComicSpec>,
}

/// Delivery settings after applying a job's overrides.
#[derive(Debug, Clone)]
pub struct JobDelivery {
    pub method: Method,
    pub from: Option<String>,
    pub recipients: Vec<String>,
    pub smtp: SmtpSettings,
    pub mailgun: Option<MailgunSettings>,
    pub sendgrid: Option<SendGridSettings>,
    pub file_path: Option<PathBuf>,
    /// Network timeout for the mail backends, from `http.timeout_secs`.
    pub timeout_secs: u64,
}

impl Settings {
    /// Load settings from `path`.
    ///
    /// A missing file yields defaults unless `required` is set.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                info!(path = %path.display(), "No settings file; using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_yaml(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes to unit, not to a mapping.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Delivery settings for `job`, with its overrides applied.
    ///
    /// Recipients are the global list followed by the job's additional
    /// recipients, without duplicates.
    pub fn delivery_for(&self, job: &str) -> JobDelivery {
        let overrides = self.jobs.get(job).cloned().unwrap_or_default();
        let recipients = self
            .delivery
            .to
            .iter()
            .chain(overrides.additional_to.iter())
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unique()
            .collect();

        JobDelivery {
            method: overrides.method.unwrap_or(self.delivery.method),
            from: self.delivery.from.clone(),
            recipients,
            smtp: self.delivery.smtp.clone(),
            mailgun: self.delivery.mailgun.clone(),
            sendgrid: self.delivery.sendgrid.clone(),
            file_path: overrides
                .file_path
                .or_else(|| self.delivery.file.as_ref().map(|f| f.path.clone())),
            timeout_secs: self.http.timeout_secs,
        }
    }
}

/// Home-relative locations of state and source files.
#[derive(Debug, Clone)]
pub struct Paths {
    base: PathBuf,
}

impl Paths {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Use `state_dir` from the settings, or the home directory.
    pub fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let base = match &settings.state_dir {
            Some(dir) => dir.clone(),
            None => home_dir()?,
        };
        debug!(base = %base.display(), "Resolved state directory");
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// `<base>/.<name>`, or `<base>/_<name>` on Windows.
    pub fn dotfile(&self, name: &str) -> PathBuf {
        self.base.join(dotfile_name(name))
    }
}

pub fn dotfile_name(name: &str) -> String {
    let prefix = if cfg!(windows) { '_' } else { '.' };
    format!("{prefix}{name}")
}

/// The user's home directory.
pub fn home_dir() -> Result<PathBuf, ConfigError> {
    ["HOME", "USERPROFILE"]
        .iter()
        .filter_map(|var| std::env::var_os(var))
        .find(|v| !v.is_empty())
        .map(PathBuf::from)
        .ok_or(ConfigError::NoHome)
}

/// Default location of the settings file.
pub fn default_settings_path() -> Result<PathBuf, ConfigError> {
    Ok(home_dir()?.join(dotfile_name(SETTINGS_FILE)))
}

/// Read a JSON feed source list.
pub fn load_sources(path: &Path) -> Result<Vec<FeedSource>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let sources: Vec<FeedSource> =
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    info!(path = %path.display(), count = sources.len(), "Loaded feed sources");
    Ok(sources)
}
