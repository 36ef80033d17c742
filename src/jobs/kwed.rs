//! C64 remixes released on remix.kwed.org during the last day.

use super::{RunSummary, deliver_page, load_feed, subject};
use crate::config::Settings;
use crate::delivery::Deliver;
use crate::error::JobError;
use crate::fetch::Fetcher;
use crate::models::CandidateItem;
use crate::outputs::html;
use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use tracing::{debug, info, instrument, warn};

pub const BASE_URL: &str = "https://remix.kwed.org";
pub const USER_AGENT: &str = "kwed-lambda/4.0";
pub const TITLE_PREFIX: &str = "New C64 remix released: ";
/// How far back a release still counts as new.
pub const WINDOW_HOURS: i64 = 25;

#[derive(Debug)]
pub struct Kwed {
    base_url: String,
    fetcher: Fetcher,
}

impl Kwed {
    /// `fetcher` must not follow redirects: download links are read from
    /// the redirect itself.
    pub fn new(base_url: impl Into<String>, fetcher: Fetcher) -> Self {
        Self {
            base_url: base_url.into(),
            fetcher,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, JobError> {
        let user_agent = settings.http.user_agent.as_deref().unwrap_or(USER_AGENT);
        Ok(Self::new(
            BASE_URL,
            Fetcher::without_redirects(user_agent, settings.http.timeout_secs)?,
        ))
    }

    #[instrument(level = "info", skip_all)]
    pub async fn run<D: Deliver>(&self, deliverer: &D) -> Result<RunSummary, JobError> {
        let mut summary = RunSummary::default();
        let parsed = match load_feed(&self.fetcher, &format!("{}/rss.xml", self.base_url)).await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Remix feed unavailable");
                summary.failed_sources = 1;
                return Ok(summary);
            }
        };

        let cut_off = Utc::now() - Duration::hours(WINDOW_HOURS);
        let mut links = Vec::new();
        for item in parsed.items.iter().filter(|i| is_recent(i, cut_off)) {
            let Some(id) = track_id(&item.link) else {
                debug!(link = %item.link, "No track id");
                continue;
            };
            match self.download_url(id).await {
                Ok(Some(url)) => links.push(html::link(&url, track_title(&item.title))),
                Ok(None) => debug!(id, "No download location"),
                Err(e) => warn!(id, error = %e, "Download location lookup failed"),
            }
        }

        summary.new_items = links.len();
        if links.is_empty() {
            info!("No recent remixes");
            return Ok(summary);
        }

        let body = format!("<p>{}</p>", links.iter().map(|l| format!("{l}<br />")).join(""));
        deliver_page(deliverer, &subject("KWED"), &body).await?;
        summary.delivered = 1;
        Ok(summary)
    }

    async fn download_url(&self, id: &str) -> Result<Option<String>, JobError> {
        let location = self
            .fetcher
            .head_location(&format!("{}/download.php/{id}", self.base_url))
            .await?;
        Ok(location.map(|l| format!("{}{}", self.base_url, encode_path(&l))))
    }
}

fn is_recent(item: &CandidateItem, cut_off: DateTime<Utc>) -> bool {
    item.published.is_some_and(|p| p >= cut_off)
}

fn track_title(title: &str) -> &str {
    title.strip_prefix(TITLE_PREFIX).unwrap_or(title)
}

/// Last path segment of a track page link.
fn track_id(link: &str) -> Option<&str> {
    link.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
}

/// Percent-encode every segment of a path, keeping the separators.
fn encode_path(path: &str) -> String {
    path.split('/').map(urlencoding::encode).join("/")
}
