//! New episodes of the Datatilsynet podcast, one mail each.

use super::{RunSummary, deliver_page, fetcher, finish};
use crate::config::{Paths, Settings};
use crate::dedup;
use crate::delivery::Deliver;
use crate::error::JobError;
use crate::feed;
use crate::fetch::Fetcher;
use crate::models::CandidateItem;
use crate::outputs::html;
use crate::store::{SeenSet, timestamp_now};
use chrono::Local;
use std::path::PathBuf;
use tracing::{error, info, instrument};

pub const FEED_URL: &str = "https://feeds.soundcloud.com/users/soundcloud:users:706014772/sounds.rss";
pub const STORE_FILE: &str = "dtgrbT";
pub const USER_AGENT: &str = "podcastgrb/1.0";

#[derive(Debug)]
pub struct Datatilsynet {
    feed_url: String,
    store_path: PathBuf,
    fetcher: Fetcher,
}

/// `Datatilsynet YYYY-MM-DD: <suffix>`
fn subject(suffix: &str) -> String {
    format!("Datatilsynet {}: {suffix}", Local::now().format("%Y-%m-%d"))
}

impl Datatilsynet {
    pub fn new(feed_url: impl Into<String>, store_path: PathBuf, fetcher: Fetcher) -> Self {
        Self {
            feed_url: feed_url.into(),
            store_path,
            fetcher,
        }
    }

    pub fn from_settings(settings: &Settings, paths: &Paths) -> Result<Self, JobError> {
        let feed_url = settings
            .datatilsynet
            .feed_url
            .clone()
            .unwrap_or_else(|| FEED_URL.to_string());
        Ok(Self::new(
            feed_url,
            paths.dotfile(STORE_FILE),
            fetcher(settings, USER_AGENT)?,
        ))
    }

    #[instrument(level = "info", skip_all, fields(url = %self.feed_url))]
    pub async fn run<D: Deliver>(&self, deliverer: &D) -> Result<RunSummary, JobError> {
        let mut store = SeenSet::open(&self.store_path)?;
        let result = self.process(&mut store, deliverer).await;
        finish(store, result)
    }

    async fn process<D: Deliver>(
        &self,
        store: &mut SeenSet,
        deliverer: &D,
    ) -> Result<RunSummary, JobError> {
        let mut summary = RunSummary::default();

        let raw = match self.fetcher.fetch(&self.feed_url).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "Podcast feed could not be fetched");
                return self.report(deliverer, "hentningsfejl", &e.to_string(), summary).await;
            }
        };
        let parsed = match feed::parse_accepting_benign(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(error = %e, "Podcast feed could not be parsed");
                return self.report(deliverer, "rss parser fejl", &e.to_string(), summary).await;
            }
        };

        let batch = dedup::filter_new(&parsed.items, store, &timestamp_now(), dedup::link_key);
        summary.new_items = batch.len();
        for new in batch.items() {
            deliver_page(deliverer, &subject(&new.item.title), &episode(new.item)).await?;
            batch.commit_item(store, new);
            summary.delivered += 1;
            info!(title = %new.item.title, "Episode delivered");
        }
        Ok(summary)
    }

    async fn report<D: Deliver>(
        &self,
        deliverer: &D,
        suffix: &str,
        message: &str,
        mut summary: RunSummary,
    ) -> Result<RunSummary, JobError> {
        deliver_page(deliverer, &subject(suffix), &html::error_paragraph(message)).await?;
        summary.failed_sources = 1;
        summary.delivered = 1;
        Ok(summary)
    }
}

fn episode(item: &CandidateItem) -> String {
    format!(
        "<p>{}</p><p><br /></p><p>{}</p>",
        item.description,
        html::link(&item.link, "Lyt til afsnittet")
    )
}
