//! One mail per new podcast episode.
//!
//! Episodes are keyed by the source's `CacheKey` prefix plus the item id and
//! committed one at a time, right after their own mail went out. Sources
//! that fail are reported together in a single error mail at the end.

use super::{RunSummary, deliver_page, fetcher, finish, load_feed, subject};
use crate::config::{Paths, Settings, load_sources};
use crate::dedup;
use crate::delivery::Deliver;
use crate::error::JobError;
use crate::fetch::{DEFAULT_USER_AGENT, Fetcher};
use crate::models::{CandidateItem, FeedSource};
use crate::outputs::html;
use crate::store::{SeenSet, timestamp_now};
use std::path::PathBuf;
use tracing::{info, instrument, warn};

pub const SOURCES_FILE: &str = "podgrabr";
pub const STORE_FILE: &str = "podgrabrT";

#[derive(Debug)]
pub struct PodGrabr {
    sources: Vec<FeedSource>,
    store_path: PathBuf,
    fetcher: Fetcher,
}

impl PodGrabr {
    pub fn new(sources: Vec<FeedSource>, store_path: PathBuf, fetcher: Fetcher) -> Self {
        Self {
            sources,
            store_path,
            fetcher,
        }
    }

    pub fn from_settings(settings: &Settings, paths: &Paths) -> Result<Self, JobError> {
        Ok(Self::new(
            load_sources(&paths.dotfile(SOURCES_FILE))?,
            paths.dotfile(STORE_FILE),
            fetcher(settings, DEFAULT_USER_AGENT)?,
        ))
    }

    #[instrument(level = "info", skip_all, fields(sources = self.sources.len()))]
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
        let mut errors = String::new();

        for source in &self.sources {
            let parsed = match load_feed(&self.fetcher, &source.feed_url).await {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(source = %source.name, error = %e, "Source failed");
                    summary.failed_sources += 1;
                    errors.push_str(&html::error_block(source, &e.to_string()));
                    continue;
                }
            };

            let prefix = source.cache_key.as_deref().unwrap_or_default();
            let batch = dedup::filter_new(&parsed.items, store, &timestamp_now(), |item| {
                dedup::composite_key(prefix, item)
            });
            summary.new_items += batch.len();

            for new in batch.items() {
                deliver_page(deliverer, &subject("PodGrabr"), &episode(source, new.item)).await?;
                batch.commit_item(store, new);
                summary.delivered += 1;
                info!(source = %source.name, title = %new.item.title, "Episode delivered");
            }
        }

        if !errors.is_empty() {
            deliver_page(deliverer, &subject("PodGrabr"), &errors).await?;
            summary.delivered += 1;
        }
        Ok(summary)
    }
}

/// Body of an episode mail.
fn episode(source: &FeedSource, item: &CandidateItem) -> String {
    let published = item.published.map(|p| p.to_rfc2822()).unwrap_or_default();
    let mut body = html::header(&format!("{}: {}", source.name, item.title), &source.web_url);
    body.push_str(&format!("<p>Offentliggjort: {published}</p>"));
    match item.audio_link() {
        Some(audio) => {
            body.push_str(&html::htmlize(&item.description, source.htmlize));
            body.push_str(&format!("<p>{}</p>", html::link(audio, "Download")));
        }
        None => body.push_str("<p>No audio link!</p>"),
    }
    body
}
