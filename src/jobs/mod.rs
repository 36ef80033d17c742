//! The notifier jobs.
//!
//! Every job makes a single pass: fetch, extract, deduplicate where it keeps
//! state, render, deliver. Jobs are plain structs built from [`Settings`] and
//! [`Paths`]; their `run` method takes the [`Deliver`] capability so tests can
//! substitute an in-memory deliverer.
//!
//! | Job | State file | Source list | Delivers |
//! |-----|-----------|-------------|----------|
//! | [`newsfeed`] | `.newsfeedT` | `.newsfeeds` | one digest |
//! | [`podgrabr`] | `.podgrabrT` | `.podgrabr` | one mail per episode |
//! | [`datatilsynet`] | `.dtgrbT` | built in | one mail per episode |
//! | [`comics`] | none | built in / settings | one mail |
//! | [`lichess`] | none | API | one mail when it is my move |
//! | [`trello`] | none | API | one mail |
//! | [`kwed`] | none | built in | one mail when there are new remixes |

pub mod comics;
pub mod datatilsynet;
pub mod debug_feed;
pub mod kwed;
pub mod lichess;
pub mod newsfeed;
pub mod podgrabr;
pub mod trello;

use crate::cli::Command;
use crate::config::{Paths, Settings};
use crate::delivery::{Deliver, Delivery};
use crate::error::{FetchError, JobError, StoreError};
use crate::feed::{self, ParsedFeed};
use crate::fetch::Fetcher;
use crate::store::{RETENTION_DAYS, SeenSet};
use chrono::Local;
use tracing::{info, instrument};

/// What a run did, for the final log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Items not seen before.
    pub new_items: usize,
    /// Mails (or files) delivered.
    pub delivered: usize,
    /// Sources that could not be fetched or parsed.
    pub failed_sources: usize,
}

/// `"<prefix> YYYY-MM-DD HH:MM:SS"` in local time.
pub fn subject(prefix: &str) -> String {
    format!("{prefix} {}", Local::now().format("%Y-%m-%d %H:%M:%S"))
}

/// A fetcher using the configured User-Agent, or the job's own.
pub fn fetcher(settings: &Settings, default_user_agent: &str) -> Result<Fetcher, FetchError> {
    let user_agent = settings
        .http
        .user_agent
        .as_deref()
        .unwrap_or(default_user_agent);
    Fetcher::new(user_agent, settings.http.timeout_secs)
}

/// Sweep and close `store` after a run, whatever the run's outcome.
///
/// The sweep only happens after a successful run; the store is closed in
/// every case and a run error takes precedence over a close error.
pub(crate) fn finish(
    mut store: SeenSet,
    result: Result<RunSummary, JobError>,
) -> Result<RunSummary, JobError> {
    let result = result.and_then(|summary| {
        store.sweep(RETENTION_DAYS)?;
        Ok(summary)
    });
    let closed: Result<(), StoreError> = store.close();
    let summary = result?;
    closed?;
    Ok(summary)
}

/// Build and run the job selected on the command line.
#[instrument(level = "info", skip(settings, paths), fields(job = command.job_name()))]
pub async fn run(command: &Command, settings: &Settings, paths: &Paths) -> Result<RunSummary, JobError> {
    let delivery = || Delivery::from_settings(&settings.delivery_for(command.job_name()));
    let summary = match command {
        Command::Newsfeed => {
            let job = newsfeed::Newsfeed::from_settings(settings, paths)?;
            job.run(&delivery()?).await?
        }
        Command::Podgrabr => {
            let job = podgrabr::PodGrabr::from_settings(settings, paths)?;
            job.run(&delivery()?).await?
        }
        Command::Datatilsynet => {
            let job = datatilsynet::Datatilsynet::from_settings(settings, paths)?;
            job.run(&delivery()?).await?
        }
        Command::Comics => comics::Comics::from_settings(settings)?.run(&delivery()?).await?,
        Command::Lichess => {
            let job = lichess::Lichess::from_settings(settings, paths)?;
            job.run(&delivery()?).await?
        }
        Command::Trello => {
            let job = trello::TrelloTodo::from_settings(settings, paths)?;
            job.run(&delivery()?).await?
        }
        Command::Kwed => kwed::Kwed::from_settings(settings)?.run(&delivery()?).await?,
        Command::DebugFeed { url } => debug_feed::run(settings, url).await?,
    };

    info!(
        new_items = summary.new_items,
        delivered = summary.delivered,
        failed_sources = summary.failed_sources,
        "Job finished"
    );
    Ok(summary)
}

/// Fetch and parse one feed, tolerating only the benign warnings.
pub(crate) async fn load_feed(fetcher: &Fetcher, url: &str) -> Result<ParsedFeed, JobError> {
    let raw = fetcher.fetch(url).await?;
    Ok(feed::parse_accepting_benign(&raw)?)
}

/// Deliver `body` wrapped in a page titled `title`.
pub(crate) async fn deliver_page<D: Deliver>(
    deliverer: &D,
    title: &str,
    body: &str,
) -> Result<(), JobError> {
    let page = crate::outputs::html::page(title, body);
    deliverer.deliver(title, &page).await?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_format() {
        let s = subject("Newsfeed");
        let stamp = s.strip_prefix("Newsfeed ").unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").is_ok());
    }

    #[test]
    fn test_finish_closes_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen");
        let mut store = SeenSet::open(&path).unwrap();
        // Would fail the sweep if it ran.
        store.record("k", "garbage");

        let err = finish(store, Err(JobError::NotFound("board".into()))).unwrap_err();
        assert!(matches!(err, JobError::NotFound(_)));

        // The store was flushed and released.
        let store = SeenSet::open(&path).unwrap();
        assert!(store.contains("k"));
        store.close().unwrap();
    }

    #[test]
    fn test_finish_sweeps_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen");
        let mut store = SeenSet::open(&path).unwrap();
        store.record("ancient", "2001/01/01 00:00:00");

        finish(store, Ok(RunSummary::default())).unwrap();
        let store = SeenSet::open(&path).unwrap();
        assert!(store.is_empty());
        store.close().unwrap();
    }
}
