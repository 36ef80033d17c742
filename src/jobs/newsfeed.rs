//! Digest of new items across many feeds, mailed as one message.

use super::{RunSummary, deliver_page, fetcher, finish, load_feed, subject};
use crate::config::{Paths, Settings, load_sources};
use crate::dedup::{self, Batch};
use crate::delivery::Deliver;
use crate::error::JobError;
use crate::feed::ParsedFeed;
use crate::fetch::Fetcher;
use crate::models::FeedSource;
use crate::outputs::html::NewsDigest;
use crate::store::{SeenSet, timestamp_now};
use std::path::PathBuf;
use tracing::{info, instrument, warn};

pub const SOURCES_FILE: &str = "newsfeeds";
pub const STORE_FILE: &str = "newsfeedT";
pub const USER_AGENT: &str = "newsfeed/5.0";
pub const ACCEPT_LANGUAGE: &str = "da, en";

#[derive(Debug)]
pub struct Newsfeed {
    sources: Vec<FeedSource>,
    store_path: PathBuf,
    fetcher: Fetcher,
}

impl Newsfeed {
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
            fetcher(settings, USER_AGENT)?.with_accept_language(ACCEPT_LANGUAGE),
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
        // Fetch everything first; the batches below borrow from these.
        let mut fetched: Vec<(&FeedSource, Result<ParsedFeed, JobError>)> = Vec::new();
        for source in &self.sources {
            fetched.push((source, load_feed(&self.fetcher, &source.feed_url).await));
        }

        let seen_at = timestamp_now();
        let mut summary = RunSummary::default();
        let mut digest = NewsDigest::new();
        let mut batches: Vec<Batch<'_>> = Vec::new();

        for (source, result) in &fetched {
            match result {
                Ok(parsed) => {
                    let batch = dedup::filter_new(&parsed.items, store, &seen_at, dedup::link_key);
                    summary.new_items += batch.len();
                    digest.add_section(source, batch.items().iter().map(|n| n.item));
                    if !batch.is_empty() {
                        batches.push(batch);
                    }
                }
                Err(e) => {
                    warn!(source = %source.name, error = %e, "Source failed");
                    summary.failed_sources += 1;
                    digest.add_error(source, &e.to_string());
                }
            }
        }

        if digest.is_empty() {
            info!("Nothing new");
            return Ok(summary);
        }

        deliver_page(deliverer, &subject("Newsfeed"), &digest.into_html()).await?;
        summary.delivered = 1;
        for batch in &batches {
            batch.commit(store);
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::testing::{Failing, Recorder};
    use crate::jobs::testing::{rss, silent_server};

    fn source(name: &str, feed_url: String) -> FeedSource {
        FeedSource {
            name: name.to_string(),
            web_url: format!("https://{name}.example.com"),
            feed_url,
            cache_key: None,
            htmlize: false,
        }
    }

    async fn serve(server: &mut mockito::Server, path: &str, body: String) -> mockito::Mock {
        server
            .mock("GET", path)
            .with_status(200)
            .with_header("content-type", "application/rss+xml; charset=utf-8")
            .with_body(body)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_first_run_delivers_and_commits() {
        let mut server = mockito::Server::new_async().await;
        serve(&mut server, "/a.xml", rss(&[("One", "https://x/1")])).await;
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("seen");

        let job = Newsfeed::new(
            vec![source("a", format!("{}/a.xml", server.url()))],
            store_path.clone(),
            Fetcher::new(USER_AGENT, 5).unwrap(),
        );
        let recorder = Recorder::default();
        let summary = job.run(&recorder).await.unwrap();

        assert_eq!(summary.new_items, 1);
        assert_eq!(summary.delivered, 1);
        let sent = recorder.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.starts_with("Newsfeed "));
        assert!(sent[0].1.contains(r#"<a href="https://x/1">One</a>"#));

        let store = SeenSet::open(&store_path).unwrap();
        assert!(store.contains("https://x/1"));
        store.close().unwrap();

        // Nothing new the second time round.
        let recorder = Recorder::default();
        let summary = job.run(&recorder).await.unwrap();
        assert_eq!(summary.new_items, 0);
        assert!(recorder.sent().is_empty());
    }

    #[tokio::test]
    async fn test_from_settings_reads_source_list() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/a.xml")
            .match_header("user-agent", USER_AGENT)
            .match_header("accept-language", ACCEPT_LANGUAGE)
            .with_status(200)
            .with_header("content-type", "application/rss+xml")
            .with_body(rss(&[("One", "https://x/1")]))
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        let sources = format!(
            r#"[{{"Name": "a", "WebUrl": "https://a.example.com", "RssUrl": "{}/a.xml"}}]"#,
            server.url()
        );
        std::fs::write(paths.dotfile(SOURCES_FILE), sources).unwrap();

        let job = Newsfeed::from_settings(&Settings::default(), &paths).unwrap();
        let recorder = Recorder::default();
        let summary = job.run(&recorder).await.unwrap();

        mock.assert_async().await;
        assert_eq!(summary.delivered, 1);
        assert!(paths.dotfile(STORE_FILE).exists());
    }

    #[tokio::test]
    async fn test_timeout_isolated_to_its_source() {
        let mut server = mockito::Server::new_async().await;
        serve(&mut server, "/b.xml", rss(&[("Two", "https://x/2")])).await;
        let silent = silent_server().await;
        let dir = tempfile::tempdir().unwrap();

        let job = Newsfeed::new(
            vec![
                source("slow", format!("http://{silent}/feed")),
                source("b", format!("{}/b.xml", server.url())),
            ],
            dir.path().join("seen"),
            Fetcher::new(USER_AGENT, 1).unwrap(),
        );
        let recorder = Recorder::default();
        let summary = job.run(&recorder).await.unwrap();

        assert_eq!(summary.failed_sources, 1);
        assert_eq!(summary.new_items, 1);
        let body = &recorder.sent()[0].1;
        assert!(body.contains(r#"<p style="color: red">Timeout - waited 1 seconds</p>"#));
        assert!(body.contains("https://x/2"));
        assert!(body.find("slow.example.com").unwrap() < body.find("https://x/2").unwrap());
    }

    #[tokio::test]
    async fn test_failed_delivery_commits_nothing() {
        let mut server = mockito::Server::new_async().await;
        serve(&mut server, "/a.xml", rss(&[("One", "https://x/1")])).await;
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("seen");

        let job = Newsfeed::new(
            vec![source("a", format!("{}/a.xml", server.url()))],
            store_path.clone(),
            Fetcher::new(USER_AGENT, 5).unwrap(),
        );
        let err = job.run(&Failing).await.unwrap_err();
        assert!(matches!(err, JobError::Delivery(_)));

        let store = SeenSet::open(&store_path).unwrap();
        assert!(store.is_empty());
        store.close().unwrap();
    }

    #[tokio::test]
    async fn test_tolerable_warning_still_extracts() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/html.xml")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(rss(&[("Three", "https://x/3")]))
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();

        let job = Newsfeed::new(
            vec![source("a", format!("{}/html.xml", server.url()))],
            dir.path().join("seen"),
            Fetcher::new(USER_AGENT, 5).unwrap(),
        );
        let recorder = Recorder::default();
        let summary = job.run(&recorder).await.unwrap();
        assert_eq!(summary.new_items, 1);
        assert_eq!(summary.failed_sources, 0);
    }

    #[tokio::test]
    async fn test_error_only_digest_is_delivered() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/gone").with_status(404).create_async().await;
        let dir = tempfile::tempdir().unwrap();

        let job = Newsfeed::new(
            vec![source("gone", format!("{}/gone", server.url()))],
            dir.path().join("seen"),
            Fetcher::new(USER_AGENT, 5).unwrap(),
        );
        let recorder = Recorder::default();
        job.run(&recorder).await.unwrap();
        assert!(recorder.sent()[0].1.contains("404"));
    }
}
