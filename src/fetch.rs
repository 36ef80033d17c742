//! HTTP retrieval shared by every job.
//!
//! A [`Fetcher`] wraps one `reqwest` client configured with the job's
//! User-Agent and a total request timeout. Every request carries a
//! `Connection: close` hint; jobs make a handful of requests per run and
//! never reuse connections.

use crate::error::FetchError;
use reqwest::header::{ACCEPT_LANGUAGE, CONNECTION, CONTENT_TYPE, HeaderValue, LOCATION};
use reqwest::{Client, RequestBuilder, redirect};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default per-request timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent presented to feed servers.
pub const DEFAULT_USER_AGENT: &str = "blogtrottr/2.0";

/// Raw body of a fetched resource plus the transport metadata the feed
/// parser needs to classify warnings.
#[derive(Debug, Clone)]
pub struct RawFeed {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    timeout_secs: u64,
    accept_language: Option<HeaderValue>,
}

impl Fetcher {
    /// Creates a fetcher that follows redirects.
    ///
    /// # Arguments
    ///
    /// * `user_agent` - User-Agent sent with every request
    /// * `timeout_secs` - Total time allowed for one request, body included
    ///
    /// # Returns
    ///
    /// The fetcher, or [`FetchError::Transport`] if the client cannot be built.
    pub fn new(user_agent: &str, timeout_secs: u64) -> Result<Self, FetchError> {
        Ok(Self {
            client: Self::builder(user_agent, timeout_secs).build()?,
            timeout_secs,
            accept_language: None,
        })
    }

    /// Like [`Fetcher::new`] but never follows redirects, so `Location`
    /// headers can be inspected.
    pub fn without_redirects(user_agent: &str, timeout_secs: u64) -> Result<Self, FetchError> {
        Ok(Self {
            client: Self::builder(user_agent, timeout_secs)
                .redirect(redirect::Policy::none())
                .build()?,
            timeout_secs,
            accept_language: None,
        })
    }

    /// Send `Accept-Language: languages` with every GET.
    pub fn with_accept_language(mut self, languages: &'static str) -> Self {
        self.accept_language = Some(HeaderValue::from_static(languages));
        self
    }

    fn builder(user_agent: &str, timeout_secs: u64) -> reqwest::ClientBuilder {
        Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(Duration::from_secs(timeout_secs))
    }

    /// Start a GET request carrying the shared headers.
    pub fn get(&self, url: &str) -> RequestBuilder {
        let request = self
            .client
            .get(url)
            .header(CONNECTION, HeaderValue::from_static("close"));
        match &self.accept_language {
            Some(languages) => request.header(ACCEPT_LANGUAGE, languages.clone()),
            None => request,
        }
    }

    /// Send a prepared request, mapping failures onto [`FetchError`] and
    /// rejecting non-success statuses.
    pub async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, FetchError> {
        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        if !status.is_success() {
            warn!(%status, url = %response.url(), "Non-success status");
            return Err(FetchError::Status(status));
        }
        Ok(response)
    }

    /// Fetch a feed document. The body is trimmed of surrounding whitespace.
    ///
    /// # Arguments
    ///
    /// * `url` - Address of the feed
    ///
    /// # Returns
    ///
    /// The body plus its `Content-Type`, or a [`FetchError`] for timeouts,
    /// transport failures and non-success statuses.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<RawFeed, FetchError> {
        let response = self.send(self.get(url)).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;
        let body = bytes.trim_ascii().to_vec();

        debug!(bytes = body.len(), content_type = ?content_type, "Fetched feed");
        Ok(RawFeed { body, content_type })
    }

    /// Fetch a page as text.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.send(self.get(url)).await?;
        let text = response.text().await.map_err(|e| self.classify(e))?;
        debug!(bytes = text.len(), "Fetched page");
        Ok(text)
    }

    /// Issue a HEAD request and return its `Location` header, if any.
    ///
    /// Redirect statuses are the point of the call, so only transport
    /// failures are errors here.
    #[instrument(level = "info", skip(self))]
    pub async fn head_location(&self, url: &str) -> Result<Option<String>, FetchError> {
        let response = self
            .client
            .head(url)
            .header(CONNECTION, HeaderValue::from_static("close"))
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        Ok(response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string))
    }

    fn classify(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout_secs)
        } else {
            FetchError::Transport(e)
        }
    }
}
