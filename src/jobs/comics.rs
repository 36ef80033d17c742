//! Today's comic strips in a single mail.
//!
//! A strip that cannot be fetched or located is replaced with a short
//! notice linking to its page; the mail is sent regardless.

use super::{RunSummary, deliver_page, fetcher, subject};
use crate::config::Settings;
use crate::delivery::Deliver;
use crate::error::JobError;
use crate::fetch::Fetcher;
use crate::outputs::html;
use crate::scrapers::{self, ComicSpec, Strip};
use chrono::Local;
use html_escape::{encode_double_quoted_attribute, encode_text};
use tracing::{debug, instrument, warn};
use url::Url;

pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:55.0) Gecko/20100101 Firefox/55.0";

const FOOTER: &str = "<p><br /></p><p><br /></p><p>Delivered by the Comics service!</p><p><br /></p>";

#[derive(Debug)]
pub struct Comics {
    strips: Vec<ComicSpec>,
    fetcher: Fetcher,
}

impl Comics {
    pub fn new(strips: Vec<ComicSpec>, fetcher: Fetcher) -> Self {
        Self { strips, fetcher }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, JobError> {
        let strips = if settings.comics.strips.is_empty() {
            scrapers::default_strips()
        } else {
            settings.comics.strips.clone()
        };
        Ok(Self::new(strips, fetcher(settings, USER_AGENT)?))
    }

    #[instrument(level = "info", skip_all, fields(strips = self.strips.len()))]
    pub async fn run<D: Deliver>(&self, deliverer: &D) -> Result<RunSummary, JobError> {
        let date = Local::now().format("%Y/%m/%d").to_string();
        let mut summary = RunSummary::default();
        let mut body = String::new();

        for spec in &self.strips {
            let page_url = spec.page_url(&date);
            match self.strip(spec, &page_url).await {
                Some(strip) => {
                    summary.new_items += 1;
                    body.push_str(&entry(spec, &page_url, &strip));
                }
                None => {
                    summary.failed_sources += 1;
                    body.push_str(&missing(spec, &page_url));
                }
            }
        }

        body.push_str(FOOTER);
        deliver_page(deliverer, &subject("Comics"), &body).await?;
        summary.delivered = 1;
        Ok(summary)
    }

    async fn strip(&self, spec: &ComicSpec, page_url: &str) -> Option<Strip> {
        let url = match Url::parse(page_url) {
            Ok(url) => url,
            Err(e) => {
                warn!(title = %spec.title, url = page_url, error = %e, "Invalid strip URL");
                return None;
            }
        };
        let page = match self.fetcher.fetch_text(page_url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(title = %spec.title, error = %e, "Strip page could not be fetched");
                return None;
            }
        };
        let strip = scrapers::extract(spec.site, &page, &url);
        if strip.is_none() {
            warn!(title = %spec.title, site = ?spec.site, "No strip found on page");
        } else {
            debug!(title = %spec.title, "Strip found");
        }
        strip
    }
}

fn entry(spec: &ComicSpec, page_url: &str, strip: &Strip) -> String {
    let width = spec
        .width
        .map(|w| format!(r#" width="{w}""#))
        .unwrap_or_default();
    let mut out = html::header(&spec.title, page_url);
    out.push_str(&format!(
        r#"<p><img src="{}" alt="{}"{width} /></p>"#,
        encode_double_quoted_attribute(&strip.image_url),
        encode_double_quoted_attribute(&spec.title),
    ));
    if let Some(caption) = &strip.caption {
        out.push_str(&format!("<p>{}</p>\r\n", encode_text(caption)));
    }
    out.push_str("<p><br /></p>\r\n");
    out
}

fn missing(spec: &ComicSpec, page_url: &str) -> String {
    format!(
        "<h1>{}</h1><p>Comic could not be fetched: {}</p>\r\n",
        encode_text(&spec.title),
        html::link(page_url, page_url)
    )
}
