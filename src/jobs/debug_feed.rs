//! Fetch one feed and print what the other jobs would see in it.
//!
//! Touches no state and delivers nothing.

use super::{RunSummary, fetcher};
use crate::config::Settings;
use crate::error::JobError;
use crate::feed::{self, ParsedFeed};
use crate::fetch::DEFAULT_USER_AGENT;
use std::fmt::Write;
use tracing::{info, instrument};

#[instrument(level = "info", skip(settings))]
pub async fn run(settings: &Settings, url: &str) -> Result<RunSummary, JobError> {
    let fetcher = fetcher(settings, DEFAULT_USER_AGENT)?;
    info!("Fetching feed");
    let raw = fetcher.fetch(url).await?;
    let parsed = feed::parse_accepting_benign(&raw)?;

    print!("{}", report(&parsed));
    Ok(RunSummary {
        new_items: parsed.items.len(),
        ..RunSummary::default()
    })
}

fn report(parsed: &ParsedFeed) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    if let Some(title) = &parsed.title {
        let _ = writeln!(out, "Feed: {title}");
    }
    if let Some(warning) = &parsed.warning {
        let _ = writeln!(out, "Warning (tolerated): {warning}");
    }
    let _ = writeln!(out, "\nEntries:");
    for item in &parsed.items {
        let _ = writeln!(out, "{}\n  {}", item.title, item.link);
    }
    out
}
