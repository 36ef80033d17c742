//! # Notifier
//!
//! Small scheduled jobs that watch feeds, web pages and APIs and mail (or
//! write) an HTML digest of whatever is new.
//!
//! ## Jobs
//!
//! - `newsfeed`: one digest of new items across the feeds in `~/.newsfeeds`
//! - `podgrabr`: one mail per new podcast episode from `~/.podgrabr`
//! - `datatilsynet`: one mail per new episode of the Datatilsynet podcast
//! - `comics`: today's comic strips
//! - `lichess`: the correspondence games where it is my move
//! - `trello`: the cards of a Trello board by due date
//! - `kwed`: new C64 remixes on remix.kwed.org
//! - `debug-feed <url>`: print a feed's entries without touching any state
//!
//! ## Usage
//!
//! ```sh
//! notifier newsfeed
//! RUST_LOG=debug notifier --config ~/.notifier.yaml podgrabr
//! ```
//!
//! ## Architecture
//!
//! Every run is a single pass:
//! 1. **Fetching**: download each source with a per-request timeout
//! 2. **Filtering**: drop items already recorded in the job's seen-set
//! 3. **Rendering**: build one HTML page (or one per item)
//! 4. **Delivery**: hand the page to the configured backend, then record
//!    the delivered items as seen

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dedup;
mod delivery;
mod error;
mod feed;
mod fetch;
mod jobs;
mod models;
mod outputs;
mod scrapers;
mod store;

use cli::Cli;
use config::{Paths, Settings};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();

    let args = Cli::parse();
    let job = args.command.job_name();
    info!(job, "notifier starting up");
    debug!(?args.config, "Parsed CLI arguments");

    // An explicitly named settings file must exist; the default one may not.
    let settings = match &args.config {
        Some(path) => Settings::load(path, true),
        None => Settings::load(&config::default_settings_path()?, false),
    };
    let settings = settings.inspect_err(|e| error!(error = %e, "Failed to load settings"))?;
    let paths = Paths::resolve(&settings)?;
    debug!(state_dir = %paths.base().display(), "Using state directory");

    let summary = match jobs::run(&args.command, &settings, &paths).await {
        Ok(summary) => summary,
        Err(e) => {
            error!(job, error = %e, "Job failed");
            return Err(e.into());
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        job,
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        new_items = summary.new_items,
        delivered = summary.delivered,
        "Execution complete"
    );
    Ok(())
}
