//! Data models shared by the feed jobs.
//!
//! - [`FeedSource`]: one configured feed, read from a per-job JSON list
//! - [`CandidateItem`]: a single entry read from a fetched feed
//! - [`Enclosure`]: a typed attachment link on an item
//!
//! The source list keeps the field names of the existing
//! `~/.newsfeeds` / `~/.podgrabr` files, hence the `PascalCase` renames.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Media type of the enclosure podgrabr offers as the download link.
pub const AUDIO_MPEG: &str = "audio/mpeg";

/// A configured feed.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct FeedSource {
    /// Display name used in headers.
    pub name: String,
    /// Human-facing site the header links to.
    pub web_url: String,
    /// The feed document itself.
    #[serde(rename = "RssUrl")]
    pub feed_url: String,
    /// Prefix for dedup keys, so two feeds reusing item ids cannot collide.
    #[serde(default)]
    pub cache_key: Option<String>,
    /// Render the item description as HTML paragraphs.
    #[serde(default)]
    pub htmlize: bool,
}

/// A typed attachment link on a feed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub href: String,
    pub media_type: Option<String>,
}

/// A single entry of a fetched feed, in feed-agnostic form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    pub id: String,
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    pub description: String,
    pub enclosures: Vec<Enclosure>,
}

impl CandidateItem {
    /// First `audio/mpeg` enclosure, if any.
    pub fn audio_link(&self) -> Option<&str> {
        self.enclosures
            .iter()
            .find(|e| {
                e.media_type
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case(AUDIO_MPEG))
            })
            .map(|e| e.href.as_str())
    }
}
