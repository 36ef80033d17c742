//! Feed parsing and warning classification.
//!
//! Parsing itself is delegated to `feed-rs`, which handles RSS 0.9x/2.0,
//! Atom and JSON Feed. On top of that this module inspects the transport
//! metadata and the XML declaration for the anomalies feed servers commonly
//! get wrong, reporting the first one found as a warning. Three kinds of
//! warning are known to be benign (see [`is_tolerable`]); any other warning
//! rejects the feed for this run (see [`check_warning`]). The anomalies
//! detected here are all benign kinds, so a rejected feed in practice means
//! a `feed-rs` parse error.

use crate::error::FeedError;
use crate::fetch::RawFeed;
use crate::models::{CandidateItem, Enclosure};
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use tracing::{debug, warn};

static CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)charset\s*=\s*"?([^";\s]+)"#).unwrap());

/// Substrings (lower-case) of the warnings that do not invalidate a feed.
const TOLERABLE_PATTERNS: [&str; 3] = [
    "document declared as",
    "is not an xml media type",
    "no content-type specified",
];

/// Items of a parsed feed plus the first anomaly noticed while reading it.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub items: Vec<CandidateItem>,
    pub warning: Option<String>,
}

/// Whether a parse warning is one of the known benign kinds.
pub fn is_tolerable(warning: &str) -> bool {
    let warning = warning.to_lowercase();
    TOLERABLE_PATTERNS.iter().any(|p| warning.contains(p))
}

/// Parse a fetched feed. Items keep document order.
pub fn parse(raw: &RawFeed) -> Result<ParsedFeed, FeedError> {
    let warning = detect_warning(raw);
    let feed = feed_rs::parser::parse(raw.body.as_slice())
        .map_err(|e| FeedError::Malformed(e.to_string()))?;

    let items = feed.entries.into_iter().map(candidate_from_entry).collect::<Vec<_>>();
    debug!(items = items.len(), warning = ?warning, "Parsed feed");
    Ok(ParsedFeed {
        title: feed.title.map(|t| t.content),
        items,
        warning,
    })
}

/// Parse a feed and reject it unless any warning is tolerable.
pub fn parse_accepting_benign(raw: &RawFeed) -> Result<ParsedFeed, FeedError> {
    let parsed = parse(raw)?;
    check_warning(parsed.warning.as_deref())?;
    Ok(parsed)
}

/// Decides whether a feed carrying `warning` may be used.
///
/// # Arguments
///
/// * `warning` - The warning reported by [`parse`], if any
///
/// # Returns
///
/// `Ok(())` for no warning or a benign one, otherwise
/// [`FeedError::Rejected`] carrying the warning text.
pub fn check_warning(warning: Option<&str>) -> Result<(), FeedError> {
    match warning {
        Some(w) if !is_tolerable(w) => {
            warn!(warning = %w, "Feed rejected");
            Err(FeedError::Rejected(w.to_string()))
        }
        Some(w) => {
            debug!(warning = %w, "Ignoring benign feed warning");
            Ok(())
        }
        None => Ok(()),
    }
}

fn candidate_from_entry(entry: feed_rs::model::Entry) -> CandidateItem {
    let link = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().is_none_or(|r| r == "alternate"))
        .or_else(|| entry.links.first())
        .map(|l| l.href.clone())
        .unwrap_or_default();

    let mut enclosures: Vec<Enclosure> = entry
        .links
        .iter()
        .filter(|l| l.rel.as_deref() == Some("enclosure"))
        .map(|l| Enclosure {
            href: l.href.clone(),
            media_type: l.media_type.clone(),
        })
        .collect();
    // RSS <enclosure> elements surface as media content.
    for media in &entry.media {
        for content in &media.content {
            if let Some(url) = &content.url {
                enclosures.push(Enclosure {
                    href: url.to_string(),
                    media_type: content.content_type.as_ref().map(|m| m.to_string()),
                });
            }
        }
    }

    let description = entry
        .summary
        .map(|t| t.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .unwrap_or_default();

    CandidateItem {
        id: entry.id,
        title: entry.title.map(|t| t.content).unwrap_or_default(),
        link,
        published: entry.published.or(entry.updated),
        description,
        enclosures,
    }
}

fn detect_warning(raw: &RawFeed) -> Option<String> {
    let Some(content_type) = raw.content_type.as_deref() else {
        return Some("no Content-type specified".to_string());
    };

    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    if !is_xml_media_type(&essence) {
        return Some(format!("{essence} is not an XML media type"));
    }

    let charset = CHARSET
        .captures(content_type)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase());
    match (declared_encoding(&raw.body), charset) {
        (Some(declared), Some(charset)) if declared != charset => Some(format!(
            "document declared as {declared}, but parsed as {charset}"
        )),
        _ => None,
    }
}

fn is_xml_media_type(essence: &str) -> bool {
    essence.ends_with("/xml") || essence.ends_with("+xml") || essence == "application/xml-dtd"
}

/// Encoding named in the XML declaration, lower-cased.
fn declared_encoding(body: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(body);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Decl(decl)) => {
                let encoding = decl.encoding()?.ok()?;
                return Some(String::from_utf8_lossy(&encoding).to_lowercase());
            }
            // Leading whitespace or a BOM may precede the declaration.
            Ok(Event::Text(_)) => continue,
            _ => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <link>https://example.com</link>
    <description>d</description>
    <item>
      <title>First</title>
      <link>https://x/1</link>
      <guid>guid-1</guid>
      <pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate>
      <description>Line one</description>
    </item>
    <item>
      <title>Episode</title>
      <link>https://x/2</link>
      <guid>guid-2</guid>
      <enclosure url="https://cdn.example.com/ep2.mp3" length="1234" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#;

    fn raw(body: &str, content_type: Option<&str>) -> RawFeed {
        RawFeed {
            body: body.as_bytes().to_vec(),
            content_type: content_type.map(str::to_string),
        }
    }

    #[test]
    fn test_tolerable_patterns() {
        assert!(is_tolerable("document declared as us-ascii, but parsed as utf-8"));
        assert!(is_tolerable("text/html is not an XML media type"));
        assert!(is_tolerable("no Content-type specified"));
        assert!(!is_tolerable("mismatched tag"));
    }

    #[test]
    fn test_check_warning() {
        assert!(check_warning(None).is_ok());
        assert!(check_warning(Some("no Content-type specified")).is_ok());
        assert!(matches!(
            check_warning(Some("mismatched tag")),
            Err(FeedError::Rejected(w)) if w == "mismatched tag"
        ));
    }

    #[test]
    fn test_parse_items_in_order() {
        let parsed = parse(&raw(RSS, Some("application/rss+xml; charset=utf-8"))).unwrap();
        assert!(parsed.warning.is_none());
        assert_eq!(parsed.title.as_deref(), Some("Test Feed"));
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.items[0].link, "https://x/1");
        assert_eq!(parsed.items[0].id, "guid-1");
        assert_eq!(parsed.items[0].title, "First");
        assert_eq!(parsed.items[0].description, "Line one");
        assert!(parsed.items[0].published.is_some());
        assert_eq!(parsed.items[1].link, "https://x/2");
    }

    #[test]
    fn test_enclosure_is_exposed() {
        let parsed = parse(&raw(RSS, Some("application/rss+xml"))).unwrap();
        let audio = parsed.items[1].audio_link();
        assert_eq!(audio, Some("https://cdn.example.com/ep2.mp3"));
        assert_eq!(parsed.items[0].audio_link(), None);
    }

    #[test]
    fn test_missing_content_type_is_tolerated() {
        let parsed = parse_accepting_benign(&raw(RSS, None)).unwrap();
        assert_eq!(parsed.warning.as_deref(), Some("no Content-type specified"));
        assert_eq!(parsed.items.len(), 2);
    }

    #[test]
    fn test_html_content_type_is_tolerated() {
        let parsed = parse_accepting_benign(&raw(RSS, Some("text/html; charset=UTF-8"))).unwrap();
        assert_eq!(
            parsed.warning.as_deref(),
            Some("text/html is not an XML media type")
        );
        assert_eq!(parsed.items.len(), 2);
    }

    #[test]
    fn test_encoding_mismatch_is_tolerated() {
        let body = RSS.replace("UTF-8", "us-ascii");
        let parsed = parse_accepting_benign(&raw(&body, Some("application/xml; charset=utf-8"))).unwrap();
        assert_eq!(
            parsed.warning.as_deref(),
            Some("document declared as us-ascii, but parsed as utf-8")
        );
        assert_eq!(parsed.items.len(), 2);
    }

    #[test]
    fn test_malformed_feed_is_an_error() {
        let err = parse_accepting_benign(&raw("<html><body>oops", Some("text/xml"))).unwrap_err();
        assert!(matches!(err, FeedError::Malformed(_)));
    }

    #[test]
    fn test_atom_alternate_link() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom</title>
  <id>urn:feed</id>
  <updated>2024-01-01T00:00:00Z</updated>
  <entry>
    <title>Entry</title>
    <id>urn:entry:1</id>
    <updated>2024-01-01T00:00:00Z</updated>
    <link rel="alternate" href="https://a/1"/>
    <summary>Sum</summary>
  </entry>
</feed>"#;
        let parsed = parse(&raw(atom, Some("application/atom+xml"))).unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].link, "https://a/1");
        assert_eq!(parsed.items[0].id, "urn:entry:1");
        assert_eq!(parsed.items[0].description, "Sum");
    }
}
