//! HTML fragments and the document shell.
//!
//! Titles, names and URLs coming from remote documents are escaped; feed
//! descriptions are HTML by nature and are passed through as-is.

use crate::models::{CandidateItem, FeedSource};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write;

/// Alternating background colours of newsfeed rows.
const ROW_COLOURS: [&str; 2] = ["#fff", "#efe"];

/// Plain-text alternative sent alongside every HTML body.
pub const PLAIN_TEXT_NOTICE: &str = "Please read this in a HTML mail user agent.";

/// Wrap `body` in a minimal HTML document.
pub fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html dir="ltr" lang="en">
<head>
    <meta http-equiv="Content-Type" content="text/html; charset=UTF-8" />
    <meta name="viewport" content="width=device-width" />
    <title>{}</title>
</head>
<body>
{}
</body>
</html>"#,
        encode_text(title),
        body
    )
}

/// `<a href="href">text</a>`
pub fn link(href: &str, text: &str) -> String {
    format!(
        r#"<a href="{}">{}</a>"#,
        encode_double_quoted_attribute(href),
        encode_text(text)
    )
}

/// Linked `<h1>` heading.
pub fn header(text: &str, href: &str) -> String {
    format!("<h1>{}</h1>", link(href, text))
}

/// Red paragraph carrying an error message.
pub fn error_paragraph(message: &str) -> String {
    format!(r#"<p style="color: red">{}</p>"#, encode_text(message))
}

/// Source heading followed by an error message.
pub fn error_block(source: &FeedSource, message: &str) -> String {
    format!(
        "{}{}",
        header(&source.name, &source.web_url),
        error_paragraph(message)
    )
}

/// Optionally convert a plain-text description into a paragraph,
/// keeping its line breaks.
pub fn htmlize(description: &str, enabled: bool) -> String {
    if !enabled {
        return description.to_string();
    }
    format!("<p>{}</p>", description.replace('\n', "<br />"))
}

/// Renders newsfeed sections, alternating row colours across the whole mail.
#[derive(Debug, Default)]
pub struct NewsDigest {
    html: String,
    rows: usize,
}

impl NewsDigest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a heading and one table row per item. Empty `items` add nothing.
    pub fn add_section<'a, I>(&mut self, source: &FeedSource, items: I)
    where
        I: IntoIterator<Item = &'a CandidateItem>,
    {
        let mut items = items.into_iter().peekable();
        if items.peek().is_none() {
            return;
        }

        self.html.push_str(&header(&source.name, &source.web_url));
        self.html.push_str(r#"<table style="width: 100%">"#);
        for item in items {
            let colour = ROW_COLOURS[self.rows % 2];
            // Writing to a String cannot fail.
            let _ = write!(
                self.html,
                "<tr><td style=\"background-color: {colour};padding:0.5em;font-size:120%\">{}</td></tr>\r\n",
                link(&item.link, &item.title)
            );
            self.rows += 1;
        }
        self.html.push_str("</table><p><br /></p>");
    }

    pub fn add_error(&mut self, source: &FeedSource, message: &str) {
        self.html.push_str(&error_block(source, message));
        self.html.push_str("<p><br /></p>");
    }

    /// Number of item rows rendered so far.
    #[cfg(test)]
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }

    pub fn into_html(self) -> String {
        self.html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> FeedSource {
        FeedSource {
            name: "Ing & Co".into(),
            web_url: "https://ing.dk".into(),
            feed_url: "https://ing.dk/rss".into(),
            cache_key: None,
            htmlize: false,
        }
    }

    fn item(n: u32) -> CandidateItem {
        CandidateItem {
            id: n.to_string(),
            title: format!("Story <{n}>"),
            link: format!("https://ing.dk/{n}"),
            published: None,
            description: String::new(),
            enclosures: vec![],
        }
    }

    #[test]
    fn test_page_shell() {
        let html = page("Newsfeed 2026-10-14", "<p>x</p>");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Newsfeed 2026-10-14</title>"));
        assert!(html.contains("charset=UTF-8"));
        assert!(html.contains("<body>\n<p>x</p>\n</body>"));
    }

    #[test]
    fn test_link_escapes() {
        assert_eq!(
            link("https://x/?a=1&b=\"2\"", "A < B"),
            r#"<a href="https://x/?a=1&amp;b=&quot;2&quot;">A &lt; B</a>"#
        );
    }

    #[test]
    fn test_htmlize() {
        assert_eq!(htmlize("a\nb", true), "<p>a<br />b</p>");
        assert_eq!(htmlize("a\nb", false), "a\nb");
    }

    #[test]
    fn test_digest_alternates_across_sections() {
        let mut digest = NewsDigest::new();
        digest.add_section(&source(), &[item(1), item(2)]);
        digest.add_section(&source(), &[item(3)]);
        assert_eq!(digest.rows(), 3);

        let html = digest.into_html();
        let colours: Vec<_> = html
            .match_indices("background-color: ")
            .map(|(i, m)| &html[i + m.len()..i + m.len() + 4])
            .collect();
        assert_eq!(colours, ["#fff", "#efe", "#fff"]);
        assert!(html.contains("<h1><a href=\"https://ing.dk\">Ing &amp; Co</a></h1>"));
        assert!(html.contains("Story &lt;1&gt;"));
    }

    #[test]
    fn test_empty_section_renders_nothing() {
        let mut digest = NewsDigest::new();
        digest.add_section(&source(), Vec::<&CandidateItem>::new());
        assert!(digest.is_empty());
    }

    #[test]
    fn test_error_block() {
        let mut digest = NewsDigest::new();
        digest.add_error(&source(), "Timeout - waited 30 seconds");
        let html = digest.into_html();
        assert!(html.contains(r#"<p style="color: red">Timeout - waited 30 seconds</p>"#));
        assert_eq!(html.matches("<h1>").count(), 1);
    }
}
