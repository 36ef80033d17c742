//! [xkcd](https://xkcd.com) front page.
//!
//! Besides the image, the strip's `title` attribute carries the hover text,
//! which is mailed as a caption.

use super::{Strip, absolute};
use scraper::{Html, Selector};
use url::Url;

pub fn extract(page: &str, page_url: &Url) -> Option<Strip> {
    let document = Html::parse_document(page);
    let selector = Selector::parse("#comic img").ok()?;
    let img = document.select(&selector).next()?;

    let image_url = absolute(page_url, img.value().attr("src")?)?;
    let caption = img
        .value()
        .attr("title")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    Some(Strip { image_url, caption })
}
