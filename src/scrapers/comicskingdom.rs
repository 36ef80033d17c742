//! [Comics Kingdom](https://www.comicskingdom.com) strip pages.
//!
//! The strip URL is carried in a `data-comic-image-url` attribute rather
//! than an `<img>`.

use super::{Strip, absolute, first_attr};
use scraper::Html;
use url::Url;

const ATTR: &str = "data-comic-image-url";

pub fn extract(page: &str, page_url: &Url) -> Option<Strip> {
    let document = Html::parse_document(page);
    let href = first_attr(&document, &format!("[{ATTR}]"), ATTR)?;
    absolute(page_url, &href).map(Strip::image)
}
