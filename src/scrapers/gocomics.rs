//! [GoComics](https://www.gocomics.com) dated strip pages.

use super::{Strip, image_src};
use url::Url;

pub fn extract(page: &str, page_url: &Url) -> Option<Strip> {
    image_src(page, page_url, ".item-comic-image img")
}
