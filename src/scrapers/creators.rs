//! [Creators](https://www.creators.com) strip pages.
//!
//! The strip is the image inside the lightbox anchor (`a.fancybox`).

use super::{Strip, image_src};
use url::Url;

pub fn extract(page: &str, page_url: &Url) -> Option<Strip> {
    image_src(page, page_url, "a.fancybox img")
}
