//! [Monkey User](https://www.monkeyuser.com) front page.

use super::{Strip, image_src};
use url::Url;

pub fn extract(page: &str, page_url: &Url) -> Option<Strip> {
    image_src(page, page_url, "div.content img")
}
