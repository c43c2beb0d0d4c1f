//! greatschools.org pages
//!
//! - [`LinksSite`]: zipcode search listings, paginated
//! - [`SchoolsSite`]: school detail pages, optionally crawling nearby schools
//! - [`BoundariesSite`]: attendance boundary polygons from the JSON API

mod boundaries;
mod links;
pub mod parsers;
mod schools;

pub use boundaries::BoundariesSite;
pub use links::LinksSite;
pub use schools::SchoolsSite;

use crate::downloader::PageError;
use crate::extract::{Condition, Conditions};
use crate::ScrapeError;
use scraper::Html;
use url::Url;

const CAPTCHA_CSS: &str = r#"[class*="Captcha"], [id*="Captcha"]"#;

/// Condition checks shared by every greatschools HTML page
fn captcha_conditions() -> Result<Conditions, ScrapeError> {
    Conditions::new().with(Condition::Captcha, CAPTCHA_CSS)
}

/// Parses the site root, which must end in a slash for joins to keep its path
fn parse_base(base: &str) -> Result<Url, ScrapeError> {
    let trimmed = base.trim_end_matches('/');
    Ok(Url::parse(&format!("{}/", trimmed))?)
}

/// Resolves a link on a page to an absolute URL on the site
fn absolute(base: &Url, href: &str) -> Option<Url> {
    base.join(href.trim()).ok()
}

/// GID of a school link: its path, with the site domain stripped
fn gid(base: &Url, href: &str) -> Option<String> {
    let url = absolute(base, href)?;
    (url.host_str() == base.host_str()).then(|| url.path().to_string())
}

/// Takes the parsed document out of a page, or reports that nothing was loaded
fn loaded<'a>(html: &'a Option<Html>, url: &Option<Url>) -> Result<&'a Html, PageError> {
    html.as_ref().ok_or_else(|| PageError::Interaction {
        url: url.as_ref().map(Url::to_string).unwrap_or_default(),
        reason: "no document loaded".to_string(),
    })
}
