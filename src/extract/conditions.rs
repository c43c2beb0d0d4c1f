use crate::downloader::PageError;
use crate::extract::{normalize_text, selector};
use crate::ScrapeError;
use scraper::{Html, Selector};

/// A site state that prevents normal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Captcha,
    Refusal,
    BadRequest,
}

impl Condition {
    fn error(self, url: &str) -> PageError {
        let url = url.to_string();
        match self {
            Self::Captcha => PageError::Captcha { url },
            Self::Refusal => PageError::Refusal { url },
            Self::BadRequest => PageError::BadRequest { url },
        }
    }
}

#[derive(Debug, Clone)]
struct Check {
    condition: Condition,
    selector: Selector,
    contains: Option<&'static str>,
}

/// Ordered condition checks run against every loaded document
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    checks: Vec<Check>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a check that fires when `css` matches
    pub fn with(self, condition: Condition, css: &str) -> Result<Self, ScrapeError> {
        self.with_text(condition, css, None)
    }

    /// Adds a check that fires when `css` matches an element containing `text`
    pub fn with_text(
        mut self,
        condition: Condition,
        css: &str,
        text: Option<&'static str>,
    ) -> Result<Self, ScrapeError> {
        self.checks.push(Check {
            condition,
            selector: selector(css)?,
            contains: text,
        });
        Ok(self)
    }

    /// First condition present in `document`, in registration order
    pub fn detect(&self, document: &Html) -> Option<Condition> {
        self.checks
            .iter()
            .find(|check| {
                document.select(&check.selector).any(|element| match check.contains {
                    Some(text) => normalize_text(element.text()).contains(text),
                    None => true,
                })
            })
            .map(|check| check.condition)
    }

    /// Fails with the matching page error when a condition is present
    pub fn check(&self, document: &Html, url: &str) -> Result<(), PageError> {
        match self.detect(document) {
            Some(condition) => Err(condition.error(url)),
            None => Ok(()),
        }
    }
}
