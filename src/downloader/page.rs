//! Page contract between the downloader and site-specific extractors
//!
//! A page wraps one loaded document. Known site conditions (captcha, refusal,
//! "no results") are reported through [`PageError`]; everything the page can
//! read is produced lazily by [`Page::execute`].

use crate::downloader::queue::Queue;
use crate::query::{Query, Record};
use crate::ScrapeError;
use thiserror::Error;
use url::Url;

/// Errors raised while loading or reading a page
#[derive(Debug, Error)]
pub enum PageError {
    #[error("Captcha presented at {url}")]
    Captcha { url: String },

    #[error("Request refused at {url}")]
    Refusal { url: String },

    #[error("Site reported no results at {url}")]
    BadRequest { url: String },

    #[error("Page changed during extraction at {url}: {reason}")]
    Stale { url: String, reason: String },

    #[error("Page interaction failed at {url}: {reason}")]
    Interaction { url: String, reason: String },

    #[error(transparent)]
    Fatal(#[from] ScrapeError),
}

/// How the downloader reacts to a [`PageError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Site is obstructing: trip session and VPN, abandon the query
    Blocked,
    /// Site affirmatively has nothing: resolve as an empty success
    NoResults,
    /// Page state shifted underneath us: fail, eligible for retry
    Transient,
    /// Unexpected: stop the run
    Fatal,
}

impl PageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Captcha { .. } | Self::Refusal { .. } => ErrorKind::Blocked,
            Self::BadRequest { .. } => ErrorKind::NoResults,
            Self::Stale { .. } | Self::Interaction { .. } => ErrorKind::Transient,
            Self::Fatal(_) => ErrorKind::Fatal,
        }
    }

    /// Converts into the crate error that ends a run
    pub fn into_fatal(self) -> ScrapeError {
        match self {
            Self::Fatal(error) => error,
            other => ScrapeError::Extraction {
                url: other.url().unwrap_or_default().to_string(),
                message: other.to_string(),
            },
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Captcha { url }
            | Self::Refusal { url }
            | Self::BadRequest { url }
            | Self::Stale { url, .. }
            | Self::Interaction { url, .. } => Some(url),
            Self::Fatal(_) => None,
        }
    }
}

/// A raw document returned by a session load
#[derive(Debug, Clone)]
pub struct Document {
    /// Final URL after redirects
    pub url: Url,
    pub status: u16,
    pub body: String,
}

/// One extracted row, tagged with the query it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub query: Query,
    pub dataset: String,
    pub record: Record,
}

impl Extracted {
    pub fn new(query: Query, dataset: &str, record: Record) -> Self {
        Self {
            query,
            dataset: dataset.to_string(),
            record,
        }
    }
}

/// Lazy, finite, non-restartable sequence of extracted rows
pub type Extraction<'a> = Box<dyn Iterator<Item = Result<Extracted, PageError>> + 'a>;

/// What the downloader should do after a crawl step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// Nothing further on this page
    Done,
    /// The page advanced in place; run setup and execute again
    Again,
    /// Navigate to this URL and run setup and execute on the result
    Follow(Url),
}

/// Per-load document wrapper
pub trait Page {
    /// Takes ownership of a loaded document, detecting blocking conditions
    fn load(&mut self, document: Document) -> Result<(), PageError>;

    /// Validates or prepares content before extraction; safe to call once per load
    fn setup(&mut self) -> Result<(), PageError> {
        Ok(())
    }

    /// Produces the rows this page holds
    fn execute(&self) -> Result<Extraction<'_>, PageError>;

    /// Looks for continuations, pushing derived queries onto `queue`
    fn crawl(&mut self, _queue: &mut Queue) -> Result<Continuation, PageError> {
        Ok(Continuation::Done)
    }
}

/// Maps queries onto one website section
pub trait Site {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Builds the target URL; a pure function of the query
    fn url(&self, query: &Query) -> Result<Url, ScrapeError>;

    /// Creates the page that will read the document loaded for `query`
    fn page(&self, query: &Query) -> Box<dyn Page>;
}
