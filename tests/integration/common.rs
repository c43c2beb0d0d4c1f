//! Shared stubs for the integration tests

use async_trait::async_trait;
use schoolscrape::downloader::{
    Continuation, Document, Extracted, Extraction, Page, PageError, Queue, Session, Site,
};
use schoolscrape::query::{Query, Record};
use schoolscrape::vpn::{Reconnector, VpnError};
use schoolscrape::ScrapeError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use url::Url;

/// What a stub page does for a given query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// One record in the `stub` dataset
    Record,
    /// Loads fine, extracts nothing
    Empty,
    Captcha,
    BadRequest,
    Stale,
    Fatal,
    /// One record per pass; asks to re-extract in place this many times
    Again(usize),
    /// One record per pass; never stops asking to re-extract
    AgainForever,
}

/// Site whose pages follow a per-key script; unscripted keys yield a record
#[derive(Default)]
pub struct StubSite {
    script: HashMap<String, Behavior>,
}

impl StubSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, query: &Query, behavior: Behavior) -> Self {
        self.script.insert(query.key(), behavior);
        self
    }
}

impl Site for StubSite {
    fn name(&self) -> &str {
        "stub"
    }

    fn url(&self, query: &Query) -> Result<Url, ScrapeError> {
        Ok(Url::parse(&format!("http://stub.test/page?{}", query.key()))?)
    }

    fn page(&self, query: &Query) -> Box<dyn Page> {
        Box::new(StubPage {
            query: query.clone(),
            behavior: self
                .script
                .get(&query.key())
                .copied()
                .unwrap_or(Behavior::Record),
            url: String::new(),
            crawls: 0,
        })
    }
}

struct StubPage {
    query: Query,
    behavior: Behavior,
    url: String,
    crawls: usize,
}

impl Page for StubPage {
    fn load(&mut self, document: Document) -> Result<(), PageError> {
        self.url = document.url.to_string();
        let url = self.url.clone();

        match self.behavior {
            Behavior::Captcha => Err(PageError::Captcha { url }),
            Behavior::BadRequest => Err(PageError::BadRequest { url }),
            Behavior::Fatal => Err(PageError::Fatal(ScrapeError::Extraction {
                url,
                message: "unexpected page layout".to_string(),
            })),
            _ => Ok(()),
        }
    }

    fn setup(&mut self) -> Result<(), PageError> {
        if self.behavior == Behavior::Stale {
            return Err(PageError::Stale {
                url: self.url.clone(),
                reason: "content shifted".to_string(),
            });
        }
        Ok(())
    }

    fn execute(&self) -> Result<Extraction<'_>, PageError> {
        let yields = matches!(
            self.behavior,
            Behavior::Record | Behavior::Again(_) | Behavior::AgainForever
        );
        if !yields {
            return Ok(Box::new(std::iter::empty()));
        }

        let mut record = Record::new();
        record.insert("value".to_string(), "1".to_string());
        record.insert("pass".to_string(), self.crawls.to_string());
        Ok(Box::new(std::iter::once(Ok(Extracted::new(
            self.query.clone(),
            "stub",
            record,
        )))))
    }

    fn crawl(&mut self, _queue: &mut Queue) -> Result<Continuation, PageError> {
        let again = match self.behavior {
            Behavior::Again(times) => self.crawls < times,
            Behavior::AgainForever => true,
            _ => false,
        };

        self.crawls += 1;
        Ok(if again {
            Continuation::Again
        } else {
            Continuation::Done
        })
    }
}

/// Observable counters of a [`StubSession`]
#[derive(Debug, Default)]
pub struct SessionLog {
    pub loads: Vec<String>,
    pub resets: u32,
    pub trips: u32,
}

/// Session that answers every load with an empty 200 document
pub struct StubSession {
    log: Arc<Mutex<SessionLog>>,
    tripped: bool,
}

impl StubSession {
    pub fn new() -> (Self, Arc<Mutex<SessionLog>>) {
        let log = Arc::new(Mutex::new(SessionLog::default()));
        (
            Self {
                log: Arc::clone(&log),
                tripped: false,
            },
            log,
        )
    }
}

#[async_trait]
impl Session for StubSession {
    fn is_alive(&self) -> bool {
        !self.tripped
    }

    async fn reset(&mut self) -> Result<(), ScrapeError> {
        self.log.lock().unwrap().resets += 1;
        self.tripped = false;
        Ok(())
    }

    fn trip(&mut self) {
        self.log.lock().unwrap().trips += 1;
        self.tripped = true;
    }

    async fn load(&mut self, url: &Url, _referer: Option<&str>) -> Result<Document, PageError> {
        self.log.lock().unwrap().loads.push(url.to_string());
        Ok(Document {
            url: url.clone(),
            status: 200,
            body: String::new(),
        })
    }
}

/// Reconnector that always succeeds and counts connects
#[derive(Default)]
pub struct CountingReconnector {
    pub connects: Mutex<u32>,
}

#[async_trait]
impl Reconnector for CountingReconnector {
    async fn disconnect(&self) -> Result<(), VpnError> {
        Ok(())
    }

    async fn connect(&self, _server: Option<&str>) -> Result<(), VpnError> {
        *self.connects.lock().unwrap() += 1;
        Ok(())
    }
}

pub fn gid(n: u32) -> Query {
    Query::single("GID", format!("/california/bakersfield/{}-School/", n))
}
