use super::{absolute, captcha_conditions, gid, loaded, parse_base, parsers};
use crate::downloader::{Continuation, Document, Extracted, Extraction, Page, PageError, Queue, Site};
use crate::extract::{selector, Condition, Conditions, Field, Fields};
use crate::query::{Query, Record};
use crate::scheduler::pad_zipcode;
use crate::ScrapeError;
use scraper::{Html, Selector};
use std::sync::Arc;
use url::Url;

const DATASET: &str = "links";

struct LinkSelectors {
    conditions: Conditions,
    summary: Field,
    items: Selector,
    row: Fields,
    link: Field,
    pages: Selector,
    next: Selector,
}

impl LinkSelectors {
    fn new() -> Result<Self, ScrapeError> {
        Ok(Self {
            conditions: captcha_conditions()?.with_text(
                Condition::BadRequest,
                "span.heading",
                Some("did not return any schools"),
            )?,
            summary: Field::text("results", "div.pagination-summary")?,
            items: selector("section.school-list ol > li:not(.ad)")?,
            row: Fields::new()
                .with(Field::text("name", "a.name")?)
                .with(Field::text("address", "div.address")?.parsed(parsers::address))
                .with(Field::text("type", "div > span.open-sans")?.parsed(parsers::school_type)),
            link: Field::attr("link", "a.name", "href")?,
            pages: selector("div.pagination-container a:not(.disabled)")?,
            next: selector("span.icon-chevron-right")?,
        })
    }
}

/// Search listing by zipcode
pub struct LinksSite {
    base: Url,
    selectors: Arc<LinkSelectors>,
}

impl LinksSite {
    pub fn new(base_url: &str) -> Result<Self, ScrapeError> {
        Ok(Self {
            base: parse_base(base_url)?,
            selectors: Arc::new(LinkSelectors::new()?),
        })
    }
}

impl Site for LinksSite {
    fn name(&self) -> &str {
        "links"
    }

    fn url(&self, query: &Query) -> Result<Url, ScrapeError> {
        let raw = query.require("zipcode")?;
        let zipcode = pad_zipcode(raw).ok_or_else(|| ScrapeError::QueryUrl {
            query: query.key(),
            reason: format!("'{}' is not a zipcode", raw),
        })?;

        let mut url = self.base.join("search/search.zipcode")?;
        url.query_pairs_mut().append_pair("zip", &zipcode);
        Ok(url)
    }

    fn page(&self, query: &Query) -> Box<dyn Page> {
        Box::new(LinksPage {
            query: query.clone(),
            base: self.base.clone(),
            selectors: Arc::clone(&self.selectors),
            html: None,
            url: None,
        })
    }
}

struct LinksPage {
    query: Query,
    base: Url,
    selectors: Arc<LinkSelectors>,
    html: Option<Html>,
    url: Option<Url>,
}

impl LinksPage {
    fn read(&self, item: scraper::ElementRef<'_>) -> Option<Record> {
        let href = self.selectors.link.first(item)?;
        let gid = gid(&self.base, &href)?;
        let link = absolute(&self.base, &href)?;

        let mut record = self.selectors.row.record(item);
        record.insert("GID".to_string(), gid);
        record.insert("link".to_string(), link.to_string());
        Some(record)
    }
}

impl Page for LinksPage {
    fn load(&mut self, document: Document) -> Result<(), PageError> {
        let html = Html::parse_document(&document.body);
        self.selectors.conditions.check(&html, document.url.as_str())?;

        self.html = Some(html);
        self.url = Some(document.url);
        Ok(())
    }

    fn setup(&mut self) -> Result<(), PageError> {
        let html = loaded(&self.html, &self.url)?;
        if !self.selectors.summary.present(html.root_element()) {
            return Err(PageError::Stale {
                url: self.url.as_ref().map(Url::to_string).unwrap_or_default(),
                reason: "result summary missing".to_string(),
            });
        }
        Ok(())
    }

    fn execute(&self) -> Result<Extraction<'_>, PageError> {
        let html = loaded(&self.html, &self.url)?;

        let results = self
            .selectors
            .summary
            .first(html.root_element())
            .and_then(|summary| parsers::results(&summary));
        if results.as_deref() == Some("0") {
            return Ok(Box::new(std::iter::empty()));
        }

        let rows = html
            .select(&self.selectors.items)
            .filter_map(move |item| {
                let record = self.read(item);
                if record.is_none() {
                    tracing::debug!("Skipping listing entry without a school link");
                }
                record
            })
            .map(move |record| Ok(Extracted::new(self.query.clone(), DATASET, record)));

        Ok(Box::new(rows))
    }

    fn crawl(&mut self, _queue: &mut Queue) -> Result<Continuation, PageError> {
        let html = loaded(&self.html, &self.url)?;

        let next = html
            .select(&self.selectors.pages)
            .find(|a| a.select(&self.selectors.next).next().is_some())
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| absolute(&self.base, href));

        Ok(match next {
            Some(url) => Continuation::Follow(url),
            None => Continuation::Done,
        })
    }
}
