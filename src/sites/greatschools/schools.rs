use super::{absolute, captcha_conditions, gid, loaded, parse_base, parsers};
use crate::downloader::{Continuation, Document, Extracted, Extraction, Page, PageError, Queue, Site};
use crate::extract::{normalize_text, selector, Conditions, Field};
use crate::query::{Query, Record};
use crate::ScrapeError;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use url::Url;

/// Races reported individually; everything else folds into `Other`
const RACES: [&str; 4] = ["White", "Hispanic", "Black", "Asian"];

/// Detail page sections in extraction order
const SECTIONS: [(&str, fn(&SchoolsPage, ElementRef<'_>) -> Record); 7] = [
    ("location", SchoolsPage::location),
    ("schools", SchoolsPage::schools),
    ("scores", SchoolsPage::scores),
    ("college", SchoolsPage::college),
    ("teachers", SchoolsPage::teachers),
    ("testing", SchoolsPage::testing),
    ("demographics", SchoolsPage::demographics),
];

struct SchoolSelectors {
    conditions: Conditions,
    address: Field,
    district: Field,
    district_link: Field,
    name: Field,
    info_items: Selector,
    label: Selector,
    overall: Field,
    academic: Field,
    test: Field,
    test_scores: Selector,
    college: Selector,
    teachers: Selector,
    subject: Selector,
    score: Selector,
    staff_rows: Selector,
    staff_value: Selector,
    races: Selector,
    legend_title: Selector,
    low_income: Field,
    no_english: Field,
    nearby: Selector,
}

impl SchoolSelectors {
    fn new() -> Result<Self, ScrapeError> {
        Ok(Self {
            conditions: captcha_conditions()?,
            address: Field::text("address", "div.address span.content")?.parsed(parsers::address),
            district: Field::text("district", "div.district a")?,
            district_link: Field::attr("districtlink", "div.district a", "href")?,
            name: Field::text("schoolname", "h1.school-name")?,
            info_items: selector("div.school-info > div.item")?,
            label: selector("div.label")?,
            overall: Field::text("overallscore", "div.rating-with-label__rating")?
                .parsed(parsers::score),
            academic: Field::text(
                "academicscore",
                r#"div.toc-entry > a[data-ga-click-label="Academic progress"] span.gs-rating"#,
            )?
            .parsed(parsers::score),
            test: Field::text(
                "testscore",
                r#"div.toc-entry > a[data-ga-click-label="Test scores"] span.gs-rating"#,
            )?
            .parsed(parsers::score),
            test_scores: selector("#TestScores div.test-score-container")?,
            college: selector("#College_readiness div.test-score-container")?,
            teachers: selector("#TeachersStaff div.test-score-container")?,
            subject: selector("div.subject")?,
            score: selector("div.score")?,
            staff_rows: selector("#TeachersStaff div.rating-score-item > div.row")?,
            staff_value: selector("div.rating-score-item")?,
            races: selector("#Students div.legend-separator")?,
            legend_title: selector("div.legend-title")?,
            low_income: Field::text("lowincome", r#"#Students div[id*="lunch-program"] div[id*="highcharts"]"#)?
                .parsed(parsers::graph_percent),
            no_english: Field::text("noenglish", r#"#Students div#english-learners div[id*="highcharts"]"#)?
                .parsed(parsers::graph_percent),
            nearby: selector(r#"#NearbySchools div.nearby-schools a[class*="Click"]"#)?,
        })
    }
}

/// School detail pages addressed by GID
pub struct SchoolsSite {
    base: Url,
    follow_nearby: bool,
    selectors: Arc<SchoolSelectors>,
}

impl SchoolsSite {
    pub fn new(base_url: &str, follow_nearby: bool) -> Result<Self, ScrapeError> {
        Ok(Self {
            base: parse_base(base_url)?,
            follow_nearby,
            selectors: Arc::new(SchoolSelectors::new()?),
        })
    }
}

impl Site for SchoolsSite {
    fn name(&self) -> &str {
        "schools"
    }

    fn url(&self, query: &Query) -> Result<Url, ScrapeError> {
        let gid = query.require("GID")?;
        if !gid.starts_with('/') {
            return Err(ScrapeError::QueryUrl {
                query: query.key(),
                reason: format!("GID '{}' is not a site path", gid),
            });
        }
        Ok(self.base.join(gid)?)
    }

    fn page(&self, query: &Query) -> Box<dyn Page> {
        Box::new(SchoolsPage {
            query: query.clone(),
            base: self.base.clone(),
            follow_nearby: self.follow_nearby,
            crawled: false,
            selectors: Arc::clone(&self.selectors),
            html: None,
            url: None,
        })
    }
}

struct SchoolsPage {
    query: Query,
    base: Url,
    follow_nearby: bool,
    crawled: bool,
    selectors: Arc<SchoolSelectors>,
    html: Option<Html>,
    url: Option<Url>,
}

impl SchoolsPage {
    fn location(&self, root: ElementRef<'_>) -> Record {
        let s = &self.selectors;
        let mut record = Record::new();
        put(&mut record, "address", s.address.first(root));
        put(&mut record, "district", s.district.first(root));
        put(
            &mut record,
            "districtlink",
            s.district_link
                .first(root)
                .and_then(|href| absolute(&self.base, &href))
                .map(|url| url.to_string()),
        );
        record
    }

    fn schools(&self, root: ElementRef<'_>) -> Record {
        let mut record = Record::new();
        put(&mut record, "schoolname", self.selectors.name.first(root));
        put(&mut record, "schooltype", self.info("Type", root));
        put(
            &mut record,
            "grades",
            self.info("Grades", root).and_then(|g| parsers::grades(&g)),
        );
        record
    }

    fn scores(&self, root: ElementRef<'_>) -> Record {
        let s = &self.selectors;
        let mut record = Record::new();
        put(&mut record, "overallscore", s.overall.first(root));
        put(&mut record, "academicscore", s.academic.first(root));
        put(&mut record, "testscore", s.test.first(root));
        record
    }

    fn college(&self, root: ElementRef<'_>) -> Record {
        let scores = self.scored(&self.selectors.college, root);
        let mut record = Record::new();
        for (name, needle) in [
            ("graduation", "graduation rate"),
            ("SAT11", "SAT 11th"),
            ("SAT12", "SAT 12th"),
            ("ACT", "ACT college readiness rate"),
        ] {
            put(&mut record, name, lookup(&scores, needle));
        }
        record
    }

    fn teachers(&self, root: ElementRef<'_>) -> Record {
        let s = &self.selectors;
        let scores = self.scored(&s.teachers, root);

        let students_per_teacher = root
            .select(&s.staff_rows)
            .find(|row| {
                row.select(&s.label)
                    .any(|label| normalize_text(label.text()).contains("Students per teacher"))
            })
            .and_then(|row| row.select(&s.staff_value).next())
            .and_then(|value| parsers::ratio(&normalize_text(value.text())));

        let mut record = Record::new();
        put(&mut record, "experience", lookup(&scores, "experience"));
        put(&mut record, "studentteachers", students_per_teacher);
        record
    }

    fn testing(&self, root: ElementRef<'_>) -> Record {
        self.scored(&self.selectors.test_scores, root)
            .into_iter()
            .collect()
    }

    fn demographics(&self, root: ElementRef<'_>) -> Record {
        let s = &self.selectors;
        let shares: Vec<(String, u32)> = root
            .select(&s.races)
            .filter_map(|legend| {
                let mut titles = legend.select(&s.legend_title);
                let race = normalize_text(titles.next()?.text());
                let share = parsers::percent(&normalize_text(titles.next()?.text()))?;
                Some((race, share.parse().ok()?))
            })
            .filter(|(race, _)| RACES.contains(&race.as_str()))
            .collect();

        let mut record = Record::new();
        if !shares.is_empty() {
            let total: u32 = shares.iter().map(|(_, share)| share).sum();
            for (race, share) in shares {
                record.insert(race, share.to_string());
            }
            record.insert("Other".to_string(), 100u32.saturating_sub(total).to_string());
        }
        put(&mut record, "lowincome", s.low_income.first(root));
        put(&mut record, "noenglish", s.no_english.first(root));
        record
    }

    /// Value column of a school-info item by its label
    fn info(&self, label: &str, root: ElementRef<'_>) -> Option<String> {
        let s = &self.selectors;
        root.select(&s.info_items)
            .find(|item| {
                item.select(&s.label)
                    .next()
                    .is_some_and(|l| normalize_text(l.text()) == label)
            })
            .and_then(|item| {
                item.children()
                    .filter_map(ElementRef::wrap)
                    .filter(|child| child.value().name() == "div")
                    .nth(1)
            })
            .map(|value| normalize_text(value.text()))
            .filter(|value| !value.is_empty())
    }

    /// `(subject, percent)` pairs from score containers
    fn scored(&self, containers: &Selector, root: ElementRef<'_>) -> Vec<(String, String)> {
        let s = &self.selectors;
        root.select(containers)
            .filter_map(|container| {
                let subject = normalize_text(container.select(&s.subject).next()?.text());
                let score = parsers::percent(&normalize_text(container.select(&s.score).next()?.text()))?;
                (!subject.is_empty()).then_some((subject, score))
            })
            .collect()
    }
}

fn put(record: &mut Record, name: &str, value: Option<String>) {
    if let Some(value) = value {
        record.insert(name.to_string(), value);
    }
}

fn lookup(scores: &[(String, String)], needle: &str) -> Option<String> {
    scores
        .iter()
        .find(|(subject, _)| subject.contains(needle))
        .map(|(_, score)| score.clone())
}

impl Page for SchoolsPage {
    fn load(&mut self, document: Document) -> Result<(), PageError> {
        let html = Html::parse_document(&document.body);
        self.selectors.conditions.check(&html, document.url.as_str())?;

        self.html = Some(html);
        self.url = Some(document.url);
        Ok(())
    }

    fn execute(&self) -> Result<Extraction<'_>, PageError> {
        let root = loaded(&self.html, &self.url)?.root_element();

        let sections = SECTIONS.iter().filter_map(move |(dataset, read)| {
            let record = read(self, root);
            (!record.is_empty()).then(|| Ok(Extracted::new(self.query.clone(), dataset, record)))
        });

        Ok(Box::new(sections))
    }

    fn crawl(&mut self, queue: &mut Queue) -> Result<Continuation, PageError> {
        if !self.follow_nearby || self.crawled {
            return Ok(Continuation::Done);
        }
        self.crawled = true;

        let html = loaded(&self.html, &self.url)?;
        let mut pushed = 0;
        for href in html
            .select(&self.selectors.nearby)
            .filter_map(|a| a.value().attr("href"))
        {
            if let Some(gid) = gid(&self.base, href) {
                if queue.push(Query::single("GID", gid)) {
                    pushed += 1;
                }
            }
        }

        if pushed > 0 {
            tracing::debug!("Queued {} nearby schools from {}", pushed, self.query);
        }
        Ok(Continuation::Done)
    }
}
