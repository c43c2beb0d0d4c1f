//! Downloader - the per-query state machine
//!
//! For every dequeued query the downloader:
//! - Makes sure the network identity is usable (VPN ready) and the session alive
//! - Builds the URL, waits out the rate delay and loads the page
//! - Runs setup and extraction, streaming datasets to a [`ResultSink`]
//! - Follows crawl continuations within the same cycle
//! - Settles the query with exactly one outcome

use crate::downloader::delay::Delayer;
use crate::downloader::page::{Continuation, ErrorKind, Extracted, Page, PageError, Site};
use crate::downloader::queue::{Queue, QueueSummary, Ticket};
use crate::downloader::session::Session;
use crate::query::{Dataset, Query};
use crate::vpn::VpnRotator;
use crate::ScrapeError;
use std::time::{Duration, Instant};
use url::Url;

/// Upper bound on continuation steps within a single cycle
const MAX_CONTINUATIONS: usize = 1000;

/// One flushed dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Yielded {
    /// Dequeue cycle that produced the dataset, increasing within a run
    pub cycle: u64,
    pub query: Query,
    pub dataset: Dataset,
}

/// Consumer of the datasets a run produces
pub trait ResultSink {
    fn accept(&mut self, yielded: Yielded) -> Result<(), ScrapeError>;
}

impl ResultSink for Vec<Yielded> {
    fn accept(&mut self, yielded: Yielded) -> Result<(), ScrapeError> {
        self.push(yielded);
        Ok(())
    }
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The queue drained
    Completed,
    /// The network identity was exhausted; remaining queries were abandoned
    Terminated,
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub summary: QueueSummary,
    /// Datasets handed to the sink
    pub yielded: usize,
    /// Dequeue cycles executed
    pub cycles: u64,
    pub elapsed: Duration,
}

/// Sequential orchestrator tying queue, session, VPN and site together
pub struct Downloader {
    site: Box<dyn Site>,
    session: Box<dyn Session>,
    queue: Queue,
    delayer: Delayer,
    vpn: VpnRotator,
    referer: Option<String>,
    cycle: u64,
    yielded: usize,
}

impl Downloader {
    pub fn new(
        site: Box<dyn Site>,
        session: Box<dyn Session>,
        queue: Queue,
        delayer: Delayer,
        vpn: VpnRotator,
    ) -> Self {
        Self {
            site,
            session,
            queue,
            delayer,
            vpn,
            referer: None,
            cycle: 0,
            yielded: 0,
        }
    }

    /// Sends `referer` with every page load
    pub fn with_referer(mut self, referer: Option<String>) -> Self {
        self.referer = referer;
        self
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn vpn(&self) -> &VpnRotator {
        &self.vpn
    }

    /// Gives back the VPN rotator so its task can be shut down
    pub fn into_vpn(self) -> VpnRotator {
        self.vpn
    }

    /// Drains the queue, streaming results to `sink`
    ///
    /// Returns the run report on completion or network exhaustion. A fatal
    /// error closes the queue and is returned; anything the sink already
    /// accepted stays accepted.
    pub async fn run(&mut self, sink: &mut dyn ResultSink) -> Result<RunReport, ScrapeError> {
        let start = Instant::now();
        tracing::info!(
            "Starting {} run with {} queries",
            self.site.name(),
            self.queue.pending_len()
        );

        self.queue.open();
        let result = self.drain(sink).await;
        let summary = self.queue.close();

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    "{} run stopped after {} cycles: {}",
                    self.site.name(),
                    self.cycle,
                    e
                );
                return Err(e);
            }
        };

        let elapsed = start.elapsed();
        tracing::info!(
            "{} run {:?} in {:.1}s: {} succeeded, {} failed, {} abandoned, {} datasets",
            self.site.name(),
            outcome,
            elapsed.as_secs_f64(),
            summary.success,
            summary.failure,
            summary.abandoned,
            self.yielded
        );

        Ok(RunReport {
            outcome,
            summary,
            yielded: self.yielded,
            cycles: self.cycle,
            elapsed,
        })
    }

    async fn drain(&mut self, sink: &mut dyn ResultSink) -> Result<RunOutcome, ScrapeError> {
        while let Some(ticket) = self.queue.pop() {
            self.cycle += 1;

            if self.vpn.is_terminated() {
                tracing::warn!("VPN terminated, abandoning {}", ticket.query());
                self.queue.abandon(ticket);
                return Ok(RunOutcome::Terminated);
            }

            if !self.vpn.is_ready() {
                tracing::info!("Waiting for VPN before {}", ticket.query());
                if !self.vpn.wait().await {
                    tracing::warn!("VPN unavailable, abandoning {}", ticket.query());
                    self.queue.abandon(ticket);
                    return Ok(RunOutcome::Terminated);
                }
            }

            if !self.session.is_alive() {
                tracing::info!("Session is not usable, resetting");
                if let Err(e) = self.session.reset().await {
                    self.queue.error(ticket);
                    return Err(e);
                }
            }

            let error = match self.process(&ticket, sink).await {
                Ok(()) => {
                    self.queue.success(ticket);
                    continue;
                }
                Err(error) => error,
            };

            match error.kind() {
                ErrorKind::Blocked => {
                    tracing::warn!("{}; abandoning {}", error, ticket.query());
                    self.session.trip();
                    self.vpn.trip();
                    self.queue.abandon(ticket);
                }
                ErrorKind::NoResults => {
                    tracing::info!("No results for {}", ticket.query());
                    if let Err(e) = self.emit(sink, ticket.query().clone(), Dataset::empty()) {
                        self.queue.error(ticket);
                        return Err(e);
                    }
                    self.queue.success(ticket);
                }
                ErrorKind::Transient => {
                    tracing::warn!(
                        "{} (attempt {} for {})",
                        error,
                        ticket.attempt(),
                        ticket.query()
                    );
                    if !self.queue.failure(ticket) {
                        tracing::warn!("Giving up after repeated failures");
                    }
                }
                ErrorKind::Fatal => {
                    self.queue.error(ticket);
                    return Err(error.into_fatal());
                }
            }
        }

        Ok(RunOutcome::Completed)
    }

    /// One full cycle for a dequeued query
    async fn process(&mut self, ticket: &Ticket, sink: &mut dyn ResultSink) -> Result<(), PageError> {
        let query = ticket.query();
        let url = self.site.url(query)?;
        tracing::debug!("Loading {} (attempt {})", url, ticket.attempt());

        let mut page = self.site.page(query);
        self.navigate(page.as_mut(), &url).await?;
        let mut flushed = self.extract(page.as_mut(), sink)?;

        let mut steps = 0;
        loop {
            match page.crawl(&mut self.queue)? {
                Continuation::Done => break,
                Continuation::Again => {}
                Continuation::Follow(next) => {
                    tracing::debug!("Following {}", next);
                    self.navigate(page.as_mut(), &next).await?;
                }
            }

            flushed += self.extract(page.as_mut(), sink)?;

            steps += 1;
            if steps >= MAX_CONTINUATIONS {
                tracing::warn!("Stopping continuations for {} after {} steps", query, steps);
                break;
            }
        }

        if flushed == 0 {
            self.emit(sink, query.clone(), Dataset::empty())?;
        }

        Ok(())
    }

    async fn navigate(&mut self, page: &mut dyn Page, url: &Url) -> Result<(), PageError> {
        self.delayer.wait().await;
        let document = self.session.load(url, self.referer.as_deref()).await?;
        page.load(document)
    }

    /// Runs setup and execute, flushing one dataset per run of equal queries
    fn extract(&mut self, page: &mut dyn Page, sink: &mut dyn ResultSink) -> Result<usize, PageError> {
        page.setup()?;

        let mut flushed = 0;
        let mut current: Option<(Query, Dataset)> = None;

        for item in page.execute()? {
            let Extracted {
                query,
                dataset,
                record,
            } = item?;

            let same = matches!(&current, Some((q, _)) if *q == query);
            if !same {
                if let Some((q, d)) = current.take() {
                    self.emit(sink, q, d)?;
                    flushed += 1;
                }
                current = Some((query, Dataset::empty()));
            }

            if let Some((q, d)) = current.as_mut() {
                d.insert(q, &dataset, record);
            }
        }

        if let Some((q, d)) = current {
            self.emit(sink, q, d)?;
            flushed += 1;
        }

        Ok(flushed)
    }

    fn emit(&mut self, sink: &mut dyn ResultSink, query: Query, dataset: Dataset) -> Result<(), ScrapeError> {
        tracing::debug!("Yielding {} records for {}", dataset.len(), query);
        sink.accept(Yielded {
            cycle: self.cycle,
            query,
            dataset,
        })?;
        self.yielded += 1;
        Ok(())
    }
}
