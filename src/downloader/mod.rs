//! Downloader module: the request-queue and session-recovery core
//!
//! This module contains:
//! - The query queue with lifecycle bookkeeping
//! - The rate delayer
//! - The session adapter and its reqwest implementation
//! - The page/site contract used by site extractors
//! - The per-query state machine that ties them together

mod delay;
mod page;
mod queue;
mod runner;
mod session;

pub use delay::Delayer;
pub use page::{
    Continuation, Document, ErrorKind, Extracted, Extraction, Page, PageError, Site,
};
pub use queue::{Queue, QueueEntry, QueueSummary, Ticket};
pub use runner::{Downloader, ResultSink, RunOutcome, RunReport, Yielded};
pub use session::{build_http_client, HttpSession, Session};
