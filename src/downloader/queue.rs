//! Query queue with lifecycle bookkeeping
//!
//! The queue owns every query it has ever been given in an arena of entries;
//! the pending list only holds indices into that arena. Continuations found
//! while crawling append to the same pending list, and keys already known to
//! the arena are rejected, so every run terminates.

use crate::query::Query;
use crate::state::QueryState;
use std::collections::{HashMap, VecDeque};

/// A query handed out by [`Queue::pop`]
///
/// The ticket must be handed back through exactly one outcome call
/// (`success`, `failure`, `abandon`, `error` or `requeue`); each of those
/// consumes it.
#[derive(Debug)]
pub struct Ticket {
    index: usize,
    query: Query,
    attempt: u32,
}

impl Ticket {
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// 1-based number of this dequeue for the query
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Bookkeeping for one query
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub query: Query,
    pub state: QueryState,
    pub attempts: u32,
}

/// Counts of queries per state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueSummary {
    pub total: usize,
    pub pending: usize,
    pub in_flight: usize,
    pub success: usize,
    pub failure: usize,
    pub abandoned: usize,
    pub error: usize,
}

/// Sequential holder of pending queries with abandon-on-close semantics
#[derive(Debug)]
pub struct Queue {
    entries: Vec<QueueEntry>,
    pending: VecDeque<usize>,
    index: HashMap<String, usize>,
    max_attempts: u32,
    closed: bool,
}

impl Queue {
    /// Creates a queue that yields queries in declaration order
    ///
    /// Later duplicates of a key are dropped. `max_attempts` bounds how many
    /// times a transiently failing query is dequeued.
    pub fn new(queries: Vec<Query>, max_attempts: u32) -> Self {
        let mut queue = Self {
            entries: Vec::with_capacity(queries.len()),
            pending: VecDeque::with_capacity(queries.len()),
            index: HashMap::with_capacity(queries.len()),
            max_attempts: max_attempts.max(1),
            closed: false,
        };

        for query in queries {
            queue.push(query);
        }

        queue
    }

    /// Adds a query to the back of the pending list
    ///
    /// Returns false if the queue is closed or the key has been seen before.
    pub fn push(&mut self, query: Query) -> bool {
        if self.closed {
            tracing::debug!("Queue closed, dropping {}", query);
            return false;
        }

        let key = query.key();
        if self.index.contains_key(&key) {
            tracing::trace!("Query {} already queued", key);
            return false;
        }

        let index = self.entries.len();
        self.entries.push(QueueEntry {
            query,
            state: QueryState::Pending,
            attempts: 0,
        });
        self.index.insert(key, index);
        self.pending.push_back(index);
        true
    }

    /// Takes the next pending query
    pub fn pop(&mut self) -> Option<Ticket> {
        if self.closed {
            return None;
        }

        let index = self.pending.pop_front()?;
        let entry = &mut self.entries[index];
        entry.state = QueryState::InFlight;
        entry.attempts += 1;

        Some(Ticket {
            index,
            query: entry.query.clone(),
            attempt: entry.attempts,
        })
    }

    /// Puts an in-flight query back at the end of the pending list
    pub fn requeue(&mut self, ticket: Ticket) {
        self.settle(ticket.index, QueryState::Pending);
        self.pending.push_back(ticket.index);
    }

    pub fn success(&mut self, ticket: Ticket) {
        self.settle(ticket.index, QueryState::Success);
    }

    /// Records a transient failure
    ///
    /// The query is requeued while attempts remain; returns true in that case.
    pub fn failure(&mut self, ticket: Ticket) -> bool {
        if ticket.attempt < self.max_attempts {
            tracing::debug!(
                "Requeueing {} after attempt {}/{}",
                ticket.query,
                ticket.attempt,
                self.max_attempts
            );
            self.requeue(ticket);
            true
        } else {
            self.settle(ticket.index, QueryState::Failure);
            false
        }
    }

    pub fn abandon(&mut self, ticket: Ticket) {
        self.settle(ticket.index, QueryState::Abandoned);
    }

    pub fn error(&mut self, ticket: Ticket) {
        self.settle(ticket.index, QueryState::Error);
    }

    fn settle(&mut self, index: usize, state: QueryState) {
        let entry = &mut self.entries[index];
        debug_assert!(
            entry.state.can_transition_to(state),
            "invalid transition {} -> {}",
            entry.state,
            state
        );
        entry.state = state;
    }

    /// Reopens the queue for iteration
    pub fn open(&mut self) {
        self.closed = false;
    }

    /// Closes the queue, abandoning every query that is still active
    pub fn close(&mut self) -> QueueSummary {
        self.pending.clear();

        let mut abandoned = 0;
        for entry in self.entries.iter_mut().filter(|e| e.state.is_active()) {
            entry.state = QueryState::Abandoned;
            abandoned += 1;
        }

        if abandoned > 0 {
            tracing::info!("Queue closed with {} queries abandoned", abandoned);
        }

        self.closed = true;
        self.summary()
    }

    pub fn summary(&self) -> QueueSummary {
        let mut summary = QueueSummary {
            total: self.entries.len(),
            ..QueueSummary::default()
        };

        for entry in &self.entries {
            match entry.state {
                QueryState::Pending => summary.pending += 1,
                QueryState::InFlight => summary.in_flight += 1,
                QueryState::Success => summary.success += 1,
                QueryState::Failure => summary.failure += 1,
                QueryState::Abandoned => summary.abandoned += 1,
                QueryState::Error => summary.error += 1,
            }
        }

        summary
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    /// Looks up the bookkeeping entry for a query
    pub fn entry(&self, query: &Query) -> Option<&QueueEntry> {
        self.index.get(&query.key()).map(|&i| &self.entries[i])
    }

    /// Number of queries waiting to be dequeued
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of queries the queue has ever held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
