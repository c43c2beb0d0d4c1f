/// Query lifecycle states
///
/// This module defines every state a query can occupy while it moves through
/// the queue.
use std::fmt;

/// Represents the current state of a query in the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryState {
    // ===== Active States =====
    /// Query is waiting to be dequeued
    Pending,

    /// Query has been dequeued and is being processed
    InFlight,

    // ===== Terminal Success States =====
    /// Query resolved; the site's own "no results" also lands here
    Success,

    // ===== Terminal Skip States =====
    /// Query was dropped without a trusted result (blocking, shutdown, queue close)
    Abandoned,

    // ===== Terminal Error States =====
    /// Query failed transiently and exhausted its attempts
    Failure,

    /// Query hit an unexpected error that stopped the run
    Error,
}

impl QueryState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::InFlight)
    }

    /// Returns true if this is an active state (query may still be processed)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::InFlight)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if this represents an error state
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure | Self::Error)
    }

    /// Checks whether the queue may move a query from `self` to `next`
    ///
    /// A query in flight may return to pending when it is requeued. Pending
    /// queries may only be abandoned directly (queue close).
    pub fn can_transition_to(&self, next: QueryState) -> bool {
        match (self, next) {
            (Self::Pending, Self::InFlight) | (Self::Pending, Self::Abandoned) => true,
            (Self::InFlight, next) => next != Self::InFlight,
            _ => false,
        }
    }

    /// Converts the query state to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Success => "success",
            Self::Abandoned => "abandoned",
            Self::Failure => "failure",
            Self::Error => "error",
        }
    }

    /// Parses a query state from a database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_flight" => Some(Self::InFlight),
            "success" => Some(Self::Success),
            "abandoned" => Some(Self::Abandoned),
            "failure" => Some(Self::Failure),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Returns all possible query states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::InFlight,
            Self::Success,
            Self::Abandoned,
            Self::Failure,
            Self::Error,
        ]
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
