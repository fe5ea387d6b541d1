//! Error types for the reactive graph.
//!
//! Every failure in this crate is a programmer error: the graph is local,
//! synchronous and deterministic, so there is nothing to retry. Errors are
//! returned rather than swallowed so that bookkeeping bugs surface at the
//! call site that caused them.

use thiserror::Error;

/// Errors raised by registration, teardown and collection mutation.
#[derive(Error, Debug)]
pub enum ReactiveError {
    /// A node was unregistered from a source that does not hold it, or a
    /// derived value was torn down while already cold.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A range sink was registered on a collection whose items are
    /// themselves reactive collections.
    #[error("reactive collections cannot be nested (item type `{element}`)")]
    NestedCollection { element: &'static str },

    /// `remove_range` exceeded the collection bounds under
    /// [`RangePolicy::Reject`](crate::config::RangePolicy::Reject).
    #[error("range {start}..{start}+{count} is out of bounds for length {len}")]
    RangeOutOfBounds {
        start: usize,
        count: usize,
        len: usize,
    },

    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl ReactiveError {
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ReactiveError>;
