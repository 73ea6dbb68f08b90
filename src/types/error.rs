//! Error taxonomy for relationship resolution.
//!
//! `Unrelated` is deliberately absent: two people with no path between them
//! is an ordinary [`Relationship`](super::Relationship) value.

use serde::{Deserialize, Serialize};
use super::person::PersonId;

/// Why a computation stopped before producing an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The caller-supplied deadline elapsed.
    DeadlineElapsed,
    /// The caller's cancel token fired.
    Cancelled,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeadlineElapsed => write!(f, "deadline elapsed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Error type for engine operations.
///
/// `Clone` so a single in-flight computation can hand the same failure to
/// every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KinshipError {
    /// The identifier is unknown at the observed graph version.
    #[error("Person not found: {0}")]
    PersonNotFound(PersonId),
    /// Deadline or cancellation stopped the computation. Never cached.
    #[error("Computation aborted: {0}")]
    ComputationAborted(AbortReason),
    /// The upstream graph is malformed (e.g. a biological cycle).
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    /// Backend failure.
    #[error("Store error: {0}")]
    StoreError(String),
}

impl KinshipError {
    /// Create a store error from any error type.
    pub fn from_store<E: std::error::Error>(e: E) -> Self {
        Self::StoreError(e.to_string())
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ComputationAborted(_) | Self::StoreError(_))
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PersonNotFound(_) => "PERSON_NOT_FOUND",
            Self::ComputationAborted(_) => "COMPUTATION_ABORTED",
            Self::InvariantViolation(_) => "INVARIANT_VIOLATION",
            Self::StoreError(_) => "STORE_ERROR",
        }
    }
}
