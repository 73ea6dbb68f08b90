//! Person identity and graph versioning.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use std::fmt;

/// Unique identifier for a person in the family graph.
///
/// Wraps a UUID and implements `Ord` for deterministic ordering.
/// No other person attribute is needed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PersonId(Uuid);

impl PersonId {
    /// Create a new PersonId from a UUID.
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Create a new PersonId from a UUID string.
    pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Create a PersonId from a raw 128-bit value.
    pub fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Generate a new random PersonId.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for PersonId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Monotonic version of the family graph.
///
/// Every mutation (add/remove person or edge) publishes a strictly greater
/// version. A snapshot is immutable for the lifetime of its version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphVersion(u64);

impl GraphVersion {
    /// The version of an empty graph.
    pub const INITIAL: GraphVersion = GraphVersion(0);

    /// Create a version from a raw counter value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw counter value.
    pub fn get(&self) -> u64 {
        self.0
    }

    /// The version published by the next mutation.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for GraphVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Unordered pair of people, normalized so `lo <= hi`.
///
/// The cache keys relationships by this pair; the relationship for
/// `(hi, lo)` is the inverse of the stored `(lo, hi)` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PersonPair {
    lo: PersonId,
    hi: PersonId,
}

impl PersonPair {
    /// Normalize two people into an unordered pair.
    pub fn new(a: PersonId, b: PersonId) -> Self {
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    /// Lower identifier of the pair.
    pub fn lo(&self) -> PersonId {
        self.lo
    }

    /// Higher identifier of the pair.
    pub fn hi(&self) -> PersonId {
        self.hi
    }

    /// Whether `(a, b)` is the reverse of this pair's canonical orientation.
    pub fn is_flipped(a: PersonId, b: PersonId) -> bool {
        a > b
    }
}
