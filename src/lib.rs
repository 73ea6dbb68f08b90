//! # kinship-kernel
//!
//! Deterministic kinship resolution for versioned family graphs.
//!
//! The kernel answers one question:
//!
//! > Given two people, what is the second to the first?
//!
//! ## Core Contract
//!
//! 1. Find every shortest path between the two people through a common
//!    ancestor or, failing that, a partnership between their ancestors
//! 2. Classify each path into a [`RelationshipDescriptor`] (degree, removal,
//!    direction, half/step/adoptive modifiers and a label key)
//! 3. Rank the paths and return one canonical descriptor plus alternates
//!
//! ## Architecture
//!
//! ```text
//! (A, B) → RelationshipEngine → RelationshipCache ─hit─→ Relationship
//!                 ↓ miss
//!            PathFinder → classify → resolve
//!                 ↓
//!          FamilyStore (Postgres or Memory) → FamilyGraph snapshot
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same pair + same policy + same graph version → identical relationship
//! - `(A, B)` and `(B, A)` are exact inverses
//! - Alternates and common ancestors are in canonical order

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod policy;
pub mod store;
pub mod canonical;
pub mod finder;
pub mod classifier;
pub mod resolver;
pub mod cache;
pub mod engine;
pub mod batch;
pub mod lineage;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use types::{
    AbortReason, Apex, CancelToken, Deadline, Direction, GraphVersion, KinshipError, LabelKey,
    LegProvenance, Modifier, ParentEdge, ParentKind, PartnershipEdge, PartnershipKind, PersonId,
    PersonPair, Relationship, RelationshipDescriptor, RelationshipPath,
};
pub use policy::KinshipPolicyV1;
pub use store::{FamilyGraph, FamilyRecords, FamilySnapshot, FamilyStore, InMemoryFamilyStore, Mutation};
#[cfg(feature = "postgres")]
pub use store::{PostgresConfig, PostgresFamilyStore};
pub use canonical::{to_canonical_bytes, canonical_hash, canonical_hash_hex};
pub use finder::{AncestorMap, PathFinder};
pub use classifier::classify;
pub use cache::{CacheConfig, CacheStats, RelationshipCache};
pub use engine::RelationshipEngine;
pub use batch::BatchRelationships;
pub use lineage::FamilyGroup;

// Service re-exports (when service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, ServiceState, PolicyRef};

/// Schema version for all serialized kernel types.
/// Increment on breaking changes to any schema type.
pub const KINSHIP_KERNEL_SCHEMA_VERSION: &str = "1.0.0";

/// Default policy version identifier.
pub const DEFAULT_POLICY_VERSION: &str = "kinship_policy_v1";
