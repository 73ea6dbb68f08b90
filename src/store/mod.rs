//! Family graph storage backends.
//!
//! A [`FamilyStore`] hands out immutable [`FamilyGraph`] views. Each view
//! observes exactly one [`GraphVersion`]; the engine takes one view per
//! request and never mixes versions inside a computation.

pub mod snapshot;
pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use crate::types::{GraphVersion, KinshipError, ParentEdge, PartnershipEdge, PersonId};

/// Read-only view of the family graph at one version.
///
/// Adjacency lists are returned in sorted order. Unknown people have empty
/// adjacency; use [`FamilyGraph::require`] where absence is an error.
pub trait FamilyGraph: Send + Sync {
    /// Version this view observes.
    fn version(&self) -> GraphVersion;

    /// Whether the person exists at this version.
    fn contains(&self, person: PersonId) -> bool;

    /// Edges from `person` up to each recorded parent.
    fn parents_of(&self, person: PersonId) -> &[ParentEdge];

    /// Edges from each recorded child up to `person`.
    fn children_of(&self, person: PersonId) -> &[ParentEdge];

    /// Partnerships `person` takes part in.
    fn partners_of(&self, person: PersonId) -> &[PartnershipEdge];

    /// Number of people at this version.
    fn person_count(&self) -> usize;

    /// Fail with `PersonNotFound` if `person` is unknown at this version.
    fn require(&self, person: PersonId) -> Result<(), KinshipError> {
        if self.contains(person) {
            Ok(())
        } else {
            Err(KinshipError::PersonNotFound(person))
        }
    }
}

/// Trait for family graph backends.
///
/// All methods are async to support async database access.
#[async_trait]
pub trait FamilyStore: Send + Sync + 'static {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Graph view handed out by [`FamilyStore::snapshot`].
    type Graph: FamilyGraph + 'static;

    /// Latest published version.
    async fn current_version(&self) -> Result<GraphVersion, Self::Error>;

    /// A consistent view at the latest published version.
    async fn snapshot(&self) -> Result<Arc<Self::Graph>, Self::Error>;
}

pub use snapshot::{FamilyRecords, FamilySnapshot};
pub use memory::{InMemoryFamilyStore, Mutation};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresConfig, PostgresError, PostgresFamilyStore};
