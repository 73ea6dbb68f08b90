//! In-memory copy-on-write family store.
//!
//! Writers edit a private copy of the records, build a new snapshot at the
//! next version, and publish it by swapping an `Arc`. Readers clone the
//! current `Arc` and never block on writers for longer than that clone.

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::types::{GraphVersion, KinshipError, ParentEdge, PartnershipEdge, PersonId};
use super::snapshot::{FamilyRecords, FamilySnapshot};
use super::{FamilyGraph, FamilyStore};

/// Batched mutation applied by [`InMemoryFamilyStore::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Add a person.
    AddPerson(PersonId),
    /// Remove a person and every edge touching them.
    RemovePerson(PersonId),
    /// Add a parent edge.
    AddParent(ParentEdge),
    /// Remove a parent edge.
    RemoveParent(ParentEdge),
    /// Add a partnership.
    AddPartnership(PartnershipEdge),
    /// Remove a partnership.
    RemovePartnership(PartnershipEdge),
}

impl Mutation {
    /// Apply to `records`, returning whether anything changed.
    fn apply_to(&self, records: &mut FamilyRecords) -> Result<bool, KinshipError> {
        match self {
            Self::AddPerson(p) => Ok(records.people.insert(*p)),
            Self::RemovePerson(p) => {
                if records.remove_person(*p) {
                    Ok(true)
                } else {
                    Err(KinshipError::PersonNotFound(*p))
                }
            }
            Self::AddParent(e) => Ok(records.parent_edges.insert(*e)),
            Self::RemoveParent(e) => Ok(records.parent_edges.remove(e)),
            Self::AddPartnership(e) => Ok(records.partnerships.insert(*e)),
            Self::RemovePartnership(e) => Ok(records.partnerships.remove(e)),
        }
    }
}

/// In-memory family store.
///
/// Suitable for tests, embedding, and graphs loaded wholesale at start-up.
#[derive(Debug)]
pub struct InMemoryFamilyStore {
    /// Writer-side records; the lock serializes mutations.
    records: Mutex<FamilyRecords>,
    /// Currently published snapshot.
    published: RwLock<Arc<FamilySnapshot>>,
}

impl Default for InMemoryFamilyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFamilyStore {
    /// Create a new empty store at the initial version.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(FamilyRecords::default()),
            published: RwLock::new(Arc::new(FamilySnapshot::empty())),
        }
    }

    /// Create a store seeded with `records`, published at version 1.
    pub fn from_records(records: FamilyRecords) -> Result<Self, KinshipError> {
        let snapshot = FamilySnapshot::build(&records, GraphVersion::INITIAL.next())?;
        Ok(Self {
            records: Mutex::new(records),
            published: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// The currently published snapshot.
    pub fn current(&self) -> Arc<FamilySnapshot> {
        Arc::clone(&self.published.read())
    }

    /// Copy of the current records.
    pub fn records(&self) -> FamilyRecords {
        self.records.lock().clone()
    }

    /// Add a person.
    pub fn add_person(&self, person: PersonId) -> Result<GraphVersion, KinshipError> {
        self.apply(&[Mutation::AddPerson(person)])
    }

    /// Remove a person and every edge touching them.
    pub fn remove_person(&self, person: PersonId) -> Result<GraphVersion, KinshipError> {
        self.apply(&[Mutation::RemovePerson(person)])
    }

    /// Add a parent edge. Both people must already exist.
    pub fn add_parent_edge(&self, edge: ParentEdge) -> Result<GraphVersion, KinshipError> {
        self.apply(&[Mutation::AddParent(edge)])
    }

    /// Remove a parent edge.
    pub fn remove_parent_edge(&self, edge: ParentEdge) -> Result<GraphVersion, KinshipError> {
        self.apply(&[Mutation::RemoveParent(edge)])
    }

    /// Add a partnership. Both people must already exist.
    pub fn add_partnership(&self, edge: PartnershipEdge) -> Result<GraphVersion, KinshipError> {
        self.apply(&[Mutation::AddPartnership(edge)])
    }

    /// Remove a partnership.
    pub fn remove_partnership(&self, edge: PartnershipEdge) -> Result<GraphVersion, KinshipError> {
        self.apply(&[Mutation::RemovePartnership(edge)])
    }

    /// Apply a batch of mutations atomically.
    ///
    /// Publishes one new version if anything changed. If any mutation fails,
    /// or the resulting graph violates an invariant, nothing is published and
    /// the error is returned. A batch that changes nothing returns the
    /// current version.
    pub fn apply(&self, mutations: &[Mutation]) -> Result<GraphVersion, KinshipError> {
        let mut records = self.records.lock();
        let mut next = records.clone();

        let mut changed = false;
        for mutation in mutations {
            changed |= mutation.apply_to(&mut next)?;
        }

        let current = self.published.read().version();
        if !changed {
            return Ok(current);
        }

        let version = current.next();
        let snapshot = match FamilySnapshot::build(&next, version) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    version = %current,
                    mutations = mutations.len(),
                    error = %e,
                    "Rejected family graph mutation"
                );
                return Err(e);
            }
        };

        tracing::info!(
            version = %version,
            people = snapshot.person_count(),
            edges = snapshot.edge_count(),
            fingerprint = snapshot.fingerprint(),
            "Published family graph snapshot"
        );

        *records = next;
        *self.published.write() = Arc::new(snapshot);
        Ok(version)
    }
}

#[async_trait]
impl FamilyStore for InMemoryFamilyStore {
    type Error = Infallible;
    type Graph = FamilySnapshot;

    async fn current_version(&self) -> Result<GraphVersion, Self::Error> {
        Ok(self.published.read().version())
    }

    async fn snapshot(&self) -> Result<Arc<FamilySnapshot>, Self::Error> {
        Ok(self.current())
    }
}
