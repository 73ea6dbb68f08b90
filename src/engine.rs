//! Relationship engine: snapshot, cache, search, classify.
//!
//! ## Contract
//!
//! 1. Take one snapshot of the family graph per request
//! 2. Answer `SELF` and unknown people without searching
//! 3. Probe the cache for the normalized pair at the snapshot's version
//! 4. On a miss, search, classify and rank in the pair's `(lo, hi)`
//!    orientation, cache the result, and invert it for flipped requests

use std::borrow::Cow;
use std::sync::Arc;

use crate::cache::{CacheKey, CacheStats, RelationshipCache};
use crate::canonical::canonical_hash;
use crate::finder::{AncestorMap, PathFinder, Search};
use crate::policy::KinshipPolicyV1;
use crate::resolver::resolve_meeting;
use crate::store::{FamilyGraph, FamilyStore};
use crate::types::{Deadline, GraphVersion, KinshipError, PersonId, PersonPair, Relationship};

/// Computes relationships between people in a family graph.
///
/// The cache is an explicit collaborator: construct one per deployment and
/// share it by `Arc` between engines that should share results.
pub struct RelationshipEngine<S: FamilyStore> {
    store: Arc<S>,
    cache: Arc<RelationshipCache>,
    policy: KinshipPolicyV1,
    policy_hash: u64,
}

impl<S: FamilyStore> RelationshipEngine<S> {
    /// Create an engine.
    pub fn new(store: Arc<S>, cache: Arc<RelationshipCache>, policy: KinshipPolicyV1) -> Self {
        let policy_hash = canonical_hash(&policy);
        Self {
            store,
            cache,
            policy,
            policy_hash,
        }
    }

    /// Create an engine with the default policy and a private default cache.
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, Arc::new(RelationshipCache::default()), KinshipPolicyV1::default())
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The relationship cache.
    pub fn cache(&self) -> &Arc<RelationshipCache> {
        &self.cache
    }

    /// The resolution policy.
    pub fn policy(&self) -> &KinshipPolicyV1 {
        &self.policy
    }

    /// Take a consistent view of the graph.
    pub async fn snapshot(&self) -> Result<Arc<S::Graph>, KinshipError> {
        self.store.snapshot().await.map_err(KinshipError::from_store)
    }

    /// What `b` is to `a`, without a deadline.
    pub async fn compute_relationship(
        &self,
        a: PersonId,
        b: PersonId,
    ) -> Result<Relationship, KinshipError> {
        self.compute_relationship_within(a, b, &Deadline::none()).await
    }

    /// What `b` is to `a`.
    ///
    /// Fails with `PersonNotFound` if either person is unknown at the
    /// current version and with `ComputationAborted` if `deadline` passes
    /// first. Two people with no path between them are an ordinary
    /// `Unrelated` relationship.
    pub async fn compute_relationship_within(
        &self,
        a: PersonId,
        b: PersonId,
        deadline: &Deadline,
    ) -> Result<Relationship, KinshipError> {
        deadline.check()?;
        let graph = self.snapshot().await?;
        self.relationship_at(&graph, a, b, deadline, None).await
    }

    /// Advance the cache epoch. Returns the new epoch.
    pub fn invalidate(&self) -> u64 {
        self.cache.advance_epoch()
    }

    /// Cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub(crate) fn cache_key(&self, pair: PersonPair, version: GraphVersion) -> CacheKey {
        self.cache.key(pair, version, self.policy_hash)
    }

    /// Resolve one pair against a fixed snapshot.
    ///
    /// `anchor` is a pre-expanded ancestor map for one of the two people.
    pub(crate) async fn relationship_at(
        &self,
        graph: &Arc<S::Graph>,
        a: PersonId,
        b: PersonId,
        deadline: &Deadline,
        anchor: Option<&AncestorMap>,
    ) -> Result<Relationship, KinshipError> {
        graph.require(a)?;
        graph.require(b)?;
        if a == b {
            return Ok(Relationship::self_person(graph.version()));
        }

        let pair = PersonPair::new(a, b);
        let key = self.cache_key(pair, graph.version());
        let graph_ref: &S::Graph = graph;

        let rel = self
            .cache
            .get_or_compute(key, deadline, || {
                self.resolve_pair(graph_ref, pair, deadline, anchor)
            })
            .await?;

        Ok(if PersonPair::is_flipped(a, b) {
            rel.inverse()
        } else {
            Relationship::clone(&rel)
        })
    }

    /// Search, classify and rank one pair in `(lo, hi)` orientation.
    fn resolve_pair(
        &self,
        graph: &S::Graph,
        pair: PersonPair,
        deadline: &Deadline,
        anchor: Option<&AncestorMap>,
    ) -> Result<Relationship, KinshipError> {
        let finder = PathFinder::new(graph, &self.policy);
        let search = finder.search(seed(anchor, pair.lo()), seed(anchor, pair.hi()), deadline)?;

        let rel = match search {
            Search::Met(meeting) => resolve_meeting(&meeting, graph, &self.policy),
            Search::Unrelated => Relationship::unrelated(graph.version()),
        };
        tracing::debug!(
            lo = %pair.lo(),
            hi = %pair.hi(),
            version = %graph.version(),
            label = %rel.label(),
            alternates = rel.alternates.len(),
            "Resolved relationship"
        );
        Ok(rel)
    }
}

/// Borrow the anchor's map when it belongs to `person`.
fn seed(anchor: Option<&AncestorMap>, person: PersonId) -> Cow<'_, AncestorMap> {
    match anchor {
        Some(map) if map.origin() == person => Cow::Borrowed(map),
        _ => Cow::Owned(AncestorMap::new(person)),
    }
}
