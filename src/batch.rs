//! Annotate many people relative to one anchor.
//!
//! The anchor's ancestry is expanded once, and only if some pair actually
//! misses the cache. Every search on a miss then borrows that expansion
//! instead of walking the anchor's lineage again.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::engine::RelationshipEngine;
use crate::finder::AncestorMap;
use crate::store::{FamilyGraph, FamilyStore};
use crate::types::{Deadline, GraphVersion, KinshipError, PersonId, PersonPair, Relationship};

/// Relationships from one anchor to many people, at one graph version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRelationships {
    /// The person every relationship is read from.
    pub anchor: PersonId,
    /// Version every result was computed at.
    pub graph_version: GraphVersion,
    /// What each person is to the anchor.
    pub results: BTreeMap<PersonId, Relationship>,
    /// Requested people absent at `graph_version`, sorted and deduplicated.
    pub not_found: Vec<PersonId>,
}

impl BatchRelationships {
    /// Relationship to `person`, if it was computed.
    pub fn get(&self, person: PersonId) -> Option<&Relationship> {
        self.results.get(&person)
    }

    /// Number of computed relationships.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether nothing was computed.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl<S: FamilyStore> RelationshipEngine<S> {
    /// Relationships from `anchor` to each of `others`, without a deadline.
    pub async fn batch_compute(
        &self,
        anchor: PersonId,
        others: &[PersonId],
    ) -> Result<BatchRelationships, KinshipError> {
        self.batch_compute_within(anchor, others, &Deadline::none()).await
    }

    /// Relationships from `anchor` to each of `others`.
    ///
    /// An unknown anchor fails the whole batch with `PersonNotFound`. Unknown
    /// others are listed in `not_found` instead. A deadline or cancellation
    /// aborts the batch; pairs finished before that stay cached.
    pub async fn batch_compute_within(
        &self,
        anchor: PersonId,
        others: &[PersonId],
        deadline: &Deadline,
    ) -> Result<BatchRelationships, KinshipError> {
        deadline.check()?;
        let graph = self.snapshot().await?;
        graph.require(anchor)?;
        let version = graph.version();

        let mut results = BTreeMap::new();
        let mut not_found = Vec::new();
        let mut pending = Vec::new();
        let mut seen = HashSet::with_capacity(others.len());
        for &other in others {
            if !graph.contains(other) {
                not_found.push(other);
            } else if seen.insert(other) {
                pending.push(other);
            }
        }
        not_found.sort();
        not_found.dedup();

        let needs_search = pending.iter().any(|&other| {
            other != anchor
                && self
                    .cache()
                    .peek(&self.cache_key(PersonPair::new(anchor, other), version))
                    .is_none()
        });

        let expanded = if needs_search {
            let mut map = AncestorMap::new(anchor);
            map.expand_fully(&*graph, self.policy().max_generations, deadline)?;
            tracing::debug!(
                anchor = %anchor,
                ancestors = map.len().saturating_sub(1),
                "Expanded batch anchor"
            );
            Some(map)
        } else {
            None
        };

        for other in pending {
            let rel = self
                .relationship_at(&graph, anchor, other, deadline, expanded.as_ref())
                .await?;
            results.insert(other, rel);
        }

        tracing::info!(
            anchor = %anchor,
            version = %version,
            computed = results.len(),
            not_found = not_found.len(),
            "Batch relationships computed"
        );

        Ok(BatchRelationships {
            anchor,
            graph_version: version,
            results,
            not_found,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::{FamilyRecords, InMemoryFamilyStore};
    use crate::types::{Direction, LabelKey, ParentEdge};

    fn p(n: u128) -> PersonId {
        PersonId::from_u128(n)
    }

    fn engine() -> RelationshipEngine<InMemoryFamilyStore> {
        // 1,2 -> 3; 1,2 -> 4; 3 -> 5; 6 unrelated
        let records = FamilyRecords::new()
            .with_people((1..=6).map(p))
            .with_parent(ParentEdge::biological(p(3), p(1)))
            .with_parent(ParentEdge::biological(p(3), p(2)))
            .with_parent(ParentEdge::biological(p(4), p(1)))
            .with_parent(ParentEdge::biological(p(4), p(2)))
            .with_parent(ParentEdge::biological(p(5), p(3)));
        RelationshipEngine::with_defaults(Arc::new(InMemoryFamilyStore::from_records(records).unwrap()))
    }

    #[tokio::test]
    async fn test_batch_labels_relative_to_anchor() {
        let engine = engine();
        let batch = engine
            .batch_compute(p(4), &[p(1), p(3), p(5), p(6), p(4)])
            .await
            .unwrap();

        assert_eq!(batch.len(), 5);
        assert_eq!(batch.get(p(1)).unwrap().label(), LabelKey::Parent);
        assert_eq!(batch.get(p(3)).unwrap().label(), LabelKey::FullSibling);
        assert_eq!(batch.get(p(5)).unwrap().label(), LabelKey::NieceNephew);
        assert!(!batch.get(p(6)).unwrap().is_related());
        assert_eq!(batch.get(p(4)).unwrap().canonical.direction, Direction::SelfPerson);
        assert!(batch.not_found.is_empty());
    }

    #[tokio::test]
    async fn test_batch_matches_single_pair_results() {
        let engine = engine();
        let batch = engine.batch_compute(p(5), &[p(1), p(4)]).await.unwrap();

        for other in [p(1), p(4)] {
            let single = engine.compute_relationship(p(5), other).await.unwrap();
            assert_eq!(batch.get(other), Some(&single));
        }
    }

    #[tokio::test]
    async fn test_batch_reports_missing_people() {
        let engine = engine();
        let batch = engine
            .batch_compute(p(1), &[p(9), p(3), p(8), p(9)])
            .await
            .unwrap();

        assert_eq!(batch.not_found, vec![p(8), p(9)]);
        assert_eq!(batch.len(), 1);

        assert_eq!(
            engine.batch_compute(p(9), &[p(1)]).await,
            Err(KinshipError::PersonNotFound(p(9)))
        );
    }

    #[tokio::test]
    async fn test_batch_computes_repeated_people_once() {
        let engine = engine();
        let others: Vec<PersonId> = [4, 5, 4, 4, 5].into_iter().map(p).collect();
        let batch = engine.batch_compute(p(3), &others).await.unwrap();

        assert_eq!(batch.len(), 2);
        let stats = engine.cache_stats();
        assert_eq!((stats.misses, stats.hits), (2, 0));
    }

    #[tokio::test]
    async fn test_batch_reuses_cached_pairs() {
        let engine = engine();
        engine.batch_compute(p(3), &[p(4), p(5)]).await.unwrap();
        let before = engine.cache_stats();

        engine.batch_compute(p(3), &[p(4), p(5)]).await.unwrap();
        let after = engine.cache_stats();

        assert_eq!(after.misses, before.misses);
        assert_eq!(after.hits, before.hits + 2);
    }
}
