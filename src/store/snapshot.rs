//! Immutable arena snapshot of the family graph.
//!
//! People are interned into integer handles on build; adjacency lives in flat
//! per-handle tables. A snapshot is validated once when it is built and never
//! changes afterwards.

use std::collections::{BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical::canonical_hash_hex;
use crate::types::{GraphVersion, KinshipError, ParentEdge, ParentKind, PartnershipEdge, PersonId};
use super::FamilyGraph;

/// Raw graph records a snapshot is built from.
///
/// Sets keep iteration order canonical, so equal records always build equal
/// snapshots with equal fingerprints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyRecords {
    /// Every known person.
    pub people: BTreeSet<PersonId>,
    /// Child-to-parent edges.
    pub parent_edges: BTreeSet<ParentEdge>,
    /// Partnerships.
    pub partnerships: BTreeSet<PartnershipEdge>,
}

impl FamilyRecords {
    /// Empty records.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a person.
    pub fn with_person(mut self, person: PersonId) -> Self {
        self.people.insert(person);
        self
    }

    /// Add several people.
    pub fn with_people(mut self, people: impl IntoIterator<Item = PersonId>) -> Self {
        self.people.extend(people);
        self
    }

    /// Add a parent edge.
    pub fn with_parent(mut self, edge: ParentEdge) -> Self {
        self.parent_edges.insert(edge);
        self
    }

    /// Add a partnership.
    pub fn with_partnership(mut self, edge: PartnershipEdge) -> Self {
        self.partnerships.insert(edge);
        self
    }

    /// Drop a person together with every edge touching them.
    ///
    /// Returns whether the person existed.
    pub fn remove_person(&mut self, person: PersonId) -> bool {
        if !self.people.remove(&person) {
            return false;
        }
        self.parent_edges
            .retain(|e| e.child != person && e.parent != person);
        self.partnerships.retain(|p| !p.involves(person));
        true
    }
}

/// Immutable family graph at one version.
#[derive(Debug, Clone)]
pub struct FamilySnapshot {
    version: GraphVersion,
    index: HashMap<PersonId, usize>,
    people: Vec<PersonId>,
    parents: Vec<Vec<ParentEdge>>,
    children: Vec<Vec<ParentEdge>>,
    partners: Vec<Vec<PartnershipEdge>>,
    edge_count: usize,
    fingerprint: String,
    published_at: DateTime<Utc>,
}

impl FamilySnapshot {
    /// An empty graph at the initial version.
    pub fn empty() -> Self {
        Self {
            version: GraphVersion::INITIAL,
            index: HashMap::new(),
            people: Vec::new(),
            parents: Vec::new(),
            children: Vec::new(),
            partners: Vec::new(),
            edge_count: 0,
            fingerprint: canonical_hash_hex(&FamilyRecords::default()),
            published_at: Utc::now(),
        }
    }

    /// Validate `records` and build a snapshot at `version`.
    ///
    /// Fails with `InvariantViolation` on an edge referencing an unknown
    /// person, a self-parent edge, a parent recorded twice for the same
    /// child, a self-partnership, or a cycle among biological edges.
    pub fn build(records: &FamilyRecords, version: GraphVersion) -> Result<Self, KinshipError> {
        let people: Vec<PersonId> = records.people.iter().copied().collect();
        let index: HashMap<PersonId, usize> =
            people.iter().enumerate().map(|(i, p)| (*p, i)).collect();

        let handle = |person: PersonId, what: &str| {
            index.get(&person).copied().ok_or_else(|| {
                KinshipError::InvariantViolation(format!(
                    "{what} references unknown person {person}"
                ))
            })
        };

        let mut parents = vec![Vec::new(); people.len()];
        let mut children = vec![Vec::new(); people.len()];
        let mut partners = vec![Vec::new(); people.len()];

        for edge in &records.parent_edges {
            if edge.child == edge.parent {
                return Err(KinshipError::InvariantViolation(format!(
                    "person {} recorded as their own parent",
                    edge.child
                )));
            }
            let child = handle(edge.child, "parent edge")?;
            let parent = handle(edge.parent, "parent edge")?;

            let list: &mut Vec<ParentEdge> = &mut parents[child];
            if list.iter().any(|e| e.parent == edge.parent) {
                return Err(KinshipError::InvariantViolation(format!(
                    "parent {} recorded twice for {}",
                    edge.parent, edge.child
                )));
            }
            list.push(*edge);
            children[parent].push(*edge);
        }

        for edge in &records.partnerships {
            if edge.person_a == edge.person_b {
                return Err(KinshipError::InvariantViolation(format!(
                    "person {} recorded as their own partner",
                    edge.person_a
                )));
            }
            partners[handle(edge.person_a, "partnership")?].push(*edge);
            partners[handle(edge.person_b, "partnership")?].push(*edge);
        }

        for list in children.iter_mut() {
            list.sort();
        }

        reject_biological_cycles(&people, &parents, &index)?;

        Ok(Self {
            version,
            index,
            people,
            parents,
            children,
            partners,
            edge_count: records.parent_edges.len() + records.partnerships.len(),
            fingerprint: canonical_hash_hex(records),
            published_at: Utc::now(),
        })
    }

    /// Content fingerprint (xxh64 of the canonical records).
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// When this snapshot was built.
    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    /// Number of parent edges plus partnerships.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Every person, sorted.
    pub fn people(&self) -> &[PersonId] {
        &self.people
    }

    fn handle(&self, person: PersonId) -> Option<usize> {
        self.index.get(&person).copied()
    }
}

impl FamilyGraph for FamilySnapshot {
    fn version(&self) -> GraphVersion {
        self.version
    }

    fn contains(&self, person: PersonId) -> bool {
        self.index.contains_key(&person)
    }

    fn parents_of(&self, person: PersonId) -> &[ParentEdge] {
        match self.handle(person) {
            Some(h) => &self.parents[h],
            None => &[],
        }
    }

    fn children_of(&self, person: PersonId) -> &[ParentEdge] {
        match self.handle(person) {
            Some(h) => &self.children[h],
            None => &[],
        }
    }

    fn partners_of(&self, person: PersonId) -> &[PartnershipEdge] {
        match self.handle(person) {
            Some(h) => &self.partners[h],
            None => &[],
        }
    }

    fn person_count(&self) -> usize {
        self.people.len()
    }
}

/// Kahn's algorithm over biological edges only.
fn reject_biological_cycles(
    people: &[PersonId],
    parents: &[Vec<ParentEdge>],
    index: &HashMap<PersonId, usize>,
) -> Result<(), KinshipError> {
    // in_degree[p] = number of biological children of p not yet removed
    let mut in_degree = vec![0usize; people.len()];
    for edges in parents {
        for edge in edges.iter().filter(|e| e.kind == ParentKind::Biological) {
            if let Some(&p) = index.get(&edge.parent) {
                in_degree[p] += 1;
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..people.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut removed = 0usize;

    while let Some(node) = queue.pop_front() {
        removed += 1;
        for edge in parents[node].iter().filter(|e| e.kind == ParentKind::Biological) {
            if let Some(&p) = index.get(&edge.parent) {
                in_degree[p] -= 1;
                if in_degree[p] == 0 {
                    queue.push_back(p);
                }
            }
        }
    }

    if removed == people.len() {
        return Ok(());
    }

    let witness = (0..people.len())
        .find(|&i| in_degree[i] > 0)
        .map(|i| people[i].to_string())
        .unwrap_or_default();
    tracing::warn!(person = %witness, "Biological cycle detected");
    Err(KinshipError::InvariantViolation(format!(
        "biological cycle through person {witness}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(n: u128) -> PersonId {
        PersonId::from_u128(n)
    }

    #[test]
    fn test_build_indexes_adjacency() {
        let records = FamilyRecords::new()
            .with_people([p(1), p(2), p(3)])
            .with_parent(ParentEdge::biological(p(3), p(2)))
            .with_parent(ParentEdge::biological(p(3), p(1)))
            .with_partnership(PartnershipEdge::marriage(p(1), p(2)));

        let snap = FamilySnapshot::build(&records, GraphVersion::new(7)).unwrap();

        assert_eq!(snap.version(), GraphVersion::new(7));
        assert_eq!(snap.person_count(), 3);
        assert_eq!(snap.edge_count(), 3);
        let parents: Vec<_> = snap.parents_of(p(3)).iter().map(|e| e.parent).collect();
        assert_eq!(parents, vec![p(1), p(2)]);
        assert_eq!(snap.children_of(p(1))[0].child, p(3));
        assert_eq!(snap.partners_of(p(2)).len(), 1);
        assert!(snap.parents_of(p(99)).is_empty());
        assert!(snap.require(p(99)).is_err());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = FamilyRecords::new().with_people([p(1), p(2)]);
        let b = a.clone().with_parent(ParentEdge::biological(p(2), p(1)));

        let snap_a = FamilySnapshot::build(&a, GraphVersion::new(1)).unwrap();
        let snap_a2 = FamilySnapshot::build(&a, GraphVersion::new(2)).unwrap();
        let snap_b = FamilySnapshot::build(&b, GraphVersion::new(1)).unwrap();

        assert_eq!(snap_a.fingerprint(), snap_a2.fingerprint());
        assert_ne!(snap_a.fingerprint(), snap_b.fingerprint());
    }

    #[test]
    fn test_rejects_dangling_edge() {
        let records = FamilyRecords::new()
            .with_person(p(1))
            .with_parent(ParentEdge::biological(p(1), p(2)));

        let err = FamilySnapshot::build(&records, GraphVersion::new(1)).unwrap_err();
        assert!(matches!(err, KinshipError::InvariantViolation(_)));
    }

    #[test]
    fn test_rejects_self_parent() {
        let records = FamilyRecords::new()
            .with_person(p(1))
            .with_parent(ParentEdge::biological(p(1), p(1)));

        assert!(FamilySnapshot::build(&records, GraphVersion::new(1)).is_err());
    }

    #[test]
    fn test_rejects_duplicate_parent() {
        let records = FamilyRecords::new()
            .with_people([p(1), p(2)])
            .with_parent(ParentEdge::biological(p(2), p(1)))
            .with_parent(ParentEdge::adoptive(p(2), p(1), 1));

        assert!(FamilySnapshot::build(&records, GraphVersion::new(1)).is_err());
    }

    #[test]
    fn test_rejects_biological_cycle() {
        let records = FamilyRecords::new()
            .with_people([p(1), p(2), p(3)])
            .with_parent(ParentEdge::biological(p(1), p(2)))
            .with_parent(ParentEdge::biological(p(2), p(3)))
            .with_parent(ParentEdge::biological(p(3), p(1)));

        let err = FamilySnapshot::build(&records, GraphVersion::new(1)).unwrap_err();
        assert!(err.to_string().contains("biological cycle"));
    }

    #[test]
    fn test_allows_cycle_through_adoption() {
        // Legal adoption can loop back; only biological cycles are impossible.
        let records = FamilyRecords::new()
            .with_people([p(1), p(2)])
            .with_parent(ParentEdge::biological(p(1), p(2)))
            .with_parent(ParentEdge::adoptive(p(2), p(1), 0));

        assert!(FamilySnapshot::build(&records, GraphVersion::new(1)).is_ok());
    }

    #[test]
    fn test_remove_person_drops_incident_edges() {
        let mut records = FamilyRecords::new()
            .with_people([p(1), p(2), p(3)])
            .with_parent(ParentEdge::biological(p(2), p(1)))
            .with_partnership(PartnershipEdge::marriage(p(1), p(3)));

        assert!(records.remove_person(p(1)));
        assert!(!records.remove_person(p(1)));
        assert!(records.parent_edges.is_empty());
        assert!(records.partnerships.is_empty());
    }
}
