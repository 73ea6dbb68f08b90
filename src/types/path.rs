//! Candidate paths between two people.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::edge::{ParentEdge, ParentKind, PartnershipEdge};
use super::person::PersonId;

/// Where the two lineages meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Apex {
    /// A person reachable upward from both sides.
    Ancestor {
        /// The common ancestor.
        person: PersonId,
    },
    /// An ancestor of A partnered with an ancestor of B.
    Partnership {
        /// Endpoint reached from A.
        a_side: PersonId,
        /// Endpoint reached from B.
        b_side: PersonId,
        /// The bridging partnership.
        edge: PartnershipEdge,
    },
}

impl Apex {
    /// Apex person as seen from A.
    pub fn a_side(&self) -> PersonId {
        match self {
            Self::Ancestor { person } => *person,
            Self::Partnership { a_side, .. } => *a_side,
        }
    }

    /// Apex person as seen from B.
    pub fn b_side(&self) -> PersonId {
        match self {
            Self::Ancestor { person } => *person,
            Self::Partnership { b_side, .. } => *b_side,
        }
    }

    /// Bridging partnership, if any.
    pub fn bridge(&self) -> Option<&PartnershipEdge> {
        match self {
            Self::Ancestor { .. } => None,
            Self::Partnership { edge, .. } => Some(edge),
        }
    }

    /// Apex people, sorted.
    pub fn people(&self) -> Vec<PersonId> {
        match self {
            Self::Ancestor { person } => vec![*person],
            Self::Partnership { a_side, b_side, .. } => {
                let mut people = vec![*a_side, *b_side];
                people.sort();
                people
            }
        }
    }
}

/// How one leg of a path reaches the apex.
///
/// Ordered from most to least preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegProvenance {
    /// Only biological edges (or no edges at all).
    Biological,
    /// At least one adoptive edge, no step/foster edge.
    Adoptive,
    /// At least one step or foster edge.
    Step,
}

/// Summarize the provenance of a leg.
pub fn leg_provenance(leg: &[ParentEdge]) -> LegProvenance {
    if leg.iter().any(|e| e.kind.is_step_like()) {
        LegProvenance::Step
    } else if leg.iter().any(|e| e.kind == ParentKind::Adoptive) {
        LegProvenance::Adoptive
    } else {
        LegProvenance::Biological
    }
}

/// One way of connecting A and B through an apex.
///
/// Each leg runs from its origin upward: `leg_a[0].child` is A and
/// `leg_a.last().parent` is the A-side apex person. Empty legs mean the
/// origin is the apex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipPath {
    /// Meeting point.
    pub apex: Apex,
    /// Edges from A up to the apex.
    pub leg_a: Vec<ParentEdge>,
    /// Edges from B up to the apex.
    pub leg_b: Vec<ParentEdge>,
}

impl RelationshipPath {
    /// Create a path.
    pub fn new(apex: Apex, leg_a: Vec<ParentEdge>, leg_b: Vec<ParentEdge>) -> Self {
        Self { apex, leg_a, leg_b }
    }

    /// Generations from A to the apex.
    pub fn dist_a(&self) -> u32 {
        self.leg_a.len() as u32
    }

    /// Generations from B to the apex.
    pub fn dist_b(&self) -> u32 {
        self.leg_b.len() as u32
    }

    /// Multiset of edge kinds traversed on both legs.
    pub fn edge_kinds(&self) -> BTreeMap<ParentKind, usize> {
        let mut kinds = BTreeMap::new();
        for edge in self.leg_a.iter().chain(self.leg_b.iter()) {
            *kinds.entry(edge.kind).or_insert(0) += 1;
        }
        kinds
    }

    /// Whether the legs only meet through a partnership.
    pub fn is_bridged(&self) -> bool {
        self.apex.bridge().is_some()
    }

    /// Provenance of each leg; a bridge makes both legs step-only.
    pub fn provenance(&self) -> (LegProvenance, LegProvenance) {
        if self.is_bridged() {
            return (LegProvenance::Step, LegProvenance::Step);
        }
        (leg_provenance(&self.leg_a), leg_provenance(&self.leg_b))
    }

    /// Highest partnership ordinal touched: parent-set ordinals on both legs
    /// and the bridge ordinal.
    pub fn max_ordinal(&self) -> u32 {
        let legs = self
            .leg_a
            .iter()
            .chain(self.leg_b.iter())
            .map(|e| e.parent_set);
        let bridge = self.apex.bridge().map(|b| b.ordinal);
        legs.chain(bridge).max().unwrap_or(0)
    }

    /// Every person on the path, sorted and deduplicated.
    pub fn people(&self) -> Vec<PersonId> {
        let mut people: Vec<PersonId> = self
            .leg_a
            .iter()
            .chain(self.leg_b.iter())
            .flat_map(|e| [e.child, e.parent])
            .chain(self.apex.people())
            .collect();
        people.sort();
        people.dedup();
        people
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(n: u128) -> PersonId {
        PersonId::from_u128(n)
    }

    #[test]
    fn test_provenance_and_kinds() {
        // A --adoptive--> C --bio--> D <--bio-- B
        let path = RelationshipPath::new(
            Apex::Ancestor { person: p(4) },
            vec![ParentEdge::adoptive(p(1), p(3), 1), ParentEdge::biological(p(3), p(4))],
            vec![ParentEdge::biological(p(2), p(4))],
        );

        assert_eq!(path.dist_a(), 2);
        assert_eq!(path.dist_b(), 1);
        assert_eq!(path.provenance(), (LegProvenance::Adoptive, LegProvenance::Biological));
        assert_eq!(path.edge_kinds().get(&ParentKind::Biological), Some(&2));
        assert_eq!(path.max_ordinal(), 1);
        assert_eq!(path.people(), vec![p(1), p(2), p(3), p(4)]);
    }

    #[test]
    fn test_bridge_is_step_only() {
        let edge = PartnershipEdge::new(p(5), p(6), Default::default(), 2);
        let path = RelationshipPath::new(
            Apex::Partnership { a_side: p(5), b_side: p(6), edge },
            vec![ParentEdge::biological(p(1), p(5))],
            vec![ParentEdge::biological(p(2), p(6))],
        );

        assert!(path.is_bridged());
        assert_eq!(path.provenance(), (LegProvenance::Step, LegProvenance::Step));
        assert_eq!(path.max_ordinal(), 2);
    }
}
