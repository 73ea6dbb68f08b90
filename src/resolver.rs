//! Rank every shortest path between two people and pick the canonical one.
//!
//! People with several parent-sets (adoption, remarriage) can be connected
//! through more than one shortest path. Each path is classified on its own;
//! the ranking below decides which descriptor is canonical, and the rest are
//! kept as alternates.

use std::collections::BTreeSet;

use crate::classifier::classify;
use crate::finder::Meeting;
use crate::policy::KinshipPolicyV1;
use crate::store::FamilyGraph;
use crate::types::{
    GraphVersion, LegProvenance, PersonId, Relationship, RelationshipDescriptor, RelationshipPath,
};

/// Ordering key for candidate paths; lower is preferred.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PathRank {
    /// 0 = both legs biological, 1 = biological + adoptive, 2 = both
    /// adoptive, 3 = step/foster edge or partnership bridge.
    pub provenance: u8,
    /// Highest parent-set or partnership ordinal on the path.
    pub ordinal: u32,
    /// Sorted people along the path.
    pub people: Vec<PersonId>,
}

impl PathRank {
    /// Rank a path.
    pub fn of(path: &RelationshipPath) -> Self {
        let provenance = match path.provenance() {
            (LegProvenance::Step, _) | (_, LegProvenance::Step) => 3,
            (LegProvenance::Adoptive, LegProvenance::Adoptive) => 2,
            (LegProvenance::Adoptive, _) | (_, LegProvenance::Adoptive) => 1,
            _ => 0,
        };
        Self {
            provenance,
            ordinal: path.max_ordinal(),
            people: path.people(),
        }
    }
}

/// One classified path.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The path.
    pub path: RelationshipPath,
    /// Its rank.
    pub rank: PathRank,
    /// Its classification.
    pub descriptor: RelationshipDescriptor,
}

/// Enumerate, classify and rank every path through every apex.
pub fn candidates<G: FamilyGraph + ?Sized>(
    meeting: &Meeting<'_>,
    graph: &G,
    policy: &KinshipPolicyV1,
) -> Vec<Candidate> {
    let limit = policy.max_legs_per_side;
    let mut out = Vec::new();

    for apex in &meeting.apexes {
        let legs_a = meeting.side_a.legs(apex.a_side(), limit);
        let legs_b = meeting.side_b.legs(apex.b_side(), limit);

        for leg_a in &legs_a {
            for leg_b in &legs_b {
                let path = RelationshipPath::new(*apex, leg_a.clone(), leg_b.clone());
                let descriptor = classify(&path, graph, policy);
                let rank = PathRank::of(&path);
                out.push(Candidate {
                    path,
                    rank,
                    descriptor,
                });
            }
        }
    }

    out.sort_by(|x, y| x.rank.cmp(&y.rank));
    out
}

/// Collapse ranked candidates into a relationship.
///
/// The first candidate is canonical; each later descriptor not already seen
/// becomes an alternate, in rank order. Common ancestors are the apexes of
/// every path classified like the canonical one.
pub fn resolve(mut ranked: Vec<Candidate>, graph_version: GraphVersion) -> Relationship {
    if ranked.is_empty() {
        return Relationship::unrelated(graph_version);
    }
    let best = ranked.remove(0);

    let mut common: BTreeSet<PersonId> = best.path.apex.people().into_iter().collect();
    let mut alternates: Vec<RelationshipDescriptor> = Vec::new();
    for candidate in ranked {
        if candidate.descriptor == best.descriptor {
            common.extend(candidate.path.apex.people());
        } else if !alternates.contains(&candidate.descriptor) {
            alternates.push(candidate.descriptor);
        }
    }

    Relationship {
        canonical: best.descriptor,
        alternates,
        common_ancestors: common.into_iter().collect(),
        graph_version,
    }
}

/// Classify a meeting into a relationship.
pub fn resolve_meeting<G: FamilyGraph + ?Sized>(
    meeting: &Meeting<'_>,
    graph: &G,
    policy: &KinshipPolicyV1,
) -> Relationship {
    let ranked = candidates(meeting, graph, policy);
    tracing::trace!(candidates = ranked.len(), apexes = meeting.apexes.len(), "Ranked paths");
    resolve(ranked, graph.version())
}
