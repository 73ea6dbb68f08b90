//! Lineage queries: ancestors, descendants and immediate family.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use crate::engine::RelationshipEngine;
use crate::finder::AncestorMap;
use crate::store::{FamilyGraph, FamilyStore};
use crate::types::{Deadline, GraphVersion, KinshipError, ParentEdge, PartnershipEdge, PersonId};

/// One person's immediate family at one graph version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FamilyGroup {
    /// The person the group is centred on.
    pub person: PersonId,
    /// Version the group was read at.
    pub graph_version: GraphVersion,
    /// Edges up to each recorded parent.
    pub parents: Vec<ParentEdge>,
    /// Partnerships the person takes part in.
    pub partners: Vec<PartnershipEdge>,
    /// Edges from each recorded child.
    pub children: Vec<ParentEdge>,
    /// People sharing at least one biological or adoptive parent, sorted.
    pub siblings: Vec<PersonId>,
}

/// Ancestors of `person` up to `max_generations`, by generation then id.
pub fn ancestors<G: FamilyGraph + ?Sized>(
    graph: &G,
    person: PersonId,
    max_generations: u32,
) -> Result<Vec<(PersonId, u32)>, KinshipError> {
    graph.require(person)?;
    let mut map = AncestorMap::new(person);
    map.expand_fully(graph, max_generations, &Deadline::none())?;
    Ok(map.generations())
}

/// Descendants of `person` up to `max_generations`, by generation then id.
///
/// Someone reachable along several lines is listed once, at the nearest
/// generation.
pub fn descendants<G: FamilyGraph + ?Sized>(
    graph: &G,
    person: PersonId,
    max_generations: u32,
) -> Result<Vec<(PersonId, u32)>, KinshipError> {
    graph.require(person)?;

    let mut seen: HashSet<PersonId> = HashSet::from([person]);
    let mut frontier = vec![person];
    let mut out = Vec::new();

    for generation in 1..=max_generations {
        let mut next: BTreeSet<PersonId> = BTreeSet::new();
        for &parent in &frontier {
            for edge in graph.children_of(parent) {
                if seen.insert(edge.child) {
                    next.insert(edge.child);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        out.extend(next.iter().map(|&child| (child, generation)));
        frontier = next.into_iter().collect();
    }

    Ok(out)
}

/// Immediate family of `person`.
pub fn family_group<G: FamilyGraph + ?Sized>(
    graph: &G,
    person: PersonId,
) -> Result<FamilyGroup, KinshipError> {
    graph.require(person)?;

    let parents = graph.parents_of(person).to_vec();
    let siblings: BTreeSet<PersonId> = parents
        .iter()
        .filter(|e| !e.kind.is_step_like())
        .flat_map(|e| graph.children_of(e.parent))
        .filter(|e| !e.kind.is_step_like() && e.child != person)
        .map(|e| e.child)
        .collect();

    Ok(FamilyGroup {
        person,
        graph_version: graph.version(),
        parents,
        partners: graph.partners_of(person).to_vec(),
        children: graph.children_of(person).to_vec(),
        siblings: siblings.into_iter().collect(),
    })
}

impl<S: FamilyStore> RelationshipEngine<S> {
    /// Ancestors of `person` at the current version.
    pub async fn ancestors(
        &self,
        person: PersonId,
        max_generations: u32,
    ) -> Result<Vec<(PersonId, u32)>, KinshipError> {
        let graph = self.snapshot().await?;
        ancestors(&*graph, person, max_generations)
    }

    /// Descendants of `person` at the current version.
    pub async fn descendants(
        &self,
        person: PersonId,
        max_generations: u32,
    ) -> Result<Vec<(PersonId, u32)>, KinshipError> {
        let graph = self.snapshot().await?;
        descendants(&*graph, person, max_generations)
    }

    /// Immediate family of `person` at the current version.
    pub async fn family_group(&self, person: PersonId) -> Result<FamilyGroup, KinshipError> {
        let graph = self.snapshot().await?;
        family_group(&*graph, person)
    }
}
