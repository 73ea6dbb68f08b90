//! Map a path's distances and edge kinds to a relationship descriptor.
//!
//! The descriptor for the ordered pair `(A, B)` states what B is to A.

use std::collections::BTreeSet;

use crate::policy::KinshipPolicyV1;
use crate::store::FamilyGraph;
use crate::types::{
    Direction, LabelKey, Modifier, ParentEdge, ParentKind, PersonId, RelationshipDescriptor,
    RelationshipPath,
};

/// Classify one path.
pub fn classify<G: FamilyGraph + ?Sized>(
    path: &RelationshipPath,
    graph: &G,
    policy: &KinshipPolicyV1,
) -> RelationshipDescriptor {
    let (da, db) = (path.dist_a(), path.dist_b());

    if da == 0 && db == 0 {
        // Same person never gets here, so this is a direct partnership.
        return RelationshipDescriptor::new(
            0,
            0,
            Direction::Collateral,
            BTreeSet::new(),
            LabelKey::Spouse,
        );
    }

    let modifiers = modifiers(path, graph);

    if da == 0 {
        return RelationshipDescriptor::new(
            db,
            0,
            Direction::Descendant,
            modifiers,
            lineal_label(db, LabelKey::Child, LabelKey::Grandchild, LabelKey::GreatGrandchild),
        );
    }
    if db == 0 {
        return RelationshipDescriptor::new(
            da,
            0,
            Direction::Ascendant,
            modifiers,
            lineal_label(da, LabelKey::Parent, LabelKey::Grandparent, LabelKey::GreatGrandparent),
        );
    }

    let removal = da.abs_diff(db);
    let nearest = da.min(db);

    let label = if da == 1 && db == 1 {
        if modifiers.contains(&Modifier::Step) {
            LabelKey::StepSibling
        } else if modifiers.contains(&Modifier::Half) {
            LabelKey::HalfSibling
        } else {
            LabelKey::FullSibling
        }
    } else if nearest == 1 {
        if db < da {
            LabelKey::AuntUncle
        } else {
            LabelKey::NieceNephew
        }
    } else {
        cousin_label(nearest - 1, removal, policy)
    };

    let degree = if nearest == 1 { 0 } else { nearest - 1 };
    RelationshipDescriptor::new(degree, removal, Direction::Collateral, modifiers, label)
}

fn lineal_label(degree: u32, one: LabelKey, two: LabelKey, more: LabelKey) -> LabelKey {
    match degree {
        1 => one,
        2 => two,
        _ => more,
    }
}

fn cousin_label(degree: u32, removal: u32, policy: &KinshipPolicyV1) -> LabelKey {
    if !policy.names_cousin(degree, removal) {
        return LabelKey::DistantCousin;
    }
    match degree {
        1 => LabelKey::FirstCousin,
        2 => LabelKey::SecondCousin,
        3 => LabelKey::ThirdCousin,
        _ => LabelKey::NthCousin,
    }
}

fn modifiers<G: FamilyGraph + ?Sized>(path: &RelationshipPath, graph: &G) -> BTreeSet<Modifier> {
    let mut modifiers = BTreeSet::new();
    let edges = || path.leg_a.iter().chain(path.leg_b.iter());

    if edges().any(|e| e.kind == ParentKind::Adoptive) {
        modifiers.insert(Modifier::Adoptive);
    }
    if path.is_bridged() || edges().any(|e| e.kind.is_step_like()) {
        modifiers.insert(Modifier::Step);
    } else if is_half(path, graph) {
        modifiers.insert(Modifier::Half);
    }
    modifiers
}

/// Whether the two children of the apex share exactly one parent.
///
/// Only collateral paths through a shared ancestor qualify. Parents are
/// compared within the parent-set each leg actually used, counting
/// biological and adoptive parents.
fn is_half<G: FamilyGraph + ?Sized>(path: &RelationshipPath, graph: &G) -> bool {
    let (Some(top_a), Some(top_b)) = (path.leg_a.last(), path.leg_b.last()) else {
        return false;
    };

    let parents_a = parent_set(graph, top_a);
    let parents_b = parent_set(graph, top_b);
    parents_a.intersection(&parents_b).count() == 1
}

fn parent_set<G: FamilyGraph + ?Sized>(graph: &G, via: &ParentEdge) -> BTreeSet<PersonId> {
    graph
        .parents_of(via.child)
        .iter()
        .filter(|e| e.parent_set == via.parent_set && !e.kind.is_step_like())
        .map(|e| e.parent)
        .collect()
}
