//! Golden tests for the kinship kernel.
//!
//! These tests pin the labels, modifiers and common ancestors the engine
//! produces for a fixed family, and check symmetry and determinism on
//! generated families.

use std::collections::BTreeSet;
use std::sync::Arc;

use kinship_kernel::{
    Direction, FamilyRecords, InMemoryFamilyStore, KinshipPolicyV1, LabelKey, Modifier,
    ParentEdge, PartnershipEdge, PersonId, Relationship, RelationshipEngine,
};
use proptest::prelude::*;

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn p(n: u128) -> PersonId {
    PersonId::from_u128(n)
}

fn bio(child: u128, parent: u128) -> ParentEdge {
    ParentEdge::biological(p(child), p(parent))
}

fn ids(ns: &[u128]) -> Vec<PersonId> {
    ns.iter().copied().map(p).collect()
}

fn modifiers(ms: &[Modifier]) -> BTreeSet<Modifier> {
    ms.iter().copied().collect()
}

/// The reference family.
///
/// ```text
///   1 = 2                 14 = 15        41   42
///    |                     |     |        |\  /: (42 step-parent of 43)
///   +-----+               17    16        | 40 :
///   3     4 = 8                           43 ..
///  /|\     |\
/// 5 | 10   9  12 (adopted by 4)        46 47 --> 44, 45 (both adopted by 48, 49)
///  6,7  11                             13 (no relatives)
///
///   50 = 56
///     |
///   51  52
///    |   |
///   53 = 54 --> 55
/// ```
///
/// 3 has 6 and 7 with 5, and 11 with 10. First cousins 53 and 54 are
/// married, and 55 is 54's child.
fn build_family() -> FamilyRecords {
    FamilyRecords::new()
        .with_people((1..=17).map(p))
        .with_people((40..=49).map(p))
        // Grandparents 1 and 2
        .with_parent(bio(3, 1))
        .with_parent(bio(3, 2))
        .with_parent(bio(4, 1))
        .with_parent(bio(4, 2))
        // 3's children with 5 and with 10
        .with_parent(bio(6, 3))
        .with_parent(bio(6, 5))
        .with_parent(bio(7, 3))
        .with_parent(bio(7, 5))
        .with_parent(bio(11, 3))
        .with_parent(bio(11, 10))
        // 4's children
        .with_parent(bio(9, 4))
        .with_parent(bio(9, 8))
        .with_parent(ParentEdge::adoptive(p(12), p(4), 1))
        // Blended family
        .with_partnership(PartnershipEdge::marriage(p(14), p(15)))
        .with_parent(bio(16, 15))
        .with_parent(bio(17, 14))
        // Half siblings who are also step siblings
        .with_parent(bio(40, 41))
        .with_parent(bio(40, 42))
        .with_parent(bio(43, 41))
        .with_parent(ParentEdge::step(p(43), p(42), 0))
        // Biological siblings adopted together
        .with_parent(bio(44, 46))
        .with_parent(bio(44, 47))
        .with_parent(bio(45, 46))
        .with_parent(bio(45, 47))
        .with_parent(ParentEdge::adoptive(p(44), p(48), 1))
        .with_parent(ParentEdge::adoptive(p(45), p(48), 1))
        .with_parent(ParentEdge::adoptive(p(44), p(49), 1))
        .with_parent(ParentEdge::adoptive(p(45), p(49), 1))
        // Married cousins
        .with_people((50..=56).map(p))
        .with_partnership(PartnershipEdge::marriage(p(50), p(56)))
        .with_parent(bio(51, 50))
        .with_parent(bio(51, 56))
        .with_parent(bio(52, 50))
        .with_parent(bio(52, 56))
        .with_parent(bio(53, 51))
        .with_parent(bio(54, 52))
        .with_partnership(PartnershipEdge::marriage(p(53), p(54)))
        .with_parent(bio(55, 54))
}

fn engine() -> RelationshipEngine<InMemoryFamilyStore> {
    let store = InMemoryFamilyStore::from_records(build_family()).unwrap();
    RelationshipEngine::with_defaults(Arc::new(store))
}

async fn rel(engine: &RelationshipEngine<InMemoryFamilyStore>, a: u128, b: u128) -> Relationship {
    engine.compute_relationship(p(a), p(b)).await.unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Reference Scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_parent_and_child() {
    let engine = engine();

    let down = rel(&engine, 3, 6).await;
    assert_eq!(down.label(), LabelKey::Child);
    assert_eq!(down.canonical.direction, Direction::Descendant);
    assert_eq!(down.canonical.lineage_degree, 1);
    assert!(down.canonical.modifiers.is_empty());

    let up = rel(&engine, 6, 3).await;
    assert_eq!(up.label(), LabelKey::Parent);
    assert_eq!(up.canonical.direction, Direction::Ascendant);
    assert_eq!(up.common_ancestors, ids(&[3]));
}

#[tokio::test]
async fn test_full_siblings() {
    let rel = rel(&engine(), 6, 7).await;

    assert_eq!(rel.label(), LabelKey::FullSibling);
    assert_eq!(rel.canonical.direction, Direction::Collateral);
    assert!(rel.canonical.modifiers.is_empty());
    assert_eq!(rel.common_ancestors, ids(&[3, 5]));
}

#[tokio::test]
async fn test_half_siblings() {
    let rel = rel(&engine(), 6, 11).await;

    assert_eq!(rel.label(), LabelKey::HalfSibling);
    assert_eq!(rel.canonical.modifiers, modifiers(&[Modifier::Half]));
    assert_eq!(rel.common_ancestors, ids(&[3]));
}

#[tokio::test]
async fn test_first_cousins() {
    let rel = rel(&engine(), 6, 9).await;

    assert_eq!(rel.label(), LabelKey::FirstCousin);
    assert_eq!((rel.canonical.lineage_degree, rel.canonical.removal), (1, 0));
    assert_eq!(rel.common_ancestors, ids(&[1, 2]));
}

#[tokio::test]
async fn test_aunt_and_niece() {
    let engine = engine();

    let aunt = rel(&engine, 6, 4).await;
    assert_eq!(aunt.label(), LabelKey::AuntUncle);
    assert_eq!((aunt.canonical.lineage_degree, aunt.canonical.removal), (0, 1));

    let niece = rel(&engine, 4, 6).await;
    assert_eq!(niece.label(), LabelKey::NieceNephew);
    assert_eq!(niece.canonical.removal, 1);
}

#[tokio::test]
async fn test_adoptive_aunt() {
    let rel = rel(&engine(), 12, 3).await;

    assert_eq!(rel.label(), LabelKey::AuntUncle);
    assert!(rel.canonical.has(Modifier::Adoptive));
    assert_eq!(rel.common_ancestors, ids(&[1, 2]));
}

#[tokio::test]
async fn test_no_shared_ancestor_is_unrelated() {
    let rel = rel(&engine(), 6, 13).await;

    assert!(!rel.is_related());
    assert_eq!(rel.canonical.direction, Direction::Unrelated);
    assert!(rel.alternates.is_empty());
    assert!(rel.common_ancestors.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Partnerships and Multiple Parentage
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_spouses() {
    let rel = rel(&engine(), 14, 15).await;

    assert_eq!(rel.label(), LabelKey::Spouse);
    assert_eq!(rel.canonical.lineage_degree, 0);
    assert!(rel.canonical.modifiers.is_empty());
}

#[tokio::test]
async fn test_step_siblings_through_partnership() {
    let rel = rel(&engine(), 16, 17).await;

    assert_eq!(rel.label(), LabelKey::StepSibling);
    assert_eq!(rel.canonical.modifiers, modifiers(&[Modifier::Step]));
    assert_eq!(rel.common_ancestors, ids(&[14, 15]));
}

#[tokio::test]
async fn test_step_child_through_partnership() {
    let engine = engine();

    let child = rel(&engine, 14, 16).await;
    assert_eq!(child.label(), LabelKey::Child);
    assert!(child.canonical.has(Modifier::Step));

    let parent = rel(&engine, 16, 14).await;
    assert_eq!(parent.label(), LabelKey::Parent);
    assert!(parent.canonical.has(Modifier::Step));
}

#[tokio::test]
async fn test_half_sibling_canonical_with_step_alternate() {
    let rel = rel(&engine(), 40, 43).await;

    assert_eq!(rel.label(), LabelKey::HalfSibling);
    assert_eq!(rel.common_ancestors, ids(&[41]));

    assert_eq!(rel.alternates.len(), 1);
    let step = &rel.alternates[0];
    assert_eq!(step.canonical_label_key, LabelKey::StepSibling);
    assert_eq!(step.modifiers, modifiers(&[Modifier::Step]));
}

#[tokio::test]
async fn test_biological_siblings_with_adoptive_alternate() {
    let rel = rel(&engine(), 44, 45).await;

    assert_eq!(rel.label(), LabelKey::FullSibling);
    assert!(rel.canonical.modifiers.is_empty());
    assert_eq!(rel.common_ancestors, ids(&[46, 47]));

    assert_eq!(rel.alternates.len(), 1);
    assert_eq!(rel.alternates[0].canonical_label_key, LabelKey::FullSibling);
    assert_eq!(rel.alternates[0].modifiers, modifiers(&[Modifier::Adoptive]));
}

#[tokio::test]
async fn test_married_cousins_keep_blood_relationship() {
    let rel = rel(&engine(), 53, 54).await;

    assert_eq!(rel.label(), LabelKey::FirstCousin);
    assert!(rel.canonical.modifiers.is_empty());
    assert_eq!(rel.common_ancestors, ids(&[50, 56]));

    assert_eq!(rel.alternates.len(), 1);
    assert_eq!(rel.alternates[0].canonical_label_key, LabelKey::Spouse);
}

#[tokio::test]
async fn test_step_child_who_is_also_a_cousin() {
    let engine = engine();

    let child = rel(&engine, 53, 55).await;
    assert_eq!(child.label(), LabelKey::FirstCousin);
    assert_eq!((child.canonical.lineage_degree, child.canonical.removal), (1, 1));
    assert!(child
        .alternates
        .iter()
        .any(|d| d.canonical_label_key == LabelKey::Child && d.has(Modifier::Step)));

    let parent = rel(&engine, 55, 53).await;
    assert_eq!(parent.canonical, child.canonical.inverse());
}

#[tokio::test]
async fn test_partnerships_can_be_disabled() {
    let store = Arc::new(InMemoryFamilyStore::from_records(build_family()).unwrap());
    let policy = KinshipPolicyV1 {
        include_partnerships: false,
        ..KinshipPolicyV1::default()
    };
    let engine = RelationshipEngine::new(store, Default::default(), policy);

    assert!(!engine.compute_relationship(p(16), p(17)).await.unwrap().is_related());
    assert!(!engine.compute_relationship(p(14), p(15)).await.unwrap().is_related());
}

#[tokio::test]
async fn test_every_pair_is_deterministic_across_engines() {
    let first = engine();
    let second = engine();

    for a in [3u128, 6, 9, 12, 16, 40, 44, 53] {
        for b in [1u128, 4, 7, 11, 14, 43, 45, 55] {
            assert_eq!(rel(&first, a, b).await, rel(&second, a, b).await);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Generated Families
// ─────────────────────────────────────────────────────────────────────────────

/// People `0..n`; each person draws up to two distinct biological parents
/// from those before it, so the graph is acyclic by construction.
fn arb_family() -> impl Strategy<Value = FamilyRecords> {
    (3usize..14).prop_flat_map(|n| {
        proptest::collection::vec((any::<prop::sample::Index>(), any::<prop::sample::Index>(), 0u8..3), n)
            .prop_map(move |draws| {
                let mut records = FamilyRecords::new().with_people((0..n as u128).map(p));
                for (child, (first, second, count)) in draws.into_iter().enumerate().skip(1) {
                    let mut parents = BTreeSet::new();
                    if count >= 1 {
                        parents.insert(first.index(child));
                    }
                    if count >= 2 {
                        parents.insert(second.index(child));
                    }
                    for parent in parents {
                        records = records.with_parent(bio(child as u128, parent as u128));
                    }
                }
                records
            })
    })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_pairs_are_inverse_and_stable(records in arb_family()) {
        let people: Vec<PersonId> = records.people.iter().copied().collect();
        let engine = RelationshipEngine::with_defaults(Arc::new(
            InMemoryFamilyStore::from_records(records).unwrap(),
        ));

        runtime().block_on(async {
            for &a in &people {
                let own = engine.compute_relationship(a, a).await.unwrap();
                prop_assert_eq!(own.canonical.direction, Direction::SelfPerson);
                prop_assert_eq!(own.canonical.lineage_degree, 0);

                for &b in &people {
                    if a == b {
                        continue;
                    }
                    let ab = engine.compute_relationship(a, b).await.unwrap();
                    let ba = engine.compute_relationship(b, a).await.unwrap();
                    prop_assert_eq!(&ab, &ba.inverse());
                    prop_assert_eq!(ab.canonical.lineage_degree, ba.canonical.lineage_degree);
                    prop_assert_eq!(ab.canonical.removal, ba.canonical.removal);
                    prop_assert_eq!(&ab.canonical.modifiers, &ba.canonical.modifiers);

                    engine.invalidate();
                    let again = engine.compute_relationship(a, b).await.unwrap();
                    prop_assert_eq!(&ab, &again);
                }
            }
            Ok(())
        })?;
    }

    #[test]
    fn prop_lineal_degree_matches_ancestor_generation(records in arb_family()) {
        let people: Vec<PersonId> = records.people.iter().copied().collect();
        let engine = RelationshipEngine::with_defaults(Arc::new(
            InMemoryFamilyStore::from_records(records).unwrap(),
        ));

        runtime().block_on(async {
            for &a in &people {
                let ancestors = engine.ancestors(a, 64).await.unwrap();
                for &b in &people {
                    if a == b {
                        continue;
                    }
                    let rel = engine.compute_relationship(a, b).await.unwrap();
                    if rel.canonical.direction == Direction::Ascendant {
                        prop_assert!(ancestors.contains(&(b, rel.canonical.lineage_degree)));
                    }
                }
            }
            Ok(())
        })?;
    }
}
