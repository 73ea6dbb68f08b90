//! Language-neutral relationship descriptors.
//!
//! A descriptor for the ordered pair `(A, B)` states what B is to A. Text is
//! produced elsewhere: `canonical_label_key` is a symbolic key a formatter
//! resolves per locale, using `lineage_degree` and `removal` for ordinals and
//! "great-" prefixes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::person::{GraphVersion, PersonId};

/// Generational direction of B relative to A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// B is an ancestor of A.
    Ascendant,
    /// B is a descendant of A.
    Descendant,
    /// B shares an ancestor (or a partnership) with A but is in neither line.
    Collateral,
    /// A and B are the same person.
    #[serde(rename = "self")]
    SelfPerson,
    /// No path exists at the observed version.
    Unrelated,
}

impl Direction {
    /// Direction of A relative to B.
    pub fn inverse(&self) -> Self {
        match self {
            Self::Ascendant => Self::Descendant,
            Self::Descendant => Self::Ascendant,
            other => *other,
        }
    }
}

/// Qualifier on a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    /// Exactly one parent shared at the sibling level.
    Half,
    /// Connected through a partnership, step or foster edge.
    Step,
    /// An adoptive edge lies on the path.
    Adoptive,
}

/// Symbolic label resolved to text by an external formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LabelKey {
    /// Same person.
    #[serde(rename = "SELF")]
    SelfPerson,
    /// Direct partner.
    Spouse,
    /// One generation up.
    Parent,
    /// One generation down.
    Child,
    /// Two generations up.
    Grandparent,
    /// Two generations down.
    Grandchild,
    /// Three or more generations up (great x (degree - 2)).
    GreatGrandparent,
    /// Three or more generations down.
    GreatGrandchild,
    /// Both parents shared.
    FullSibling,
    /// One parent shared.
    HalfSibling,
    /// Related through a parent's partnership.
    StepSibling,
    /// Sibling of an ancestor (removal 2 = great-aunt/uncle).
    AuntUncle,
    /// Descendant of a sibling.
    NieceNephew,
    /// Cousin of degree 1.
    FirstCousin,
    /// Cousin of degree 2.
    SecondCousin,
    /// Cousin of degree 3.
    ThirdCousin,
    /// Named cousin of degree 4 or more.
    NthCousin,
    /// Cousin beyond the naming cut-off.
    DistantCousin,
    /// No relationship.
    Unrelated,
}

impl LabelKey {
    /// Label for the inverse direction.
    pub fn inverse(&self) -> Self {
        match self {
            Self::Parent => Self::Child,
            Self::Child => Self::Parent,
            Self::Grandparent => Self::Grandchild,
            Self::Grandchild => Self::Grandparent,
            Self::GreatGrandparent => Self::GreatGrandchild,
            Self::GreatGrandchild => Self::GreatGrandparent,
            Self::AuntUncle => Self::NieceNephew,
            Self::NieceNephew => Self::AuntUncle,
            other => *other,
        }
    }

    /// Stable symbolic key as emitted on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfPerson => "SELF",
            Self::Spouse => "SPOUSE",
            Self::Parent => "PARENT",
            Self::Child => "CHILD",
            Self::Grandparent => "GRANDPARENT",
            Self::Grandchild => "GRANDCHILD",
            Self::GreatGrandparent => "GREAT_GRANDPARENT",
            Self::GreatGrandchild => "GREAT_GRANDCHILD",
            Self::FullSibling => "FULL_SIBLING",
            Self::HalfSibling => "HALF_SIBLING",
            Self::StepSibling => "STEP_SIBLING",
            Self::AuntUncle => "AUNT_UNCLE",
            Self::NieceNephew => "NIECE_NEPHEW",
            Self::FirstCousin => "FIRST_COUSIN",
            Self::SecondCousin => "SECOND_COUSIN",
            Self::ThirdCousin => "THIRD_COUSIN",
            Self::NthCousin => "NTH_COUSIN",
            Self::DistantCousin => "DISTANT_COUSIN",
            Self::Unrelated => "UNRELATED",
        }
    }
}

impl std::fmt::Display for LabelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured kinship between two people.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipDescriptor {
    /// Generations for lineal relationships, cousin degree for collateral ones.
    pub lineage_degree: u32,
    /// Generational offset between collateral relatives.
    pub removal: u32,
    /// Direction of B relative to A.
    pub direction: Direction,
    /// Qualifiers (half, step, adoptive).
    pub modifiers: BTreeSet<Modifier>,
    /// Symbolic label key.
    pub canonical_label_key: LabelKey,
}

impl RelationshipDescriptor {
    /// Create a descriptor.
    pub fn new(
        lineage_degree: u32,
        removal: u32,
        direction: Direction,
        modifiers: BTreeSet<Modifier>,
        canonical_label_key: LabelKey,
    ) -> Self {
        Self {
            lineage_degree,
            removal,
            direction,
            modifiers,
            canonical_label_key,
        }
    }

    /// A person relative to themselves.
    pub fn self_person() -> Self {
        Self::new(0, 0, Direction::SelfPerson, BTreeSet::new(), LabelKey::SelfPerson)
    }

    /// No path between the two people.
    pub fn unrelated() -> Self {
        Self::new(0, 0, Direction::Unrelated, BTreeSet::new(), LabelKey::Unrelated)
    }

    /// Descriptor for `(B, A)` given this descriptor for `(A, B)`.
    pub fn inverse(&self) -> Self {
        Self {
            lineage_degree: self.lineage_degree,
            removal: self.removal,
            direction: self.direction.inverse(),
            modifiers: self.modifiers.clone(),
            canonical_label_key: self.canonical_label_key.inverse(),
        }
    }

    /// Whether the modifier set contains `modifier`.
    pub fn has(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }

    /// Whether any path connects the two people.
    pub fn is_related(&self) -> bool {
        self.direction != Direction::Unrelated
    }
}

/// Result of resolving one ordered pair.
///
/// `canonical` is the highest-ranked descriptor; `alternates` lists every
/// other distinct descriptor found at the same minimal distance, in rank
/// order, so callers can disclose "also related as" without recomputing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Highest-priority descriptor.
    pub canonical: RelationshipDescriptor,
    /// Other distinct descriptors, best first.
    pub alternates: Vec<RelationshipDescriptor>,
    /// Apex people of every path classified as `canonical` (both partners
    /// for a partnership bridge), sorted.
    pub common_ancestors: Vec<PersonId>,
    /// Graph version the result was computed against.
    pub graph_version: GraphVersion,
}

impl Relationship {
    /// A person relative to themselves.
    pub fn self_person(graph_version: GraphVersion) -> Self {
        Self {
            canonical: RelationshipDescriptor::self_person(),
            alternates: Vec::new(),
            common_ancestors: Vec::new(),
            graph_version,
        }
    }

    /// No path at `graph_version`.
    pub fn unrelated(graph_version: GraphVersion) -> Self {
        Self {
            canonical: RelationshipDescriptor::unrelated(),
            alternates: Vec::new(),
            common_ancestors: Vec::new(),
            graph_version,
        }
    }

    /// Whether the two people are related at all.
    pub fn is_related(&self) -> bool {
        self.canonical.is_related()
    }

    /// Canonical label key.
    pub fn label(&self) -> LabelKey {
        self.canonical.canonical_label_key
    }

    /// The same relationship seen from the other person.
    pub fn inverse(&self) -> Self {
        Self {
            canonical: self.canonical.inverse(),
            alternates: self.alternates.iter().map(RelationshipDescriptor::inverse).collect(),
            common_ancestors: self.common_ancestors.clone(),
            graph_version: self.graph_version,
        }
    }
}
