//! Edge types for the family graph.

use serde::{Deserialize, Serialize};
use super::person::PersonId;

/// Provenance of a parent-child edge.
///
/// Kind affects labeling only; every edge counts as one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentKind {
    /// Birth parent.
    Biological,
    /// Legal adoptive parent.
    Adoptive,
    /// Partner of a custodial parent.
    Step,
    /// Foster carer.
    Foster,
}

impl ParentKind {
    /// Parse parent kind from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "biological" | "birth" | "" => Some(Self::Biological),
            "adoptive" | "adopted" => Some(Self::Adoptive),
            "step" => Some(Self::Step),
            "foster" => Some(Self::Foster),
            _ => None,
        }
    }

    /// Whether the edge reaches the parent only through a custodial partnership.
    pub fn is_step_like(&self) -> bool {
        matches!(self, Self::Step | Self::Foster)
    }
}

impl Default for ParentKind {
    fn default() -> Self {
        Self::Biological
    }
}

impl std::fmt::Display for ParentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Biological => write!(f, "biological"),
            Self::Adoptive => write!(f, "adoptive"),
            Self::Step => write!(f, "step"),
            Self::Foster => write!(f, "foster"),
        }
    }
}

/// Directed edge from a child up to one of its parents.
///
/// `parent_set` is the ordinal of the parent-set the edge belongs to: the
/// group of parents active during one partnership period of the child's
/// custodial parent (0 is the first set).
///
/// Derived `Ord` gives the canonical order (child, parent, kind, parent_set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParentEdge {
    /// The child (source of the upward walk).
    pub child: PersonId,
    /// The parent (target of the upward walk).
    pub parent: PersonId,
    /// Provenance of the edge.
    pub kind: ParentKind,
    /// Parent-set ordinal.
    pub parent_set: u32,
}

impl ParentEdge {
    /// Create a new parent edge.
    pub fn new(child: PersonId, parent: PersonId, kind: ParentKind, parent_set: u32) -> Self {
        Self {
            child,
            parent,
            kind,
            parent_set,
        }
    }

    /// Biological edge in the first parent-set.
    pub fn biological(child: PersonId, parent: PersonId) -> Self {
        Self::new(child, parent, ParentKind::Biological, 0)
    }

    /// Adoptive edge in the given parent-set.
    pub fn adoptive(child: PersonId, parent: PersonId, parent_set: u32) -> Self {
        Self::new(child, parent, ParentKind::Adoptive, parent_set)
    }

    /// Step edge in the given parent-set.
    pub fn step(child: PersonId, parent: PersonId, parent_set: u32) -> Self {
        Self::new(child, parent, ParentKind::Step, parent_set)
    }
}

/// Kind of partnership between two people.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnershipKind {
    /// Marriage.
    Marriage,
    /// Registered civil union.
    CivilUnion,
    /// Unregistered domestic partnership.
    DomesticPartnership,
}

impl PartnershipKind {
    /// Parse partnership kind from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "marriage" | "married" | "" => Some(Self::Marriage),
            "civil_union" | "civil union" => Some(Self::CivilUnion),
            "domestic_partnership" | "partnership" | "partner" => Some(Self::DomesticPartnership),
            _ => None,
        }
    }
}

impl Default for PartnershipKind {
    fn default() -> Self {
        Self::Marriage
    }
}

impl std::fmt::Display for PartnershipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Marriage => write!(f, "marriage"),
            Self::CivilUnion => write!(f, "civil_union"),
            Self::DomesticPartnership => write!(f, "domestic_partnership"),
        }
    }
}

/// Undirected partnership between two people.
///
/// Normalized on construction so `person_a <= person_b`. The `ordinal`
/// distinguishes first, second, ... partnerships and only breaks ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartnershipEdge {
    /// Lower person identifier.
    pub person_a: PersonId,
    /// Higher person identifier.
    pub person_b: PersonId,
    /// Kind of partnership.
    pub kind: PartnershipKind,
    /// Partnership ordinal (0 = first).
    pub ordinal: u32,
}

impl PartnershipEdge {
    /// Create a new partnership, normalizing the endpoint order.
    pub fn new(a: PersonId, b: PersonId, kind: PartnershipKind, ordinal: u32) -> Self {
        let (person_a, person_b) = if a <= b { (a, b) } else { (b, a) };
        Self {
            person_a,
            person_b,
            kind,
            ordinal,
        }
    }

    /// First marriage between two people.
    pub fn marriage(a: PersonId, b: PersonId) -> Self {
        Self::new(a, b, PartnershipKind::Marriage, 0)
    }

    /// The partner of `person` on this edge, if `person` is an endpoint.
    pub fn other(&self, person: PersonId) -> Option<PersonId> {
        if person == self.person_a {
            Some(self.person_b)
        } else if person == self.person_b {
            Some(self.person_a)
        } else {
            None
        }
    }

    /// Whether `person` is one of the endpoints.
    pub fn involves(&self, person: PersonId) -> bool {
        self.person_a == person || self.person_b == person
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_edge_ordering() {
        let c1 = PersonId::from_u128(1);
        let c2 = PersonId::from_u128(2);
        let p = PersonId::from_u128(3);

        let e1 = ParentEdge::biological(c1, p);
        let e2 = ParentEdge::biological(c2, p);
        let e3 = ParentEdge::adoptive(c1, p, 1);

        // Child first, then parent, then kind
        assert!(e1 < e2);
        assert!(e1 < e3);
        assert!(e3 < e2);
    }

    #[test]
    fn test_partnership_is_normalized() {
        let a = PersonId::from_u128(9);
        let b = PersonId::from_u128(4);

        let edge = PartnershipEdge::marriage(a, b);
        assert_eq!(edge.person_a, b);
        assert_eq!(edge.person_b, a);
        assert_eq!(edge, PartnershipEdge::marriage(b, a));
        assert_eq!(edge.other(a), Some(b));
        assert_eq!(edge.other(PersonId::from_u128(1)), None);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(ParentKind::from_str("Adoptive"), Some(ParentKind::Adoptive));
        assert_eq!(ParentKind::from_str(""), Some(ParentKind::Biological));
        assert_eq!(ParentKind::from_str("godparent"), None);
        assert!(ParentKind::Foster.is_step_like());
        assert_eq!(PartnershipKind::from_str("civil union"), Some(PartnershipKind::CivilUnion));
    }
}
