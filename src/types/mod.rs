//! Core types for the kinship kernel.

pub mod person;
pub mod edge;
pub mod path;
pub mod descriptor;
pub mod deadline;
pub mod error;

pub use person::{PersonId, GraphVersion, PersonPair};
pub use edge::{ParentEdge, ParentKind, PartnershipEdge, PartnershipKind};
pub use path::{Apex, LegProvenance, RelationshipPath, leg_provenance};
pub use descriptor::{Direction, LabelKey, Modifier, Relationship, RelationshipDescriptor};
pub use deadline::{CancelToken, Deadline};
pub use error::{AbortReason, KinshipError};
