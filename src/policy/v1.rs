//! KinshipPolicy v1: traversal bounds and naming cut-offs.
//!
//! Every parameter that can change an answer lives here, and the policy's
//! `params_hash` is folded into cache keys so results computed under
//! different policies never mix.

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_hash_hex;
use crate::DEFAULT_POLICY_VERSION;

/// Kinship resolution policy version 1.
///
/// ## Parameters
///
/// - `max_generations`: Upward search bound per side
/// - `max_legs_per_side`: Distinct legs enumerated per apex per side
/// - `include_partnerships`: Whether partnership bridges yield step relationships
/// - `max_named_cousin_degree`: Cousin degree beyond which the label is `DISTANT_COUSIN`
/// - `max_named_removal`: Removal beyond which the label is `DISTANT_COUSIN`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KinshipPolicyV1 {
    /// Policy version identifier.
    pub version: String,
    /// Maximum generations walked upward from either person.
    pub max_generations: u32,
    /// Maximum distinct legs enumerated per apex on each side.
    pub max_legs_per_side: usize,
    /// Whether partnerships between ancestors are bridged.
    pub include_partnerships: bool,
    /// Highest cousin degree that gets a named label.
    pub max_named_cousin_degree: u32,
    /// Highest removal that gets a named cousin label.
    pub max_named_removal: u32,
}

impl KinshipPolicyV1 {
    /// Create a new policy with custom parameters.
    pub fn new(
        max_generations: u32,
        max_legs_per_side: usize,
        include_partnerships: bool,
        max_named_cousin_degree: u32,
        max_named_removal: u32,
    ) -> Self {
        Self {
            version: DEFAULT_POLICY_VERSION.to_string(),
            max_generations: max_generations.max(1),
            max_legs_per_side: max_legs_per_side.max(1),
            include_partnerships,
            max_named_cousin_degree,
            max_named_removal,
        }
    }

    /// Get the policy ID.
    pub fn policy_id(&self) -> &str {
        &self.version
    }

    /// Compute a hash of the policy parameters.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(self)
    }

    /// Whether a cousin of this degree and removal gets a named label.
    pub fn names_cousin(&self, degree: u32, removal: u32) -> bool {
        degree <= self.max_named_cousin_degree && removal <= self.max_named_removal
    }

    /// Policy with a short search horizon for tests.
    #[cfg(test)]
    pub fn minimal() -> Self {
        Self::new(4, 4, true, 3, 1)
    }
}

impl Default for KinshipPolicyV1 {
    fn default() -> Self {
        Self {
            version: DEFAULT_POLICY_VERSION.to_string(),
            max_generations: 64,
            max_legs_per_side: 32,
            include_partnerships: true,
            max_named_cousin_degree: 8,
            max_named_removal: 4,
        }
    }
}
