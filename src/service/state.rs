//! Service state management.
//!
//! Holds the shared relationship engine and the per-request time budget.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheConfig, RelationshipCache};
use crate::engine::RelationshipEngine;
use crate::policy::KinshipPolicyV1;
use crate::store::FamilyStore;
use crate::types::Deadline;

/// Reference to the policy answers were computed under.
///
/// Echoed in responses so clients can tell results from differently
/// configured deployments apart.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PolicyRef {
    /// Policy type identifier (e.g., "kinship_policy_v1")
    pub policy_id: String,
    /// xxHash64 of canonical policy JSON
    pub params_hash: String,
}

impl PolicyRef {
    /// Create a policy reference from a policy.
    pub fn from_policy(policy: &KinshipPolicyV1) -> Self {
        Self {
            policy_id: policy.policy_id().to_string(),
            params_hash: policy.params_hash(),
        }
    }
}

/// Shared service state.
pub struct ServiceState<S: FamilyStore> {
    /// The engine answering every request.
    pub engine: Arc<RelationshipEngine<S>>,
    /// Reference to the engine's policy.
    pub policy_ref: PolicyRef,
    /// Budget applied to requests that do not name their own.
    pub request_timeout: Option<Duration>,
}

impl<S: FamilyStore> ServiceState<S> {
    /// Create service state around an engine.
    pub fn new(engine: RelationshipEngine<S>, request_timeout: Option<Duration>) -> Self {
        let policy_ref = PolicyRef::from_policy(engine.policy());
        Self {
            engine: Arc::new(engine),
            policy_ref,
            request_timeout,
        }
    }

    /// Create service state from environment variables.
    ///
    /// Reads the cache settings (see [`CacheConfig::from_env`]) and
    /// `KINSHIP_REQUEST_TIMEOUT_MS`. A timeout of `0` or an unset variable
    /// means no default budget.
    pub fn from_env(store: S, policy: KinshipPolicyV1) -> Self {
        let cache = Arc::new(RelationshipCache::new(CacheConfig::from_env()));
        let request_timeout = std::env::var("KINSHIP_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        if request_timeout.is_none() {
            tracing::warn!("KINSHIP_REQUEST_TIMEOUT_MS not set, requests run without a deadline");
        }

        Self::new(
            RelationshipEngine::new(Arc::new(store), cache, policy),
            request_timeout,
        )
    }

    /// Deadline for one request, preferring the request's own budget.
    pub fn deadline(&self, timeout_ms: Option<u64>) -> Deadline {
        match timeout_ms.map(Duration::from_millis).or(self.request_timeout) {
            Some(budget) => Deadline::after(budget),
            None => Deadline::none(),
        }
    }
}

impl<S: FamilyStore> Clone for ServiceState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            policy_ref: self.policy_ref.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryFamilyStore;

    #[test]
    fn test_policy_ref_from_policy() {
        let policy = KinshipPolicyV1::default();
        let ref1 = PolicyRef::from_policy(&policy);
        let ref2 = PolicyRef::from_policy(&policy);

        assert_eq!(ref1, ref2);
        assert_eq!(ref1.policy_id, "kinship_policy_v1");
        assert_ne!(ref1, PolicyRef::from_policy(&KinshipPolicyV1::minimal()));
    }

    #[test]
    fn test_request_budget_overrides_default() {
        let engine = RelationshipEngine::with_defaults(Arc::new(InMemoryFamilyStore::new()));
        let state = ServiceState::new(engine, None);

        assert!(state.deadline(None).remaining().is_none());
        assert!(state.deadline(Some(5_000)).remaining().is_some());
    }
}
