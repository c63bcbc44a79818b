//! The allow-overrides policy decision point.
//!
//! Evaluation algorithm:
//!
//! 1. Iterate policies in store order.
//! 2. The first `allow` policy whose subject, resource, action and context
//!    rules all match decides `Allow`.
//! 3. Otherwise `Deny`. A matching `deny` policy cannot override an allow,
//!    and an empty store denies everything.

use std::path::Path;

use tracing::debug;

use medirag_contracts::{
    access::{AccessDecision, AccessRequest},
    error::MediragResult,
};
use medirag_core::traits::AccessEvaluator;

use crate::{rule::Effect, store::PolicyStore};

/// An `AccessEvaluator` over a fixed `PolicyStore`.
///
/// ```rust,ignore
/// use medirag_policy::AbacPdp;
///
/// let pdp = AbacPdp::from_file(Path::new("policies/hospital_a.toml"))?;
/// let leaf = LeafNode::new(...).gate(Arc::new(pdp));
/// ```
#[derive(Debug, Clone, Default)]
pub struct AbacPdp {
    store: PolicyStore,
}

impl AbacPdp {
    pub fn new(store: PolicyStore) -> Self {
        Self { store }
    }

    pub fn from_toml_str(s: &str) -> MediragResult<Self> {
        PolicyStore::from_toml_str(s).map(Self::new)
    }

    pub fn from_json_str(s: &str) -> MediragResult<Self> {
        PolicyStore::from_json_str(s).map(Self::new)
    }

    pub fn from_file(path: &Path) -> MediragResult<Self> {
        PolicyStore::from_file(path).map(Self::new)
    }

    pub fn store(&self) -> &PolicyStore {
        &self.store
    }
}

impl AccessEvaluator for AbacPdp {
    fn evaluate(&self, request: &AccessRequest) -> AccessDecision {
        let granted_by = self
            .store
            .policies()
            .iter()
            .filter(|policy| policy.effect() == Effect::Allow)
            .find(|policy| policy.matches(request));

        match granted_by {
            Some(policy) => {
                debug!(
                    policy_id = %policy.id(),
                    resource_id = request.resource.id.as_deref().unwrap_or("-"),
                    "access allowed"
                );
                AccessDecision::Allow
            }
            None => {
                debug!(
                    resource_id = request.resource.id.as_deref().unwrap_or("-"),
                    "no allow policy matched; denying by default"
                );
                AccessDecision::Deny
            }
        }
    }
}
