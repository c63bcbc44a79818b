//! Loading and validating an ordered set of policies.

use std::{collections::BTreeSet, path::Path};

use serde::Deserialize;
use tracing::debug;

use medirag_contracts::error::{MediragError, MediragResult};

use crate::rule::{compile, CompiledPolicy, PolicySpec};

/// Top-level shape of a policy document: `[[policies]]` in TOML, or
/// `{"policies": [...]}` in JSON.
#[derive(Debug, Deserialize)]
struct PolicyDocument {
    #[serde(default)]
    policies: Vec<PolicySpec>,
}

/// JSON documents may also be a bare array of policies.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonPolicyDocument {
    Wrapped(PolicyDocument),
    Bare(Vec<PolicySpec>),
}

/// An ordered, validated collection of policies.
///
/// Every policy has been compiled, and ids are unique. The store is
/// immutable once built and safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    policies: Vec<CompiledPolicy>,
}

impl PolicyStore {
    /// Compile `specs` in order.
    ///
    /// Returns `MediragError::PolicyConfiguration` for the first malformed
    /// policy or for a repeated policy id.
    pub fn from_policies(specs: Vec<PolicySpec>) -> MediragResult<Self> {
        let mut seen = BTreeSet::new();
        let mut policies = Vec::with_capacity(specs.len());
        for spec in specs {
            if !seen.insert(spec.id.clone()) {
                return Err(MediragError::PolicyConfiguration {
                    reason: format!("duplicate policy id '{}'", spec.id),
                });
            }
            policies.push(compile(spec)?);
        }
        debug!(policies = policies.len(), "policy store loaded");
        Ok(Self { policies })
    }

    /// Parse a TOML policy document.
    pub fn from_toml_str(s: &str) -> MediragResult<Self> {
        let document: PolicyDocument =
            toml::from_str(s).map_err(|e| MediragError::PolicyConfiguration {
                reason: format!("failed to parse policy TOML: {}", e),
            })?;
        Self::from_policies(document.policies)
    }

    /// Parse a JSON policy document (wrapped or bare array).
    pub fn from_json_str(s: &str) -> MediragResult<Self> {
        let document: JsonPolicyDocument =
            serde_json::from_str(s).map_err(|e| MediragError::PolicyConfiguration {
                reason: format!("failed to parse policy JSON: {}", e),
            })?;
        let specs = match document {
            JsonPolicyDocument::Wrapped(doc) => doc.policies,
            JsonPolicyDocument::Bare(specs) => specs,
        };
        Self::from_policies(specs)
    }

    /// Read a policy file. `.json` files are parsed as JSON, anything else as TOML.
    pub fn from_file(path: &Path) -> MediragResult<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| MediragError::PolicyConfiguration {
                reason: format!("failed to read policy file '{}': {}", path.display(), e),
            })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_toml_str(&contents)
        }
    }

    pub fn policies(&self) -> &[CompiledPolicy] {
        &self.policies
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
