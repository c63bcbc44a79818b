//! Access requests, decisions, and decision records.
//!
//! An `AccessRequest` is built fresh for every node-gate check and for every
//! candidate document. The evaluator turns it into an `AccessDecision`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::attributes::{AttributeMap, Subject};

/// The only action the retrieval engine ever requests.
pub const READ: &str = "read";

/// One side of an access request: an optional identifier plus attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: Option<String>,
    pub attributes: AttributeMap,
}

/// The four-part request a policy decision point evaluates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub subject: Entity,
    pub resource: Entity,
    pub action: Entity,
    pub context: AttributeMap,
}

impl AccessRequest {
    /// Request to search a node at all (the node gate).
    ///
    /// The subject id is the `sub` claim; the resource is the node itself,
    /// described by its configured attributes.
    pub fn node_read(subject: &Subject, node_id: &str, node_attributes: &AttributeMap) -> Self {
        Self {
            subject: Entity {
                id: subject.id().map(str::to_string),
                attributes: subject.attributes().clone(),
            },
            resource: Entity {
                id: Some(node_id.to_string()),
                attributes: node_attributes.clone(),
            },
            action: read_action(),
            context: AttributeMap::new(),
        }
    }

    /// Request to disclose one candidate document, described by its metadata.
    pub fn document_read(subject: &Subject, document_metadata: &AttributeMap) -> Self {
        Self {
            subject: Entity {
                id: None,
                attributes: subject.attributes().clone(),
            },
            resource: Entity {
                id: None,
                attributes: document_metadata.clone(),
            },
            action: read_action(),
            context: AttributeMap::new(),
        }
    }
}

fn read_action() -> Entity {
    let mut attributes = AttributeMap::new();
    attributes.insert("method".to_string(), json!(READ));
    Entity { id: None, attributes }
}

/// The outcome of evaluating one access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessDecision {
    Allow,
    Deny,
}

impl AccessDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

impl From<bool> for AccessDecision {
    fn from(allowed: bool) -> Self {
        if allowed {
            AccessDecision::Allow
        } else {
            AccessDecision::Deny
        }
    }
}

/// One access decision, as written to the decision audit log.
///
/// Only the subject's stable identifier is recorded, never its attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Label of the evaluator that decided (e.g. `"A/psychiatry:documents"`).
    pub evaluator: String,
    /// The subject's `sub` claim, if any.
    pub subject_id: Option<String>,
    /// The resource id, if the request named one.
    pub resource_id: Option<String>,
    pub decision: AccessDecision,
    /// Wall-clock time the decision was recorded (UTC).
    pub timestamp: DateTime<Utc>,
}

impl DecisionRecord {
    /// Build a record for `request` stamped with the current time.
    pub fn new(evaluator: impl Into<String>, request: &AccessRequest, decision: AccessDecision) -> Self {
        Self {
            evaluator: evaluator.into(),
            subject_id: request.subject.id.clone(),
            resource_id: request.resource.id.clone(),
            decision,
            timestamp: Utc::now(),
        }
    }
}
