//! The retrieval node hierarchy.
//!
//! An organization's tree is a `RetrieverNode`: either a `Leaf` that owns a
//! corpus and index, or a `Router` that owns child nodes. Both variants share
//! the `Retriever` contract and the node-gate check below.

use std::sync::Arc;

use tracing::debug;

use medirag_contracts::{
    access::AccessRequest,
    attributes::{AttributeMap, Subject},
    document::Document,
    error::MediragResult,
    search::SearchParameters,
};

use crate::{
    leaf::LeafNode,
    router::RouterNode,
    traits::{AccessEvaluator, Retriever},
};

/// A node of an organization's retrieval tree.
pub enum RetrieverNode {
    Leaf(LeafNode),
    Router(RouterNode),
}

impl RetrieverNode {
    pub fn attributes(&self) -> &AttributeMap {
        match self {
            RetrieverNode::Leaf(leaf) => leaf.attributes(),
            RetrieverNode::Router(router) => router.attributes(),
        }
    }
}

impl Retriever for RetrieverNode {
    fn id(&self) -> &str {
        match self {
            RetrieverNode::Leaf(leaf) => leaf.id(),
            RetrieverNode::Router(router) => router.id(),
        }
    }

    fn retrieve(
        &self,
        query: &str,
        subject: &Subject,
        params: &SearchParameters,
    ) -> MediragResult<Vec<Document>> {
        match self {
            RetrieverNode::Leaf(leaf) => leaf.retrieve(query, subject, params),
            RetrieverNode::Router(router) => router.retrieve(query, subject, params),
        }
    }
}

impl From<LeafNode> for RetrieverNode {
    fn from(leaf: LeafNode) -> Self {
        RetrieverNode::Leaf(leaf)
    }
}

impl From<RouterNode> for RetrieverNode {
    fn from(router: RouterNode) -> Self {
        RetrieverNode::Router(router)
    }
}

/// Decide whether `subject` may search the node at all.
///
/// Passes when the query is insecure, when no gate is configured, or when
/// the gate allows a `read` of the node described by `node_attributes`.
pub(crate) fn gate_allows(
    gate: Option<&Arc<dyn AccessEvaluator>>,
    node_id: &str,
    node_attributes: &AttributeMap,
    subject: &Subject,
    params: &SearchParameters,
) -> bool {
    let Some(gate) = gate else {
        return true;
    };
    if !params.secure {
        return true;
    }

    let request = AccessRequest::node_read(subject, node_id, node_attributes);
    let allowed = gate.evaluate(&request).is_allowed();
    debug!(
        node_id = %node_id,
        subject_id = subject.id().unwrap_or("-"),
        allowed,
        "node gate evaluated"
    );
    allowed
}
