//! Router retrieval nodes.

use std::sync::Arc;

use medirag_contracts::{
    attributes::{AttributeMap, Subject},
    document::Document,
    error::MediragResult,
    search::SearchParameters,
};

use crate::{
    merge::merge,
    node::{gate_allows, RetrieverNode},
    traits::{AccessEvaluator, Retriever},
};

/// A retrieval node that owns child nodes and merges their results.
///
/// A router has no document-level check of its own: disclosure of each
/// document is decided by the leaf that holds it.
pub struct RouterNode {
    id: String,
    attributes: AttributeMap,
    gate: Option<Arc<dyn AccessEvaluator>>,
    children: Vec<RetrieverNode>,
}

impl RouterNode {
    pub fn new(id: impl Into<String>, attributes: AttributeMap, children: Vec<RetrieverNode>) -> Self {
        Self {
            id: id.into(),
            attributes,
            gate: None,
            children,
        }
    }

    /// Guard whether this subtree may be searched at all.
    pub fn gate(mut self, gate: Arc<dyn AccessEvaluator>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn children(&self) -> &[RetrieverNode] {
        &self.children
    }

    /// Query every child in order, concatenate, and merge to `params.k`.
    ///
    /// A denied gate returns before any child is visited. A child error
    /// (such as an unavailable index) fails the whole subtree.
    pub fn retrieve(
        &self,
        query: &str,
        subject: &Subject,
        params: &SearchParameters,
    ) -> MediragResult<Vec<Document>> {
        if !gate_allows(self.gate.as_ref(), &self.id, &self.attributes, subject, params) {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        for child in &self.children {
            documents.extend(child.retrieve(query, subject, params)?);
        }
        Ok(merge(documents, params.k))
    }
}
