//! Leaf retrieval nodes.
//!
//! A leaf owns one corpus and the similarity index built over it. Retrieval
//! runs in the order gate → index → per-document check → merge, and the
//! index is never touched when the gate denies.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use medirag_contracts::{
    access::AccessRequest,
    attributes::{AttributeMap, Subject},
    document::Document,
    error::{MediragError, MediragResult},
    search::SearchParameters,
};

use crate::{
    corpus::Corpus,
    index::MetadataFilter,
    merge::merge,
    node::gate_allows,
    traits::{AccessEvaluator, IndexBuilder, SimilarityIndex},
};

/// A retrieval node that owns a document corpus and its index.
pub struct LeafNode {
    id: String,
    attributes: AttributeMap,
    gate: Option<Arc<dyn AccessEvaluator>>,
    document_policy: Option<Arc<dyn AccessEvaluator>>,
    corpus: Corpus,
    builder: Option<Arc<dyn IndexBuilder>>,
    index: Mutex<Option<Arc<dyn SimilarityIndex>>>,
}

impl LeafNode {
    /// A leaf whose index is built from `corpus` by `builder` on first use.
    pub fn new(
        id: impl Into<String>,
        attributes: AttributeMap,
        corpus: Corpus,
        builder: Arc<dyn IndexBuilder>,
    ) -> Self {
        Self {
            id: id.into(),
            attributes,
            gate: None,
            document_policy: None,
            corpus,
            builder: Some(builder),
            index: Mutex::new(None),
        }
    }

    /// A leaf over an index that already exists.
    pub fn with_index(
        id: impl Into<String>,
        attributes: AttributeMap,
        index: Arc<dyn SimilarityIndex>,
    ) -> Self {
        Self {
            id: id.into(),
            attributes,
            gate: None,
            document_policy: None,
            corpus: Corpus::default(),
            builder: None,
            index: Mutex::new(Some(index)),
        }
    }

    /// Guard whether the leaf may be searched at all.
    pub fn gate(mut self, gate: Arc<dyn AccessEvaluator>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Guard whether each found document may be disclosed.
    pub fn document_policy(mut self, policy: Arc<dyn AccessEvaluator>) -> Self {
        self.document_policy = Some(policy);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Build or open the index now instead of on the first query.
    ///
    /// Lets a host fail at startup rather than on the first request that
    /// reaches this leaf.
    pub fn materialize(&self) -> MediragResult<()> {
        self.index().map(|_| ())
    }

    fn index(&self) -> MediragResult<Arc<dyn SimilarityIndex>> {
        // The slot is only written after a successful build, so a builder
        // that panicked left it empty and the next query rebuilds.
        let mut slot = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = slot.as_ref() {
            return Ok(Arc::clone(index));
        }

        let builder = self.builder.as_ref().ok_or_else(|| MediragError::IndexUnavailable {
            node: self.id.clone(),
            reason: "no index and no builder configured".to_string(),
        })?;
        let index = builder
            .build(&self.id, self.corpus.documents())
            .map_err(|e| match e {
                e @ MediragError::IndexUnavailable { .. } => e,
                other => MediragError::IndexUnavailable {
                    node: self.id.clone(),
                    reason: other.to_string(),
                },
            })?;
        debug!(node_id = %self.id, records = self.corpus.len(), "leaf index materialized");
        *slot = Some(Arc::clone(&index));
        Ok(index)
    }

    pub fn retrieve(
        &self,
        query: &str,
        subject: &Subject,
        params: &SearchParameters,
    ) -> MediragResult<Vec<Document>> {
        if !gate_allows(self.gate.as_ref(), &self.id, &self.attributes, subject, params) {
            return Ok(Vec::new());
        }

        let filter = MetadataFilter::from_filters(&params.filters);
        let candidates = self.index()?.query(query, params.fetch_k, filter.as_ref())?;

        let policy = match (&self.document_policy, params.secure) {
            (Some(policy), true) => policy,
            _ => return Ok(merge(candidates, params.k)),
        };

        let found = candidates.len();
        let disclosed: Vec<Document> = candidates
            .into_iter()
            .filter(|doc| {
                policy
                    .evaluate(&AccessRequest::document_read(subject, &doc.metadata))
                    .is_allowed()
            })
            .map(|mut doc| {
                doc.stamp(&self.attributes);
                doc
            })
            .collect();

        debug!(
            node_id = %self.id,
            found,
            disclosed = disclosed.len(),
            "document policy applied"
        );
        Ok(merge(disclosed, params.k))
    }
}
