//! Core trait definitions for the MediRAG retrieval pipeline.
//!
//! These traits mark the trust boundary of every retrieval node:
//!
//! - `AccessEvaluator`:  trusted gate (evaluated before any retrieval work)
//! - `Retriever`:        a node in one organization's retrieval tree
//! - `SimilarityIndex`:  untrusted collaborator that ranks candidates
//! - `IndexBuilder`:     builds or opens a leaf's index on first use
//! - `NameExtractor`:    advisory named-entity collaborator used by the root
//! - `AuditWriter`:      trusted sink for access decisions
//!
//! A node never calls its index or its children unless its gate allows the
//! subject (or the query is explicitly insecure).

use std::{collections::BTreeSet, sync::Arc};

use medirag_contracts::{
    access::{AccessDecision, AccessRequest, DecisionRecord},
    attributes::Subject,
    document::Document,
    error::MediragResult,
    search::SearchParameters,
};

use crate::index::MetadataFilter;

/// A policy decision point: turns one access request into allow or deny.
///
/// Implementations are **trusted** and infallible at query time.
/// Anything that could make a policy non-evaluable must be rejected when the
/// evaluator is constructed.
pub trait AccessEvaluator: Send + Sync {
    fn evaluate(&self, request: &AccessRequest) -> AccessDecision;
}

/// A node of an organization's retrieval tree.
pub trait Retriever: Send + Sync {
    /// Stable node identifier, used in logs and access requests.
    fn id(&self) -> &str;

    /// Return at most `params.k` documents the subject may see, ordered by
    /// descending score.
    ///
    /// Denial is not an error: a denied subject gets `Ok(vec![])`. Errors are
    /// reserved for operational failures such as an unavailable index.
    fn retrieve(
        &self,
        query: &str,
        subject: &Subject,
        params: &SearchParameters,
    ) -> MediragResult<Vec<Document>>;
}

/// A vector similarity index over one leaf's corpus.
pub trait SimilarityIndex: Send + Sync {
    /// Return up to `k` candidates for `text`, each with its similarity score
    /// set, optionally restricted by `filter`.
    fn query(
        &self,
        text: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> MediragResult<Vec<Document>>;
}

/// Builds (or opens) the similarity index for one leaf.
///
/// Called at most once per successful materialization; the leaf caches the
/// result for its lifetime.
pub trait IndexBuilder: Send + Sync {
    fn build(&self, node_id: &str, documents: Vec<Document>) -> MediragResult<Arc<dyn SimilarityIndex>>;
}

/// Extracts person names from free text.
///
/// Only used to derive an advisory `name` filter; never affects gating.
pub trait NameExtractor: Send + Sync {
    fn extract_person_names(&self, text: &str) -> BTreeSet<String>;
}

/// The decision audit writer: an append-only record of access decisions.
pub trait AuditWriter: Send + Sync {
    /// Append one decision record. Records are never modified afterwards.
    fn write(&self, record: &DecisionRecord) -> MediragResult<()>;
}
