//! Walkthrough scenarios.
//!
//! Each scenario wires real policy, node, and federation components together
//! and prints what a subject gets back, and why.
//!
//! - `gate_short_circuit`: a denying gate hides a better-scoring leaf unless
//!   the query is insecure (scenarios A and B)
//! - `partial_failure`: one peer answers 500 and the federation still answers
//!   (scenario C)
//! - `document_filter`: the gate admits a technician but psychiatry notes are
//!   filtered per document (scenario D)

use std::sync::{Arc, Mutex, PoisonError};

use medirag_contracts::{document::Document, error::MediragResult};
use medirag_core::{index::MetadataFilter, merge, traits::SimilarityIndex};

pub mod document_filter;
pub mod gate_short_circuit;
pub mod partial_failure;

/// An index over fixed, pre-scored candidates that counts its queries.
pub(crate) struct FixedIndex {
    documents: Vec<Document>,
    queries: Arc<Mutex<usize>>,
}

impl FixedIndex {
    pub(crate) fn new(documents: Vec<Document>) -> (Arc<Self>, Arc<Mutex<usize>>) {
        let queries = Arc::new(Mutex::new(0));
        let index = Arc::new(Self {
            documents,
            queries: Arc::clone(&queries),
        });
        (index, queries)
    }
}

impl SimilarityIndex for FixedIndex {
    fn query(&self, _text: &str, k: usize, filter: Option<&MetadataFilter>) -> MediragResult<Vec<Document>> {
        *self.queries.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        let candidates = self
            .documents
            .iter()
            .filter(|doc| filter.map_or(true, |f| f.matches(&doc.metadata)))
            .cloned()
            .collect();
        Ok(merge(candidates, k))
    }
}

pub(crate) fn count(counter: &Mutex<usize>) -> usize {
    *counter.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn labels(documents: &[Document]) -> Vec<String> {
    documents
        .iter()
        .map(|doc| format!("{} ({:.2})", doc.content, doc.score))
        .collect()
}

/// Run every scenario in order.
pub async fn run_all() -> MediragResult<()> {
    gate_short_circuit::run_scenario()?;
    partial_failure::run_scenario().await?;
    document_filter::run_scenario()?;
    Ok(())
}
