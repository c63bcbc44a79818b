//! Reference similarity index and embedding.
//!
//! `InMemoryIndex` ranks a leaf's documents by cosine similarity between
//! feature-hashed term-frequency vectors. Any embedding scheme can be plugged
//! in through `Embedder`; cross-leaf scores are only comparable when every
//! leaf in the federation uses the same one.

use std::{
    collections::HashMap,
    sync::Arc,
};

use medirag_contracts::{
    attributes::{value_as_key, AttributeMap},
    document::Document,
    error::{MediragError, MediragResult},
    search::SearchFilters,
};

use crate::{
    merge::merge,
    traits::{IndexBuilder, SimilarityIndex},
};

/// Default width of hashed embedding vectors.
pub const DEFAULT_DIMENSIONS: usize = 1024;

/// Index-level metadata restriction.
///
/// A candidate passes when, for any filtered attribute, its metadata value is
/// in that attribute's accepted set. Narrows retrieval only; this is not a
/// security boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFilter {
    should: SearchFilters,
}

impl MetadataFilter {
    /// Build a filter from search parameters. Returns `None` when there is
    /// nothing to filter on.
    pub fn from_filters(filters: &SearchFilters) -> Option<Self> {
        let should: SearchFilters = filters
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(attr, values)| (attr.clone(), values.clone()))
            .collect();
        if should.is_empty() {
            None
        } else {
            Some(Self { should })
        }
    }

    pub fn matches(&self, metadata: &AttributeMap) -> bool {
        self.should.iter().any(|(attr, values)| {
            metadata
                .get(attr)
                .is_some_and(|value| values.contains(&value_as_key(value)))
        })
    }
}

/// Turns text into a fixed-width vector.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Feature-hashing bag-of-words embedder.
///
/// Tokens are lowercase alphanumeric runs, hashed (FNV-1a) into `dimensions`
/// buckets with sublinear term frequency `1 + ln(tf)`, then L2-normalized.
/// All components are non-negative, so cosine similarity lies in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> MediragResult<Self> {
        if dimensions == 0 {
            return Err(MediragError::Config {
                reason: "embedding dimensions must be positive".to_string(),
            });
        }
        Ok(Self { dimensions })
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dimensions: DEFAULT_DIMENSIONS }
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut counts: HashMap<usize, u32> = HashMap::new();
        for token in tokens(text) {
            let bucket = (fnv1a(token.as_bytes()) % self.dimensions as u64) as usize;
            *counts.entry(bucket).or_insert(0) += 1;
        }

        let mut vector = vec![0.0f32; self.dimensions];
        for (bucket, tf) in counts {
            vector[bucket] = 1.0 + (tf as f32).ln();
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    f64::from(dot).clamp(0.0, 1.0)
}

/// A brute-force in-memory index over pre-embedded documents.
pub struct InMemoryIndex {
    entries: Vec<(Document, Vec<f32>)>,
    embedder: Arc<dyn Embedder>,
}

impl InMemoryIndex {
    pub fn new(documents: Vec<Document>, embedder: Arc<dyn Embedder>) -> Self {
        let entries = documents
            .into_iter()
            .map(|doc| {
                let vector = embedder.embed(&doc.content);
                (doc, vector)
            })
            .collect();
        Self { entries, embedder }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SimilarityIndex for InMemoryIndex {
    fn query(
        &self,
        text: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> MediragResult<Vec<Document>> {
        let query_vector = self.embedder.embed(text);
        let scored = self
            .entries
            .iter()
            .filter(|(doc, _)| filter.map_or(true, |f| f.matches(&doc.metadata)))
            .map(|(doc, vector)| {
                let mut candidate = doc.clone();
                candidate.score = cosine(&query_vector, vector);
                candidate
            })
            .collect();
        Ok(merge(scored, k))
    }
}

/// Builds an `InMemoryIndex` from a leaf's documents.
#[derive(Clone)]
pub struct InMemoryIndexBuilder {
    embedder: Arc<dyn Embedder>,
}

impl InMemoryIndexBuilder {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

impl Default for InMemoryIndexBuilder {
    fn default() -> Self {
        Self::new(Arc::new(HashingEmbedder::default()))
    }
}

impl IndexBuilder for InMemoryIndexBuilder {
    fn build(&self, node_id: &str, documents: Vec<Document>) -> MediragResult<Arc<dyn SimilarityIndex>> {
        let index = InMemoryIndex::new(documents, Arc::clone(&self.embedder));
        tracing::debug!(node_id = %node_id, documents = index.len(), "in-memory index built");
        Ok(Arc::new(index))
    }
}
