//! Per-query search parameters.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Default final result size.
pub const DEFAULT_K: usize = 10;
/// Default candidate pool size per leaf.
pub const DEFAULT_FETCH_K: usize = 20;

/// Metadata restrictions applied at the index: attribute name to the set of
/// accepted values.
pub type SearchFilters = BTreeMap<String, BTreeSet<String>>;

/// Parameters passed unchanged down the retrieval tree.
///
/// Travels on the wire as the `search_kwargs` JSON object. Missing fields
/// take their defaults, so `{}` is a valid (secure) parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParameters {
    /// Final result size; every merge truncates to this bound.
    #[serde(default = "default_k")]
    pub k: usize,
    /// How many candidates each leaf asks its index for.
    #[serde(default = "default_fetch_k")]
    pub fetch_k: usize,
    /// Advisory index-level filters. Narrows candidates, never gates access.
    #[serde(default)]
    pub filters: SearchFilters,
    /// When false, every access-control check is skipped. Evaluation only.
    #[serde(default = "default_secure")]
    pub secure: bool,
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            fetch_k: DEFAULT_FETCH_K,
            filters: SearchFilters::new(),
            secure: true,
        }
    }
}

impl SearchParameters {
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_fetch_k(mut self, fetch_k: usize) -> Self {
        self.fetch_k = fetch_k;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Restrict candidates whose `attribute` is one of `values`.
    pub fn with_filter<I, S>(mut self, attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters
            .insert(attribute.into(), values.into_iter().map(Into::into).collect());
        self
    }
}

fn default_k() -> usize {
    DEFAULT_K
}

fn default_fetch_k() -> usize {
    DEFAULT_FETCH_K
}

fn default_secure() -> bool {
    true
}

/// Unique identifier for one federated query, used to correlate log lines
/// and per-query reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryId(pub uuid::Uuid);

impl QueryId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for QueryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
