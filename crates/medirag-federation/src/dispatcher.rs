//! The federation root: fans one query out to every peer organization and
//! merges what comes back.
//!
//! Peers are queried concurrently, bounded by `max_concurrency`. Each call is
//! independently fail-soft: a transport error, a non-2xx status, an
//! undecodable body or a timeout is logged and that peer contributes nothing.
//! Contributions are concatenated in configured peer order before the final
//! merge, so equal scores break ties by peer order.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use futures::{stream, StreamExt};
use tracing::{debug, info, warn};

use medirag_contracts::{
    attributes::Subject,
    document::Document,
    error::{MediragError, MediragResult},
    search::{QueryId, SearchParameters},
};
use medirag_core::{merge, traits::NameExtractor};

use crate::{
    config::FederationConfig,
    names::GazetteerNameExtractor,
    transport::{HttpPeerTransport, PeerTransport},
    wire::RetrieveParams,
};

/// Per-peer timeout used when none is configured.
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(30);

/// Metadata attribute the derived person-name filter applies to.
pub const NAME_FILTER_KEY: &str = "name";

/// What one peer contributed to a federated query.
#[derive(Debug, Clone)]
pub struct PeerOutcome {
    pub endpoint: String,
    /// Documents the peer returned (before the final merge).
    pub documents: usize,
    /// Why the peer contributed nothing, if it failed.
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl PeerOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// The merged result of a federated query plus per-peer detail.
#[derive(Debug, Clone)]
pub struct FederationReport {
    pub query_id: QueryId,
    pub documents: Vec<Document>,
    /// One entry per configured peer, in configured order.
    pub peers: Vec<PeerOutcome>,
    pub elapsed: Duration,
}

/// The root of the federation.
pub struct FederationDispatcher {
    peers: Vec<String>,
    transport: Arc<dyn PeerTransport>,
    names: Option<Arc<dyn NameExtractor>>,
    timeout: Duration,
    max_concurrency: usize,
}

impl FederationDispatcher {
    /// A dispatcher over `peers` (full retrieve URLs, one per organization).
    pub fn new(peers: Vec<String>, transport: Arc<dyn PeerTransport>) -> Self {
        let max_concurrency = peers.len().max(1);
        Self {
            peers,
            transport,
            names: None,
            timeout: DEFAULT_PEER_TIMEOUT,
            max_concurrency,
        }
    }

    /// Build an HTTP dispatcher from a federation config file's contents.
    pub fn from_config(config: &FederationConfig) -> MediragResult<Self> {
        let transport = HttpPeerTransport::new(config.timeout())?;
        let mut dispatcher = Self::new(config.peers.clone(), Arc::new(transport))
            .with_timeout(config.timeout())
            .with_max_concurrency(config.concurrency());
        if !config.known_names.is_empty() {
            dispatcher = dispatcher.with_name_extractor(Arc::new(GazetteerNameExtractor::new(
                config.known_names.iter().cloned(),
            )));
        }
        Ok(dispatcher)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cap the number of peer calls in flight. Zero is treated as one.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Derive a `name` filter from each query with `extractor`.
    pub fn with_name_extractor(mut self, extractor: Arc<dyn NameExtractor>) -> Self {
        self.names = Some(extractor);
        self
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    /// Return at most `params.k` documents across all peers, best first.
    ///
    /// Only fails if the request itself cannot be encoded; peer failures
    /// shrink the result instead.
    pub async fn retrieve(
        &self,
        query: &str,
        subject: &Subject,
        params: &SearchParameters,
    ) -> MediragResult<Vec<Document>> {
        Ok(self.retrieve_with_report(query, subject, params).await?.documents)
    }

    pub async fn retrieve_with_report(
        &self,
        query: &str,
        subject: &Subject,
        params: &SearchParameters,
    ) -> MediragResult<FederationReport> {
        let query_id = QueryId::new();
        let started = Instant::now();

        // Finished before any dispatch; every peer sees the same parameters.
        let params = self.effective_parameters(query, params);
        let request = RetrieveParams::encode(query, subject, &params)?;

        let results: Vec<(PeerOutcome, Vec<Document>)> = stream::iter(&self.peers)
            .map(|endpoint| self.call_peer(query_id, endpoint, &request))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut peers = Vec::with_capacity(results.len());
        let mut candidates = Vec::new();
        for (outcome, documents) in results {
            peers.push(outcome);
            candidates.extend(documents);
        }
        let documents = merge(candidates, params.k);

        let failed = peers.iter().filter(|p| !p.succeeded()).count();
        info!(
            query_id = %query_id,
            peers = peers.len(),
            failed,
            returned = documents.len(),
            "federated retrieval complete"
        );

        Ok(FederationReport {
            query_id,
            documents,
            peers,
            elapsed: started.elapsed(),
        })
    }

    fn effective_parameters(&self, query: &str, params: &SearchParameters) -> SearchParameters {
        let mut params = params.clone();
        params.filters.remove(NAME_FILTER_KEY);
        if let Some(extractor) = &self.names {
            let names = extractor.extract_person_names(query);
            if !names.is_empty() {
                debug!(names = names.len(), "restricting candidates to named patients");
                params.filters.insert(NAME_FILTER_KEY.to_string(), names);
            }
        }
        params
    }

    async fn call_peer(
        &self,
        query_id: QueryId,
        endpoint: &str,
        request: &RetrieveParams,
    ) -> (PeerOutcome, Vec<Document>) {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.transport.retrieve(endpoint, request)).await {
            Ok(Ok(response)) => response.into_documents(),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(MediragError::PeerUnreachable {
                peer: endpoint.to_string(),
                reason: format!("no response within {:?}", self.timeout),
            }),
        };
        let elapsed = started.elapsed();

        match result {
            Ok(documents) => {
                debug!(
                    query_id = %query_id,
                    peer = %endpoint,
                    documents = documents.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "peer answered"
                );
                let outcome = PeerOutcome {
                    endpoint: endpoint.to_string(),
                    documents: documents.len(),
                    error: None,
                    elapsed,
                };
                (outcome, documents)
            }
            Err(e) => {
                warn!(
                    query_id = %query_id,
                    peer = %endpoint,
                    error = %e,
                    "peer retrieval failed; it contributes no documents"
                );
                let outcome = PeerOutcome {
                    endpoint: endpoint.to_string(),
                    documents: 0,
                    error: Some(e.to_string()),
                    elapsed,
                };
                (outcome, Vec::new())
            }
        }
    }
}
