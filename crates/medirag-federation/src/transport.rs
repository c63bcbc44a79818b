//! Calling one peer organization.

use std::time::Duration;

use async_trait::async_trait;

use medirag_contracts::error::{MediragError, MediragResult};

use crate::wire::{RetrieveParams, RetrieveResponse};

/// Sends one retrieval call to one peer endpoint.
///
/// Any failure (connection, non-2xx status, undecodable body) is reported as
/// `MediragError::PeerUnreachable` or `MediragError::Wire`; the dispatcher
/// treats both the same way.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn retrieve(&self, endpoint: &str, request: &RetrieveParams) -> MediragResult<RetrieveResponse>;
}

/// `PeerTransport` over HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpPeerTransport {
    client: reqwest::Client,
}

impl HttpPeerTransport {
    /// A transport whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> MediragResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MediragError::Config {
                reason: format!("cannot build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PeerTransport for HttpPeerTransport {
    async fn retrieve(&self, endpoint: &str, request: &RetrieveParams) -> MediragResult<RetrieveResponse> {
        let unreachable = |reason: String| MediragError::PeerUnreachable {
            peer: endpoint.to_string(),
            reason,
        };

        let response = self
            .client
            .get(endpoint)
            .query(request)
            .send()
            .await
            .map_err(|e| unreachable(format!("request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| unreachable(format!("bad status: {}", e)))?;

        response
            .json::<RetrieveResponse>()
            .await
            .map_err(|e| MediragError::Wire {
                reason: format!("peer '{}' sent an undecodable body: {}", endpoint, e),
            })
    }
}
