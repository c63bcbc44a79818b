//! Scenario C: one organization fails, the federation still answers.
//!
//! Two organization endpoints run on localhost. Hospital A serves one note
//! scoring 0.7; hospital B's endpoint answers every request with HTTP 500.
//! The root asks for five documents and gets hospital A's note, with B's
//! failure reported per peer instead of failing the query.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{http::StatusCode, routing::get, Router};
use serde_json::json;
use tokio::{net::TcpListener, task::JoinHandle};

use medirag_contracts::{
    attributes::{attributes_from, Subject},
    document::Document,
    error::{MediragError, MediragResult},
    search::SearchParameters,
};
use medirag_core::{LeafNode, RetrieverNode, RouterNode};
use medirag_federation::{
    server, FederationDispatcher, FederationReport, HttpPeerTransport, RETRIEVE_PATH,
};

use super::{labels, FixedIndex};

async fn bind() -> MediragResult<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| MediragError::Config {
            reason: format!("failed to bind scenario listener: {}", e),
        })?;
    let addr = listener.local_addr().map_err(|e| MediragError::Config {
        reason: format!("listener has no local address: {}", e),
    })?;
    Ok((listener, addr))
}

async fn spawn_hospital_a() -> MediragResult<(SocketAddr, JoinHandle<MediragResult<()>>)> {
    let (index, _) = FixedIndex::new(vec![Document::new(
        "DocA: discharged after chest pain workup, stress test negative.",
        attributes_from(json!({"note_id": "DocA"})),
        0.7,
    )]);
    let leaf = LeafNode::with_index("A/notes", attributes_from(json!({"org": "A", "dept_id": "notes"})), index);
    let tree: RetrieverNode = RouterNode::new("A", attributes_from(json!({"org": "A"})), vec![leaf.into()]).into();

    let (listener, addr) = bind().await?;
    Ok((addr, tokio::spawn(server::serve(listener, Arc::new(tree)))))
}

async fn spawn_broken_hospital_b() -> MediragResult<(SocketAddr, JoinHandle<()>)> {
    let app = Router::new().route(RETRIEVE_PATH, get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let (listener, addr) = bind().await?;
    let task = tokio::spawn(async move {
        // The scenario aborts this task when it is done.
        let _ = axum::serve(listener, app).await;
    });
    Ok((addr, task))
}

/// Start both endpoints, run one federated query, then stop them.
pub async fn federated_query() -> MediragResult<FederationReport> {
    let (a_addr, a_task) = spawn_hospital_a().await?;
    let (b_addr, b_task) = spawn_broken_hospital_b().await?;

    let peers = vec![
        format!("http://{}{}", a_addr, RETRIEVE_PATH),
        format!("http://{}{}", b_addr, RETRIEVE_PATH),
    ];
    let transport = HttpPeerTransport::new(Duration::from_secs(5))?;
    let root = FederationDispatcher::new(peers, Arc::new(transport));
    let subject = Subject::new(attributes_from(json!({"sub": "a-physician-7", "org": "A", "role": "physician"})));

    let report = root
        .retrieve_with_report("chest pain", &subject, &SearchParameters::default().with_k(5))
        .await;

    a_task.abort();
    b_task.abort();
    report
}

/// Run Scenario C.
pub async fn run_scenario() -> MediragResult<()> {
    println!("=== Scenario C: Partial failure ===");
    println!();
    println!("  Peers: hospital A (DocA = 0.70), hospital B (HTTP 500 on every call)");
    println!("  Root: k = 5");
    println!();

    let report = federated_query().await?;

    println!("  Query id:               {}", report.query_id);
    println!("  Returned:               {:?}", labels(&report.documents));
    for peer in &report.peers {
        match &peer.error {
            None => println!("  Peer {:<40} OK, {} document(s)", peer.endpoint, peer.documents),
            Some(error) => println!("  Peer {:<40} FAILED: {}", peer.endpoint, error),
        }
    }
    println!("  RESULT: failing peer contributed nothing, query succeeded (expected)");
    println!();
    println!("  Scenario C complete.");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failing_peer_contributes_nothing() {
        let report = federated_query().await.unwrap();

        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].metadata["note_id"], json!("DocA"));
        assert!((report.documents[0].score - 0.7).abs() < 1e-9);

        assert!(report.peers[0].succeeded());
        assert_eq!(report.peers[0].documents, 1);
        assert!(report.peers[1].error.is_some());
        assert_eq!(report.peers[1].documents, 0);
    }

    #[tokio::test]
    async fn scenario_runs() {
        run_scenario().await.unwrap();
    }
}
