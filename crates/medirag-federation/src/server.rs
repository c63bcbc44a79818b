//! One organization's retrieval endpoint.
//!
//! Exposes the organization's root node to the federation:
//! - `GET /api/retrieve` runs the tree for the caller described by `userinfo`
//! - `GET /health` answers for liveness probes
//!
//! The tree is synchronous and may build an index on first use, so each
//! retrieval runs on a blocking worker.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use medirag_contracts::error::{MediragError, MediragResult};
use medirag_core::{traits::Retriever, RetrieverNode};

use crate::wire::{RetrieveParams, RetrieveResponse, RETRIEVE_PATH};

pub const HEALTH_PATH: &str = "/health";

#[derive(Clone)]
pub struct OrgState {
    pub tree: Arc<RetrieverNode>,
}

/// JSON error body returned with every non-2xx response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                code: "bad_request".to_string(),
                message,
            },
        }
    }

    // Details go to the log, not to the caller.
    fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody {
                code: "internal".to_string(),
                message: "retrieval failed".to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub org: String,
}

pub fn build_router(tree: Arc<RetrieverNode>) -> Router {
    Router::new()
        .route(RETRIEVE_PATH, get(retrieve))
        .route(HEALTH_PATH, get(health))
        .with_state(OrgState { tree })
}

/// Serve `tree` on `listener` until the task is cancelled.
pub async fn serve(listener: TcpListener, tree: Arc<RetrieverNode>) -> MediragResult<()> {
    let local = listener.local_addr().map_err(|e| MediragError::Config {
        reason: format!("listener has no local address: {}", e),
    })?;
    info!(org = %tree.id(), addr = %local, "organization endpoint listening");
    axum::serve(listener, build_router(tree))
        .await
        .map_err(|e| MediragError::Config {
            reason: format!("server on {} stopped: {}", local, e),
        })
}

async fn retrieve(
    State(state): State<OrgState>,
    query: Result<Query<RetrieveParams>, QueryRejection>,
) -> Result<Json<RetrieveResponse>, ApiError> {
    let Query(request) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let (subject, params) = request
        .decode()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let tree = Arc::clone(&state.tree);
    let query = request.query.clone();
    let documents = tokio::task::spawn_blocking(move || tree.retrieve(&query, &subject, &params))
        .await
        .map_err(|e| {
            error!(org = %state.tree.id(), error = %e, "retrieval task panicked");
            ApiError::internal()
        })?
        .map_err(|e| {
            error!(org = %state.tree.id(), error = %e, "retrieval failed");
            ApiError::internal()
        })?;

    debug!(org = %state.tree.id(), returned = documents.len(), "retrieval served");
    Ok(Json(RetrieveResponse::from_documents(request.query, &documents)))
}

async fn health(State(state): State<OrgState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        org: state.tree.id().to_string(),
    })
}
