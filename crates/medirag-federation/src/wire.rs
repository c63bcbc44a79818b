//! The peer retrieval call on the wire.
//!
//! `GET /api/retrieve?query=<text>&userinfo=<json>&search_kwargs=<json>`
//! answers `{"docs": [<SerializedDocument>, ...], "query": <text>}`.
//! `userinfo` and `search_kwargs` are JSON documents carried as query-string
//! values.

use serde::{Deserialize, Serialize};

use medirag_contracts::{
    attributes::Subject,
    document::{Document, SerializedDocument},
    error::{MediragError, MediragResult},
    search::SearchParameters,
};

/// Path every organization exposes its root router on.
pub const RETRIEVE_PATH: &str = "/api/retrieve";

/// Query-string parameters of a retrieval call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieveParams {
    pub query: String,
    /// The subject attribute map as a JSON object.
    pub userinfo: String,
    /// The search parameters as a JSON object.
    pub search_kwargs: String,
}

impl RetrieveParams {
    pub fn encode(query: &str, subject: &Subject, params: &SearchParameters) -> MediragResult<Self> {
        Ok(Self {
            query: query.to_string(),
            userinfo: to_json("userinfo", subject)?,
            search_kwargs: to_json("search_kwargs", params)?,
        })
    }

    /// Parse the JSON-valued parameters. `userinfo` must be a JSON object.
    pub fn decode(&self) -> MediragResult<(Subject, SearchParameters)> {
        let subject = serde_json::from_str(&self.userinfo).map_err(|e| MediragError::Wire {
            reason: format!("userinfo is not a JSON object: {}", e),
        })?;
        let params = serde_json::from_str(&self.search_kwargs).map_err(|e| MediragError::Wire {
            reason: format!("search_kwargs is not valid: {}", e),
        })?;
        Ok((subject, params))
    }
}

/// Body of a successful retrieval call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrieveResponse {
    #[serde(default)]
    pub docs: Vec<SerializedDocument>,
    #[serde(default)]
    pub query: String,
}

impl RetrieveResponse {
    pub fn from_documents(query: impl Into<String>, documents: &[Document]) -> Self {
        Self {
            docs: documents.iter().map(Document::to_wire).collect(),
            query: query.into(),
        }
    }

    /// Decode every document. One malformed document fails the whole body.
    pub fn into_documents(self) -> MediragResult<Vec<Document>> {
        self.docs.into_iter().map(Document::try_from).collect()
    }
}

fn to_json<T: Serialize>(field: &str, value: &T) -> MediragResult<String> {
    serde_json::to_string(value).map_err(|e| MediragError::Wire {
        reason: format!("cannot encode {}: {}", field, e),
    })
}
