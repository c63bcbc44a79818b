//! Retrieved documents and their peer-to-peer wire shape.
//!
//! Inside the engine a `Document` carries its similarity score as a typed
//! field. On the wire the score lives inside `metadata`, and the whole
//! document is wrapped in a `kwargs` envelope that existing peers and
//! downstream merge code read as `doc["kwargs"]["metadata"]["score"]`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    attributes::AttributeMap,
    error::{MediragError, MediragResult},
};

/// Metadata key the similarity score travels under on the wire.
pub const SCORE_KEY: &str = "score";

/// A candidate or retrieved document.
///
/// `score` is a similarity in `[0, 1]`. Scores from different leaves are only
/// comparable when every leaf in the federation embeds with the same scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: AttributeMap,
    pub score: f64,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: AttributeMap, score: f64) -> Self {
        Self {
            content: content.into(),
            metadata,
            score,
        }
    }

    /// Merge `attributes` into this document's metadata, overwriting keys
    /// already present. Used to stamp a leaf's provenance onto documents it
    /// discloses.
    pub fn stamp(&mut self, attributes: &AttributeMap) {
        for (key, value) in attributes {
            self.metadata.insert(key.clone(), value.clone());
        }
    }

    /// Encode into the `kwargs`-wrapped wire shape.
    pub fn to_wire(&self) -> SerializedDocument {
        let mut metadata = self.metadata.clone();
        metadata.insert(SCORE_KEY.to_string(), Value::from(self.score));
        SerializedDocument {
            lc: 1,
            kind: "constructor".to_string(),
            id: SerializedDocument::class_path(),
            kwargs: DocumentKwargs {
                page_content: self.content.clone(),
                metadata,
            },
        }
    }
}

impl TryFrom<SerializedDocument> for Document {
    type Error = MediragError;

    /// Decode from the wire shape. The document must carry a numeric
    /// `metadata.score`; it is lifted out of the metadata into `score`.
    fn try_from(wire: SerializedDocument) -> MediragResult<Self> {
        let mut metadata = wire.kwargs.metadata;
        let score = metadata
            .remove(SCORE_KEY)
            .as_ref()
            .and_then(Value::as_f64)
            .ok_or_else(|| MediragError::Wire {
                reason: "document metadata is missing a numeric 'score'".to_string(),
            })?;
        Ok(Self {
            content: wire.kwargs.page_content,
            metadata,
            score,
        })
    }
}

/// The serialized form of a document exchanged between organizations.
///
/// The outer `lc` / `type` / `id` fields mirror the constructor envelope
/// peers already emit; they are written on encode and ignored on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedDocument {
    #[serde(default = "default_lc")]
    pub lc: u32,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub id: Vec<String>,
    pub kwargs: DocumentKwargs,
}

impl SerializedDocument {
    fn class_path() -> Vec<String> {
        ["langchain", "schema", "document", "Document"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

/// The payload inside the `kwargs` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentKwargs {
    pub page_content: String,
    #[serde(default)]
    pub metadata: AttributeMap,
}

fn default_lc() -> u32 {
    1
}

fn default_kind() -> String {
    "constructor".to_string()
}
