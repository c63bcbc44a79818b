//! # medirag-contracts
//!
//! Shared types, wire shapes, and error taxonomy for the MediRAG federated
//! retrieval engine.
//!
//! All crates in the workspace import from here. No retrieval or policy
//! logic lives in this crate, only data definitions, their conversions and
//! error types.

pub mod access;
pub mod attributes;
pub mod document;
pub mod error;
pub mod search;

pub use access::{AccessDecision, AccessRequest, DecisionRecord, Entity};
pub use attributes::{attributes_from, AttributeMap, Subject};
pub use document::{Document, SerializedDocument};
pub use error::{MediragError, MediragResult};
pub use search::{QueryId, SearchParameters};
