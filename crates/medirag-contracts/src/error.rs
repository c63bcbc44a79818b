//! Runtime error types for the MediRAG retrieval engine.
//!
//! All fallible operations in the workspace return `MediragResult<T>`.
//! Access denial is deliberately absent from this enum: a denied subject
//! receives an empty document list, never an error.

use thiserror::Error;

/// The unified error type for the MediRAG crates.
#[derive(Debug, Error)]
pub enum MediragError {
    /// A policy definition could not be compiled into an evaluable form.
    ///
    /// Raised at node construction time. A node whose policies fail to
    /// compile must not start.
    #[error("policy configuration error: {reason}")]
    PolicyConfiguration { reason: String },

    /// A leaf's similarity index could not be built or opened.
    ///
    /// Distinct from an empty result so that operational failures are never
    /// mistaken for a corpus with no matching documents.
    #[error("similarity index for node '{node}' unavailable: {reason}")]
    IndexUnavailable { node: String, reason: String },

    /// A peer organization could not be reached or answered with a failure.
    ///
    /// The federation dispatcher absorbs this per peer; it only escapes to
    /// callers that talk to a single peer directly.
    #[error("peer '{peer}' unreachable: {reason}")]
    PeerUnreachable { peer: String, reason: String },

    /// A request or response did not match the expected wire shape.
    #[error("wire format error: {reason}")]
    Wire { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// The decision audit log could not append a record.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },
}

/// Convenience alias used throughout the MediRAG crates.
pub type MediragResult<T> = Result<T, MediragError>;
