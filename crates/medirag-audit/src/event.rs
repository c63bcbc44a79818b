//! Audit event and log types.
//!
//! `AuditEvent` is a single entry in the hash chain. It wraps a
//! `DecisionRecord` with a sequence number and the SHA-256 hashes that make
//! tampering detectable. `AuditLog` is the exported snapshot of a chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use medirag_contracts::access::DecisionRecord;

/// A single entry in the SHA-256 hash chain.
///
/// Modifying any field, including those of the embedded `record`,
/// invalidates `this_hash` and every later `prev_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Position in the chain, starting at 0.
    pub sequence: u64,

    /// The chain this event belongs to (typically the serving organization).
    pub chain_id: String,

    pub record: DecisionRecord,

    /// Hash of the previous event, or `GENESIS_HASH` for the first event.
    pub prev_hash: String,

    /// Hash over (chain_id, sequence, prev_hash, record).
    pub this_hash: String,
}

impl AuditEvent {
    /// The `prev_hash` of the first event in every chain.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A snapshot of an audit chain.
///
/// `terminal_hash` is the `this_hash` of the last event and commits to the
/// whole log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub chain_id: String,

    /// Events in chain order. Sequence 0 comes first unless earlier events
    /// were rotated out.
    pub events: Vec<AuditEvent>,

    /// `prev_hash` of the first event: `GENESIS_HASH` for a log that starts
    /// the chain, otherwise the terminal hash of the previous segment.
    pub anchor_hash: String,

    /// Wall-clock time (UTC) the snapshot was taken.
    pub exported_at: DateTime<Utc>,

    /// Empty string if the log is empty.
    pub terminal_hash: String,
}
