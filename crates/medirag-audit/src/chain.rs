//! Hash-chain primitives: hashing and chain integrity verification.
//!
//! Hash input layout (bytes, in order):
//!   1. chain_id as UTF-8 bytes
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. compact JSON of the decision record

use sha2::{Digest, Sha256};

use medirag_contracts::{
    access::DecisionRecord,
    error::{MediragError, MediragResult},
};

use crate::event::AuditEvent;

/// Compute the SHA-256 hash for a single audit event.
///
/// Returns a lowercase 64-character hex string.
pub fn hash_event(
    chain_id: &str,
    sequence: u64,
    record: &DecisionRecord,
    prev_hash: &str,
) -> MediragResult<String> {
    let record_json = serde_json::to_vec(record).map_err(|e| MediragError::AuditWriteFailed {
        reason: format!("decision record is not serializable: {}", e),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(chain_id.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&record_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Verify the integrity of a hash chain.
///
/// Each event's `prev_hash` must equal the previous event's `this_hash` (or
/// `GENESIS_HASH` for the first), and each `this_hash` must match the value
/// recomputed from the event's own fields. An empty chain is valid.
pub fn verify_chain(events: &[AuditEvent]) -> bool {
    verify_segment(events, AuditEvent::GENESIS_HASH)
}

/// Verify a run of events that continues from `anchor_hash`, the
/// `this_hash` of the event just before the run. A rotated log segment
/// verifies against the terminal hash of the segment before it.
pub fn verify_segment(events: &[AuditEvent], anchor_hash: &str) -> bool {
    let mut expected_prev = anchor_hash.to_string();

    for event in events {
        if event.prev_hash != expected_prev {
            return false;
        }

        match hash_event(&event.chain_id, event.sequence, &event.record, &event.prev_hash) {
            Ok(recomputed) if recomputed == event.this_hash => {}
            _ => return false,
        }

        expected_prev = event.this_hash.clone();
    }

    true
}
