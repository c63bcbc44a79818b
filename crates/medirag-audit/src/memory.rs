//! In-memory implementation of `AuditWriter`.
//!
//! `InMemoryAuditWriter` keeps all events in a `Vec` behind a `Mutex`, so one
//! writer can be shared by every evaluator of an organization's tree while
//! queries run concurrently.
//!
//! Events stay in memory until the owner calls `rotate`, so a long-running
//! node should rotate on a schedule and ship each segment to durable storage.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, trace};

use medirag_contracts::{
    access::DecisionRecord,
    error::{MediragError, MediragResult},
};
use medirag_core::traits::AuditWriter;

use crate::{
    chain::{hash_event, verify_segment},
    event::{AuditEvent, AuditLog},
};

pub(crate) struct InMemoryState {
    pub(crate) events: Vec<AuditEvent>,

    /// `prev_hash` of `events[0]`; moves forward on every rotation.
    pub(crate) anchor_hash: String,

    /// The next sequence number to assign.
    pub(crate) sequence: u64,

    /// `this_hash` of the last event, or `GENESIS_HASH` before the first.
    pub(crate) last_hash: String,
}

/// An in-memory, append-only audit writer backed by a SHA-256 hash chain.
pub struct InMemoryAuditWriter {
    chain_id: String,
    pub(crate) state: Mutex<InMemoryState>,
}

impl InMemoryAuditWriter {
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            state: Mutex::new(InMemoryState {
                events: Vec::new(),
                anchor_hash: AuditEvent::GENESIS_HASH.to_string(),
                sequence: 0,
                last_hash: AuditEvent::GENESIS_HASH.to_string(),
            }),
        }
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Number of decisions held since the last rotation.
    pub fn len(&self) -> usize {
        self.read_state().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot every event still held in memory.
    pub fn export_log(&self) -> AuditLog {
        let state = self.read_state();
        self.segment(&state, state.events.clone())
    }

    /// Export the held events and release them. The chain continues: the
    /// next event links to the returned log's `terminal_hash` and keeps the
    /// sequence numbering.
    pub fn rotate(&self) -> AuditLog {
        let mut state = self.read_state();
        let events = std::mem::take(&mut state.events);
        let log = self.segment(&state, events);
        state.anchor_hash = state.last_hash.clone();
        debug!(
            chain_id = %self.chain_id,
            rotated = log.events.len(),
            next_sequence = state.sequence,
            "audit log rotated"
        );
        log
    }

    /// Verify that the held events have not been tampered with.
    pub fn verify_integrity(&self) -> bool {
        let state = self.read_state();
        verify_segment(&state.events, &state.anchor_hash)
    }

    fn segment(&self, state: &InMemoryState, events: Vec<AuditEvent>) -> AuditLog {
        let terminal_hash = events
            .last()
            .map(|e| e.this_hash.clone())
            .unwrap_or_default();

        AuditLog {
            chain_id: self.chain_id.clone(),
            events,
            anchor_hash: state.anchor_hash.clone(),
            exported_at: Utc::now(),
            terminal_hash,
        }
    }

    // Readers tolerate a poisoned lock: events are only ever appended whole.
    fn read_state(&self) -> MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AuditWriter for InMemoryAuditWriter {
    /// Append one decision record to the hash chain.
    fn write(&self, record: &DecisionRecord) -> MediragResult<()> {
        let mut state = self.state.lock().map_err(|e| MediragError::AuditWriteFailed {
            reason: format!("audit state lock poisoned: {}", e),
        })?;

        let prev_hash = state.last_hash.clone();
        let sequence = state.sequence;
        let this_hash = hash_event(&self.chain_id, sequence, record, &prev_hash)?;

        state.events.push(AuditEvent {
            sequence,
            chain_id: self.chain_id.clone(),
            record: record.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        state.sequence += 1;
        state.last_hash = this_hash;

        trace!(chain_id = %self.chain_id, sequence, "decision recorded");
        Ok(())
    }
}
