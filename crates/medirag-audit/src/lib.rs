//! # medirag-audit
//!
//! Append-only, SHA-256 hash-chained log of access decisions.
//!
//! ## Overview
//!
//! Every decision an audited evaluator makes is wrapped in an `AuditEvent`
//! that links to the previous event via its SHA-256 hash. Tampering with any
//! event breaks the chain and is detected by `verify_chain`.
//!
//! Records carry the subject's `sub` claim and the resource id only, never
//! the subject's attributes or document content.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use medirag_audit::{AuditedEvaluator, InMemoryAuditWriter};
//!
//! let writer = Arc::new(InMemoryAuditWriter::new("A"));
//! let gate = AuditedEvaluator::new("A:gate", pdp, writer.clone());
//! // ... serve queries ...
//! assert!(writer.verify_integrity());
//! let log = writer.export_log();
//! ```

pub mod chain;
pub mod evaluator;
pub mod event;
pub mod memory;

pub use chain::{hash_event, verify_chain, verify_segment};
pub use evaluator::AuditedEvaluator;
pub use event::{AuditEvent, AuditLog};
pub use memory::InMemoryAuditWriter;

// ── Tests ─────────────────────────────────────────────────────────────────────
