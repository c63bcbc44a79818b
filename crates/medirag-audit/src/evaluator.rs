//! An evaluator decorator that records every decision.

use std::sync::Arc;

use tracing::warn;

use medirag_contracts::access::{AccessDecision, AccessRequest, DecisionRecord};
use medirag_core::traits::{AccessEvaluator, AuditWriter};

/// Wraps an `AccessEvaluator` and writes a `DecisionRecord` for each call.
///
/// Fails closed: if the record cannot be written, the decision is `Deny`
/// regardless of what the inner evaluator said.
pub struct AuditedEvaluator<E> {
    label: String,
    inner: E,
    writer: Arc<dyn AuditWriter>,
}

impl<E: AccessEvaluator> AuditedEvaluator<E> {
    /// `label` names the evaluator in records, e.g. `"A/psychiatry:documents"`.
    pub fn new(label: impl Into<String>, inner: E, writer: Arc<dyn AuditWriter>) -> Self {
        Self {
            label: label.into(),
            inner,
            writer,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E: AccessEvaluator> AccessEvaluator for AuditedEvaluator<E> {
    fn evaluate(&self, request: &AccessRequest) -> AccessDecision {
        let decision = self.inner.evaluate(request);
        let record = DecisionRecord::new(self.label.clone(), request, decision);

        match self.writer.write(&record) {
            Ok(()) => decision,
            Err(e) => {
                warn!(
                    evaluator = %self.label,
                    error = %e,
                    "decision could not be audited; denying"
                );
                AccessDecision::Deny
            }
        }
    }
}
