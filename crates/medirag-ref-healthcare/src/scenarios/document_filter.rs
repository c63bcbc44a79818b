//! Scenario D: the gate admits, the document policy filters.
//!
//! Hospital A's psychiatry leaf lets every hospital A technician search it,
//! but its document policy only discloses psychiatry notes to technicians
//! working in psychiatry. A radiology technician therefore passes the gate
//! and still receives no psychiatry notes. Every decision lands in an audit
//! chain so the two layers can be told apart afterwards.

use std::sync::Arc;

use serde_json::json;

use medirag_audit::InMemoryAuditWriter;
use medirag_contracts::{
    access::AccessDecision,
    attributes::{attributes_from, Subject},
    document::Document,
    error::MediragResult,
    search::SearchParameters,
};
use medirag_core::traits::Retriever;
use medirag_federation::BuildOptions;

use crate::{build_hospital, Hospital};

pub const QUERY: &str = "agitation insomnia lorazepam";

pub const PSYCHIATRY_GATE: &str = "A/psychiatry:gate";
pub const PSYCHIATRY_DOCUMENTS: &str = "A/psychiatry:documents";

pub fn technician(dept: &str) -> Subject {
    Subject::new(attributes_from(json!({
        "sub": format!("a-tech-{}", dept),
        "org": "A",
        "role": "technician",
        "dept": dept,
    })))
}

/// What one subject got back from hospital A, with the audit trail.
pub struct FilterOutcome {
    pub documents: Vec<Document>,
    pub audit: Arc<InMemoryAuditWriter>,
}

impl FilterOutcome {
    pub fn from_department(&self, dept: &str) -> usize {
        self.documents
            .iter()
            .filter(|d| d.metadata.get("dept_id") == Some(&json!(dept)))
            .count()
    }

    /// Decisions recorded by the evaluator labelled `evaluator`.
    pub fn decisions(&self, evaluator: &str) -> Vec<AccessDecision> {
        self.audit
            .export_log()
            .events
            .into_iter()
            .filter(|e| e.record.evaluator == evaluator)
            .map(|e| e.record.decision)
            .collect()
    }
}

pub fn query_hospital_a(subject: &Subject) -> MediragResult<FilterOutcome> {
    let audit = Arc::new(InMemoryAuditWriter::new("hospital-a"));
    let tree = build_hospital(Hospital::A, &BuildOptions::default().with_audit(audit.clone()))?;
    let documents = tree.retrieve(QUERY, subject, &SearchParameters::default().with_k(20))?;
    Ok(FilterOutcome { documents, audit })
}

fn tally(decisions: &[AccessDecision]) -> (usize, usize) {
    let allowed = decisions.iter().filter(|d| d.is_allowed()).count();
    (allowed, decisions.len() - allowed)
}

/// Run Scenario D.
pub fn run_scenario() -> MediragResult<()> {
    println!("=== Scenario D: Document-level filter ===");
    println!();
    println!("  Hospital A, query: {:?}", QUERY);
    println!();

    for dept in ["radiology", "psychiatry"] {
        let outcome = query_hospital_a(&technician(dept))?;
        let (gate_allowed, _) = tally(&outcome.decisions(PSYCHIATRY_GATE));
        let (disclosed, withheld) = tally(&outcome.decisions(PSYCHIATRY_DOCUMENTS));

        println!("  Subject: hospital A technician, dept = {}", dept);
        println!(
            "  Psychiatry gate:        {}",
            if gate_allowed > 0 { "Allow" } else { "Deny" }
        );
        println!("  Psychiatry candidates:  {} disclosed, {} withheld", disclosed, withheld);
        println!(
            "  Returned:               {} medicine, {} psychiatry, {} admissions",
            outcome.from_department("medicine"),
            outcome.from_department("psychiatry"),
            outcome.from_department("admissions")
        );
        println!(
            "  Audit chain integrity:  {} ({} decision(s))",
            if outcome.audit.verify_integrity() { "VERIFIED" } else { "FAILED" },
            outcome.audit.len()
        );
        println!();
    }

    println!("  RESULT: psychiatry notes reach only psychiatry technicians (expected)");
    println!();
    println!("  Scenario D complete.");
    println!();
    Ok(())
}
