//! Scenarios A and B: node gates short-circuit retrieval.
//!
//! Router R has two leaves. L1 admits everyone and holds a note scoring
//! 0.90; L2 admits only hospital B staff and holds a note scoring 0.95. A
//! hospital A physician asks for the single best document:
//!
//! - A (secure): L2's gate denies, its index is never queried, and the
//!   physician gets L1's note.
//! - B (insecure): gates are skipped and the raw top score wins.

use std::sync::{Arc, Mutex};

use serde_json::json;

use medirag_contracts::{
    attributes::{attributes_from, Subject},
    document::Document,
    error::MediragResult,
    search::SearchParameters,
};
use medirag_core::{traits::Retriever, LeafNode, RetrieverNode, RouterNode};
use medirag_policy::AbacPdp;

use super::{count, labels, FixedIndex};

const ALLOW_EVERYONE: &str = r#"
[[policies]]
id = "l1-open"
description = "Every requester may search L1"
effect = "allow"

[policies.rules]
action = [{ "$.method" = { condition = "Equals", value = "read" } }]
"#;

const HOSPITAL_B_ONLY: &str = r#"
[[policies]]
id = "l2-b-staff"
description = "Only hospital B staff may search L2"
effect = "allow"

[policies.rules]
action = [{ "$.method" = { condition = "Equals", value = "read" } }]

[policies.rules.subject]
"$.org" = { condition = "Equals", value = "B" }
"#;

/// The two-leaf router plus each leaf's index query counter.
pub struct GateFixture {
    pub router: RetrieverNode,
    pub l1_queries: Arc<Mutex<usize>>,
    pub l2_queries: Arc<Mutex<usize>>,
}

pub fn fixture() -> MediragResult<GateFixture> {
    let (l1_index, l1_queries) = FixedIndex::new(vec![Document::new(
        "D1: troponin trend reviewed, no acute infarct.",
        attributes_from(json!({"note_id": "D1"})),
        0.90,
    )]);
    let (l2_index, l2_queries) = FixedIndex::new(vec![Document::new(
        "D2: chest pain workup, catheterization scheduled.",
        attributes_from(json!({"note_id": "D2"})),
        0.95,
    )]);

    let l1 = LeafNode::with_index("R/L1", attributes_from(json!({"org": "R", "dept_id": "L1"})), l1_index)
        .gate(Arc::new(AbacPdp::from_toml_str(ALLOW_EVERYONE)?));
    let l2 = LeafNode::with_index("R/L2", attributes_from(json!({"org": "R", "dept_id": "L2"})), l2_index)
        .gate(Arc::new(AbacPdp::from_toml_str(HOSPITAL_B_ONLY)?));

    let router = RouterNode::new("R", attributes_from(json!({"org": "R"})), vec![l1.into(), l2.into()]);
    Ok(GateFixture {
        router: router.into(),
        l1_queries,
        l2_queries,
    })
}

pub fn physician() -> Subject {
    Subject::new(attributes_from(json!({"sub": "a-physician-7", "org": "A", "role": "physician"})))
}

/// Run Scenarios A and B.
pub fn run_scenario() -> MediragResult<()> {
    println!("=== Scenarios A and B: Gate short-circuit ===");
    println!();
    println!("  Router R: L1 (gate: everyone, D1 = 0.90), L2 (gate: org B only, D2 = 0.95)");
    println!("  Subject: hospital A physician, k = 1");
    println!();

    for (label, secure) in [("A", true), ("B", false)] {
        let fx = fixture()?;
        let params = SearchParameters::default().with_k(1).with_secure(secure);
        let docs = fx.router.retrieve("chest pain", &physician(), &params)?;

        println!("  Scenario {}: secure = {}", label, secure);
        println!("  Returned:               {:?}", labels(&docs));
        println!(
            "  Index queries:          L1 = {}, L2 = {}",
            count(&fx.l1_queries),
            count(&fx.l2_queries)
        );
        if secure {
            println!("  RESULT: D2 hidden by L2's gate, L2 never searched (expected)");
        } else {
            println!("  RESULT: gates bypassed, raw top score wins (expected)");
        }
        println!();
    }

    println!("  Scenarios A and B complete.");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_ids(docs: &[Document]) -> Vec<&str> {
        docs.iter()
            .map(|d| d.metadata["note_id"].as_str().unwrap_or_default())
            .collect()
    }

    #[test]
    fn secure_query_returns_lower_scoring_allowed_document() {
        let fx = fixture().unwrap();
        let docs = fx
            .router
            .retrieve("chest pain", &physician(), &SearchParameters::default().with_k(1))
            .unwrap();

        assert_eq!(note_ids(&docs), vec!["D1"]);
        assert_eq!(count(&fx.l1_queries), 1);
        assert_eq!(count(&fx.l2_queries), 0, "denied leaf must not touch its index");
    }

    #[test]
    fn insecure_query_returns_raw_top_score() {
        let fx = fixture().unwrap();
        let docs = fx
            .router
            .retrieve(
                "chest pain",
                &physician(),
                &SearchParameters::default().with_k(1).with_secure(false),
            )
            .unwrap();

        assert_eq!(note_ids(&docs), vec!["D2"]);
        assert_eq!(count(&fx.l2_queries), 1);
    }

    #[test]
    fn hospital_b_staff_see_the_better_note() {
        let fx = fixture().unwrap();
        let b_staff = Subject::new(attributes_from(json!({"org": "B", "role": "nurse"})));
        let docs = fx
            .router
            .retrieve("chest pain", &b_staff, &SearchParameters::default().with_k(2))
            .unwrap();

        assert_eq!(note_ids(&docs), vec!["D2", "D1"]);
    }

    #[test]
    fn scenario_runs() {
        run_scenario().unwrap();
    }
}
