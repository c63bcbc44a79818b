//! # medirag-policy
//!
//! An attribute-based, allow-overrides policy decision point for MediRAG
//! retrieval nodes.
//!
//! ## Overview
//!
//! This crate provides [`AbacPdp`], which implements the
//! [`AccessEvaluator`](medirag_core::traits::AccessEvaluator) trait over a
//! [`PolicyStore`]. Policies are declared in TOML or JSON. Each policy carries
//! predicates over the subject, resource, action and context attributes of a
//! request. A request is allowed when at least one `allow` policy matches in
//! full; otherwise it is denied.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use medirag_policy::AbacPdp;
//!
//! let gate = AbacPdp::from_file(Path::new("policies/hospital_a.toml"))?;
//! // Attach `gate` to a `LeafNode` or `RouterNode`.
//! ```
//!
//! ## Predicates
//!
//! Attribute paths are written `org`, `$.org`, or `$.address.city`. The
//! conditions are `Equals`, `IsIn` and `AnyIn`. A predicate over an attribute
//! the request does not carry is false.

pub mod engine;
pub mod rule;
pub mod store;

pub use engine::AbacPdp;
pub use rule::{CompiledPolicy, ConditionSpec, Effect, PolicySpec, RuleBlockSpec, RulesSpec};
pub use store::PolicyStore;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use medirag_contracts::{
        access::{AccessDecision, AccessRequest},
        attributes::{attributes_from, Subject},
        error::MediragError,
    };
    use medirag_core::traits::AccessEvaluator;

    use crate::{AbacPdp, PolicyStore};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn subject(value: serde_json::Value) -> Subject {
        Subject::new(attributes_from(value))
    }

    fn node_request(subject_attrs: serde_json::Value, node_attrs: serde_json::Value) -> AccessRequest {
        AccessRequest::node_read(&subject(subject_attrs), "node", &attributes_from(node_attrs))
    }

    fn document_request(subject_attrs: serde_json::Value, metadata: serde_json::Value) -> AccessRequest {
        AccessRequest::document_read(&subject(subject_attrs), &attributes_from(metadata))
    }

    fn expect_config_error(result: Result<AbacPdp, MediragError>, needle: &str) {
        match result {
            Err(MediragError::PolicyConfiguration { reason }) => {
                assert!(reason.contains(needle), "expected '{needle}' in reason, got: {reason}");
            }
            other => panic!("expected PolicyConfiguration error, got {:?}", other),
        }
    }

    const ORG_A_OR_B: &str = r#"
        [[policies]]
        id = "partners"
        description = "Members of hospitals A and B may search this node"
        effect = "allow"

        [policies.rules]
        action = [{ "$.method" = { condition = "Equals", value = "read" } }]

        [policies.rules.subject]
        "$.org" = { condition = "IsIn", values = ["A", "B"] }
    "#;

    // ── 1. deny-by-default ────────────────────────────────────────────────────

    /// When no policies exist, every request must be denied.
    #[test]
    fn test_empty_store_denies() {
        let pdp = AbacPdp::from_toml_str("policies = []").unwrap();
        assert!(pdp.store().is_empty());
        assert_eq!(
            pdp.evaluate(&node_request(json!({"org": "A"}), json!({}))),
            AccessDecision::Deny
        );
    }

    // ── 2. IsIn over the subject ──────────────────────────────────────────────

    #[test]
    fn test_is_in_subject_org() {
        let pdp = AbacPdp::from_toml_str(ORG_A_OR_B).unwrap();

        assert!(pdp.evaluate(&node_request(json!({"org": "A"}), json!({}))).is_allowed());
        assert!(pdp.evaluate(&node_request(json!({"org": "B"}), json!({}))).is_allowed());
        assert!(!pdp.evaluate(&node_request(json!({"org": "C"}), json!({}))).is_allowed());
    }

    /// A missing attribute fails its predicate rather than matching vacuously.
    #[test]
    fn test_missing_attribute_denies() {
        let pdp = AbacPdp::from_toml_str(ORG_A_OR_B).unwrap();
        assert_eq!(
            pdp.evaluate(&node_request(json!({"role": "doctor"}), json!({}))),
            AccessDecision::Deny
        );
    }

    // ── 3. AnyIn over a list attribute ────────────────────────────────────────

    #[test]
    fn test_any_in_affiliations() {
        let toml = r#"
            [[policies]]
            id = "neuro-affiliates"
            description = "Anyone affiliated with C's neurology department"
            effect = "allow"

            [policies.rules.subject]
            "$.affiliations" = { condition = "AnyIn", values = ["C_neuro"] }
        "#;
        let pdp = AbacPdp::from_toml_str(toml).unwrap();

        let affiliated = json!({"org": "A", "affiliations": ["A_cardio", "C_neuro"]});
        let unaffiliated = json!({"org": "A", "affiliations": ["A_cardio"]});
        let scalar = json!({"org": "A", "affiliations": "C_neuro"});

        assert!(pdp.evaluate(&node_request(affiliated, json!({}))).is_allowed());
        assert!(!pdp.evaluate(&node_request(unaffiliated, json!({}))).is_allowed());
        // AnyIn needs a list; a bare scalar does not match.
        assert!(!pdp.evaluate(&node_request(scalar, json!({}))).is_allowed());
    }

    // ── 4. every rule block must match ────────────────────────────────────────

    /// Subject and resource predicates are conjunctive across blocks.
    #[test]
    fn test_subject_and_resource_must_both_match() {
        let toml = r#"
            [[policies]]
            id = "psychiatry-technicians"
            description = "Technicians at A's psychiatry may read psychiatry records"
            effect = "allow"

            [policies.rules.subject]
            "$.org" = { condition = "Equals", value = "A" }
            "$.role" = { condition = "Equals", value = "technician" }
            "$.dept" = { condition = "Equals", value = "psychiatry" }

            [policies.rules.resource]
            "$.dept" = { condition = "Equals", value = "psychiatry" }
        "#;
        let pdp = AbacPdp::from_toml_str(toml).unwrap();
        let technician = json!({"org": "A", "role": "technician", "dept": "psychiatry"});
        let doctor = json!({"org": "A", "role": "doctor", "dept": "psychiatry"});

        assert!(pdp
            .evaluate(&document_request(technician.clone(), json!({"dept": "psychiatry"})))
            .is_allowed());
        assert!(!pdp
            .evaluate(&document_request(technician, json!({"dept": "cardiology"})))
            .is_allowed());
        assert!(!pdp
            .evaluate(&document_request(doctor, json!({"dept": "psychiatry"})))
            .is_allowed());
    }

    // ── 5. disjunctive rule blocks ────────────────────────────────────────────

    #[test]
    fn test_list_block_is_disjunction() {
        let toml = r#"
            [[policies]]
            id = "doctors-or-psychiatry"
            description = "Doctors, or anyone in psychiatry"
            effect = "allow"

            [policies.rules]
            subject = [
                { "$.role" = { condition = "Equals", value = "doctor" } },
                { "$.dept" = { condition = "Equals", value = "psychiatry" } },
            ]
        "#;
        let pdp = AbacPdp::from_toml_str(toml).unwrap();

        assert!(pdp.evaluate(&node_request(json!({"role": "doctor"}), json!({}))).is_allowed());
        assert!(pdp.evaluate(&node_request(json!({"dept": "psychiatry"}), json!({}))).is_allowed());
        assert!(!pdp.evaluate(&node_request(json!({"role": "nurse"}), json!({}))).is_allowed());
    }

    // ── 6. allow overrides deny ───────────────────────────────────────────────

    /// A matching deny policy does not override a matching allow policy.
    #[test]
    fn test_allow_overrides_deny() {
        let toml = r#"
            [[policies]]
            id = "deny-everyone"
            description = "Deny everyone"
            effect = "deny"

            [[policies]]
            id = "allow-everyone"
            description = "Allow everyone"
            effect = "allow"
        "#;
        let pdp = AbacPdp::from_toml_str(toml).unwrap();
        assert_eq!(
            pdp.evaluate(&node_request(json!({}), json!({}))),
            AccessDecision::Allow
        );

        let deny_only = AbacPdp::from_toml_str(
            r#"
            [[policies]]
            id = "deny-everyone"
            effect = "deny"
        "#,
        )
        .unwrap();
        assert_eq!(
            deny_only.evaluate(&node_request(json!({}), json!({}))),
            AccessDecision::Deny
        );
    }

    // ── 7. paths ──────────────────────────────────────────────────────────────

    #[test]
    fn test_bare_and_nested_paths() {
        let toml = r#"
            [[policies]]
            id = "nested"
            effect = "allow"

            [policies.rules.subject]
            org = { condition = "Equals", value = "A" }
            "$.address.city" = { condition = "Equals", value = "Boston" }
        "#;
        let pdp = AbacPdp::from_toml_str(toml).unwrap();

        let in_boston = json!({"org": "A", "address": {"city": "Boston"}});
        let elsewhere = json!({"org": "A", "address": {"city": "Lyon"}});
        assert!(pdp.evaluate(&node_request(in_boston, json!({}))).is_allowed());
        assert!(!pdp.evaluate(&node_request(elsewhere, json!({}))).is_allowed());
    }

    // ── 8. JSON documents ─────────────────────────────────────────────────────

    #[test]
    fn test_json_bare_array_with_uid() {
        let json = r#"[
            {
                "uid": "1",
                "description": "Members of A",
                "effect": "allow",
                "rules": {
                    "subject": {"$.org": {"condition": "Equals", "value": "A"}},
                    "resource": {},
                    "action": [{"$.method": {"condition": "Equals", "value": "read"}}],
                    "context": {}
                },
                "targets": {},
                "priority": 0
            }
        ]"#;
        let pdp = AbacPdp::from_json_str(json).unwrap();
        assert_eq!(pdp.store().policies()[0].id(), "1");
        assert!(pdp.evaluate(&node_request(json!({"org": "A"}), json!({}))).is_allowed());
        assert!(!pdp.evaluate(&node_request(json!({"org": "B"}), json!({}))).is_allowed());
    }

    #[test]
    fn test_from_file_dispatches_on_extension() {
        let dir = std::env::temp_dir().join(format!("medirag-policy-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let toml_path = dir.join("gate.toml");
        std::fs::write(&toml_path, ORG_A_OR_B).unwrap();
        let json_path = dir.join("gate.json");
        std::fs::write(
            &json_path,
            r#"{"policies": [{"id": "any", "effect": "allow"}]}"#,
        )
        .unwrap();

        assert_eq!(AbacPdp::from_file(&toml_path).unwrap().store().len(), 1);
        let permissive = AbacPdp::from_file(&json_path).unwrap();
        assert!(permissive.evaluate(&node_request(json!({}), json!({}))).is_allowed());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    // ── 9. configuration errors ───────────────────────────────────────────────

    #[test]
    fn test_toml_parse_error() {
        expect_config_error(
            AbacPdp::from_toml_str("this is not valid toml ][[["),
            "failed to parse policy TOML",
        );
    }

    #[test]
    fn test_unknown_condition_rejected() {
        let toml = r#"
            [[policies]]
            id = "bad"
            effect = "allow"

            [policies.rules.subject]
            "$.org" = { condition = "RegexMatch", value = "A.*" }
        "#;
        expect_config_error(AbacPdp::from_toml_str(toml), "failed to parse policy TOML");
    }

    #[test]
    fn test_empty_values_rejected() {
        let toml = r#"
            [[policies]]
            id = "empty"
            effect = "allow"

            [policies.rules.subject]
            "$.org" = { condition = "IsIn", values = [] }
        "#;
        expect_config_error(AbacPdp::from_toml_str(toml), "IsIn needs at least one value");
    }

    #[test]
    fn test_non_scalar_equals_rejected() {
        let json = r#"[{"id": "obj", "effect": "allow",
            "rules": {"subject": {"$.org": {"condition": "Equals", "value": {"a": 1}}}}}]"#;
        expect_config_error(AbacPdp::from_json_str(json), "needs a scalar value");
    }

    #[test]
    fn test_bad_path_rejected() {
        let toml = r#"
            [[policies]]
            id = "path"
            effect = "allow"

            [policies.rules.subject]
            "$.org..name" = { condition = "Equals", value = "A" }
        "#;
        expect_config_error(AbacPdp::from_toml_str(toml), "invalid attribute path");
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let toml = r#"
            [[policies]]
            id = "same"
            effect = "allow"

            [[policies]]
            id = "same"
            effect = "deny"
        "#;
        let result = PolicyStore::from_toml_str(toml);
        assert!(matches!(
            result,
            Err(MediragError::PolicyConfiguration { ref reason }) if reason.contains("duplicate policy id 'same'")
        ));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        expect_config_error(
            AbacPdp::from_file(std::path::Path::new("/nonexistent/policies.toml")),
            "failed to read policy file",
        );
    }
}
