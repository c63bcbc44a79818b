//! # medirag-federation
//!
//! Everything that crosses an organization boundary.
//!
//! This crate provides:
//! - `OrgConfig`: builds one organization's retrieval tree from TOML
//! - `server`: the organization's `GET /api/retrieve` endpoint (axum)
//! - `wire`: the query-string and JSON body exchanged between organizations
//! - `PeerTransport` / `HttpPeerTransport`: calling one peer (reqwest)
//! - `FederationDispatcher`: the root that fans a query out to every peer,
//!   tolerates failed peers, and merges the results
//! - `GazetteerNameExtractor`: derives the advisory `name` filter
//!
//! ## Usage
//!
//! ```rust,ignore
//! let config = FederationConfig::from_file(Path::new("federation.toml"))?;
//! let root = FederationDispatcher::from_config(&config)?;
//! let docs = root.retrieve("chest pain", &subject, &config.search).await?;
//! ```

pub mod config;
pub mod dispatcher;
pub mod names;
pub mod server;
pub mod transport;
pub mod wire;

pub use config::{BuildOptions, FederationConfig, NodeConfig, OrgConfig, PolicySource};
pub use dispatcher::{FederationDispatcher, FederationReport, PeerOutcome};
pub use names::GazetteerNameExtractor;
pub use transport::{HttpPeerTransport, PeerTransport};
pub use wire::{RetrieveParams, RetrieveResponse, RETRIEVE_PATH};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use medirag_audit::InMemoryAuditWriter;
    use medirag_contracts::{
        attributes::{attributes_from, Subject},
        document::Document,
        error::{MediragError, MediragResult},
        search::SearchParameters,
    };
    use medirag_core::{
        corpus::Corpus,
        index::MetadataFilter,
        traits::{IndexBuilder, NameExtractor, Retriever, SimilarityIndex},
        LeafNode, RetrieverNode,
    };

    use crate::{
        server::build_router, BuildOptions, FederationConfig, FederationDispatcher,
        GazetteerNameExtractor, OrgConfig, PeerTransport, RetrieveParams, RetrieveResponse,
    };

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn doc(content: &str, score: f64) -> Document {
        Document::new(content, attributes_from(json!({"source": content})), score)
    }

    fn subject(value: Value) -> Subject {
        Subject::new(attributes_from(value))
    }

    fn contents(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.content.as_str()).collect()
    }

    enum Reply {
        Docs(Vec<Document>),
        Fail,
        Hang,
    }

    /// A transport with canned replies per endpoint that records every call
    /// and the peak number of calls in flight.
    #[derive(Default)]
    struct MockTransport {
        replies: HashMap<String, Reply>,
        requests: Mutex<Vec<(String, RetrieveParams)>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MockTransport {
        fn reply(mut self, endpoint: &str, reply: Reply) -> Self {
            self.replies.insert(endpoint.to_string(), reply);
            self
        }

        fn requests(&self) -> Vec<(String, RetrieveParams)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PeerTransport for MockTransport {
        async fn retrieve(&self, endpoint: &str, request: &RetrieveParams) -> MediragResult<RetrieveResponse> {
            self.requests
                .lock()
                .unwrap()
                .push((endpoint.to_string(), request.clone()));
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.replies.get(endpoint) {
                Some(Reply::Docs(docs)) => Ok(RetrieveResponse::from_documents(request.query.clone(), docs)),
                Some(Reply::Hang) => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(RetrieveResponse::from_documents(request.query.clone(), &[]))
                }
                Some(Reply::Fail) | None => Err(MediragError::PeerUnreachable {
                    peer: endpoint.to_string(),
                    reason: "HTTP status server error (500 Internal Server Error)".to_string(),
                }),
            }
        }
    }

    /// An index that returns fixed candidates regardless of the query.
    struct FixedIndex(Vec<Document>);

    impl SimilarityIndex for FixedIndex {
        fn query(&self, _text: &str, k: usize, _filter: Option<&MetadataFilter>) -> MediragResult<Vec<Document>> {
            Ok(self.0.iter().take(k).cloned().collect())
        }
    }

    struct FailingBuilder;

    impl IndexBuilder for FailingBuilder {
        fn build(&self, node_id: &str, _documents: Vec<Document>) -> MediragResult<Arc<dyn SimilarityIndex>> {
            Err(MediragError::IndexUnavailable {
                node: node_id.to_string(),
                reason: "collection missing".to_string(),
            })
        }
    }

    fn fixed_tree(docs: Vec<Document>) -> Arc<RetrieverNode> {
        let leaf = LeafNode::with_index("A", attributes_from(json!({"org": "A"})), Arc::new(FixedIndex(docs)));
        Arc::new(leaf.into())
    }

    fn retrieve_uri(query: &str, userinfo: &str, search_kwargs: &str) -> String {
        let url = reqwest::Url::parse_with_params(
            "http://localhost/api/retrieve",
            &[("query", query), ("userinfo", userinfo), ("search_kwargs", search_kwargs)],
        )
        .unwrap();
        format!("{}?{}", url.path(), url.query().unwrap_or_default())
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    // ── Wire ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_retrieve_params_carry_json_documents() {
        let subject = subject(json!({"sub": "u1", "org": "A", "affiliations": ["C_neuro"]}));
        let params = SearchParameters::default().with_k(3).with_filter("name", ["Edward Fisher"]);

        let encoded = RetrieveParams::encode("chest pain", &subject, &params).unwrap();
        let userinfo: Value = serde_json::from_str(&encoded.userinfo).unwrap();
        assert_eq!(userinfo["affiliations"], json!(["C_neuro"]));
        let kwargs: Value = serde_json::from_str(&encoded.search_kwargs).unwrap();
        assert_eq!(kwargs["filters"]["name"], json!(["Edward Fisher"]));
        assert_eq!(kwargs["secure"], json!(true));

        let (decoded_subject, decoded_params) = encoded.decode().unwrap();
        assert_eq!(decoded_subject, subject);
        assert_eq!(decoded_params, params);
    }

    #[test]
    fn test_userinfo_must_be_an_object() {
        let request = RetrieveParams {
            query: "q".to_string(),
            userinfo: "[1, 2]".to_string(),
            search_kwargs: "{}".to_string(),
        };
        assert!(matches!(request.decode(), Err(MediragError::Wire { .. })));
    }

    #[test]
    fn test_response_without_score_is_rejected() {
        let body = json!({
            "docs": [{"kwargs": {"page_content": "x", "metadata": {"name": "n"}}}],
            "query": "q"
        });
        let response: RetrieveResponse = serde_json::from_value(body).unwrap();
        assert!(matches!(response.into_documents(), Err(MediragError::Wire { .. })));
    }

    // ── Name extraction ───────────────────────────────────────────────────────

    #[test]
    fn test_gazetteer_matches_possessives_and_case() {
        let extractor = GazetteerNameExtractor::new(["Edward Fisher", "Janet Aguilar", "Ann"]);

        let names = extractor.extract_person_names("What is edward fisher's latest ECG?");
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["Edward Fisher"]);

        // "Ann" inside "Annual" is not a name.
        assert!(extractor.extract_person_names("Annual checkup summary").is_empty());

        let both = extractor.extract_person_names("Compare Janet Aguilar and Edward Fisher.");
        assert_eq!(both.len(), 2);
    }

    // ── Dispatcher ────────────────────────────────────────────────────────────

    /// Org B answers 500; org A's document is the whole result.
    #[tokio::test]
    async fn test_scenario_c_failed_peer_contributes_nothing() {
        let transport = Arc::new(
            MockTransport::default()
                .reply("http://a/api/retrieve", Reply::Docs(vec![doc("DocA", 0.7)]))
                .reply("http://b/api/retrieve", Reply::Fail),
        );
        let root = FederationDispatcher::new(
            vec!["http://a/api/retrieve".to_string(), "http://b/api/retrieve".to_string()],
            transport,
        );

        let report = root
            .retrieve_with_report("q", &subject(json!({"org": "A"})), &SearchParameters::default().with_k(5))
            .await
            .unwrap();

        assert_eq!(contents(&report.documents), vec!["DocA"]);
        assert!(report.peers[0].succeeded());
        assert_eq!(report.peers[0].documents, 1);
        let failure = report.peers[1].error.as_deref().unwrap();
        assert!(failure.contains("500"), "unexpected error text: {failure}");
    }

    /// The root merges across peers by score and truncates to k; equal
    /// scores keep configured peer order.
    #[tokio::test]
    async fn test_root_merge_across_peers() {
        let transport = Arc::new(
            MockTransport::default()
                .reply("a", Reply::Docs(vec![doc("a1", 0.9), doc("a2", 0.5)]))
                .reply("b", Reply::Docs(vec![doc("b1", 0.95), doc("b2", 0.5)]))
                .reply("c", Reply::Docs(vec![doc("c1", 0.5)])),
        );
        let root = FederationDispatcher::new(vec!["a".into(), "b".into(), "c".into()], transport);

        let docs = root
            .retrieve("q", &subject(json!({})), &SearchParameters::default().with_k(4))
            .await
            .unwrap();
        assert_eq!(contents(&docs), vec!["b1", "a1", "a2", "b2"]);
    }

    #[tokio::test]
    async fn test_hung_peer_times_out() {
        let transport = Arc::new(
            MockTransport::default()
                .reply("slow", Reply::Hang)
                .reply("fast", Reply::Docs(vec![doc("fast", 0.4)])),
        );
        let root = FederationDispatcher::new(vec!["slow".into(), "fast".into()], transport)
            .with_timeout(Duration::from_millis(100));

        let report = root
            .retrieve_with_report("q", &subject(json!({})), &SearchParameters::default())
            .await
            .unwrap();

        assert_eq!(contents(&report.documents), vec!["fast"]);
        assert!(report.peers[0].error.as_deref().unwrap().contains("no response within"));
        assert!(report.elapsed < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_fan_out_respects_max_concurrency() {
        let mut transport = MockTransport::default();
        let peers: Vec<String> = (0..6).map(|i| format!("peer-{i}")).collect();
        for peer in &peers {
            transport = transport.reply(peer, Reply::Docs(vec![]));
        }
        let transport = Arc::new(transport);

        let root = FederationDispatcher::new(peers, transport.clone()).with_max_concurrency(2);
        root.retrieve("q", &subject(json!({})), &SearchParameters::default())
            .await
            .unwrap();

        assert_eq!(transport.requests().len(), 6);
        assert!(transport.peak.load(Ordering::SeqCst) <= 2);
    }

    /// The derived name filter reaches every peer, replaces any stale name
    /// filter, and leaves the caller's parameters untouched.
    #[tokio::test]
    async fn test_name_filter_is_derived_per_query() {
        let transport = Arc::new(
            MockTransport::default()
                .reply("a", Reply::Docs(vec![]))
                .reply("b", Reply::Docs(vec![])),
        );
        let root = FederationDispatcher::new(vec!["a".into(), "b".into()], transport.clone())
            .with_name_extractor(Arc::new(GazetteerNameExtractor::new(["Edward Fisher"])));

        let caller_params = SearchParameters::default().with_filter("name", ["Someone Else"]);
        root.retrieve("Summarize Edward Fisher's visits", &subject(json!({})), &caller_params)
            .await
            .unwrap();
        root.retrieve("chest pain", &subject(json!({})), &caller_params)
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 4);
        for (_, request) in &requests[..2] {
            let (_, params) = request.decode().unwrap();
            assert_eq!(
                params.filters["name"].iter().collect::<Vec<_>>(),
                vec!["Edward Fisher"]
            );
        }
        for (_, request) in &requests[2..] {
            let (_, params) = request.decode().unwrap();
            assert!(!params.filters.contains_key("name"));
        }
        assert!(caller_params.filters["name"].contains("Someone Else"));
    }

    #[tokio::test]
    async fn test_no_peers_returns_empty() {
        let root = FederationDispatcher::new(vec![], Arc::new(MockTransport::default()));
        let report = root
            .retrieve_with_report("q", &subject(json!({})), &SearchParameters::default())
            .await
            .unwrap();
        assert!(report.documents.is_empty());
        assert!(report.peers.is_empty());
    }

    // ── Organization endpoint ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_endpoint_returns_wire_documents() {
        let app = build_router(fixed_tree(vec![doc("hit", 0.8), doc("other", 0.3)]));
        let uri = retrieve_uri("chest pain", r#"{"org":"A"}"#, r#"{"k":1}"#);

        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["query"], json!("chest pain"));
        let docs = body["docs"].as_array().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["kwargs"]["page_content"], json!("hit"));
        assert_eq!(docs[0]["kwargs"]["metadata"]["score"], json!(0.8));
    }

    #[tokio::test]
    async fn test_endpoint_rejects_malformed_userinfo() {
        let app = build_router(fixed_tree(vec![]));
        let uri = retrieve_uri("q", "not json", "{}");

        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], json!("bad_request"));
    }

    #[tokio::test]
    async fn test_endpoint_rejects_missing_parameters() {
        let app = build_router(fixed_tree(vec![]));
        let response = app
            .oneshot(Request::builder().uri("/api/retrieve?query=q").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], json!("bad_request"));
        assert!(body["message"].as_str().unwrap().contains("userinfo"));
    }

    /// An unavailable index is a server error, not an empty answer.
    #[tokio::test]
    async fn test_endpoint_surfaces_index_failure() {
        let leaf = LeafNode::new("A/broken", attributes_from(json!({})), Corpus::default(), Arc::new(FailingBuilder));
        let app = build_router(Arc::new(leaf.into()));
        let uri = retrieve_uri("q", "{}", "{}");

        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(!body["message"].as_str().unwrap().contains("collection missing"));
    }

    #[tokio::test]
    async fn test_health() {
        let app = build_router(fixed_tree(vec![]));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "ok", "org": "A"}));
    }

    // ── Configuration ─────────────────────────────────────────────────────────

    const ORG_TOML: &str = r#"
        id = "A"
        kind = "router"
        attributes = { org = "A" }

        [[gate.policies]]
        id = "members"
        effect = "allow"
        [gate.policies.rules.subject]
        "$.org" = { condition = "Equals", value = "A" }

        [[children]]
        id = "A/cardiology"
        kind = "leaf"
        attributes = { org = "A", dept_id = "cardiology" }

        [[children.corpus.records]]
        name = "Edward Fisher"
        finding = "chest pain radiating to left arm"

        [[children.corpus.records]]
        name = "Janet Aguilar"
        finding = "routine checkup no findings"
    "#;

    #[test]
    fn test_org_config_builds_gated_tree() {
        let tree = OrgConfig::from_toml_str(ORG_TOML, ".")
            .unwrap()
            .build_tree(&BuildOptions::default())
            .unwrap();
        assert_eq!(tree.id(), "A");

        let params = SearchParameters::default().with_k(1);
        let member = tree.retrieve("chest pain", &subject(json!({"org": "A"})), &params).unwrap();
        assert_eq!(member.len(), 1);
        assert_eq!(member[0].metadata["name"], json!("Edward Fisher"));

        let outsider = tree.retrieve("chest pain", &subject(json!({"org": "B"})), &params).unwrap();
        assert!(outsider.is_empty());
    }

    #[test]
    fn test_org_config_audits_decisions() {
        let writer = Arc::new(InMemoryAuditWriter::new("A"));
        let tree = OrgConfig::from_toml_str(ORG_TOML, ".")
            .unwrap()
            .build_tree(&BuildOptions::default().with_audit(writer.clone()))
            .unwrap();

        tree.retrieve("q", &subject(json!({"sub": "u1", "org": "B"})), &SearchParameters::default())
            .unwrap();

        let log = writer.export_log();
        assert_eq!(log.events.len(), 1);
        assert_eq!(log.events[0].record.evaluator, "A:gate");
        assert!(writer.verify_integrity());
    }

    #[test]
    fn test_org_config_rejects_unknown_kind() {
        let result = OrgConfig::from_toml_str("id = \"A\"\nkind = \"proxy\"\n", ".");
        assert!(matches!(result, Err(MediragError::Config { .. })));
    }

    #[test]
    fn test_org_config_rejects_bad_policy() {
        let toml = r#"
            id = "A"
            kind = "leaf"

            [[gate.policies]]
            id = "empty"
            effect = "allow"
            [gate.policies.rules.subject]
            "$.org" = { condition = "IsIn", values = [] }
        "#;
        let result = OrgConfig::from_toml_str(toml, ".")
            .unwrap()
            .build_tree(&BuildOptions::default());
        assert!(matches!(result, Err(MediragError::PolicyConfiguration { .. })));
    }

    #[test]
    fn test_eager_index_fails_at_build() {
        let toml = r#"
            id = "A/leaf"
            kind = "leaf"
            eager_index = true
        "#;
        let options = BuildOptions {
            index_builder: Arc::new(FailingBuilder),
            audit: None,
        };
        let result = OrgConfig::from_toml_str(toml, ".").unwrap().build_tree(&options);
        assert!(matches!(result, Err(MediragError::IndexUnavailable { .. })));
    }

    #[test]
    fn test_federation_config_defaults() {
        let config = FederationConfig::from_toml_str(
            r#"peers = ["http://127.0.0.1:5001/api/retrieve", "http://127.0.0.1:5002/api/retrieve"]"#,
        )
        .unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.concurrency(), 2);
        assert_eq!(config.search, SearchParameters::default());
        assert!(config.known_names.is_empty());

        let tuned = FederationConfig::from_toml_str(
            r#"
            peers = ["http://a/api/retrieve"]
            timeout_secs = 5
            max_concurrency = 8
            known_names = ["Edward Fisher"]

            [search]
            k = 3
            secure = false
            "#,
        )
        .unwrap();
        assert_eq!(tuned.timeout(), Duration::from_secs(5));
        assert_eq!(tuned.concurrency(), 8);
        assert_eq!(tuned.search.k, 3);
        assert_eq!(tuned.search.fetch_k, 20);
        assert!(!tuned.search.secure);
    }

    #[test]
    fn test_federation_config_rejects_bad_peer() {
        let result = FederationConfig::from_toml_str(r#"peers = ["not a url"]"#);
        assert!(matches!(result, Err(MediragError::Config { .. })));
    }
}
