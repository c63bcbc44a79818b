//! TOML configuration for organization trees and the federation root.
//!
//! An organization file describes its root node; routers nest children:
//!
//! ```toml
//! id = "A"
//! kind = "router"
//! attributes = { org = "A", depts = ["cardiology", "psychiatry"] }
//! gate = { file = "policies/a_org.toml" }
//!
//! [[children]]
//! id = "A/psychiatry"
//! kind = "leaf"
//! attributes = { org = "A", dept_id = "psychiatry" }
//! gate = { file = "policies/a_dept.toml" }
//! document_policy = { file = "policies/a_psychiatry_docs.json" }
//! corpus = { file = "data/a_psychiatry.json", text_column = "text" }
//! ```
//!
//! Relative paths resolve against the directory of the file that names them.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::Deserialize;
use tracing::info;

use medirag_audit::AuditedEvaluator;
use medirag_contracts::{
    attributes::AttributeMap,
    error::{MediragError, MediragResult},
    search::SearchParameters,
};
use medirag_core::{
    corpus::Corpus,
    index::InMemoryIndexBuilder,
    traits::{AccessEvaluator, AuditWriter, IndexBuilder},
    LeafNode, RetrieverNode, RouterNode,
};
use medirag_policy::{AbacPdp, PolicySpec, PolicyStore};

use crate::dispatcher::DEFAULT_PEER_TIMEOUT;

// ── Organization tree ─────────────────────────────────────────────────────────

/// Where a node's policies come from.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PolicySource {
    /// A TOML or JSON policy document, chosen by extension.
    File { file: PathBuf },
    Inline { policies: Vec<PolicySpec> },
}

impl PolicySource {
    fn load(&self, base_dir: &Path) -> MediragResult<AbacPdp> {
        match self {
            PolicySource::File { file } => AbacPdp::from_file(&base_dir.join(file)),
            PolicySource::Inline { policies } => {
                PolicyStore::from_policies(policies.clone()).map(AbacPdp::new)
            }
        }
    }
}

/// A leaf's documents: a JSON array file, inline records, or both.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorpusConfig {
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub records: Vec<AttributeMap>,
    /// Column holding free text to chunk. Absent for structured corpora.
    #[serde(default)]
    pub text_column: Option<String>,
}

impl CorpusConfig {
    fn load(&self, base_dir: &Path) -> MediragResult<Corpus> {
        let mut records = match &self.file {
            Some(file) => Corpus::from_json_file(&base_dir.join(file), None)?.into_records(),
            None => Vec::new(),
        };
        records.extend(self.records.iter().cloned());
        Ok(match &self.text_column {
            Some(column) => Corpus::unstructured(records, column.clone()),
            None => Corpus::structured(records),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeafConfig {
    pub id: String,
    #[serde(default)]
    pub attributes: AttributeMap,
    #[serde(default)]
    pub gate: Option<PolicySource>,
    #[serde(default)]
    pub document_policy: Option<PolicySource>,
    #[serde(default)]
    pub corpus: CorpusConfig,
    /// Build the index at startup instead of on the first query.
    #[serde(default)]
    pub eager_index: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    pub id: String,
    #[serde(default)]
    pub attributes: AttributeMap,
    #[serde(default)]
    pub gate: Option<PolicySource>,
    #[serde(default)]
    pub children: Vec<NodeConfig>,
}

/// One node of an organization tree, tagged by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeConfig {
    Router(RouterConfig),
    Leaf(LeafConfig),
}

impl NodeConfig {
    pub fn id(&self) -> &str {
        match self {
            NodeConfig::Router(router) => &router.id,
            NodeConfig::Leaf(leaf) => &leaf.id,
        }
    }
}

/// Collaborators shared by every node built from one configuration.
#[derive(Clone)]
pub struct BuildOptions {
    pub index_builder: Arc<dyn IndexBuilder>,
    /// When set, every gate and document policy records its decisions here.
    pub audit: Option<Arc<dyn AuditWriter>>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            index_builder: Arc::new(InMemoryIndexBuilder::default()),
            audit: None,
        }
    }
}

impl BuildOptions {
    /// Record every gate and document decision to `writer`. One event is
    /// written per decision, so an `InMemoryAuditWriter` grows with traffic
    /// until its owner calls `rotate` and persists the returned segment.
    pub fn with_audit(mut self, writer: Arc<dyn AuditWriter>) -> Self {
        self.audit = Some(writer);
        self
    }

    fn evaluator(&self, label: String, pdp: AbacPdp) -> Arc<dyn AccessEvaluator> {
        match &self.audit {
            Some(writer) => Arc::new(AuditedEvaluator::new(label, pdp, Arc::clone(writer))),
            None => Arc::new(pdp),
        }
    }
}

/// An organization's retrieval tree as configured.
#[derive(Debug, Clone)]
pub struct OrgConfig {
    pub root: NodeConfig,
    /// Directory relative paths are resolved against.
    pub base_dir: PathBuf,
}

impl OrgConfig {
    pub fn from_toml_str(s: &str, base_dir: impl Into<PathBuf>) -> MediragResult<Self> {
        let root: NodeConfig = toml::from_str(s).map_err(|e| MediragError::Config {
            reason: format!("failed to parse organization TOML: {}", e),
        })?;
        Ok(Self {
            root,
            base_dir: base_dir.into(),
        })
    }

    pub fn from_file(path: &Path) -> MediragResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| MediragError::Config {
            reason: format!("failed to read organization file '{}': {}", path.display(), e),
        })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_toml_str(&contents, base_dir)
    }

    /// Construct the node tree. Any policy or corpus error fails the build.
    pub fn build_tree(&self, options: &BuildOptions) -> MediragResult<RetrieverNode> {
        let tree = build_node(&self.root, &self.base_dir, options)?;
        info!(root = %self.root.id(), "organization tree built");
        Ok(tree)
    }
}

fn build_node(config: &NodeConfig, base_dir: &Path, options: &BuildOptions) -> MediragResult<RetrieverNode> {
    match config {
        NodeConfig::Router(router) => {
            let children = router
                .children
                .iter()
                .map(|child| build_node(child, base_dir, options))
                .collect::<MediragResult<Vec<_>>>()?;
            let mut node = RouterNode::new(router.id.clone(), router.attributes.clone(), children);
            if let Some(gate) = &router.gate {
                let pdp = gate.load(base_dir)?;
                node = node.gate(options.evaluator(format!("{}:gate", router.id), pdp));
            }
            Ok(node.into())
        }
        NodeConfig::Leaf(leaf) => {
            let corpus = leaf.corpus.load(base_dir)?;
            let mut node = LeafNode::new(
                leaf.id.clone(),
                leaf.attributes.clone(),
                corpus,
                Arc::clone(&options.index_builder),
            );
            if let Some(gate) = &leaf.gate {
                let pdp = gate.load(base_dir)?;
                node = node.gate(options.evaluator(format!("{}:gate", leaf.id), pdp));
            }
            if let Some(policy) = &leaf.document_policy {
                let pdp = policy.load(base_dir)?;
                node = node.document_policy(options.evaluator(format!("{}:documents", leaf.id), pdp));
            }
            if leaf.eager_index {
                node.materialize()?;
            }
            Ok(node.into())
        }
    }
}

// ── Federation root ───────────────────────────────────────────────────────────

/// Settings for the federation root.
#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    /// Full retrieve URLs, one per organization.
    pub peers: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Peer calls in flight at once; defaults to the number of peers.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    /// Default search parameters for queries issued from this root.
    #[serde(default)]
    pub search: SearchParameters,
    /// Patient names the reference name extractor recognises.
    #[serde(default)]
    pub known_names: Vec<String>,
}

impl FederationConfig {
    pub fn new(peers: Vec<String>) -> Self {
        Self {
            peers,
            timeout_secs: default_timeout_secs(),
            max_concurrency: None,
            search: SearchParameters::default(),
            known_names: Vec::new(),
        }
    }

    pub fn from_toml_str(s: &str) -> MediragResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| MediragError::Config {
            reason: format!("failed to parse federation TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> MediragResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| MediragError::Config {
            reason: format!("failed to read federation file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn concurrency(&self) -> usize {
        self.max_concurrency.unwrap_or(self.peers.len()).max(1)
    }

    fn validate(&self) -> MediragResult<()> {
        if self.timeout_secs == 0 {
            return Err(MediragError::Config {
                reason: "timeout_secs must be at least 1".to_string(),
            });
        }
        for peer in &self.peers {
            reqwest::Url::parse(peer).map_err(|e| MediragError::Config {
                reason: format!("invalid peer URL '{}': {}", peer, e),
            })?;
        }
        Ok(())
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_PEER_TIMEOUT.as_secs()
}
