//! # medirag-core
//!
//! The access-controlled retrieval tree for one organization.
//!
//! This crate provides:
//! - The collaborator traits (`AccessEvaluator`, `Retriever`,
//!   `SimilarityIndex`, `IndexBuilder`, `NameExtractor`, `AuditWriter`)
//! - `LeafNode` and `RouterNode`, joined in the `RetrieverNode` sum type
//! - The score-based `merge` used at every level of the federation
//! - A reference in-memory similarity index and corpus chunker
//!
//! ## Usage
//!
//! ```rust,ignore
//! use medirag_core::{LeafNode, RouterNode, RetrieverNode, traits::Retriever};
//!
//! let tree: RetrieverNode = RouterNode::new("A", org_attrs, vec![leaf.into()])
//!     .gate(org_pdp)
//!     .into();
//! let docs = tree.retrieve("chest pain", &subject, &params)?;
//! ```

pub mod corpus;
pub mod index;
pub mod leaf;
pub mod merge;
pub mod node;
pub mod router;
pub mod traits;

pub use leaf::LeafNode;
pub use merge::merge;
pub use node::RetrieverNode;
pub use router::RouterNode;
