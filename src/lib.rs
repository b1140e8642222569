//! Distributed sharded keyword/attribute search engine.
//!
//! Documents are indexed by keyword and bitmap features, sharded across
//! worker nodes via consistent hashing, and queried through boolean
//! expressions evaluated locally and merged across the cluster.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Client                        │
//! └──────────────────────────────────────────────┘
//!          │                        │
//!          ▼                        ▼
//! ┌─────────────────┐     ┌──────────────────────┐
//! │   Sentinel       │     │   HashDistributor    │
//! │ (scatter-gather) │     │ (keyword → colony)   │
//! └─────────────────┘     └──────────────────────┘
//!          │                        │
//!          │   registry / RPC       │   HashRing
//!          ▼                        ▼
//! ┌──────────────────────────────────────────────┐
//! │  IndexWorker: Indexer                         │
//! │   ├─ ReverseIndex (sharded keyword table,     │
//! │   │   ordered posting lists, bitmap filters)  │
//! │   └─ ForwardStore (business ID → document)    │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use quarry::index::Indexer;
//! use quarry::query::TermQuery;
//! use quarry::storage::MemoryStore;
//! use quarry::types::Document;
//! use std::sync::Arc;
//!
//! let indexer = Indexer::new(Arc::new(MemoryStore::new()), 1000);
//!
//! let doc = Document::new("article-1")
//!     .with_keyword("title", "cat")
//!     .with_keyword("body", "fish");
//! indexer.add_doc(doc).unwrap();
//!
//! let query = TermQuery::keyword("title", "cat");
//! let hits = indexer.search(&query, None, None, &[]);
//! assert_eq!(hits[0].doc_id, "article-1");
//! ```

pub mod cluster;
pub mod config;
pub mod error;
pub mod index;
pub mod network;
pub mod query;
pub mod registry;
pub mod ring;
pub mod storage;
pub mod testing;
pub mod types;

// Re-export main types for convenience.
pub use cluster::{IndexHandle, IndexWorker, Sentinel, INDEX_SERVICE};
pub use config::{LimiterConfig, NodeConfig, NodeMode};
pub use error::{Error, Result};
pub use index::{Bitmap, Indexer, ReverseIndex};
pub use query::TermQuery;
pub use registry::{Endpoint, EndpointHub, MemoryRegistry, Registry, TokenBucket};
pub use ring::{Colony, HashDistributor, HashRing};
pub use storage::{ForwardStore, MemoryStore, StoreBackend};
pub use types::{Document, KeyWord};
