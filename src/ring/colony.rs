//! Colonies: logical shard owners on the consistent-hash ring.

use crate::cluster::IndexHandle;
use crate::error::{Result, RingError};
use crate::index::{hash_keyword, Bitmap};
use crate::query::TermQuery;
use crate::types::Document;
use tracing::{debug, warn};

/// True when `score` falls inside the circular range `(left, right]`.
///
/// When `left >= right` the range wraps across the top of the score
/// space.
pub fn score_in_range(score: u32, left: u32, right: u32) -> bool {
    if left < right {
        score > left && score <= right
    } else {
        score > left || score <= right
    }
}

/// A logical shard owner: one or more physical replicas addressed as a
/// group, an indexing frontend, and its virtual-node footprint.
#[derive(Debug)]
pub struct Colony {
    group_id: String,
    replicas: Vec<String>,
    virtual_nodes: usize,
    handle: IndexHandle,
}

impl Colony {
    /// Create a colony.
    pub fn new(
        group_id: impl Into<String>,
        replicas: Vec<String>,
        virtual_nodes: usize,
        handle: IndexHandle,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            replicas,
            virtual_nodes,
            handle,
        }
    }

    /// Group identifier, hashed to place the colony on the ring.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Replica addresses backing this colony.
    pub fn replicas(&self) -> &[String] {
        &self.replicas
    }

    /// Configured number of virtual nodes.
    pub fn virtual_nodes(&self) -> usize {
        self.virtual_nodes
    }

    /// Index a document on this colony.
    pub async fn add_doc(&self, doc: Document) -> Result<u64> {
        self.handle.add_doc(doc).await
    }

    /// Delete a document by business ID.
    pub async fn delete_doc(&self, doc_id: &str) -> u64 {
        self.handle.delete_doc(doc_id).await
    }

    /// Evaluate a query on this colony.
    pub async fn search(
        &self,
        query: &TermQuery,
        on_flag: Option<&Bitmap>,
        off_flag: Option<&Bitmap>,
        or_flags: &[Bitmap],
    ) -> Vec<Document> {
        self.handle.search(query, on_flag, off_flag, or_flags).await
    }

    /// Number of documents owned by this colony.
    pub async fn count(&self) -> u64 {
        self.handle.count().await
    }

    /// Release the colony's frontend.
    pub async fn close(&self) -> Result<()> {
        self.handle.close().await
    }

    /// Hand off every document with a keyword hashing into `(left,
    /// right]` to `target`, deleting it locally. Returns the number of
    /// documents moved.
    pub async fn transfer_range(&self, target: &Colony, left: u32, right: u32) -> Result<u64> {
        let docs = self
            .handle
            .export_docs()
            .map_err(|_| RingError::TransferUnsupported(self.group_id.clone()))?;
        let mut moved = 0;

        for doc in docs {
            let owned = doc.keywords.iter().any(|kw| {
                let key = kw.canonical();
                !key.is_empty() && score_in_range(hash_keyword(&key), left, right)
            });
            if !owned {
                continue;
            }

            let doc_id = doc.doc_id.clone();
            target.add_doc(doc).await?;
            if self.delete_doc(&doc_id).await == 0 {
                warn!(doc_id = %doc_id, "handoff source no longer held the document");
            }
            moved += 1;
        }

        debug!(
            from = %self.group_id,
            to = %target.group_id,
            left,
            right,
            moved,
            "range handoff complete"
        );
        Ok(moved)
    }
}
