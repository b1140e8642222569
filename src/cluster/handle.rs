//! Capability handle over the two indexing frontends.
//!
//! A node either indexes locally or proxies to the cluster through the
//! sentinel; the variant is chosen once at startup and held behind this
//! handle for the rest of the process.

use crate::cluster::sentinel::Sentinel;
use crate::error::{Error, Result};
use crate::index::{Bitmap, Indexer};
use crate::query::TermQuery;
use crate::types::Document;
use std::sync::Arc;

/// Indexing frontend: a local single-node indexer or a cluster proxy.
#[derive(Debug, Clone)]
pub enum IndexHandle {
    /// Index on this node only.
    Local(Arc<Indexer>),

    /// Scatter-gather across the cluster.
    Cluster(Arc<Sentinel>),
}

impl IndexHandle {
    /// Add (or update) a document.
    pub async fn add_doc(&self, doc: Document) -> Result<u64> {
        match self {
            IndexHandle::Local(indexer) => indexer.add_doc(doc),
            IndexHandle::Cluster(sentinel) => sentinel.add_doc(doc).await,
        }
    }

    /// Delete a document by business ID, returning the affected count.
    pub async fn delete_doc(&self, doc_id: &str) -> u64 {
        match self {
            IndexHandle::Local(indexer) => indexer.delete_doc(doc_id),
            IndexHandle::Cluster(sentinel) => sentinel.delete_doc(doc_id).await,
        }
    }

    /// Evaluate a boolean query, returning the matching documents.
    pub async fn search(
        &self,
        query: &TermQuery,
        on_flag: Option<&Bitmap>,
        off_flag: Option<&Bitmap>,
        or_flags: &[Bitmap],
    ) -> Vec<Document> {
        match self {
            IndexHandle::Local(indexer) => indexer.search(query, on_flag, off_flag, or_flags),
            IndexHandle::Cluster(sentinel) => {
                sentinel.search(query, on_flag, off_flag, or_flags).await
            }
        }
    }

    /// Number of indexed documents.
    pub async fn count(&self) -> u64 {
        match self {
            IndexHandle::Local(indexer) => indexer.count(),
            IndexHandle::Cluster(sentinel) => sentinel.count().await,
        }
    }

    /// Release the underlying resources.
    pub async fn close(&self) -> Result<()> {
        match self {
            IndexHandle::Local(indexer) => indexer.close(),
            IndexHandle::Cluster(sentinel) => sentinel.close().await,
        }
    }

    /// Export every stored document for a data-range handoff.
    ///
    /// Only the local frontend can export; the cluster proxy has no
    /// authoritative document set.
    pub fn export_docs(&self) -> Result<Vec<Document>> {
        match self {
            IndexHandle::Local(indexer) => Ok(indexer.export()),
            IndexHandle::Cluster(_) => Err(Error::Internal(
                "cluster proxy cannot export documents".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_local_handle_roundtrip() {
        let handle = IndexHandle::Local(Arc::new(Indexer::new(
            Arc::new(MemoryStore::new()),
            16,
        )));

        handle
            .add_doc(Document::new("a").with_keyword("title", "cat"))
            .await
            .unwrap();
        assert_eq!(handle.count().await, 1);

        let hits = handle
            .search(&TermQuery::keyword("title", "cat"), None, None, &[])
            .await;
        assert_eq!(hits.len(), 1);

        assert_eq!(handle.delete_doc("a").await, 1);
        assert_eq!(handle.count().await, 0);
    }

    #[tokio::test]
    async fn test_local_handle_exports() {
        let handle = IndexHandle::Local(Arc::new(Indexer::new(
            Arc::new(MemoryStore::new()),
            16,
        )));
        handle
            .add_doc(Document::new("a").with_keyword("title", "cat"))
            .await
            .unwrap();

        let docs = handle.export_docs().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].doc_id, "a");
    }
}
