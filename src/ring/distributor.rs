//! Hash-based document distribution across colonies.
//!
//! Each keyword is hashed onto the ring and its posting routed to the
//! owning colony; deletes are lazy, and boolean queries are merged across
//! colonies with the same ordered set operations the per-node engine
//! uses, keyed by business ID.

use crate::error::Result;
use crate::index::{hash_keyword, ordered_intersection, ordered_union, Bitmap};
use crate::query::TermQuery;
use crate::ring::colony::Colony;
use crate::ring::hashring::HashRing;
use crate::types::Document;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

/// Routes documents and queries onto the colony ring.
pub struct HashDistributor {
    ring: Arc<HashRing>,

    /// Business IDs marked deleted but not yet physically removed.
    /// Purged when a search encounters them.
    deleted: DashMap<String, ()>,
}

impl HashDistributor {
    /// Build the ring from the given colonies: each colony's group ID
    /// hashes to a base score and its virtual nodes are spaced evenly
    /// around the score space.
    pub fn new(colonies: Vec<Arc<Colony>>) -> Result<Self> {
        let ring = Arc::new(HashRing::new());

        for colony in &colonies {
            let base = hash_keyword(colony.group_id());
            let vnodes = colony.virtual_nodes().max(1) as u32;
            let gap = u32::MAX / vnodes;
            for i in 0..vnodes {
                ring.add(base.wrapping_add(i.wrapping_mul(gap)), colony.clone())?;
            }
        }

        Ok(Self {
            ring,
            deleted: DashMap::new(),
        })
    }

    /// The underlying ring, for rebalancing.
    pub fn ring(&self) -> &Arc<HashRing> {
        &self.ring
    }

    /// Route each keyword's posting to its owning colony.
    ///
    /// Returns the number of keyword-postings written; the first failing
    /// keyword aborts the remainder.
    pub async fn add_doc(&self, doc: &Document) -> Result<u64> {
        let mut written = 0;
        for keyword in &doc.keywords {
            let key = keyword.canonical();
            if key.is_empty() {
                continue;
            }
            let colony = self.ring.colony_for(hash_keyword(&key))?;
            written += colony.add_doc(doc.clone()).await?;
        }
        Ok(written)
    }

    /// Mark a document deleted. Physical removal is deferred to the next
    /// search that encounters the ID.
    pub fn delete_doc(&self, doc_id: &str) -> u64 {
        self.deleted.insert(doc_id.to_string(), ());
        0
    }

    /// Evaluate a boolean query across the cluster.
    pub async fn search(
        &self,
        query: &TermQuery,
        on_flag: Option<&Bitmap>,
        off_flag: Option<&Bitmap>,
        or_flags: &[Bitmap],
    ) -> Vec<Document> {
        self.evaluate(query, on_flag, off_flag, or_flags)
            .await
            .into_values()
            .collect()
    }

    /// Recursive evaluation returning results keyed by business ID in
    /// ascending order, so the cluster-level merge reuses the engine's
    /// ordered set operations.
    fn evaluate<'a>(
        &'a self,
        query: &'a TermQuery,
        on_flag: Option<&'a Bitmap>,
        off_flag: Option<&'a Bitmap>,
        or_flags: &'a [Bitmap],
    ) -> Pin<Box<dyn Future<Output = BTreeMap<String, Document>> + Send + 'a>> {
        Box::pin(async move {
            match query {
                TermQuery::Keyword(keyword) => {
                    let mut res = BTreeMap::new();
                    let key = keyword.canonical();
                    if key.is_empty() {
                        return res;
                    }

                    let colony = match self.ring.colony_for(hash_keyword(&key)) {
                        Ok(colony) => colony,
                        Err(e) => {
                            warn!(error = %e, "no colony owns keyword");
                            return res;
                        }
                    };

                    let docs = colony.search(query, on_flag, off_flag, or_flags).await;
                    for doc in docs {
                        if self.deleted.remove(&doc.doc_id).is_some() {
                            debug!(doc_id = %doc.doc_id, "purging lazily deleted document");
                            colony.delete_doc(&doc.doc_id).await;
                            continue;
                        }
                        res.insert(doc.doc_id.clone(), doc);
                    }
                    res
                }
                TermQuery::Must(children) => {
                    let mut results = Vec::with_capacity(children.len());
                    for child in children {
                        results
                            .push(self.evaluate(child, on_flag, off_flag, or_flags).await);
                    }
                    let refs: Vec<&BTreeMap<String, Document>> = results.iter().collect();
                    ordered_intersection(&refs)
                }
                TermQuery::Should(children) => {
                    let mut results = Vec::with_capacity(children.len());
                    for child in children {
                        results
                            .push(self.evaluate(child, on_flag, off_flag, or_flags).await);
                    }
                    let refs: Vec<&BTreeMap<String, Document>> = results.iter().collect();
                    ordered_union(&refs)
                }
            }
        })
    }

    /// Sum the document counts of every colony on the ring.
    pub async fn count(&self) -> u64 {
        let mut total = 0;
        for colony in self.ring.colonies() {
            total += colony.count().await;
        }
        total
    }

    /// Close every colony on the ring.
    pub async fn close(&self) -> Result<()> {
        for colony in self.ring.colonies() {
            colony.close().await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for HashDistributor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashDistributor")
            .field("virtual_nodes", &self.ring.len())
            .finish()
    }
}
