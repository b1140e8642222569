//! Per-node indexer facade composing the reverse index with the forward
//! document store.

use crate::error::{Error, Result};
use crate::index::reverse::ReverseIndex;
use crate::index::Bitmap;
use crate::query::TermQuery;
use crate::storage::ForwardStore;
use crate::types::Document;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-node indexer: forward store for full documents, reverse index for
/// lookup, and a process-wide counter assigning internal IDs.
pub struct Indexer {
    forward: Arc<dyn ForwardStore>,
    reverse: ReverseIndex,
    next_int_id: AtomicU64,
}

impl Indexer {
    /// Create an indexer over an opened forward store, sized for roughly
    /// `doc_estimate` documents.
    pub fn new(forward: Arc<dyn ForwardStore>, doc_estimate: usize) -> Self {
        Self {
            forward,
            reverse: ReverseIndex::new(doc_estimate),
            next_int_id: AtomicU64::new(0),
        }
    }

    /// Add (or update) a document.
    ///
    /// A previous generation under the same business ID is deleted first,
    /// so at most one live internal ID ever resolves to a business ID.
    /// Returns the number of documents written.
    pub fn add_doc(&self, mut doc: Document) -> Result<u64> {
        let doc_id = doc.doc_id.trim();
        if doc_id.is_empty() {
            return Err(Error::InvalidDocument("empty business id".into()));
        }
        doc.doc_id = doc_id.to_string();

        self.delete_doc(&doc.doc_id);

        doc.int_id = self.next_int_id.fetch_add(1, Ordering::SeqCst) + 1;

        let record = Bytes::from(doc.to_bytes()?);
        self.forward.set(doc.doc_id.as_bytes(), record)?;
        self.reverse.add(&doc);

        debug!(doc_id = %doc.doc_id, int_id = doc.int_id, "document indexed");
        Ok(1)
    }

    /// Delete a document by business ID, removing both its forward record
    /// and every reverse-index entry. Returns the number removed (0 when
    /// the ID is unknown).
    pub fn delete_doc(&self, doc_id: &str) -> u64 {
        let record = match self.forward.get(doc_id.as_bytes()) {
            Ok(Some(record)) => record,
            _ => return 0,
        };

        let doc = match Document::from_bytes(&record) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(doc_id, error = %e, "stored document is malformed, dropping record");
                let _ = self.forward.delete(doc_id.as_bytes());
                return 0;
            }
        };

        for keyword in &doc.keywords {
            self.reverse.delete(doc.int_id, keyword);
        }
        let _ = self.forward.delete(doc_id.as_bytes());
        1
    }

    /// Evaluate `query` against the reverse index and hydrate the matching
    /// documents from the forward store. Malformed or missing records are
    /// skipped with a warning, never failing the whole search.
    pub fn search(
        &self,
        query: &TermQuery,
        on_flag: Option<&Bitmap>,
        off_flag: Option<&Bitmap>,
        or_flags: &[Bitmap],
    ) -> Vec<Document> {
        let ids = self.reverse.search(query, on_flag, off_flag, or_flags);
        if ids.is_empty() {
            return Vec::new();
        }

        let keys: Vec<&[u8]> = ids.iter().map(|id| id.as_bytes()).collect();
        let records = match self.forward.batch_get(&keys) {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "forward store batch read failed");
                return Vec::new();
            }
        };

        let mut docs = Vec::with_capacity(records.len());
        for record in records {
            if record.is_empty() {
                continue;
            }
            match Document::from_bytes(&record) {
                Ok(doc) => docs.push(doc),
                Err(e) => warn!(error = %e, "skipping malformed forward record"),
            }
        }
        docs
    }

    /// Replay the forward store into the reverse index at startup.
    ///
    /// With `weight < 1.0` each record is replayed with that probability,
    /// supporting partial reloads across unevenly weighted nodes. The
    /// internal-ID counter is advanced past every replayed ID. Returns the
    /// number of documents loaded.
    pub fn load(&self, weight: f64) -> u64 {
        let mut loaded = 0u64;
        let mut max_int_id = 0u64;

        self.forward.for_each(&mut |key, value| {
            if weight < 1.0 && rand::random::<f64>() >= weight {
                return;
            }
            match Document::from_bytes(value) {
                Ok(doc) => {
                    max_int_id = max_int_id.max(doc.int_id);
                    self.reverse.add(&doc);
                    loaded += 1;
                }
                Err(e) => {
                    warn!(key = %String::from_utf8_lossy(key), error = %e,
                        "skipping malformed record during load");
                }
            }
        });

        self.next_int_id.fetch_max(max_int_id, Ordering::SeqCst);
        info!(loaded, "replayed forward store into reverse index");
        loaded
    }

    /// Number of documents in the forward store.
    pub fn count(&self) -> u64 {
        self.forward.len()
    }

    /// Export every stored document, skipping malformed records.
    /// Used by the ring layer during data-range handoff.
    pub fn export(&self) -> Vec<Document> {
        let mut docs = Vec::new();
        self.forward.for_each(&mut |_, value| {
            if let Ok(doc) = Document::from_bytes(value) {
                docs.push(doc);
            }
        });
        docs
    }

    /// Close the underlying forward store.
    pub fn close(&self) -> Result<()> {
        self.forward.close()
    }
}

impl std::fmt::Debug for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("documents", &self.count())
            .finish()
    }
}
