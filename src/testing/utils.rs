//! Shared helpers for integration tests.

use crate::cluster::{IndexHandle, IndexWorker};
use crate::config::NodeConfig;
use crate::error::Result;
use crate::index::Indexer;
use crate::registry::Registry;
use crate::ring::Colony;
use crate::storage::MemoryStore;
use crate::types::Document;
use std::sync::Arc;
use std::time::Duration;

/// Initialize test logging once per process.
#[cfg(test)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A document with one keyword per `(field, word)` pair.
pub fn make_doc(doc_id: &str, words: &[(&str, &str)]) -> Document {
    let mut doc = Document::new(doc_id);
    for (field, word) in words {
        doc = doc.with_keyword(*field, *word);
    }
    doc
}

/// Start a worker on an ephemeral port and register it.
pub async fn start_registered_worker(
    registry: Arc<dyn Registry>,
    heartbeat: Duration,
) -> Result<Arc<IndexWorker>> {
    let config = NodeConfig::new("127.0.0.1:0".parse().unwrap());
    let worker = IndexWorker::start(config).await?;
    worker.register(registry, heartbeat).await?;
    Ok(worker)
}

/// A colony backed by a fresh local indexer.
pub fn local_colony(group_id: &str, virtual_nodes: usize) -> Arc<Colony> {
    let indexer = Arc::new(Indexer::new(Arc::new(MemoryStore::new()), 64));
    Arc::new(Colony::new(
        group_id,
        vec![format!("{}:9000", group_id)],
        virtual_nodes,
        IndexHandle::Local(indexer),
    ))
}
