//! End-to-end tests for the sentinel over real TCP workers.

use crate::cluster::Sentinel;
use crate::query::TermQuery;
use crate::registry::{Endpoint, EndpointHub, MemoryRegistry, Registry, Unlimited};
use crate::testing::utils::{init_tracing, make_doc, start_registered_worker};
use std::sync::Arc;
use std::time::Duration;

const HEARTBEAT: Duration = Duration::from_secs(2);

fn sentinel_over(registry: Arc<MemoryRegistry>) -> Sentinel {
    Sentinel::new(Arc::new(EndpointHub::new(registry, Arc::new(Unlimited))))
}

#[tokio::test]
async fn test_add_search_delete_across_cluster() {
    init_tracing();
    let registry = Arc::new(MemoryRegistry::new(Duration::from_secs(10)));

    let mut workers = Vec::new();
    for _ in 0..3 {
        workers.push(
            start_registered_worker(registry.clone(), HEARTBEAT)
                .await
                .unwrap(),
        );
    }

    let sentinel = sentinel_over(registry);

    // Writes land on one balanced worker each.
    for id in ["a", "b", "c", "d"] {
        let affected = sentinel
            .add_doc(make_doc(id, &[("title", "cat")]))
            .await
            .unwrap();
        assert_eq!(affected, 1);
    }

    // Search fans out and merges all workers' results.
    let hits = sentinel
        .search(&TermQuery::keyword("title", "cat"), None, None, &[])
        .await;
    let mut ids: Vec<String> = hits.into_iter().map(|d| d.doc_id).collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);

    // Count sums the per-worker partials.
    assert_eq!(sentinel.count().await, 4);

    // Delete reaches whichever worker holds the document.
    assert_eq!(sentinel.delete_doc("a").await, 1);
    assert_eq!(sentinel.delete_doc("a").await, 0);
    assert_eq!(sentinel.count().await, 3);

    sentinel.close().await.unwrap();
    for worker in workers {
        worker.close().await.unwrap();
    }
}

#[tokio::test]
async fn test_search_survives_dead_endpoints() {
    init_tracing();
    let registry = Arc::new(MemoryRegistry::new(Duration::from_secs(10)));

    // One live worker holding a document.
    let worker = start_registered_worker(registry.clone(), HEARTBEAT)
        .await
        .unwrap();
    worker
        .indexer()
        .add_doc(make_doc("alive", &[("title", "cat")]))
        .unwrap();

    // Two registered endpoints nobody is listening on.
    for port in [1, 2] {
        registry
            .register(
                crate::cluster::INDEX_SERVICE,
                &Endpoint::new(format!("127.0.0.1:{}", port), 1.0),
                0,
            )
            .await
            .unwrap();
    }

    let sentinel = sentinel_over(registry);
    let hits = sentinel
        .search(&TermQuery::keyword("title", "cat"), None, None, &[])
        .await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_id, "alive");

    sentinel.close().await.unwrap();
    worker.close().await.unwrap();
}

#[tokio::test]
async fn test_add_doc_without_workers_fails() {
    init_tracing();
    let registry = Arc::new(MemoryRegistry::new(Duration::from_secs(10)));
    let sentinel = sentinel_over(registry);

    let res = sentinel.add_doc(make_doc("a", &[("title", "cat")])).await;
    assert!(matches!(res, Err(crate::error::Error::NoAliveWorker(_))));

    // Fan-out operations degrade to empty results instead.
    assert_eq!(sentinel.delete_doc("a").await, 0);
    assert!(sentinel
        .search(&TermQuery::keyword("title", "cat"), None, None, &[])
        .await
        .is_empty());
    assert_eq!(sentinel.count().await, 0);
}

#[tokio::test]
async fn test_deregistered_worker_leaves_rotation() {
    init_tracing();
    let registry = Arc::new(MemoryRegistry::new(Duration::from_secs(10)));

    let keeper = start_registered_worker(registry.clone(), HEARTBEAT)
        .await
        .unwrap();
    let leaver = start_registered_worker(registry.clone(), HEARTBEAT)
        .await
        .unwrap();

    let sentinel = sentinel_over(registry);
    assert_eq!(sentinel.count().await, 0);

    leaver.close().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // All writes must now land on the remaining worker.
    for id in ["a", "b"] {
        sentinel
            .add_doc(make_doc(id, &[("title", "cat")]))
            .await
            .unwrap();
    }
    assert_eq!(keeper.indexer().count(), 2);

    sentinel.close().await.unwrap();
    keeper.close().await.unwrap();
}
