//! Tests for ring rebalancing and data-range handoff.

use crate::index::hash_keyword;
use crate::query::TermQuery;
use crate::ring::{HashRing, score_in_range};
use crate::testing::utils::{init_tracing, local_colony, make_doc};
use std::sync::Arc;

#[tokio::test]
async fn test_transfer_to_next_moves_owned_range() {
    init_tracing();

    let a = local_colony("a", 4);
    let b = local_colony("b", 4);

    // Three vnodes; documents land on `a` through the middle vnode.
    let ring = Arc::new(HashRing::new());
    let keyword = ("title", "cat");
    let score = hash_keyword(&make_doc("x", &[keyword]).keywords[0].canonical());

    let middle = score; // owns exactly the keyword's score
    let left = score.wrapping_sub(1000);
    let right = score.wrapping_add(1000);
    ring.add(left, b.clone()).unwrap();
    ring.add(middle, a.clone()).unwrap();
    ring.add(right, b.clone()).unwrap();

    for id in ["x", "y"] {
        let owner = ring.colony_for(hash_keyword(
            &make_doc(id, &[keyword]).keywords[0].canonical(),
        ))
        .unwrap();
        owner.add_doc(make_doc(id, &[keyword])).await.unwrap();
    }
    assert_eq!(a.count().await, 2);

    let moved = ring.transfer_to_next(middle).await.unwrap();
    assert_eq!(moved, 2);
    assert_eq!(a.count().await, 0);
    assert_eq!(b.count().await, 2);

    // The keyword's range now resolves to the successor colony.
    let owner = ring.colony_for(score).unwrap();
    assert_eq!(owner.group_id(), "b");
    let hits = owner
        .search(&TermQuery::keyword("title", "cat"), None, None, &[])
        .await;
    assert_eq!(hits.len(), 2);
}

#[tokio::test]
async fn test_transfer_all_drains_colony() {
    init_tracing();

    let a = local_colony("a", 4);
    let b = local_colony("b", 4);

    let ring = Arc::new(HashRing::new());
    for (i, score) in [100u32, 2_000_000, 3_000_000_000].iter().enumerate() {
        ring.add(*score, if i % 2 == 0 { a.clone() } else { b.clone() })
            .unwrap();
    }
    // a owns scores 100 and 3_000_000_000; b owns 2_000_000.

    for i in 0..20 {
        let doc = make_doc(&format!("doc-{}", i), &[("title", &format!("w{}", i))]);
        let score = hash_keyword(&doc.keywords[0].canonical());
        ring.colony_for(score).unwrap().add_doc(doc).await.unwrap();
    }
    let on_a = a.count().await;
    assert_eq!(on_a + b.count().await, 20);

    let moved = ring.transfer_all_to_next("a").await.unwrap();
    assert!(moved >= on_a);

    // After the drain completes no virtual node references the colony
    // and every document lives on the survivor.
    assert_eq!(a.count().await, 0);
    assert_eq!(b.count().await, 20);
    assert_eq!(ring.len(), 1);
    for i in 0..20 {
        let doc = make_doc(&format!("doc-{}", i), &[("title", &format!("w{}", i))]);
        let score = hash_keyword(&doc.keywords[0].canonical());
        assert_eq!(ring.colony_for(score).unwrap().group_id(), "b");
    }
}

#[test]
fn test_range_membership_is_exclusive_inclusive() {
    assert!(score_in_range(10, 5, 10));
    assert!(!score_in_range(5, 5, 10));
    assert!(!score_in_range(11, 5, 10));
}
