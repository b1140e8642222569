//! Concurrency-safe keyword table partitioned into independently locked
//! segments.
//!
//! A keyword always maps to the same segment, so operations on different
//! keywords in different segments never contend. A second, finer lock pool
//! guards read-modify-write sequences on an individual keyword's posting
//! list; the segment lock is only held for the map lookup itself, never
//! across a posting-list mutation.

use crate::index::posting::PostingList;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::Arc;
use twox_hash::XxHash32;

/// Size of the fine-grained per-keyword lock pool.
const KEYWORD_LOCKS: usize = 1000;

/// Hash a canonical keyword into the 32-bit score/partition space.
pub fn hash_keyword(key: &str) -> u32 {
    let mut hasher = XxHash32::with_seed(0);
    hasher.write(key.as_bytes());
    hasher.finish() as u32
}

/// Sharded map from canonical keyword to its posting list.
pub struct ShardedKeywordTable {
    segments: Vec<RwLock<HashMap<String, Arc<RwLock<PostingList>>>>>,
    keyword_locks: Vec<Mutex<()>>,
}

impl ShardedKeywordTable {
    /// Create a table with `segments` partitions sized for roughly
    /// `capacity` keywords in total.
    pub fn new(segments: usize, capacity: usize) -> Self {
        let segments = segments.max(1);
        let per_segment = capacity / segments;

        Self {
            segments: (0..segments)
                .map(|_| RwLock::new(HashMap::with_capacity(per_segment)))
                .collect(),
            keyword_locks: (0..KEYWORD_LOCKS).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Number of segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    fn segment_of(&self, key: &str) -> usize {
        hash_keyword(key) as usize % self.segments.len()
    }

    /// The fine-grained lock guarding read-modify-write sequences on
    /// `key`'s posting list. Callers must hold it for the whole
    /// lookup-or-create-then-mutate sequence.
    pub fn keyword_lock(&self, key: &str) -> &Mutex<()> {
        &self.keyword_locks[hash_keyword(key) as usize % self.keyword_locks.len()]
    }

    /// Look up the posting list for `key` under the segment's read lock.
    pub fn get(&self, key: &str) -> Option<Arc<RwLock<PostingList>>> {
        self.segments[self.segment_of(key)].read().get(key).cloned()
    }

    /// Insert or replace the posting list for `key` under the segment's
    /// write lock.
    pub fn set(&self, key: &str, list: Arc<RwLock<PostingList>>) {
        self.segments[self.segment_of(key)]
            .write()
            .insert(key.to_string(), list);
    }

    /// Fetch `key`'s posting list, creating an empty one if absent.
    ///
    /// The segment lock is released before the returned list is touched.
    pub fn get_or_create(&self, key: &str) -> Arc<RwLock<PostingList>> {
        if let Some(list) = self.get(key) {
            return list;
        }
        self.segments[self.segment_of(key)]
            .write()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(PostingList::new())))
            .clone()
    }

    /// Total number of keywords across all segments.
    pub fn keyword_count(&self) -> usize {
        self.segments.iter().map(|s| s.read().len()).sum()
    }
}

impl std::fmt::Debug for ShardedKeywordTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedKeywordTable")
            .field("segments", &self.segments.len())
            .field("keywords", &self.keyword_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::posting::PostingEntry;
    use crate::index::Bitmap;

    #[test]
    fn test_stable_partitioning() {
        let table = ShardedKeywordTable::new(8, 100);
        for key in ["a", "b", "title\u{1}cat", "body\u{1}fish"] {
            assert_eq!(table.segment_of(key), table.segment_of(key));
        }
    }

    #[test]
    fn test_get_set() {
        let table = ShardedKeywordTable::new(4, 16);
        assert!(table.get("missing").is_none());

        let list = Arc::new(RwLock::new(PostingList::new()));
        list.write().insert(
            1,
            PostingEntry {
                doc_id: "d1".into(),
                features: Bitmap::default(),
            },
        );
        table.set("k", list);

        let got = table.get("k").unwrap();
        assert_eq!(got.read().len(), 1);
    }

    #[test]
    fn test_get_or_create_returns_same_list() {
        let table = ShardedKeywordTable::new(4, 16);
        let a = table.get_or_create("k");
        let b = table.get_or_create("k");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(table.keyword_count(), 1);
    }

    #[test]
    fn test_concurrent_distinct_keywords() {
        use std::thread;

        let table = Arc::new(ShardedKeywordTable::new(4, 1000));
        let mut handles = Vec::new();

        for t in 0..8 {
            let table = table.clone();
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    let key = format!("kw-{}-{}", t, i);
                    let _guard = table.keyword_lock(&key).lock();
                    let list = table.get_or_create(&key);
                    list.write().insert(
                        i,
                        PostingEntry {
                            doc_id: format!("doc-{}", i),
                            features: Bitmap::default(),
                        },
                    );
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(table.keyword_count(), 800);
    }
}
