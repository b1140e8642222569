//! Reverse (inverted) index engine.
//!
//! Evaluates boolean term-query trees against the sharded keyword table,
//! applying bitmap feature filters to each candidate posting entry.

use crate::index::posting::{ordered_intersection, ordered_union, PostingEntry, PostingList};
use crate::index::table::ShardedKeywordTable;
use crate::index::Bitmap;
use crate::query::TermQuery;
use crate::types::{Document, KeyWord};

/// Inverted index: one ordered posting list per canonical keyword.
#[derive(Debug)]
pub struct ReverseIndex {
    table: ShardedKeywordTable,
}

impl ReverseIndex {
    /// Create an index sized for roughly `doc_estimate` documents, with
    /// one table segment per available CPU.
    pub fn new(doc_estimate: usize) -> Self {
        let segments = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            table: ShardedKeywordTable::new(segments, doc_estimate),
        }
    }

    /// Index every keyword of `doc`, upserting the posting entry keyed by
    /// the document's internal ID.
    pub fn add(&self, doc: &Document) {
        for keyword in &doc.keywords {
            let key = keyword.canonical();
            if key.is_empty() {
                continue;
            }

            let _guard = self.table.keyword_lock(&key).lock();
            let list = self.table.get_or_create(&key);
            list.write().insert(
                doc.int_id,
                PostingEntry {
                    doc_id: doc.doc_id.clone(),
                    features: doc.features.clone(),
                },
            );
        }
    }

    /// Remove the posting entry for `int_id` under `keyword`. No-op when
    /// either the keyword or the entry is absent.
    pub fn delete(&self, int_id: u64, keyword: &KeyWord) {
        let key = keyword.canonical();
        let _guard = self.table.keyword_lock(&key).lock();
        if let Some(list) = self.table.get(&key) {
            list.write().remove(&int_id);
        }
    }

    /// Evaluate `query` and return the business IDs of surviving entries
    /// in ascending internal-ID order.
    pub fn search(
        &self,
        query: &TermQuery,
        on_flag: Option<&Bitmap>,
        off_flag: Option<&Bitmap>,
        or_flags: &[Bitmap],
    ) -> Vec<String> {
        self.evaluate(query, on_flag, off_flag, or_flags)
            .into_values()
            .map(|entry| entry.doc_id)
            .collect()
    }

    fn evaluate(
        &self,
        query: &TermQuery,
        on_flag: Option<&Bitmap>,
        off_flag: Option<&Bitmap>,
        or_flags: &[Bitmap],
    ) -> PostingList {
        match query {
            TermQuery::Keyword(keyword) => {
                let mut res = PostingList::new();
                let list = match self.table.get(&keyword.canonical()) {
                    Some(list) => list,
                    None => return res,
                };
                for (&int_id, entry) in list.read().iter() {
                    if feature_filter(&entry.features, on_flag, off_flag, or_flags) {
                        res.insert(int_id, entry.clone());
                    }
                }
                res
            }
            TermQuery::Must(children) => {
                let results: Vec<PostingList> = children
                    .iter()
                    .map(|child| self.evaluate(child, on_flag, off_flag, or_flags))
                    .collect();
                let refs: Vec<&PostingList> = results.iter().collect();
                ordered_intersection(&refs)
            }
            TermQuery::Should(children) => {
                let results: Vec<PostingList> = children
                    .iter()
                    .map(|child| self.evaluate(child, on_flag, off_flag, or_flags))
                    .collect();
                let refs: Vec<&PostingList> = results.iter().collect();
                ordered_union(&refs)
            }
        }
    }
}

/// Check a posting entry's feature bitmap against the three filters.
///
/// - `on_flag`: intersecting must reproduce `on_flag` exactly.
/// - `off_flag`: intersecting must yield all-zero.
/// - `or_flags`: each non-zero flag must intersect non-zero; an all-zero
///   flag is vacuously satisfied.
fn feature_filter(
    features: &Bitmap,
    on_flag: Option<&Bitmap>,
    off_flag: Option<&Bitmap>,
    or_flags: &[Bitmap],
) -> bool {
    if let Some(on) = on_flag {
        match Bitmap::intersection(&[features, on]) {
            Some(hit) if on.is_equal(&hit) => {}
            _ => return false,
        }
    }

    if let Some(off) = off_flag {
        match Bitmap::intersection(&[features, off]) {
            Some(hit) if hit.is_zero() => {}
            _ => return false,
        }
    }

    for flag in or_flags {
        if flag.is_zero() {
            continue;
        }
        match Bitmap::intersection(&[features, flag]) {
            Some(hit) if !hit.is_zero() => {}
            _ => return false,
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, int_id: u64, words: &[(&str, &str)]) -> Document {
        let mut d = Document::new(id);
        d.int_id = int_id;
        for (field, word) in words {
            d = d.with_keyword(*field, *word);
        }
        d
    }

    fn flag(cap: usize, bits: &[usize]) -> Bitmap {
        let mut m = Bitmap::with_capacity(cap);
        for &b in bits {
            m.set(b);
        }
        m
    }

    #[test]
    fn test_leaf_search() {
        let index = ReverseIndex::new(16);
        index.add(&doc("a", 1, &[("title", "cat")]));
        index.add(&doc("b", 2, &[("title", "cat")]));
        index.add(&doc("c", 3, &[("title", "dog")]));

        let res = index.search(&TermQuery::keyword("title", "cat"), None, None, &[]);
        assert_eq!(res, vec!["a", "b"]);

        let res = index.search(&TermQuery::keyword("title", "bird"), None, None, &[]);
        assert!(res.is_empty());
    }

    #[test]
    fn test_must_and_should() {
        let index = ReverseIndex::new(16);
        index.add(&doc("a", 1, &[("title", "cat"), ("body", "fish")]));
        index.add(&doc("b", 2, &[("title", "cat")]));
        index.add(&doc("c", 3, &[("body", "fish")]));

        let both = TermQuery::keyword("title", "cat").and(vec![TermQuery::keyword("body", "fish")]);
        assert_eq!(index.search(&both, None, None, &[]), vec!["a"]);

        let either =
            TermQuery::keyword("title", "cat").or(vec![TermQuery::keyword("body", "fish")]);
        assert_eq!(index.search(&either, None, None, &[]), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let index = ReverseIndex::new(16);
        let d = doc("a", 1, &[("title", "cat")]);
        index.add(&d);

        index.delete(1, &d.keywords[0]);
        index.delete(1, &d.keywords[0]);
        index.delete(99, &KeyWord::new("title", "unseen"));

        let res = index.search(&TermQuery::keyword("title", "cat"), None, None, &[]);
        assert!(res.is_empty());
    }

    #[test]
    fn test_readd_overwrites_entry() {
        let index = ReverseIndex::new(16);
        let mut d = doc("a", 1, &[("title", "cat")]);
        index.add(&d);
        d.doc_id = "a2".into();
        index.add(&d);

        let res = index.search(&TermQuery::keyword("title", "cat"), None, None, &[]);
        assert_eq!(res, vec!["a2"]);
    }

    #[test]
    fn test_on_flag_filter() {
        let index = ReverseIndex::new(16);
        let mut d = doc("a", 1, &[("title", "cat")]);
        d.features = flag(64, &[1, 3]);
        index.add(&d);

        let mut e = doc("b", 2, &[("title", "cat")]);
        e.features = flag(64, &[1]);
        index.add(&e);

        let query = TermQuery::keyword("title", "cat");
        let on = flag(64, &[1, 3]);
        assert_eq!(index.search(&query, Some(&on), None, &[]), vec!["a"]);
    }

    #[test]
    fn test_off_flag_filter() {
        let index = ReverseIndex::new(16);
        let mut d = doc("a", 1, &[("title", "cat")]);
        d.features = flag(64, &[2]);
        index.add(&d);

        let mut e = doc("b", 2, &[("title", "cat")]);
        e.features = flag(64, &[5]);
        index.add(&e);

        let query = TermQuery::keyword("title", "cat");
        let off = flag(64, &[2]);
        assert_eq!(index.search(&query, None, Some(&off), &[]), vec!["b"]);
    }

    #[test]
    fn test_or_flags_filter() {
        let index = ReverseIndex::new(16);
        let mut d = doc("a", 1, &[("title", "cat")]);
        d.features = flag(64, &[2]);
        index.add(&d);

        let mut e = doc("b", 2, &[("title", "cat")]);
        e.features = flag(64, &[9]);
        index.add(&e);

        let query = TermQuery::keyword("title", "cat");

        // Entry must hit every non-zero group; all-zero groups pass.
        let groups = vec![flag(64, &[2, 3]), flag(64, &[])];
        assert_eq!(index.search(&query, None, None, &groups), vec!["a"]);
    }
}
