//! Ordered posting lists and merge-style set operations.
//!
//! A posting list is an ordered map from internal document ID to the data
//! indexed under one keyword. Intermediate query results use the same
//! shape, so intersection and union are generic over the key type and are
//! reused at the cluster level where results are keyed by business ID.

use crate::index::Bitmap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One entry in a keyword's posting list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingEntry {
    /// Business ID of the document.
    pub doc_id: String,

    /// Feature bitmap of the document, checked by search filters.
    pub features: Bitmap,
}

/// The ordered set of entries indexed under one keyword, keyed by
/// internal document ID.
pub type PostingList = BTreeMap<u64, PostingEntry>;

/// Intersect K ordered maps by advancing K cursors in lock-step.
///
/// At each step the maximum current key across all cursors is found; when
/// every cursor sits on that maximum the entry is emitted and all cursors
/// advance, otherwise only the cursors strictly behind the maximum advance.
/// Terminates as soon as any cursor exhausts its list.
///
/// Zero inputs yield an empty map, one input is returned unchanged.
pub fn ordered_intersection<K, V>(lists: &[&BTreeMap<K, V>]) -> BTreeMap<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    match lists.len() {
        0 => return BTreeMap::new(),
        1 => return lists[0].clone(),
        _ => {}
    }

    let mut cursors: Vec<_> = lists.iter().map(|l| l.iter().peekable()).collect();
    let mut res = BTreeMap::new();

    loop {
        let mut max_key: Option<K> = None;
        let mut at_max = 0;

        for cursor in cursors.iter_mut() {
            let key = match cursor.peek() {
                Some((k, _)) => (*k).clone(),
                None => return res,
            };
            match &max_key {
                Some(current) if key > *current => {
                    max_key = Some(key);
                    at_max = 1;
                }
                Some(current) if key == *current => at_max += 1,
                Some(_) => {}
                None => {
                    max_key = Some(key);
                    at_max = 1;
                }
            }
        }

        let max_key = max_key.expect("cursors are non-empty");

        if at_max == cursors.len() {
            let (key, value) = cursors[0].next().expect("peeked entry present");
            res.insert(key.clone(), value.clone());
            for cursor in cursors.iter_mut().skip(1) {
                cursor.next();
            }
        } else {
            for cursor in cursors.iter_mut() {
                if cursor.peek().map(|(k, _)| **k < max_key).unwrap_or(false) {
                    cursor.next();
                }
            }
        }
    }
}

/// Union of K ordered maps: every list is walked once and each key enters
/// the result only the first time it is seen.
///
/// Zero inputs yield an empty map, one input is returned unchanged.
pub fn ordered_union<K, V>(lists: &[&BTreeMap<K, V>]) -> BTreeMap<K, V>
where
    K: Ord + Clone + std::hash::Hash,
    V: Clone,
{
    match lists.len() {
        0 => return BTreeMap::new(),
        1 => return lists[0].clone(),
        _ => {}
    }

    let mut res = BTreeMap::new();
    let mut seen = HashSet::new();

    for list in lists {
        for (key, value) in list.iter() {
            if seen.insert(key.clone()) {
                res.insert(key.clone(), value.clone());
            }
        }
    }

    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn list(keys: &[u64]) -> BTreeMap<u64, &'static str> {
        keys.iter().map(|&k| (k, "v")).collect()
    }

    fn keys<V>(map: &BTreeMap<u64, V>) -> Vec<u64> {
        map.keys().copied().collect()
    }

    #[test]
    fn test_intersection_matches_set_semantics() {
        let a = list(&[1, 3, 5, 7, 9]);
        let b = list(&[2, 3, 5, 9, 11]);
        let c = list(&[3, 4, 5, 9]);

        let got = ordered_intersection(&[&a, &b, &c]);
        let expect: BTreeSet<u64> = [&a, &b, &c]
            .iter()
            .map(|m| m.keys().copied().collect::<BTreeSet<_>>())
            .reduce(|x, y| x.intersection(&y).copied().collect())
            .unwrap();
        assert_eq!(keys(&got), expect.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_intersection_order_independent() {
        let a = list(&[1, 2, 3, 4]);
        let b = list(&[2, 4, 6]);
        assert_eq!(
            keys(&ordered_intersection(&[&a, &b])),
            keys(&ordered_intersection(&[&b, &a]))
        );
    }

    #[test]
    fn test_intersection_degenerate_inputs() {
        let empty: Vec<&BTreeMap<u64, &str>> = Vec::new();
        assert!(ordered_intersection(&empty).is_empty());

        let a = list(&[4, 8]);
        assert_eq!(keys(&ordered_intersection(&[&a])), vec![4, 8]);

        let b = BTreeMap::new();
        assert!(ordered_intersection(&[&a, &b]).is_empty());
    }

    #[test]
    fn test_union_no_duplicates_ascending() {
        let a = list(&[5, 1, 9]);
        let b = list(&[2, 5, 10]);
        let c = list(&[1]);

        let got = ordered_union(&[&a, &b, &c]);
        assert_eq!(keys(&got), vec![1, 2, 5, 9, 10]);
    }

    #[test]
    fn test_union_degenerate_inputs() {
        let empty: Vec<&BTreeMap<u64, &str>> = Vec::new();
        assert!(ordered_union(&empty).is_empty());

        let a = list(&[3, 7]);
        assert_eq!(keys(&ordered_union(&[&a])), vec![3, 7]);
    }
}
