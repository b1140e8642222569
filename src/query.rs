//! Boolean term-query trees.
//!
//! A query is either a single keyword leaf, an AND-group (`Must`) or an
//! OR-group (`Should`) of sub-queries. Trees are built by the caller and
//! immutable during evaluation.

use crate::types::KeyWord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A boolean query over indexed keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TermQuery {
    /// Match documents indexed under one keyword.
    Keyword(KeyWord),

    /// Match documents satisfying every sub-query.
    Must(Vec<TermQuery>),

    /// Match documents satisfying at least one sub-query.
    Should(Vec<TermQuery>),
}

impl TermQuery {
    /// Create a keyword leaf.
    pub fn keyword(field: impl Into<String>, word: impl Into<String>) -> Self {
        TermQuery::Keyword(KeyWord::new(field, word))
    }

    /// True if the query matches nothing by construction.
    pub fn is_empty(&self) -> bool {
        match self {
            TermQuery::Keyword(kw) => kw.word.is_empty(),
            TermQuery::Must(children) | TermQuery::Should(children) => children.is_empty(),
        }
    }

    /// Combine this query with others into an AND-group.
    ///
    /// An empty receiver contributes nothing to the group.
    pub fn and(self, others: impl IntoIterator<Item = TermQuery>) -> Self {
        let children = self.fold_with(others);
        if children.len() == 1 {
            children.into_iter().next().unwrap()
        } else {
            TermQuery::Must(children)
        }
    }

    /// Combine this query with others into an OR-group.
    ///
    /// An empty receiver contributes nothing to the group.
    pub fn or(self, others: impl IntoIterator<Item = TermQuery>) -> Self {
        let children = self.fold_with(others);
        if children.len() == 1 {
            children.into_iter().next().unwrap()
        } else {
            TermQuery::Should(children)
        }
    }

    fn fold_with(self, others: impl IntoIterator<Item = TermQuery>) -> Vec<TermQuery> {
        let mut children = Vec::new();
        if !self.is_empty() {
            children.push(self);
        }
        children.extend(others);
        children
    }
}

impl Default for TermQuery {
    /// The empty query: an AND-group with no children.
    fn default() -> Self {
        TermQuery::Must(Vec::new())
    }
}

impl fmt::Display for TermQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermQuery::Keyword(kw) => write!(f, "{}", kw.canonical()),
            TermQuery::Must(children) => write_group(f, children, '&'),
            TermQuery::Should(children) => write_group(f, children, '|'),
        }
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, children: &[TermQuery], sep: char) -> fmt::Result {
    if children.len() == 1 {
        return write!(f, "{}", children[0]);
    }
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", child)?;
    }
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KEYWORD_SEP;

    #[test]
    fn test_empty() {
        assert!(TermQuery::keyword("title", "").is_empty());
        assert!(TermQuery::Must(vec![]).is_empty());
        assert!(!TermQuery::keyword("title", "cat").is_empty());
    }

    #[test]
    fn test_combinators_skip_empty_receiver() {
        let q = TermQuery::keyword("a", "").and(vec![
            TermQuery::keyword("title", "cat"),
            TermQuery::keyword("title", "dog"),
        ]);
        match &q {
            TermQuery::Must(children) => assert_eq!(children.len(), 2),
            other => panic!("expected Must, got {:?}", other),
        }
    }

    #[test]
    fn test_display() {
        let q = TermQuery::keyword("t", "a").or(vec![TermQuery::keyword("t", "b")
            .and(vec![TermQuery::keyword("t", "c")])]);
        let rendered = q.to_string();
        let sep = KEYWORD_SEP;
        assert_eq!(
            rendered,
            format!("(t{s}a|(t{s}b&t{s}c))", s = sep)
        );
    }

    #[test]
    fn test_single_child_group_renders_flat() {
        let q = TermQuery::Must(vec![TermQuery::keyword("t", "a")]);
        assert_eq!(q.to_string(), format!("t{}a", KEYWORD_SEP));
    }
}
