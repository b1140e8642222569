//! Core document types used throughout the engine.

use crate::index::Bitmap;
use serde::{Deserialize, Serialize};

/// Separator between field and word in a keyword's canonical form.
/// A control byte that cannot occur in either part.
pub const KEYWORD_SEP: char = '\u{1}';

/// A single indexable keyword: a field name plus a word within that field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyWord {
    pub field: String,
    pub word: String,
}

impl KeyWord {
    /// Create a new keyword.
    pub fn new(field: impl Into<String>, word: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            word: word.into(),
        }
    }

    /// Canonical string form used as the posting-list key.
    ///
    /// Empty iff the word is empty.
    pub fn canonical(&self) -> String {
        if self.word.is_empty() {
            String::new()
        } else {
            format!("{}{}{}", self.field, KEYWORD_SEP, self.word)
        }
    }
}

/// A document as submitted by the caller and stored in the forward index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Caller-supplied business identifier.
    pub doc_id: String,

    /// Engine-assigned internal identifier, the posting-list key.
    /// Assigned once per generation, monotonically increasing per node.
    pub int_id: u64,

    /// Feature bitmap used for filtered search.
    pub features: Bitmap,

    /// Keywords extracted from the document.
    pub keywords: Vec<KeyWord>,
}

impl Document {
    /// Create a new document with the given business ID.
    pub fn new(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            ..Default::default()
        }
    }

    /// Attach a feature bitmap.
    pub fn with_features(mut self, features: Bitmap) -> Self {
        self.features = features;
        self
    }

    /// Append a keyword.
    pub fn with_keyword(mut self, field: impl Into<String>, word: impl Into<String>) -> Self {
        self.keywords.push(KeyWord::new(field, word));
        self
    }

    /// Serialize the document for the forward store.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize a document from a forward-store record.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_form() {
        let kw = KeyWord::new("title", "cat");
        assert_eq!(kw.canonical(), format!("title{}cat", KEYWORD_SEP));

        let empty = KeyWord::new("title", "");
        assert_eq!(empty.canonical(), "");
    }

    #[test]
    fn test_document_roundtrip() {
        let mut features = Bitmap::with_capacity(16);
        features.set(3);

        let doc = Document::new("doc-1")
            .with_features(features)
            .with_keyword("title", "cat")
            .with_keyword("body", "fish");

        let bytes = doc.to_bytes().unwrap();
        let decoded = Document::from_bytes(&bytes).unwrap();
        assert_eq!(doc, decoded);
    }
}
