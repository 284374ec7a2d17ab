pub mod index;
pub mod matrix;
pub mod recommend;
pub mod text;

use serde::Serialize;
use std::collections::HashMap;

pub type DocId = u32;
pub type TermId = u32;

/// One fetched page. Produced by the crawler on a successful fetch and
/// consumed destructively by the indexer; only the metadata outlives the
/// fold into the posting map.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: DocId,
    pub url: String,
    pub title: String,
    pub text: String,
}

/// How often one term occurred in one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocMeta {
    pub url: String,
    pub title: String,
}

/// Aggregated term counts for a batch of documents. The indexer workers fold
/// into this under a single mutex; once they join, ownership moves wholesale
/// to the index builder and the map becomes read-only.
#[derive(Debug, Default)]
pub struct PostingMap {
    pub postings: HashMap<String, Vec<Posting>>,
    pub documents: HashMap<DocId, DocMeta>,
}

impl PostingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one document's term counts into the map. The document body is
    /// dropped here; there is no retention requirement beyond indexing.
    pub fn fold(&mut self, document: Document, counts: HashMap<String, u32>) {
        for (term, count) in counts {
            self.postings
                .entry(term)
                .or_default()
                .push(Posting { doc_id: document.id, count });
        }
        self.documents.insert(
            document.id,
            DocMeta {
                url: document.url,
                title: document.title,
            },
        );
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
