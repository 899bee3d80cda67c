use std::collections::{BTreeMap, BTreeSet};

use folio::Document;
use relative_path::{RelativePath, RelativePathBuf};

/// Outcome of looking up a reference target in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found,
    /// The document exists but failed to parse, so its anchors are unknown.
    Unchecked,
    MissingDocument,
    MissingAnchor,
}

#[derive(Debug, Clone)]
enum Entry {
    Parsed(BTreeSet<String>),
    Unparsed,
}

/// Registry of every document in the build and the anchors it defines.
#[derive(Debug, Clone, Default)]
pub struct AnchorIndex {
    documents: BTreeMap<RelativePathBuf, Entry>,
}

impl AnchorIndex {
    pub fn build<'a>(
        documents: impl IntoIterator<Item = &'a Document>,
        unparsed: impl IntoIterator<Item = &'a RelativePathBuf>,
    ) -> Self {
        let mut index = AnchorIndex::default();
        for path in unparsed {
            index.documents.insert(path.clone(), Entry::Unparsed);
        }
        for doc in documents {
            let anchors = doc.anchors.iter().map(|a| a.id.clone()).collect();
            index
                .documents
                .insert(doc.path.clone(), Entry::Parsed(anchors));
        }
        index
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Anchors of a parsed document, in sorted order.
    pub fn anchors(&self, path: &RelativePath) -> Option<impl Iterator<Item = &str>> {
        match self.documents.get(path)? {
            Entry::Parsed(anchors) => Some(anchors.iter().map(String::as_str)),
            Entry::Unparsed => None,
        }
    }

    pub fn lookup(&self, path: &RelativePath, anchor: Option<&str>) -> Lookup {
        match (self.documents.get(path), anchor) {
            (None, _) => Lookup::MissingDocument,
            (Some(Entry::Unparsed), _) => Lookup::Unchecked,
            (Some(Entry::Parsed(_)), None) => Lookup::Found,
            (Some(Entry::Parsed(anchors)), Some(anchor)) => {
                if anchors.contains(anchor) {
                    Lookup::Found
                } else {
                    Lookup::MissingAnchor
                }
            }
        }
    }
}
