use std::ops::Range;

use crate::source::Location;

/// Where a cross-reference token points, as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    /// An anchor in the current document: `#anchor`
    Local(String),
    /// Another document, optionally at an anchor: `guide/intro.md#setup`.
    /// A leading `/` makes the path relative to the source root.
    Document { path: String, anchor: Option<String> },
}

impl RefTarget {
    pub fn anchor(&self) -> Option<&str> {
        match self {
            RefTarget::Local(anchor) => Some(anchor),
            RefTarget::Document { anchor, .. } => anchor.as_deref(),
        }
    }

    /// Classify a link destination. Returns `None` for external URLs and
    /// links to anything other than markup documents.
    pub fn classify(dest: &str) -> Option<RefTarget> {
        if dest.is_empty() || dest.starts_with("//") || has_scheme(dest) {
            return None;
        }

        let (path, anchor) = match dest.split_once('#') {
            Some((path, anchor)) => (path, Some(anchor)),
            None => (dest, None),
        };

        if path.is_empty() {
            return anchor.map(|a| RefTarget::Local(a.to_string()));
        }

        let is_markup = path
            .rsplit_once('.')
            .is_some_and(|(stem, ext)| !stem.is_empty() && ext == crate::SOURCE_EXTENSION);
        if !is_markup {
            return None;
        }

        Some(RefTarget::Document {
            path: path.to_string(),
            anchor: anchor.filter(|a| !a.is_empty()).map(str::to_string),
        })
    }
}

/// An internal link found while parsing, to be checked at build time.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossReference {
    /// The link destination exactly as written.
    pub token: String,
    pub target: RefTarget,
    pub span: Range<usize>,
    pub location: Location,
}

fn has_scheme(dest: &str) -> bool {
    let Some((scheme, _)) = dest.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(path: &str, anchor: Option<&str>) -> Option<RefTarget> {
        Some(RefTarget::Document {
            path: path.into(),
            anchor: anchor.map(Into::into),
        })
    }

    #[test]
    fn local_anchor() {
        assert_eq!(RefTarget::classify("#install"), Some(RefTarget::Local("install".into())));
        assert_eq!(RefTarget::classify("#"), Some(RefTarget::Local(String::new())));
    }

    #[test]
    fn document_references() {
        assert_eq!(RefTarget::classify("faq.md"), doc("faq.md", None));
        assert_eq!(RefTarget::classify("../ref/api.md#errors"), doc("../ref/api.md", Some("errors")));
        assert_eq!(RefTarget::classify("/index.md#"), doc("/index.md", None));
    }

    #[test]
    fn external_and_asset_links_are_ignored() {
        assert_eq!(RefTarget::classify("https://example.com/a.md"), None);
        assert_eq!(RefTarget::classify("mailto:team@example.com"), None);
        assert_eq!(RefTarget::classify("//cdn.example.com/x.md"), None);
        assert_eq!(RefTarget::classify("img/logo.png"), None);
        assert_eq!(RefTarget::classify("notes.txt#top"), None);
        assert_eq!(RefTarget::classify(".md"), None);
        assert_eq!(RefTarget::classify(""), None);
    }

    #[test]
    fn colon_in_path_is_not_a_scheme() {
        assert_eq!(RefTarget::classify("./a:b.md"), doc("./a:b.md", None));
    }
}
