use std::collections::HashSet;

/// A named location within a document, attached to a heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub id: String,
    /// True when the author wrote `{#id}` rather than relying on the slug.
    pub explicit: bool,
}

/// Derive an anchor id from heading text.
///
/// Lowercases, keeps alphanumerics, `-` and `_`, collapses whitespace and
/// dashes into a single `-`, and drops everything else.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("section");
    }
    slug
}

/// Whether `id` is usable as an explicit anchor.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && !id.chars().any(|c| c.is_whitespace() || c == '#')
}

/// Hands out unique anchor ids within one document.
///
/// Explicit ids are reserved up front so an automatic slug never steals an
/// id the author spelled out later in the document.
#[derive(Debug, Default)]
pub struct AnchorAllocator {
    reserved: HashSet<String>,
    taken: HashSet<String>,
}

impl AnchorAllocator {
    pub fn new<'a>(explicit: impl IntoIterator<Item = &'a str>) -> Self {
        AnchorAllocator {
            reserved: explicit.into_iter().map(str::to_string).collect(),
            taken: HashSet::new(),
        }
    }

    /// Claim an explicit id. Returns false if it was already claimed.
    pub fn claim_explicit(&mut self, id: &str) -> bool {
        self.taken.insert(id.to_string())
    }

    /// Produce a fresh slug-based anchor for heading text.
    pub fn allocate(&mut self, text: &str) -> String {
        let base = slugify(text);
        let mut candidate = base.clone();
        let mut n = 0usize;
        while self.taken.contains(&candidate) || self.reserved.contains(&candidate) {
            n += 1;
            candidate = format!("{}-{}", base, n);
        }
        self.taken.insert(candidate.clone());
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        assert_eq!(slugify("Getting Started"), "getting-started");
        assert_eq!(slugify("  What's new in 2.0?  "), "whats-new-in-20");
        assert_eq!(slugify("snake_case -- and  dashes"), "snake_case-and-dashes");
        assert_eq!(slugify("Ünïcode Wörds"), "ünïcode-wörds");
        assert_eq!(slugify("!!!"), "section");
        assert_eq!(slugify("-leading and trailing-"), "leading-and-trailing");
    }

    #[test]
    fn duplicates_get_suffixes() {
        let mut alloc = AnchorAllocator::default();
        assert_eq!(alloc.allocate("Usage"), "usage");
        assert_eq!(alloc.allocate("Usage"), "usage-1");
        assert_eq!(alloc.allocate("usage"), "usage-2");
    }

    #[test]
    fn reserved_ids_are_skipped() {
        let mut alloc = AnchorAllocator::new(["install"]);
        assert_eq!(alloc.allocate("Install"), "install-1");
        assert!(alloc.claim_explicit("install"));
        assert!(!alloc.claim_explicit("install"));
    }

    #[test]
    fn id_validation() {
        assert!(is_valid_id("faq-1"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("two words"));
        assert!(!is_valid_id("a#b"));
    }
}
