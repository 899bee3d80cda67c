//! Cross-reference resolution. Runs once over the whole document set, before
//! anything is rendered.

use std::collections::BTreeMap;
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use folio::Document;
use folio::reference::{CrossReference, RefTarget};
use folio::source::Location;
use relative_path::RelativePathBuf;
use thiserror::Error;

use crate::anchors::{AnchorIndex, Lookup};
use crate::paths::{join_reference, output_path, relative_href};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    MissingDocument(RelativePathBuf),
    MissingAnchor {
        document: RelativePathBuf,
        anchor: String,
    },
    OutsideRoot,
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnresolvedReason::MissingDocument(path) => write!(f, "no document `{}`", path),
            UnresolvedReason::MissingAnchor { document, anchor } => {
                write!(f, "`{}` has no anchor `{}`", document, anchor)
            }
            UnresolvedReason::OutsideRoot => f.write_str("path leaves the source root"),
        }
    }
}

/// A cross-reference token that names nothing in the build.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "unresolved reference `{token}` in {document}:{line}:{column}: {reason}",
    line = .location.line,
    column = .location.column
)]
pub struct UnresolvedReference {
    pub token: String,
    /// The document the token appears in.
    pub document: RelativePathBuf,
    pub file_id: usize,
    pub span: Range<usize>,
    pub location: Location,
    pub reason: UnresolvedReason,
}

impl UnresolvedReference {
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        Diagnostic::error()
            .with_message(format!("unresolved reference `{}`", self.token))
            .with_labels(vec![
                Label::primary(self.file_id, self.span.clone()).with_message(self.reason.to_string()),
            ])
    }
}

/// A document together with the href of every cross-reference it contains.
#[derive(Debug, Clone)]
pub struct ResolvedDocument<'a> {
    pub document: &'a Document,
    /// Token as written -> href relative to the document's own page.
    pub links: BTreeMap<String, String>,
}

impl ResolvedDocument<'_> {
    /// The href for a link destination: resolved if it is a cross-reference,
    /// otherwise as written.
    pub fn href<'d>(&'d self, dest: &'d str) -> &'d str {
        self.links.get(dest).map_or(dest, String::as_str)
    }
}

/// Resolve every cross-reference in `documents`. Either all of them resolve
/// or every failure is returned, ordered by document path then position.
pub fn resolve<'a>(
    documents: &'a [Document],
    index: &AnchorIndex,
) -> Result<Vec<ResolvedDocument<'a>>, Vec<UnresolvedReference>> {
    let mut resolved = Vec::with_capacity(documents.len());
    let mut unresolved = Vec::new();

    for document in documents {
        let mut links = BTreeMap::new();
        for reference in &document.references {
            match resolve_one(document, reference, index) {
                Ok(href) => {
                    links.insert(reference.token.clone(), href);
                }
                Err(reason) => unresolved.push(UnresolvedReference {
                    token: reference.token.clone(),
                    document: document.path.clone(),
                    file_id: document.source_id,
                    span: reference.span.clone(),
                    location: reference.location,
                    reason,
                }),
            }
        }
        resolved.push(ResolvedDocument { document, links });
    }

    if unresolved.is_empty() {
        Ok(resolved)
    } else {
        unresolved.sort_by(|a, b| {
            (&a.document, a.span.start).cmp(&(&b.document, b.span.start))
        });
        Err(unresolved)
    }
}

fn resolve_one(
    document: &Document,
    reference: &CrossReference,
    index: &AnchorIndex,
) -> Result<String, UnresolvedReason> {
    match &reference.target {
        RefTarget::Local(anchor) if anchor.is_empty() => Ok("#".to_string()),
        RefTarget::Local(anchor) => {
            if document.has_anchor(anchor) {
                Ok(format!("#{}", anchor))
            } else {
                Err(UnresolvedReason::MissingAnchor {
                    document: document.path.clone(),
                    anchor: anchor.clone(),
                })
            }
        }
        RefTarget::Document { path, anchor } => {
            let target = join_reference(&document.path, path).ok_or(UnresolvedReason::OutsideRoot)?;
            match index.lookup(&target, anchor.as_deref()) {
                Lookup::Found | Lookup::Unchecked => {}
                Lookup::MissingDocument => return Err(UnresolvedReason::MissingDocument(target)),
                Lookup::MissingAnchor => {
                    return Err(UnresolvedReason::MissingAnchor {
                        document: target,
                        anchor: anchor.clone().unwrap_or_default(),
                    });
                }
            }
            let mut href = relative_href(&output_path(&document.path), &output_path(&target));
            if let Some(anchor) = anchor {
                href.push('#');
                href.push_str(anchor);
            }
            Ok(href)
        }
    }
}
