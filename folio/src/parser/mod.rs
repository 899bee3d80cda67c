pub mod error;
mod lint;
mod structural;

pub use error::ParseError;

use relative_path::RelativePathBuf;

use crate::document::{Block, Document, plain_text};
use crate::frontmatter::{self, FrontMatter, FrontMatterError};
use crate::source::LineIndex;

/// Parser entry point.
pub struct Parser<'a> {
    path: RelativePathBuf,
    source: &'a str,
    file_id: usize,
}

impl<'a> Parser<'a> {
    /// `path` is the file's location relative to the source root.
    pub fn new(path: impl Into<RelativePathBuf>, source: &'a str, file_id: usize) -> Self {
        Parser {
            path: path.into(),
            source,
            file_id,
        }
    }

    /// Parse the source markup into a complete Document.
    /// Every error in the file is reported; nothing is returned on failure.
    pub fn parse(&self) -> Result<Document, Vec<ParseError>> {
        let index = LineIndex::new(self.source);
        let mut errors = Vec::new();

        let bom = if self.source.starts_with('\u{feff}') { 3 } else { 0 };
        let (front_matter, body_offset) = match frontmatter::split(self.source) {
            Ok(Some(raw)) => match FrontMatter::from_raw(&raw) {
                Ok(fm) => (fm, raw.body_offset),
                Err(err) => {
                    errors.push(self.front_matter_error(err, &index));
                    (FrontMatter::default(), raw.body_offset)
                }
            },
            Ok(None) => (FrontMatter::default(), bom),
            Err(err) => {
                errors.push(self.front_matter_error(err, &index));
                (FrontMatter::default(), bom)
            }
        };

        errors.extend(lint::check_list_nesting(
            self.source,
            body_offset,
            self.file_id,
            &index,
        ));

        let body = match structural::parse_body(self.source, body_offset, self.file_id, &index) {
            Ok(body) => Some(body),
            Err(errs) => {
                errors.extend(errs);
                None
            }
        };

        match body {
            Some(body) if errors.is_empty() => {
                let title = self.title(&front_matter, &body.blocks);
                Ok(Document {
                    path: self.path.clone(),
                    source_id: self.file_id,
                    front_matter,
                    title,
                    blocks: body.blocks,
                    anchors: body.anchors,
                    references: body.references,
                })
            }
            _ => {
                errors.sort_by_key(|e| e.span.start);
                Err(errors)
            }
        }
    }

    fn front_matter_error(&self, err: FrontMatterError, index: &LineIndex) -> ParseError {
        let location = index.location(self.source, err.span.start);
        ParseError::error(err.message, err.span, self.file_id, location)
    }

    /// Front matter title, else the first level-1 heading, else the file stem.
    fn title(&self, front_matter: &FrontMatter, blocks: &[Block]) -> String {
        if let Some(title) = &front_matter.title {
            return title.clone();
        }
        blocks
            .iter()
            .find_map(|b| match b {
                Block::Heading {
                    level: 1, content, ..
                } => Some(plain_text(content)),
                _ => None,
            })
            .unwrap_or_else(|| self.path.file_stem().unwrap_or("untitled").to_string())
    }
}
