pub mod anchor;
pub mod document;
pub mod frontmatter;
pub mod parser;
pub mod reference;
pub mod source;

pub use document::{Block, Document, Inline};
pub use parser::{ParseError, Parser};

/// Extension of markup source files; cross-references must name it.
pub const SOURCE_EXTENSION: &str = "md";

/// Parse a standalone snippet with file id 0. Mostly useful in tests.
pub fn parse_str(path: &str, source: &str) -> Result<Document, Vec<ParseError>> {
    Parser::new(path, source, 0).parse()
}
