mod markup;

use relative_path::RelativePathBuf;

use crate::anchor::Anchor;
use crate::frontmatter::FrontMatter;
use crate::reference::CrossReference;

/// A parsed markup file. Immutable once the parser hands it out.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Path relative to the source root, e.g. `guide/intro.md`.
    pub path: RelativePathBuf,
    /// Id in the `SimpleFiles` database the document was added to.
    pub source_id: usize,
    pub front_matter: FrontMatter,
    pub title: String,
    pub blocks: Vec<Block>,
    /// Heading anchors in document order.
    pub anchors: Vec<Anchor>,
    /// Internal links in document order.
    pub references: Vec<CrossReference>,
}

impl Document {
    pub fn has_anchor(&self, id: &str) -> bool {
        self.anchors.iter().any(|a| a.id == id)
    }

    /// Iterate over all headings, including those nested in lists and quotes.
    pub fn headings(&self) -> Vec<(u8, &Anchor, &[Inline])> {
        let mut out = Vec::new();
        collect_headings(&self.blocks, &mut out);
        out
    }
}

fn collect_headings<'a>(blocks: &'a [Block], out: &mut Vec<(u8, &'a Anchor, &'a [Inline])>) {
    for block in blocks {
        match block {
            Block::Heading {
                level,
                anchor,
                content,
            } => out.push((*level, anchor, content)),
            Block::List { items, .. } => {
                for item in items {
                    collect_headings(item, out);
                }
            }
            Block::Quote(inner) | Block::Callout { blocks: inner, .. } => {
                collect_headings(inner, out)
            }
            _ => {}
        }
    }
}

/// A structural unit of a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading {
        level: u8,
        anchor: Anchor,
        content: Vec<Inline>,
    },
    Paragraph(Vec<Inline>),
    Code {
        language: Option<String>,
        literal: String,
    },
    Table {
        alignments: Vec<ColumnAlignment>,
        header: Vec<Vec<Inline>>,
        rows: Vec<Vec<Vec<Inline>>>,
    },
    List {
        kind: ListKind,
        /// No blank lines between items or inside them. Paragraphs of a tight
        /// list render without `<p>`.
        tight: bool,
        /// Each item is its own sequence of blocks.
        items: Vec<Vec<Block>>,
    },
    Quote(Vec<Block>),
    /// An admonition such as `> [!NOTE]`.
    Callout {
        kind: CalloutKind,
        blocks: Vec<Block>,
    },
    Html(String),
    Rule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Ordered { start: u64 },
    Unordered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalloutKind {
    Note,
    Tip,
    Important,
    Warning,
    Caution,
}

impl CalloutKind {
    /// Lowercase name, used for markup markers and CSS classes.
    pub fn name(self) -> &'static str {
        match self {
            CalloutKind::Note => "note",
            CalloutKind::Tip => "tip",
            CalloutKind::Important => "important",
            CalloutKind::Warning => "warning",
            CalloutKind::Caution => "caution",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            CalloutKind::Note => "Note",
            CalloutKind::Tip => "Tip",
            CalloutKind::Important => "Important",
            CalloutKind::Warning => "Warning",
            CalloutKind::Caution => "Caution",
        }
    }
}

/// Inline content of a paragraph, heading, list item or table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text(String),
    Strong(Vec<Inline>),
    Emphasis(Vec<Inline>),
    Strikethrough(Vec<Inline>),
    Code(String),
    Link {
        dest: String,
        title: String,
        content: Vec<Inline>,
    },
    Image {
        dest: String,
        title: String,
        alt: Vec<Inline>,
    },
    Html(String),
    SoftBreak,
    HardBreak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnAlignment {
    None,
    Left,
    Center,
    Right,
}

/// Flatten inlines to their visible text, e.g. for titles and slugs.
pub fn plain_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    push_plain_text(inlines, &mut out);
    out
}

fn push_plain_text(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(s) | Inline::Code(s) => out.push_str(s),
            Inline::Strong(children)
            | Inline::Emphasis(children)
            | Inline::Strikethrough(children)
            | Inline::Link {
                content: children, ..
            }
            | Inline::Image { alt: children, .. } => push_plain_text(children, out),
            Inline::SoftBreak | Inline::HardBreak => out.push(' '),
            Inline::Html(_) => {}
        }
    }
}
