use std::ops::Range;

use pulldown_cmark::{
    BlockQuoteKind, CodeBlockKind, Event, HeadingLevel, LinkType, Options, Parser as CmarkParser,
    Tag, TagEnd,
};

use crate::anchor::{self, Anchor, AnchorAllocator};
use crate::document::{
    Block, CalloutKind, ColumnAlignment, Inline, ListKind, plain_text,
};
use crate::parser::error::ParseError;
use crate::parser::lint;
use crate::reference::{CrossReference, RefTarget};
use crate::source::LineIndex;

type Events<'e> = [(Event<'e>, Range<usize>)];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Everything the event walk produces for one document body.
pub(crate) struct Body {
    pub blocks: Vec<Block>,
    pub anchors: Vec<Anchor>,
    pub references: Vec<CrossReference>,
}

/// Parse the markup starting at `body_offset` into blocks.
/// All spans refer to the full `source`.
pub(crate) fn parse_body(
    source: &str,
    body_offset: usize,
    file_id: usize,
    index: &LineIndex,
) -> Result<Body, Vec<ParseError>> {
    let options = Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TABLES
        | Options::ENABLE_HEADING_ATTRIBUTES
        | Options::ENABLE_GFM;
    let parser = CmarkParser::new_ext(&source[body_offset..], options);
    let events: Vec<(Event<'_>, Range<usize>)> = parser
        .into_offset_iter()
        .map(|(ev, r)| (ev, r.start + body_offset..r.end + body_offset))
        .collect();

    let explicit: Vec<String> = events
        .iter()
        .filter_map(|(ev, _)| match ev {
            Event::Start(Tag::Heading { id: Some(id), .. }) => Some(id.to_string()),
            _ => None,
        })
        .collect();

    let mut state = ParseState {
        source,
        file_id,
        index,
        allocator: AnchorAllocator::new(explicit.iter().map(String::as_str)),
        anchors: Vec::new(),
        references: Vec::new(),
        errors: Vec::new(),
    };
    let mut i = 0;
    let blocks = state.collect_blocks(&events, &mut i, &|_| false);

    if state.errors.is_empty() {
        Ok(Body {
            blocks,
            anchors: state.anchors,
            references: state.references,
        })
    } else {
        Err(state.errors)
    }
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

struct ParseState<'a> {
    source: &'a str,
    file_id: usize,
    index: &'a LineIndex,
    allocator: AnchorAllocator,
    anchors: Vec<Anchor>,
    references: Vec<CrossReference>,
    errors: Vec<ParseError>,
}

impl<'a> ParseState<'a> {
    fn error(&self, message: impl Into<String>, span: Range<usize>) -> ParseError {
        let location = self.index.location(self.source, span.start);
        ParseError::error(message, span, self.file_id, location)
    }

    /// Collect blocks until a matching End tag (or the end of input).
    fn collect_blocks(
        &mut self,
        events: &Events<'_>,
        i: &mut usize,
        is_end: &dyn Fn(&TagEnd) -> bool,
    ) -> Vec<Block> {
        let mut blocks = Vec::new();

        while *i < events.len() {
            let (ref ev, ref range) = events[*i];

            match ev {
                Event::End(tag_end) if is_end(tag_end) => {
                    *i += 1;
                    break;
                }

                Event::Start(Tag::Heading { level, id, .. }) => {
                    let level = heading_level_to_u8(level);
                    let explicit = id.as_ref().map(|s| s.to_string());
                    *i += 1;
                    let content =
                        self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Heading(_)));
                    let anchor = self.heading_anchor(explicit, &content, range.clone());
                    blocks.push(Block::Heading {
                        level,
                        anchor,
                        content,
                    });
                }

                Event::Start(Tag::Paragraph) => {
                    *i += 1;
                    let inlines =
                        self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Paragraph));
                    blocks.push(Block::Paragraph(inlines));
                }

                Event::Start(Tag::CodeBlock(kind)) => {
                    let language = match kind {
                        CodeBlockKind::Fenced(lang) => {
                            if let Some(err) =
                                lint::check_fence(self.source, range.clone(), self.file_id, self.index)
                            {
                                self.errors.push(err);
                            }
                            let lang = lang.split_whitespace().next().unwrap_or("");
                            if lang.is_empty() { None } else { Some(lang.to_string()) }
                        }
                        CodeBlockKind::Indented => None,
                    };
                    *i += 1;
                    let literal =
                        collect_text_until(events, i, |e| matches!(e, TagEnd::CodeBlock));
                    blocks.push(Block::Code { language, literal });
                }

                Event::Start(Tag::List(start)) => {
                    let kind = match start {
                        Some(start) => ListKind::Ordered { start: *start },
                        None => ListKind::Unordered,
                    };
                    *i += 1;
                    let tight = !is_loose(events, *i);
                    let items = self.collect_list_items(events, i);
                    blocks.push(Block::List { kind, tight, items });
                }

                Event::Start(Tag::BlockQuote(kind)) => {
                    let kind = kind.as_ref().map(callout_kind);
                    *i += 1;
                    let inner =
                        self.collect_blocks(events, i, &|e| matches!(e, TagEnd::BlockQuote(_)));
                    blocks.push(match kind {
                        Some(kind) => Block::Callout {
                            kind,
                            blocks: inner,
                        },
                        None => Block::Quote(inner),
                    });
                }

                Event::Start(Tag::Table(alignments)) => {
                    let alignments = alignments
                        .iter()
                        .map(|a| match a {
                            pulldown_cmark::Alignment::None => ColumnAlignment::None,
                            pulldown_cmark::Alignment::Left => ColumnAlignment::Left,
                            pulldown_cmark::Alignment::Center => ColumnAlignment::Center,
                            pulldown_cmark::Alignment::Right => ColumnAlignment::Right,
                        })
                        .collect();
                    *i += 1;
                    let (header, rows) = self.collect_table(events, i);
                    blocks.push(Block::Table {
                        alignments,
                        header,
                        rows,
                    });
                }

                Event::Start(Tag::HtmlBlock) => {
                    *i += 1;
                    let raw = collect_text_until(events, i, |e| matches!(e, TagEnd::HtmlBlock));
                    blocks.push(Block::Html(raw));
                }

                Event::Rule => {
                    blocks.push(Block::Rule);
                    *i += 1;
                }

                // Tight list items carry inline content without a paragraph
                _ if is_inline_event(ev) => {
                    let mut inlines = Vec::new();
                    while *i < events.len() && is_inline_event(&events[*i].0) {
                        if let Some(inline) = self.collect_inline(events, i) {
                            push_inline(&mut inlines, inline);
                        }
                    }
                    blocks.push(Block::Paragraph(inlines));
                }

                _ => {
                    *i += 1;
                }
            }
        }

        blocks
    }

    /// Pick the anchor for a heading: the explicit id if valid, else a fresh slug.
    fn heading_anchor(
        &mut self,
        explicit: Option<String>,
        content: &[Inline],
        span: Range<usize>,
    ) -> Anchor {
        let anchor = match explicit {
            Some(id) if !anchor::is_valid_id(&id) => {
                let err = self
                    .error(format!("invalid anchor `{{#{}}}`", id), span)
                    .with_note("anchors must be non-empty and contain no whitespace or `#`");
                self.errors.push(err);
                return Anchor { id, explicit: true };
            }
            Some(id) => {
                if !self.allocator.claim_explicit(&id) {
                    let err = self
                        .error(format!("duplicate anchor `{}`", id), span)
                        .with_note("another heading in this file already uses this anchor");
                    self.errors.push(err);
                    return Anchor { id, explicit: true };
                }
                Anchor { id, explicit: true }
            }
            None => Anchor {
                id: self.allocator.allocate(&plain_text(content)),
                explicit: false,
            },
        };
        self.anchors.push(anchor.clone());
        anchor
    }

    fn collect_list_items(&mut self, events: &Events<'_>, i: &mut usize) -> Vec<Vec<Block>> {
        let mut items = Vec::new();

        while *i < events.len() {
            match &events[*i].0 {
                Event::End(TagEnd::List(_)) => {
                    *i += 1;
                    break;
                }
                Event::Start(Tag::Item) => {
                    *i += 1;
                    items.push(self.collect_blocks(events, i, &|e| matches!(e, TagEnd::Item)));
                }
                _ => {
                    *i += 1;
                }
            }
        }

        items
    }

    /// Inline nodes up to the `End` that closes the current container.
    fn collect_inlines(
        &mut self,
        events: &Events<'_>,
        i: &mut usize,
        is_end: &dyn Fn(&TagEnd) -> bool,
    ) -> Vec<Inline> {
        let mut inlines = Vec::new();

        while *i < events.len() {
            match &events[*i].0 {
                Event::End(tag_end) if is_end(tag_end) => {
                    *i += 1;
                    break;
                }
                _ => match self.collect_inline(events, i) {
                    Some(inline) => push_inline(&mut inlines, inline),
                    None => *i += 1,
                },
            }
        }

        inlines
    }

    /// Consume one inline event (and its children). Returns `None` without
    /// consuming anything if the event is not inline.
    fn collect_inline(&mut self, events: &Events<'_>, i: &mut usize) -> Option<Inline> {
        let (ref ev, ref range) = events[*i];
        let inline = match ev {
            Event::Text(s) => {
                *i += 1;
                Inline::Text(s.to_string())
            }
            Event::Code(s) => {
                *i += 1;
                Inline::Code(s.to_string())
            }
            Event::InlineHtml(s) => {
                *i += 1;
                Inline::Html(s.to_string())
            }
            Event::SoftBreak => {
                *i += 1;
                Inline::SoftBreak
            }
            Event::HardBreak => {
                *i += 1;
                Inline::HardBreak
            }
            Event::Start(Tag::Strong) => {
                *i += 1;
                Inline::Strong(self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Strong)))
            }
            Event::Start(Tag::Emphasis) => {
                *i += 1;
                Inline::Emphasis(self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Emphasis)))
            }
            Event::Start(Tag::Strikethrough) => {
                *i += 1;
                Inline::Strikethrough(
                    self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Strikethrough)),
                )
            }
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                ..
            }) => {
                let dest = dest_url.to_string();
                if *link_type != LinkType::Email {
                    if let Some(target) = RefTarget::classify(&dest) {
                        self.references.push(CrossReference {
                            token: dest.clone(),
                            target,
                            span: range.clone(),
                            location: self.index.location(self.source, range.start),
                        });
                    }
                }
                let title = title.to_string();
                *i += 1;
                let content = self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Link));
                Inline::Link {
                    dest,
                    title,
                    content,
                }
            }
            Event::Start(Tag::Image {
                dest_url, title, ..
            }) => {
                let dest = dest_url.to_string();
                let title = title.to_string();
                *i += 1;
                let alt = self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Image));
                Inline::Image { dest, title, alt }
            }
            _ => return None,
        };
        Some(inline)
    }

    /// Header cells, then body rows, each cell a run of inlines.
    fn collect_table(
        &mut self,
        events: &Events<'_>,
        i: &mut usize,
    ) -> (Vec<Vec<Inline>>, Vec<Vec<Vec<Inline>>>) {
        let mut header: Vec<Vec<Inline>> = Vec::new();
        let mut rows: Vec<Vec<Vec<Inline>>> = Vec::new();
        let mut in_head = false;
        let mut current_row: Vec<Vec<Inline>> = Vec::new();

        while *i < events.len() {
            match &events[*i].0 {
                Event::End(TagEnd::Table) => {
                    *i += 1;
                    break;
                }
                Event::Start(Tag::TableHead) => {
                    in_head = true;
                    *i += 1;
                }
                Event::End(TagEnd::TableHead) => {
                    in_head = false;
                    header = std::mem::take(&mut current_row);
                    *i += 1;
                }
                Event::Start(Tag::TableRow) => {
                    current_row = Vec::new();
                    *i += 1;
                }
                Event::End(TagEnd::TableRow) => {
                    if !in_head {
                        rows.push(std::mem::take(&mut current_row));
                    }
                    *i += 1;
                }
                Event::Start(Tag::TableCell) => {
                    *i += 1;
                    let cell = self.collect_inlines(events, i, &|e| matches!(e, TagEnd::TableCell));
                    current_row.push(cell);
                }
                _ => {
                    *i += 1;
                }
            }
        }

        (header, rows)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn heading_level_to_u8(level: &HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn callout_kind(kind: &BlockQuoteKind) -> CalloutKind {
    match kind {
        BlockQuoteKind::Note => CalloutKind::Note,
        BlockQuoteKind::Tip => CalloutKind::Tip,
        BlockQuoteKind::Important => CalloutKind::Important,
        BlockQuoteKind::Warning => CalloutKind::Warning,
        BlockQuoteKind::Caution => CalloutKind::Caution,
    }
}

fn is_inline_event(ev: &Event<'_>) -> bool {
    matches!(
        ev,
        Event::Text(_)
            | Event::Code(_)
            | Event::InlineHtml(_)
            | Event::SoftBreak
            | Event::HardBreak
            | Event::Start(
                Tag::Strong
                    | Tag::Emphasis
                    | Tag::Strikethrough
                    | Tag::Link { .. }
                    | Tag::Image { .. }
            )
    )
}

/// Whether the list whose items start at `i` is loose. pulldown-cmark only
/// wraps item text in paragraph tags for loose lists.
fn is_loose(events: &Events<'_>, mut i: usize) -> bool {
    let mut depth = 0usize;
    while i < events.len() {
        match &events[i].0 {
            Event::Start(Tag::Paragraph) if depth == 1 => return true,
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            _ => {}
        }
        i += 1;
    }
    false
}

/// Append an inline, merging adjacent text runs so the tree does not depend
/// on how the tokenizer happened to split text.
fn push_inline(inlines: &mut Vec<Inline>, inline: Inline) {
    if let Inline::Text(next) = &inline {
        if let Some(Inline::Text(prev)) = inlines.last_mut() {
            prev.push_str(next);
            return;
        }
    }
    inlines.push(inline);
}

/// Raw text up to the first `End` matching `is_end`.
fn collect_text_until(events: &Events<'_>, i: &mut usize, is_end: impl Fn(&TagEnd) -> bool) -> String {
    let mut text = String::new();
    while *i < events.len() {
        match &events[*i].0 {
            Event::End(tag_end) if is_end(tag_end) => {
                *i += 1;
                break;
            }
            Event::Text(s) | Event::Html(s) => {
                text.push_str(s);
                *i += 1;
            }
            _ => {
                *i += 1;
            }
        }
    }
    text
}
