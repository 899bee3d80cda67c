//! Writes a document tree back out as markup. Re-parsing the output yields
//! the same block structure.

use std::fmt::{self, Write};

use super::{Block, ColumnAlignment, Document, Inline, ListKind};

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fm = &self.front_matter;
        if fm.title.is_some() || fm.description.is_some() {
            writeln!(f, "---")?;
            if let Some(title) = &fm.title {
                writeln!(f, "title = {}", toml::Value::String(title.clone()))?;
            }
            if let Some(description) = &fm.description {
                writeln!(f, "description = {}", toml::Value::String(description.clone()))?;
            }
            writeln!(f, "---")?;
            writeln!(f)?;
        }
        f.write_str(&blocks_to_markup(&self.blocks))
    }
}

/// Blocks separated by blank lines.
fn blocks_to_markup(blocks: &[Block]) -> String {
    join_blocks(blocks, "\n")
}

/// Adjacent lists of the same kind alternate their markers, otherwise they
/// would be read back as a single list.
fn join_blocks(blocks: &[Block], separator: &str) -> String {
    let mut out = String::new();
    let mut alternate = false;
    let mut previous: Option<&Block> = None;
    for block in blocks {
        if previous.is_some() {
            out.push_str(separator);
        }
        match block {
            Block::List { kind, tight, items } => {
                let continues = matches!(
                    previous,
                    Some(Block::List { kind: prev, .. }) if same_list_kind(*prev, *kind)
                );
                alternate = continues && !alternate;
                write_list(&mut out, *kind, *tight, items, alternate);
            }
            other => {
                // Writing to a String cannot fail.
                let _ = write!(out, "{}", other);
            }
        }
        previous = Some(block);
    }
    out
}

fn same_list_kind(a: ListKind, b: ListKind) -> bool {
    matches!(
        (a, b),
        (ListKind::Unordered, ListKind::Unordered) | (ListKind::Ordered { .. }, ListKind::Ordered { .. })
    )
}

fn write_list(out: &mut String, kind: ListKind, tight: bool, items: &[Vec<Block>], alternate: bool) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 && !tight {
            out.push('\n');
        }
        let marker = match (kind, alternate) {
            (ListKind::Ordered { start }, false) => format!("{}. ", start + i as u64),
            (ListKind::Ordered { start }, true) => format!("{}) ", start + i as u64),
            (ListKind::Unordered, false) => "- ".to_string(),
            (ListKind::Unordered, true) => "* ".to_string(),
        };
        let indent = " ".repeat(marker.len());
        let body = join_blocks(item, if tight { "" } else { "\n" });
        prefix_lines(out, &body, &marker, &indent, "");
    }
}

/// Prefix every line of `body`. Blank lines get `blank` instead.
fn prefix_lines(out: &mut String, body: &str, first: &str, rest: &str, blank: &str) {
    for (i, line) in body.lines().enumerate() {
        if line.is_empty() {
            out.push_str(if i == 0 { first.trim_end() } else { blank });
        } else {
            out.push_str(if i == 0 { first } else { rest });
            out.push_str(line);
        }
        out.push('\n');
    }
    if body.is_empty() {
        out.push_str(first.trim_end());
        out.push('\n');
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Block::Heading {
                level,
                anchor,
                content,
            } => {
                let text = InlineWriter::new(Context::Inline)
                    .write(content)
                    .replace("\\\n", " ")
                    .replace('\n', " ");
                write!(f, "{} {}", "#".repeat(*level as usize), text)?;
                if anchor.explicit {
                    write!(f, " {{#{}}}", anchor.id)?;
                }
                writeln!(f)
            }
            Block::Paragraph(inlines) => {
                writeln!(f, "{}", InlineWriter::new(Context::Paragraph).write(inlines))
            }
            Block::Code { language, literal } => {
                let fence = "`".repeat(longest_run(literal, '`').max(2) + 1);
                writeln!(f, "{}{}", fence, language.as_deref().unwrap_or(""))?;
                f.write_str(literal)?;
                if !literal.is_empty() && !literal.ends_with('\n') {
                    writeln!(f)?;
                }
                writeln!(f, "{}", fence)
            }
            Block::Table {
                alignments,
                header,
                rows,
            } => {
                write_row(f, header)?;
                write!(f, "|")?;
                for align in alignments {
                    let marker = match align {
                        ColumnAlignment::None => " --- ",
                        ColumnAlignment::Left => " :-- ",
                        ColumnAlignment::Center => " :-: ",
                        ColumnAlignment::Right => " --: ",
                    };
                    write!(f, "{}|", marker)?;
                }
                writeln!(f)?;
                for row in rows {
                    write_row(f, row)?;
                }
                Ok(())
            }
            Block::List { kind, tight, items } => {
                let mut out = String::new();
                write_list(&mut out, *kind, *tight, items, false);
                f.write_str(&out)
            }
            Block::Quote(blocks) => {
                let mut out = String::new();
                prefix_lines(&mut out, &blocks_to_markup(blocks), "> ", "> ", ">");
                f.write_str(&out)
            }
            Block::Callout { kind, blocks } => {
                let mut out = format!("> [!{}]\n", kind.name().to_uppercase());
                let body = blocks_to_markup(blocks);
                if !body.is_empty() {
                    prefix_lines(&mut out, &body, "> ", "> ", ">");
                }
                f.write_str(&out)
            }
            Block::Html(raw) => {
                f.write_str(raw)?;
                if !raw.ends_with('\n') {
                    writeln!(f)?;
                }
                Ok(())
            }
            // `---` would be mistaken for front matter at the top of a file
            Block::Rule => writeln!(f, "***"),
        }
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, cells: &[Vec<Inline>]) -> fmt::Result {
    write!(f, "|")?;
    for cell in cells {
        write!(f, " {} |", InlineWriter::new(Context::TableCell).write(cell))?;
    }
    writeln!(f)
}

/// Where inline markup is being written.
#[derive(Clone, Copy, PartialEq)]
enum Context {
    /// Lines start a new block, so leading block markers need escaping.
    Paragraph,
    /// `|` splits cells, even inside code spans.
    TableCell,
    Inline,
}

struct InlineWriter {
    out: String,
    context: Context,
    line_start: bool,
}

impl InlineWriter {
    fn new(context: Context) -> Self {
        InlineWriter {
            out: String::new(),
            context,
            line_start: context == Context::Paragraph,
        }
    }

    fn write(mut self, inlines: &[Inline]) -> String {
        self.inlines(inlines);
        self.out
    }

    fn inlines(&mut self, inlines: &[Inline]) {
        for (i, inline) in inlines.iter().enumerate() {
            let before_link = matches!(inlines.get(i + 1), Some(Inline::Link { .. }));
            self.inline(inline, before_link);
        }
    }

    fn inline(&mut self, inline: &Inline, before_link: bool) {
        match inline {
            Inline::Text(s) if s.is_empty() => return,
            Inline::Text(s) => {
                let mut text = escape_text(s);
                if self.line_start {
                    text = escape_block_marker(text);
                }
                // `!` followed by a link would start an image
                if before_link && text.ends_with('!') {
                    text.insert(text.len() - 1, '\\');
                }
                self.out.push_str(&text);
            }
            Inline::Strong(children) => self.wrapped("**", children, "**"),
            Inline::Emphasis(children) => {
                let delim = if starts_or_ends_with_strong(children) { "_" } else { "*" };
                self.wrapped(delim, children, delim);
            }
            Inline::Strikethrough(children) => self.wrapped("~~", children, "~~"),
            Inline::Code(code) => {
                let ticks = "`".repeat(longest_run(code, '`') + 1);
                let pad = code.starts_with('`')
                    || code.ends_with('`')
                    || (code.starts_with(' ') && code.ends_with(' ') && !code.trim().is_empty());
                let space = if pad { " " } else { "" };
                let code = self.raw(code);
                let _ = write!(self.out, "{}{}{}{}{}", ticks, space, code, space, ticks);
            }
            Inline::Link {
                dest,
                title,
                content,
            } => {
                self.out.push('[');
                self.line_start = false;
                self.inlines(content);
                let target = self.raw(&format!("{}{}", link_dest(dest), link_title(title)));
                let _ = write!(self.out, "]({})", target);
            }
            Inline::Image { dest, title, alt } => {
                self.out.push_str("![");
                self.line_start = false;
                self.inlines(alt);
                let target = self.raw(&format!("{}{}", link_dest(dest), link_title(title)));
                let _ = write!(self.out, "]({})", target);
            }
            Inline::Html(raw) => {
                let raw = self.raw(raw);
                self.out.push_str(&raw);
            }
            Inline::SoftBreak => self.out.push('\n'),
            Inline::HardBreak => self.out.push_str("\\\n"),
        }
        self.line_start = matches!(inline, Inline::SoftBreak | Inline::HardBreak);
    }

    fn wrapped(&mut self, open: &str, children: &[Inline], close: &str) {
        self.out.push_str(open);
        self.line_start = false;
        self.inlines(children);
        self.out.push_str(close);
    }

    /// Text written without markup escapes. Inside a table cell a bare `|`
    /// still ends the cell.
    fn raw(&self, s: &str) -> String {
        if self.context == Context::TableCell {
            s.replace('|', "\\|")
        } else {
            s.to_string()
        }
    }
}

fn longest_run(s: &str, c: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for ch in s.chars() {
        if ch == c {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(
            c,
            '\\' | '`' | '*' | '_' | '[' | ']' | '<' | '>' | '~' | '|' | '#' | '{' | '&'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape text at the start of a line that would otherwise open a list item,
/// a thematic break or a setext underline. `text` is already escaped.
fn escape_block_marker(mut text: String) -> String {
    if text.starts_with(['-', '+', '=']) {
        text.insert(0, '\\');
        return text;
    }
    let digits = text.bytes().take_while(u8::is_ascii_digit).count();
    if (1..=9).contains(&digits) {
        let rest = &text[digits..];
        let delimited = rest.starts_with(['.', ')'])
            && rest[1..].chars().next().is_none_or(|c| c == ' ' || c == '\t');
        if delimited {
            text.insert(digits, '\\');
        }
    }
    text
}

fn starts_or_ends_with_strong(children: &[Inline]) -> bool {
    matches!(children.first(), Some(Inline::Strong(_)))
        || matches!(children.last(), Some(Inline::Strong(_)))
}

fn link_dest(dest: &str) -> String {
    if dest.is_empty() || dest.chars().any(|c| c.is_whitespace() || c == '(' || c == ')') {
        format!("<{}>", dest)
    } else {
        dest.to_string()
    }
}

fn link_title(title: &str) -> String {
    if title.is_empty() {
        String::new()
    } else {
        format!(" \"{}\"", title.replace('"', "\\\""))
    }
}

impl fmt::Display for Inline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&InlineWriter::new(Context::Inline).write(std::slice::from_ref(self)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::Anchor;
    use crate::document::CalloutKind;

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_string())
    }

    #[test]
    fn heading_with_explicit_anchor() {
        let block = Block::Heading {
            level: 2,
            anchor: Anchor {
                id: "setup".into(),
                explicit: true,
            },
            content: vec![text("Set up")],
        };
        assert_eq!(block.to_string(), "## Set up {#setup}\n");
    }

    #[test]
    fn code_fence_outgrows_content() {
        let block = Block::Code {
            language: Some("md".into()),
            literal: "```rust\nfn main() {}\n```\n".into(),
        };
        assert_eq!(
            block.to_string(),
            "````md\n```rust\nfn main() {}\n```\n````\n"
        );
    }

    #[test]
    fn nested_list_is_indented() {
        let block = Block::List {
            kind: ListKind::Ordered { start: 9 },
            tight: true,
            items: vec![
                vec![Block::Paragraph(vec![text("nine")])],
                vec![
                    Block::Paragraph(vec![text("ten")]),
                    Block::List {
                        kind: ListKind::Unordered,
                        tight: true,
                        items: vec![vec![Block::Paragraph(vec![text("inner")])]],
                    },
                ],
            ],
        };
        assert_eq!(block.to_string(), "9. nine\n10. ten\n    - inner\n");
    }

    #[test]
    fn loose_list_items_are_separated() {
        let block = Block::List {
            kind: ListKind::Unordered,
            tight: false,
            items: vec![
                vec![Block::Paragraph(vec![text("a")])],
                vec![Block::Paragraph(vec![text("b")]), Block::Rule],
            ],
        };
        assert_eq!(block.to_string(), "- a\n\n- b\n\n  ***\n");
    }

    #[test]
    fn adjacent_lists_alternate_markers() {
        let list = |kind| Block::List {
            kind,
            tight: true,
            items: vec![vec![Block::Paragraph(vec![text("x")])]],
        };
        let blocks = vec![
            list(ListKind::Unordered),
            list(ListKind::Unordered),
            list(ListKind::Ordered { start: 2 }),
            list(ListKind::Ordered { start: 2 }),
        ];
        assert_eq!(blocks_to_markup(&blocks), "- x\n\n* x\n\n2. x\n\n2) x\n");
    }

    #[test]
    fn block_markers_at_line_start_are_escaped() {
        let paragraph = |s: &str| Block::Paragraph(vec![text(s)]).to_string();
        assert_eq!(paragraph("- not a list"), "\\- not a list\n");
        assert_eq!(paragraph("+ plus"), "\\+ plus\n");
        assert_eq!(paragraph("==="), "\\===\n");
        assert_eq!(paragraph("2024. was a year"), "2024\\. was a year\n");
        assert_eq!(paragraph("1)"), "1\\)\n");
        assert_eq!(paragraph("3.14 is pi"), "3.14 is pi\n");
        assert_eq!(paragraph("a - b"), "a - b\n");

        let after_break = Block::Paragraph(vec![text("first"), Inline::SoftBreak, text("- second")]);
        assert_eq!(after_break.to_string(), "first\n\\- second\n");

        let nested = Block::Paragraph(vec![Inline::Emphasis(vec![
            text("a"),
            Inline::SoftBreak,
            text("1. b"),
        ])]);
        assert_eq!(nested.to_string(), "*a\n1\\. b*\n");
    }

    #[test]
    fn bang_before_link_is_escaped() {
        let block = Block::Paragraph(vec![
            text("wow!"),
            Inline::Link {
                dest: "a.md".into(),
                title: String::new(),
                content: vec![text("x")],
            },
        ]);
        assert_eq!(block.to_string(), "wow\\![x](a.md)\n");
    }

    #[test]
    fn pipes_in_table_cells_are_escaped() {
        let block = Block::Table {
            alignments: vec![ColumnAlignment::None, ColumnAlignment::None],
            header: vec![vec![text("a")], vec![text("b")]],
            rows: vec![vec![vec![Inline::Code("a|b".into())], vec![text("x|y")]]],
        };
        assert_eq!(
            block.to_string(),
            "| a | b |\n| --- | --- |\n| `a\\|b` | x\\|y |\n"
        );
    }

    #[test]
    fn callout_is_quoted() {
        let block = Block::Callout {
            kind: CalloutKind::Warning,
            blocks: vec![
                Block::Paragraph(vec![text("one")]),
                Block::Paragraph(vec![text("two")]),
            ],
        };
        assert_eq!(block.to_string(), "> [!WARNING]\n> one\n>\n> two\n");
    }

    #[test]
    fn text_is_escaped() {
        assert_eq!(text("a*b_c [d]").to_string(), "a\\*b\\_c \\[d\\]");
        assert_eq!(Inline::Code("a`b".into()).to_string(), "``a`b``");
        assert_eq!(Inline::Code("`x".into()).to_string(), "`` `x ``");
    }

    #[test]
    fn emphasis_around_strong_switches_delimiter() {
        let inline = Inline::Emphasis(vec![Inline::Strong(vec![text("x")])]);
        assert_eq!(inline.to_string(), "_**x**_");
    }
}
