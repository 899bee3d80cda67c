//! HTML for a document body.

use std::fmt::{self, Display, Write};

use folio::document::{Block, CalloutKind, ColumnAlignment, Inline, ListKind, plain_text};

use crate::resolve::ResolvedDocument;

/// Escapes `& < > " '` when displayed. Safe in text and attribute values.
pub struct Escape<'a>(pub &'a str);

impl Display for Escape<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rest = self.0;
        while let Some(pos) = rest.find(['&', '<', '>', '"', '\'']) {
            f.write_str(&rest[..pos])?;
            f.write_str(match rest.as_bytes()[pos] {
                b'&' => "&amp;",
                b'<' => "&lt;",
                b'>' => "&gt;",
                b'"' => "&quot;",
                _ => "&#39;",
            })?;
            rest = &rest[pos + 1..];
        }
        f.write_str(rest)
    }
}

/// The rendered body of a resolved document, without the page shell.
pub struct Body<'a, 'd> {
    resolved: &'a ResolvedDocument<'d>,
}

impl<'a, 'd> Body<'a, 'd> {
    pub fn new(resolved: &'a ResolvedDocument<'d>) -> Self {
        Body { resolved }
    }
}

impl Display for Body<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.blocks(f, &self.resolved.document.blocks)
    }
}

impl Body<'_, '_> {
    fn blocks(&self, f: &mut fmt::Formatter<'_>, blocks: &[Block]) -> fmt::Result {
        for block in blocks {
            self.block(f, block)?;
        }
        Ok(())
    }

    fn block(&self, f: &mut fmt::Formatter<'_>, block: &Block) -> fmt::Result {
        match block {
            Block::Heading {
                level,
                anchor,
                content,
            } => {
                write!(f, "<h{} id=\"{}\">", level, Escape(&anchor.id))?;
                self.inlines(f, content)?;
                writeln!(f, "</h{}>", level)
            }
            Block::Paragraph(content) => {
                f.write_str("<p>")?;
                self.inlines(f, content)?;
                writeln!(f, "</p>")
            }
            Block::Code { language, literal } => {
                f.write_str("<pre><code")?;
                if let Some(language) = language {
                    write!(f, " class=\"language-{}\"", Escape(language))?;
                }
                writeln!(f, ">{}</code></pre>", Escape(literal))
            }
            Block::Table {
                alignments,
                header,
                rows,
            } => {
                writeln!(f, "<table>\n<thead>")?;
                self.table_row(f, "th", alignments, header)?;
                writeln!(f, "</thead>")?;
                if !rows.is_empty() {
                    writeln!(f, "<tbody>")?;
                    for row in rows {
                        self.table_row(f, "td", alignments, row)?;
                    }
                    writeln!(f, "</tbody>")?;
                }
                writeln!(f, "</table>")
            }
            Block::List { kind, tight, items } => {
                let tag = match kind {
                    ListKind::Ordered { start: 1 } => {
                        writeln!(f, "<ol>")?;
                        "ol"
                    }
                    ListKind::Ordered { start } => {
                        writeln!(f, "<ol start=\"{}\">", start)?;
                        "ol"
                    }
                    ListKind::Unordered => {
                        writeln!(f, "<ul>")?;
                        "ul"
                    }
                };
                for item in items {
                    self.list_item(f, item, *tight)?;
                }
                writeln!(f, "</{}>", tag)
            }
            Block::Quote(blocks) => {
                writeln!(f, "<blockquote>")?;
                self.blocks(f, blocks)?;
                writeln!(f, "</blockquote>")
            }
            Block::Callout { kind, blocks } => self.callout(f, *kind, blocks),
            Block::Html(raw) => {
                f.write_str(raw)?;
                if !raw.ends_with('\n') {
                    f.write_char('\n')?;
                }
                Ok(())
            }
            Block::Rule => writeln!(f, "<hr />"),
        }
    }

    /// Paragraphs in a tight list are written without `<p>`.
    fn list_item(&self, f: &mut fmt::Formatter<'_>, item: &[Block], tight: bool) -> fmt::Result {
        f.write_str("<li>")?;
        if !tight {
            f.write_char('\n')?;
            self.blocks(f, item)?;
            return writeln!(f, "</li>");
        }
        let mut after_text = true;
        for block in item {
            match block {
                Block::Paragraph(content) => {
                    self.inlines(f, content)?;
                    after_text = true;
                }
                other => {
                    if after_text {
                        f.write_char('\n')?;
                    }
                    self.block(f, other)?;
                    after_text = false;
                }
            }
        }
        writeln!(f, "</li>")
    }

    fn callout(&self, f: &mut fmt::Formatter<'_>, kind: CalloutKind, blocks: &[Block]) -> fmt::Result {
        writeln!(f, "<div class=\"callout callout-{}\">", kind.name())?;
        writeln!(f, "<p class=\"callout-title\">{}</p>", kind.title())?;
        self.blocks(f, blocks)?;
        writeln!(f, "</div>")
    }

    fn table_row(
        &self,
        f: &mut fmt::Formatter<'_>,
        cell: &str,
        alignments: &[ColumnAlignment],
        cells: &[Vec<Inline>],
    ) -> fmt::Result {
        writeln!(f, "<tr>")?;
        for (i, content) in cells.iter().enumerate() {
            write!(f, "<{}", cell)?;
            let align = match alignments.get(i) {
                Some(ColumnAlignment::Left) => Some("left"),
                Some(ColumnAlignment::Center) => Some("center"),
                Some(ColumnAlignment::Right) => Some("right"),
                Some(ColumnAlignment::None) | None => None,
            };
            if let Some(align) = align {
                write!(f, " style=\"text-align: {}\"", align)?;
            }
            f.write_char('>')?;
            self.inlines(f, content)?;
            writeln!(f, "</{}>", cell)?;
        }
        writeln!(f, "</tr>")
    }

    fn inlines(&self, f: &mut fmt::Formatter<'_>, inlines: &[Inline]) -> fmt::Result {
        for inline in inlines {
            self.inline(f, inline)?;
        }
        Ok(())
    }

    fn inline(&self, f: &mut fmt::Formatter<'_>, inline: &Inline) -> fmt::Result {
        match inline {
            Inline::Text(text) => write!(f, "{}", Escape(text)),
            Inline::Strong(children) => self.wrapped(f, "strong", children),
            Inline::Emphasis(children) => self.wrapped(f, "em", children),
            Inline::Strikethrough(children) => self.wrapped(f, "del", children),
            Inline::Code(code) => write!(f, "<code>{}</code>", Escape(code)),
            Inline::Link {
                dest,
                title,
                content,
            } => {
                write!(f, "<a href=\"{}\"", Escape(self.resolved.href(dest)))?;
                if !title.is_empty() {
                    write!(f, " title=\"{}\"", Escape(title))?;
                }
                f.write_char('>')?;
                self.inlines(f, content)?;
                f.write_str("</a>")
            }
            Inline::Image { dest, title, alt } => {
                write!(
                    f,
                    "<img src=\"{}\" alt=\"{}\"",
                    Escape(dest),
                    Escape(&plain_text(alt))
                )?;
                if !title.is_empty() {
                    write!(f, " title=\"{}\"", Escape(title))?;
                }
                f.write_str(" />")
            }
            Inline::Html(raw) => f.write_str(raw),
            Inline::SoftBreak => f.write_char('\n'),
            Inline::HardBreak => f.write_str("<br />\n"),
        }
    }

    fn wrapped(&self, f: &mut fmt::Formatter<'_>, tag: &str, children: &[Inline]) -> fmt::Result {
        write!(f, "<{}>", tag)?;
        self.inlines(f, children)?;
        write!(f, "</{}>", tag)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn render(src: &str) -> String {
        render_with_links(src, BTreeMap::new())
    }

    fn render_with_links(src: &str, links: BTreeMap<String, String>) -> String {
        let document = folio::parse_str("page.md", src).unwrap();
        let resolved = ResolvedDocument {
            document: &document,
            links,
        };
        Body::new(&resolved).to_string()
    }

    #[test]
    fn escapes_text_and_attributes() {
        assert_eq!(Escape("a<b> & \"c\" 'd'").to_string(), "a&lt;b&gt; &amp; &quot;c&quot; &#39;d&#39;");
        assert_eq!(render("1 < 2 & 3\n"), "<p>1 &lt; 2 &amp; 3</p>\n");
    }

    #[test]
    fn headings_carry_their_anchor() {
        assert_eq!(
            render("## Getting *started* {#start}\n"),
            "<h2 id=\"start\">Getting <em>started</em></h2>\n"
        );
    }

    #[test]
    fn code_blocks() {
        assert_eq!(
            render("```rust\nif a < b {}\n```\n"),
            "<pre><code class=\"language-rust\">if a &lt; b {}\n</code></pre>\n"
        );
        assert_eq!(render("```\nplain\n```\n"), "<pre><code>plain\n</code></pre>\n");
    }

    #[test]
    fn lists() {
        assert_eq!(render("- a\n- b\n"), "<ul>\n<li>a</li>\n<li>b</li>\n</ul>\n");
        assert_eq!(
            render("3. c\n4. d\n"),
            "<ol start=\"3\">\n<li>c</li>\n<li>d</li>\n</ol>\n"
        );
        assert_eq!(
            render("- a\n  - b\n"),
            "<ul>\n<li>a\n<ul>\n<li>b</li>\n</ul>\n</li>\n</ul>\n"
        );
        assert_eq!(
            render("1. one\n\n   more\n"),
            "<ol>\n<li>\n<p>one</p>\n<p>more</p>\n</li>\n</ol>\n"
        );
        assert_eq!(
            render("- a\n\n- b\n"),
            "<ul>\n<li>\n<p>a</p>\n</li>\n<li>\n<p>b</p>\n</li>\n</ul>\n"
        );
        assert_eq!(
            render("- a\n  > q\n"),
            "<ul>\n<li>a\n<blockquote>\n<p>q</p>\n</blockquote>\n</li>\n</ul>\n"
        );
    }

    #[test]
    fn callouts() {
        assert_eq!(
            render("> [!TIP]\n> Use `--jobs`.\n"),
            "<div class=\"callout callout-tip\">\n<p class=\"callout-title\">Tip</p>\n<p>Use <code>--jobs</code>.</p>\n</div>\n"
        );
    }

    #[test]
    fn tables() {
        let html = render("| a | b |\n|:-:|--:|\n| 1 | 2 |\n");
        assert_eq!(
            html,
            "<table>\n<thead>\n<tr>\n<th style=\"text-align: center\">a</th>\n<th style=\"text-align: right\">b</th>\n</tr>\n</thead>\n<tbody>\n<tr>\n<td style=\"text-align: center\">1</td>\n<td style=\"text-align: right\">2</td>\n</tr>\n</tbody>\n</table>\n"
        );
    }

    #[test]
    fn links_use_resolved_hrefs() {
        let links = BTreeMap::from([("faq.md#why".to_string(), "faq.html#why".to_string())]);
        assert_eq!(
            render_with_links("[why](faq.md#why \"Why?\") [ext](https://x.org)\n", links),
            "<p><a href=\"faq.html#why\" title=\"Why?\">why</a> <a href=\"https://x.org\">ext</a></p>\n"
        );
    }

    #[test]
    fn inline_elements() {
        assert_eq!(
            render("**b** ~~s~~ ![logo *x*](img/l.png)  \nnext\n"),
            "<p><strong>b</strong> <del>s</del> <img src=\"img/l.png\" alt=\"logo x\" /><br />\nnext</p>\n"
        );
        assert_eq!(render("***\n"), "<hr />\n");
    }
}
