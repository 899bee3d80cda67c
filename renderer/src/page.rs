use std::fmt::{self, Display};

use folio::document::plain_text;
use relative_path::RelativePathBuf;

use crate::html::{Body, Escape};
use crate::paths::{output_path, relative_href};
use crate::resolve::ResolvedDocument;

/// Settings shared by every page of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOptions {
    /// Appended to each page title, e.g. `Install - Project docs`.
    pub site_title: Option<String>,
    /// Source-root-relative path of a stylesheet to link.
    pub stylesheet: Option<RelativePathBuf>,
    /// Emit a table of contents from level 2 and 3 headings.
    pub toc: bool,
}

impl Default for PageOptions {
    fn default() -> Self {
        PageOptions {
            site_title: None,
            stylesheet: None,
            toc: true,
        }
    }
}

/// A complete HTML5 page for one document.
pub struct Page<'a, 'd> {
    resolved: &'a ResolvedDocument<'d>,
    options: &'a PageOptions,
}

impl<'a, 'd> Page<'a, 'd> {
    pub fn new(resolved: &'a ResolvedDocument<'d>, options: &'a PageOptions) -> Self {
        Page { resolved, options }
    }
}

pub fn render_page(resolved: &ResolvedDocument<'_>, options: &PageOptions) -> String {
    Page::new(resolved, options).to_string()
}

impl Display for Page<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let document = self.resolved.document;

        writeln!(f, "<!DOCTYPE html>")?;
        writeln!(f, "<html lang=\"en\">")?;
        writeln!(f, "<head>")?;
        writeln!(f, "<meta charset=\"utf-8\" />")?;
        writeln!(
            f,
            "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />"
        )?;
        match &self.options.site_title {
            Some(site) => writeln!(
                f,
                "<title>{} - {}</title>",
                Escape(&document.title),
                Escape(site)
            )?,
            None => writeln!(f, "<title>{}</title>", Escape(&document.title))?,
        }
        if let Some(description) = &document.front_matter.description {
            writeln!(
                f,
                "<meta name=\"description\" content=\"{}\" />",
                Escape(description)
            )?;
        }
        if let Some(stylesheet) = &self.options.stylesheet {
            let href = relative_href(&output_path(&document.path), stylesheet);
            writeln!(f, "<link rel=\"stylesheet\" href=\"{}\" />", Escape(&href))?;
        }
        writeln!(f, "</head>")?;
        writeln!(f, "<body>")?;
        if self.options.toc {
            self.toc(f)?;
        }
        writeln!(f, "<main>")?;
        write!(f, "{}", Body::new(self.resolved))?;
        writeln!(f, "</main>")?;
        writeln!(f, "</body>")?;
        writeln!(f, "</html>")
    }
}

impl Page<'_, '_> {
    /// Level 3 headings nest under the preceding level 2 heading.
    fn toc(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headings: Vec<_> = self
            .resolved
            .document
            .headings()
            .into_iter()
            .filter(|(level, ..)| matches!(level, 2 | 3))
            .collect();
        if headings.is_empty() {
            return Ok(());
        }

        writeln!(f, "<nav class=\"toc\">")?;
        writeln!(f, "<ul>")?;
        let mut open_section = false;
        let mut open_sublist = false;
        for (level, anchor, content) in headings {
            let link = format!(
                "<a href=\"#{}\">{}</a>",
                Escape(&anchor.id),
                Escape(&plain_text(content))
            );
            if level == 2 {
                if open_sublist {
                    writeln!(f, "</ul>")?;
                    open_sublist = false;
                }
                if open_section {
                    writeln!(f, "</li>")?;
                }
                write!(f, "<li>{}", link)?;
                open_section = true;
            } else {
                if open_section && !open_sublist {
                    writeln!(f)?;
                    writeln!(f, "<ul>")?;
                    open_sublist = true;
                }
                writeln!(f, "<li>{}</li>", link)?;
            }
        }
        if open_sublist {
            writeln!(f, "</ul>")?;
        }
        if open_section {
            writeln!(f, "</li>")?;
        }
        writeln!(f, "</ul>")?;
        writeln!(f, "</nav>")
    }
}
