use std::ops::Range;

use serde::Deserialize;

/// Metadata declared in a `---` delimited TOML header at the top of a file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrontMatter {
    /// Page title. Falls back to the first level-1 heading.
    #[serde(default)]
    pub title: Option<String>,

    /// Emitted as `<meta name="description">`.
    #[serde(default)]
    pub description: Option<String>,
}

/// The raw header located by [`split`], before deserialization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrontMatter<'a> {
    pub toml: &'a str,
    /// Byte span of `toml` in the original source.
    pub span: Range<usize>,
    /// Offset of the first byte after the closing delimiter line.
    pub body_offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrontMatterError {
    pub message: String,
    pub span: Range<usize>,
}

/// Locate a front matter header. Returns `Ok(None)` when the source does not
/// open with a `---` line.
pub fn split(source: &str) -> Result<Option<RawFrontMatter<'_>>, FrontMatterError> {
    let bom = if source.starts_with('\u{feff}') { 3 } else { 0 };
    let Some(after) = source[bom..].strip_prefix("---") else {
        return Ok(None);
    };
    let Some(after_open) = after
        .strip_prefix('\n')
        .or_else(|| after.strip_prefix("\r\n"))
    else {
        return Ok(None);
    };

    let toml_start = source.len() - after_open.len();
    let mut offset = toml_start;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end_matches(['\n', '\r']) == "---" {
            return Ok(Some(RawFrontMatter {
                toml: &source[toml_start..offset],
                span: toml_start..offset,
                body_offset: offset + line.len(),
            }));
        }
        offset += line.len();
    }

    Err(FrontMatterError {
        message: "front matter is missing its closing `---` line".into(),
        span: bom..bom + 3,
    })
}

impl FrontMatter {
    /// Deserialize a located header. Error spans point into the original source.
    pub fn from_raw(raw: &RawFrontMatter<'_>) -> Result<Self, FrontMatterError> {
        toml::from_str(raw.toml).map_err(|e| {
            let span = e
                .span()
                .map(|s| raw.span.start + s.start..raw.span.start + s.end)
                .unwrap_or_else(|| raw.span.clone());
            FrontMatterError {
                message: format!("invalid front matter: {}", e.message()),
                span,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_header() {
        assert_eq!(split("# Title\n").unwrap(), None);
        assert_eq!(split("----\nx\n").unwrap(), None);
    }

    #[test]
    fn header_is_located() {
        let src = "---\ntitle = \"FAQ\"\n---\n# Body\n";
        let raw = split(src).unwrap().unwrap();
        assert_eq!(raw.toml, "title = \"FAQ\"\n");
        assert_eq!(&src[raw.body_offset..], "# Body\n");
        let fm = FrontMatter::from_raw(&raw).unwrap();
        assert_eq!(fm.title.as_deref(), Some("FAQ"));
        assert_eq!(fm.description, None);
    }

    #[test]
    fn crlf_and_bom() {
        let src = "\u{feff}---\r\ndescription = \"d\"\r\n---\r\nbody";
        let raw = split(src).unwrap().unwrap();
        assert_eq!(&src[raw.body_offset..], "body");
        let fm = FrontMatter::from_raw(&raw).unwrap();
        assert_eq!(fm.description.as_deref(), Some("d"));
    }

    #[test]
    fn unclosed_header() {
        let err = split("---\ntitle = \"x\"\n# Heading\n").unwrap_err();
        assert!(err.message.contains("closing"));
        assert_eq!(err.span, 0..3);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let src = "---\nlayout = \"wide\"\n---\n";
        let raw = split(src).unwrap().unwrap();
        let err = FrontMatter::from_raw(&raw).unwrap_err();
        assert!(err.message.starts_with("invalid front matter"));
        assert!(err.span.start >= raw.span.start && err.span.end <= raw.span.end);
    }
}
