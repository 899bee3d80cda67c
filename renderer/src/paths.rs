use relative_path::{Component, RelativePath, RelativePathBuf};

pub const OUTPUT_EXTENSION: &str = "html";

/// Where a source document is written: `guide/intro.md` -> `guide/intro.html`.
pub fn output_path(source: &RelativePath) -> RelativePathBuf {
    source.with_extension(OUTPUT_EXTENSION)
}

/// Resolve a reference path written in document `from`.
///
/// A leading `/` is relative to the source root, anything else to the
/// directory of `from`. Returns `None` when the path climbs out of the root.
pub fn join_reference(from: &RelativePath, path: &str) -> Option<RelativePathBuf> {
    let (rooted, rest) = match path.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, path),
    };

    let mut parts: Vec<&str> = Vec::new();
    if !rooted {
        if let Some(parent) = from.parent() {
            parts.extend(parent.components().filter_map(normal));
        }
    }
    for component in RelativePath::new(rest).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::Normal(name) => parts.push(name),
        }
    }

    if parts.is_empty() {
        return None;
    }
    Some(RelativePathBuf::from(parts.join("/")))
}

/// A link from page `from` to page `to`, both relative to the output root.
pub fn relative_href(from: &RelativePath, to: &RelativePath) -> String {
    let from_dir: Vec<&str> = from
        .parent()
        .map(|p| p.components().filter_map(normal).collect())
        .unwrap_or_default();
    let to_parts: Vec<&str> = to.components().filter_map(normal).collect();

    let common = from_dir
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count()
        .min(to_parts.len().saturating_sub(1));

    let mut out: Vec<&str> = vec![".."; from_dir.len() - common];
    out.extend(&to_parts[common..]);
    out.join("/")
}

fn normal(component: Component<'_>) -> Option<&str> {
    match component {
        Component::Normal(name) => Some(name),
        _ => None,
    }
}
