use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use folio::frontmatter;
use folio::{Document, Parser};
use renderer::{BuildError, BuildOptions, Site};
use serde::Deserialize;
use walkdir::WalkDir;

const FIXTURE_SUFFIX: &str = ".test.md";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixtureConfig {
    /// Human-readable fixture description.
    #[serde(default)]
    pub description: Option<String>,

    /// If true, the document must fail to parse.
    #[serde(default)]
    pub expect_parse_error: bool,

    /// Substring of the first error, whether from parsing or resolving.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// Exact anchor ids, in document order.
    #[serde(default)]
    pub expect_anchors: Option<Vec<String>>,

    /// Substrings that must appear in the rendered page.
    #[serde(default)]
    pub expect_html: Vec<String>,

    /// Substrings that must not appear in the rendered page.
    #[serde(default)]
    pub expect_no_html: Vec<String>,
}

/// Split a fixture into its TOML config and the document under test.
fn parse_fixture(content: &str) -> Result<(FixtureConfig, &str), String> {
    let raw = frontmatter::split(content)
        .map_err(|e| e.message)?
        .ok_or("missing opening --- frontmatter delimiter")?;
    let config: FixtureConfig =
        toml::from_str(raw.toml).map_err(|e| format!("TOML parse error: {}", e))?;
    Ok((config, &content[raw.body_offset..]))
}

/// `guide/links.test.md` is parsed as a document named `links.md`.
fn document_name(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("fixture.test.md");
    let stem = name.strip_suffix(FIXTURE_SUFFIX).unwrap_or(name);
    format!("{}.{}", stem, folio::SOURCE_EXTENSION)
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

fn run_single_test(path: &Path) -> TestResult {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("cannot read file: {}", e)),
            };
        }
    };

    let (config, source) = match parse_fixture(&content) {
        Ok(pair) => pair,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("frontmatter error: {}", e)),
            };
        }
    };

    let outcome = match check_fixture(&document_name(path), source, &config) {
        Some(reason) => TestOutcome::Fail(reason),
        None => TestOutcome::Pass,
    };
    TestResult {
        path: path.to_path_buf(),
        description: config.description,
        outcome,
    }
}

/// Returns `Some(reason)` when the document does not meet the expectations.
fn check_fixture(name: &str, source: &str, config: &FixtureConfig) -> Option<String> {
    let parsed = Parser::new(name, source, 0).parse();

    if config.expect_parse_error {
        return match parsed {
            Ok(_) => Some("expected parse error, but parsing succeeded".into()),
            Err(errors) => check_error_text(config, &errors[0].to_string()),
        };
    }

    let document = match parsed {
        Ok(document) => document,
        Err(errors) => {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            return Some(format!("unexpected parse error: {}", msgs.join("; ")));
        }
    };

    if let Some(reason) = check_anchors(&document, config) {
        return Some(reason);
    }

    let options = BuildOptions {
        jobs: 1,
        ..BuildOptions::default()
    };
    let rendered = Site::from_sources([(name, source)]).render(&options);
    let html = match (rendered, &config.expect_error) {
        (Ok(_), Some(expected)) => {
            return Some(format!(
                "expected error containing \"{}\", but the page rendered",
                expected
            ));
        }
        (Ok(mut rendered), None) => rendered.pages.pop_first().map(|(_, html)| html)?,
        (Err(err), Some(_)) => return check_error_text(config, &first_error(&err)),
        (Err(err), None) => return Some(format!("unexpected error: {}", first_error(&err))),
    };

    for expected in &config.expect_html {
        if !html.contains(expected.as_str()) {
            return Some(format!(
                "rendered page does not contain \"{}\"\n  page:\n{}",
                expected,
                indent(&html)
            ));
        }
    }
    for unwanted in &config.expect_no_html {
        if html.contains(unwanted.as_str()) {
            return Some(format!("rendered page contains \"{}\"", unwanted));
        }
    }
    None
}

fn check_error_text(config: &FixtureConfig, actual: &str) -> Option<String> {
    match &config.expect_error {
        Some(expected) if !actual.contains(expected.as_str()) => Some(format!(
            "expected error containing \"{}\", got: {}",
            expected, actual
        )),
        _ => None,
    }
}

fn first_error(err: &BuildError) -> String {
    match err {
        BuildError::Unresolved { references, .. } => references
            .first()
            .map(|r| r.to_string())
            .unwrap_or_else(|| err.to_string()),
        other => other.to_string(),
    }
}

fn check_anchors(document: &Document, config: &FixtureConfig) -> Option<String> {
    let expected = config.expect_anchors.as_ref()?;
    let actual: Vec<&str> = document.anchors.iter().map(|a| a.id.as_str()).collect();
    if actual == *expected {
        None
    } else {
        Some(format!(
            "anchor mismatch\n  expected: {:?}\n  actual:   {:?}",
            expected, actual
        ))
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|l| format!("    {}", l))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Discover fixture files grouped by category (subfolder relative to root).
/// Fixtures sitting directly in `root` are uncategorized (`""`). The walk is
/// sorted the same way site discovery is.
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable fixture path");
                continue;
            }
        };
        let is_fixture = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(FIXTURE_SUFFIX));
        if !entry.file_type().is_file() || !is_fixture {
            continue;
        }
        let category = entry
            .path()
            .parent()
            .and_then(|p| p.strip_prefix(root).ok())
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        categories
            .entry(category)
            .or_default()
            .push(entry.into_path());
    }
    categories
}

/// List available categories for the given fixture path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        let label = if cat.is_empty() { "(root)" } else { cat.as_str() };
        eprintln!("  {} ({} tests)", label, files.len());
    }
}

fn pass_label(no_color: bool) -> &'static str {
    if no_color { "PASS" } else { "\x1b[32mPASS\x1b[0m" }
}

fn fail_label(no_color: bool) -> &'static str {
    if no_color { "FAIL" } else { "\x1b[31mFAIL\x1b[0m" }
}

fn ok_label(no_color: bool) -> &'static str {
    if no_color { "ok" } else { "\x1b[32mok\x1b[0m" }
}

fn failed_label(no_color: bool) -> &'static str {
    if no_color { "FAILED" } else { "\x1b[31mFAILED\x1b[0m" }
}

fn bold(s: &str, no_color: bool) -> String {
    if no_color {
        s.to_string()
    } else {
        format!("\x1b[1m{}\x1b[0m", s)
    }
}

fn label_for(result: &TestResult) -> &str {
    result.description.as_deref().unwrap_or_else(|| {
        result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_suffix(FIXTURE_SUFFIX))
            .unwrap_or("?")
    })
}

/// Run every fixture under `path` (or a single file).
/// If `categories` is non-empty, only fixtures in those categories run.
/// Exit code is 0 when every selected fixture passes, 1 otherwise.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let selected: Vec<(String, Vec<PathBuf>)> = if path.is_file() {
        vec![(String::new(), vec![path.to_path_buf()])]
    } else {
        let all_categories = discover_categorized(path);
        if all_categories.is_empty() {
            eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
            return 1;
        }
        let selected = select_categories(&all_categories, categories);
        if selected.is_empty() {
            eprintln!("no matching categories found");
            return 1;
        }
        selected
    };
    let single = path.is_file();

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &selected {
        if !single {
            let header = if cat.is_empty() { "(root)" } else { cat.as_str() };
            eprintln!();
            eprintln!("{}", bold(header, no_color));
        }

        for file in files {
            let result = run_single_test(file);
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", pass_label(no_color), label_for(&result));
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", fail_label(no_color), label_for(&result));
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    let failed = failures.len();
    if failed == 0 {
        eprintln!("test result: {}. {} passed, 0 failed", ok_label(no_color), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            failed_label(no_color),
            passed,
            failed,
            passed + failed
        );
        1
    }
}

/// Requested categories also select their subcategories.
fn select_categories(
    all: &BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> Vec<(String, Vec<PathBuf>)> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    }

    let mut filtered: BTreeMap<&str, &Vec<PathBuf>> = BTreeMap::new();
    for requested in requested {
        let req = requested.trim_matches('/');
        let mut found = false;
        for (cat, files) in all {
            if cat == req || cat.starts_with(&format!("{}/", req)) {
                filtered.insert(cat.as_str(), files);
                found = true;
            }
        }
        if !found {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                all.keys()
                    .map(|k| if k.is_empty() { "(root)" } else { k.as_str() })
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    filtered
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(dir: &Path, rel: &str, contents: &str) -> PathBuf {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn outcome(contents: &str) -> Option<String> {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path(), "case.test.md", contents);
        match run_single_test(&path).outcome {
            TestOutcome::Pass => None,
            TestOutcome::Fail(reason) => Some(reason),
        }
    }

    #[test]
    fn passing_expectations() {
        let src = "---\nexpect_anchors = [\"intro\", \"setup\"]\nexpect_html = ['<h2 id=\"setup\">']\nexpect_no_html = [\"<script\"]\n---\n# Intro\n\n## Setup\n";
        assert_eq!(outcome(src), None);
    }

    #[test]
    fn document_front_matter_follows_the_fixture_header() {
        let src = "---\nexpect_html = [\"<title>Real title</title>\"]\n---\n---\ntitle = \"Real title\"\n---\n\nBody\n";
        assert_eq!(outcome(src), None);
    }

    #[test]
    fn parse_error_expectations() {
        let src = "---\nexpect_parse_error = true\nexpect_error = \"unterminated code fence opened on line 3\"\n---\n# T\n\n```\nopen\n";
        assert_eq!(outcome(src), None);

        let reason = outcome("---\nexpect_parse_error = true\n---\n# Fine\n").unwrap();
        assert!(reason.contains("parsing succeeded"));
    }

    #[test]
    fn unresolved_reference_expectations() {
        let src = "---\nexpect_error = \"has no anchor `missing`\"\n---\n# Page\n\n[x](#missing)\n";
        assert_eq!(outcome(src), None);

        let reason = outcome("---\n---\n[x](other.md)\n").unwrap();
        assert!(reason.starts_with("unexpected error: unresolved reference `other.md`"), "{}", reason);
    }

    #[test]
    fn failing_expectations_explain_themselves() {
        let reason = outcome("---\nexpect_anchors = [\"a\"]\n---\n# B\n").unwrap();
        assert!(reason.contains("anchor mismatch"));

        let reason = outcome("---\nexpect_no_html = [\"<h1\"]\n---\n# B\n").unwrap();
        assert!(reason.contains("rendered page contains"));

        let reason = outcome("---\nunknown = 1\n---\n# B\n").unwrap();
        assert!(reason.starts_with("frontmatter error"));
    }

    #[test]
    fn categories_follow_directories() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path(), "top.test.md", "---\n---\n# a\n");
        fixture(dir.path(), "links/b.test.md", "---\n---\n# b\n");
        fixture(dir.path(), "links/a.test.md", "---\n---\n# a\n");
        fixture(dir.path(), "links/deep/c.test.md", "---\n---\n# c\n");
        fixture(dir.path(), "links/notes.md", "# not a fixture\n");

        let all = discover_categorized(dir.path());
        let names: Vec<&str> = all.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["", "links", "links/deep"]);

        let links: Vec<&str> = all["links"]
            .iter()
            .filter_map(|p| p.file_name()?.to_str())
            .collect();
        assert_eq!(links, vec!["a.test.md", "b.test.md"]);

        let selected = select_categories(&all, &["links".to_string()]);
        assert_eq!(selected.len(), 2);
        assert_eq!(run_tests(dir.path(), true, &[]), 0);
    }

    #[test]
    fn fixture_names_become_document_names() {
        assert_eq!(document_name(Path::new("x/links.test.md")), "links.md");
    }
}
