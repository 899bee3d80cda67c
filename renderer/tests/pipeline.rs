use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use renderer::resolve::UnresolvedReason;
use renderer::{BuildError, BuildOptions, PageOptions, Site};

fn write(root: &Path, path: &str, contents: &str) {
    let path = root.join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Every file under `root`, keyed by its slash-separated relative path.
fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry.unwrap();
        if entry.file_type().is_file() {
            let rel = entry.path().strip_prefix(root).unwrap();
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(key, fs::read(entry.path()).unwrap());
        }
    }
    files
}

fn sample_site(root: &Path) {
    write(
        root,
        "index.md",
        "---\ntitle = \"Home\"\n---\n\n# Welcome\n\nSee the [FAQ](faq.md#why) and the [guide](guide/intro.md).\n",
    );
    write(root, "faq.md", "# FAQ\n\n## Why?\n\nBecause.\n\n## How? {#how}\n\n[Back](index.md)\n");
    write(
        root,
        "guide/intro.md",
        "# Intro\n\n## Setup\n\nRead [how](../faq.md#how) or go [home](/index.md#welcome).\n\n![logo](../img/logo.png)\n",
    );
    for i in 0..12 {
        write(
            root,
            &format!("ref/page{:02}.md", i),
            &format!("# Page {}\n\n## Section\n\n[next](page{:02}.md#section)\n", i, (i + 1) % 12),
        );
    }
    write(root, "img/logo.png", "\u{89}PNG fake");
    write(root, "style.css", "body { margin: 0 }\n");
    write(root, "folio.toml", "[site]\ntitle = \"Docs\"\n");
    write(root, ".git/config", "hidden\n");
    write(root, ".draft.md", "# Draft\n\n[broken](nowhere.md)\n");
}

fn build(src: &Path, out: &Path, options: &BuildOptions) -> renderer::BuildReport {
    let site = Site::load(src, Some(out)).expect("load failed");
    site.build(out, options).expect("build failed")
}

#[test]
fn builds_a_mirrored_tree() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    sample_site(src.path());

    let report = build(src.path(), out.path(), &BuildOptions::default());
    assert!(report.is_success());
    assert_eq!(report.pages_written, 15);
    assert_eq!(report.assets_copied, 2);

    let files = snapshot(out.path());
    assert!(files.contains_key("index.html"));
    assert!(files.contains_key("guide/intro.html"));
    assert!(files.contains_key("ref/page07.html"));
    assert_eq!(files["img/logo.png"], "\u{89}PNG fake".as_bytes());
    assert!(files.contains_key("style.css"));
    assert!(!files.contains_key("folio.toml"));
    assert!(!files.keys().any(|k| k.starts_with('.') || k.contains("draft")));

    let intro = String::from_utf8(files["guide/intro.html"].clone()).unwrap();
    assert!(intro.contains("<a href=\"../faq.html#how\">how</a>"));
    assert!(intro.contains("<a href=\"../index.html#welcome\">home</a>"));
    assert!(intro.contains("<img src=\"../img/logo.png\" alt=\"logo\" />"));

    let index = String::from_utf8(files["index.html"].clone()).unwrap();
    assert!(index.contains("<title>Home</title>"));
    assert!(index.contains("<a href=\"faq.html#why\">FAQ</a>"));
}

#[test]
fn rendering_is_deterministic() {
    let src = tempfile::tempdir().unwrap();
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    sample_site(src.path());

    build(src.path(), first.path(), &BuildOptions::default());
    build(src.path(), second.path(), &BuildOptions::default());
    assert_eq!(snapshot(first.path()), snapshot(second.path()));
}

#[test]
fn parallel_and_sequential_builds_match() {
    let src = tempfile::tempdir().unwrap();
    let sequential = tempfile::tempdir().unwrap();
    let parallel = tempfile::tempdir().unwrap();
    sample_site(src.path());

    let one = BuildOptions {
        jobs: 1,
        ..BuildOptions::default()
    };
    let many = BuildOptions {
        jobs: 4,
        ..BuildOptions::default()
    };
    build(src.path(), sequential.path(), &one);
    build(src.path(), parallel.path(), &many);
    assert_eq!(snapshot(sequential.path()), snapshot(parallel.path()));
}

#[test]
fn missing_anchor_fails_the_build_and_writes_nothing() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write(src.path(), "index.md", "# Home\n\n[faq](faq.md)\n");
    write(src.path(), "faq.md", "# FAQ\n\nSee [install](index.md#install).\n");

    let site = Site::load(src.path(), None).unwrap();
    let err = site.build(out.path(), &BuildOptions::default()).unwrap_err();
    let BuildError::Unresolved { references, .. } = err else {
        panic!("expected unresolved references, got {:?}", err);
    };
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].token, "index.md#install");
    assert_eq!(references[0].document.as_str(), "faq.md");
    assert_eq!(references[0].location.line, 3);
    assert_eq!(
        references[0].reason,
        UnresolvedReason::MissingAnchor {
            document: "index.md".into(),
            anchor: "install".into(),
        }
    );
    assert!(references[0].to_string().contains("faq.md:3:5"));

    assert!(snapshot(out.path()).is_empty());
}

#[test]
fn unresolved_errors_are_identical_across_runs() {
    let src = tempfile::tempdir().unwrap();
    write(src.path(), "a.md", "[x](missing.md) [y](#nope)\n");
    write(src.path(), "b/c.md", "[z](../../up.md)\n");

    let messages = |jobs| {
        let site = Site::load(src.path(), None).unwrap();
        match site.check(jobs) {
            Err(BuildError::Unresolved { references, .. }) => {
                references.iter().map(|r| r.to_string()).collect::<Vec<_>>()
            }
            other => panic!("expected unresolved references, got {:?}", other.map(|r| r.documents)),
        }
    };
    let first = messages(1);
    assert_eq!(first.len(), 3);
    assert_eq!(first, messages(4));
}

#[test]
fn parse_failures_are_isolated() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write(src.path(), "good.md", "# Good\n\n[broken page](broken.md#anything)\n");
    write(src.path(), "broken.md", "# Broken\n\n```rust\nfn main() {}\n");

    let report = build(src.path(), out.path(), &BuildOptions::default());
    assert!(!report.is_success());
    assert_eq!(report.parse_failures.len(), 1);
    assert_eq!(report.parse_failures[0].path.as_str(), "broken.md");
    assert_eq!(
        report.parse_failures[0].errors[0].message,
        "unterminated code fence opened on line 3"
    );

    let files = snapshot(out.path());
    assert_eq!(files.keys().collect::<Vec<_>>(), vec!["good.html"]);
    let good = String::from_utf8(files["good.html"].clone()).unwrap();
    assert!(good.contains("href=\"broken.html#anything\""));
}

#[test]
fn options_shape_the_output() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    sample_site(src.path());

    let options = BuildOptions {
        copy_assets: false,
        page: PageOptions {
            site_title: Some("Docs".into()),
            stylesheet: Some("style.css".into()),
            toc: false,
        },
        ..BuildOptions::default()
    };
    let report = build(src.path(), out.path(), &options);
    assert_eq!(report.assets_copied, 0);

    let files = snapshot(out.path());
    assert!(!files.contains_key("style.css"));
    let faq = String::from_utf8(files["faq.html"].clone()).unwrap();
    assert!(faq.contains("<title>FAQ - Docs</title>"));
    assert!(faq.contains("<link rel=\"stylesheet\" href=\"style.css\" />"));
    assert!(!faq.contains("<nav"));
    let intro = String::from_utf8(files["guide/intro.html"].clone()).unwrap();
    assert!(intro.contains("<link rel=\"stylesheet\" href=\"../style.css\" />"));
}

#[test]
fn output_inside_source_is_skipped_and_cleaned() {
    let src = tempfile::tempdir().unwrap();
    write(src.path(), "index.md", "# Home\n");
    let out = src.path().join("site");

    build(src.path(), &out, &BuildOptions::default());
    write(&out, "stale.html", "old\n");

    let options = BuildOptions {
        clean: true,
        ..BuildOptions::default()
    };
    let report = build(src.path(), &out, &options);
    assert_eq!(report.pages_written, 1);
    assert_eq!(report.assets_copied, 0);
    assert_eq!(snapshot(&out).keys().collect::<Vec<_>>(), vec!["index.html"]);
}

#[test]
fn cleaning_the_source_root_is_refused() {
    let src = tempfile::tempdir().unwrap();
    write(src.path(), "index.md", "# Home\n");

    let site = Site::load(src.path(), None).unwrap();
    let options = BuildOptions {
        clean: true,
        ..BuildOptions::default()
    };
    let err = site.build(src.path(), &options).unwrap_err();
    assert!(matches!(err, BuildError::UnsafeClean(_)), "{:?}", err);
    assert!(src.path().join("index.md").exists());
}

#[test]
fn source_root_must_be_a_directory() {
    let src = tempfile::tempdir().unwrap();
    write(src.path(), "file.md", "# x\n");
    let err = Site::load(&src.path().join("file.md"), None).err().unwrap();
    assert!(matches!(err, BuildError::NotADirectory(_)));
}

#[test]
fn asset_shadowing_a_page_fails_the_build() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write(src.path(), "faq.md", "# FAQ\n");
    write(src.path(), "faq.html", "stale hand-written page\n");

    let site = Site::load(src.path(), Some(out.path())).unwrap();
    let err = site.build(out.path(), &BuildOptions::default()).unwrap_err();
    match &err {
        BuildError::OutputCollision { asset, source_path } => {
            assert_eq!(asset.as_str(), "faq.html");
            assert_eq!(source_path.as_str(), "faq.md");
        }
        other => panic!("expected an output collision, got {:?}", other),
    }
    assert_eq!(
        err.to_string(),
        "asset `faq.html` would overwrite the page rendered from `faq.md`"
    );
    assert!(snapshot(out.path()).is_empty());

    // Without asset copying there is nothing to collide with.
    let options = BuildOptions {
        copy_assets: false,
        ..BuildOptions::default()
    };
    site.build(out.path(), &options).unwrap();
    let html = fs::read_to_string(out.path().join("faq.html")).unwrap();
    assert!(html.contains("<h1 id=\"faq\">FAQ</h1>"));
}
