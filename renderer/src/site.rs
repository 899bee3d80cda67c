//! The build pipeline: discover, parse, resolve, render, write.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use codespan_reporting::files::SimpleFiles;
use folio::{Document, ParseError, Parser};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use relative_path::RelativePathBuf;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::anchors::AnchorIndex;
use crate::error::BuildError;
use crate::page::{PageOptions, render_page};
use crate::paths::output_path;
use crate::resolve::resolve;

/// Site configuration file, read by the CLI and never copied to the output.
pub const CONFIG_FILE_NAME: &str = "folio.toml";

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Worker threads; 0 means one per CPU.
    pub jobs: usize,
    pub copy_assets: bool,
    /// Remove the output directory before writing.
    pub clean: bool,
    pub page: PageOptions,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            jobs: 0,
            copy_assets: true,
            clean: false,
            page: PageOptions::default(),
        }
    }
}

/// A markup file loaded from the source tree.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: RelativePathBuf,
    pub file_id: usize,
    pub text: String,
}

/// A document that did not parse. The rest of the site is still rendered.
#[derive(Debug, Clone)]
pub struct ParseFailure {
    pub path: RelativePathBuf,
    pub errors: Vec<ParseError>,
}

#[derive(Debug)]
pub struct Parsed {
    pub documents: Vec<Document>,
    pub failures: Vec<ParseFailure>,
}

#[derive(Debug)]
pub struct CheckReport {
    pub documents: usize,
    pub references: usize,
    pub parse_failures: Vec<ParseFailure>,
}

impl CheckReport {
    pub fn is_success(&self) -> bool {
        self.parse_failures.is_empty()
    }
}

/// Rendered pages keyed by output path.
#[derive(Debug)]
pub struct Rendered {
    pub pages: BTreeMap<RelativePathBuf, String>,
    pub parse_failures: Vec<ParseFailure>,
}

#[derive(Debug)]
pub struct BuildReport {
    pub pages_written: usize,
    pub assets_copied: usize,
    pub parse_failures: Vec<ParseFailure>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.parse_failures.is_empty()
    }
}

/// A documentation source tree held in memory.
pub struct Site {
    root: PathBuf,
    files: SimpleFiles<String, String>,
    sources: Vec<SourceFile>,
    assets: Vec<RelativePathBuf>,
}

impl Site {
    /// Scan `root` for markup files and assets. Hidden entries, the config
    /// file and `exclude` (typically the output directory) are skipped.
    pub fn load(root: &Path, exclude: Option<&Path>) -> Result<Site, BuildError> {
        if !root.is_dir() {
            return Err(BuildError::NotADirectory(root.to_path_buf()));
        }
        let exclude = exclude.and_then(|p| p.canonicalize().ok());

        let mut site = Site {
            root: root.to_path_buf(),
            files: SimpleFiles::new(),
            sources: Vec::new(),
            assets: Vec::new(),
        };

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !(is_hidden(e) || is_excluded(e, exclude.as_deref())));
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| BuildError::InvalidPath(entry.path().to_path_buf()))?;
            let path = RelativePathBuf::from_path(relative)
                .map_err(|_| BuildError::InvalidPath(entry.path().to_path_buf()))?;

            if path.as_str() == CONFIG_FILE_NAME {
                continue;
            }
            if path.extension() == Some(folio::SOURCE_EXTENSION) {
                let text = fs::read_to_string(entry.path())
                    .map_err(|e| BuildError::io(entry.path(), e))?;
                site.add_source(path, text);
            } else {
                site.assets.push(path);
            }
        }

        site.sources.sort_by(|a, b| a.path.cmp(&b.path));
        site.assets.sort();
        info!(
            root = %root.display(),
            documents = site.sources.len(),
            assets = site.assets.len(),
            "scanned source tree"
        );
        Ok(site)
    }

    /// A site built from in-memory sources, with no assets.
    pub fn from_sources<P, S>(sources: impl IntoIterator<Item = (P, S)>) -> Site
    where
        P: Into<RelativePathBuf>,
        S: Into<String>,
    {
        let mut site = Site {
            root: PathBuf::new(),
            files: SimpleFiles::new(),
            sources: Vec::new(),
            assets: Vec::new(),
        };
        for (path, text) in sources {
            site.add_source(path.into(), text.into());
        }
        site.sources.sort_by(|a, b| a.path.cmp(&b.path));
        site
    }

    fn add_source(&mut self, path: RelativePathBuf, text: String) {
        let file_id = self.files.add(path.to_string(), text.clone());
        self.sources.push(SourceFile {
            path,
            file_id,
            text,
        });
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Source text for diagnostics, indexed by file id.
    pub fn files(&self) -> &SimpleFiles<String, String> {
        &self.files
    }

    pub fn sources(&self) -> &[SourceFile] {
        &self.sources
    }

    pub fn assets(&self) -> &[RelativePathBuf] {
        &self.assets
    }

    /// Parse every source on `pool`. Results come back in path order
    /// whatever order the workers finish in.
    pub fn parse(&self, pool: &ThreadPool) -> Parsed {
        let results: Vec<Result<Document, Vec<ParseError>>> = pool.install(|| {
            self.sources
                .par_iter()
                .map(|source| {
                    debug!(path = %source.path, "parsing");
                    Parser::new(source.path.clone(), &source.text, source.file_id).parse()
                })
                .collect()
        });

        let mut documents = Vec::new();
        let mut failures = Vec::new();
        for (source, result) in self.sources.iter().zip(results) {
            match result {
                Ok(document) => documents.push(document),
                Err(errors) => {
                    warn!(path = %source.path, errors = errors.len(), "document failed to parse");
                    failures.push(ParseFailure {
                        path: source.path.clone(),
                        errors,
                    });
                }
            }
        }
        Parsed {
            documents,
            failures,
        }
    }

    /// Parse and resolve without rendering anything.
    pub fn check(&self, jobs: usize) -> Result<CheckReport, BuildError> {
        let pool = thread_pool(jobs)?;
        let parsed = self.parse(&pool);
        let index = AnchorIndex::build(&parsed.documents, parsed.failures.iter().map(|f| &f.path));
        let references = match resolve(&parsed.documents, &index) {
            Ok(resolved) => resolved.iter().map(|r| r.links.len()).sum(),
            Err(references) => {
                return Err(BuildError::Unresolved {
                    references,
                    parse_failures: parsed.failures,
                });
            }
        };
        info!(
            documents = parsed.documents.len(),
            references,
            failed = parsed.failures.len(),
            "check finished"
        );
        Ok(CheckReport {
            documents: parsed.documents.len(),
            references,
            parse_failures: parsed.failures,
        })
    }

    /// Render every page that parsed. Fails without output if any
    /// cross-reference is unresolved.
    pub fn render(&self, options: &BuildOptions) -> Result<Rendered, BuildError> {
        let pool = thread_pool(options.jobs)?;
        let parsed = self.parse(&pool);
        let index = AnchorIndex::build(&parsed.documents, parsed.failures.iter().map(|f| &f.path));
        debug!(documents = index.len(), "anchor index built");

        let resolved = match resolve(&parsed.documents, &index) {
            Ok(resolved) => resolved,
            Err(references) => {
                return Err(BuildError::Unresolved {
                    references,
                    parse_failures: parsed.failures,
                });
            }
        };

        let pages: BTreeMap<RelativePathBuf, String> = pool.install(|| {
            resolved
                .par_iter()
                .map(|doc| {
                    debug!(path = %doc.document.path, "rendering");
                    (output_path(&doc.document.path), render_page(doc, &options.page))
                })
                .collect()
        });

        Ok(Rendered {
            pages,
            parse_failures: parsed.failures,
        })
    }

    /// Render the site into `output`. Nothing is written when the site does
    /// not resolve.
    pub fn build(&self, output: &Path, options: &BuildOptions) -> Result<BuildReport, BuildError> {
        if let Some(stylesheet) = &options.page.stylesheet {
            if !self.assets.contains(stylesheet) {
                warn!(stylesheet = %stylesheet, "stylesheet is not in the source tree");
            }
        }

        if options.copy_assets {
            self.check_collisions()?;
        }

        let rendered = self.render(options)?;

        if options.clean && output.exists() {
            self.clean(output)?;
        }
        fs::create_dir_all(output).map_err(|e| BuildError::io(output, e))?;

        for (path, html) in &rendered.pages {
            write_file(&path.to_path(output), html.as_bytes())?;
        }

        let mut assets_copied = 0;
        if options.copy_assets {
            for asset in &self.assets {
                copy_file(&asset.to_path(&self.root), &asset.to_path(output))?;
                assets_copied += 1;
            }
        }

        info!(
            pages = rendered.pages.len(),
            assets = assets_copied,
            failed = rendered.parse_failures.len(),
            output = %output.display(),
            "build finished"
        );
        Ok(BuildReport {
            pages_written: rendered.pages.len(),
            assets_copied,
            parse_failures: rendered.parse_failures,
        })
    }

    /// Fail if an asset would be copied over a rendered page.
    fn check_collisions(&self) -> Result<(), BuildError> {
        let pages: BTreeMap<RelativePathBuf, &RelativePathBuf> = self
            .sources
            .iter()
            .map(|source| (output_path(&source.path), &source.path))
            .collect();
        match self
            .assets
            .iter()
            .find_map(|asset| pages.get(asset).map(|source| (asset, *source)))
        {
            Some((asset, source)) => Err(BuildError::OutputCollision {
                asset: asset.clone(),
                source_path: source.clone(),
            }),
            None => Ok(()),
        }
    }

    fn clean(&self, output: &Path) -> Result<(), BuildError> {
        let output_abs = output.canonicalize().map_err(|e| BuildError::io(output, e))?;
        let root_abs = self.root.canonicalize().map_err(|e| BuildError::io(&self.root, e))?;
        if root_abs.starts_with(&output_abs) {
            return Err(BuildError::UnsafeClean(output.to_path_buf()));
        }
        debug!(output = %output.display(), "removing previous output");
        fs::remove_dir_all(output).map_err(|e| BuildError::io(output, e))
    }
}

fn thread_pool(jobs: usize) -> Result<ThreadPool, BuildError> {
    Ok(ThreadPoolBuilder::new().num_threads(jobs).build()?)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

fn is_excluded(entry: &DirEntry, exclude: Option<&Path>) -> bool {
    let Some(exclude) = exclude else {
        return false;
    };
    entry.file_type().is_dir()
        && entry
            .path()
            .canonicalize()
            .is_ok_and(|path| path == exclude)
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| BuildError::io(path, e))
}

fn copy_file(from: &Path, to: &Path) -> Result<(), BuildError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    fs::copy(from, to).map_err(|e| BuildError::io(from, e))?;
    Ok(())
}
