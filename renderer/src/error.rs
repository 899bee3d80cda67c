use std::path::PathBuf;

use relative_path::RelativePathBuf;
use thiserror::Error;

use crate::resolve::UnresolvedReference;
use crate::site::ParseFailure;

/// Errors that stop a build.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("source root `{}` is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk the source tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("`{}` is not valid UTF-8 and cannot be used as a site path", .0.display())]
    InvalidPath(PathBuf),

    #[error("asset `{asset}` would overwrite the page rendered from `{source_path}`")]
    OutputCollision {
        asset: RelativePathBuf,
        source_path: RelativePathBuf,
    },

    #[error("refusing to clean `{}`: it contains the source root", .0.display())]
    UnsafeClean(PathBuf),

    #[error("failed to start worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Broken cross-references. Parse failures found in the same run are
    /// carried along so they can be reported together.
    #[error("{} unresolved reference(s)", .references.len())]
    Unresolved {
        references: Vec<UnresolvedReference>,
        parse_failures: Vec<ParseFailure>,
    },
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }
}
