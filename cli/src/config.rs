use std::path::{Path, PathBuf};

use relative_path::{Component, RelativePathBuf};
use renderer::site::CONFIG_FILE_NAME;
use renderer::{BuildOptions, PageOptions};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config `{}`: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config `{}`: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("stylesheet `{0}` must be a relative path inside the source root")]
    Stylesheet(String),
}

/// Contents of `folio.toml`.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub build: BuildConfig,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    pub title: Option<String>,
    /// Relative to the source root.
    pub stylesheet: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    pub toc: bool,
    pub copy_assets: bool,
    pub jobs: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            toc: true,
            copy_assets: true,
            jobs: 0,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        tracing::debug!(path = %path.display(), "loading config");
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `explicit` if given, else `folio.toml` in the source root if it
    /// exists, else the defaults.
    pub fn discover(source_root: &Path, explicit: Option<&Path>) -> Result<Config, ConfigError> {
        if let Some(path) = explicit {
            return Config::load(path);
        }
        let path = source_root.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Config::load(&path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn build_options(&self) -> Result<BuildOptions, ConfigError> {
        let stylesheet = match &self.site.stylesheet {
            Some(raw) => Some(stylesheet_path(raw)?),
            None => None,
        };
        Ok(BuildOptions {
            jobs: self.build.jobs,
            copy_assets: self.build.copy_assets,
            clean: false,
            page: PageOptions {
                site_title: self.site.title.clone(),
                stylesheet,
                toc: self.build.toc,
            },
        })
    }
}

fn stylesheet_path(raw: &str) -> Result<RelativePathBuf, ConfigError> {
    let path = RelativePathBuf::from(raw);
    let escapes = path
        .components()
        .any(|c| matches!(c, Component::ParentDir));
    if raw.is_empty() || raw.starts_with('/') || raw.contains('\\') || escapes {
        return Err(ConfigError::Stylesheet(raw.to_string()));
    }
    Ok(path.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::discover(dir.path(), None).unwrap();
        assert_eq!(config, Config::default());

        let options = config.build_options().unwrap();
        assert_eq!(options.jobs, 0);
        assert!(options.copy_assets);
        assert!(options.page.toc);
        assert_eq!(options.page.site_title, None);
    }

    #[test]
    fn reads_the_source_root_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[site]\ntitle = \"Docs\"\nstylesheet = \"./css/site.css\"\n\n[build]\ntoc = false\njobs = 2\n",
        )
        .unwrap();

        let options = Config::discover(dir.path(), None)
            .unwrap()
            .build_options()
            .unwrap();
        assert_eq!(options.jobs, 2);
        assert!(options.copy_assets);
        assert!(!options.page.toc);
        assert_eq!(options.page.site_title.as_deref(), Some("Docs"));
        assert_eq!(
            options.page.stylesheet.as_ref().map(|p| p.as_str()),
            Some("css/site.css")
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[build]\nthreads = 4\n").unwrap();

        let err = Config::discover(dir.path(), Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "{:?}", err);
        assert!(err.to_string().contains("custom.toml"));
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::discover(dir.path(), Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn stylesheet_must_stay_inside_the_root() {
        for bad in ["../style.css", "/etc/style.css", "", "a/../b.css"] {
            assert!(stylesheet_path(bad).is_err(), "{} accepted", bad);
        }
        assert_eq!(stylesheet_path("style.css").unwrap().as_str(), "style.css");
    }
}
