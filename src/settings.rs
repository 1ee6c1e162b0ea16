use std::collections::HashMap;
use std::path::{Path, PathBuf};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use crate::catalog::{DEFAULT_CATALOG, DEFAULT_CATALOG_BRANCH};
use crate::error::{Error, Result};
use crate::manifest::PackageOptions;
use crate::paths::Paths;
use crate::util::expand_home;

/// The contents of a single `config.toml`.
///
/// Every field is optional; absent fields fall through to the next file in
/// the search order, then to the built-in defaults.
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct SettingsFile {
    /// Log verbosity: `off`, `error`, `warn`, `info`, `debug` or `trace`.
    pub log_level: Option<String>,
    /// Where link scripts are written.
    pub link_dir: Option<String>,
    /// Location of the package catalog.
    pub catalog: Option<String>,
    /// Branch of the package catalog to track.
    pub catalog_branch: Option<String>,
    /// Package name to pinned version.
    #[serde(rename = "use")]
    pub pins: HashMap<String, String>,
    /// Per-package option overrides.
    #[serde(rename = "package")]
    pub packages: HashMap<String, PackageSettings>,
}

/// A `[package.<name>]` block of a settings file.
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct PackageSettings {
    /// Version pin, used when `use.<name>` is not set.
    pub version: Option<String>,
    /// Replaces the computed platform string for this package.
    pub platform: Option<String>,
    /// Options merged over the catalog manifest with highest precedence.
    #[serde(flatten)]
    pub options: PackageOptions,
}

impl SettingsFile {
    /// Loads a settings file. A missing file yields `Ok(None)`; an unreadable
    /// or malformed one is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<SettingsFile>> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file: SettingsFile = toml::from_str(&content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if let Some(level) = &file.log_level {
            parse_level(level).map_err(|message| Error::Config {
                path: path.to_path_buf(),
                message,
            })?;
        }
        Ok(Some(file))
    }

    /// Folds a lower-precedence file into this one. Values already set here
    /// are kept; map entries are added only for keys not yet present.
    pub fn merge_from(&mut self, lower: SettingsFile) {
        self.log_level = self.log_level.take().or(lower.log_level);
        self.link_dir = self.link_dir.take().or(lower.link_dir);
        self.catalog = self.catalog.take().or(lower.catalog);
        self.catalog_branch = self.catalog_branch.take().or(lower.catalog_branch);
        for (name, version) in lower.pins {
            self.pins.entry(name).or_insert(version);
        }
        for (name, package) in lower.packages {
            self.packages.entry(name).or_insert(package);
        }
    }
}

/// The effective settings for one invocation, merged from every config file.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub log_level: LevelFilter,
    pub link_dir: PathBuf,
    pub catalog: String,
    pub catalog_branch: String,
    pub pins: HashMap<String, String>,
    pub packages: HashMap<String, PackageSettings>,
    /// Files the settings were merged from, highest precedence first.
    pub sources: Vec<PathBuf>,
}

impl Settings {
    /// Reads the project, git-root and home settings files, in that order,
    /// and merges them. Missing files are skipped.
    pub fn load(paths: &Paths) -> Result<Settings> {
        let mut files = Vec::new();
        let mut sources = Vec::new();
        for path in paths.config_files() {
            if sources.contains(&path) {
                continue;
            }
            if let Some(file) = SettingsFile::load(&path)? {
                files.push(file);
                sources.push(path);
            }
        }
        let mut settings = Settings::from_files(files, paths)?;
        settings.sources = sources;
        Ok(settings)
    }

    /// Merges already-parsed settings files, highest precedence first.
    pub fn from_files(files: Vec<SettingsFile>, paths: &Paths) -> Result<Settings> {
        let mut merged = SettingsFile::default();
        for file in files {
            merged.merge_from(file);
        }

        let log_level = match &merged.log_level {
            Some(level) => parse_level(level).map_err(|message| Error::Config {
                path: paths.config_dir.clone(),
                message,
            })?,
            None => LevelFilter::Info,
        };
        let link_dir = match &merged.link_dir {
            Some(dir) => expand_home(dir, &paths.home_dir),
            None => default_link_dir()?,
        };

        Ok(Settings {
            log_level,
            link_dir,
            catalog: merged.catalog.unwrap_or_else(|| DEFAULT_CATALOG.to_string()),
            catalog_branch: merged
                .catalog_branch
                .unwrap_or_else(|| DEFAULT_CATALOG_BRANCH.to_string()),
            pins: merged.pins,
            packages: merged.packages,
            sources: Vec::new(),
        })
    }

    /// The version pinned for `name`: `use.<name>`, else `package.<name>.version`.
    pub fn pinned_version(&self, name: &str) -> Option<&str> {
        self.pins
            .get(name)
            .or_else(|| self.packages.get(name).and_then(|p| p.version.as_ref()))
            .map(String::as_str)
    }

    /// The `[package.<name>]` block, if any file declared one.
    pub fn package(&self, name: &str) -> Option<&PackageSettings> {
        self.packages.get(name)
    }
}

fn parse_level(level: &str) -> std::result::Result<LevelFilter, String> {
    level
        .parse::<LevelFilter>()
        .map_err(|_| format!("unknown log level \"{level}\""))
}

/// The directory containing the running executable.
fn default_link_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    Ok(exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}
