use std::path::{Path, PathBuf};
use directories::BaseDirs;
use crate::error::{Error, Result};

/// Name of the per-project and per-user configuration directory.
pub const CONFIG_DIR_NAME: &str = ".tether";
/// Name of the settings file inside every configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Overrides the home-level configuration directory.
pub const HOME_ENV: &str = "TETHER_HOME";

const CATALOG_DIR_NAME: &str = "catalog";
const PACKAGES_DIR_NAME: &str = "packages";
const TEMP_DIR_NAME: &str = "tether";

/// Well-known locations, computed once per process.
///
/// Every other component derives its locations from this value instead of
/// looking at the environment itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// The directory tether was invoked from.
    pub working_dir: PathBuf,
    /// Nearest ancestor of `working_dir` holding a `.git` entry, else `working_dir`.
    pub git_root: PathBuf,
    /// The user's home directory.
    pub home_dir: PathBuf,
    /// Home-level configuration directory (`~/.tether` unless `TETHER_HOME` is set).
    pub config_dir: PathBuf,
    /// Scratch space for downloads and extraction.
    pub temp_dir: PathBuf,
    /// Local clone of the package catalog.
    pub catalog_dir: PathBuf,
    /// Root of all hermetic package installs.
    pub packages_dir: PathBuf,
}

impl Paths {
    /// Computes the paths for the current process from its working directory,
    /// the user's home directory and the OS temp directory.
    pub fn discover() -> Result<Paths> {
        let working_dir = std::env::current_dir()?;
        let home_dir = BaseDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "unable to determine the home directory",
                ))
            })?;
        let config_dir = std::env::var_os(HOME_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Ok(Paths::from_dirs(working_dir, home_dir, config_dir, std::env::temp_dir()))
    }

    /// Builds the paths from explicit directories. `config_dir` defaults to
    /// `<home_dir>/.tether`.
    pub fn from_dirs(
        working_dir: PathBuf,
        home_dir: PathBuf,
        config_dir: Option<PathBuf>,
        temp_root: PathBuf,
    ) -> Paths {
        let git_root = find_git_root(&working_dir).unwrap_or_else(|| working_dir.clone());
        let config_dir = config_dir.unwrap_or_else(|| home_dir.join(CONFIG_DIR_NAME));
        Paths {
            catalog_dir: config_dir.join(CATALOG_DIR_NAME),
            packages_dir: config_dir.join(PACKAGES_DIR_NAME),
            temp_dir: temp_root.join(TEMP_DIR_NAME),
            working_dir,
            git_root,
            home_dir,
            config_dir,
        }
    }

    /// Directories searched for settings, highest precedence first:
    /// project, git root, home.
    pub fn config_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.working_dir.join(CONFIG_DIR_NAME),
            self.git_root.join(CONFIG_DIR_NAME),
            self.config_dir.clone(),
        ]
    }

    /// Candidate settings files, in the same order as [`Paths::config_dirs`].
    pub fn config_files(&self) -> Vec<PathBuf> {
        self.config_dirs()
            .into_iter()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .collect()
    }

    /// Install directory of one package version: `<packages>/<name>/<version>`.
    pub fn package_dir(&self, name: &str, version: &str) -> PathBuf {
        self.packages_dir.join(name).join(version)
    }
}

/// Returns the nearest ancestor of `dir` (including `dir`) that contains `.git`.
pub fn find_git_root(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .find(|candidate| candidate.join(".git").exists())
        .map(Path::to_path_buf)
}
