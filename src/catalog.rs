use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use crate::error::{Error, Result};

/// Remote catalog used when no settings file names one.
pub const DEFAULT_CATALOG: &str = "https://github.com/tether-sh/tether-catalog.git";
/// Branch tracked by the default catalog.
pub const DEFAULT_CATALOG_BRANCH: &str = "main";
/// File extension of manifest templates inside a catalog.
pub const MANIFEST_EXTENSION: &str = "toml";

/// A local copy of a catalog of manifest templates, kept in sync with some
/// remote location.
pub trait CatalogSource {
    /// Brings the local copy up to date, creating it if needed.
    fn sync(&self) -> Result<()>;
    /// Where the catalog is fetched from.
    fn location(&self) -> &str;
    /// Where the catalog lives on disk.
    fn path(&self) -> &Path;

    /// Whether a local copy exists at all. An empty directory does not count.
    fn exists(&self) -> bool {
        std::fs::read_dir(self.path()).is_ok_and(|mut entries| entries.next().is_some())
    }

    /// Syncs only when no local copy exists yet.
    fn ensure_present(&self) -> Result<()> {
        if self.exists() {
            Ok(())
        } else {
            log::info!("No local catalog at {}, fetching it", self.path().display());
            self.sync()
        }
    }

    /// Path of the manifest template for `name`.
    fn manifest_path(&self, name: &str) -> PathBuf {
        self.path().join(format!("{name}.{MANIFEST_EXTENSION}"))
    }

    fn has_package(&self, name: &str) -> bool {
        self.manifest_path(name).is_file()
    }

    /// Names of every package in the local copy, sorted.
    fn packages(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.path())? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some(MANIFEST_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Picks a catalog loader for `location`.
///
/// Only git-backed catalogs exist today; any URL git understands, or an
/// existing local directory, selects one.
pub fn catalog_source(location: &str, branch: &str, dir: &Path) -> Result<Box<dyn CatalogSource>> {
    let is_git = ["https://", "http://", "ssh://", "git://", "file://", "git@"]
        .iter()
        .any(|scheme| location.starts_with(scheme))
        || location.ends_with(".git")
        || Path::new(location).is_dir();
    if !is_git {
        return Err(Error::UnsupportedCatalog {
            location: location.to_string(),
        });
    }
    Ok(Box::new(GitCatalog::new(location, branch, dir)))
}

/// A catalog backed by a git repository, cloned shallow on a single branch.
#[derive(Debug, Clone)]
pub struct GitCatalog {
    location: String,
    branch: String,
    path: PathBuf,
}

impl GitCatalog {
    pub fn new(location: &str, branch: &str, path: &Path) -> GitCatalog {
        GitCatalog {
            location: location.to_string(),
            branch: branch.to_string(),
            path: path.to_path_buf(),
        }
    }

    fn clone_repo(&self) -> Result<()> {
        log::debug!("Cloning catalog {} ({}) into {}", self.location, self.branch, self.path.display());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let output = Command::new("git")
            .arg("clone")
            .args(["--depth", "1", "--single-branch", "--branch", &self.branch])
            .arg(&self.location)
            .arg(&self.path)
            .output()
            .map_err(|e| self.sync_failed(format!("unable to run git: {e}")))?;
        self.check(&output, "clone")?;
        log::info!("Cloned package catalog, now at {}", self.head().unwrap_or_default());
        Ok(())
    }

    fn pull(&self) -> Result<()> {
        log::debug!("Updating catalog {} at {}", self.location, self.path.display());
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.path)
            .args(["pull", "--ff-only", "origin", &self.branch])
            .output()
            .map_err(|e| self.sync_failed(format!("unable to run git: {e}")))?;
        self.check(&output, "pull")?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let head = self.head().unwrap_or_default();
        if stdout.contains("Already up to date") || stdout.contains("Already up-to-date") {
            log::info!("Package catalog already up to date, at {head}");
        } else {
            log::info!("Updated package catalog, now at {head}");
        }
        Ok(())
    }

    fn head(&self) -> Option<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.path)
            .args(["rev-parse", "--short", "HEAD"])
            .output()
            .ok()?;
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn check(&self, output: &Output, action: &str) -> Result<()> {
        log::debug!("git {action}: {}", String::from_utf8_lossy(&output.stdout).trim());
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(self.sync_failed(format!("git {action} failed: {}", stderr.trim())))
    }

    fn sync_failed(&self, reason: String) -> Error {
        Error::CatalogSyncFailed {
            location: self.location.clone(),
            reason,
        }
    }
}

impl CatalogSource for GitCatalog {
    fn sync(&self) -> Result<()> {
        if self.path.join(".git").exists() {
            self.pull()
        } else if self.path.exists() && std::fs::read_dir(&self.path)?.next().is_some() {
            Err(self.sync_failed(format!(
                "{} exists but is not a git checkout",
                self.path.display()
            )))
        } else {
            self.clone_repo()
        }
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok_and(|o| o.status.success())
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(["-c", "user.name=tether", "-c", "user.email=tether@example.com", "-c", "commit.gpgsign=false"])
            .args(args)
            .output()
            .unwrap();
        assert!(status.status.success(), "git {:?}: {}", args, String::from_utf8_lossy(&status.stderr));
    }

    fn remote_with(dir: &Path, files: &[(&str, &str)]) {
        std::fs::create_dir_all(dir).unwrap();
        git(dir, &["init", "-q"]);
        git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        for (name, content) in files {
            std::fs::write(dir.join(name), content).unwrap();
        }
        git(dir, &["add", "."]);
        git(dir, &["commit", "-q", "-m", "packages"]);
    }

    #[test]
    fn test_catalog_source_selects_git() {
        let dir = tempdir().unwrap();
        assert!(catalog_source(DEFAULT_CATALOG, "main", dir.path()).is_ok());
        assert!(catalog_source("git@github.com:me/pkgs", "main", dir.path()).is_ok());
        assert!(catalog_source(&dir.path().display().to_string(), "main", dir.path()).is_ok());
        assert!(matches!(
            catalog_source("s3://bucket/pkgs", "main", dir.path()),
            Err(Error::UnsupportedCatalog { .. })
        ));
    }

    #[test]
    fn test_local_catalog_lookup() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("foo.toml"), "name = \"foo\"").unwrap();
        std::fs::write(dir.path().join("bar.toml"), "name = \"bar\"").unwrap();
        std::fs::write(dir.path().join("README.md"), "docs").unwrap();
        let catalog = GitCatalog::new(DEFAULT_CATALOG, "main", dir.path());

        assert!(catalog.exists());
        assert!(catalog.has_package("foo"));
        assert!(!catalog.has_package("baz"));
        assert_eq!(catalog.packages().unwrap(), vec!["bar", "foo"]);
        // present already: no network access
        catalog.ensure_present().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_git_clone_then_pull() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let remote = dir.path().join("remote");
        remote_with(&remote, &[("foo.toml", "name = \"foo\"\n")]);

        let location = format!("file://{}", remote.display());
        let local = dir.path().join("home").join("catalog");
        let catalog = GitCatalog::new(&location, "main", &local);
        assert!(!catalog.exists());
        std::fs::create_dir_all(&local).unwrap();
        assert!(!catalog.exists());

        catalog.ensure_present().unwrap();
        assert!(catalog.has_package("foo"));

        // nothing new upstream is still a success
        catalog.sync().unwrap();

        std::fs::write(remote.join("bar.toml"), "name = \"bar\"\n").unwrap();
        git(&remote, &["add", "."]);
        git(&remote, &["commit", "-q", "-m", "bar"]);
        catalog.sync().unwrap();
        assert!(catalog.has_package("bar"));
    }

    #[cfg(unix)]
    #[test]
    fn test_git_clone_failure_is_fatal() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let location = format!("file://{}", dir.path().join("missing").display());
        let catalog = GitCatalog::new(&location, "main", &dir.path().join("catalog"));
        assert!(matches!(catalog.sync(), Err(Error::CatalogSyncFailed { .. })));
    }
}
