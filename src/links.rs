use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use crate::catalog::CatalogSource;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::manifest::Resolver;
use crate::util::set_executable;

/// Version of tether recorded in every link script it writes.
pub const TETHER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The line that marks a link script as written (and owned) by tether.
#[cfg(not(windows))]
pub const LINK_MARKER: &str = "# tether:managed-link";
#[cfg(windows)]
pub const LINK_MARKER: &str = "rem tether:managed-link";

/// Who a path in the link directory belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Nothing exists at the path.
    Absent,
    /// A link script written by tether.
    Owned,
    /// Anything else: a user script, a binary, a directory.
    Foreign,
}

/// Scans `reader` line by line for the link marker.
pub fn is_managed<R: Read>(reader: R) -> bool {
    BufReader::new(reader)
        .split(b'\n')
        .map_while(|line| line.ok())
        .any(|line| {
            String::from_utf8_lossy(&line)
                .trim_start()
                .starts_with(LINK_MARKER)
        })
}

/// Classifies the file at `path`.
pub fn link_state(path: &Path) -> Result<LinkState> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LinkState::Absent),
        Err(e) => return Err(e.into()),
    };
    if !metadata.is_file() {
        return Ok(LinkState::Foreign);
    }
    if is_managed(File::open(path)?) {
        Ok(LinkState::Owned)
    } else {
        Ok(LinkState::Foreign)
    }
}

/// Builds the script that forwards `bin` of `package` to `tether run`.
#[cfg(not(windows))]
pub fn render_link_script(program: &Path, package: &str, bin: &str) -> String {
    format!(
        "#!/bin/sh\n{LINK_MARKER}\n# package={package} bin={bin} tether={TETHER_VERSION}\nexec {} run --bin={} {} -- \"$@\"\n",
        sh_quote(&program.display().to_string()),
        sh_quote(bin),
        sh_quote(package),
    )
}

#[cfg(windows)]
pub fn render_link_script(program: &Path, package: &str, bin: &str) -> String {
    format!(
        "@echo off\r\n{LINK_MARKER}\r\nrem package={package} bin={bin} tether={TETHER_VERSION}\r\n\"{}\" run --bin={bin} {package} -- %*\r\n",
        program.display(),
    )
}

#[cfg(not(windows))]
fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Writes and removes link scripts in one directory.
#[derive(Debug, Clone)]
pub struct LinkManager {
    link_dir: PathBuf,
    program: PathBuf,
}

impl LinkManager {
    /// `program` is the tether executable the scripts will invoke.
    pub fn new(link_dir: PathBuf, program: PathBuf) -> LinkManager {
        LinkManager { link_dir, program }
    }

    /// A manager for the configured link directory, pointing scripts at the
    /// running executable.
    pub fn from_context(ctx: &Context) -> Result<LinkManager> {
        Ok(LinkManager::new(
            ctx.settings.link_dir.clone(),
            std::env::current_exe()?,
        ))
    }

    pub fn link_dir(&self) -> &Path {
        &self.link_dir
    }

    /// Where the script for `bin` lives.
    pub fn link_path(&self, bin: &str) -> PathBuf {
        if cfg!(windows) {
            self.link_dir.join(format!("{bin}.cmd"))
        } else {
            self.link_dir.join(bin)
        }
    }

    /// Writes the link script for `bin` of `package`.
    ///
    /// Absent and owned paths are (over)written; a foreign file is a
    /// [`Error::LinkConflict`] unless `force` is set. A directory is never
    /// replaced, forced or not.
    pub fn link_bin(&self, package: &str, bin: &str, force: bool) -> Result<PathBuf> {
        let path = self.link_path(bin);
        let state = link_state(&path)?;
        match state {
            LinkState::Foreign if !force => return Err(Error::LinkConflict { path }),
            LinkState::Foreign => {
                remove_foreign(&path)?;
                log::warn!("Forcibly overwriting {}, which was not managed by tether", path.display());
            }
            LinkState::Owned | LinkState::Absent => {}
        }

        std::fs::create_dir_all(&self.link_dir)?;
        let script = render_link_script(&self.program, package, bin);
        std::fs::write(&path, &script)?;
        set_executable(&path)?;
        log::debug!("Wrote link script:\n{script}");
        log::info!("Linked {package}/{bin} to: {}", path.display());
        Ok(path)
    }

    /// Removes the link script for `bin`. Returns `None` when there was
    /// nothing to remove.
    pub fn unlink_bin(&self, bin: &str, force: bool) -> Result<Option<PathBuf>> {
        let path = self.link_path(bin);
        match link_state(&path)? {
            LinkState::Absent => {
                log::warn!("{} does not exist, skipping...", path.display());
                Ok(None)
            }
            LinkState::Owned => {
                std::fs::remove_file(&path)?;
                log::info!("Un-linked from: {}", path.display());
                Ok(Some(path))
            }
            LinkState::Foreign if force => {
                remove_foreign(&path)?;
                log::warn!("Forcibly un-linked from: {}", path.display());
                Ok(Some(path))
            }
            LinkState::Foreign => Err(Error::LinkConflict { path }),
        }
    }
}

/// Removes a foreign file under force. Directories are left alone.
fn remove_foreign(path: &Path) -> Result<()> {
    if std::fs::symlink_metadata(path)?.is_dir() {
        return Err(Error::LinkBlocked {
            path: path.to_path_buf(),
        });
    }
    std::fs::remove_file(path)?;
    Ok(())
}

/// Outcome of a batch link or unlink.
#[derive(Debug, Default)]
pub struct LinkReport {
    /// Scripts written or removed.
    pub paths: Vec<PathBuf>,
    /// Names with no package in the catalog.
    pub not_found: Vec<String>,
    /// Per-name conflicts that stopped that name.
    pub conflicts: Vec<Error>,
}

impl LinkReport {
    /// Names that did not link cleanly.
    pub fn failures(&self) -> usize {
        self.not_found.len() + self.conflicts.len()
    }
}

/// Writes one link script per declared bin of every named package.
///
/// A name without a catalog manifest is linked as its own sole bin and
/// counted in [`LinkReport::not_found`]. A conflict stops that name only;
/// the rest of the batch still runs.
pub fn link(ctx: &Context, names: &[String], force: bool) -> Result<LinkReport> {
    let catalog = ctx.catalog()?;
    let manager = LinkManager::from_context(ctx)?;
    link_with(ctx, catalog.as_ref(), &manager, names, force)
}

pub fn link_with(
    ctx: &Context,
    catalog: &dyn CatalogSource,
    manager: &LinkManager,
    names: &[String],
    force: bool,
) -> Result<LinkReport> {
    let resolver = Resolver::new(ctx, catalog);
    let mut report = LinkReport::default();
    for name in names {
        let bins = match resolver.resolve(name, None, None) {
            Ok(manifest) => manifest.bin_names(),
            Err(Error::PackageNotFound { .. }) => {
                log::warn!("No package named {name} in the catalog, linking it as-is");
                report.not_found.push(name.clone());
                vec![name.clone()]
            }
            Err(e) => {
                log::warn!("Unable to resolve {name} ({e}), linking it as-is");
                vec![name.clone()]
            }
        };

        for bin in bins {
            match manager.link_bin(name, &bin, force) {
                Ok(path) => report.paths.push(path),
                Err(e @ (Error::LinkConflict { .. } | Error::LinkBlocked { .. })) => {
                    log::error!("{e}");
                    report.conflicts.push(e);
                    break;
                }
                Err(e) => return Err(e),
            }
        }
    }
    Ok(report)
}

/// Removes the link scripts of every named package.
///
/// Bins are taken from the local catalog when it has the package; the
/// catalog is never fetched just to unlink.
pub fn unlink(ctx: &Context, names: &[String], force: bool) -> Result<LinkReport> {
    let catalog = ctx.catalog()?;
    let manager = LinkManager::from_context(ctx)?;
    unlink_with(ctx, catalog.as_ref(), &manager, names, force)
}

pub fn unlink_with(
    ctx: &Context,
    catalog: &dyn CatalogSource,
    manager: &LinkManager,
    names: &[String],
    force: bool,
) -> Result<LinkReport> {
    let resolver = Resolver::new(ctx, catalog);
    let mut report = LinkReport::default();
    for name in names {
        let bins = if catalog.has_package(name) {
            resolver
                .resolve(name, None, None)
                .map(|manifest| manifest.bin_names())
                .unwrap_or_else(|_| vec![name.clone()])
        } else {
            vec![name.clone()]
        };

        for bin in bins {
            match manager.unlink_bin(&bin, force) {
                Ok(Some(path)) => report.paths.push(path),
                Ok(None) => {}
                Err(e @ (Error::LinkConflict { .. } | Error::LinkBlocked { .. })) => {
                    log::error!("{e}");
                    report.conflicts.push(e);
                    break;
                }
                Err(e) => return Err(e),
            }
        }
    }
    Ok(report)
}
