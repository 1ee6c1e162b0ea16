use std::ffi::OsString;
use std::process::{Command, ExitStatus};
use crate::catalog::CatalogSource;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::installer::ensure;
use crate::manifest::{PackageManifest, Resolver};
use crate::util::is_executable;

/// The bin used when the caller names none: the one named after the
/// package, else the first declared.
pub fn default_bin(manifest: &PackageManifest) -> String {
    if manifest.options.bins.contains_key(&manifest.name) {
        return manifest.name.clone();
    }
    manifest
        .options
        .bins
        .keys()
        .next()
        .cloned()
        .unwrap_or_else(|| manifest.name.clone())
}

/// The program and arguments that run `bin` with `args`.
///
/// With an external invoker (`exec`), the bin path becomes the invoker's
/// first argument.
pub fn command_line(
    manifest: &PackageManifest,
    bin: &str,
    args: &[String],
) -> Result<(OsString, Vec<OsString>)> {
    let bin_path = manifest.bin_path(bin)?;
    let args = args.iter().map(OsString::from);
    if manifest.options.exec.is_empty() {
        Ok((bin_path.into_os_string(), args.collect()))
    } else {
        let mut full = vec![bin_path.into_os_string()];
        full.extend(args);
        Ok((OsString::from(&manifest.options.exec), full))
    }
}

/// Runs `bin` of an installed manifest with the caller's stdio, from the
/// caller's working directory, and hands back the child's exit status.
pub fn execute(
    ctx: &Context,
    manifest: &PackageManifest,
    bin: &str,
    args: &[String],
) -> Result<ExitStatus> {
    let (program, args) = command_line(manifest, bin, args)?;
    let bin_path = manifest.bin_path(bin)?;
    if manifest.options.exec.is_empty() && !is_executable(&bin_path) {
        log::warn!("{} is not marked executable", bin_path.display());
    }
    log::debug!("Run {:?}@{} with args {:?}", program, manifest.version, args);
    log::info!("Using hermetic {manifest}");

    let status = Command::new(&program)
        .args(&args)
        .current_dir(&ctx.paths.working_dir)
        .status()?;
    Ok(status)
}

/// Resolves, installs if needed, and runs one bin of a package.
pub fn run(
    ctx: &Context,
    name: &str,
    bin: Option<&str>,
    version: Option<&str>,
    args: &[String],
) -> Result<ExitStatus> {
    let catalog = ctx.catalog()?;
    run_with(ctx, catalog.as_ref(), name, bin, version, args)
}

pub fn run_with(
    ctx: &Context,
    catalog: &dyn CatalogSource,
    name: &str,
    bin: Option<&str>,
    version: Option<&str>,
    args: &[String],
) -> Result<ExitStatus> {
    let manifest = Resolver::new(ctx, catalog).resolve(name, version, None)?;
    let bin = bin.map(str::to_string).unwrap_or_else(|| default_bin(&manifest));
    ensure(ctx, &manifest, &bin)?;
    execute(ctx, &manifest, &bin, args)
}

/// Runs the manifest's self-test command, installing the package first.
///
/// A leading word naming one of the package's bins is replaced with that
/// bin's installed path.
pub fn self_test(ctx: &Context, name: &str, version: Option<&str>) -> Result<ExitStatus> {
    let catalog = ctx.catalog()?;
    let manifest = Resolver::new(ctx, catalog.as_ref()).resolve(name, version, None)?;
    if manifest.options.test.trim().is_empty() {
        return Err(Error::IncompleteManifest {
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            field: "test".to_string(),
            detail: "is empty".to_string(),
        });
    }
    let bin = default_bin(&manifest);
    ensure(ctx, &manifest, &bin)?;

    let (program, args) = test_command_line(&manifest)?;
    log::info!("Testing {manifest}: {}", manifest.options.test);
    let status = Command::new(&program)
        .args(&args)
        .current_dir(&ctx.paths.working_dir)
        .status()?;
    Ok(status)
}

fn test_command_line(manifest: &PackageManifest) -> Result<(OsString, Vec<OsString>)> {
    let incomplete = |detail: String| Error::IncompleteManifest {
        name: manifest.name.clone(),
        version: manifest.version.clone(),
        field: "test".to_string(),
        detail,
    };
    let words = shell_words::split(&manifest.options.test).map_err(|e| incomplete(e.to_string()))?;
    let Some((first, rest)) = words.split_first() else {
        return Err(incomplete("is empty".to_string()));
    };
    if manifest.options.bins.contains_key(first) {
        command_line(manifest, first, rest)
    } else {
        Ok((
            OsString::from(first),
            rest.iter().map(OsString::from).collect(),
        ))
    }
}
