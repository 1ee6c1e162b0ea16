use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::manifest::PackageManifest;
use crate::util::{format_hash, set_executable};

/// Whether `bin` of the manifest is already present in its output directory.
pub fn is_installed(manifest: &PackageManifest, bin: &str) -> Result<bool> {
    Ok(manifest.bin_path(bin)?.exists())
}

/// Makes sure `bin` of the manifest exists on disk, downloading and
/// extracting the package when it does not. An install that leaves `bin`
/// missing is an error.
///
/// The check is keyed by path only: an existing file is trusted as-is.
/// Nothing is rolled back on failure; running again repeats every step.
pub fn ensure(ctx: &Context, manifest: &PackageManifest, bin: &str) -> Result<PathBuf> {
    let bin_path = manifest.bin_path(bin)?;
    if bin_path.exists() {
        log::debug!("{manifest} already present at {}", bin_path.display());
        return Ok(bin_path);
    }
    manifest.validate_for_fetch()?;

    let artifact = download(ctx, manifest)?;
    if !manifest.options.sha256.is_empty() {
        verify_checksum(manifest, artifact.path())?;
    }

    std::fs::create_dir_all(&manifest.output_dir)?;
    if manifest.options.extract.trim().is_empty() {
        install_raw(manifest, artifact.path())?;
    } else {
        extract(ctx, manifest, &artifact)?;
    }

    if !bin_path.exists() {
        return Err(Error::IncompleteManifest {
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            field: "bins".to_string(),
            detail: format!("maps {bin} to {}, which the install did not produce", bin_path.display()),
        });
    }
    Ok(bin_path)
}

/// Streams the manifest's source into a temp file under the temp directory.
fn download(ctx: &Context, manifest: &PackageManifest) -> Result<NamedTempFile> {
    let url = &manifest.options.source;
    log::info!("Downloading {manifest} from {url}");
    let failed = |reason: String| Error::DownloadFailed {
        name: manifest.name.clone(),
        version: manifest.version.clone(),
        url: url.clone(),
        reason,
    };

    let mut response = reqwest::blocking::get(url).map_err(|e| failed(e.to_string()))?;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(failed(format!("server responded with {status}")));
    }

    std::fs::create_dir_all(&ctx.paths.temp_dir)?;
    let mut file = tempfile::Builder::new()
        .prefix(&format!("{}-{}-", manifest.name, manifest.version))
        .tempfile_in(&ctx.paths.temp_dir)?;
    let bytes = response
        .copy_to(file.as_file_mut())
        .map_err(|e| failed(e.to_string()))?;
    log::debug!("Downloaded {bytes} bytes to {}", file.path().display());
    Ok(file)
}

fn verify_checksum(manifest: &PackageManifest, artifact: &Path) -> Result<()> {
    let mut hasher = Sha256::new();
    std::io::copy(&mut File::open(artifact)?, &mut hasher)?;
    let actual = hex::encode(hasher.finalize());
    let expected = format_hash(&manifest.options.sha256);
    if actual != expected {
        return Err(Error::ChecksumMismatch {
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            expected,
            actual,
        });
    }
    log::debug!("Checksum verified for {manifest}");
    Ok(())
}

/// Copies a bare binary into the output directory under the package name.
fn install_raw(manifest: &PackageManifest, artifact: &Path) -> Result<()> {
    let target = manifest.output_dir.join(&manifest.name);
    std::fs::copy(artifact, &target)?;
    set_executable(&target)?;
    log::debug!("Installed {manifest} to {}", target.display());
    Ok(())
}

/// Runs the extraction command with the artifact on stdin, from the temp
/// directory. Its stdout is discarded and its stderr passed through.
fn extract(ctx: &Context, manifest: &PackageManifest, artifact: &NamedTempFile) -> Result<()> {
    let command = &manifest.options.extract;
    let failed = |reason: String| Error::ExtractionFailed {
        name: manifest.name.clone(),
        version: manifest.version.clone(),
        command: command.clone(),
        reason,
    };

    let parts = shell_words::split(command).map_err(|e| failed(e.to_string()))?;
    let Some((program, args)) = parts.split_first() else {
        return Err(failed("empty command".to_string()));
    };
    log::debug!("Extract: {command}");

    let status = Command::new(program)
        .args(args)
        .current_dir(&ctx.paths.temp_dir)
        .stdin(Stdio::from(artifact.reopen()?))
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|e| failed(e.to_string()))?;
    if !status.success() {
        return Err(failed(format!("exited with {status}")));
    }
    log::debug!("Extracted {manifest} to {}", manifest.output_dir.display());
    Ok(())
}
