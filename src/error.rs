use std::path::PathBuf;
use thiserror::Error;

/// Failure kinds surfaced by the resolution and lifecycle engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no package named \"{name}\" found at {}. Try `tether sync-catalog`, or contribute a manifest for \"{name}\"", path.display())]
    PackageNotFound { name: String, path: PathBuf },
    #[error("invalid version \"{version}\" for package \"{name}\": {reason}")]
    InvalidVersion {
        name: String,
        version: String,
        reason: String,
    },
    #[error("incomplete manifest for {name}@{version}: {field} {detail}")]
    IncompleteManifest {
        name: String,
        version: String,
        field: String,
        detail: String,
    },
    #[error("malformed manifest {}: {message}", path.display())]
    MalformedManifest { path: PathBuf, message: String },
    #[error("failed to download {name}@{version} from {url}: {reason}")]
    DownloadFailed {
        name: String,
        version: String,
        url: String,
        reason: String,
    },
    #[error("checksum mismatch for {name}@{version}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        version: String,
        expected: String,
        actual: String,
    },
    #[error("failed to extract {name}@{version} with `{command}`: {reason}")]
    ExtractionFailed {
        name: String,
        version: String,
        command: String,
        reason: String,
    },
    #[error("{} is not managed by tether. Use --force to replace or remove it anyway", path.display())]
    LinkConflict { path: PathBuf },
    #[error("{} is a directory and cannot be replaced by a link script", path.display())]
    LinkBlocked { path: PathBuf },
    #[error("package \"{name}\" declares no bin named \"{bin}\" (available: {})", available.join(", "))]
    BinNotFound {
        name: String,
        bin: String,
        available: Vec<String>,
    },
    #[error("failed to sync catalog from {location}: {reason}")]
    CatalogSyncFailed { location: String, reason: String },
    #[error("unsupported catalog location: {location}")]
    UnsupportedCatalog { location: String },
    #[error("invalid config file {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
