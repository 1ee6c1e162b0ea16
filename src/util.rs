use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use regex::Regex;

static HOME_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:~|\$\{HOME\}|\$HOME)").expect("home prefix pattern is valid")
});

/// Expands a leading `~`, `$HOME` or `${HOME}` in a configured path.
pub fn expand_home(raw: &str, home: &Path) -> PathBuf {
    match HOME_PREFIX.find(raw) {
        Some(m) => {
            let rest = raw[m.end()..].trim_start_matches(['/', '\\']);
            if rest.is_empty() {
                home.to_path_buf()
            } else {
                home.join(rest)
            }
        }
        None => PathBuf::from(raw),
    }
}

/// Strips the `sha256:` prefix from a hash if present and lowercases it.
/// This is useful for comparing hashes uniformly.
pub fn format_hash(hash: &str) -> String {
    hash.strip_prefix("sha256:").unwrap_or(hash).trim().to_ascii_lowercase()
}

/// Checks if a given path is an executable file on Unix.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
/// Checks if a given path has a Windows executable extension (.exe, .bat, .cmd).
#[cfg(windows)]
pub fn is_executable(path: &Path) -> bool {
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        let ext = ext.to_ascii_lowercase();
        matches!(ext.as_str(), "exe" | "bat" | "cmd")
    } else {
        false
    }
}

/// Adds the execute bits (`0o755`) to a file. A no-op on Windows.
pub fn set_executable(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(perms.mode() | 0o755);
        std::fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
