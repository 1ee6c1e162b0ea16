/// Returns the normalized OS name used in platform strings.
///
/// Rust reports macOS as `macos`; artifact names overwhelmingly use `darwin`.
pub fn os_name(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

/// Architecture alias used by `${platform}`, e.g. `x64` for `x86_64`.
pub fn arch_alias(arch: &str) -> &str {
    match arch {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        "x86" => "x86",
        other => other,
    }
}

/// Alternate architecture spelling used by `${x-platform}`, e.g. `x86_64`.
pub fn x_arch_alias(arch: &str) -> &str {
    match arch {
        "aarch64" => "arm64",
        other => other,
    }
}

/// `<os>-<arch>` for the given OS and architecture, e.g. `darwin-arm64`.
pub fn platform_for(os: &str, arch: &str) -> String {
    format!("{}-{}", os_name(os), arch_alias(arch))
}

/// `<os>-<alternate arch>` for the given OS and architecture, e.g. `linux-x86_64`.
pub fn x_platform_for(os: &str, arch: &str) -> String {
    format!("{}-{}", os_name(os), x_arch_alias(arch))
}

/// Derives the alternate spelling from a platform string, e.g. an overridden
/// `linux-x64` becomes `linux-x86_64`.
pub fn x_platform_from(platform: &str) -> String {
    match platform.split_once('-') {
        Some((os, "x64")) => format!("{os}-x86_64"),
        Some((os, "aarch64")) => format!("{os}-arm64"),
        _ => platform.to_string(),
    }
}

/// Platform string of the running host.
pub fn current_platform() -> String {
    platform_for(std::env::consts::OS, std::env::consts::ARCH)
}

/// Alternate platform string of the running host.
pub fn current_x_platform() -> String {
    x_platform_for(std::env::consts::OS, std::env::consts::ARCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_strings() {
        assert_eq!(platform_for("macos", "aarch64"), "darwin-arm64");
        assert_eq!(platform_for("linux", "x86_64"), "linux-x64");
        assert_eq!(x_platform_for("linux", "x86_64"), "linux-x86_64");
        assert_eq!(x_platform_for("macos", "aarch64"), "darwin-arm64");
        assert_eq!(platform_for("freebsd", "riscv64"), "freebsd-riscv64");
        assert_eq!(x_platform_from("linux-x64"), "linux-x86_64");
        assert_eq!(x_platform_from("darwin-arm64"), "darwin-arm64");
    }

    #[test]
    fn test_current_platform_has_os_and_arch() {
        let platform = current_platform();
        let (os, arch) = platform.split_once('-').unwrap();
        assert!(!os.is_empty());
        assert!(!arch.is_empty());
    }
}
