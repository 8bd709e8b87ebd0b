//! Target platform for Go release archives.
//!
//! goup installs a single fixed target, `linux-amd64`. The platform is used to
//! build archive file names and to recognise matching entries on the download
//! listing and in the JSON release feed.

use std::fmt;

/// A Go release target as named by the upstream distribution (`GOOS`/`GOARCH`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    /// Operating system (`GOOS`).
    pub os: &'static str,
    /// CPU architecture (`GOARCH`).
    pub arch: &'static str,
}

impl Platform {
    /// The only supported target.
    pub const LINUX_AMD64: Self = Self {
        os: "linux",
        arch: "amd64",
    };

    /// Returns the `os-arch` suffix used in archive names (e.g. `linux-amd64`).
    #[must_use = "returns the suffix without side effects"]
    pub fn suffix(self) -> String {
        format!("{}-{}", self.os, self.arch)
    }

    /// Returns the archive file name for a version string such as `go1.23.1`.
    ///
    /// Example: `go1.23.1` -> `go1.23.1.linux-amd64.tar.gz`
    #[must_use = "returns the file name without side effects"]
    pub fn archive_filename(self, version: &str) -> String {
        format!("{version}.{}.tar.gz", self.suffix())
    }

    /// Whether the host this binary was built for matches the target.
    #[must_use]
    pub fn matches_host(self) -> bool {
        let host_arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            other => other,
        };
        std::env::consts::OS == self.os && host_arch == self.arch
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_joins_os_and_arch() {
        assert_eq!(Platform::LINUX_AMD64.suffix(), "linux-amd64");
    }

    #[test]
    fn display_matches_suffix() {
        assert_eq!(
            format!("{}", Platform::LINUX_AMD64),
            Platform::LINUX_AMD64.suffix()
        );
    }

    #[test]
    fn archive_filename_appends_platform_and_extension() {
        assert_eq!(
            Platform::LINUX_AMD64.archive_filename("go1.23.1"),
            "go1.23.1.linux-amd64.tar.gz"
        );
    }

    #[test]
    fn matches_host_on_linux_x86_64() {
        #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
        assert!(Platform::LINUX_AMD64.matches_host());

        #[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
        assert!(!Platform::LINUX_AMD64.matches_host());
    }
}
