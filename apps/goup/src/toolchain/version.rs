//! Go version parsing and comparison.
//!
//! Go release versions have the form `go<major>.<minor>.<patch>`. They are
//! parsed into a numeric triple and compared lexicographically: the first
//! differing component decides.

use std::fmt;
use std::str::FromStr;

use crate::errors::GoupError;

/// Prefix carried by every Go release version string.
pub const VERSION_PREFIX: &str = "go";

/// A parsed Go release version.
///
/// Field order matters: the derived `Ord` compares `major`, then `minor`,
/// then `patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    /// Stand-in for "nothing installed"; every real release is newer.
    pub const ZERO: Self = Self::new(0, 0, 0);

    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses a version string such as `go1.22.0`.
    ///
    /// Surrounding whitespace is ignored. The `go` prefix is required.
    ///
    /// # Errors
    ///
    /// Returns `GoupError::Parse` if the prefix is missing, a component is not
    /// a non-negative integer, or there are not exactly three components.
    pub fn parse(s: &str) -> Result<Self, GoupError> {
        let trimmed = s.trim();
        let numbers = trimmed.strip_prefix(VERSION_PREFIX).ok_or_else(|| {
            GoupError::parse(format!(
                "version '{trimmed}' does not start with '{VERSION_PREFIX}'"
            ))
        })?;

        let components = numbers
            .split('.')
            .map(|part| {
                let invalid = || {
                    GoupError::parse(format!("invalid component '{part}' in version '{trimmed}'"))
                };
                // `u64::from_str` would also take a leading `+`.
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                part.parse::<u64>().map_err(|_| invalid())
            })
            .collect::<Result<Vec<_>, _>>()?;

        match components.as_slice() {
            &[major, minor, patch] => Ok(Self::new(major, minor, patch)),
            other => Err(GoupError::parse(format!(
                "expected 3 components in version '{trimmed}', found {}",
                other.len()
            ))),
        }
    }
}

impl FromStr for Version {
    type Err = GoupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{VERSION_PREFIX}{}.{}.{}",
            self.major, self.minor, self.patch
        )
    }
}

/// Returns `true` when `target` is strictly newer than `current`.
#[must_use]
pub fn is_newer(current: Version, target: Version) -> bool {
    target > current
}
