//! Version discovery for goup.
//!
//! The latest upstream release is found through a [`VersionSource`]. Two
//! implementations ship:
//!
//! - [`HtmlListingSource`] scrapes the download page (`https://go.dev/dl/`)
//!   and takes the first featured `linux-amd64` archive.
//! - [`JsonFeedSource`] reads the machine-readable release feed
//!   (`https://go.dev/dl/?mode=json`).
//!
//! The installed release is read from the `VERSION` file at the root of the
//! installation by [`installed_version`].

use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;

use super::Platform;
use super::http::HttpClient;
use crate::errors::GoupError;

/// Fragment identifying the tag that wraps archive names on the listing page.
const TAG_MARKER: &str = "span class";

/// Archive kind in the JSON feed (as opposed to `installer` or `source`).
const ARCHIVE_KIND: &str = "archive";

/// A place that can tell which Go release is the newest.
///
/// Implementations return a version string such as `go1.23.1`, or
/// `GoupError::NotFound` when the source answered but named no release.
pub trait VersionSource {
    /// Fetches the latest available version string.
    ///
    /// # Errors
    ///
    /// `Network`/`HttpStatus` for transport problems, `NotFound` when no
    /// release matches, `Format` for unreadable documents.
    fn latest_version(&self) -> Result<String, GoupError>;

    /// Human-readable origin, used in status output.
    fn describe(&self) -> String;
}

/// Scrapes the HTML download listing.
pub struct HtmlListingSource<'a> {
    client: &'a dyn HttpClient,
    url: String,
    platform: Platform,
}

impl<'a> HtmlListingSource<'a> {
    #[must_use]
    pub fn new(client: &'a dyn HttpClient, url: impl Into<String>, platform: Platform) -> Self {
        Self {
            client,
            url: url.into(),
            platform,
        }
    }
}

impl VersionSource for HtmlListingSource<'_> {
    fn latest_version(&self) -> Result<String, GoupError> {
        let response = self.client.get(&self.url)?.error_for_status(&self.url)?;
        scan_listing(BufReader::new(response.body), self.platform).map_err(|e| match e {
            GoupError::NotFound { .. } => GoupError::not_found(format!(
                "no {} archive listed at {}",
                self.platform, self.url
            )),
            other => other,
        })
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Returns the version from the first listing line naming a `platform` archive.
///
/// A line qualifies when it carries both the tag marker and the platform
/// suffix; the version is the text between the first `>` and
/// `.<platform>.tar.gz`. Lines that qualify but do not yield a version are
/// skipped.
///
/// # Errors
///
/// `GoupError::Network` if reading the body fails, `GoupError::NotFound` if
/// no line yields a version.
pub fn scan_listing<R: BufRead>(reader: R, platform: Platform) -> Result<String, GoupError> {
    let suffix = platform.suffix();
    let terminator = format!(".{suffix}.tar.gz");

    for line in reader.lines() {
        let line =
            line.map_err(|e| GoupError::network_with_source("failed to read listing body", e))?;
        if let Some(version) = extract_version(&line, &suffix, &terminator) {
            log::debug!("listing line matched: {}", line.trim());
            return Ok(version.to_string());
        }
    }

    Err(GoupError::not_found(format!(
        "no {platform} archive found in listing"
    )))
}

fn extract_version<'l>(line: &'l str, suffix: &str, terminator: &str) -> Option<&'l str> {
    if !line.contains(TAG_MARKER) || !line.contains(suffix) {
        return None;
    }
    let (_, after_tag) = line.split_once('>')?;
    let (version, _) = after_tag.split_once(terminator)?;
    let version = version.trim();
    (!version.is_empty()).then_some(version)
}

/// Reads the JSON release feed.
pub struct JsonFeedSource<'a> {
    client: &'a dyn HttpClient,
    url: String,
    platform: Platform,
}

impl<'a> JsonFeedSource<'a> {
    #[must_use]
    pub fn new(client: &'a dyn HttpClient, url: impl Into<String>, platform: Platform) -> Self {
        Self {
            client,
            url: url.into(),
            platform,
        }
    }
}

/// One release in the feed. Unlisted fields (checksums, sizes) are ignored.
#[derive(Debug, Deserialize)]
struct FeedRelease {
    version: String,
    #[serde(default)]
    stable: bool,
    #[serde(default)]
    files: Vec<FeedFile>,
}

#[derive(Debug, Deserialize)]
struct FeedFile {
    #[serde(default)]
    os: String,
    #[serde(default)]
    arch: String,
    #[serde(default)]
    kind: String,
}

impl FeedRelease {
    fn ships_archive_for(&self, platform: Platform) -> bool {
        self.files
            .iter()
            .any(|f| f.os == platform.os && f.arch == platform.arch && f.kind == ARCHIVE_KIND)
    }
}

impl VersionSource for JsonFeedSource<'_> {
    fn latest_version(&self) -> Result<String, GoupError> {
        let response = self.client.get(&self.url)?.error_for_status(&self.url)?;
        let releases: Vec<FeedRelease> = serde_json::from_reader(BufReader::new(response.body))
            .map_err(|e| {
                if e.is_io() {
                    GoupError::network_with_source(format!("failed to read {}", self.url), e)
                } else {
                    GoupError::format(format!("invalid release feed from {}: {e}", self.url))
                }
            })?;

        latest_stable(&releases, self.platform)
            .map(|r| r.version.clone())
            .ok_or_else(|| {
                GoupError::not_found(format!(
                    "no stable release with a {} archive at {}",
                    self.platform, self.url
                ))
            })
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// The feed lists releases newest first; take the first stable one for `platform`.
fn latest_stable(releases: &[FeedRelease], platform: Platform) -> Option<&FeedRelease> {
    releases
        .iter()
        .find(|r| r.stable && r.ships_archive_for(platform))
}

/// Reads the version string of the current installation.
///
/// Only the first line is returned; recent releases append build metadata
/// (`time ...`) on following lines.
///
/// # Errors
///
/// `GoupError::NotInstalled` if the file does not exist, `GoupError::Io` on
/// any other read failure.
pub fn installed_version(version_file: &Path) -> Result<String, GoupError> {
    let content = std::fs::read_to_string(version_file).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            GoupError::not_installed(version_file)
        } else {
            GoupError::io(format!("failed to read {}", version_file.display()), e)
        }
    })?;

    Ok(content.lines().next().unwrap_or_default().trim().to_string())
}
