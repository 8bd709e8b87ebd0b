//! Runtime configuration for goup.
//!
//! Every location the updater touches is a field with a default that matches
//! a stock Go installation on Linux. Values are layered, later layers winning:
//!
//! 1. Built-in defaults
//! 2. A TOML file passed with `--config`
//! 3. Environment variables (`GOUP_DIST_SERVER`, `GOUP_INSTALL_DIR`, `GOUP_STAGING_DIR`)
//! 4. Command line flags
//!
//! ## Example file
//!
//! ```toml
//! dist_server = "https://go.dev"
//! source = "json"
//! install_dir = "/opt/go"
//! staging_dir = "/var/cache/goup"
//! strip_components = 1
//! request_timeout_secs = 600
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::GoupError;
use crate::toolchain::Platform;

/// Environment variable overriding the distribution server.
pub const DIST_SERVER_ENV: &str = "GOUP_DIST_SERVER";

/// Environment variable overriding the installation directory.
pub const INSTALL_DIR_ENV: &str = "GOUP_INSTALL_DIR";

/// Environment variable overriding the staging directory.
pub const STAGING_DIR_ENV: &str = "GOUP_STAGING_DIR";

/// Default distribution server.
pub const DEFAULT_DIST_SERVER: &str = "https://go.dev";

/// Default installation directory.
pub const DEFAULT_INSTALL_DIR: &str = "/usr/local/go";

/// Name of the version file inside an installation.
const VERSION_FILE: &str = "VERSION";

/// How the latest release is discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Scrape the HTML download listing.
    #[default]
    Html,
    /// Read the JSON release feed.
    Json,
}

/// Effective goup configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Base URL serving `/dl/` (listing, feed and archives).
    pub dist_server: String,
    /// Latest-version discovery strategy.
    pub source: SourceKind,
    /// Live installation, removed and repopulated on upgrade.
    pub install_dir: PathBuf,
    /// Where archives are downloaded and decompressed. Doubles as a cache.
    pub staging_dir: PathBuf,
    /// Leading path components dropped from archive entries (`go/` upstream).
    pub strip_components: usize,
    /// Per-request timeout; unset means requests may block indefinitely.
    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dist_server: DEFAULT_DIST_SERVER.to_string(),
            source: SourceKind::default(),
            install_dir: PathBuf::from(DEFAULT_INSTALL_DIR),
            staging_dir: std::env::temp_dir(),
            strip_components: 1,
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Loads defaults, overlays the optional TOML file, then the process environment.
    ///
    /// # Errors
    ///
    /// Returns `GoupError::Io` if the file cannot be read and
    /// `GoupError::Config` if it is not valid configuration TOML.
    pub fn load(path: Option<&Path>) -> Result<Self, GoupError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parses a TOML configuration file; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `GoupError::Io` or `GoupError::Config`.
    pub fn from_file(path: &Path) -> Result<Self, GoupError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GoupError::io(format!("failed to read config file {}", path.display()), e)
        })?;
        Self::from_toml(&content)
            .map_err(|e| GoupError::config(format!("{}: {e}", path.display())))
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `GoupError::Config` on syntax errors or unknown keys.
    pub fn from_toml(content: &str) -> Result<Self, GoupError> {
        toml::from_str(content).map_err(|e| GoupError::config(e.to_string()))
    }

    /// Applies environment overrides through `lookup`.
    ///
    /// Empty or whitespace-only values are treated as unset.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(server) = get(DIST_SERVER_ENV) {
            self.dist_server = server;
        }
        if let Some(dir) = get(INSTALL_DIR_ENV) {
            self.install_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get(STAGING_DIR_ENV) {
            self.staging_dir = PathBuf::from(dir);
        }
    }

    fn server(&self) -> &str {
        self.dist_server.trim().trim_end_matches('/')
    }

    /// HTML download listing, e.g. `https://go.dev/dl/`.
    #[must_use]
    pub fn listing_url(&self) -> String {
        format!("{}/dl/", self.server())
    }

    /// JSON release feed, e.g. `https://go.dev/dl/?mode=json`.
    #[must_use]
    pub fn feed_url(&self) -> String {
        format!("{}/dl/?mode=json", self.server())
    }

    /// Download URL for a version's archive on `platform`.
    #[must_use]
    pub fn artifact_url(&self, version: &str, platform: Platform) -> String {
        format!("{}/dl/{}", self.server(), platform.archive_filename(version))
    }

    /// Staged archive path for a version on `platform`.
    #[must_use]
    pub fn staged_archive(&self, version: &str, platform: Platform) -> PathBuf {
        self.staging_dir.join(platform.archive_filename(version))
    }

    /// The installed version file, `<install_dir>/VERSION`.
    #[must_use]
    pub fn version_file(&self) -> PathBuf {
        self.install_dir.join(VERSION_FILE)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
