//! The upgrade pipeline.
//!
//! [`Installer::run`] performs, strictly in order:
//!
//! 1. Resolve the latest and the installed version (a missing installation
//!    counts as `go0.0.0`)
//! 2. Parse both and stop when the latest is not strictly newer
//! 3. Download the archive unless it is already staged
//! 4. Decompress the archive into the staging directory
//! 5. Remove the current installation directory
//! 6. Unpack the new release into the installation directory
//!
//! Any error ends the run. Nothing is rolled back: a failure after step 5
//! leaves the installation directory partially populated or absent.

use std::io::Write;
use std::path::Path;

use super::archive::{decompress_gzip, unpack_tar};
use super::download::{download, format_bytes};
use super::http::HttpClient;
use super::source::{VersionSource, installed_version};
use super::version::{Version, is_newer};
use super::Platform;
use crate::config::Config;
use crate::errors::GoupError;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The installed version is current (or ahead of upstream).
    UpToDate { installed: Version, latest: Version },
    /// A newer version exists; reported only in check mode.
    UpdateAvailable { installed: Version, latest: Version },
    /// `version` was installed, replacing `previous`.
    Installed { previous: Version, version: Version },
}

/// Wires version discovery, download and extraction together.
pub struct Installer<'a> {
    config: &'a Config,
    client: &'a dyn HttpClient,
    source: &'a dyn VersionSource,
    platform: Platform,
    check_only: bool,
}

impl<'a> Installer<'a> {
    #[must_use]
    pub fn new(
        config: &'a Config,
        client: &'a dyn HttpClient,
        source: &'a dyn VersionSource,
    ) -> Self {
        Self {
            config,
            client,
            source,
            platform: Platform::LINUX_AMD64,
            check_only: false,
        }
    }

    /// Stop after the comparison, never touching the filesystem.
    #[must_use]
    pub fn check_only(mut self, check_only: bool) -> Self {
        self.check_only = check_only;
        self
    }

    /// Runs the pipeline, writing one status line per stage to `out`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any stage. A missing installation is
    /// not an error.
    pub fn run(&self, out: &mut dyn Write) -> Result<Outcome, GoupError> {
        let latest_raw = self.source.latest_version()?;
        say(
            out,
            format_args!(
                "Latest version found at {}: {latest_raw}",
                self.source.describe()
            ),
        )?;

        let version_file = self.config.version_file();
        let installed_raw = match installed_version(&version_file) {
            Ok(version) => {
                say(out, format_args!("Installed version on this system: {version}"))?;
                version
            }
            Err(GoupError::NotInstalled { path }) => {
                log::info!("no version file at {}", path.display());
                if self.check_only {
                    say(out, format_args!("Go installation not found on this system."))?;
                } else {
                    say(
                        out,
                        format_args!(
                            "Go installation not found on this system. Installing it now..."
                        ),
                    )?;
                }
                Version::ZERO.to_string()
            }
            Err(e) => return Err(e),
        };

        let latest = Version::parse(&latest_raw)?;
        let installed = Version::parse(&installed_raw)?;
        log::debug!("comparing installed {installed} with latest {latest}");

        if !is_newer(installed, latest) {
            say(out, format_args!("Upgrade not needed"))?;
            return Ok(Outcome::UpToDate { installed, latest });
        }

        if self.check_only {
            say(out, format_args!("Upgrade available: {installed} -> {latest}"))?;
            return Ok(Outcome::UpdateAvailable { installed, latest });
        }

        let version = latest.to_string();
        let archive_path = self.config.staged_archive(&version, self.platform);

        if archive_path.exists() {
            say(
                out,
                format_args!("Using previously downloaded {}", archive_path.display()),
            )?;
        } else {
            let url = self.config.artifact_url(&version, self.platform);
            say(out, format_args!("Downloading {version} from {url}"))?;
            let written = download(self.client, &url, &archive_path)?;
            say(out, format_args!("Downloaded {}", format_bytes(written)))?;
        }

        say(out, format_args!("Decompressing {}", archive_path.display()))?;
        let tar_path = decompress_gzip(&archive_path, &self.config.staging_dir)?;

        let install_dir = &self.config.install_dir;
        say(
            out,
            format_args!("Removing previous installation at {}", install_dir.display()),
        )?;
        remove_installation(install_dir)?;

        say(out, format_args!("Extracting to {}", install_dir.display()))?;
        let entries = unpack_tar(&tar_path, install_dir, self.config.strip_components)?;
        log::info!("unpacked {entries} entries into {}", install_dir.display());

        say(
            out,
            format_args!("Success, Go version {version} installed correctly"),
        )?;
        Ok(Outcome::Installed {
            previous: installed,
            version: latest,
        })
    }
}

/// Recursively removes the installation directory; an absent one is fine.
fn remove_installation(dir: &Path) -> Result<(), GoupError> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(GoupError::io(
            format!("failed to remove {}", dir.display()),
            e,
        )),
    }
}

fn say(out: &mut dyn Write, line: std::fmt::Arguments<'_>) -> Result<(), GoupError> {
    writeln!(out, "{line}").map_err(|e| GoupError::io("failed to write status output", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::http::testing::FakeClient;
    use crate::toolchain::source::HtmlListingSource;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::path::PathBuf;
    use tar::{Builder, EntryType, Header};

    const SERVER: &str = "https://go.test";
    const LISTING_URL: &str = "https://go.test/dl/";
    const ARCHIVE_URL: &str = "https://go.test/dl/go1.23.1.linux-amd64.tar.gz";

    fn temp_test_dir(name: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("goup_test_{}_{}", name, rand::random::<u64>()));
        std::fs::create_dir_all(&dir).expect("Should create temp dir");
        dir
    }

    fn listing_for(version: &str) -> String {
        format!(
            "<html>\n<span class=\"filename\">{version}.linux-amd64.tar.gz</span>\n</html>\n"
        )
    }

    /// A gzip-compressed Go distribution with a `go/` top-level folder.
    fn release_archive(version: &str) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = Builder::new(encoder);

        for dir in ["go/", "go/bin/"] {
            let mut header = Header::new_gnu();
            header.set_entry_type(EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, dir, std::io::empty())
                .expect("Should append directory");
        }

        let version_file = format!("{version}\ntime 2024-09-03T22:55:34Z\n");
        for (path, mode, data) in [
            ("go/VERSION", 0o644, version_file.as_bytes()),
            ("go/bin/go", 0o755, b"\x7fELF go".as_slice()),
        ] {
            let mut header = Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(mode);
            header.set_cksum();
            builder
                .append_data(&mut header, path, data)
                .expect("Should append file");
        }

        builder
            .into_inner()
            .expect("Should finish tar")
            .finish()
            .expect("Should finish gzip")
    }

    struct Fixture {
        root: PathBuf,
        config: Config,
    }

    impl Fixture {
        fn new(name: &str) -> Self {
            let root = temp_test_dir(name);
            let config = Config {
                dist_server: SERVER.to_string(),
                install_dir: root.join("usr").join("local").join("go"),
                staging_dir: root.join("staging"),
                ..Config::default()
            };
            Self { root, config }
        }

        fn install(&self, version: &str) {
            let dir = &self.config.install_dir;
            std::fs::create_dir_all(dir.join("bin")).unwrap();
            std::fs::write(dir.join("VERSION"), format!("{version}\n")).unwrap();
            std::fs::write(dir.join("bin").join("stale-tool"), b"old").unwrap();
        }

        fn installed_version_line(&self) -> String {
            let content = std::fs::read_to_string(self.config.version_file()).unwrap();
            content.lines().next().unwrap_or_default().to_string()
        }

        fn run(&self, client: &FakeClient, check_only: bool) -> (Result<Outcome, GoupError>, String) {
            let source = HtmlListingSource::new(client, LISTING_URL, Platform::LINUX_AMD64);
            let installer = Installer::new(&self.config, client, &source).check_only(check_only);
            let mut out = Vec::new();
            let result = installer.run(&mut out);
            (result, String::from_utf8(out).unwrap())
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }

    fn upstream(latest: &str) -> FakeClient {
        FakeClient::new()
            .route(LISTING_URL, 200, listing_for(latest))
            .route(ARCHIVE_URL, 200, release_archive(latest))
    }

    #[test]
    fn fresh_install_downloads_and_extracts_latest() {
        let fixture = Fixture::new("install_fresh");
        let client = upstream("go1.23.1");

        let (result, output) = fixture.run(&client, false);

        assert_eq!(
            result.unwrap(),
            Outcome::Installed {
                previous: Version::ZERO,
                version: Version::new(1, 23, 1),
            }
        );
        assert_eq!(fixture.installed_version_line(), "go1.23.1");
        assert!(fixture.config.install_dir.join("bin").join("go").is_file());
        assert!(!fixture.config.install_dir.join("go").exists());
        assert_eq!(client.call_count(ARCHIVE_URL), 1);
        assert!(output.contains("Latest version found at https://go.test/dl/: go1.23.1"));
        assert!(output.contains("Go installation not found on this system"));
        assert!(output.contains("Success, Go version go1.23.1 installed correctly"));
    }

    #[test]
    fn upgrade_replaces_previous_installation() {
        let fixture = Fixture::new("install_upgrade");
        fixture.install("go1.22.7");
        let client = upstream("go1.23.1");

        let (result, output) = fixture.run(&client, false);

        assert_eq!(
            result.unwrap(),
            Outcome::Installed {
                previous: Version::new(1, 22, 7),
                version: Version::new(1, 23, 1),
            }
        );
        assert_eq!(fixture.installed_version_line(), "go1.23.1");
        assert!(!fixture
            .config
            .install_dir
            .join("bin")
            .join("stale-tool")
            .exists());
        assert!(output.contains("Installed version on this system: go1.22.7"));
    }

    #[test]
    fn same_version_needs_no_upgrade() {
        let fixture = Fixture::new("install_same");
        fixture.install("go1.23.1");
        let client = upstream("go1.23.1");

        let (result, output) = fixture.run(&client, false);

        assert!(matches!(result.unwrap(), Outcome::UpToDate { .. }));
        assert!(output.contains("Upgrade not needed"));
        assert_eq!(client.calls(), vec![LISTING_URL.to_string()]);
        assert!(fixture
            .config
            .install_dir
            .join("bin")
            .join("stale-tool")
            .exists());
    }

    #[test]
    fn newer_local_version_needs_no_upgrade() {
        let fixture = Fixture::new("install_ahead");
        fixture.install("go1.24.0");
        let client = upstream("go1.23.1");

        let (result, _) = fixture.run(&client, false);

        assert_eq!(
            result.unwrap(),
            Outcome::UpToDate {
                installed: Version::new(1, 24, 0),
                latest: Version::new(1, 23, 1),
            }
        );
        assert_eq!(client.call_count(ARCHIVE_URL), 0);
    }

    #[test]
    fn staged_archive_is_reused_without_download() {
        let fixture = Fixture::new("install_cached");
        fixture.install("go1.22.7");
        let staged = fixture
            .config
            .staged_archive("go1.23.1", Platform::LINUX_AMD64);
        std::fs::create_dir_all(staged.parent().unwrap()).unwrap();
        std::fs::write(&staged, release_archive("go1.23.1")).unwrap();
        let client = FakeClient::new().route(LISTING_URL, 200, listing_for("go1.23.1"));

        let (result, output) = fixture.run(&client, false);

        assert!(matches!(result.unwrap(), Outcome::Installed { .. }));
        assert_eq!(client.call_count(ARCHIVE_URL), 0);
        assert!(output.contains("Using previously downloaded"));
        assert_eq!(fixture.installed_version_line(), "go1.23.1");
    }

    #[test]
    fn check_only_reports_without_side_effects() {
        let fixture = Fixture::new("install_check");
        fixture.install("go1.22.7");
        let client = upstream("go1.23.1");

        let (result, output) = fixture.run(&client, true);

        assert_eq!(
            result.unwrap(),
            Outcome::UpdateAvailable {
                installed: Version::new(1, 22, 7),
                latest: Version::new(1, 23, 1),
            }
        );
        assert!(output.contains("Upgrade available: go1.22.7 -> go1.23.1"));
        assert_eq!(client.call_count(ARCHIVE_URL), 0);
        assert_eq!(fixture.installed_version_line(), "go1.22.7");
        assert!(!fixture.config.staging_dir.exists());
    }

    #[test]
    fn download_failure_leaves_installation_untouched() {
        let fixture = Fixture::new("install_404");
        fixture.install("go1.22.7");
        let client = FakeClient::new()
            .route(LISTING_URL, 200, listing_for("go1.23.1"))
            .route(ARCHIVE_URL, 404, "not found");

        let (result, _) = fixture.run(&client, false);

        assert!(matches!(
            result.unwrap_err(),
            GoupError::HttpStatus { status: 404, .. }
        ));
        assert_eq!(fixture.installed_version_line(), "go1.22.7");
    }

    #[test]
    fn corrupt_archive_fails_before_removal() {
        let fixture = Fixture::new("install_corrupt");
        fixture.install("go1.22.7");
        let client = FakeClient::new()
            .route(LISTING_URL, 200, listing_for("go1.23.1"))
            .route(ARCHIVE_URL, 200, "<html>captive portal</html>");

        let (result, _) = fixture.run(&client, false);

        assert!(matches!(result.unwrap_err(), GoupError::Format { .. }));
        assert_eq!(fixture.installed_version_line(), "go1.22.7");
    }

    #[test]
    fn malformed_latest_version_is_parse_error() {
        let fixture = Fixture::new("install_bad_latest");
        let client = FakeClient::new().route(LISTING_URL, 200, listing_for("go1.24"));

        let (result, _) = fixture.run(&client, false);

        assert!(matches!(result.unwrap_err(), GoupError::Parse { .. }));
    }

    #[test]
    fn malformed_installed_version_is_parse_error() {
        let fixture = Fixture::new("install_bad_local");
        fixture.install("devel +a1b2c3");
        let client = upstream("go1.23.1");

        let (result, _) = fixture.run(&client, false);

        assert!(matches!(result.unwrap_err(), GoupError::Parse { .. }));
        assert_eq!(client.call_count(ARCHIVE_URL), 0);
    }

    #[test]
    fn unreachable_listing_aborts_run() {
        let fixture = Fixture::new("install_offline");
        let client = FakeClient::new();

        let (result, output) = fixture.run(&client, false);

        assert!(matches!(result.unwrap_err(), GoupError::Network { .. }));
        assert!(output.is_empty());
    }

    #[test]
    fn remove_installation_tolerates_missing_directory() {
        let dir = temp_test_dir("remove_missing");
        assert!(remove_installation(&dir.join("absent")).is_ok());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
