#![warn(clippy::pedantic)]

//! # goup
//!
//! Keeps a Go toolchain installation current. One run checks the newest
//! release published on the Go download server, compares it with the
//! `VERSION` file of the local installation and, when upstream is newer,
//! downloads the `linux-amd64` archive, removes the old installation and
//! unpacks the new one in its place.
//!
//! ## Examples
//!
//! Upgrade `/usr/local/go` if needed:
//! ```bash
//! sudo goup
//! ```
//!
//! Only report whether an upgrade exists:
//! ```bash
//! goup --check
//! ```
//!
//! Manage a toolchain in a user directory, discovering releases via JSON:
//! ```bash
//! goup --install-dir ~/sdk/go --source json
//! ```

mod config;
mod errors;
mod toolchain;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use config::{Config, SourceKind};
use errors::GoupError;
use toolchain::{
    HtmlListingSource, Installer, JsonFeedSource, Outcome, Platform, ReqwestClient, VersionSource,
};

/// Go toolchain updater.
///
/// Compares the installed Go version with the latest upstream release and
/// replaces the installation when a newer one is available.
#[derive(Parser)]
#[command(
    name = "goup",
    author,
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (commit ", env!("GOUP_GIT_COMMIT"), ")"),
    about = "Upgrade a Go toolchain installation in place",
    after_help = "\
ENVIRONMENT VARIABLES:
    GOUP_DIST_SERVER        Distribution server URL (default: https://go.dev)
    GOUP_INSTALL_DIR        Installation directory (default: /usr/local/go)
    GOUP_STAGING_DIR        Download staging directory (default: system temp dir)
    RUST_LOG                Log filter (e.g. goup=debug)

EXIT CODES:
    0 success, 1 unexpected error, 2 usage error, 3 network, 4 HTTP status,
    5 release not found, 6 version parse, 7 I/O, 8 archive format,
    9 configuration, 10 not installed"
)]
pub struct Cli {
    /// Only report whether an upgrade is available; never download or install.
    #[clap(long, action = clap::ArgAction::SetTrue)]
    pub check: bool,

    /// How to discover the latest release.
    #[clap(long, value_enum)]
    pub source: Option<SourceKind>,

    /// TOML configuration file.
    #[clap(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Installation directory, replaced on upgrade.
    #[clap(long, value_name = "DIR")]
    pub install_dir: Option<PathBuf>,

    /// Directory for downloaded archives; existing archives are reused.
    #[clap(long, value_name = "DIR")]
    pub staging_dir: Option<PathBuf>,

    /// Distribution server serving /dl/.
    #[clap(long, value_name = "URL")]
    pub dist_server: Option<String>,

    /// Leading path components to drop from archive entries.
    #[clap(long, value_name = "N")]
    pub strip_components: Option<usize>,

    /// Per-request timeout in seconds (default: none).
    #[clap(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable debug logging on stderr.
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

impl Cli {
    /// Applies command line overrides, the last configuration layer.
    fn apply_to(&self, config: &mut Config) {
        if let Some(source) = self.source {
            config.source = source;
        }
        if let Some(dir) = &self.install_dir {
            config.install_dir.clone_from(dir);
        }
        if let Some(dir) = &self.staging_dir {
            config.staging_dir.clone_from(dir);
        }
        if let Some(server) = &self.dist_server {
            config.dist_server.clone_from(server);
        }
        if let Some(strip) = self.strip_components {
            config.strip_components = strip;
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = Some(timeout);
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    if let Err(e) = run(&cli) {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

fn init_logger(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Prints the error and returns the exit code for its kind.
///
/// Errors that do not originate from a pipeline stage exit with 1.
fn handle_error(e: &anyhow::Error) -> i32 {
    eprintln!("Error: {e:?}");
    e.downcast_ref::<GoupError>().map_or(1, GoupError::exit_code)
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_to(&mut config);
    log::debug!("effective configuration: {config:?}");

    let platform = Platform::LINUX_AMD64;
    if !platform.matches_host() {
        log::warn!(
            "host is {}-{}; installing {platform} binaries anyway",
            std::env::consts::OS,
            std::env::consts::ARCH
        );
    }

    let client = ReqwestClient::new(config.request_timeout())?;
    let source: Box<dyn VersionSource + '_> = match config.source {
        SourceKind::Html => Box::new(HtmlListingSource::new(
            &client,
            config.listing_url(),
            platform,
        )),
        SourceKind::Json => Box::new(JsonFeedSource::new(&client, config.feed_url(), platform)),
    };

    let installer = Installer::new(&config, &client, source.as_ref()).check_only(cli.check);
    let mut stdout = std::io::stdout().lock();
    let outcome = installer
        .run(&mut stdout)
        .with_context(|| format!("could not update {}", config.install_dir.display()))?;
    match outcome {
        Outcome::UpToDate { installed, latest } => {
            log::debug!("{installed} is current (upstream {latest})");
        }
        Outcome::UpdateAvailable { installed, latest } => {
            log::info!("{latest} available, {installed} installed");
        }
        Outcome::Installed { previous, version } => {
            log::info!("upgraded {previous} -> {version}");
        }
    }
    Ok(())
}
