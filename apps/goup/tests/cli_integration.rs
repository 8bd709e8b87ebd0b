#![warn(clippy::pedantic)]

//! Integration tests for the goup binary.
//!
//! These tests spawn the compiled executable and check stdout, stderr and
//! the exit code. None of them reach the real distribution server: the
//! server is pointed at a closed local port, so every run that gets past
//! configuration fails with a network error before touching the
//! installation directory.
//!
//! ## Test Infrastructure
//!
//! - Uses `assert_cmd` for spawning and asserting on command execution
//! - Uses `assert_fs` for temporary filesystem operations
//! - Uses `predicates` for flexible output matching
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p goup
//! ```

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::process::Command;

/// A server address nothing listens on.
const UNREACHABLE_SERVER: &str = "http://127.0.0.1:1";

/// Builds a goup command isolated from the caller's environment.
fn goup(temp: &assert_fs::TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("goup"));
    cmd.env_remove("GOUP_DIST_SERVER")
        .env("GOUP_INSTALL_DIR", temp.path().join("go"))
        .env("GOUP_STAGING_DIR", temp.path().join("staging"))
        .env_remove("RUST_LOG");
    cmd
}

// -----------------------------------------------------------------------------
// Metadata
// -----------------------------------------------------------------------------

/// Verifies that `goup --help` lists the options and the exit codes.
#[test]
fn help_shows_options() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("goup"));
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--check"))
        .stdout(predicate::str::contains("--install-dir"))
        .stdout(predicate::str::contains("--source"))
        .stdout(predicate::str::contains("GOUP_DIST_SERVER"))
        .stdout(predicate::str::contains("EXIT CODES"));
}

/// Verifies that `goup --version` prints the package version.
#[test]
fn version_flag_prints_version() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("goup"));
    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

// -----------------------------------------------------------------------------
// Usage errors
// -----------------------------------------------------------------------------

/// Unknown release sources are rejected by argument parsing.
#[test]
fn unknown_source_is_usage_error() {
    let temp = assert_fs::TempDir::new().unwrap();

    let mut cmd = goup(&temp);
    cmd.args(["--source", "rss"]);

    cmd.assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("rss"));
}

#[test]
fn non_numeric_strip_components_is_usage_error() {
    let temp = assert_fs::TempDir::new().unwrap();

    let mut cmd = goup(&temp);
    cmd.args(["--strip-components", "one"]);

    cmd.assert().failure().code(2);
}

// -----------------------------------------------------------------------------
// Configuration errors
// -----------------------------------------------------------------------------

/// A missing `--config` file is an I/O error.
#[test]
fn missing_config_file_fails() {
    let temp = assert_fs::TempDir::new().unwrap();
    let missing = temp.path().join("nope.toml");

    let mut cmd = goup(&temp);
    cmd.arg("--config").arg(&missing);

    cmd.assert()
        .failure()
        .code(7)
        .stderr(predicate::str::contains("nope.toml"));
}

/// Unknown keys in the configuration file are rejected.
#[test]
fn unknown_config_key_fails() {
    let temp = assert_fs::TempDir::new().unwrap();
    let config = temp.child("goup.toml");
    config.write_str("dist_servr = \"https://go.dev\"\n").unwrap();

    let mut cmd = goup(&temp);
    cmd.arg("--config").arg(config.path());

    cmd.assert()
        .failure()
        .code(9)
        .stderr(predicate::str::contains("dist_servr"));
}

// -----------------------------------------------------------------------------
// Network errors
// -----------------------------------------------------------------------------

/// An unreachable server from the environment fails with the network code
/// and leaves the installation directory alone.
#[test]
fn unreachable_server_from_env_fails() {
    let temp = assert_fs::TempDir::new().unwrap();
    let install = temp.child("go");
    install.child("VERSION").write_str("go1.21.0\n").unwrap();

    let mut cmd = goup(&temp);
    cmd.env("GOUP_DIST_SERVER", UNREACHABLE_SERVER);

    cmd.assert()
        .failure()
        .code(3)
        .stdout(predicate::str::contains("Success").not())
        .stderr(predicate::str::contains("Error"))
        .stderr(predicate::str::contains("127.0.0.1:1"));

    install.child("VERSION").assert("go1.21.0\n");
}

/// The JSON feed source hits the `?mode=json` endpoint.
#[test]
fn unreachable_server_with_json_source_fails() {
    let temp = assert_fs::TempDir::new().unwrap();

    let mut cmd = goup(&temp);
    cmd.args(["--check", "--source", "json", "--dist-server", UNREACHABLE_SERVER]);

    cmd.assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("mode=json"));
}

/// Command line flags take precedence over the configuration file.
#[test]
fn flag_overrides_config_file_server() {
    let temp = assert_fs::TempDir::new().unwrap();
    let config = temp.child("goup.toml");
    config
        .write_str("dist_server = \"http://127.0.0.1:2\"\n")
        .unwrap();

    let mut cmd = goup(&temp);
    cmd.arg("--config")
        .arg(config.path())
        .args(["--check", "--dist-server", UNREACHABLE_SERVER]);

    cmd.assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("127.0.0.1:1"))
        .stderr(predicate::str::contains("127.0.0.1:2").not());
}
