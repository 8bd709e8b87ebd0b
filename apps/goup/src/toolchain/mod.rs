//! Go toolchain management for goup.
//!
//! ## Module Structure
//!
//! - [`platform`] - The fixed `linux-amd64` release target
//! - [`version`] - `go<major>.<minor>.<patch>` parsing and ordering
//! - [`http`] - Blocking HTTP seam (`reqwest` and test fakes)
//! - [`source`] - Latest/installed version discovery
//! - [`download`] - Archive download into the staging directory
//! - [`archive`] - gzip decompression and tar unpacking
//! - [`installer`] - The end-to-end upgrade pipeline

pub mod archive;
pub mod download;
pub mod http;
pub mod installer;
pub mod platform;
pub mod source;
pub mod version;

pub use http::ReqwestClient;
pub use installer::{Installer, Outcome};
pub use platform::Platform;
pub use source::{HtmlListingSource, JsonFeedSource, VersionSource};
