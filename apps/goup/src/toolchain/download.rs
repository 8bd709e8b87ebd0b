//! Archive download for goup.
//!
//! Downloads are streamed to a temporary sibling of the destination and
//! renamed on success, so an interrupted transfer never leaves a file that a
//! later run would mistake for a cached archive. There is no retry: a failed
//! download ends the run.

use std::io::{Read, Write};
use std::path::Path;

use super::http::HttpClient;
use crate::errors::GoupError;

/// Permission bits of a downloaded archive.
const ARCHIVE_MODE: u32 = 0o664;

/// Copy buffer size.
const CHUNK_SIZE: usize = 64 * 1024;

/// Downloads `url` to `dest` and returns the number of bytes written.
///
/// The staging directory is created when missing. Callers skip this call
/// entirely when `dest` already exists.
///
/// # Errors
///
/// Returns an error if:
/// - The request cannot be sent or the body cannot be read (`Network`)
/// - The server answers with a non-success status (`HttpStatus`)
/// - The file cannot be created, written or renamed (`Io`)
pub fn download(client: &dyn HttpClient, url: &str, dest: &Path) -> Result<u64, GoupError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            GoupError::io(format!("failed to create directory {}", parent.display()), e)
        })?;
    }

    let response = client.get(url)?.error_for_status(url)?;

    let temp_path = dest.with_extension("tmp");
    let written = match write_body(response.body, url, &temp_path) {
        Ok(written) => written,
        Err(e) => {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }
    };

    std::fs::rename(&temp_path, dest).map_err(|e| {
        GoupError::io(
            format!(
                "failed to rename {} to {}",
                temp_path.display(),
                dest.display()
            ),
            e,
        )
    })?;

    log::info!("downloaded {} ({})", dest.display(), format_bytes(written));
    Ok(written)
}

fn write_body(mut body: Box<dyn Read>, url: &str, path: &Path) -> Result<u64, GoupError> {
    let mut file = create_archive_file(path)
        .map_err(|e| GoupError::io(format!("failed to create file {}", path.display()), e))?;

    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut written: u64 = 0;
    loop {
        let read = body
            .read(&mut buffer)
            .map_err(|e| GoupError::network_with_source(format!("failed to read from {url}"), e))?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])
            .map_err(|e| GoupError::io(format!("failed to write {}", path.display()), e))?;
        written += read as u64;
    }

    file.flush()
        .map_err(|e| GoupError::io(format!("failed to flush {}", path.display()), e))?;
    Ok(written)
}

#[cfg(unix)]
fn create_archive_file(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(ARCHIVE_MODE)
        .open(path)
}

#[cfg(not(unix))]
fn create_archive_file(path: &Path) -> std::io::Result<std::fs::File> {
    let _ = ARCHIVE_MODE;
    std::fs::File::create(path)
}

/// Formats bytes into a human-readable string (KB, MB, GB).
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    #[allow(clippy::cast_precision_loss)]
    let bytes_f = bytes as f64;

    if bytes_f >= GB {
        format!("{:.2} GB", bytes_f / GB)
    } else if bytes_f >= MB {
        format!("{:.2} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.2} KB", bytes_f / KB)
    } else {
        format!("{bytes} B")
    }
}
