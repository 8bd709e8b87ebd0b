//! Archive extraction for goup.
//!
//! Extraction runs in two stages so the installation directory is only
//! touched once the download is known to decompress:
//!
//! 1. [`decompress_gzip`] inflates the staged `.tar.gz` into a plain `.tar`
//!    file next to it.
//! 2. [`unpack_tar`] walks the tar stream and writes directories, files and
//!    links under the destination root, preserving permission bits.
//!
//! Neither stage is transactional: a failure leaves whatever was already
//! written in place.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use crate::errors::GoupError;

/// Copy buffer size.
const CHUNK_SIZE: usize = 64 * 1024;

/// Inflates a gzip file into `target_dir` and returns the path written.
///
/// The output is named after the file name embedded in the gzip header. When
/// the header carries no name, the source file name minus its `.gz` suffix is
/// used. Only the final path component of an embedded name is honoured.
///
/// # Errors
///
/// Returns an error if:
/// - The source cannot be opened or the output cannot be written (`Io`)
/// - The gzip header or the deflate stream is invalid (`Format`)
pub fn decompress_gzip(source: &Path, target_dir: &Path) -> Result<PathBuf, GoupError> {
    let file = File::open(source)
        .map_err(|e| GoupError::io(format!("failed to open {}", source.display()), e))?;
    let mut decoder = GzDecoder::new(BufReader::new(file));

    let embedded_name = decoder
        .header()
        .ok_or_else(|| {
            GoupError::format(format!("{} is not a valid gzip file", source.display()))
        })?
        .filename()
        .and_then(|raw| {
            Path::new(&*String::from_utf8_lossy(raw))
                .file_name()
                .map(ToOwned::to_owned)
        });

    // An embedded name equal to the source itself would truncate the input.
    let output = match embedded_name {
        Some(name) if target_dir.join(&name) != source => target_dir.join(name),
        _ => target_dir.join(default_output_name(source)?),
    };

    std::fs::create_dir_all(target_dir).map_err(|e| {
        GoupError::io(format!("failed to create directory {}", target_dir.display()), e)
    })?;

    let mut writer = File::create(&output)
        .map_err(|e| GoupError::io(format!("failed to create {}", output.display()), e))?;
    let copied = copy_stream(&mut decoder, &mut writer, source, &output)?;

    log::debug!(
        "decompressed {} -> {} ({copied} bytes)",
        source.display(),
        output.display()
    );
    Ok(output)
}

fn default_output_name(source: &Path) -> Result<std::ffi::OsString, GoupError> {
    let name = source.file_name().ok_or_else(|| {
        GoupError::format(format!("{} has no file name", source.display()))
    })?;
    let name = name.to_string_lossy();
    let stripped = name.strip_suffix(".gz").unwrap_or(&name);
    if stripped.is_empty() {
        return Err(GoupError::format(format!(
            "cannot derive output name from {}",
            source.display()
        )));
    }
    Ok(stripped.into())
}

/// Unpacks a tar file under `dest` and returns the number of entries written.
///
/// Entries are processed in stream order:
/// - directories are created (with parents); their modes are applied after
///   the last entry so read-only directories can still receive children
/// - regular files and symbolic links are written by `tar` itself, which
///   replaces existing files and keeps the entry's permission bits
/// - anything else is skipped
///
/// `strip_components` leading path components are dropped from each entry
/// name (like `tar --strip-components`); entries left with an empty path are
/// skipped.
///
/// Nothing is written outside `dest`: entries whose path is absolute or
/// contains `..`, entries below a symbolic link, and links pointing outside
/// `dest` are all refused.
///
/// # Errors
///
/// Returns an error if:
/// - The tar file cannot be opened or an output cannot be written (`Io`)
/// - A header is malformed or an entry would escape `dest` (`Format`)
pub fn unpack_tar(source: &Path, dest: &Path, strip_components: usize) -> Result<usize, GoupError> {
    let file = File::open(source)
        .map_err(|e| GoupError::io(format!("failed to open {}", source.display()), e))?;
    let mut archive = Archive::new(BufReader::new(file));

    std::fs::create_dir_all(dest)
        .map_err(|e| GoupError::io(format!("failed to create directory {}", dest.display()), e))?;

    let entries = archive
        .entries()
        .map_err(|e| read_error(e, format!("failed to read tar entries: {}", source.display())))?;

    let mut directories = Vec::new();
    let mut unpacked = 0;
    for entry in entries {
        let mut entry = entry
            .map_err(|e| read_error(e, format!("failed to read tar entry: {}", source.display())))?;

        let entry_path = entry
            .path()
            .map_err(|e| GoupError::format(format!("invalid entry path: {e}")))?
            .into_owned();

        // Reject paths with parent directory references or absolute paths
        // to prevent writing outside `dest` (e.g. "../../../etc/passwd").
        if entry_path.is_absolute()
            || entry_path
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(GoupError::format(format!(
                "refusing to extract path with parent directory or absolute reference: {}",
                entry_path.display()
            )));
        }

        let Some(relative_path) = strip_path(&entry_path, strip_components) else {
            continue;
        };

        let header = entry.header();
        let entry_type = header.entry_type();
        let mode = header
            .mode()
            .map_err(|e| GoupError::format(format!("invalid mode for {}: {e}", entry_path.display())))?;

        if !(entry_type.is_dir() || entry_type.is_file() || entry_type.is_symlink()) {
            log::debug!(
                "skipping {} ({:?} entry)",
                entry_path.display(),
                entry_type
            );
            continue;
        }

        check_no_symlink_ancestor(dest, &relative_path)?;
        if entry_type.is_symlink() {
            let target = entry
                .link_name()
                .map_err(|e| GoupError::format(format!("invalid link target: {e}")))?
                .ok_or_else(|| {
                    GoupError::format(format!("symlink {} has no target", entry_path.display()))
                })?
                .into_owned();
            check_link_target(&relative_path, &target)?;
        }

        let output_path = dest.join(&relative_path);
        remove_existing_symlink(&output_path)?;

        if entry_type.is_dir() {
            std::fs::create_dir_all(&output_path).map_err(|e| {
                GoupError::io(format!("failed to create directory {}", output_path.display()), e)
            })?;
            directories.push((output_path, mode));
        } else {
            ensure_parent(&output_path)?;
            entry.set_preserve_permissions(true);
            entry.unpack(&output_path).map_err(|e| {
                GoupError::io(format!("failed to extract {}", output_path.display()), e)
            })?;
        }

        unpacked += 1;
    }

    // Deepest first, so a read-only parent does not block its children.
    for (path, mode) in directories.iter().rev() {
        apply_mode(path, *mode)?;
    }

    log::debug!("unpacked {unpacked} entries into {}", dest.display());
    Ok(unpacked)
}

/// Drops `count` leading components; `.` components are ignored.
fn strip_path(path: &Path, count: usize) -> Option<PathBuf> {
    let stripped: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .skip(count)
        .collect();
    (!stripped.as_os_str().is_empty()).then_some(stripped)
}

fn ensure_parent(path: &Path) -> Result<(), GoupError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            GoupError::io(format!("failed to create directory {}", parent.display()), e)
        })?;
    }
    Ok(())
}

/// Streams `reader` into `writer`, separating read failures (which point at
/// a corrupt source) from write failures.
fn copy_stream(
    reader: &mut impl Read,
    writer: &mut impl Write,
    source: &Path,
    output: &Path,
) -> Result<u64, GoupError> {
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut copied: u64 = 0;
    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|e| read_error(e, format!("failed to read {}", source.display())))?;
        if read == 0 {
            break;
        }
        writer
            .write_all(&buffer[..read])
            .map_err(|e| GoupError::io(format!("failed to write {}", output.display()), e))?;
        copied += read as u64;
    }
    writer
        .flush()
        .map_err(|e| GoupError::io(format!("failed to flush {}", output.display()), e))?;
    Ok(copied)
}

/// Errors raised by the operating system are I/O failures; anything the
/// decoders synthesise means the stream itself is malformed.
fn read_error(e: std::io::Error, message: String) -> GoupError {
    if e.raw_os_error().is_some() {
        GoupError::io(message, e)
    } else {
        GoupError::format(format!("{message}: {e}"))
    }
}

/// Fails when any existing ancestor of `dest/relative` (below `dest`) is a
/// symbolic link, since writing through it could land outside `dest`.
fn check_no_symlink_ancestor(dest: &Path, relative: &Path) -> Result<(), GoupError> {
    let mut current = dest.to_path_buf();
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            break;
        }
        current.push(component);
        if is_symlink(&current) {
            return Err(GoupError::format(format!(
                "refusing to extract {} through symbolic link {}",
                relative.display(),
                current.display()
            )));
        }
    }
    Ok(())
}

/// Fails when a link at `relative` pointing to `target` would resolve
/// outside the extraction root.
fn check_link_target(relative: &Path, target: &Path) -> Result<(), GoupError> {
    let escapes = || {
        GoupError::format(format!(
            "refusing to create link {} pointing outside the destination: {}",
            relative.display(),
            target.display()
        ))
    };

    let mut depth = relative.components().count().saturating_sub(1);
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => depth = depth.checked_sub(1).ok_or_else(escapes)?,
            Component::RootDir | Component::Prefix(_) => return Err(escapes()),
        }
    }
    Ok(())
}

fn is_symlink(path: &Path) -> bool {
    path.symlink_metadata()
        .is_ok_and(|meta| meta.file_type().is_symlink())
}

/// Removes a link left at `path` by an earlier extraction so the new entry
/// replaces it instead of following it.
fn remove_existing_symlink(path: &Path) -> Result<(), GoupError> {
    if is_symlink(path) {
        std::fs::remove_file(path)
            .map_err(|e| GoupError::io(format!("failed to replace {}", path.display()), e))?;
    }
    Ok(())
}

/// Sets the exact permission bits of an extracted directory.
#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> Result<(), GoupError> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777))
        .map_err(|e| GoupError::io(format!("failed to set permissions on {}", path.display()), e))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn apply_mode(_path: &Path, _mode: u32) -> Result<(), GoupError> {
    Ok(())
}
