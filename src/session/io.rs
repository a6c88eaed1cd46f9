//! File I/O for loaded media files.
//!
//! Each call opens, fully reads or writes, and closes the file before
//! returning, on every path including errors.

use std::fs;
use std::io;
use std::path::Path;

use crate::session::SessionError;

/// Check that `path` names an existing regular file with an accepted
/// extension.
pub(crate) fn check_media(path: &Path, extensions: &[String]) -> Result<(), SessionError> {
    if !path.is_file() {
        return Err(SessionError::NotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(&extension)) {
        return Err(SessionError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
        });
    }
    Ok(())
}

/// Read the whole file.
pub(crate) fn read_media(path: &Path) -> Result<Vec<u8>, SessionError> {
    fs::read(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => SessionError::NotFound(path.to_path_buf()),
        _ => SessionError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

/// Replace the file's contents with `bytes`.
pub(crate) fn write_media(path: &Path, bytes: &[u8]) -> Result<(), SessionError> {
    fs::write(path, bytes).map_err(|source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("Wrote {} byte(s) to {}", bytes.len(), path.display());
    Ok(())
}
