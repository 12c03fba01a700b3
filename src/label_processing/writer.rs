use image::{GrayImage, ImageFormat};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use crate::error::LabelError;

/// Encode a label image and replace `path` with it atomically
///
/// The image is encoded in memory using the format implied by the file
/// extension, written to a temporary file in the destination directory and
/// renamed over the destination. An existing file is overwritten; a failed or
/// interrupted write never leaves a truncated image at `path`.
pub fn write_label_image(path: &Path, img: &GrayImage) -> Result<(), LabelError> {
    let format = ImageFormat::from_path(path).map_err(|source| LabelError::ImageEncode {
        path: path.to_path_buf(),
        source,
    })?;

    let mut encoded = Cursor::new(Vec::new());
    img.write_to(&mut encoded, format)
        .map_err(|source| LabelError::ImageEncode {
            path: path.to_path_buf(),
            source,
        })?;

    write_atomic(path, encoded.get_ref())
}

/// Write bytes through a temporary sibling file and rename into place
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), LabelError> {
    let write_error = |source: std::io::Error| LabelError::Write {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    // create_dir_all succeeds when another worker created the directory first
    fs::create_dir_all(parent).map_err(write_error)?;

    let mut builder = tempfile::Builder::new();
    builder.prefix(".seglabel-").suffix(".tmp");
    #[cfg(unix)]
    builder.permissions(output_permissions(path));

    let mut temp = builder.tempfile_in(parent).map_err(write_error)?;
    temp.write_all(bytes).map_err(write_error)?;
    temp.as_file().sync_all().map_err(write_error)?;
    temp.persist(path).map_err(|err| write_error(err.error))?;

    Ok(())
}

/// Mode for the replacement file: the destination's current mode, or what
/// `File::create` would use (0o666 before umask) for a new file
#[cfg(unix)]
fn output_permissions(path: &Path) -> fs::Permissions {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|metadata| metadata.permissions())
        .unwrap_or_else(|_| fs::Permissions::from_mode(0o666))
}
