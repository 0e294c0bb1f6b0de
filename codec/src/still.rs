//! Still image capture.

use crate::{mjpeg, CodecError, Frame};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Default JPEG quality for stills.
pub const DEFAULT_QUALITY: u8 = 90;

/// Write `frame` to `path` as a JPEG image.
///
/// The image is encoded and written to a temporary file beside `path`,
/// which then replaces `path`. A failure at any step leaves an existing
/// file at `path` untouched.
///
/// # Errors
///
/// Returns `CodecError::EncodingFailed` for empty or malformed frames and
/// `CodecError::Io` if the file cannot be written.
pub fn save_jpeg(frame: &Frame, path: impl AsRef<Path>, quality: u8) -> Result<(), CodecError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(CodecError::EncodingFailed("empty frame".into()));
    }
    let jpeg = mjpeg::encode_jpeg(frame, quality, false)?;

    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(&jpeg)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| CodecError::Io(e.error))?;
    log::info!(
        "Saved {}x{} still to {} ({} bytes)",
        frame.width,
        frame.height,
        path.display(),
        jpeg.len()
    );
    Ok(())
}
