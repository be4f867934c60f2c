//! Georeferenced overlay writer
//!
//! Persists an RGBA buffer as an 8-bit PNG. Georeferencing travels beside
//! the image as [`GeoBounds`], computed from the source transform.

use std::io::BufWriter;
use std::path::Path;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{OverlayError, Result};

/// Write `rgba` (row-major, 4 bytes per pixel) as a lossless PNG at `path`.
///
/// The image is encoded into a temporary file next to `path` and renamed
/// over it, so readers never see a partial PNG.
///
/// # Errors
/// [`OverlayError::WriteFailure`] when the buffer does not match the
/// dimensions, the parent directory is missing, or the file cannot be written.
pub fn write_png(path: &Path, width: usize, height: usize, rgba: &[u8]) -> Result<()> {
    if rgba.len() != width * height * 4 {
        return Err(OverlayError::write_failure(
            path,
            format!("buffer holds {} bytes, expected {}x{}x4", rgba.len(), width, height),
        ));
    }
    let (w, h) = match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => return Err(OverlayError::write_failure(path, "image too large for PNG")),
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(OverlayError::write_failure(
            path,
            format!("directory {} does not exist", parent.display()),
        ));
    }

    let tmp = NamedTempFile::new_in(parent).map_err(|e| OverlayError::write_failure(path, e))?;
    {
        let mut out = BufWriter::new(tmp.as_file());
        PngEncoder::new(&mut out)
            .write_image(rgba, w, h, ExtendedColorType::Rgba8)
            .map_err(|e| OverlayError::write_failure(path, e))?;
        std::io::Write::flush(&mut out).map_err(|e| OverlayError::write_failure(path, e))?;
    }
    tmp.persist(path)
        .map_err(|e| OverlayError::write_failure(path, e.error))?;

    debug!(path = %path.display(), width, height, "overlay png written");
    Ok(())
}
