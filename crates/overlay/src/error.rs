//! Error taxonomy of the overlay pipeline

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Everything that can stop an overlay from being produced.
#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("raster not found: {}", .0.display())]
    RasterNotFound(PathBuf),

    #[error("invalid raster {}: {reason}", path.display())]
    InvalidRaster { path: PathBuf, reason: String },

    #[error("terrain algorithm failed: {0}")]
    AlgorithmFailure(String),

    #[error("grid of {rows}x{cols} cells has no finite values")]
    EmptyGrid { rows: usize, cols: usize },

    #[error("cannot write {}: {reason}", path.display())]
    WriteFailure { path: PathBuf, reason: String },

    /// Recovered inside the cache as a miss; never returned by the pipeline.
    #[error("corrupt cache entry {}: {reason}", path.display())]
    CacheCorrupt { path: PathBuf, reason: String },
}

impl OverlayError {
    pub(crate) fn write_failure(path: &Path, reason: impl ToString) -> Self {
        OverlayError::WriteFailure {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn cache_corrupt(path: &Path, reason: impl ToString) -> Self {
        OverlayError::CacheCorrupt {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Map a core read error for `path` onto the taxonomy.
    pub(crate) fn from_read(path: &Path, err: terrover_core::Error) -> Self {
        match err {
            terrover_core::Error::NotFound(p) => OverlayError::RasterNotFound(p),
            terrover_core::Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                OverlayError::RasterNotFound(path.to_path_buf())
            }
            other => OverlayError::InvalidRaster {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        }
    }
}

impl From<terrover_core::Error> for OverlayError {
    fn from(err: terrover_core::Error) -> Self {
        OverlayError::AlgorithmFailure(err.to_string())
    }
}

/// Result type alias for overlay operations
pub type Result<T> = std::result::Result<T, OverlayError>;
