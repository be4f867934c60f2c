//! Raster accessor: open a DEM as a masked `f64` elevation grid

use std::path::Path;

use terrover_core::io::read_geotiff;
use terrover_core::{GeoBounds, Raster};
use tracing::debug;

use crate::error::{OverlayError, Result};

/// Read band 1 of `path` as elevation.
///
/// Cells equal to the declared no-data sentinel are turned into NaN before
/// anything else sees them. The file is closed before this returns.
///
/// # Errors
/// - [`OverlayError::RasterNotFound`] if `path` does not exist
/// - [`OverlayError::InvalidRaster`] if it is not a readable single-band raster
pub fn open_elevation(path: &Path) -> Result<Raster<f64>> {
    let mut dem: Raster<f64> =
        read_geotiff(path, None).map_err(|e| OverlayError::from_read(path, e))?;

    if dem.is_empty() {
        return Err(OverlayError::InvalidRaster {
            path: path.to_path_buf(),
            reason: "raster has no cells".into(),
        });
    }

    let declared = dem.nodata();
    dem.mask_nodata();

    debug!(
        path = %path.display(),
        rows = dem.rows(),
        cols = dem.cols(),
        nodata = ?declared,
        valid = dem.finite_count(),
        "elevation grid loaded"
    );

    Ok(dem)
}

/// Map placement bounds of a raster without deriving anything from it.
pub fn raster_bounds(path: &Path) -> Result<GeoBounds> {
    open_elevation(path).map(|dem| dem.bounds())
}
