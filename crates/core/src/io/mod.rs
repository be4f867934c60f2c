//! I/O operations for reading and writing georeferenced rasters

#[cfg(feature = "gdal")]
mod gdal_io;
mod native;

#[cfg(feature = "gdal")]
pub use gdal_io::{read_geotiff, write_geotiff};

#[cfg(not(feature = "gdal"))]
pub use native::{read_geotiff, write_geotiff};

// Buffer-based I/O (always available, no filesystem dependency)
pub use native::{read_geotiff_from_buffer, write_geotiff_to_buffer};

/// Sample type written to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplePrecision {
    /// 32-bit float (compact, enough for display layers)
    #[default]
    Single,
    /// 64-bit float (bit-exact round trip of `Raster<f64>`)
    Double,
}

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    pub precision: SamplePrecision,
}

impl GeoTiffOptions {
    /// Options for a lossless round trip of `f64` rasters
    pub fn lossless() -> Self {
        Self {
            precision: SamplePrecision::Double,
        }
    }
}
