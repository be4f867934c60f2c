//! # Terrover Core
//!
//! Core types and I/O for terrover terrain overlays.
//!
//! This crate provides:
//! - `Raster<T>`: Generic raster grid type with no-data handling
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `GeoBounds`: South/west/north/east extent used to place overlays on a map
//! - D8 direction encoding shared by the hydrology algorithms
//! - GeoTIFF reading and writing

pub mod error;
pub mod io;
pub mod raster;

pub use error::{Error, Result};
pub use raster::{CellSpacing, GeoBounds, GeoTransform, PixelSpacing, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::raster::{CellSpacing, GeoBounds, GeoTransform, PixelSpacing, Raster, RasterElement};
}

