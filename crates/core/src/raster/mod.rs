//! Raster data structures and georeferencing

pub mod d8;
mod element;
mod geotransform;
mod grid;

pub use element::RasterElement;
pub use geotransform::{CellSpacing, GeoBounds, GeoTransform, PixelSpacing};
pub use grid::{Raster, RasterStatistics};
