//! Terrain analysis algorithms
//!
//! - Slope: Horn (1981) gradient in degrees, projected or ellipsoidal spacing

mod slope;

pub use slope::{slope, SlopeParams};
pub use terrover_core::raster::CellSpacing;
