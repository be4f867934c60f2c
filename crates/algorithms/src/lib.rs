//! # Terrover Algorithms
//!
//! Terrain-analysis algorithms behind the overlay pipeline.
//!
//! ## Available Algorithm Categories
//!
//! - **hydrology**: Priority-Flood fill, D8 flow direction, flow accumulation
//! - **terrain**: Slope

pub mod hydrology;
pub mod terrain;

mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::hydrology::{flow_accumulation, flow_direction, priority_flood, PriorityFloodParams};
    pub use crate::terrain::{slope, SlopeParams};
    pub use terrover_core::prelude::*;
}
