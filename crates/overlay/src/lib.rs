//! # Terrover Overlay
//!
//! Turns a DEM into georeferenced, semi-transparent map overlays.
//!
//! ```text
//! accessor ──► terrain (or cache) ──► normalize ──► colormap ──► writer
//!   DEM          derived grid          [0, 1]        RGBA         PNG + bounds
//! ```
//!
//! [`OverlayPipeline::produce_overlay`] is the entry point; every stage
//! error propagates to it as an [`OverlayError`].
//!
//! ## Usage
//!
//! ```ignore
//! use terrover_overlay::{LayerKind, OverlayConfig, OverlayPipeline};
//!
//! let pipeline = OverlayPipeline::new(OverlayConfig::default(), None);
//! let product = pipeline.produce_overlay(dem, LayerKind::Slope, png)?;
//! println!("{:?}", product.bounds.as_corner_pairs());
//! ```

pub mod accessor;
pub mod cache;
pub mod config;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod terrain;
pub mod writer;

pub use accessor::{open_elevation, raster_bounds};
pub use cache::{CacheKey, ResultCache};
pub use config::{ConfigError, LayerStyle, OverlayConfig, SpacingMode, TerrainParams};
pub use error::{OverlayError, Result};
pub use normalize::{normalize, NormalizedGrid, ValueTransform};
pub use pipeline::{overlay_file_name, OverlayPipeline, OverlayProduct, OverlayStatus};
pub use terrain::{derive_layer, LayerKind, NativeTerrain, TerrainBackend};
pub use terrover_core::GeoBounds;
