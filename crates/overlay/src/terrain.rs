//! Terrain algorithm adapter
//!
//! Puts the depression-fill / D8 / accumulation / slope routines behind
//! [`TerrainBackend`] and turns their output into a derived grid that is
//! co-registered with the DEM and NaN wherever the DEM had no data.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use terrover_algorithms::hydrology::{self, PriorityFloodParams};
use terrover_algorithms::terrain::{self, CellSpacing, SlopeParams};
use terrover_core::Raster;
use tracing::debug;

use crate::config::{SpacingMode, TerrainParams};
use crate::error::{OverlayError, Result};

/// The derived layers an overlay can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    FlowAccumulation,
    Slope,
}

impl LayerKind {
    pub const ALL: [LayerKind; 2] = [LayerKind::FlowAccumulation, LayerKind::Slope];

    /// Canonical name, also used as the cache algorithm id.
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::FlowAccumulation => "flow_accumulation",
            LayerKind::Slope => "slope",
        }
    }

    /// Short tag used in overlay file names.
    pub fn file_tag(&self) -> &'static str {
        match self {
            LayerKind::FlowAccumulation => "flowacc",
            LayerKind::Slope => "slope",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flow_accumulation" | "flow-accumulation" | "flowacc" => Ok(LayerKind::FlowAccumulation),
            "slope" => Ok(LayerKind::Slope),
            other => Err(format!(
                "unknown layer '{}' (expected flow-accumulation or slope)",
                other
            )),
        }
    }
}

/// The terrain-analysis capability the pipeline consumes.
pub trait TerrainBackend {
    /// Raise sinks so every valid cell drains to the border or to no-data.
    fn fill_depressions(&self, dem: &Raster<f64>) -> terrover_core::Result<Raster<f64>>;

    /// D8 steepest-descent routing of a filled DEM.
    fn flow_direction_d8(&self, filled: &Raster<f64>, spacing: CellSpacing) -> terrover_core::Result<Raster<u8>>;

    /// Contributing cell count (self included) from D8 directions.
    fn flow_accumulation(&self, directions: &Raster<u8>) -> terrover_core::Result<Raster<f64>>;

    /// Slope in degrees.
    fn slope(&self, dem: &Raster<f64>, spacing: CellSpacing) -> terrover_core::Result<Raster<f64>>;
}

/// Backend running the in-tree `terrover-algorithms` implementations.
#[derive(Debug, Clone, Default)]
pub struct NativeTerrain {
    params: TerrainParams,
}

impl NativeTerrain {
    pub fn new(params: TerrainParams) -> Self {
        Self { params }
    }
}

impl TerrainBackend for NativeTerrain {
    fn fill_depressions(&self, dem: &Raster<f64>) -> terrover_core::Result<Raster<f64>> {
        hydrology::priority_flood(dem, PriorityFloodParams { epsilon: self.params.fill_epsilon })
    }

    fn flow_direction_d8(&self, filled: &Raster<f64>, spacing: CellSpacing) -> terrover_core::Result<Raster<u8>> {
        hydrology::flow_direction(filled, spacing)
    }

    fn flow_accumulation(&self, directions: &Raster<u8>) -> terrover_core::Result<Raster<f64>> {
        hydrology::flow_accumulation(directions)
    }

    fn slope(&self, dem: &Raster<f64>, spacing: CellSpacing) -> terrover_core::Result<Raster<f64>> {
        terrain::slope(
            dem,
            SlopeParams {
                z_factor: self.params.z_factor,
                spacing,
            },
        )
    }
}

/// Pick the pixel spacing model for a DEM.
pub fn resolve_spacing(mode: SpacingMode, dem: &Raster<f64>) -> CellSpacing {
    match mode {
        SpacingMode::Projected => CellSpacing::Projected,
        SpacingMode::Geographic => CellSpacing::Geographic,
        SpacingMode::Auto => {
            if dem.transform().looks_geographic(dem.cols(), dem.rows()) {
                CellSpacing::Geographic
            } else {
                CellSpacing::Projected
            }
        }
    }
}

/// Compute one derived layer from a masked DEM (no-data already NaN).
///
/// # Errors
/// [`OverlayError::AlgorithmFailure`] when the DEM has no valid cells, the
/// backend reports an error, or the result is not co-registered with `dem`.
pub fn derive_layer<B>(
    backend: &B,
    dem: &Raster<f64>,
    layer: LayerKind,
    spacing: CellSpacing,
) -> Result<Raster<f64>>
where
    B: TerrainBackend + ?Sized,
{
    if dem.finite_count() == 0 {
        return Err(OverlayError::AlgorithmFailure(format!(
            "{}: elevation grid has no valid cells",
            layer
        )));
    }

    let start = Instant::now();
    let mut derived = match layer {
        LayerKind::FlowAccumulation => {
            let filled = backend.fill_depressions(dem)?;
            let directions = backend.flow_direction_d8(&filled, spacing)?;
            backend.flow_accumulation(&directions)?
        }
        LayerKind::Slope => backend.slope(dem, spacing)?,
    };

    if !derived.is_coregistered(dem) {
        return Err(OverlayError::AlgorithmFailure(format!(
            "{}: result {:?} is not co-registered with the {:?} source grid",
            layer,
            derived.shape(),
            dem.shape()
        )));
    }

    // Source no-data stays NaN whatever the backend wrote there
    ndarray::Zip::from(derived.data_mut())
        .and(dem.data())
        .for_each(|out, &src| {
            if src.is_nan() {
                *out = f64::NAN;
            }
        });
    derived.set_nodata(Some(f64::NAN));

    debug!(
        layer = layer.as_str(),
        rows = dem.rows(),
        cols = dem.cols(),
        valid = derived.finite_count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "derived layer computed"
    );

    Ok(derived)
}
