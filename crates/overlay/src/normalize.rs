//! Percentile normalization of derived grids for display
//!
//! Raw min/max scaling is dominated by outliers such as the single huge
//! accumulation value at a basin outlet, so values are clipped to a
//! percentile interval before rescaling to [0, 1].

use serde::{Deserialize, Serialize};
use terrover_core::Raster;

use crate::error::{OverlayError, Result};

/// Width given to a percentile interval that collapsed to a point.
pub const DEGENERATE_WIDTH: f64 = 1e-3;

/// Monotonic transform applied before percentiles are taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueTransform {
    #[default]
    Identity,
    /// ln(1 + x), compresses long-tailed counts
    Log1p,
}

impl ValueTransform {
    pub fn apply(self, v: f64) -> f64 {
        match self {
            ValueTransform::Identity => v,
            ValueTransform::Log1p => v.ln_1p(),
        }
    }
}

/// A grid rescaled to [0, 1], with the clip interval it was scaled by.
#[derive(Debug, Clone)]
pub struct NormalizedGrid {
    /// Finite everywhere; invalid source cells are 0
    pub values: Raster<f64>,
    /// Lower clip value, in transformed units
    pub low: f64,
    /// Upper clip value, in transformed units
    pub high: f64,
}

/// Percentile of ascending `sorted` values with linear interpolation
/// between closest ranks (rank = p/100 * (n - 1)).
///
/// `p` is clamped to [0, 100]. Returns NaN for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = p.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Normalize a derived grid to [0, 1].
///
/// 1. Apply `transform`; cells that are NaN or become non-finite are invalid
/// 2. Take the `percentiles` (low, high) over valid cells only
/// 3. Widen the interval by [`DEGENERATE_WIDTH`] if high <= low
/// 4. Clip to the interval and rescale linearly; invalid cells become 0
///
/// # Errors
/// [`OverlayError::EmptyGrid`] when no cell is valid.
pub fn normalize(
    grid: &Raster<f64>,
    transform: ValueTransform,
    percentiles: (f64, f64),
) -> Result<NormalizedGrid> {
    let transformed = grid.data().mapv(|v| transform.apply(v));

    let mut valid: Vec<f64> = transformed.iter().copied().filter(|v| v.is_finite()).collect();
    if valid.is_empty() {
        let (rows, cols) = grid.shape();
        return Err(OverlayError::EmptyGrid { rows, cols });
    }
    valid.sort_unstable_by(f64::total_cmp);

    let low = percentile(&valid, percentiles.0);
    let mut high = percentile(&valid, percentiles.1);
    if high <= low {
        high = low + DEGENERATE_WIDTH;
    }
    let span = high - low;

    let scaled = transformed.mapv(|v| {
        if v.is_finite() {
            ((v.clamp(low, high) - low) / span).clamp(0.0, 1.0)
        } else {
            0.0
        }
    });

    let mut values = Raster::from_array(scaled);
    values.set_transform(*grid.transform());

    Ok(NormalizedGrid { values, low, high })
}
