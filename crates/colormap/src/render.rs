//! Normalized-grid to RGBA compositing with a data-dependent alpha channel.

use serde::{Deserialize, Serialize};
use terrover_core::raster::Raster;

use crate::scheme::{ColorRamp, Rgb};
use crate::ColormapError;

/// Threshold policy deciding how opaque each normalized value is drawn.
///
/// ```text
/// v > high_threshold  -> high_alpha
/// v > low_threshold   -> mid_alpha
/// otherwise           -> 0 (transparent)
/// ```
///
/// The second band is only active when both `high_threshold` and
/// `high_alpha` are set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlphaPolicy {
    pub low_threshold: f64,
    pub mid_alpha: f64,
    pub high_threshold: Option<f64>,
    pub high_alpha: Option<f64>,
}

impl Default for AlphaPolicy {
    fn default() -> Self {
        Self {
            low_threshold: 0.25,
            mid_alpha: 0.85,
            high_threshold: None,
            high_alpha: None,
        }
    }
}

impl AlphaPolicy {
    /// Single cutoff with one flat alpha above it.
    pub fn flat(low_threshold: f64, mid_alpha: f64) -> Self {
        Self {
            low_threshold,
            mid_alpha,
            high_threshold: None,
            high_alpha: None,
        }
    }

    /// Add a second band above `threshold`.
    pub fn with_high_band(mut self, threshold: f64, alpha: f64) -> Self {
        self.high_threshold = Some(threshold);
        self.high_alpha = Some(alpha);
        self
    }

    /// Check thresholds and alphas lie in [0, 1] and the bands are ordered.
    pub fn validate(&self) -> Result<(), ColormapError> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(ColormapError::InvalidAlphaPolicy(format!(
                    "{} must be within [0, 1], got {}",
                    name, v
                )))
            }
        };

        unit("low_threshold", self.low_threshold)?;
        unit("mid_alpha", self.mid_alpha)?;
        if let Some(high) = self.high_threshold {
            unit("high_threshold", high)?;
            if high < self.low_threshold {
                return Err(ColormapError::InvalidAlphaPolicy(format!(
                    "high_threshold {} is below low_threshold {}",
                    high, self.low_threshold
                )));
            }
        }
        if let Some(alpha) = self.high_alpha {
            unit("high_alpha", alpha)?;
        }
        Ok(())
    }

    /// Alpha in [0, 1] for a normalized value. NaN is transparent.
    pub fn alpha_for(&self, v: f64) -> f64 {
        if let (Some(high), Some(alpha)) = (self.high_threshold, self.high_alpha) {
            if v > high {
                return alpha;
            }
        }
        if v > self.low_threshold {
            self.mid_alpha
        } else {
            0.0
        }
    }

    /// 8-bit alpha for a normalized value.
    pub fn alpha_byte(&self, v: f64) -> u8 {
        (self.alpha_for(v).clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

/// Convert a normalized grid to an RGBA pixel buffer.
///
/// Returns a `Vec<u8>` of length `rows * cols * 4` in row-major order,
/// one pixel per cell. Values are looked up in `ramp`; alpha comes from
/// `alpha`. Transparent pixels are written as all-zero so no color bleeds
/// through in premultiplying viewers.
pub fn compose_rgba(grid: &Raster<f64>, ramp: &ColorRamp, alpha: &AlphaPolicy) -> Vec<u8> {
    let mut rgba = vec![0u8; grid.len() * 4];

    for (pixel, &v) in rgba.chunks_exact_mut(4).zip(grid.data().iter()) {
        let a = alpha.alpha_byte(v);
        if a == 0 {
            continue;
        }
        let Rgb { r, g, b } = ramp.color_at(v);
        pixel.copy_from_slice(&[r, g, b, a]);
    }

    rgba
}
