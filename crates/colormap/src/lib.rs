//! # Terrover Colormap
//!
//! Named color ramps and RGBA compositing for terrain overlays.
//!
//! A [`ColorRamp`] maps a normalized value in [0, 1] to RGB, and an
//! [`AlphaPolicy`] decides per cell how opaque it is drawn, so flat terrain
//! and negligible flow fade out while salient features stay visible. The
//! main entry point is [`compose_rgba`].
//!
//! ## Usage
//!
//! ```ignore
//! use terrover_colormap::{compose_rgba, AlphaPolicy, ColorRamp};
//!
//! let ramp: ColorRamp = "RdYlGn_r".parse()?;
//! let rgba = compose_rgba(&normalized, &ramp, &AlphaPolicy::flat(0.25, 0.85));
//! ```

mod render;
mod scheme;

pub use render::{compose_rgba, AlphaPolicy};
pub use scheme::{evaluate, ColorRamp, ColorScheme, ColorStop, Rgb};

/// Colormap configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ColormapError {
    #[error("Unknown color ramp '{0}'")]
    UnknownRamp(String),

    #[error("Invalid alpha policy: {0}")]
    InvalidAlphaPolicy(String),
}
