//! Color ramps and multi-stop interpolation engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ColormapError;

/// RGB color as (r, g, b) with values in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A color stop: position in [0, 1] mapped to an RGB color.
#[derive(Debug, Clone, Copy)]
pub struct ColorStop {
    pub t: f64,
    pub color: Rgb,
}

impl ColorStop {
    pub const fn new(t: f64, r: u8, g: u8, b: u8) -> Self {
        Self {
            t,
            color: Rgb::new(r, g, b),
        }
    }
}

/// Available color schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorScheme {
    /// White -> Blue (sequential, ColorBrewer)
    Blues,
    /// Red -> Yellow -> Green (diverging, ColorBrewer)
    RdYlGn,
    /// Green -> Yellow -> Brown -> White (elevation)
    Terrain,
    /// Blue -> White -> Red (divergent data)
    Divergent,
    /// Black -> White
    Grayscale,
    /// White -> Cyan -> Blue (water depth/moisture)
    Water,
    /// Yellow -> Orange -> Brown (drainage intensity)
    Accumulation,
}

impl ColorScheme {
    pub const ALL: &[ColorScheme] = &[
        Self::Blues,
        Self::RdYlGn,
        Self::Terrain,
        Self::Divergent,
        Self::Grayscale,
        Self::Water,
        Self::Accumulation,
    ];

    /// Name used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Blues => "Blues",
            Self::RdYlGn => "RdYlGn",
            Self::Terrain => "Terrain",
            Self::Divergent => "Divergent",
            Self::Grayscale => "Grayscale",
            Self::Water => "Water",
            Self::Accumulation => "Accumulation",
        }
    }

    fn stops(&self) -> Option<&'static [ColorStop]> {
        match self {
            Self::Blues => Some(BLUES_STOPS),
            Self::RdYlGn => Some(RDYLGN_STOPS),
            Self::Terrain => Some(TERRAIN_STOPS),
            Self::Divergent => Some(DIVERGENT_STOPS),
            Self::Water => Some(WATER_STOPS),
            Self::Accumulation => Some(ACCUMULATION_STOPS),
            Self::Grayscale => None,
        }
    }
}

// ─── Color stop definitions ───────────────────────────────────────────

const BLUES_STOPS: &[ColorStop] = &[
    ColorStop::new(0.000, 247, 251, 255),
    ColorStop::new(0.125, 222, 235, 247),
    ColorStop::new(0.250, 198, 219, 239),
    ColorStop::new(0.375, 158, 202, 225),
    ColorStop::new(0.500, 107, 174, 214),
    ColorStop::new(0.625, 66, 146, 198),
    ColorStop::new(0.750, 33, 113, 181),
    ColorStop::new(0.875, 8, 81, 156),
    ColorStop::new(1.000, 8, 48, 107),
];

const RDYLGN_STOPS: &[ColorStop] = &[
    ColorStop::new(0.0, 165, 0, 38),
    ColorStop::new(0.1, 215, 48, 39),
    ColorStop::new(0.2, 244, 109, 67),
    ColorStop::new(0.3, 253, 174, 97),
    ColorStop::new(0.4, 254, 224, 139),
    ColorStop::new(0.5, 255, 255, 191),
    ColorStop::new(0.6, 217, 239, 139),
    ColorStop::new(0.7, 166, 217, 106),
    ColorStop::new(0.8, 102, 189, 99),
    ColorStop::new(0.9, 26, 152, 80),
    ColorStop::new(1.0, 0, 104, 55),
];

const TERRAIN_STOPS: &[ColorStop] = &[
    ColorStop::new(0.00, 34, 139, 34),
    ColorStop::new(0.25, 144, 190, 60),
    ColorStop::new(0.50, 220, 200, 80),
    ColorStop::new(0.75, 180, 120, 60),
    ColorStop::new(1.00, 255, 255, 255),
];

const DIVERGENT_STOPS: &[ColorStop] = &[
    ColorStop::new(0.00, 44, 62, 180),
    ColorStop::new(0.25, 120, 160, 220),
    ColorStop::new(0.50, 240, 240, 240),
    ColorStop::new(0.75, 220, 120, 80),
    ColorStop::new(1.00, 180, 30, 30),
];

const WATER_STOPS: &[ColorStop] = &[
    ColorStop::new(0.00, 240, 249, 255),
    ColorStop::new(0.25, 186, 228, 250),
    ColorStop::new(0.50, 80, 180, 230),
    ColorStop::new(0.75, 30, 120, 200),
    ColorStop::new(1.00, 8, 48, 107),
];

const ACCUMULATION_STOPS: &[ColorStop] = &[
    ColorStop::new(0.00, 255, 255, 212),
    ColorStop::new(0.25, 254, 217, 142),
    ColorStop::new(0.50, 254, 153, 41),
    ColorStop::new(0.75, 204, 76, 2),
    ColorStop::new(1.00, 102, 37, 6),
];

// ─── Interpolation engine ──────────────────────────────────────────────

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_color(c1: Rgb, c2: Rgb, t: f64) -> Rgb {
    Rgb::new(
        lerp(c1.r as f64, c2.r as f64, t).round() as u8,
        lerp(c1.g as f64, c2.g as f64, t).round() as u8,
        lerp(c1.b as f64, c2.b as f64, t).round() as u8,
    )
}

fn multi_stop(stops: &[ColorStop], t: f64) -> Rgb {
    if t <= 0.0 {
        return stops[0].color;
    }
    if t >= 1.0 {
        return stops[stops.len() - 1].color;
    }
    for i in 1..stops.len() {
        if t <= stops[i].t {
            let ratio = (t - stops[i - 1].t) / (stops[i].t - stops[i - 1].t);
            return lerp_color(stops[i - 1].color, stops[i].color, ratio);
        }
    }
    stops[stops.len() - 1].color
}

/// Evaluate a color scheme at normalized position `t` ∈ [0, 1].
///
/// Out-of-range and NaN positions clamp to the nearest end.
pub fn evaluate(scheme: ColorScheme, t: f64) -> Rgb {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    match scheme.stops() {
        Some(stops) => multi_stop(stops, t),
        None => {
            let v = (t * 255.0).round() as u8;
            Rgb::new(v, v, v)
        }
    }
}

/// A named ramp, optionally reversed.
///
/// Parsed from names such as `"Blues"` or `"RdYlGn_r"`; the `_r` suffix
/// flips the ramp end for end. Matching ignores ASCII case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColorRamp {
    pub scheme: ColorScheme,
    pub reversed: bool,
}

impl ColorRamp {
    pub const fn new(scheme: ColorScheme) -> Self {
        Self { scheme, reversed: false }
    }

    pub const fn reversed(scheme: ColorScheme) -> Self {
        Self { scheme, reversed: true }
    }

    /// Color for a normalized value.
    pub fn color_at(&self, t: f64) -> Rgb {
        if self.reversed {
            evaluate(self.scheme, 1.0 - t)
        } else {
            evaluate(self.scheme, t)
        }
    }
}

impl FromStr for ColorRamp {
    type Err = ColormapError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let trimmed = name.trim();
        let (base, reversed) = match trimmed.strip_suffix("_r") {
            Some(base) => (base, true),
            None => (trimmed, false),
        };

        ColorScheme::ALL
            .iter()
            .find(|s| s.name().eq_ignore_ascii_case(base))
            .map(|&scheme| Self { scheme, reversed })
            .ok_or_else(|| ColormapError::UnknownRamp(name.to_string()))
    }
}

impl TryFrom<String> for ColorRamp {
    type Error = ColormapError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl From<ColorRamp> for String {
    fn from(ramp: ColorRamp) -> Self {
        ramp.to_string()
    }
}

impl fmt::Display for ColorRamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme.name())?;
        if self.reversed {
            f.write_str("_r")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blues_endpoints() {
        assert_eq!(evaluate(ColorScheme::Blues, 0.0), Rgb::new(247, 251, 255));
        assert_eq!(evaluate(ColorScheme::Blues, 1.0), Rgb::new(8, 48, 107));
    }

    #[test]
    fn rdylgn_midpoint_is_pale_yellow() {
        assert_eq!(evaluate(ColorScheme::RdYlGn, 0.5), Rgb::new(255, 255, 191));
    }

    #[test]
    fn grayscale_midpoint() {
        assert_eq!(evaluate(ColorScheme::Grayscale, 0.5), Rgb::new(128, 128, 128));
    }

    #[test]
    fn clamping_out_of_range() {
        assert_eq!(evaluate(ColorScheme::Terrain, -0.5), Rgb::new(34, 139, 34));
        assert_eq!(evaluate(ColorScheme::Terrain, 1.5), Rgb::new(255, 255, 255));
        assert_eq!(evaluate(ColorScheme::Terrain, f64::NAN), Rgb::new(34, 139, 34));
    }

    #[test]
    fn reversed_ramp_swaps_ends() {
        let ramp: ColorRamp = "RdYlGn_r".parse().unwrap();
        assert!(ramp.reversed);
        assert_eq!(ramp.color_at(0.0), Rgb::new(0, 104, 55));
        assert_eq!(ramp.color_at(1.0), Rgb::new(165, 0, 38));
    }

    #[test]
    fn ramp_names_parse_case_insensitively() {
        let ramp: ColorRamp = "blues".parse().unwrap();
        assert_eq!(ramp, ColorRamp::new(ColorScheme::Blues));
        assert_eq!(ramp.to_string(), "Blues");
        assert_eq!(ColorRamp::reversed(ColorScheme::RdYlGn).to_string(), "RdYlGn_r");
    }

    #[test]
    fn unknown_ramp_is_rejected() {
        let err = "viridis".parse::<ColorRamp>().unwrap_err();
        assert!(err.to_string().contains("viridis"));
    }

    #[test]
    fn every_scheme_name_parses_back() {
        for &scheme in ColorScheme::ALL {
            let ramp: ColorRamp = scheme.name().parse().unwrap();
            assert_eq!(ramp.scheme, scheme);
        }
    }
}
