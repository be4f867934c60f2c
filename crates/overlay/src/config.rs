//! Explicit overlay configuration
//!
//! Every tunable of the pipeline (algorithm parameters, ramps, percentiles,
//! alpha policies) lives in [`OverlayConfig`]. It loads from JSON; any key
//! left out takes the per-layer default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use terrover_colormap::{AlphaPolicy, ColorRamp, ColorScheme};

use crate::normalize::ValueTransform;
use crate::terrain::LayerKind;

/// Configuration loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How slope obtains ground distance between cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpacingMode {
    /// Geographic when the extent fits lon/lat ranges with sub-degree pixels
    #[default]
    Auto,
    Projected,
    Geographic,
}

/// Parameters handed to the terrain algorithms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TerrainParams {
    /// Priority-Flood gradient increment
    pub fill_epsilon: f64,
    /// Vertical unit multiplier for slope
    pub z_factor: f64,
    pub spacing: SpacingMode,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            fill_epsilon: 1e-5,
            z_factor: 1.0,
            spacing: SpacingMode::Auto,
        }
    }
}

/// How one derived layer is normalized and drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStyle {
    pub ramp: ColorRamp,
    pub transform: ValueTransform,
    /// (low, high) percentiles in [0, 100]
    pub percentiles: (f64, f64),
    pub alpha: AlphaPolicy,
}

impl LayerStyle {
    /// Blues on log-scaled counts; only the channel network shows.
    pub fn flow_accumulation() -> Self {
        Self {
            ramp: ColorRamp::new(ColorScheme::Blues),
            transform: ValueTransform::Log1p,
            percentiles: (60.0, 99.5),
            alpha: AlphaPolicy::flat(0.25, 0.85).with_high_band(0.5, 0.85),
        }
    }

    /// Reversed red-yellow-green on degrees; near-flat ground hidden.
    pub fn slope() -> Self {
        Self {
            ramp: ColorRamp::reversed(ColorScheme::RdYlGn),
            transform: ValueTransform::Identity,
            percentiles: (2.0, 98.0),
            alpha: AlphaPolicy::flat(0.2, 0.75).with_high_band(0.6, 0.75),
        }
    }

    pub fn default_for(layer: LayerKind) -> Self {
        match layer {
            LayerKind::FlowAccumulation => Self::flow_accumulation(),
            LayerKind::Slope => Self::slope(),
        }
    }

    fn validate(&self, layer: LayerKind) -> Result<(), ConfigError> {
        let (low, high) = self.percentiles;
        let in_range = |p: f64| (0.0..=100.0).contains(&p);
        if !in_range(low) || !in_range(high) || low >= high {
            return Err(ConfigError::Invalid(format!(
                "{}: percentiles ({}, {}) must satisfy 0 <= low < high <= 100",
                layer, low, high
            )));
        }
        self.alpha
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("{}: {}", layer, e)))
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConfigFile")]
pub struct OverlayConfig {
    pub terrain: TerrainParams,
    pub flow_accumulation: LayerStyle,
    pub slope: LayerStyle,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            terrain: TerrainParams::default(),
            flow_accumulation: LayerStyle::flow_accumulation(),
            slope: LayerStyle::slope(),
        }
    }
}

impl OverlayConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse and validate JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn style(&self, layer: LayerKind) -> &LayerStyle {
        match layer {
            LayerKind::FlowAccumulation => &self.flow_accumulation,
            LayerKind::Slope => &self.slope,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.terrain;
        if !t.fill_epsilon.is_finite() || t.fill_epsilon < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "fill_epsilon must be finite and non-negative, got {}",
                t.fill_epsilon
            )));
        }
        if !t.z_factor.is_finite() || t.z_factor <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "z_factor must be finite and positive, got {}",
                t.z_factor
            )));
        }
        self.flow_accumulation.validate(LayerKind::FlowAccumulation)?;
        self.slope.validate(LayerKind::Slope)
    }
}

// On-disk form: every key optional, merged over the per-layer defaults.

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    terrain: TerrainParams,
    flow_accumulation: StyleOverrides,
    slope: StyleOverrides,
}

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct StyleOverrides {
    ramp: Option<ColorRamp>,
    transform: Option<ValueTransform>,
    percentiles: Option<(f64, f64)>,
    alpha: AlphaOverrides,
}

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct AlphaOverrides {
    low_threshold: Option<f64>,
    mid_alpha: Option<f64>,
    high_threshold: Option<f64>,
    high_alpha: Option<f64>,
}

impl StyleOverrides {
    fn apply(self, mut style: LayerStyle) -> LayerStyle {
        if let Some(ramp) = self.ramp {
            style.ramp = ramp;
        }
        if let Some(transform) = self.transform {
            style.transform = transform;
        }
        if let Some(percentiles) = self.percentiles {
            style.percentiles = percentiles;
        }
        let a = self.alpha;
        style.alpha.low_threshold = a.low_threshold.unwrap_or(style.alpha.low_threshold);
        style.alpha.mid_alpha = a.mid_alpha.unwrap_or(style.alpha.mid_alpha);
        style.alpha.high_threshold = a.high_threshold.or(style.alpha.high_threshold);
        style.alpha.high_alpha = a.high_alpha.or(style.alpha.high_alpha);
        style
    }
}

impl From<ConfigFile> for OverlayConfig {
    fn from(file: ConfigFile) -> Self {
        Self {
            terrain: file.terrain,
            flow_accumulation: file.flow_accumulation.apply(LayerStyle::flow_accumulation()),
            slope: file.slope.apply(LayerStyle::slope()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_differ_per_layer() {
        let config = OverlayConfig::default();
        assert!(config.validate().is_ok());

        let flow = config.style(LayerKind::FlowAccumulation);
        assert_eq!(flow.ramp.to_string(), "Blues");
        assert_eq!(flow.transform, ValueTransform::Log1p);
        assert_eq!(flow.percentiles, (60.0, 99.5));
        assert_eq!(flow.alpha.low_threshold, 0.25);

        let slope = config.style(LayerKind::Slope);
        assert_eq!(slope.ramp.to_string(), "RdYlGn_r");
        assert_eq!(slope.percentiles, (2.0, 98.0));
        assert_eq!(slope.alpha.high_threshold, Some(0.6));
    }

    #[test]
    fn empty_json_is_default() {
        let config = OverlayConfig::from_json("{}").unwrap();
        assert_eq!(config, OverlayConfig::default());
    }

    #[test]
    fn partial_override_keeps_layer_defaults() {
        let json = r#"{
            "terrain": { "z_factor": 2.0 },
            "slope": { "ramp": "Terrain", "alpha": { "low_threshold": 0.4 } }
        }"#;
        let config = OverlayConfig::from_json(json).unwrap();

        assert_eq!(config.terrain.z_factor, 2.0);
        assert_eq!(config.terrain.fill_epsilon, 1e-5);
        assert_eq!(config.slope.ramp.to_string(), "Terrain");
        assert_eq!(config.slope.alpha.low_threshold, 0.4);
        assert_eq!(config.slope.alpha.mid_alpha, 0.75);
        assert_eq!(config.slope.percentiles, (2.0, 98.0));
        assert_eq!(config.flow_accumulation, LayerStyle::flow_accumulation());
    }

    #[test]
    fn serialized_config_loads_back() {
        let mut config = OverlayConfig::default();
        config.terrain.spacing = SpacingMode::Geographic;
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(OverlayConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn rejects_bad_values() {
        let cases = [
            r#"{"slope": {"ramp": "viridis"}}"#,
            r#"{"slope": {"percentiles": [98, 2]}}"#,
            r#"{"flow_accumulation": {"percentiles": [0, 101]}}"#,
            r#"{"flow_accumulation": {"alpha": {"mid_alpha": 1.5}}}"#,
            r#"{"terrain": {"z_factor": 0}}"#,
            r#"{"terrain": {"fill_epsilon": -1}}"#,
            r#"{"terrain": {"spacing": "polar"}}"#,
            r#"{"unknown_layer": {}}"#,
        ];
        for json in cases {
            assert!(OverlayConfig::from_json(json).is_err(), "accepted {}", json);
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = OverlayConfig::load("/nonexistent/terrover.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
