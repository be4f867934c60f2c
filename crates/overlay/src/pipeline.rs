//! The `produce_overlay` entry point
//!
//! DEM → (cache | terrain adapter) → normalizer → compositor → PNG + bounds.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use serde_json::json;
use terrover_colormap::compose_rgba;
use terrover_core::{GeoBounds, Raster};
use tracing::{debug, info, warn};

use crate::accessor::open_elevation;
use crate::cache::{CacheKey, ResultCache};
use crate::config::OverlayConfig;
use crate::error::Result;
use crate::normalize::normalize;
use crate::terrain::{derive_layer, resolve_spacing, LayerKind, NativeTerrain, TerrainBackend};
use crate::writer::write_png;

/// A written overlay and where it goes on the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayProduct {
    pub png_path: PathBuf,
    pub bounds: GeoBounds,
    pub layer: LayerKind,
    /// Clip interval the layer was normalized with, in transformed units
    pub clip: (f64, f64),
}

/// Outcome of an overlay request as a UI shell should present it.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayStatus {
    Ready(OverlayProduct),
    /// Show the base map without this layer and surface `message`
    Unavailable { layer: LayerKind, message: String },
}

/// Produces overlays with a fixed configuration and backend.
pub struct OverlayPipeline<B = NativeTerrain> {
    config: OverlayConfig,
    backend: B,
    cache: Option<ResultCache>,
}

impl OverlayPipeline<NativeTerrain> {
    /// Pipeline over the built-in terrain algorithms.
    pub fn new(config: OverlayConfig, cache: Option<ResultCache>) -> Self {
        let backend = NativeTerrain::new(config.terrain.clone());
        Self::with_backend(config, backend, cache)
    }
}

impl<B: TerrainBackend> OverlayPipeline<B> {
    pub fn with_backend(config: OverlayConfig, backend: B, cache: Option<ResultCache>) -> Self {
        Self {
            config,
            backend,
            cache,
        }
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }

    /// Load the DEM at `raster_path` and compute (or fetch from cache) `layer`.
    ///
    /// Returns the masked DEM alongside the derived grid.
    pub fn derive(&self, raster_path: &Path, layer: LayerKind) -> Result<(Raster<f64>, Raster<f64>)> {
        // The key stamps the source before it is read
        let key = match &self.cache {
            Some(_) => Some(CacheKey::new(raster_path, layer.as_str(), self.cache_params(layer))?),
            None => None,
        };

        let dem = open_elevation(raster_path)?;
        let spacing = resolve_spacing(self.config.terrain.spacing, &dem);

        let compute = || derive_layer(&self.backend, &dem, layer, spacing);
        let derived = match (&self.cache, &key) {
            (Some(cache), Some(key)) => cache.get_or_compute(key, &dem, compute)?,
            _ => compute()?,
        };

        Ok((dem, derived))
    }

    /// Algorithm parameters that change the derived grid.
    ///
    /// `auto` spacing resolves from the DEM itself, so the configured mode
    /// identifies the result as well as the resolved one.
    fn cache_params(&self, layer: LayerKind) -> serde_json::Value {
        let terrain = &self.config.terrain;
        match layer {
            LayerKind::FlowAccumulation => json!({
                "fill_epsilon": terrain.fill_epsilon,
                "spacing": terrain.spacing,
            }),
            LayerKind::Slope => json!({
                "z_factor": terrain.z_factor,
                "spacing": terrain.spacing,
            }),
        }
    }

    /// Render `layer` of the DEM at `raster_path` into a PNG at `png_path`.
    ///
    /// Every failure propagates; use [`overlay_status`](Self::overlay_status)
    /// when a missing overlay should degrade instead.
    pub fn produce_overlay(
        &self,
        raster_path: &Path,
        layer: LayerKind,
        png_path: &Path,
    ) -> Result<OverlayProduct> {
        let start = Instant::now();
        let style = self.config.style(layer);

        let (dem, derived) = self.derive(raster_path, layer)?;
        let normalized = normalize(&derived, style.transform, style.percentiles)?;
        debug!(
            layer = layer.as_str(),
            low = normalized.low,
            high = normalized.high,
            "normalized"
        );

        let rgba = compose_rgba(&normalized.values, &style.ramp, &style.alpha);
        write_png(png_path, dem.cols(), dem.rows(), &rgba)?;

        let product = OverlayProduct {
            png_path: png_path.to_path_buf(),
            bounds: dem.bounds(),
            layer,
            clip: (normalized.low, normalized.high),
        };

        info!(
            layer = layer.as_str(),
            png = %png_path.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "overlay produced"
        );
        Ok(product)
    }

    /// Like [`produce_overlay`](Self::produce_overlay), but a failure
    /// becomes [`OverlayStatus::Unavailable`] with a displayable message.
    pub fn overlay_status(&self, raster_path: &Path, layer: LayerKind, png_path: &Path) -> OverlayStatus {
        match self.produce_overlay(raster_path, layer, png_path) {
            Ok(product) => OverlayStatus::Ready(product),
            Err(err) => {
                warn!(layer = layer.as_str(), error = %err, "overlay unavailable");
                OverlayStatus::Unavailable {
                    layer,
                    message: format!("{} overlay unavailable: {}", layer, err),
                }
            }
        }
    }
}

/// Conventional overlay file name for a DEM, e.g. `bolani_flowacc_overlay.png`.
pub fn overlay_file_name(raster_path: &Path, layer: LayerKind) -> String {
    let stem = raster_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dem".to_string());
    format!("{}_{}_overlay.png", stem, layer.file_tag())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_names_follow_layer_tag() {
        let dem = Path::new("/data/bolani_dem.tif");
        assert_eq!(
            overlay_file_name(dem, LayerKind::FlowAccumulation),
            "bolani_dem_flowacc_overlay.png"
        );
        assert_eq!(overlay_file_name(dem, LayerKind::Slope), "bolani_dem_slope_overlay.png");
    }

    #[test]
    fn missing_raster_degrades_to_unavailable() {
        let pipeline = OverlayPipeline::new(OverlayConfig::default(), None);
        let status = pipeline.overlay_status(
            Path::new("/nonexistent/dem.tif"),
            LayerKind::Slope,
            Path::new("/tmp/never.png"),
        );

        match status {
            OverlayStatus::Unavailable { layer, message } => {
                assert_eq!(layer, LayerKind::Slope);
                assert!(message.contains("not found"), "{}", message);
            }
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }
}
