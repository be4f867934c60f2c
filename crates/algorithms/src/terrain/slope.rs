//! Slope calculation from DEMs
//!
//! Calculates the rate of change of elevation using the Horn (1981) method,
//! which uses a 3x3 neighborhood to compute partial derivatives. Pixel
//! spacing is taken either straight from the geotransform (projected CRS)
//! or per row on the WGS84 ellipsoid (lon/lat rasters).

use ndarray::Array2;
use crate::maybe_rayon::*;
use terrover_core::raster::{CellSpacing, PixelSpacing, Raster};
use terrover_core::{Error, Result};

/// Parameters for slope calculation
#[derive(Debug, Clone)]
pub struct SlopeParams {
    /// Multiplier applied to elevation differences (vertical unit conversion)
    pub z_factor: f64,
    /// Pixel spacing model
    pub spacing: CellSpacing,
}

impl Default for SlopeParams {
    fn default() -> Self {
        Self {
            z_factor: 1.0,
            spacing: CellSpacing::Projected,
        }
    }
}

/// Calculate slope in degrees from a DEM
///
/// Uses Horn's (1981) method with a 3x3 neighborhood:
/// ```text
/// a b c
/// d e f
/// g h i
/// ```
///
/// dz/dx = ((c + 2f + i) - (a + 2d + g)) / (8 * dx)
/// dz/dy = ((g + 2h + i) - (a + 2b + c)) / (8 * dy)
/// slope = atan(sqrt(dz/dx² + dz/dy²))
///
/// Grid edges and cells with any no-data neighbor are NaN. Finite output
/// lies in [0, 90].
pub fn slope(dem: &Raster<f64>, params: SlopeParams) -> Result<Raster<f64>> {
    if !params.z_factor.is_finite() || params.z_factor <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "z_factor",
            value: params.z_factor.to_string(),
            reason: "must be finite and positive".into(),
        });
    }

    let (rows, cols) = dem.shape();
    let transform = *dem.transform();
    let z = params.z_factor;

    let spacing_at = |row: usize| transform.spacing(params.spacing, row);

    let base = spacing_at(rows / 2);
    if !base.is_valid() {
        return Err(Error::InvalidParameter {
            name: "pixel_spacing",
            value: format!("{} x {}", base.dx, base.dy),
            reason: "pixel size must be non-zero".into(),
        });
    }

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];

            // Need full 3x3 neighborhood
            if row == 0 || row + 1 >= rows {
                return row_data;
            }

            let PixelSpacing { dx, dy } = spacing_at(row);
            let eight_dx = 8.0 * dx;
            let eight_dy = 8.0 * dy;

            for col in 1..cols.saturating_sub(1) {
                let e = unsafe { dem.get_unchecked(row, col) };
                if dem.is_nodata(e) {
                    continue;
                }

                let a = unsafe { dem.get_unchecked(row - 1, col - 1) };
                let b = unsafe { dem.get_unchecked(row - 1, col) };
                let c = unsafe { dem.get_unchecked(row - 1, col + 1) };
                let d = unsafe { dem.get_unchecked(row, col - 1) };
                let f = unsafe { dem.get_unchecked(row, col + 1) };
                let g = unsafe { dem.get_unchecked(row + 1, col - 1) };
                let h = unsafe { dem.get_unchecked(row + 1, col) };
                let i = unsafe { dem.get_unchecked(row + 1, col + 1) };

                if [a, b, c, d, f, g, h, i].iter().any(|&v| dem.is_nodata(v)) {
                    continue;
                }

                let dz_dx = z * ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / eight_dx;
                let dz_dy = z * ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / eight_dy;

                let degrees = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan().to_degrees();
                row_data[col] = degrees.clamp(0.0, 90.0);
            }

            row_data
        })
        .collect();

    let mut output = dem.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use terrover_core::GeoTransform;

    fn create_test_dem() -> Raster<f64> {
        // Tilted plane: z = row + col
        let mut dem = Raster::new(10, 10);
        dem.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));
        for row in 0..10 {
            for col in 0..10 {
                dem.set(row, col, (row + col) as f64).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_slope_flat() {
        let mut dem: Raster<f64> = Raster::filled(10, 10, 100.0);
        dem.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));

        let result = slope(&dem, SlopeParams::default()).unwrap();

        for row in 1..9 {
            for col in 1..9 {
                assert_eq!(result.get(row, col).unwrap(), 0.0);
            }
        }
    }

    #[test]
    fn test_slope_tilted() {
        let dem = create_test_dem();
        let result = slope(&dem, SlopeParams::default()).unwrap();

        // |grad| = sqrt(2) for z = row + col with unit cells
        let expected = 2.0_f64.sqrt().atan().to_degrees();
        assert_relative_eq!(result.get(3, 3).unwrap(), expected, epsilon = 1e-9);
        assert_relative_eq!(result.get(5, 5).unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_slope_edges_are_nan() {
        let dem = create_test_dem();
        let result = slope(&dem, SlopeParams::default()).unwrap();

        for i in 0..10 {
            assert!(result.get(0, i).unwrap().is_nan());
            assert!(result.get(9, i).unwrap().is_nan());
            assert!(result.get(i, 0).unwrap().is_nan());
            assert!(result.get(i, 9).unwrap().is_nan());
        }
    }

    #[test]
    fn test_slope_nodata_neighborhood() {
        let mut dem = create_test_dem();
        dem.set(4, 4, -9999.0).unwrap();
        dem.set_nodata(Some(-9999.0));

        let result = slope(&dem, SlopeParams::default()).unwrap();

        assert!(result.get(4, 4).unwrap().is_nan());
        assert!(result.get(3, 5).unwrap().is_nan());
        assert!(result.get(6, 6).unwrap().is_finite());
    }

    #[test]
    fn test_slope_range_on_cliff() {
        let mut dem = create_test_dem();
        dem.set(5, 5, 1.0e9).unwrap();

        let result = slope(&dem, SlopeParams::default()).unwrap();

        for &v in result.data().iter().filter(|v| v.is_finite()) {
            assert!((0.0..=90.0).contains(&v), "slope {} out of range", v);
        }
    }

    #[test]
    fn test_slope_z_factor_scales_gradient() {
        let dem = create_test_dem();
        let params = SlopeParams { z_factor: 0.5, ..Default::default() };
        let result = slope(&dem, params).unwrap();

        let expected = (0.5 * 2.0_f64.sqrt()).atan().to_degrees();
        assert_relative_eq!(result.get(4, 4).unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_slope_geographic_spacing() {
        // 1 arc-second grid near the equator, rising 1 m per column
        let step = 1.0 / 3600.0;
        let mut dem = Raster::new(5, 5);
        dem.set_transform(GeoTransform::new(10.0, 0.001, step, -step));
        for row in 0..5 {
            for col in 0..5 {
                dem.set(row, col, col as f64).unwrap();
            }
        }

        let params = SlopeParams { spacing: CellSpacing::Geographic, ..Default::default() };
        let result = slope(&dem, params).unwrap();

        // ~30.9 m per arc-second of longitude at the equator
        let dx = dem.transform().geographic_spacing(2).dx;
        assert!((30.0..32.0).contains(&dx));
        let expected = (1.0 / dx).atan().to_degrees();
        assert_relative_eq!(result.get(2, 2).unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_slope_rejects_bad_z_factor() {
        let dem = create_test_dem();
        let params = SlopeParams { z_factor: 0.0, ..Default::default() };
        assert!(slope(&dem, params).is_err());
    }
}
