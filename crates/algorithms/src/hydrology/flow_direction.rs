//! D8 flow direction algorithm
//!
//! Routes each cell to its steepest downslope neighbor using the D8
//! (deterministic eight-node) method. Encoding follows
//! [`terrover_core::raster::d8`]:
//! ```text
//!   4  3  2
//!   5  0  1
//!   6  7  8
//! ```
//! 0 = outlet/pit, 1-8 = direction, 255 = no-data.

use ndarray::Array2;
use crate::maybe_rayon::*;
use terrover_core::raster::{d8, CellSpacing, Raster};
use terrover_core::{Error, Result};

/// Calculate D8 flow direction from a DEM.
///
/// Drops are scored against the ground distance to each neighbor, taken
/// from `spacing` per row, so lon/lat rasters weigh the shorter east-west
/// step correctly.
///
/// The input DEM should be hydrologically conditioned (depressions filled);
/// otherwise pits terminate flow early.
///
/// Ties between equally steep neighbors resolve to the lowest direction code,
/// so the result is deterministic.
///
/// # Returns
/// Raster<u8> with flow direction codes, no-data declared as [`d8::NODATA`]
pub fn flow_direction(dem: &Raster<f64>, spacing: CellSpacing) -> Result<Raster<u8>> {
    let (rows, cols) = dem.shape();
    let transform = *dem.transform();

    let base = transform.spacing(spacing, rows / 2);
    if !base.is_valid() {
        return Err(Error::InvalidParameter {
            name: "pixel_spacing",
            value: format!("{} x {}", base.dx, base.dy),
            reason: "pixel size must be non-zero".into(),
        });
    }

    let output_data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![0u8; cols];

            let ground = transform.spacing(spacing, row);
            let mut distances = [0.0_f64; 9];
            for (dir, &(dr, dc)) in d8::OFFSETS.iter().enumerate().skip(1) {
                distances[dir] = ground.distance(dr, dc);
            }

            for col in 0..cols {
                let center = unsafe { dem.get_unchecked(row, col) };

                if dem.is_nodata(center) {
                    row_data[col] = d8::NODATA;
                    continue;
                }

                let mut max_drop = 0.0_f64;
                let mut best_dir: u8 = 0;

                for dir in 1..=8u8 {
                    let Some((nr, nc)) = d8::neighbor(row, col, dir, rows, cols) else {
                        continue;
                    };

                    let neighbor = unsafe { dem.get_unchecked(nr, nc) };
                    if dem.is_nodata(neighbor) {
                        continue;
                    }

                    let drop = (center - neighbor) / distances[dir as usize];
                    if drop > max_drop {
                        max_drop = drop;
                        best_dir = dir;
                    }
                }

                row_data[col] = best_dir;
            }

            row_data
        })
        .collect();

    let mut output = dem.with_same_meta::<u8>(rows, cols);
    output.set_nodata(Some(d8::NODATA));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrover_core::GeoTransform;

    fn dem_from_fn(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
        let mut dem = Raster::new(rows, cols);
        dem.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        for row in 0..rows {
            for col in 0..cols {
                dem.set(row, col, f(row, col)).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_flow_direction_slope_east() {
        let dem = dem_from_fn(5, 5, |_, col| (5 - col) as f64 * 10.0);
        let fdir = flow_direction(&dem, CellSpacing::Projected).unwrap();
        assert_eq!(fdir.get(2, 2).unwrap(), 1, "Expected flow direction E (1)");
    }

    #[test]
    fn test_flow_direction_slope_south() {
        let dem = dem_from_fn(5, 5, |row, _| (5 - row) as f64 * 10.0);
        let fdir = flow_direction(&dem, CellSpacing::Projected).unwrap();
        assert_eq!(fdir.get(2, 2).unwrap(), 7, "Expected flow direction S (7)");
    }

    #[test]
    fn test_flow_direction_diagonal() {
        let dem = dem_from_fn(5, 5, |row, col| (10 - row - col) as f64 * 10.0);
        let fdir = flow_direction(&dem, CellSpacing::Projected).unwrap();
        assert_eq!(fdir.get(2, 2).unwrap(), 8, "Expected flow direction SE (8)");
    }

    #[test]
    fn test_flow_direction_pit() {
        let mut dem = dem_from_fn(5, 5, |_, _| 10.0);
        dem.set(2, 2, 1.0).unwrap();
        let fdir = flow_direction(&dem, CellSpacing::Projected).unwrap();
        assert_eq!(fdir.get(2, 2).unwrap(), 0, "Expected pit (0)");
    }

    #[test]
    fn test_flow_direction_nodata() {
        let mut dem = dem_from_fn(3, 3, |row, _| (3 - row) as f64);
        dem.set(1, 1, f64::NAN).unwrap();

        let fdir = flow_direction(&dem, CellSpacing::Projected).unwrap();

        assert_eq!(fdir.get(1, 1).unwrap(), d8::NODATA);
        assert_eq!(fdir.nodata(), Some(d8::NODATA));
        // (0,1) cannot route through the hole; it picks a valid diagonal
        let dir = fdir.get(0, 1).unwrap();
        assert!(dir == 6 || dir == 8, "got {}", dir);
    }

    #[test]
    fn test_flow_direction_weighs_geographic_spacing() {
        // At 60N an east step is about half a north-south step on the ground
        let mut dem = Raster::filled(5, 5, 10.0);
        dem.set_transform(GeoTransform::new(10.0, 60.0, 0.0002, -0.0002));
        dem.set(2, 3, 9.0).unwrap();
        dem.set(3, 2, 8.8).unwrap();

        let projected = flow_direction(&dem, CellSpacing::Projected).unwrap();
        let geographic = flow_direction(&dem, CellSpacing::Geographic).unwrap();

        assert_eq!(projected.get(2, 2).unwrap(), 7);
        assert_eq!(geographic.get(2, 2).unwrap(), 1);
    }

    #[test]
    fn test_flow_direction_rejects_zero_pixel_size() {
        let mut dem = dem_from_fn(3, 3, |row, _| row as f64);
        dem.set_transform(GeoTransform::new(0.0, 0.0, 0.0, -1.0));
        assert!(flow_direction(&dem, CellSpacing::Projected).is_err());
    }
}
