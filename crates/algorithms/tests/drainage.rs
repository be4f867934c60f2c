//! Drainage properties on synthetic DEMs: fill -> D8 -> accumulation

use terrover_algorithms::hydrology::{
    flow_accumulation, flow_direction, priority_flood, PriorityFloodParams,
};
use terrover_algorithms::terrain::{slope, CellSpacing, SlopeParams};
use terrover_core::raster::{d8, Raster};
use terrover_core::GeoTransform;

/// Noisy bowl with several pits, draining nowhere before filling.
fn pitted_dem(rows: usize, cols: usize) -> Raster<f64> {
    let mut dem = Raster::new(rows, cols);
    dem.set_transform(GeoTransform::new(0.0, rows as f64 * 10.0, 10.0, -10.0));
    for row in 0..rows {
        for col in 0..cols {
            let dr = row as f64 - rows as f64 / 2.0;
            let dc = col as f64 - cols as f64 / 3.0;
            let ripple = ((row * 7 + col * 13) % 11) as f64 * 0.3;
            dem.set(row, col, 50.0 + 0.05 * (dr * dr + dc * dc) + ripple).unwrap();
        }
    }
    dem
}

fn accumulate(dem: &Raster<f64>) -> (Raster<u8>, Raster<f64>) {
    let filled = priority_flood(dem, PriorityFloodParams::default()).unwrap();
    let fdir = flow_direction(&filled, CellSpacing::Projected).unwrap();
    let acc = flow_accumulation(&fdir).unwrap();
    (fdir, acc)
}

#[test]
fn filled_dem_has_no_interior_pits() {
    let dem = pitted_dem(40, 60);
    let filled = priority_flood(&dem, PriorityFloodParams::default()).unwrap();
    let fdir = flow_direction(&filled, CellSpacing::Projected).unwrap();

    for row in 1..39 {
        for col in 1..59 {
            assert_ne!(fdir.get(row, col).unwrap(), 0, "interior pit at ({}, {})", row, col);
        }
    }
}

#[test]
fn accumulation_grows_downstream() {
    let dem = pitted_dem(40, 60);
    let (fdir, acc) = accumulate(&dem);
    let (rows, cols) = fdir.shape();

    for row in 0..rows {
        for col in 0..cols {
            let here = acc.get(row, col).unwrap();
            assert!(here >= 1.0);

            let dir = fdir.get(row, col).unwrap();
            if let Some((nr, nc)) = d8::neighbor(row, col, dir, rows, cols) {
                assert!(acc.get(nr, nc).unwrap() > here);
            }
        }
    }
}

#[test]
fn outlets_account_for_every_cell() {
    let dem = pitted_dem(40, 60);
    let (fdir, acc) = accumulate(&dem);
    let (rows, cols) = fdir.shape();

    // Each cell ends at exactly one outlet, so outlet totals sum to the grid
    let mut total = 0.0;
    for row in 0..rows {
        for col in 0..cols {
            if fdir.get(row, col).unwrap() == 0 {
                total += acc.get(row, col).unwrap();
            }
        }
    }
    assert_eq!(total, (rows * cols) as f64);
}

#[test]
fn nodata_island_is_left_out_of_drainage() {
    let mut dem = pitted_dem(30, 30);
    for row in 12..16 {
        for col in 12..16 {
            dem.set(row, col, -9999.0).unwrap();
        }
    }
    dem.set_nodata(Some(-9999.0));
    let (fdir, acc) = accumulate(&dem);

    let valid = 30 * 30 - 16;
    let mut total = 0.0;
    for row in 0..30 {
        for col in 0..30 {
            let v = acc.get(row, col).unwrap();
            if (12..16).contains(&row) && (12..16).contains(&col) {
                assert!(v.is_nan());
                assert_eq!(fdir.get(row, col).unwrap(), d8::NODATA);
                continue;
            }
            let dir = fdir.get(row, col).unwrap();
            let terminal = dir == 0
                || d8::neighbor(row, col, dir, 30, 30)
                    .map_or(true, |(nr, nc)| fdir.get(nr, nc).unwrap() == d8::NODATA);
            if terminal {
                total += v;
            }
        }
    }
    assert_eq!(total, valid as f64);
}

#[test]
fn slope_stays_in_degree_range() {
    let dem = pitted_dem(40, 60);
    let result = slope(&dem, SlopeParams::default()).unwrap();

    let finite: Vec<f64> = result.data().iter().copied().filter(|v| v.is_finite()).collect();
    assert_eq!(finite.len(), 38 * 58);
    assert!(finite.iter().all(|v| (0.0..=90.0).contains(v)));
}
