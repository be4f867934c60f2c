//! GeoTIFF reading and writing using GDAL
//!
//! Same contract as the native backend, but accepts any single-band format
//! GDAL can open.

use super::{GeoTiffOptions, SamplePrecision};
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use gdal::{Dataset, DriverManager};
use std::path::Path;

/// Read a single-band raster into a Raster
///
/// # Arguments
/// * `path` - Path to the raster file
/// * `band` - Band number (1-indexed), defaults to 1
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::NotFound(path.to_path_buf()));
    }

    let dataset = Dataset::open(path).map_err(|e| Error::InvalidRaster(e.to_string()))?;
    if dataset.raster_count() < 1 {
        return Err(Error::InvalidRaster(format!("{} has no raster bands", path.display())));
    }

    let rasterband = dataset.rasterband(band.unwrap_or(1) as isize)?;
    let (cols, rows) = dataset.raster_size();

    let buffer = rasterband.read_as::<f64>((0, 0), (cols, rows), (cols, rows), None)?;
    let data: Vec<T> = buffer
        .data
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect();

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Ok(gt) = dataset.geo_transform() {
        raster.set_transform(GeoTransform::from_gdal(gt));
    }

    if let Some(nodata) = rasterband.no_data_value() {
        raster.set_nodata(num_traits::cast(nodata));
    }

    Ok(raster)
}

/// Write a Raster to a single-band GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let opts = options.unwrap_or_default();
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let (rows, cols) = raster.shape();

    let values: Vec<f64> = raster
        .data()
        .iter()
        .map(|&v| v.to_f64().unwrap_or(f64::NAN))
        .collect();

    let mut dataset = match opts.precision {
        SamplePrecision::Single => {
            driver.create_with_band_type::<f32, _>(path.as_ref(), cols as isize, rows as isize, 1)?
        }
        SamplePrecision::Double => {
            driver.create_with_band_type::<f64, _>(path.as_ref(), cols as isize, rows as isize, 1)?
        }
    };

    dataset.set_geo_transform(&raster.transform().to_gdal())?;

    let mut band = dataset.rasterband(1)?;
    if let Some(nodata) = raster.nodata().and_then(|nd| nd.to_f64()) {
        band.set_no_data_value(Some(nodata))?;
    }

    let buffer = gdal::raster::Buffer::new((cols, rows), values);
    band.write((0, 0), (cols, rows), &buffer)?;

    Ok(())
}
