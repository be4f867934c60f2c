//! Native GeoTIFF reading/writing (without GDAL dependency)
//!
//! Uses the `tiff` crate for single-band TIFF I/O and reads/writes the
//! GeoTIFF tags needed to georeference a raster:
//! ModelPixelScale + ModelTiepoint (or ModelTransformation), and GDAL_NODATA.
//! For projections and exotic layouts, enable the `gdal` feature.

use super::{GeoTiffOptions, SamplePrecision};
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{ColorType, Gray32Float, Gray64Float};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;

// `tiff` decodes the known ids into named variants, so lookups go through
// `geo_tag` and never `Tag::Unknown`
const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

/// Read a single-band GeoTIFF file into a Raster
///
/// The file handle is scoped to this call and released on every exit path.
///
/// # Errors
/// - [`Error::NotFound`] if `path` does not exist
/// - [`Error::InvalidRaster`] if the file is not a decodable single-band TIFF
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::NotFound(path.to_path_buf()));
    }
    let file = File::open(path)?;
    decode_geotiff(BufReader::new(file), band)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8], band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data), band)
}

fn geo_tag(id: u16) -> Tag {
    Tag::from_u16_exhaustive(id)
}

fn invalid(context: &str, e: impl std::fmt::Display) -> Error {
    Error::InvalidRaster(format!("{}: {}", context, e))
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect()
}

/// Internal: decode a GeoTIFF from any `Read + Seek` source
fn decode_geotiff<T, R>(reader: R, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    if band.map_or(false, |b| b != 1) {
        return Err(Error::InvalidRaster(format!(
            "band {} requested, native reader only supports band 1",
            band.unwrap_or(1)
        )));
    }

    let mut decoder = Decoder::new(reader).map_err(|e| invalid("TIFF decode error", e))?;

    match decoder.colortype().map_err(|e| invalid("cannot read color type", e))? {
        tiff::ColorType::Gray(_) => {}
        other => {
            return Err(Error::InvalidRaster(format!(
                "expected a single-band raster, found {:?}",
                other
            )))
        }
    }

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| invalid("cannot read dimensions", e))?;

    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| invalid("cannot read image data", e))?;

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }

    if let Some(nodata) = read_nodata(&mut decoder) {
        raster.set_nodata(num_traits::cast(nodata));
    }

    Ok(raster)
}

/// Read the GeoTransform from ModelPixelScale + ModelTiepoint, falling back
/// to ModelTransformation.
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(geo_tag(MODEL_PIXEL_SCALE)).ok();
    let tiepoint = decoder.get_tag_f64_vec(geo_tag(MODEL_TIEPOINT)).ok();

    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    // 4x4 row-major matrix; the first two rows carry the affine terms
    let m = decoder.get_tag_f64_vec(geo_tag(MODEL_TRANSFORMATION)).ok()?;
    if m.len() < 8 {
        return None;
    }
    Some(GeoTransform::from_affine(m[0], m[1], m[3], m[4], m[5], m[7]))
}

/// Read the GDAL_NODATA ASCII tag
fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(geo_tag(GDAL_NODATA)).ok()?;
    parse_nodata(&text)
}

fn parse_nodata(text: &str) -> Option<f64> {
    let trimmed = text.trim_matches(char::from(0)).trim();
    if trimmed.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    trimmed.parse::<f64>().ok()
}

fn format_nodata(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        value.to_string()
    }
}

/// Write a Raster to a single-band GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let mut file = File::create(path.as_ref())?;
    encode_geotiff(raster, &mut file, options.unwrap_or_default())?;
    file.sync_all()?;
    Ok(())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>, options: Option<GeoTiffOptions>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), options.unwrap_or_default())?;
    Ok(buf)
}

/// Internal: encode a Raster as GeoTIFF into any `Write + Seek` sink
fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    match options.precision {
        SamplePrecision::Single => {
            let data: Vec<f32> = raster
                .data()
                .iter()
                .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
                .collect();
            encode_band::<Gray32Float, _, _>(&mut encoder, raster, &data)
        }
        SamplePrecision::Double => {
            let data: Vec<f64> = raster
                .data()
                .iter()
                .map(|&v| v.to_f64().unwrap_or(f64::NAN))
                .collect();
            encode_band::<Gray64Float, _, _>(&mut encoder, raster, &data)
        }
    }
}

fn encode_band<C, T, W>(encoder: &mut TiffEncoder<W>, raster: &Raster<T>, data: &[C::Inner]) -> Result<()>
where
    C: ColorType,
    T: RasterElement,
    W: Write + Seek,
    [C::Inner]: TiffValue,
{
    let (rows, cols) = raster.shape();
    let tag_err = |name: &str, e: tiff::TiffError| Error::Other(format!("Cannot write {} tag: {}", name, e));

    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let gt = raster.transform();

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(geo_tag(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| tag_err("scale", e))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(geo_tag(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| tag_err("tiepoint", e))?;

    // Minimal GeoKey directory: GTModelTypeGeoKey=Projected,
    // GTRasterTypeGeoKey=RasterPixelIsArea
    let geokeys: [u16; 12] = [
        1, 1, 0, 2,
        1024, 0, 1, 1,
        1025, 0, 1, 1,
    ];
    image
        .encoder()
        .write_tag(geo_tag(GEO_KEY_DIRECTORY), &geokeys[..])
        .map_err(|e| tag_err("geokey", e))?;

    if let Some(nodata) = raster.nodata().and_then(|nd| nd.to_f64()) {
        let text = format_nodata(nodata);
        image
            .encoder()
            .write_tag(geo_tag(GDAL_NODATA), text.as_str())
            .map_err(|e| tag_err("nodata", e))?;
    }

    image
        .write_data(data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_raster() -> Raster<f64> {
        let mut raster = Raster::from_vec(vec![1.5, -9999.0, 3.25, 4.0, 5.0, 6.0], 2, 3).unwrap();
        raster.set_transform(GeoTransform::new(84.9, 22.5, 0.0002, -0.0002));
        raster.set_nodata(Some(-9999.0));
        raster
    }

    #[test]
    fn test_buffer_roundtrip_preserves_georeferencing() {
        let raster = sample_raster();
        let buf = write_geotiff_to_buffer(&raster, None).unwrap();
        let loaded: Raster<f64> = read_geotiff_from_buffer(&buf, None).unwrap();

        assert_eq!(loaded.shape(), (2, 3));
        assert_eq!(loaded.transform(), raster.transform());
        assert_eq!(loaded.nodata(), Some(-9999.0));
        assert_eq!(loaded.get(0, 2).unwrap(), 3.25);
    }

    #[test]
    fn test_double_precision_is_bit_exact() {
        let mut raster = Raster::from_vec(vec![0.1, 1.0 / 3.0, f64::NAN, 2.0e-9], 2, 2).unwrap();
        raster.set_nodata(Some(f64::NAN));

        let buf = write_geotiff_to_buffer(&raster, Some(GeoTiffOptions::lossless())).unwrap();
        let loaded: Raster<f64> = read_geotiff_from_buffer(&buf, None).unwrap();

        assert_eq!(loaded.get(0, 1).unwrap().to_bits(), (1.0_f64 / 3.0).to_bits());
        assert_eq!(loaded.get(1, 1).unwrap().to_bits(), 2.0e-9_f64.to_bits());
        assert!(loaded.get(1, 0).unwrap().is_nan());
        assert!(loaded.nodata().unwrap().is_nan());
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = read_geotiff::<f64, _>("/nonexistent/dem.tif", None).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_garbage_is_invalid_raster() {
        let err = read_geotiff_from_buffer::<f64>(b"definitely not a tiff", None).unwrap_err();
        assert!(matches!(err, Error::InvalidRaster(_)), "unexpected error: {err}");
    }

    #[test]
    fn test_parse_nodata() {
        assert_eq!(parse_nodata("-9999\0"), Some(-9999.0));
        assert!(parse_nodata("nan").unwrap().is_nan());
        assert!(parse_nodata(" NaN ").unwrap().is_nan());
        assert_eq!(parse_nodata("garbage"), None);
    }
}
