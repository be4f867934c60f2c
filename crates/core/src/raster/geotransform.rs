//! Affine geotransformation and map placement bounds

use serde::{Deserialize, Serialize};

/// WGS84 semi-major axis (m)
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening
const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// Affine transformation coefficients for georeferencing rasters.
///
/// Converts between pixel coordinates (col, row) and geographic coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// In the conventional `a..f` naming, `a = pixel_width`, `b = row_rotation`,
/// `c = origin_x`, `d = col_rotation`, `e = pixel_height`, `f = origin_y`.
/// For north-up images the rotations are 0 and `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner (`c`)
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner (`f`)
    pub origin_y: f64,
    /// Pixel width (`a`)
    pub pixel_width: f64,
    /// Pixel height (`e`, usually negative)
    pub pixel_height: f64,
    /// Rotation term (`b`, usually 0)
    pub row_rotation: f64,
    /// Rotation term (`d`, usually 0)
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a new GeoTransform with no rotation (north-up image)
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Create from the six affine coefficients in `a, b, c, d, e, f` order
    pub fn from_affine(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self {
            origin_x: c,
            origin_y: f,
            pixel_width: a,
            pixel_height: e,
            row_rotation: b,
            col_rotation: d,
        }
    }

    /// Create from GDAL-style array [origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    /// Convert to GDAL-style array
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Convert pixel coordinates to geographic coordinates
    ///
    /// Returns the coordinates of the pixel center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        let col_f = col as f64 + 0.5;
        let row_f = row as f64 + 0.5;

        let x = self.origin_x + col_f * self.pixel_width + row_f * self.row_rotation;
        let y = self.origin_y + col_f * self.col_rotation + row_f * self.pixel_height;

        (x, y)
    }

    /// Get the cell size (assumes square pixels and no rotation)
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Map placement bounds of a `width` x `height` raster.
    ///
    /// ```text
    /// west  = c
    /// north = f
    /// east  = west  + a * width
    /// south = north + e * height
    /// ```
    /// Rotation terms are ignored; overlays are placed as axis-aligned images.
    pub fn bounds(&self, width: usize, height: usize) -> GeoBounds {
        let west = self.origin_x;
        let north = self.origin_y;
        GeoBounds {
            south: north + self.pixel_height * height as f64,
            west,
            north,
            east: west + self.pixel_width * width as f64,
        }
    }

    /// Whether the extent of a `width` x `height` raster plausibly lies in
    /// longitude/latitude degrees rather than a projected CRS.
    pub fn looks_geographic(&self, width: usize, height: usize) -> bool {
        let b = self.bounds(width, height);
        let lon_ok = [b.west, b.east].iter().all(|v| (-180.0..=180.0).contains(v));
        let lat_ok = [b.south, b.north].iter().all(|v| (-90.0..=90.0).contains(v));
        lon_ok && lat_ok && self.pixel_width.abs() < 1.0 && self.pixel_height.abs() < 1.0
    }

    /// Ground spacing of the raster cells in CRS units (projected rasters)
    pub fn projected_spacing(&self) -> PixelSpacing {
        PixelSpacing {
            dx: self.pixel_width.abs(),
            dy: self.pixel_height.abs(),
        }
    }

    /// Ground spacing in meters of a lon/lat raster at the center of `row`,
    /// using the WGS84 prime-vertical and meridional radii of curvature.
    pub fn geographic_spacing(&self, row: usize) -> PixelSpacing {
        let (_, lat_deg) = self.pixel_to_geo(0, row);
        let lat = lat_deg.to_radians();
        let e2 = 2.0 * WGS84_F - WGS84_F * WGS84_F;
        let w = 1.0 - e2 * lat.sin() * lat.sin();

        let n = WGS84_A / w.sqrt();
        let m = WGS84_A * (1.0 - e2) / w.powf(1.5);

        PixelSpacing {
            dx: (n * lat.cos() * self.pixel_width.to_radians()).abs(),
            dy: (m * self.pixel_height.to_radians()).abs(),
        }
    }

    /// Ground spacing at the center of `row` under `model`
    pub fn spacing(&self, model: CellSpacing, row: usize) -> PixelSpacing {
        match model {
            CellSpacing::Projected => self.projected_spacing(),
            CellSpacing::Geographic => self.geographic_spacing(row),
        }
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

/// How ground distance between cell centers is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellSpacing {
    /// Transform pixel size is already in the elevation's length unit
    #[default]
    Projected,
    /// Transform is in degrees; spacing in meters varies with latitude
    Geographic,
}

/// Ground distance between adjacent cell centers along each axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSpacing {
    /// East-West spacing
    pub dx: f64,
    /// North-South spacing
    pub dy: f64,
}

impl PixelSpacing {
    /// Distance to the neighbor at offset (`dr`, `dc`) cells
    pub fn distance(&self, dr: isize, dc: isize) -> f64 {
        (dr as f64 * self.dy).hypot(dc as f64 * self.dx)
    }

    /// Whether both axes have a usable positive length
    pub fn is_valid(&self) -> bool {
        self.dx > 0.0 && self.dy > 0.0 && self.dx.is_finite() && self.dy.is_finite()
    }
}

/// Geographic extent of an overlay image, in the raster's CRS units
/// (decimal degrees for lon/lat rasters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    /// `[[south, west], [north, east]]`, the corner-pair form web map image
    /// overlays expect.
    pub fn as_corner_pairs(&self) -> [[f64; 2]; 2] {
        [[self.south, self.west], [self.north, self.east]]
    }
}
