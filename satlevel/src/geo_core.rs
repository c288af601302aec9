use geo::{coord, Point, Rect};
use proj::Proj;
use std::fmt;

use crate::error::{Result, SatlevelError};

/// Coordinate reference system identified by its EPSG authority code.
/// Two CRS values are equal iff their codes match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crs {
    epsg: u32,
}

impl Crs {
    /// WGS84 geographic coordinates, the CRS of every bounding box leaving this crate
    pub const WGS84: Crs = Crs { epsg: 4326 };

    pub const fn from_epsg(epsg: u32) -> Self {
        Crs { epsg }
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    fn definition(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

/// Axis-aligned bounding box.
/// For geographic CRSs `x` is longitude and `y` is latitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64, // min longitude
    pub min_y: f64, // min latitude
    pub max_x: f64, // max longitude
    pub max_y: f64, // max latitude
}

impl BoundingBox {
    /// Build a box from its bounds. Bounds given in the wrong order are swapped so that
    /// `min_x <= max_x` and `min_y <= max_y` always hold.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox::from_corners((min_x, min_y), (max_x, max_y))
    }

    /// Build a box from two opposite corners given as `(x, y)` pairs, in any order
    pub fn from_corners(a: (f64, f64), b: (f64, f64)) -> Self {
        BoundingBox {
            min_x: a.0.min(b.0),
            min_y: a.1.min(b.1),
            max_x: a.0.max(b.0),
            max_y: a.1.max(b.1),
        }
    }

    /// Build a box from an OGR-style envelope `(min_x, max_x, min_y, max_y)`
    pub fn from_envelope(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        BoundingBox::new(min_x, min_y, max_x, max_y)
    }

    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Render as the `bbox` query parameter: `min_x,min_y,max_x,max_y`
    pub fn to_query_param(&self) -> String {
        format!("{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.min_x, y: self.min_y },
            coord! { x: self.max_x, y: self.max_y },
        )
    }

    /// Transform bounding box to another CRS by reprojecting its two diagonal corners
    pub fn transform(&self, from: Crs, to: Crs) -> Result<Self> {
        CoordinateTransformer::new(from, to)?.transform_bbox(self)
    }
}

impl From<Rect<f64>> for BoundingBox {
    fn from(rect: Rect<f64>) -> Self {
        BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// CRS-to-CRS coordinate transform.
///
/// Coordinates are handled in "visualization" axis order on both sides: easting/northing
/// for projected CRSs and longitude/latitude for geographic ones, whatever the authority
/// axis order of the CRS is.
pub struct CoordinateTransformer {
    proj: Proj,
    from: Crs,
    to: Crs,
}

impl CoordinateTransformer {
    /// Fails with `Reprojection` if either code is unknown to PROJ
    pub fn new(from: Crs, to: Crs) -> Result<Self> {
        let proj = Proj::new_known_crs(&from.definition(), &to.definition(), None).map_err(
            |e| SatlevelError::Reprojection {
                from: from.epsg(),
                to: to.epsg(),
                reason: e.to_string(),
            },
        )?;

        Ok(CoordinateTransformer { proj, from, to })
    }

    pub fn source(&self) -> Crs {
        self.from
    }

    pub fn target(&self) -> Crs {
        self.to
    }

    pub fn convert(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let (tx, ty) = self
            .proj
            .convert((x, y))
            .map_err(|e| self.reprojection_error(e.to_string()))?;

        if !tx.is_finite() || !ty.is_finite() {
            return Err(self.reprojection_error(format!(
                "({}, {}) has no finite image",
                x, y
            )));
        }
        Ok((tx, ty))
    }

    /// Reproject `(min_x, min_y)` and `(max_x, max_y)` independently and rebuild the box.
    ///
    /// Each transformed corner comes back as an `(x, y)` pair in the target axis order
    /// (`(lon, lat)` for a geographic target). The output bounds are taken per axis over
    /// both corners, so a corner pair that flips orientation still yields
    /// `(min_lon, min_lat, max_lon, max_lat)`. Antimeridian wraparound and extents whose
    /// reprojected corners are not axis-extremal are not handled.
    pub fn transform_bbox(&self, bbox: &BoundingBox) -> Result<BoundingBox> {
        let lower = self.convert(bbox.min_x, bbox.min_y)?;
        let upper = self.convert(bbox.max_x, bbox.max_y)?;
        Ok(BoundingBox::from_corners(lower, upper))
    }

    fn reprojection_error(&self, reason: String) -> SatlevelError {
        SatlevelError::Reprojection {
            from: self.from.epsg(),
            to: self.to.epsg(),
            reason,
        }
    }
}

/// Transform coordinates from one CRS to another
pub fn transform_coords(from: Crs, to: Crs, x: f64, y: f64) -> Result<(f64, f64)> {
    CoordinateTransformer::new(from, to)?.convert(x, y)
}

/// Transform a Point from one CRS to another
pub fn transform_point(from: Crs, to: Crs, point: Point<f64>) -> Result<Point<f64>> {
    let (x, y) = transform_coords(from, to, point.x(), point.y())?;
    Ok(Point::new(x, y))
}
