//! Geographic value types and the world projection used for clustering

use geo::{Coord, Point, Rect};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A geographic position: x is longitude, y is latitude, both in degrees
pub type LatLng = Point<f64>;

/// Side of a map tile in screen pixels; pixel distances are relative to this
pub const TILE_SIZE: f64 = 256.0;

/// Maximum latitude that can be represented in Web Mercator
pub const MAX_LATITUDE: f64 = 85.05112878;

/// Snapshot of the map camera
///
/// Only `zoom` is interpreted by the recompute core; the other fields are forwarded
/// to screen-based algorithms untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CameraPosition {
    /// Map center
    pub target: LatLng,
    /// Zoom level (0 = whole world in one tile)
    pub zoom: f64,
    /// Tilt in degrees
    pub tilt: f64,
    /// Bearing in degrees clockwise from north
    pub bearing: f64,
}

impl CameraPosition {
    /// Create an untilted, north-up camera position
    ///
    /// # Panics
    /// If `zoom` is not finite. Camera sources must always provide a usable zoom.
    pub fn new(target: LatLng, zoom: f64) -> Self {
        assert!(zoom.is_finite(), "camera zoom must be finite, got {zoom}");
        Self {
            target,
            zoom,
            tilt: 0.0,
            bearing: 0.0,
        }
    }

    /// Return a copy with a different tilt and bearing
    pub fn with_orientation(mut self, tilt: f64, bearing: f64) -> Self {
        self.tilt = tilt;
        self.bearing = bearing;
        self
    }

    /// Zoom truncated to the integer level algorithms cluster at
    #[inline]
    pub fn discrete_zoom(&self) -> i32 {
        discrete_zoom(self.zoom)
    }
}

impl Default for CameraPosition {
    fn default() -> Self {
        Self::new(Point::new(0.0, 0.0), 0.0)
    }
}

/// Truncate a continuous zoom to the level used for clustering
#[inline(always)]
pub fn discrete_zoom(zoom: f64) -> i32 {
    zoom as i32
}

/// Size of one screen pixel in world units at the given discrete zoom
#[inline(always)]
pub fn world_units_per_pixel(discrete_zoom: i32) -> f64 {
    1.0 / 2f64.powi(discrete_zoom) / TILE_SIZE
}

/// Project a geographic position onto the unit-square spherical Mercator world
///
/// x grows eastward from 0 (antimeridian, west) to 1; y grows southward from 0 to 1.
#[inline(always)]
pub fn to_world_point(position: LatLng) -> Point<f64> {
    let lat = position.y().clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = (position.x() / 360.0 + 0.5).clamp(0.0, 1.0);
    let siny = lat.to_radians().sin();
    let y = 0.5 * ((1.0 + siny) / (1.0 - siny)).ln() / -(2.0 * std::f64::consts::PI) + 0.5;
    Point::new(x, y)
}

/// Inverse of [`to_world_point`]
#[inline(always)]
pub fn from_world_point(point: Point<f64>) -> LatLng {
    let lon = (point.x() - 0.5) * 360.0;
    let lat = 90.0 - (2.0 * (-(0.5 - point.y()) * 2.0 * std::f64::consts::PI).exp().atan())
        .to_degrees();
    Point::new(lon, lat)
}

/// Square world-space bounds of side `span` centred on `center`
#[inline]
pub fn bounds_around(center: Point<f64>, span: f64) -> Rect<f64> {
    let half = span / 2.0;
    Rect::new(
        Coord {
            x: center.x() - half,
            y: center.y() - half,
        },
        Coord {
            x: center.x() + half,
            y: center.y() + half,
        },
    )
}

/// Check if a point lies inside (or on the edge of) a rectangle
#[inline(always)]
pub fn rect_contains(rect: &Rect<f64>, point: Point<f64>) -> bool {
    let min = rect.min();
    let max = rect.max();
    point.x() >= min.x && point.x() <= max.x && point.y() >= min.y && point.y() <= max.y
}

/// Check if two rectangles overlap
#[inline(always)]
pub fn rects_intersect(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    let (amin, amax) = (a.min(), a.max());
    let (bmin, bmax) = (b.min(), b.max());
    !(amax.x < bmin.x || amin.x > bmax.x || amax.y < bmin.y || amin.y > bmax.y)
}

/// Squared euclidean distance between two world points
#[inline(always)]
pub fn distance_squared(a: Point<f64>, b: Point<f64>) -> f64 {
    let dx = a.x() - b.x();
    let dy = a.y() - b.y();
    dx * dx + dy * dy
}
