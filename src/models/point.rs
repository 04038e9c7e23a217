//! Point types and the coordinate-bearing record interface.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static POINT_WKT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*POINT\s*\(\s*([-+0-9.eE]+)\s+([-+0-9.eE]+)\s*\)\s*$")
        .expect("static regex")
});

/// Geographic point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn lat_in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat)
    }

    pub fn lng_in_range(&self) -> bool {
        (-180.0..=180.0).contains(&self.lng)
    }

    pub fn is_valid(&self) -> bool {
        self.lat_in_range() && self.lng_in_range()
    }

    pub fn swapped(&self) -> Self {
        Self {
            lat: self.lng,
            lng: self.lat,
        }
    }

    /// Geometry-space point. All stored geometry uses `x = longitude`,
    /// `y = latitude`, so both ingestion and lookups go through here.
    pub fn to_geo(&self) -> geo::Point<f64> {
        geo::Point::new(self.lng, self.lat)
    }

    pub fn from_geo(point: geo::Point<f64>) -> Self {
        Self {
            lat: point.y(),
            lng: point.x(),
        }
    }

    /// Well-known text, `POINT(lng lat)`.
    pub fn to_wkt(&self) -> String {
        format!("POINT({} {})", self.lng, self.lat)
    }

    pub fn from_wkt(wkt: &str) -> Option<Self> {
        let caps = POINT_WKT.captures(wkt)?;
        let lng: f64 = caps[1].parse().ok()?;
        let lat: f64 = caps[2].parse().ok()?;
        Some(Self { lat, lng })
    }
}

/// Anything that carries a latitude/longitude pair.
pub trait HasCoordinates {
    fn latitude(&self) -> f64;
    fn longitude(&self) -> f64;

    fn point(&self) -> Point {
        Point::new(self.latitude(), self.longitude())
    }
}

impl HasCoordinates for Point {
    fn latitude(&self) -> f64 {
        self.lat
    }

    fn longitude(&self) -> f64 {
        self.lng
    }
}

/// `(lat, lng)` tuples.
impl HasCoordinates for (f64, f64) {
    fn latitude(&self) -> f64 {
        self.0
    }

    fn longitude(&self) -> f64 {
        self.1
    }
}

/// Rectangular coordinate range used as a cheap prefilter.
///
/// Longitudes are kept unwrapped so a box that crosses the antimeridian
/// has `min_lng < -180` or `max_lng > 180`; [`GeoBox::spans`] splits it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl GeoBox {
    /// Approximate box of `radius_km` around `center`, using 111 km per
    /// degree of latitude and `111 * cos(lat)` per degree of longitude.
    pub fn around(center: Point, radius_km: f64) -> Self {
        let lat_delta = radius_km / 111.0;
        let cos_lat = center.lat.to_radians().cos();
        let lng_delta = if cos_lat.abs() <= 1e-9 {
            f64::INFINITY
        } else {
            radius_km / (111.0 * cos_lat.abs())
        };

        // Near the poles, or when the circle reaches over one, every longitude is in range.
        if lng_delta >= 180.0 || center.lat.abs() + lat_delta >= 90.0 {
            return Self {
                min_lat: (center.lat - lat_delta).max(-90.0),
                max_lat: (center.lat + lat_delta).min(90.0),
                min_lng: -180.0,
                max_lng: 180.0,
            };
        }

        Self {
            min_lat: (center.lat - lat_delta).max(-90.0),
            max_lat: (center.lat + lat_delta).min(90.0),
            min_lng: center.lng - lng_delta,
            max_lng: center.lng + lng_delta,
        }
    }

    pub fn lat_delta(&self) -> f64 {
        (self.max_lat - self.min_lat) / 2.0
    }

    pub fn lng_delta(&self) -> f64 {
        (self.max_lng - self.min_lng) / 2.0
    }

    /// Longitude spans inside [-180, 180] as `(min_lng, max_lng)` pairs.
    pub fn spans(&self) -> Vec<(f64, f64)> {
        if self.min_lng < -180.0 {
            vec![(self.min_lng + 360.0, 180.0), (-180.0, self.max_lng)]
        } else if self.max_lng > 180.0 {
            vec![(self.min_lng, 180.0), (-180.0, self.max_lng - 360.0)]
        } else {
            vec![(self.min_lng, self.max_lng)]
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        if point.lat < self.min_lat || point.lat > self.max_lat {
            return false;
        }
        self.spans()
            .iter()
            .any(|(min, max)| point.lng >= *min && point.lng <= *max)
    }
}
