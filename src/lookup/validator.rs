//! Degree/radian disambiguation of incoming coordinate pairs.
//!
//! This is a heuristic. Small radian values near the equator fit inside
//! degree ranges too; without an expected country to check against they
//! are read as degrees.

use std::f64::consts::PI;
use std::sync::Arc;

use tracing::debug;

use super::locator::BoundaryLocator;
use crate::error::{GeoError, Result};
use crate::models::Point;

/// Anything larger is not a plausible encoding of a coordinate.
pub const MAX_MAGNITUDE: f64 = 1000.0;

pub struct CoordinateValidator {
    locator: Option<Arc<BoundaryLocator>>,
}

impl CoordinateValidator {
    /// Validator without a country oracle.
    pub fn new() -> Self {
        Self { locator: None }
    }

    /// Validator that checks expected countries through `locator`.
    pub fn with_locator(locator: Arc<BoundaryLocator>) -> Self {
        Self {
            locator: Some(locator),
        }
    }

    /// Return `(lat, lng)` in degrees.
    pub fn validate(&self, lat: f64, lng: f64, expected_country: Option<&str>) -> Result<Point> {
        if !lat.is_finite()
            || !lng.is_finite()
            || lat.abs() > MAX_MAGNITUDE
            || lng.abs() > MAX_MAGNITUDE
        {
            return Err(GeoError::InvalidCoordinate { lat, lng });
        }

        if lat.abs() > 90.0 || lng.abs() > 180.0 {
            debug!("({}, {}) outside degree range, reading as radians", lat, lng);
            return Ok(Point::new(lat.to_degrees(), lng.to_degrees()));
        }

        let as_degrees = Point::new(lat, lng);

        if let (Some(locator), Some(country)) = (&self.locator, expected_country) {
            if locator.in_country(as_degrees, country) {
                return Ok(as_degrees);
            }
            if lat.abs() <= PI && lng.abs() <= PI {
                let as_radians = Point::new(lat.to_degrees(), lng.to_degrees());
                if locator.in_country(as_radians, country) {
                    debug!(
                        "({}, {}) lies in {} only when read as radians",
                        lat, lng, country
                    );
                    return Ok(as_radians);
                }
            }
        }

        Ok(as_degrees)
    }
}

impl Default for CoordinateValidator {
    fn default() -> Self {
        Self::new()
    }
}
