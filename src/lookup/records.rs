//! Geographic lookups for any record that carries coordinates.
//!
//! Host types implement [`HasCoordinates`] and call these functions; the
//! lookups take plain `(lat, lng)` values and hold no per-record state.

use std::sync::Arc;

use super::locator::{AdminUnit, BoundaryLocator};
use super::metro::MetroResolver;
use super::proximity::{ProximityHit, ProximityIndex, ProximityQuery};
use super::validator::CoordinateValidator;
use crate::error::Result;
use crate::models::{AdmLevel, Boundary, HasCoordinates, Point};

pub fn boundaries_for<T: HasCoordinates + ?Sized>(
    record: &T,
    locator: &BoundaryLocator,
    levels: Option<&[AdmLevel]>,
) -> Vec<Arc<Boundary>> {
    locator.containing_boundaries(record.point(), levels)
}

pub fn boundary_at<T: HasCoordinates + ?Sized>(
    record: &T,
    locator: &BoundaryLocator,
    level: AdmLevel,
) -> Option<Arc<Boundary>> {
    locator.containing_boundary(record.point(), level)
}

pub fn county_for<T: HasCoordinates + ?Sized>(record: &T, locator: &BoundaryLocator) -> Option<AdminUnit> {
    locator.county(record.point())
}

pub fn state_for<T: HasCoordinates + ?Sized>(
    record: &T,
    locator: &BoundaryLocator,
) -> Option<Arc<Boundary>> {
    locator.state(record.point())
}

pub fn township_for<T: HasCoordinates + ?Sized>(
    record: &T,
    locator: &BoundaryLocator,
) -> Option<AdminUnit> {
    locator.township(record.point())
}

pub fn nearest_features_for<T: HasCoordinates + ?Sized>(
    record: &T,
    index: &ProximityIndex,
    query: &ProximityQuery,
) -> Vec<ProximityHit> {
    index.nearest_features(record.point(), query)
}

pub fn metros_for<T: HasCoordinates + ?Sized>(record: &T, resolver: &MetroResolver) -> Vec<String> {
    resolver.metros_containing(record.point())
}

/// Validate the record's raw coordinates, converting radians if needed.
pub fn validated_point_for<T: HasCoordinates + ?Sized>(
    record: &T,
    validator: &CoordinateValidator,
    expected_country: Option<&str>,
) -> Result<Point> {
    validator.validate(record.latitude(), record.longitude(), expected_country)
}
