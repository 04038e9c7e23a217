//! Core data models for geographic resolution.

pub mod boundary;
pub mod feature;
pub mod metro;
pub mod point;

pub use boundary::{AdmLevel, Boundary, BoundaryKey};
pub use feature::{FeatureTypeCode, NamedFeature};
pub use metro::Metro;
pub use point::{GeoBox, HasCoordinates, Point};
