//! Georesolve - geographic resolution over administrative boundaries
//!
//! This library provides coordinate validation, point-in-boundary lookups,
//! nearest named-feature search, metropolitan areas and the boundary
//! ingestion used by the `ingest` binary.

pub mod boundaries;
pub mod country;
pub mod error;
pub mod lookup;
pub mod models;
pub mod store;

pub use error::{GeoError, Result, StoreError};
pub use lookup::{BoundaryLocator, CoordinateValidator, MetroResolver, ProximityIndex};
pub use models::{AdmLevel, Boundary, BoundaryKey, HasCoordinates, Metro, NamedFeature, Point};
