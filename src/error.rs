//! Error types for geographic resolution and boundary ingestion.
//!
//! Lookups never surface these for expected data absence: they log and
//! return empty results. Errors reach callers only for invalid input and
//! for the per-level fetch failures an import reports.

use thiserror::Error;

use crate::models::AdmLevel;

/// Main error type for the crate.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Coordinates that are out of range and could not be repaired.
    #[error("invalid coordinate ({lat}, {lng})")]
    InvalidCoordinate { lat: f64, lng: f64 },

    /// No feature class, code or keyword match for a proximity query.
    #[error("could not resolve a feature type from {0:?}")]
    UnresolvableFeatureType(Option<String>),

    /// The spatial backend has no usable schema.
    #[error("spatial query capability unavailable")]
    SpatialCapabilityUnavailable,

    /// HTTP or payload failure while fetching one level of a country.
    #[error("fetch failed for {country} {level}: {message}")]
    Fetch {
        country: String,
        level: AdmLevel,
        message: String,
    },

    /// A single feature's geometry could not be built.
    #[error("geometry construction failed: {0}")]
    GeometryConstruction(String),

    /// Missing or malformed caller-supplied identifiers.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown country code '{0}'")]
    UnknownCountry(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Failures raised by a spatial backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("boundary schema is not initialised")]
    SchemaMissing,

    #[error("boundary {0} has no outer ring")]
    EmptyGeometry(String),

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("could not decode stored row: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

pub type Result<T, E = GeoError> = std::result::Result<T, E>;
