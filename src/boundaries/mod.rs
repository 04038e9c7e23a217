//! Administrative boundary ingestion.
//!
//! Fetches per-level feature collections from a [`BoundarySource`], builds
//! one multipolygon per feature and upserts the result into a
//! [`crate::store::BoundaryStore`].

pub mod cache;
pub mod geometry;
pub mod importer;
pub mod source;

pub use cache::GeometryCache;
pub use geometry::{build_multipolygon, shape_summary, BuiltGeometry, ShapeProperties};
pub use importer::{BoundaryIngestor, ImportError, ImportReport};
pub use source::{BoundarySource, HttpBoundarySource, IngestSettings, LevelMetadata, DEFAULT_API_BASE};
