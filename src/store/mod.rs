//! Boundary and feature stores.
//!
//! Lookups only need two things from a spatial backend: a
//! polygon-contains-point query and a keyed upsert. [`BoundaryStore`] is
//! that seam; the in-memory R-tree and the sled-backed store implement it.

mod features;
mod geonames;
mod memory;
mod persistent;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use features::{FeatureStore, MemoryFeatureStore};
pub use geonames::{
    load_feature_codes, load_geonames, read_feature_codes, read_geonames,
};
pub use memory::MemoryBoundaryStore;
pub use persistent::SledBoundaryStore;

use crate::error::StoreError;
use crate::models::{AdmLevel, Boundary, BoundaryKey, Point};

/// Whether a store can answer containment queries at all.
///
/// Computed once per logical operation and handed to the components that
/// query the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialCapability {
    Available,
    Unavailable,
}

impl SpatialCapability {
    pub fn is_available(&self) -> bool {
        matches!(self, SpatialCapability::Available)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Storage for administrative boundaries.
pub trait BoundaryStore: Send + Sync {
    /// Probe whether the backend schema is usable.
    fn capability(&self) -> SpatialCapability;

    /// Boundaries whose geometry contains `point`, ordered by level then
    /// name, at most `limit` rows.
    fn containing(
        &self,
        point: Point,
        levels: Option<&[AdmLevel]>,
        limit: usize,
    ) -> Result<Vec<Arc<Boundary>>, StoreError>;

    /// Insert or replace the row with the same [`BoundaryKey`].
    fn upsert(&self, boundary: Boundary) -> Result<UpsertOutcome, StoreError>;

    fn get(&self, key: &BoundaryKey) -> Result<Option<Arc<Boundary>>, StoreError>;

    fn len(&self) -> Result<usize, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn count_by_level(&self) -> Result<BTreeMap<AdmLevel, usize>, StoreError>;
}
