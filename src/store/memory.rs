//! In-memory boundary store backed by an R-tree.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use geo::Contains;
use hashbrown::HashMap;
use rstar::{RTree, RTreeObject, AABB};
use tracing::debug;

use super::{BoundaryStore, SpatialCapability, UpsertOutcome};
use crate::error::StoreError;
use crate::models::{AdmLevel, Boundary, BoundaryKey, Point};

/// Wrapper for R-tree indexing of boundaries
#[derive(Clone)]
struct IndexedBoundary {
    boundary: Arc<Boundary>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedBoundary {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PartialEq for IndexedBoundary {
    fn eq(&self, other: &Self) -> bool {
        self.boundary.key == other.boundary.key
    }
}

impl IndexedBoundary {
    fn new(boundary: Boundary) -> Option<Self> {
        let (min_x, min_y, max_x, max_y) = boundary.bbox()?;
        Some(Self {
            boundary: Arc::new(boundary),
            envelope: AABB::from_corners([min_x, min_y], [max_x, max_y]),
        })
    }
}

fn by_level(a: &Arc<Boundary>, b: &Arc<Boundary>) -> std::cmp::Ordering {
    a.level()
        .cmp(&b.level())
        .then_with(|| a.key.cmp(&b.key))
}

#[derive(Default)]
struct Inner {
    tree: RTree<IndexedBoundary>,
    rows: HashMap<BoundaryKey, IndexedBoundary>,
}

/// Boundary store held entirely in memory.
///
/// Envelope candidates come from the R-tree, exact containment is checked
/// against the polygon afterwards. Upserts replace the row under the write
/// lock, so concurrent imports of the same shape never duplicate it.
#[derive(Default)]
pub struct MemoryBoundaryStore {
    inner: RwLock<Inner>,
}

impl MemoryBoundaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from boundaries, last duplicate key wins.
    pub fn from_boundaries(boundaries: Vec<Boundary>) -> Result<Self, StoreError> {
        let store = Self::new();
        for boundary in boundaries {
            store.upsert(boundary)?;
        }
        Ok(store)
    }

    /// Snapshot of all rows, ordered by level then name.
    pub fn boundaries(&self) -> Result<Vec<Arc<Boundary>>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        let mut all: Vec<Arc<Boundary>> = inner
            .rows
            .values()
            .map(|ib| Arc::clone(&ib.boundary))
            .collect();
        all.sort_by(|a, b| by_level(a, b));
        Ok(all)
    }
}

impl BoundaryStore for MemoryBoundaryStore {
    fn capability(&self) -> SpatialCapability {
        SpatialCapability::Available
    }

    fn containing(
        &self,
        point: Point,
        levels: Option<&[AdmLevel]>,
        limit: usize,
    ) -> Result<Vec<Arc<Boundary>>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        let geo_point = point.to_geo();
        let query_envelope = AABB::from_point([geo_point.x(), geo_point.y()]);

        let mut found: Vec<Arc<Boundary>> = inner
            .tree
            .locate_in_envelope_intersecting(&query_envelope)
            .filter(|ib| levels.map_or(true, |ls| ls.contains(&ib.boundary.level())))
            .filter(|ib| ib.boundary.geometry.contains(&geo_point))
            .map(|ib| Arc::clone(&ib.boundary))
            .collect();

        found.sort_by(|a, b| by_level(a, b));
        found.truncate(limit);

        debug!(
            "Containment at ({}, {}): {} boundaries",
            point.lat,
            point.lng,
            found.len()
        );
        Ok(found)
    }

    fn upsert(&self, boundary: Boundary) -> Result<UpsertOutcome, StoreError> {
        let key = boundary.key.clone();
        let indexed =
            IndexedBoundary::new(boundary).ok_or_else(|| StoreError::EmptyGeometry(key.to_string()))?;

        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let outcome = match inner.rows.remove(&key) {
            Some(previous) => {
                inner.tree.remove(&previous);
                UpsertOutcome::Updated
            }
            None => UpsertOutcome::Inserted,
        };
        inner.tree.insert(indexed.clone());
        inner.rows.insert(key, indexed);
        Ok(outcome)
    }

    fn get(&self, key: &BoundaryKey) -> Result<Option<Arc<Boundary>>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.rows.get(key).map(|ib| Arc::clone(&ib.boundary)))
    }

    fn len(&self) -> Result<usize, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.rows.len())
    }

    fn count_by_level(&self) -> Result<BTreeMap<AdmLevel, usize>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        let mut counts = BTreeMap::new();
        for ib in inner.rows.values() {
            *counts.entry(ib.boundary.level()).or_insert(0) += 1;
        }
        Ok(counts)
    }
}
