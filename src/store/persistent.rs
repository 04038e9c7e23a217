//! Persistent boundary store on sled.
//!
//! Rows are JSON documents keyed by [`BoundaryKey::storage_key`]. On open
//! every row is loaded into a [`MemoryBoundaryStore`] which answers the
//! containment queries.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use sled::{Db, Tree};
use tracing::info;

use super::{BoundaryStore, MemoryBoundaryStore, SpatialCapability, UpsertOutcome};
use crate::error::StoreError;
use crate::models::{AdmLevel, Boundary, BoundaryKey, Point};

const BOUNDARY_TREE: &str = "boundaries";
const SCHEMA_KEY: &[u8] = b"schema_version";
const SCHEMA_VERSION: &[u8] = b"1";

pub struct SledBoundaryStore {
    db: Db,
    rows: Tree,
    index: MemoryBoundaryStore,
    /// Serializes the sled write and the index update of one upsert.
    write_lock: Mutex<()>,
}

impl SledBoundaryStore {
    /// Open (or create) the database at `path` and load its rows.
    ///
    /// Opening does not create the schema; call [`Self::init_schema`]
    /// before importing into a fresh database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        let rows = db.open_tree(BOUNDARY_TREE)?;
        let index = MemoryBoundaryStore::new();

        let mut loaded = 0usize;
        for item in rows.iter() {
            let (_, value) = item?;
            let boundary: Boundary = serde_json::from_slice(&value)?;
            index.upsert(boundary)?;
            loaded += 1;
        }

        info!(
            "Opened boundary store at {} with {} rows",
            path.as_ref().display(),
            loaded
        );

        Ok(Self {
            db,
            rows,
            index,
            write_lock: Mutex::new(()),
        })
    }

    pub fn init_schema(&self) -> Result<(), StoreError> {
        self.db.insert(SCHEMA_KEY, SCHEMA_VERSION)?;
        self.db.flush()?;
        Ok(())
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn ensure_schema(&self) -> Result<(), StoreError> {
        if self.db.contains_key(SCHEMA_KEY)? {
            Ok(())
        } else {
            Err(StoreError::SchemaMissing)
        }
    }
}

impl BoundaryStore for SledBoundaryStore {
    fn capability(&self) -> SpatialCapability {
        match self.ensure_schema() {
            Ok(()) => SpatialCapability::Available,
            Err(_) => SpatialCapability::Unavailable,
        }
    }

    fn containing(
        &self,
        point: Point,
        levels: Option<&[AdmLevel]>,
        limit: usize,
    ) -> Result<Vec<Arc<Boundary>>, StoreError> {
        self.ensure_schema()?;
        self.index.containing(point, levels, limit)
    }

    fn upsert(&self, boundary: Boundary) -> Result<UpsertOutcome, StoreError> {
        self.ensure_schema()?;
        if boundary.bbox().is_none() {
            return Err(StoreError::EmptyGeometry(boundary.key.to_string()));
        }

        let key = boundary.key.storage_key();
        let value = serde_json::to_vec(&boundary)?;

        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        self.rows.insert(key, value)?;
        self.index.upsert(boundary)
    }

    fn get(&self, key: &BoundaryKey) -> Result<Option<Arc<Boundary>>, StoreError> {
        self.index.get(key)
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.rows.len())
    }

    fn count_by_level(&self) -> Result<BTreeMap<AdmLevel, usize>, StoreError> {
        self.index.count_by_level()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::square;

    #[test]
    fn test_missing_schema_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledBoundaryStore::open(dir.path().join("db")).unwrap();
        assert_eq!(store.capability(), SpatialCapability::Unavailable);
        assert!(matches!(
            store.containing(Point::new(0.0, 0.0), None, 50),
            Err(StoreError::SchemaMissing)
        ));
    }

    #[test]
    fn test_rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        {
            let store = SledBoundaryStore::open(&path).unwrap();
            store.init_schema().unwrap();
            store
                .upsert(square("Texas", AdmLevel::Adm1, "USA", (26.0, -106.0), (36.0, -94.0)))
                .unwrap();
            store
                .upsert(square("Texas", AdmLevel::Adm1, "USA", (26.0, -106.0), (36.5, -93.5)))
                .unwrap();
            store.flush().unwrap();
        }

        let store = SledBoundaryStore::open(&path).unwrap();
        assert_eq!(store.capability(), SpatialCapability::Available);
        assert_eq!(store.len().unwrap(), 1);
        let found = store.containing(Point::new(36.2, -93.7), None, 50).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "Texas");
    }
}
