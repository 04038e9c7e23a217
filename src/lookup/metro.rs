//! Metropolitan areas built from member boundaries.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use geo::{BooleanOps, Centroid, ChamberlainDuquetteArea, Contains, MultiPolygon};
use serde::Serialize;
use tracing::{debug, warn};

use super::locator::repair_point;
use crate::error::{GeoError, Result};
use crate::models::{Boundary, BoundaryKey, Metro, Point};
use crate::store::{BoundaryStore, SpatialCapability};

/// Aggregate figures over the union of a metro's member shapes.
#[derive(Debug, Clone, Serialize)]
pub struct MetroStats {
    pub members: usize,
    pub area_km2: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub centroid: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population_density: Option<f64>,
}

pub struct MetroResolver {
    store: Arc<dyn BoundaryStore>,
    capability: SpatialCapability,
    metros: RwLock<BTreeMap<String, Metro>>,
}

impl MetroResolver {
    pub fn new(store: Arc<dyn BoundaryStore>, capability: SpatialCapability) -> Self {
        Self {
            store,
            capability,
            metros: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn create(&self, metro: Metro) -> Result<()> {
        if metro.name.trim().is_empty() {
            return Err(GeoError::InvalidInput("metro name is empty".into()));
        }
        let mut metros = self.metros.write().map_err(|_| poisoned())?;
        if metros.contains_key(&metro.name) {
            return Err(GeoError::InvalidInput(format!(
                "metro '{}' already exists",
                metro.name
            )));
        }
        metros.insert(metro.name.clone(), metro);
        Ok(())
    }

    /// Add a boundary to a metro. Returns false if it was already a member.
    pub fn add_boundary(&self, metro: &str, key: BoundaryKey) -> Result<bool> {
        let mut metros = self.metros.write().map_err(|_| poisoned())?;
        let entry = metros
            .get_mut(metro)
            .ok_or_else(|| GeoError::InvalidInput(format!("unknown metro '{}'", metro)))?;
        Ok(entry.members.insert(key))
    }

    /// Remove a boundary from a metro. Returns false if it was not a member.
    pub fn remove_boundary(&self, metro: &str, key: &BoundaryKey) -> Result<bool> {
        let mut metros = self.metros.write().map_err(|_| poisoned())?;
        let entry = metros
            .get_mut(metro)
            .ok_or_else(|| GeoError::InvalidInput(format!("unknown metro '{}'", metro)))?;
        Ok(entry.members.remove(key))
    }

    pub fn get(&self, name: &str) -> Option<Metro> {
        self.metros.read().ok()?.get(name).cloned()
    }

    pub fn list(&self) -> Vec<String> {
        self.metros
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn member_boundaries(&self, metro: &Metro) -> Vec<Arc<Boundary>> {
        metro
            .members
            .iter()
            .filter_map(|key| match self.store.get(key) {
                Ok(found) => {
                    if found.is_none() {
                        debug!("Metro {} member {} is not in the store", metro.name, key);
                    }
                    found
                }
                Err(e) => {
                    warn!("Could not load metro member {}: {}", key, e);
                    None
                }
            })
            .collect()
    }

    /// True when any member boundary contains the point. Transposed
    /// coordinates are repaired the same way boundary lookups repair them.
    pub fn contains_point(&self, metro: &Metro, point: Point) -> bool {
        if !self.capability.is_available() {
            warn!("{}; metro containment is false", GeoError::SpatialCapabilityUnavailable);
            return false;
        }
        let Some(point) = repair_point(point) else {
            debug!("({}, {}) is not a usable coordinate", point.lat, point.lng);
            return false;
        };
        let geo_point = point.to_geo();
        self.member_boundaries(metro)
            .iter()
            .any(|b| b.geometry.contains(&geo_point))
    }

    /// Names of every metro containing the point.
    pub fn metros_containing(&self, point: Point) -> Vec<String> {
        let metros: Vec<Metro> = match self.metros.read() {
            Ok(m) => m.values().cloned().collect(),
            Err(_) => return Vec::new(),
        };
        metros
            .into_iter()
            .filter(|m| self.contains_point(m, point))
            .map(|m| m.name)
            .collect()
    }

    /// Area, centroid and density over the geometric union of members, so
    /// overlapping shapes are counted once.
    pub fn statistics(&self, name: &str) -> Option<MetroStats> {
        let metro = self.get(name)?;
        let members = self.member_boundaries(&metro);

        let union = members
            .iter()
            .fold(MultiPolygon::<f64>::new(vec![]), |acc, b| {
                if acc.0.is_empty() {
                    b.geometry.clone()
                } else {
                    acc.union(&b.geometry)
                }
            });

        let area_km2 = union.chamberlain_duquette_unsigned_area() / 1_000_000.0;
        let population_density = match metro.population {
            Some(pop) if area_km2 > 0.0 => Some(pop as f64 / area_km2),
            _ => None,
        };

        Some(MetroStats {
            members: members.len(),
            area_km2,
            centroid: union.centroid().map(Point::from_geo),
            population_density,
        })
    }
}

fn poisoned() -> GeoError {
    GeoError::InvalidInput("metro registry lock poisoned".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AdmLevel;
    use crate::store::testing::square;
    use crate::store::MemoryBoundaryStore;

    fn resolver() -> MetroResolver {
        let store = MemoryBoundaryStore::from_boundaries(vec![
            square("West", AdmLevel::Adm2, "USA", (0.0, 0.0), (1.0, 1.0)),
            square("East", AdmLevel::Adm2, "USA", (0.0, 0.5), (1.0, 1.5)),
            square("Far", AdmLevel::Adm2, "USA", (20.0, 20.0), (21.0, 21.0)),
        ])
        .unwrap();
        MetroResolver::new(Arc::new(store), SpatialCapability::Available)
    }

    fn key(name: &str) -> BoundaryKey {
        BoundaryKey::new(name, AdmLevel::Adm2, format!("USA-{}", name))
    }

    #[test]
    fn test_containment_is_existential() {
        let r = resolver();
        r.create(Metro::new("Metro")).unwrap();
        r.add_boundary("Metro", key("West")).unwrap();
        r.add_boundary("Metro", key("Far")).unwrap();

        let metro = r.get("Metro").unwrap();
        assert!(r.contains_point(&metro, Point::new(0.5, 0.25)));
        assert!(r.contains_point(&metro, Point::new(20.5, 20.5)));
        assert!(!r.contains_point(&metro, Point::new(0.5, 1.25)));
    }

    #[test]
    fn test_adding_boundary_only_grows_coverage() {
        let r = resolver();
        r.create(Metro::new("Metro")).unwrap();
        r.add_boundary("Metro", key("West")).unwrap();

        let probes = [
            Point::new(0.5, 0.25),
            Point::new(0.5, 0.75),
            Point::new(0.5, 1.25),
            Point::new(20.5, 20.5),
        ];
        let before: Vec<bool> = probes
            .iter()
            .map(|p| r.contains_point(&r.get("Metro").unwrap(), *p))
            .collect();

        assert!(r.add_boundary("Metro", key("East")).unwrap());
        let after: Vec<bool> = probes
            .iter()
            .map(|p| r.contains_point(&r.get("Metro").unwrap(), *p))
            .collect();

        for (b, a) in before.iter().zip(&after) {
            assert!(!b || *a);
        }
        assert!(after[2]);
    }

    #[test]
    fn test_metros_may_overlap() {
        let r = resolver();
        r.create(Metro::new("A")).unwrap();
        r.create(Metro::new("B")).unwrap();
        r.add_boundary("A", key("West")).unwrap();
        r.add_boundary("B", key("East")).unwrap();

        assert_eq!(r.metros_containing(Point::new(0.5, 0.75)), vec!["A", "B"]);
        assert_eq!(r.metros_containing(Point::new(0.5, 0.25)), vec!["A"]);
        assert!(r.metros_containing(Point::new(50.0, 50.0)).is_empty());
    }

    #[test]
    fn test_remove_boundary() {
        let r = resolver();
        r.create(Metro::new("Metro")).unwrap();
        r.add_boundary("Metro", key("West")).unwrap();
        assert!(r.remove_boundary("Metro", &key("West")).unwrap());
        assert!(!r.remove_boundary("Metro", &key("West")).unwrap());
        assert!(!r.contains_point(&r.get("Metro").unwrap(), Point::new(0.5, 0.25)));
    }

    #[test]
    fn test_create_rejects_duplicates_and_unknown_metro() {
        let r = resolver();
        r.create(Metro::new("Metro")).unwrap();
        assert!(r.create(Metro::new("Metro")).is_err());
        assert!(r.create(Metro::new("  ")).is_err());
        assert!(r.add_boundary("Nope", key("West")).is_err());
    }

    #[test]
    fn test_statistics_use_union() {
        let r = resolver();
        r.create(Metro::new("Metro").with_population(1_000_000)).unwrap();
        r.add_boundary("Metro", key("West")).unwrap();
        let single = r.statistics("Metro").unwrap().area_km2;

        r.add_boundary("Metro", key("East")).unwrap();
        let stats = r.statistics("Metro").unwrap();

        assert_eq!(stats.members, 2);
        // Two 1x1 degree squares overlapping by half cover 1.5 squares.
        assert!((stats.area_km2 / single - 1.5).abs() < 0.01);
        let centroid = stats.centroid.unwrap();
        assert!((centroid.lng - 0.75).abs() < 0.01);
        assert!(stats.population_density.unwrap() > 0.0);
    }

    #[test]
    fn test_transposed_point_agrees_with_locator() {
        use crate::lookup::BoundaryLocator;

        let store: Arc<dyn BoundaryStore> = Arc::new(
            MemoryBoundaryStore::from_boundaries(vec![square(
                "Harbour",
                AdmLevel::Adm2,
                "AUS",
                (-34.0, 150.5),
                (-33.5, 151.5),
            )])
            .unwrap(),
        );
        let r = MetroResolver::new(store.clone(), SpatialCapability::Available);
        r.create(Metro::new("Sydney")).unwrap();
        r.add_boundary(
            "Sydney",
            BoundaryKey::new("Harbour", AdmLevel::Adm2, "AUS-Harbour"),
        )
        .unwrap();
        let metro = r.get("Sydney").unwrap();

        let transposed = Point::new(151.2, -33.8);
        let locator = BoundaryLocator::probe(store);
        assert_eq!(locator.containing_boundaries(transposed, None).len(), 1);
        assert!(r.contains_point(&metro, transposed));
        assert_eq!(r.metros_containing(transposed), vec!["Sydney".to_string()]);
        assert!(!r.contains_point(&metro, Point::new(151.2, 200.0)));
    }

    #[test]
    fn test_unavailable_capability() {
        let store = MemoryBoundaryStore::from_boundaries(vec![square(
            "West",
            AdmLevel::Adm2,
            "USA",
            (0.0, 0.0),
            (1.0, 1.0),
        )])
        .unwrap();
        let r = MetroResolver::new(Arc::new(store), SpatialCapability::Unavailable);
        r.create(Metro::new("Metro")).unwrap();
        r.add_boundary("Metro", key("West")).unwrap();
        assert!(!r.contains_point(&r.get("Metro").unwrap(), Point::new(0.5, 0.5)));
    }
}
