//! Per-country boundary import.
//!
//! Levels are fetched one after another so a single country never has more
//! than one request in flight; separate countries may run side by side.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::cache::GeometryCache;
use super::geometry::{build_multipolygon, parse_collection, shape_summary, ShapeProperties};
use super::source::BoundarySource;
use crate::country::normalize_to_alpha3;
use crate::error::{GeoError, Result};
use crate::models::{AdmLevel, Boundary, BoundaryKey};
use crate::store::{BoundaryStore, UpsertOutcome};

/// One collected failure. Never aborts the import on its own.
#[derive(Debug, Clone, Serialize)]
pub struct ImportError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<AdmLevel>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
}

/// Outcome of importing one country.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub country: String,
    /// False when a level could not be fetched or the store is unusable.
    pub success: bool,
    pub processed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub levels_imported: Vec<AdmLevel>,
    pub errors: Vec<ImportError>,
}

impl ImportReport {
    fn new(country: &str) -> Self {
        Self {
            country: country.to_string(),
            success: true,
            processed: 0,
            inserted: 0,
            updated: 0,
            levels_imported: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, level: Option<AdmLevel>, message: String) {
        self.success = false;
        self.errors.push(ImportError {
            name: None,
            level,
            message,
            shape: None,
        });
    }
}

pub struct BoundaryIngestor {
    store: Arc<dyn BoundaryStore>,
    source: Arc<dyn BoundarySource>,
    include_country_outline: bool,
}

impl BoundaryIngestor {
    pub fn new(store: Arc<dyn BoundaryStore>, source: Arc<dyn BoundarySource>) -> Self {
        Self {
            store,
            source,
            include_country_outline: false,
        }
    }

    /// Also import the ADM0 outline before the subdivision levels.
    pub fn with_country_outline(mut self, include: bool) -> Self {
        self.include_country_outline = include;
        self
    }

    /// Import ADM1..=ADM5 for one country, stopping at the first level the
    /// source has no data for.
    pub async fn import_country(&self, country_code: &str, cache_dir: &Path) -> Result<ImportReport> {
        if country_code.trim().is_empty() {
            return Err(GeoError::InvalidInput("country code is empty".into()));
        }
        let iso3 = normalize_to_alpha3(country_code)
            .ok_or_else(|| GeoError::UnknownCountry(country_code.trim().to_string()))?;
        let cache = GeometryCache::new(cache_dir)?;
        let mut report = ImportReport::new(&iso3);

        if !self.store.capability().is_available() {
            warn!("Boundary store is not initialised, skipping {}", iso3);
            report.fail(None, GeoError::SpatialCapabilityUnavailable.to_string());
            return Ok(report);
        }

        info!("Importing boundaries for {}", iso3);

        if self.include_country_outline {
            // A missing outline does not say anything about subdivisions.
            if let Err(e) = self.import_level(&iso3, AdmLevel::Adm0, &cache, &mut report).await {
                report.fail(Some(AdmLevel::Adm0), e.to_string());
                return Ok(report);
            }
        }

        for level in &AdmLevel::all()[1..] {
            match self.import_level(&iso3, *level, &cache, &mut report).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!("No {} data for {}, stopping", level, iso3);
                    break;
                }
                Err(e) => {
                    warn!("{}", e);
                    report.fail(Some(*level), e.to_string());
                    break;
                }
            }
        }

        info!(
            "Finished {}: {} features, {} inserted, {} updated, {} errors",
            iso3,
            report.processed,
            report.inserted,
            report.updated,
            report.errors.len()
        );
        Ok(report)
    }

    /// Import several countries, at most `concurrency` at a time.
    pub async fn import_countries(
        &self,
        codes: &[String],
        cache_dir: &Path,
        concurrency: usize,
    ) -> Vec<(String, Result<ImportReport>)> {
        stream::iter(codes.iter().cloned())
            .map(|code| async move {
                let result = self.import_country(&code, cache_dir).await;
                (code, result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }

    /// Returns `Ok(false)` when the source has nothing for this level,
    /// including an empty feature collection.
    async fn import_level(
        &self,
        iso3: &str,
        level: AdmLevel,
        cache: &GeometryCache,
        report: &mut ImportReport,
    ) -> Result<bool> {
        let fetch_error = |message: String| GeoError::Fetch {
            country: iso3.to_string(),
            level,
            message,
        };

        let metadata = self
            .source
            .fetch_metadata(iso3, level)
            .await
            .map_err(|e| fetch_error(format!("{:#}", e)))?;
        let Some(metadata) = metadata else {
            return Ok(false);
        };

        let features = self
            .load_features(iso3, level, &metadata.geometry_url, cache)
            .await
            .map_err(fetch_error)?;
        if features.is_empty() {
            debug!("{} {}: empty feature collection", iso3, level);
            return Ok(false);
        }
        debug!("{} {}: {} features", iso3, level, features.len());

        for feature in &features {
            report.processed += 1;
            self.import_feature(iso3, level, feature, report);
        }
        report.levels_imported.push(level);
        Ok(true)
    }

    /// Cached payload if it parses, otherwise a fresh download. A cached
    /// file that fails to parse is removed and fetched again once.
    async fn load_features(
        &self,
        iso3: &str,
        level: AdmLevel,
        url: &str,
        cache: &GeometryCache,
    ) -> std::result::Result<Vec<Value>, String> {
        let path = cache.path_for(iso3, level, url);

        match cache.read(&path) {
            Ok(Some(bytes)) => match parse_collection(&bytes) {
                Ok(features) => return Ok(features),
                Err(e) => {
                    warn!("Discarding corrupt cache file {}: {}", path.display(), e);
                    cache.evict(&path);
                }
            },
            Ok(None) => {}
            Err(e) => warn!("Could not read cache file {}: {}", path.display(), e),
        }

        let bytes = self
            .source
            .fetch_geometry(url)
            .await
            .map_err(|e| format!("{:#}", e))?;
        let features =
            parse_collection(&bytes).map_err(|e| format!("invalid payload from {}: {}", url, e))?;

        if let Err(e) = cache.write(&path, &bytes) {
            warn!("Could not cache {}: {}", path.display(), e);
        }
        Ok(features)
    }

    fn import_feature(&self, iso3: &str, level: AdmLevel, feature: &Value, report: &mut ImportReport) {
        let props = ShapeProperties::from_feature(feature);
        let geometry = feature.get("geometry");
        let mut record = |name: &Option<String>, message: String| {
            report.errors.push(ImportError {
                name: name.clone(),
                level: Some(level),
                message,
                shape: Some(shape_summary(geometry)),
            });
        };

        let (Some(name), Some(shape_id)) = (props.name.clone(), props.shape_id.clone()) else {
            record(&props.name, "feature is missing shapeName or shapeID".into());
            return;
        };

        let built = match build_multipolygon(geometry) {
            Ok(built) => built,
            Err(e) => {
                record(&props.name, GeoError::GeometryConstruction(e).to_string());
                return;
            }
        };
        for skipped in built.skipped {
            record(&props.name, skipped);
        }

        let boundary = Boundary {
            key: BoundaryKey::new(name, level, shape_id),
            country_iso3: iso3.to_string(),
            shape_iso: props.shape_iso,
            shape_type: props.shape_type,
            geometry: built.geometry,
            imported_at: Utc::now(),
        };

        match self.store.upsert(boundary) {
            Ok(UpsertOutcome::Inserted) => report.inserted += 1,
            Ok(UpsertOutcome::Updated) => report.updated += 1,
            Err(e) => report.errors.push(ImportError {
                name: props.name,
                level: Some(level),
                message: e.to_string(),
                shape: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundaries::source::LevelMetadata;
    use crate::lookup::BoundaryLocator;
    use crate::models::Point;
    use crate::store::{MemoryBoundaryStore, SledBoundaryStore};
    use async_trait::async_trait;
    use hashbrown::HashMap;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeSource {
        payloads: HashMap<AdmLevel, String>,
        failing: Option<AdmLevel>,
        metadata_calls: AtomicUsize,
        geometry_calls: AtomicUsize,
    }

    impl FakeSource {
        fn with_level(mut self, level: AdmLevel, features: Vec<Value>) -> Self {
            let body = json!({"type": "FeatureCollection", "features": features});
            self.payloads.insert(level, body.to_string());
            self
        }
    }

    #[async_trait]
    impl BoundarySource for FakeSource {
        async fn fetch_metadata(
            &self,
            iso3: &str,
            level: AdmLevel,
        ) -> anyhow::Result<Option<LevelMetadata>> {
            self.metadata_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing == Some(level) {
                anyhow::bail!("connection reset");
            }
            Ok(self.payloads.get(&level).map(|_| LevelMetadata {
                geometry_url: format!("fake://{}/{}", iso3, level.code()),
                simplified: true,
            }))
        }

        async fn fetch_geometry(&self, url: &str) -> anyhow::Result<Vec<u8>> {
            self.geometry_calls.fetch_add(1, Ordering::SeqCst);
            let level = url
                .rsplit('/')
                .next()
                .and_then(AdmLevel::from_code)
                .ok_or_else(|| anyhow::anyhow!("bad url {}", url))?;
            self.payloads
                .get(&level)
                .map(|body| body.clone().into_bytes())
                .ok_or_else(|| anyhow::anyhow!("not found"))
        }
    }

    fn feature(id: &str, name: &str, rings: Value) -> Value {
        json!({
            "type": "Feature",
            "properties": {"shapeID": id, "shapeName": name, "shapeType": "ADM"},
            "geometry": {"type": "Polygon", "coordinates": rings}
        })
    }

    fn square(lng0: f64, lat0: f64, lng1: f64, lat1: f64) -> Value {
        json!([[[lng0, lat0], [lng1, lat0], [lng1, lat1], [lng0, lat1], [lng0, lat0]]])
    }

    fn sample_source() -> FakeSource {
        FakeSource::default()
            .with_level(
                AdmLevel::Adm1,
                vec![
                    feature("N-1", "North", square(0.0, 5.0, 10.0, 10.0)),
                    // Two-point outer ring
                    feature("S-1", "South", json!([[[0.0, 0.0], [10.0, 5.0]]])),
                ],
            )
            .with_level(
                AdmLevel::Adm2,
                vec![
                    feature("W-2", "West", square(0.0, 0.0, 5.0, 5.0)),
                    feature("B-2", "Broken", json!([[["a", 1.0], [2.0, 2.0], [3.0, 1.0]]])),
                    feature("E-2", "East", square(5.0, 0.0, 10.0, 5.0)),
                ],
            )
    }

    #[tokio::test]
    async fn test_import_country() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryBoundaryStore::new());
        let source = Arc::new(sample_source());
        let ingestor = BoundaryIngestor::new(store.clone(), source.clone());

        let report = ingestor.import_country("fr", dir.path()).await.unwrap();

        assert!(report.success);
        assert_eq!(report.country, "FRA");
        assert_eq!(report.processed, 5);
        assert_eq!(report.inserted, 4);
        assert_eq!(report.levels_imported, vec![AdmLevel::Adm1, AdmLevel::Adm2]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].name.as_deref(), Some("Broken"));
        assert_eq!(report.errors[0].level, Some(AdmLevel::Adm2));
        assert!(report.errors[0].shape.as_deref().unwrap().starts_with("Polygon"));
        // ADM1, ADM2, then ADM3 has nothing
        assert_eq!(source.metadata_calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.len().unwrap(), 4);

        let locator = BoundaryLocator::probe(store);
        let south = locator
            .containing_boundary(Point::new(2.5, 7.5), AdmLevel::Adm1)
            .unwrap();
        assert_eq!(south.name(), "South");
        assert_eq!(south.country_iso3, "FRA");
    }

    #[tokio::test]
    async fn test_reimport_is_idempotent_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryBoundaryStore::new());
        let source = Arc::new(sample_source());
        let ingestor = BoundaryIngestor::new(store.clone(), source.clone());

        ingestor.import_country("FRA", dir.path()).await.unwrap();
        let second = ingestor.import_country("FRA", dir.path()).await.unwrap();

        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 4);
        assert_eq!(store.len().unwrap(), 4);
        assert_eq!(source.geometry_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_corrupt_cache_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryBoundaryStore::new());
        let source = Arc::new(sample_source());
        let cache = GeometryCache::new(dir.path()).unwrap();
        let path = cache.path_for("FRA", AdmLevel::Adm1, "fake://FRA/ADM1");
        cache.write(&path, b"{\"type\": \"FeatureColl").unwrap();

        let ingestor = BoundaryIngestor::new(store.clone(), source.clone());
        let report = ingestor.import_country("FRA", dir.path()).await.unwrap();

        assert!(report.success);
        assert_eq!(source.geometry_calls.load(Ordering::SeqCst), 2);
        let cached = cache.read(&path).unwrap().unwrap();
        assert!(parse_collection(&cached).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_failure_stops_and_flags() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryBoundaryStore::new());
        let mut source = sample_source();
        source.failing = Some(AdmLevel::Adm2);
        let source = Arc::new(source);
        let ingestor = BoundaryIngestor::new(store.clone(), source.clone());

        let report = ingestor.import_country("FRA", dir.path()).await.unwrap();

        assert!(!report.success);
        assert_eq!(report.levels_imported, vec![AdmLevel::Adm1]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].level, Some(AdmLevel::Adm2));
        assert!(report.errors[0].message.contains("connection reset"));
        assert_eq!(source.metadata_calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_level_stops_import() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryBoundaryStore::new());
        let source = Arc::new(
            sample_source()
                .with_level(AdmLevel::Adm2, vec![])
                .with_level(
                    AdmLevel::Adm3,
                    vec![feature("T-3", "Town", square(0.0, 0.0, 1.0, 1.0))],
                ),
        );
        let ingestor = BoundaryIngestor::new(store.clone(), source.clone());

        let report = ingestor.import_country("FRA", dir.path()).await.unwrap();

        assert!(report.success);
        assert_eq!(report.levels_imported, vec![AdmLevel::Adm1]);
        assert_eq!(report.processed, 2);
        assert_eq!(source.metadata_calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invalid_country_codes() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = BoundaryIngestor::new(
            Arc::new(MemoryBoundaryStore::new()),
            Arc::new(FakeSource::default()),
        );

        assert!(matches!(
            ingestor.import_country("  ", dir.path()).await,
            Err(GeoError::InvalidInput(_))
        ));
        assert!(matches!(
            ingestor.import_country("ZZ", dir.path()).await,
            Err(GeoError::UnknownCountry(_))
        ));
    }

    #[tokio::test]
    async fn test_uninitialised_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SledBoundaryStore::open(dir.path().join("db")).unwrap());
        let source = Arc::new(sample_source());
        let ingestor = BoundaryIngestor::new(store, source.clone());

        let report = ingestor
            .import_country("FRA", &dir.path().join("cache"))
            .await
            .unwrap();

        assert!(!report.success);
        assert_eq!(report.processed, 0);
        assert_eq!(source.metadata_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_country_outline_and_many_countries() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryBoundaryStore::new());
        let source = Arc::new(sample_source().with_level(
            AdmLevel::Adm0,
            vec![feature("FR-0", "France", square(0.0, 0.0, 10.0, 10.0))],
        ));
        let ingestor =
            BoundaryIngestor::new(store.clone(), source).with_country_outline(true);

        let codes = vec!["FR".to_string(), "DE".to_string()];
        let mut results = ingestor.import_countries(&codes, dir.path(), 2).await;
        results.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(results.len(), 2);
        let (code, report) = &results[0];
        assert_eq!(code, "DE");
        let report = report.as_ref().unwrap();
        assert_eq!(report.levels_imported[0], AdmLevel::Adm0);
        assert_eq!(report.levels_imported.len(), 3);
        // Same shape ids in both countries, so the second run updates
        assert_eq!(store.len().unwrap(), 5);
    }
}
