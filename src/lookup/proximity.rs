//! Nearest named-feature search.
//!
//! A rectangular prefilter narrows the candidates, great-circle distance
//! ranks them.

use std::sync::Arc;

use geo::{Distance, Haversine};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::GeoError;
use crate::models::{FeatureTypeCode, GeoBox, NamedFeature, Point};
use crate::store::FeatureStore;

pub const DEFAULT_RADIUS_KM: f64 = 100.0;
pub const DEFAULT_LIMIT: usize = 5;

/// Parameters for [`ProximityIndex::nearest_features`].
#[derive(Debug, Clone)]
pub struct ProximityQuery {
    pub feature_class: Option<String>,
    pub feature_code: Option<String>,
    pub keyword: Option<String>,
    pub radius_km: f64,
    pub limit: usize,
}

impl Default for ProximityQuery {
    fn default() -> Self {
        Self {
            feature_class: None,
            feature_code: None,
            keyword: None,
            radius_km: DEFAULT_RADIUS_KM,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl ProximityQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(mut self, feature_class: impl Into<String>) -> Self {
        self.feature_class = Some(feature_class.into());
        self
    }

    pub fn code(mut self, feature_code: impl Into<String>) -> Self {
        self.feature_code = Some(feature_code.into());
        self
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn radius_km(mut self, radius_km: f64) -> Self {
        self.radius_km = radius_km;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// A feature with its distance from the query point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximityHit {
    pub feature: NamedFeature,
    pub distance_km: f64,
}

pub struct ProximityIndex {
    store: Arc<dyn FeatureStore>,
}

impl ProximityIndex {
    pub fn new(store: Arc<dyn FeatureStore>) -> Self {
        Self { store }
    }

    /// First feature type whose name or description contains `keyword`.
    pub fn resolve_feature_type(&self, keyword: &str) -> Option<FeatureTypeCode> {
        match self.store.feature_types() {
            Ok(types) => types.into_iter().find(|t| t.matches_keyword(keyword)),
            Err(e) => {
                warn!("Feature type lookup failed: {}", e);
                None
            }
        }
    }

    pub fn nearest_features(&self, point: Point, query: &ProximityQuery) -> Vec<ProximityHit> {
        let (class, code) = match (&query.feature_class, &query.feature_code) {
            (None, None) => {
                let resolved = query
                    .keyword
                    .as_deref()
                    .and_then(|k| self.resolve_feature_type(k));
                match resolved {
                    Some(t) => (Some(t.feature_class), Some(t.feature_code)),
                    None => {
                        warn!(
                            "{}",
                            GeoError::UnresolvableFeatureType(query.keyword.clone())
                        );
                        return Vec::new();
                    }
                }
            }
            (class, code) => (class.clone(), code.clone()),
        };

        if class.is_none() && code.is_none() {
            return Vec::new();
        }

        let area = GeoBox::around(point, query.radius_km);
        let candidates = match self
            .store
            .candidates(&area, class.as_deref(), code.as_deref())
        {
            Ok(c) => c,
            Err(e) => {
                warn!("Feature store query failed: {}", e);
                return Vec::new();
            }
        };

        let origin = point.to_geo();
        let mut hits: Vec<ProximityHit> = candidates
            .into_iter()
            .map(|feature| {
                let distance_km = Haversine.distance(origin, feature.point().to_geo()) / 1000.0;
                ProximityHit {
                    feature,
                    distance_km,
                }
            })
            .filter(|hit| hit.distance_km <= query.radius_km)
            .collect();

        hits.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        hits.truncate(query.limit);

        debug!(
            "Proximity at ({}, {}) class={:?} code={:?}: {} hits",
            point.lat,
            point.lng,
            class,
            code,
            hits.len()
        );
        hits
    }

    fn closest(&self, point: Point, query: ProximityQuery) -> Option<ProximityHit> {
        self.nearest_features(point, &query.limit(1)).into_iter().next()
    }

    /// Nearest county-class feature within 50 km.
    pub fn closest_county(&self, point: Point) -> Option<ProximityHit> {
        self.closest(point, ProximityQuery::new().class("A").code("ADM2").radius_km(50.0))
    }

    /// Nearest populated-place section within 1 km.
    pub fn closest_subdivision(&self, point: Point) -> Option<ProximityHit> {
        self.closest(point, ProximityQuery::new().class("P").code("PPLX").radius_km(1.0))
    }

    /// Nearest township-like division, trying ADM3, then ADM4, then ADM5.
    pub fn closest_township(&self, point: Point) -> Option<ProximityHit> {
        ["ADM3", "ADM4", "ADM5"]
            .iter()
            .find_map(|code| self.closest(point, ProximityQuery::new().class("A").code(*code)))
    }
}
