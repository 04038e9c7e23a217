//! Point-in-polygon resolution across administrative levels.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::proximity::{ProximityHit, ProximityIndex};
use crate::error::GeoError;
use crate::models::{AdmLevel, Boundary, Point};
use crate::store::{BoundaryStore, SpatialCapability};

/// Upper bound on rows returned by a single containment query.
pub const CONTAINMENT_LIMIT: usize = 50;

/// Result of a resolver that may fall back to the point-feature dataset.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AdminUnit {
    Boundary(Arc<Boundary>),
    Feature(ProximityHit),
}

impl AdminUnit {
    pub fn name(&self) -> &str {
        match self {
            AdminUnit::Boundary(b) => b.name(),
            AdminUnit::Feature(hit) => &hit.feature.name,
        }
    }

    pub fn as_boundary(&self) -> Option<&Arc<Boundary>> {
        match self {
            AdminUnit::Boundary(b) => Some(b),
            AdminUnit::Feature(_) => None,
        }
    }
}

/// Everything the locator knows about one point.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdminContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<Arc<Boundary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Arc<Boundary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub county: Option<AdminUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub township: Option<AdminUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdivision: Option<ProximityHit>,
}

/// Bring a point into range, swapping the axes when only that helps.
///
/// A latitude outside [-90, 90] is commonly a transposed pair; a longitude
/// outside [-180, 180] on its own is not repaired.
pub fn repair_point(point: Point) -> Option<Point> {
    if !point.lat.is_finite() || !point.lng.is_finite() {
        return None;
    }
    if point.is_valid() {
        return Some(point);
    }
    if !point.lat_in_range() {
        let swapped = point.swapped();
        if swapped.is_valid() {
            debug!(
                "Swapped transposed coordinates ({}, {})",
                point.lat, point.lng
            );
            return Some(swapped);
        }
    }
    None
}

pub struct BoundaryLocator {
    store: Arc<dyn BoundaryStore>,
    capability: SpatialCapability,
    proximity: Option<Arc<ProximityIndex>>,
}

impl BoundaryLocator {
    /// Create a locator over `store`. `capability` is the result of one
    /// [`BoundaryStore::capability`] probe for this logical operation.
    pub fn new(store: Arc<dyn BoundaryStore>, capability: SpatialCapability) -> Self {
        Self {
            store,
            capability,
            proximity: None,
        }
    }

    /// Probe the store once and build a locator from the result.
    pub fn probe(store: Arc<dyn BoundaryStore>) -> Self {
        let capability = store.capability();
        Self::new(store, capability)
    }

    pub fn with_proximity(mut self, proximity: Arc<ProximityIndex>) -> Self {
        self.proximity = Some(proximity);
        self
    }

    pub fn capability(&self) -> SpatialCapability {
        self.capability
    }

    pub fn proximity(&self) -> Option<&Arc<ProximityIndex>> {
        self.proximity.as_ref()
    }

    /// Boundaries containing the point, ordered by level.
    ///
    /// Backend failures are logged and yield an empty result.
    pub fn containing_boundaries(
        &self,
        point: Point,
        levels: Option<&[AdmLevel]>,
    ) -> Vec<Arc<Boundary>> {
        let Some(point) = repair_point(point) else {
            debug!(
                "{}",
                GeoError::InvalidCoordinate {
                    lat: point.lat,
                    lng: point.lng
                }
            );
            return Vec::new();
        };

        if !self.capability.is_available() {
            warn!("{}; returning no boundaries", GeoError::SpatialCapabilityUnavailable);
            return Vec::new();
        }

        match self.store.containing(point, levels, CONTAINMENT_LIMIT) {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    "Containment query failed at ({}, {}): {}",
                    point.lat, point.lng, e
                );
                Vec::new()
            }
        }
    }

    pub fn containing_boundary(&self, point: Point, level: AdmLevel) -> Option<Arc<Boundary>> {
        self.containing_boundaries(point, Some(&[level]))
            .into_iter()
            .next()
    }

    /// Whether a country boundary tagged with `country_code` contains the point.
    pub fn in_country(&self, point: Point, country_code: &str) -> bool {
        self.containing_boundaries(point, Some(&[AdmLevel::Adm0]))
            .iter()
            .any(|b| b.in_country(country_code))
    }

    /// County or parish: ADM2 containment, else the nearest county feature.
    ///
    /// When falling back, containment is retried at the feature's own
    /// coordinates so a county known under a different name in the feature
    /// dataset still resolves to its boundary.
    pub fn county(&self, point: Point) -> Option<AdminUnit> {
        if let Some(boundary) = self.containing_boundary(point, AdmLevel::Adm2) {
            return Some(AdminUnit::Boundary(boundary));
        }

        let hit = self.proximity.as_ref()?.closest_county(point)?;
        if let Some(boundary) = self.containing_boundary(hit.feature.point(), AdmLevel::Adm2) {
            debug!(
                "County {} bridged to boundary {}",
                hit.feature.name,
                boundary.name()
            );
            return Some(AdminUnit::Boundary(boundary));
        }
        Some(AdminUnit::Feature(hit))
    }

    /// State or province, ADM1 containment only.
    pub fn state(&self, point: Point) -> Option<Arc<Boundary>> {
        self.containing_boundary(point, AdmLevel::Adm1)
    }

    /// Township: ADM5, ADM4, then ADM3 containment, else the nearest
    /// township feature.
    pub fn township(&self, point: Point) -> Option<AdminUnit> {
        for level in [AdmLevel::Adm5, AdmLevel::Adm4, AdmLevel::Adm3] {
            if let Some(boundary) = self.containing_boundary(point, level) {
                return Some(AdminUnit::Boundary(boundary));
            }
        }
        self.proximity
            .as_ref()?
            .closest_township(point)
            .map(AdminUnit::Feature)
    }

    pub fn subdivision(&self, point: Point) -> Option<ProximityHit> {
        self.proximity.as_ref()?.closest_subdivision(point)
    }

    pub fn full_context(&self, point: Point) -> AdminContext {
        AdminContext {
            country: self.containing_boundary(point, AdmLevel::Adm0),
            state: self.state(point),
            county: self.county(point),
            township: self.township(point),
            subdivision: self.subdivision(point),
        }
    }
}
