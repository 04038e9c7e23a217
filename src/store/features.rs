//! Point-feature store used by proximity search.

use rstar::primitives::GeomWithData;
use rstar::{RTree, AABB};

use crate::error::StoreError;
use crate::models::{FeatureTypeCode, GeoBox, NamedFeature};

/// Read access to named point features and their type codes.
pub trait FeatureStore: Send + Sync {
    /// Features inside `area`, optionally restricted by class and/or code.
    fn candidates(
        &self,
        area: &GeoBox,
        feature_class: Option<&str>,
        feature_code: Option<&str>,
    ) -> Result<Vec<NamedFeature>, StoreError>;

    /// All known feature type codes, ordered by class then code.
    fn feature_types(&self) -> Result<Vec<FeatureTypeCode>, StoreError>;
}

type IndexedFeature = GeomWithData<[f64; 2], NamedFeature>;

/// Feature store held in an R-tree keyed by `[lng, lat]`.
pub struct MemoryFeatureStore {
    tree: RTree<IndexedFeature>,
    types: Vec<FeatureTypeCode>,
}

impl MemoryFeatureStore {
    pub fn new(features: Vec<NamedFeature>, mut types: Vec<FeatureTypeCode>) -> Self {
        let indexed: Vec<IndexedFeature> = features
            .into_iter()
            .map(|f| GeomWithData::new([f.lng, f.lat], f))
            .collect();

        types.sort_by(|a, b| {
            a.feature_class
                .cmp(&b.feature_class)
                .then_with(|| a.feature_code.cmp(&b.feature_code))
        });

        Self {
            tree: RTree::bulk_load(indexed),
            types,
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl FeatureStore for MemoryFeatureStore {
    fn candidates(
        &self,
        area: &GeoBox,
        feature_class: Option<&str>,
        feature_code: Option<&str>,
    ) -> Result<Vec<NamedFeature>, StoreError> {
        let mut out = Vec::new();
        for (min_lng, max_lng) in area.spans() {
            let envelope = AABB::from_corners([min_lng, area.min_lat], [max_lng, area.max_lat]);
            out.extend(
                self.tree
                    .locate_in_envelope(&envelope)
                    .map(|entry| &entry.data)
                    .filter(|f| feature_class.map_or(true, |c| f.feature_class == c))
                    .filter(|f| feature_code.map_or(true, |c| f.feature_code == c))
                    .cloned(),
            );
        }
        Ok(out)
    }

    fn feature_types(&self) -> Result<Vec<FeatureTypeCode>, StoreError> {
        Ok(self.types.clone())
    }
}
