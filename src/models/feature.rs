//! Named point features and their type codes (GeoNames-style).

use serde::{Deserialize, Serialize};

use super::{HasCoordinates, Point};

/// A named point feature from the externally maintained reference dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedFeature {
    pub id: i64,
    pub name: String,
    pub lat: f64,
    pub lng: f64,

    /// Single-letter category, e.g. `A` (admin) or `P` (populated place)
    pub feature_class: String,

    /// Subtype within the class, e.g. `ADM2` or `PPLX`
    pub feature_code: String,

    pub country_code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
}

impl NamedFeature {
    pub fn point(&self) -> Point {
        Point::new(self.lat, self.lng)
    }
}

impl HasCoordinates for NamedFeature {
    fn latitude(&self) -> f64 {
        self.lat
    }

    fn longitude(&self) -> f64 {
        self.lng
    }
}

/// Feature class + code with a human description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureTypeCode {
    pub feature_class: String,
    pub feature_code: String,
    pub name: String,
    pub description: String,
}

impl FeatureTypeCode {
    /// Case-insensitive substring match on name or description.
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        self.name.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let code = FeatureTypeCode {
            feature_class: "A".into(),
            feature_code: "ADM2".into(),
            name: "second-order administrative division".into(),
            description: "a subdivision of a first-order administrative division".into(),
        };
        assert!(code.matches_keyword("SECOND-ORDER"));
        assert!(code.matches_keyword("subdivision"));
        assert!(!code.matches_keyword("lake"));
        assert!(!code.matches_keyword("  "));
    }
}
