//! Administrative boundary types.

use chrono::{DateTime, Utc};
use geo::{BoundingRect, MultiPolygon};
use serde::{Deserialize, Serialize};

/// Administrative level, country (ADM0) down to block (ADM5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum AdmLevel {
    /// Country
    Adm0,
    /// State / province
    Adm1,
    /// County / parish / district
    Adm2,
    /// Municipality / township
    Adm3,
    /// Sub-municipality / neighborhood
    Adm4,
    /// Sub-neighborhood / block
    Adm5,
}

impl AdmLevel {
    pub fn from_index(level: u8) -> Option<Self> {
        match level {
            0 => Some(AdmLevel::Adm0),
            1 => Some(AdmLevel::Adm1),
            2 => Some(AdmLevel::Adm2),
            3 => Some(AdmLevel::Adm3),
            4 => Some(AdmLevel::Adm4),
            5 => Some(AdmLevel::Adm5),
            _ => None,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            AdmLevel::Adm0 => 0,
            AdmLevel::Adm1 => 1,
            AdmLevel::Adm2 => 2,
            AdmLevel::Adm3 => 3,
            AdmLevel::Adm4 => 4,
            AdmLevel::Adm5 => 5,
        }
    }

    /// Get all levels in hierarchical order (country first)
    pub fn all() -> &'static [AdmLevel] {
        &[
            AdmLevel::Adm0,
            AdmLevel::Adm1,
            AdmLevel::Adm2,
            AdmLevel::Adm3,
            AdmLevel::Adm4,
            AdmLevel::Adm5,
        ]
    }

    /// Source label, e.g. `ADM2`.
    pub fn code(&self) -> &'static str {
        match self {
            AdmLevel::Adm0 => "ADM0",
            AdmLevel::Adm1 => "ADM1",
            AdmLevel::Adm2 => "ADM2",
            AdmLevel::Adm3 => "ADM3",
            AdmLevel::Adm4 => "ADM4",
            AdmLevel::Adm5 => "ADM5",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let digit = code.trim().to_ascii_uppercase();
        let digit = digit.strip_prefix("ADM")?;
        AdmLevel::from_index(digit.parse().ok()?)
    }
}

impl std::fmt::Display for AdmLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Upsert identity of a boundary row: `(name, level, shape id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoundaryKey {
    pub name: String,
    pub level: AdmLevel,
    pub shape_id: String,
}

impl BoundaryKey {
    pub fn new(name: impl Into<String>, level: AdmLevel, shape_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level,
            shape_id: shape_id.into(),
        }
    }

    /// Stable byte key for ordered key-value stores.
    pub fn storage_key(&self) -> Vec<u8> {
        format!("{}\u{1f}{}\u{1f}{}", self.level.code(), self.shape_id, self.name).into_bytes()
    }
}

impl std::fmt::Display for BoundaryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.level, self.name, self.shape_id)
    }
}

/// A single administrative boundary with its geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Boundary {
    pub key: BoundaryKey,

    /// ISO 3166-1 alpha-3 of the country this shape belongs to
    pub country_iso3: String,

    /// Subdivision code from the source (e.g. `US-TX`), if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape_iso: Option<String>,

    /// Source shape type tag (e.g. `ADM2`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape_type: Option<String>,

    pub geometry: MultiPolygon<f64>,

    pub imported_at: DateTime<Utc>,
}

impl Boundary {
    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn level(&self) -> AdmLevel {
        self.key.level
    }

    /// Get the bounding box as `(min_lng, min_lat, max_lng, max_lat)`
    pub fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        self.geometry
            .bounding_rect()
            .map(|rect| (rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }

    /// True when `code` (alpha-2 or alpha-3) names this boundary's country.
    pub fn in_country(&self, code: &str) -> bool {
        let code = code.trim();
        if code.eq_ignore_ascii_case(&self.country_iso3) {
            return true;
        }
        crate::country::alpha2_to_alpha3(code)
            .map(|iso3| iso3.eq_ignore_ascii_case(&self.country_iso3))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_codes() {
        assert_eq!(AdmLevel::from_code("adm3"), Some(AdmLevel::Adm3));
        assert_eq!(AdmLevel::from_code("ADM6"), None);
        assert_eq!(AdmLevel::Adm5.code(), "ADM5");
        assert!(AdmLevel::Adm0 < AdmLevel::Adm5);
    }

    #[test]
    fn test_storage_key_distinguishes_shapes() {
        let a = BoundaryKey::new("Springfield", AdmLevel::Adm3, "S1");
        let b = BoundaryKey::new("Springfield", AdmLevel::Adm3, "S2");
        assert_ne!(a.storage_key(), b.storage_key());
    }
}
