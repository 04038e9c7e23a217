//! Boundary metadata and geometry download.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::models::AdmLevel;

pub const DEFAULT_API_BASE: &str = "https://www.geoboundaries.org/api/current/gbOpen/";

/// HTTP settings for [`HttpBoundarySource`].
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub api_base: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(60),
            user_agent: concat!("georesolve/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Where a level's geometry can be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelMetadata {
    pub geometry_url: String,
    pub simplified: bool,
}

impl LevelMetadata {
    /// Pick the download URL from a metadata document, preferring the
    /// simplified geometry. The API answers with an object, or with an
    /// array of them for some queries; the first entry is used.
    pub fn from_json(value: &Value) -> Option<Self> {
        let entry = match value {
            Value::Array(items) => items.first()?,
            other => other,
        };

        let url_field = |name: &str| {
            entry
                .get(name)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        if let Some(url) = url_field("simplifiedGeometryGeoJSON") {
            return Some(Self {
                geometry_url: url,
                simplified: true,
            });
        }
        url_field("gjDownloadURL").map(|url| Self {
            geometry_url: url,
            simplified: false,
        })
    }
}

/// Source of raw boundary data, one country and level at a time.
#[async_trait]
pub trait BoundarySource: Send + Sync {
    /// Metadata for a level, `None` when the source has no data for it.
    async fn fetch_metadata(&self, iso3: &str, level: AdmLevel) -> Result<Option<LevelMetadata>>;

    /// Raw feature-collection payload behind a geometry URL.
    async fn fetch_geometry(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpBoundarySource {
    client: Client,
    api_base: Url,
}

impl HttpBoundarySource {
    pub fn new(settings: &IngestSettings) -> Result<Self> {
        let mut base = settings.api_base.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let api_base = Url::parse(&base).context("Invalid boundary API base URL")?;

        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, api_base })
    }

    fn metadata_url(&self, iso3: &str, level: AdmLevel) -> Result<Url> {
        self.api_base
            .join(&format!("{}/{}/", iso3.to_ascii_uppercase(), level.code()))
            .context("Failed to build metadata URL")
    }
}

#[async_trait]
impl BoundarySource for HttpBoundarySource {
    async fn fetch_metadata(&self, iso3: &str, level: AdmLevel) -> Result<Option<LevelMetadata>> {
        let url = self.metadata_url(iso3, level)?;
        debug!("Fetching boundary metadata {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("Metadata request {} returned {}", url, response.status());
        }

        let body: Value = response
            .json()
            .await
            .with_context(|| format!("Metadata from {} is not JSON", url))?;
        Ok(LevelMetadata::from_json(&body))
    }

    async fn fetch_geometry(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Downloading geometry {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        if !response.status().is_success() {
            anyhow::bail!("Geometry request {} returned {}", url, response.status());
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prefers_simplified_geometry() {
        let meta = LevelMetadata::from_json(&json!({
            "boundaryISO": "USA",
            "gjDownloadURL": "https://example.org/full.geojson",
            "simplifiedGeometryGeoJSON": "https://example.org/simple.geojson"
        }))
        .unwrap();
        assert_eq!(meta.geometry_url, "https://example.org/simple.geojson");
        assert!(meta.simplified);
    }

    #[test]
    fn test_falls_back_to_full_resolution() {
        let meta = LevelMetadata::from_json(&json!([{
            "gjDownloadURL": "https://example.org/full.geojson",
            "simplifiedGeometryGeoJSON": ""
        }]))
        .unwrap();
        assert_eq!(meta.geometry_url, "https://example.org/full.geojson");
        assert!(!meta.simplified);
    }

    #[test]
    fn test_no_urls_means_no_data() {
        assert!(LevelMetadata::from_json(&json!({"boundaryISO": "USA"})).is_none());
        assert!(LevelMetadata::from_json(&json!([])).is_none());
    }

    #[test]
    fn test_metadata_url() {
        let source = HttpBoundarySource::new(&IngestSettings {
            api_base: "https://example.org/api/gbOpen".into(),
            ..IngestSettings::default()
        })
        .unwrap();
        let url = source.metadata_url("deu", AdmLevel::Adm2).unwrap();
        assert_eq!(url.as_str(), "https://example.org/api/gbOpen/DEU/ADM2/");
    }
}
