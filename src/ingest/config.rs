use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use georesolve::boundaries::{IngestSettings, DEFAULT_API_BASE};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub global: GlobalConfig,
    #[serde(default)]
    pub countries: Vec<CountryConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalConfig {
    pub store_path: PathBuf,
    pub cache_dir: PathBuf,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CountryConfig {
    pub code: String,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_concurrent() -> usize {
    4
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        Ok(config)
    }

    pub fn ingest_settings(&self) -> IngestSettings {
        IngestSettings {
            api_base: self.global.api_base.clone(),
            timeout: Duration::from_secs(self.global.timeout_secs),
            ..IngestSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_defaults() {
        let config = Config::parse(
            r#"
            [global]
            store_path = "/var/lib/georesolve/boundaries"
            cache_dir = "/var/cache/georesolve"

            [[countries]]
            code = "US"

            [[countries]]
            code = "FRA"
            "#,
        )
        .unwrap();

        assert_eq!(config.global.api_base, DEFAULT_API_BASE);
        assert_eq!(config.global.max_concurrent, 4);
        assert_eq!(config.ingest_settings().timeout, Duration::from_secs(60));
        let codes: Vec<_> = config.countries.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["US", "FRA"]);
    }

    #[test]
    fn test_missing_global_is_an_error() {
        assert!(Config::parse("[[countries]]\ncode = \"US\"\n").is_err());
    }
}
