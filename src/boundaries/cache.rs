//! On-disk cache of raw geometry payloads.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};
use xxhash_rust::xxh64::xxh64;

use crate::models::AdmLevel;

/// First 8 hex digits of the xxh64 of a source URL.
pub fn url_hash(url: &str) -> String {
    let full = format!("{:016x}", xxh64(url.as_bytes(), 0));
    full[..8].to_string()
}

pub struct GeometryCache {
    dir: PathBuf,
}

impl GeometryCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{ISO3}-{ADMn}-{hash}.geojson`
    pub fn path_for(&self, iso3: &str, level: AdmLevel, url: &str) -> PathBuf {
        self.dir.join(format!(
            "{}-{}-{}.geojson",
            iso3.to_ascii_uppercase(),
            level.code(),
            url_hash(url)
        ))
    }

    pub fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => {
                debug!("Cache hit {}", path.display());
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write through a temp file in the cache dir so readers never see a
    /// partial payload.
    pub fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    pub fn evict(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Could not remove cache file {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_shape() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GeometryCache::new(dir.path()).unwrap();
        let path = cache.path_for("usa", AdmLevel::Adm2, "https://example.org/a.geojson");
        let name = path.file_name().unwrap().to_str().unwrap();

        assert!(name.starts_with("USA-ADM2-"));
        assert!(name.ends_with(".geojson"));
        let hash = &name["USA-ADM2-".len()..name.len() - ".geojson".len()];
        assert_eq!(hash.len(), 8);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_depends_on_url() {
        assert_ne!(url_hash("https://a"), url_hash("https://b"));
        assert_eq!(url_hash("https://a"), url_hash("https://a"));
    }

    #[test]
    fn test_write_read_evict() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GeometryCache::new(dir.path().join("nested")).unwrap();
        let path = cache.path_for("FRA", AdmLevel::Adm1, "u");

        assert_eq!(cache.read(&path).unwrap(), None);
        cache.write(&path, b"{}").unwrap();
        assert_eq!(cache.read(&path).unwrap(), Some(b"{}".to_vec()));
        cache.evict(&path);
        assert_eq!(cache.read(&path).unwrap(), None);
    }
}
