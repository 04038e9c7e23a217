//! Loaders for GeoNames dumps (`allCountries.txt`, `featureCodes_en.txt`).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use tracing::{info, warn};

use crate::models::{FeatureTypeCode, NamedFeature};

fn open_maybe_gz(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(reader)
}

fn tsv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .from_reader(reader)
}

/// Load named features from a GeoNames table (optionally gzipped).
pub fn load_geonames(path: &Path) -> Result<Vec<NamedFeature>> {
    info!("Loading named features from {}", path.display());
    let features = read_geonames(open_maybe_gz(path)?)?;
    info!("Loaded {} named features", features.len());
    Ok(features)
}

/// Parse the GeoNames main table.
///
/// Columns: 0 geonameid, 1 name, 4 latitude, 5 longitude, 6 feature class,
/// 7 feature code, 8 country code, 14 population.
pub fn read_geonames<R: Read>(reader: R) -> Result<Vec<NamedFeature>> {
    let mut csv_reader = tsv_reader(reader);
    let mut features = Vec::new();
    let mut skipped = 0usize;

    for result in csv_reader.records() {
        let record = result?;
        if record.len() < 15 {
            skipped += 1;
            continue;
        }

        let (Ok(id), Ok(lat), Ok(lng)) = (
            record[0].parse::<i64>(),
            record[4].parse::<f64>(),
            record[5].parse::<f64>(),
        ) else {
            skipped += 1;
            continue;
        };

        features.push(NamedFeature {
            id,
            name: record[1].to_string(),
            lat,
            lng,
            feature_class: record[6].to_string(),
            feature_code: record[7].to_string(),
            country_code: record[8].to_string(),
            population: record[14].parse::<u64>().ok().filter(|p| *p > 0),
        });
    }

    if skipped > 0 {
        warn!("Skipped {} malformed GeoNames rows", skipped);
    }
    Ok(features)
}

/// Load feature type codes from a GeoNames feature code listing.
pub fn load_feature_codes(path: &Path) -> Result<Vec<FeatureTypeCode>> {
    info!("Loading feature codes from {}", path.display());
    read_feature_codes(open_maybe_gz(path)?)
}

/// Parse `A.ADM2<TAB>name<TAB>description` lines. Entries without a
/// `class.code` pair (the trailing `null` row) are ignored.
pub fn read_feature_codes<R: Read>(reader: R) -> Result<Vec<FeatureTypeCode>> {
    let mut csv_reader = tsv_reader(reader);
    let mut codes = Vec::new();

    for result in csv_reader.records() {
        let record = result?;
        let Some((class, code)) = record.get(0).and_then(|c| c.split_once('.')) else {
            continue;
        };
        codes.push(FeatureTypeCode {
            feature_class: class.to_string(),
            feature_code: code.to_string(),
            name: record.get(1).unwrap_or("").to_string(),
            description: record.get(2).unwrap_or("").to_string(),
        });
    }

    Ok(codes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "5128581\tNew York City\tNew York City\tNYC\t40.71427\t-74.00597\tP\tPPL\tUS\t\tNY\t\t\t\t8804190\t10\t57\tAmerica/New_York\t2024-01-01\n\
5128638\tNew York\tNew York\t\t43.00035\t-75.4999\tA\tADM1\tUS\t\tNY\t\t\t\t0\t\t307\tAmerica/New_York\t2024-01-01\n\
broken\trow\n";

    #[test]
    fn test_read_geonames() {
        let features = read_geonames(SAMPLE.as_bytes()).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].name, "New York City");
        assert_eq!(features[0].feature_code, "PPL");
        assert_eq!(features[0].population, Some(8_804_190));
        assert_eq!(features[1].population, None);
        assert!((features[1].lng - -75.4999).abs() < 1e-9);
    }

    #[test]
    fn test_read_feature_codes() {
        let text = "A.ADM2\tsecond-order administrative division\ta subdivision of a first-order administrative division\n\
P.PPLX\tsection of populated place\t\n\
null\tnot available\t\n";
        let codes = read_feature_codes(text.as_bytes()).unwrap();
        assert_eq!(codes.len(), 2);
        assert_eq!(codes[0].feature_class, "A");
        assert_eq!(codes[1].feature_code, "PPLX");
    }

    #[test]
    fn test_load_gzipped_file() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.txt.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(SAMPLE.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let features = load_geonames(&path).unwrap();
        assert_eq!(features.len(), 2);
    }
}
