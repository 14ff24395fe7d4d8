use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::Error;
use crate::provider::RawPoi;

#[derive(Debug, Deserialize)]
struct PoiRow {
    uid: String,
    category: String,
    #[serde(default)]
    name: String,
    lon: f64,
    lat: f64,
}

/// Reads POIs with geographic coordinates from a CSV file.
pub fn load_pois(path: &Path) -> Result<Vec<RawPoi>, Error> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| Error::InvalidData(format!("cannot read POI CSV {}: {e}", path.display())))?;

    let mut pois = Vec::new();
    for row in reader.deserialize() {
        let row: PoiRow = row
            .map_err(|e| Error::InvalidData(format!("bad POI row in {}: {e}", path.display())))?;
        pois.push(RawPoi {
            uid: row.uid,
            category: row.category,
            name: row.name,
            lon: row.lon,
            lat: row.lat,
        });
    }

    info!("loaded {} POIs from {}", pois.len(), path.display());
    Ok(pois)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_pois_with_optional_names() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "uid,category,name,lon,lat").unwrap();
        writeln!(file, "p1,nursery,Little Stars,11.5013,48.1001").unwrap();
        writeln!(file, "p2,cafe,,11.5015,48.1002").unwrap();

        let pois = load_pois(file.path()).unwrap();
        assert_eq!(pois.len(), 2);
        assert_eq!(pois[0].category, "nursery");
        assert!(pois[1].name.is_empty());
    }
}
