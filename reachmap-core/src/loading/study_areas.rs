use std::fs;
use std::path::Path;

use geo::Geometry;
use geojson::GeoJson;
use log::info;

use crate::Error;
use crate::model::StudyArea;

/// Reads study areas from a GeoJSON feature collection.
///
/// Each feature becomes one study area; `id` and `name` properties are
/// picked up when present, with the feature index as fallback id.
pub fn load_study_areas(path: &Path) -> Result<Vec<StudyArea>, Error> {
    let raw = fs::read_to_string(path)?;
    let geojson = raw
        .parse::<GeoJson>()
        .map_err(|e| Error::GeoJsonError(format!("{}: {e}", path.display())))?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(Error::UnsupportedGeometry(format!(
            "{} is not a feature collection",
            path.display()
        )));
    };

    let mut areas = Vec::with_capacity(collection.features.len());
    for (index, feature) in collection.features.into_iter().enumerate() {
        let Some(geometry) = feature.geometry else {
            return Err(Error::UnsupportedGeometry(format!(
                "study area feature {index} has no geometry"
            )));
        };
        let geometry = Geometry::<f64>::try_from(geometry.value)
            .map_err(|e| Error::UnsupportedGeometry(e.to_string()))?;

        let id = feature
            .properties
            .as_ref()
            .and_then(|props| props.get("id"))
            .and_then(serde_json::Value::as_u64)
            .map_or(index as u32, |id| id as u32);
        let name = feature
            .properties
            .as_ref()
            .and_then(|props| props.get("name"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();

        areas.push(StudyArea { id, name, geometry });
    }

    info!("loaded {} study areas from {}", areas.len(), path.display());
    Ok(areas)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_polygon_features() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"type":"FeatureCollection","features":[{{"type":"Feature","properties":{{"id":83110000,"name":"Freiburg"}},"geometry":{{"type":"Polygon","coordinates":[[[7.7,47.9],[7.9,47.9],[7.9,48.1],[7.7,48.1],[7.7,47.9]]]}}}}]}}"#
        )
        .unwrap();

        let areas = load_study_areas(file.path()).unwrap();
        assert_eq!(areas.len(), 1);
        assert_eq!(areas[0].id, 83110000);
        assert_eq!(areas[0].name, "Freiburg");
        assert!(matches!(areas[0].geometry, Geometry::Polygon(_)));
    }

    #[test]
    fn bare_geometry_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"type":"Polygon","coordinates":[[[7.7,47.9],[7.9,47.9],[7.9,48.1],[7.7,47.9]]]}}"#
        )
        .unwrap();

        assert!(matches!(
            load_study_areas(file.path()),
            Err(Error::UnsupportedGeometry(_))
        ));
    }
}
