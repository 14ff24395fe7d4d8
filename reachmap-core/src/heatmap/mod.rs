//! Heatmap reader: streams opportunity archives for a query region and
//! reduces them into a hex-polygon feature layer.

use std::str::FromStr;

use geojson::{Feature, FeatureCollection, Geometry, Value as GeoJsonValue};
use h3o::CellIndex;
use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use log::{info, warn};
use serde_json::json;

use crate::model::{Mode, Profile, StudyArea};
use crate::storage::MatrixStore;
use crate::{Error, ReachmapConfig, tiling};

/// How per-grid travel times to a category's POIs are reduced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Aggregation {
    /// Travel time to the closest POI.
    #[default]
    Minimum,
    /// Mean travel time over all reachable POIs.
    Average,
}

impl FromStr for Aggregation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "min" | "minimum" => Ok(Self::Minimum),
            "avg" | "average" => Ok(Self::Average),
            other => Err(Error::InvalidData(format!(
                "unknown aggregation `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeatmapRequest {
    pub mode: Mode,
    pub profile: Profile,
    pub max_travel_time_min: u32,
    pub categories: Vec<String>,
    pub aggregation: Aggregation,
}

#[derive(Debug)]
pub struct HeatmapResult {
    pub collection: FeatureCollection,
    /// Fraction of the expected bulk cells that had at least one archive.
    pub coverage_ratio: f64,
}

/// Reduction state for one grid cell; never materializes the full
/// POI-by-origin cross product.
#[derive(Debug, Clone, Copy)]
struct Accumulator {
    min: u32,
    sum: u64,
    count: u64,
}

impl Accumulator {
    fn new(value: u32) -> Self {
        Self {
            min: value,
            sum: u64::from(value),
            count: 1,
        }
    }

    fn fold(&mut self, value: u32) {
        self.min = self.min.min(value);
        self.sum += u64::from(value);
        self.count += 1;
    }

    fn value(&self, aggregation: Aggregation) -> u32 {
        match aggregation {
            Aggregation::Minimum => self.min,
            Aggregation::Average => (self.sum / self.count) as u32,
        }
    }
}

/// Loads the opportunity archives covering `study_areas` and reduces them
/// into one feature per grid cell and category.
///
/// Missing archives degrade to partial coverage, never to an error; the
/// result's `coverage_ratio` reports how partial.
pub fn read_heatmap(
    store: &MatrixStore,
    study_areas: &[StudyArea],
    request: &HeatmapRequest,
    config: &ReachmapConfig,
) -> Result<HeatmapResult, Error> {
    let speed_mps = request.mode.default_speed_mps();
    let buffer_m = speed_mps * f64::from(request.max_travel_time_min) * 60.0;
    let bulk_ids = tiling::cover_study_areas(study_areas, config.bulk_resolution, buffer_m)?;

    let max_seconds = request.max_travel_time_min * 60;
    let mut covered_bulks: HashSet<u64> = HashSet::new();
    let mut features = Vec::new();

    for category in request.categories.iter().sorted().dedup() {
        let mut accumulators: HashMap<u64, Accumulator> = HashMap::new();

        for &bulk_id in &bulk_ids {
            let matrix = match store.read_opportunity(request.mode, &request.profile, bulk_id, category)
            {
                Ok(Some(matrix)) => matrix,
                Ok(None) => continue,
                Err(Error::ArchiveCorrupt(reason)) => {
                    warn!("treating opportunity archive for {bulk_id}/{category} as missing: {reason}");
                    continue;
                }
                Err(e) => return Err(e),
            };
            covered_bulks.insert(u64::from(bulk_id));

            for (times, grids) in matrix.travel_times.iter().zip(matrix.grid_ids.iter()) {
                for (&travel_time, &grid_id) in times.iter().zip(grids) {
                    accumulators
                        .entry(grid_id)
                        .and_modify(|acc| acc.fold(travel_time))
                        .or_insert_with(|| Accumulator::new(travel_time));
                }
            }
        }

        for (&grid_id, accumulator) in accumulators.iter().sorted_by_key(|&(&grid_id, _)| grid_id) {
            let value = accumulator.value(request.aggregation);
            if value > max_seconds {
                continue;
            }
            match grid_feature(grid_id, category, value) {
                Ok(feature) => features.push(feature),
                Err(e) => warn!("skipping grid {grid_id:#x}: {e}"),
            }
        }
    }

    let coverage_ratio = if bulk_ids.is_empty() {
        1.0
    } else {
        covered_bulks.len() as f64 / bulk_ids.len() as f64
    };
    info!(
        "heatmap query produced {} features over {} bulk cells (coverage {:.2})",
        features.len(),
        bulk_ids.len(),
        coverage_ratio
    );

    let collection = FeatureCollection {
        features,
        bbox: None,
        foreign_members: Some(
            json!({ "coverage_ratio": coverage_ratio })
                .as_object()
                .cloned()
                .unwrap_or_default(),
        ),
    };
    Ok(HeatmapResult {
        collection,
        coverage_ratio,
    })
}

fn grid_feature(grid_id: u64, category: &str, value: u32) -> Result<Feature, Error> {
    let cell = CellIndex::try_from(grid_id)
        .map_err(|e| Error::InvalidData(format!("archive carries invalid H3 id: {e}")))?;
    let polygon = tiling::cell_polygon(cell);
    let geometry = Geometry::new(GeoJsonValue::from(&polygon));

    let feature = json!({
        "type": "Feature",
        "geometry": geometry,
        "properties": {
            "grid_id": cell.to_string(),
            "category": category,
            "travel_time": value,
        }
    });
    serde_json::from_value::<Feature>(feature).map_err(|e| Error::GeoJsonError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_tracks_min_and_mean() {
        let mut acc = Accumulator::new(300);
        acc.fold(120);
        acc.fold(600);
        assert_eq!(acc.value(Aggregation::Minimum), 120);
        assert_eq!(acc.value(Aggregation::Average), 340);
    }

    #[test]
    fn adding_a_closer_poi_never_raises_the_minimum() {
        let mut acc = Accumulator::new(300);
        let before = acc.value(Aggregation::Minimum);
        acc.fold(120);
        assert!(acc.value(Aggregation::Minimum) <= before);
    }

    #[test]
    fn aggregation_parses_both_spellings() {
        assert_eq!("min".parse::<Aggregation>().unwrap(), Aggregation::Minimum);
        assert_eq!(
            "average".parse::<Aggregation>().unwrap(),
            Aggregation::Average
        );
        assert!("p95".parse::<Aggregation>().is_err());
    }

    #[test]
    fn grid_feature_carries_canonical_id() {
        let cell = h3o::LatLng::new(48.14, 11.57)
            .unwrap()
            .to_cell(h3o::Resolution::Ten);
        let feature = grid_feature(u64::from(cell), "nursery", 120).unwrap();
        let properties = feature.properties.unwrap();
        assert_eq!(
            properties["grid_id"],
            serde_json::Value::String(cell.to_string())
        );
        assert_eq!(properties["travel_time"], serde_json::json!(120));
    }
}
