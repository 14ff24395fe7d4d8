//! Opportunity matrix builder: intersects precomputed traveltime rasters
//! with POIs and publishes per-category reachability archives.

use h3o::CellIndex;
use hashbrown::HashMap;
use itertools::Itertools;
use log::{info, warn};
use rayon::prelude::*;

use crate::model::{BulkPlan, Mode, OpportunityMatrix, Poi, Profile, TraveltimeMatrix};
use crate::provider::PoiSource;
use crate::storage::MatrixStore;
use crate::{Error, tiling};

/// Outcome counters for one opportunity build.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OpportunitySummary {
    pub bulks_processed: usize,
    pub bulks_without_traveltimes: usize,
    pub archives_written: usize,
}

/// Builds opportunity archives for every bulk cell in `plan`.
///
/// POI queries are fanned out concurrently and joined before any archive
/// is written. A bulk without a traveltime archive contributes nothing;
/// a corrupt one is treated as missing and logged.
pub fn build_opportunity<P: PoiSource>(
    store: &MatrixStore,
    poi_source: &P,
    plan: &BulkPlan,
    mode: Mode,
    profile: &Profile,
    pixel_zoom: u8,
    categories: Option<&[String]>,
) -> Result<OpportunitySummary, Error> {
    let pois_per_bulk: Vec<(CellIndex, Vec<Poi>)> = plan
        .cells
        .par_iter()
        .map(|cell| {
            let polygon = tiling::cell_polygon(cell.bulk_id);
            poi_source
                .pois_in_polygon(&polygon, pixel_zoom, categories)
                .map(|pois| (cell.bulk_id, pois))
        })
        .collect::<Result<_, _>>()?;

    let mut summary = OpportunitySummary::default();
    for (bulk_id, pois) in pois_per_bulk {
        summary.bulks_processed += 1;

        let matrix = match store.read_traveltime(mode, profile, bulk_id) {
            Ok(Some(matrix)) => matrix,
            Ok(None) => {
                summary.bulks_without_traveltimes += 1;
                continue;
            }
            Err(Error::ArchiveCorrupt(reason)) => {
                warn!("skipping bulk {bulk_id}: traveltime archive corrupt ({reason})");
                summary.bulks_without_traveltimes += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        let by_category = intersect_pois(&matrix, &pois);
        for category in by_category.keys().sorted() {
            store.write_opportunity(mode, profile, bulk_id, category, &by_category[category])?;
            summary.archives_written += 1;
        }
    }

    info!(
        "opportunity build: {} bulks, {} without traveltimes, {} archives",
        summary.bulks_processed, summary.bulks_without_traveltimes, summary.archives_written
    );
    Ok(summary)
}

/// Looks up each POI's pixel in every start window that contains it and
/// groups the surviving reachability rows by category.
///
/// Categories are discovered from the POIs themselves; POIs no start can
/// reach are dropped entirely.
fn intersect_pois(matrix: &TraveltimeMatrix, pois: &[Poi]) -> HashMap<String, OpportunityMatrix> {
    let mut by_category: HashMap<String, OpportunityMatrix> = HashMap::new();

    for poi in pois {
        let mut travel_times = Vec::new();
        let mut grid_ids = Vec::new();
        for s in 0..matrix.len() {
            if let Some(cost) = matrix.cost_at(s, poi.x, poi.y) {
                travel_times.push(cost);
                grid_ids.push(matrix.grid_ids[s]);
            }
        }
        if travel_times.is_empty() {
            continue;
        }

        let entry = by_category.entry(poi.category.clone()).or_default();
        entry.travel_times.push(travel_times);
        entry.grid_ids.push(grid_ids);
        entry.uids.push(poi.uid.clone());
        entry.names.push(poi.name.clone());
    }

    by_category
}
