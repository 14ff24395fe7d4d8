//! Precompute orchestration: C1 tiling, C3 traveltime matrices and C4
//! opportunity matrices over injected network, POI and storage
//! capabilities.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use fixedbitset::FixedBitSet;
use geo::{BoundingRect, Coord, Rect, coord};
use h3o::CellIndex;
use log::{info, warn};

use crate::model::{BulkCell, Mode, Profile, RoutingGraph, StudyArea};
use crate::opportunity::{self, OpportunitySummary};
use crate::provider::{NetworkProvider, PoiSource};
use crate::routing::{StartTask, compute_bulk_traveltimes};
use crate::storage::MatrixStore;
use crate::{Error, ReachmapConfig, projection, tiling};

/// Parameters of one precompute run.
#[derive(Debug, Clone)]
pub struct PrecomputeRequest {
    pub mode: Mode,
    pub profile: Profile,
    /// Travel-time budget in minutes (boundary unit; seconds internally).
    pub max_travel_time_min: u32,
    /// Travel speed in m/s; `None` uses the mode's default.
    pub speed_mps: Option<f64>,
    /// Restrict the opportunity stage to these categories.
    pub categories: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub enum BulkStatus {
    Completed { starts: usize },
    Skipped { reason: String },
    WriteFailed { reason: String },
}

#[derive(Debug, Clone)]
pub struct BulkOutcome {
    pub bulk_id: CellIndex,
    pub status: BulkStatus,
}

/// Per-bulk record of a precompute run. The run as a whole is considered
/// successful when at least one bulk completed.
#[derive(Debug, Default)]
pub struct PrecomputeSummary {
    pub outcomes: Vec<BulkOutcome>,
    pub cancelled: bool,
    pub opportunities: Option<OpportunitySummary>,
}

impl PrecomputeSummary {
    pub fn completed(&self) -> usize {
        self.count(|status| matches!(status, BulkStatus::Completed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|status| matches!(status, BulkStatus::Skipped { .. }))
    }

    pub fn write_failures(&self) -> usize {
        self.count(|status| matches!(status, BulkStatus::WriteFailed { .. }))
    }

    fn count(&self, predicate: impl Fn(&BulkStatus) -> bool) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| predicate(&outcome.status))
            .count()
    }
}

/// Owns one precompute pipeline over injected capabilities.
pub struct Precompute<'a, N, P> {
    network: &'a N,
    pois: &'a P,
    store: &'a MatrixStore,
    config: &'a ReachmapConfig,
}

impl<'a, N, P> Precompute<'a, N, P>
where
    N: NetworkProvider,
    P: PoiSource,
{
    pub fn new(network: &'a N, pois: &'a P, store: &'a MatrixStore, config: &'a ReachmapConfig) -> Self {
        Self {
            network,
            pois,
            store,
            config,
        }
    }

    /// Runs the full precompute for the study areas: traveltime matrices
    /// per bulk cell, then opportunity matrices.
    ///
    /// Bulk cells are processed in sorted order; per-bulk soft failures
    /// are recorded and skipped. `cancel` is honored between bulks, so an
    /// aborted run never leaves a partially written archive behind.
    pub fn run(
        &self,
        study_areas: &[StudyArea],
        request: &PrecomputeRequest,
        cancel: &AtomicBool,
    ) -> Result<PrecomputeSummary, Error> {
        let speed_mps = request
            .speed_mps
            .unwrap_or_else(|| request.mode.default_speed_mps());
        let budget_s = f64::from(request.max_travel_time_min) * 60.0;
        let buffer_m = speed_mps * budget_s;

        let plan = tiling::plan(
            study_areas,
            self.config.bulk_resolution,
            self.config.calc_resolution,
            buffer_m,
            self.config.pixel_zoom,
        )?;

        let mut summary = PrecomputeSummary::default();
        let total = plan.len();
        let started = Instant::now();

        for (index, cell) in plan.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                warn!("cancellation requested, stopping after {index} of {total} bulk cells");
                summary.cancelled = true;
                break;
            }

            let bulk_started = Instant::now();
            let status = match self.compute_bulk(cell, request, speed_mps, budget_s, buffer_m) {
                Ok(starts) => {
                    info!(
                        "bulk {} ({}/{total}): {starts} starts in {:.1?}",
                        cell.bulk_id,
                        index + 1,
                        bulk_started.elapsed()
                    );
                    BulkStatus::Completed { starts }
                }
                Err(e) if e.is_per_bulk() => {
                    warn!("bulk {} ({}/{total}): skipped: {e}", cell.bulk_id, index + 1);
                    BulkStatus::Skipped {
                        reason: e.to_string(),
                    }
                }
                Err(e @ (Error::ArchiveIo(_) | Error::ArchiveCorrupt(_))) => {
                    warn!("bulk {} ({}/{total}): archive write failed: {e}", cell.bulk_id, index + 1);
                    BulkStatus::WriteFailed {
                        reason: e.to_string(),
                    }
                }
                Err(e) => return Err(e),
            };
            summary.outcomes.push(BulkOutcome {
                bulk_id: cell.bulk_id,
                status,
            });
        }

        if !summary.cancelled {
            summary.opportunities = Some(opportunity::build_opportunity(
                self.store,
                self.pois,
                &plan,
                request.mode,
                &request.profile,
                self.config.pixel_zoom,
                request.categories.as_deref(),
            )?);
        }

        info!(
            "precompute finished in {:.1?}: {} completed, {} skipped, {} write failures",
            started.elapsed(),
            summary.completed(),
            summary.skipped(),
            summary.write_failures()
        );
        Ok(summary)
    }

    /// Traveltime stage for one bulk cell: snap, fetch, expand, publish.
    fn compute_bulk(
        &self,
        cell: &BulkCell,
        request: &PrecomputeRequest,
        speed_mps: f64,
        budget_s: f64,
        buffer_m: f64,
    ) -> Result<usize, Error> {
        let snapped = self.network.snap_starts(
            &cell.lons,
            &cell.lats,
            budget_s as u32,
            speed_mps,
            &request.profile,
        )?;
        if snapped.is_empty() {
            return Err(Error::NoStartsSurvived);
        }

        // Deduplicate and bounds-check what the provider handed back.
        let mut survived = FixedBitSet::with_capacity(cell.len());
        let mut starts = Vec::with_capacity(snapped.len());
        for snap in &snapped {
            if snap.input_index >= cell.len() {
                return Err(Error::InvalidData(format!(
                    "provider snapped unknown start index {}",
                    snap.input_index
                )));
            }
            if survived.put(snap.input_index) {
                continue;
            }
            starts.push(StartTask {
                node_id: snap.node_id,
                calc_id: cell.calc_ids[snap.input_index],
                extent: cell.extents[snap.input_index],
            });
        }
        if survived.count_ones(..) < cell.len() {
            info!(
                "bulk {}: {} of {} centroids did not snap",
                cell.bulk_id,
                cell.len() - survived.count_ones(..),
                cell.len()
            );
        }

        let edge_list = self.network.fetch_network(
            bulk_lookup_bounds(cell.bulk_id, buffer_m),
            request.mode,
            &request.profile,
        )?;
        let graph = RoutingGraph::build(&edge_list);

        let matrix = compute_bulk_traveltimes(
            &graph,
            &starts,
            budget_s,
            self.config.pixel_zoom,
            self.config.batch_size,
        );
        self.store
            .write_traveltime(request.mode, &request.profile, cell.bulk_id, &matrix)?;
        Ok(starts.len())
    }
}

/// Bounding box of a bulk hexagon widened by the reachable distance plus a
/// safety margin, in degrees.
fn bulk_lookup_bounds(bulk_id: CellIndex, buffer_m: f64) -> Rect<f64> {
    let polygon = tiling::cell_polygon(bulk_id);
    let rect = polygon
        .bounding_rect()
        .unwrap_or_else(|| Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 0.0, y: 0.0 }));

    let center_lat = (rect.min().y + rect.max().y) / 2.0;
    let margin = projection::meters_to_degrees(buffer_m * 1.1, center_lat);
    Rect::new(
        Coord {
            x: rect.min().x - margin,
            y: rect.min().y - margin,
        },
        Coord {
            x: rect.max().x + margin,
            y: rect.max().y + margin,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_bounds_contain_the_hexagon() {
        let bulk = h3o::LatLng::new(48.14, 11.57)
            .unwrap()
            .to_cell(h3o::Resolution::Six);
        let bounds = bulk_lookup_bounds(bulk, 1000.0);
        let hex_rect = tiling::cell_polygon(bulk).bounding_rect().unwrap();
        assert!(bounds.min().x < hex_rect.min().x);
        assert!(bounds.max().y > hex_rect.max().y);
    }

    #[test]
    fn summary_counts_by_status() {
        let bulk = h3o::LatLng::new(48.14, 11.57)
            .unwrap()
            .to_cell(h3o::Resolution::Six);
        let summary = PrecomputeSummary {
            outcomes: vec![
                BulkOutcome {
                    bulk_id: bulk,
                    status: BulkStatus::Completed { starts: 10 },
                },
                BulkOutcome {
                    bulk_id: bulk,
                    status: BulkStatus::Skipped {
                        reason: "no routing edges found in region".to_string(),
                    },
                },
            ],
            cancelled: false,
            opportunities: None,
        };
        assert_eq!(summary.completed(), 1);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.write_failures(), 0);
    }
}
