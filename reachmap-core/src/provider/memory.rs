//! In-memory network and POI sources.
//!
//! Back the provider traits with data loaded from files: an R-tree over
//! network nodes answers snapping queries, and artificial start nodes are
//! connected to their nearest node by a synthetic connector edge, mirroring
//! what the production database function does with temporary edges.

use std::sync::Mutex;

use geo::{Intersects, Point, Polygon, Rect};
use log::trace;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::model::{Edge, EdgeList, Mode, Poi, Profile};
use crate::provider::{NetworkProvider, PoiSource, SnappedStart};
use crate::{ARTIFICIAL_ID_CEILING, Error, projection};

type SnapTarget = GeomWithData<[f64; 2], i64>;

/// Connector from an artificial start node into the real network.
#[derive(Debug, Clone)]
struct ArtificialConnector {
    artificial_id: i64,
    attach_id: i64,
    lon: f64,
    lat: f64,
    cost_s: f64,
    length_m: f64,
}

/// Routing network held in memory.
///
/// Real node ids must stay below the artificial range
/// `[ARTIFICIAL_ID_CEILING - k + 1, ARTIFICIAL_ID_CEILING]` that snapping
/// allocates for a batch of `k` centroids.
pub struct MemoryNetwork {
    base: EdgeList,
    rtree: RTree<SnapTarget>,
    max_snap_distance_m: f64,
    /// Connectors produced by the latest snap, consumed by the next fetch.
    pending: Mutex<Vec<ArtificialConnector>>,
}

impl MemoryNetwork {
    pub fn new(base: EdgeList, max_snap_distance_m: f64) -> Self {
        let targets: Vec<SnapTarget> = base
            .node_coords
            .iter()
            .map(|(&id, &(lon, lat))| SnapTarget::new([lon, lat], id))
            .collect();
        Self {
            base,
            rtree: RTree::bulk_load(targets),
            max_snap_distance_m,
            pending: Mutex::new(Vec::new()),
        }
    }

    fn nearest_node(&self, lon: f64, lat: f64) -> Option<(i64, f64)> {
        let target = self.rtree.nearest_neighbor(&[lon, lat])?;
        let distance = projection::haversine_m(
            Point::new(lon, lat),
            Point::new(target.geom()[0], target.geom()[1]),
        );
        Some((target.data, distance))
    }
}

impl NetworkProvider for MemoryNetwork {
    fn snap_starts(
        &self,
        lons: &[f64],
        lats: &[f64],
        _max_seconds: u32,
        speed_mps: f64,
        _profile: &Profile,
    ) -> Result<Vec<SnappedStart>, Error> {
        let k = lons.len() as i64;
        let mut snapped = Vec::new();
        let mut connectors = Vec::new();

        for (input_index, (&lon, &lat)) in lons.iter().zip(lats).enumerate() {
            let Some((attach_id, distance)) = self.nearest_node(lon, lat) else {
                continue;
            };
            if distance > self.max_snap_distance_m {
                trace!(
                    "centroid ({lon:.5}, {lat:.5}) is {distance:.0} m from the network, not snapping"
                );
                continue;
            }

            let artificial_id = ARTIFICIAL_ID_CEILING - k + 1 + input_index as i64;
            connectors.push(ArtificialConnector {
                artificial_id,
                attach_id,
                lon,
                lat,
                cost_s: distance / speed_mps,
                length_m: distance,
            });
            snapped.push(SnappedStart {
                node_id: artificial_id,
                input_index,
            });
        }

        *self.pending.lock().map_err(|_| {
            Error::InvalidData("snap state lock poisoned".to_string())
        })? = connectors;
        Ok(snapped)
    }

    fn fetch_network(
        &self,
        bounds: Rect<f64>,
        _mode: Mode,
        _profile: &Profile,
    ) -> Result<EdgeList, Error> {
        let mut edges: Vec<Edge> = self
            .base
            .edges
            .iter()
            .filter(|edge| {
                let inside = |id: i64| {
                    self.base
                        .node_coords
                        .get(&id)
                        .is_some_and(|&(lon, lat)| bounds.intersects(&Point::new(lon, lat)))
                };
                inside(edge.source) || inside(edge.target)
            })
            .cloned()
            .collect();

        if edges.is_empty() {
            return Err(Error::RegionEmpty);
        }

        let mut node_coords = hashbrown::HashMap::new();
        for edge in &edges {
            for id in [edge.source, edge.target] {
                if let Some(&coords) = self.base.node_coords.get(&id) {
                    node_coords.insert(id, coords);
                }
            }
        }

        let connectors = std::mem::take(
            &mut *self
                .pending
                .lock()
                .map_err(|_| Error::InvalidData("snap state lock poisoned".to_string()))?,
        );
        for connector in connectors {
            node_coords.insert(connector.artificial_id, (connector.lon, connector.lat));
            edges.push(Edge {
                source: connector.artificial_id,
                target: connector.attach_id,
                cost: connector.cost_s,
                reverse_cost: connector.cost_s,
                length_m: connector.length_m,
                geometry: None,
            });
        }

        Ok(EdgeList { edges, node_coords })
    }
}

/// POIs held in memory with raw geographic coordinates; pixel coordinates
/// are derived at query time for the requested zoom.
pub struct MemoryPoiSource {
    pois: Vec<RawPoi>,
}

#[derive(Debug, Clone)]
pub struct RawPoi {
    pub uid: String,
    pub category: String,
    pub name: String,
    pub lon: f64,
    pub lat: f64,
}

impl MemoryPoiSource {
    pub fn new(pois: Vec<RawPoi>) -> Self {
        Self { pois }
    }
}

impl PoiSource for MemoryPoiSource {
    fn pois_in_polygon(
        &self,
        polygon: &Polygon<f64>,
        pixel_zoom: u8,
        categories: Option<&[String]>,
    ) -> Result<Vec<Poi>, Error> {
        Ok(self
            .pois
            .iter()
            .filter(|poi| {
                categories.is_none_or(|wanted| wanted.iter().any(|c| *c == poi.category))
            })
            .filter(|poi| polygon.intersects(&Point::new(poi.lon, poi.lat)))
            .map(|poi| {
                let pixel = projection::lonlat_to_pixel(poi.lon, poi.lat, pixel_zoom);
                Poi {
                    uid: poi.uid.clone(),
                    category: poi.category.clone(),
                    name: poi.name.clone(),
                    x: pixel.x,
                    y: pixel.y,
                }
            })
            .collect())
    }
}
