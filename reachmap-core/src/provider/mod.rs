//! Capability seams for the external network and POI collaborators.
//!
//! The pipeline only ever sees these traits; production deployments back
//! them with the routing database, while [`MemoryNetwork`] and
//! [`MemoryPoiSource`] serve tests and file-based CLI runs.

mod memory;

use geo::{Polygon, Rect};

pub use memory::{MemoryNetwork, MemoryPoiSource, RawPoi};

use crate::model::{EdgeList, Mode, Poi, Profile};
use crate::Error;

/// A successfully snapped starting centroid.
///
/// `input_index` points back into the coordinate slices given to
/// [`NetworkProvider::snap_starts`]; unsnappable inputs are simply absent
/// from the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnappedStart {
    pub node_id: i64,
    pub input_index: usize,
}

/// Routing network access for one bulk cell at a time.
pub trait NetworkProvider: Sync {
    /// Injects an artificial start node near each `(lon, lat)` centroid and
    /// returns the ones that could be attached to the network.
    ///
    /// # Errors
    ///
    /// `SnapTimeout` when the backing store gives up; the caller skips the
    /// bulk cell.
    fn snap_starts(
        &self,
        lons: &[f64],
        lats: &[f64],
        max_seconds: u32,
        speed_mps: f64,
        profile: &Profile,
    ) -> Result<Vec<SnappedStart>, Error>;

    /// Edges covering `bounds` (with a safety margin) for the given mode
    /// and profile, including any artificial nodes from the preceding
    /// [`Self::snap_starts`] call.
    ///
    /// # Errors
    ///
    /// `RegionEmpty` when no network edges exist in the region.
    fn fetch_network(
        &self,
        bounds: Rect<f64>,
        mode: Mode,
        profile: &Profile,
    ) -> Result<EdgeList, Error>;
}

/// POI access per bulk-cell polygon.
pub trait PoiSource: Sync {
    /// POIs inside `polygon`, carrying pixel coordinates at `pixel_zoom`.
    /// `categories = None` returns every category.
    fn pois_in_polygon(
        &self,
        polygon: &Polygon<f64>,
        pixel_zoom: u8,
        categories: Option<&[String]>,
    ) -> Result<Vec<Poi>, Error>;
}
