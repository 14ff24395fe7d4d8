//! Precomputed accessibility heatmaps on an H3 hexagonal grid.
//!
//! The crate implements a two-stage matrix pipeline. The precompute stage
//! tiles a study area into coarse *bulk* cells and fine *calculation* cells,
//! extracts a routing graph per bulk cell, runs a time-limited multi-source
//! shortest-path expansion from every calculation-cell centroid and
//! rasterizes the reached costs onto per-start pixel windows
//! ([`routing`]), then intersects the rasters with points of interest to
//! build per-category opportunity matrices ([`opportunity`]). The query
//! stage streams the opportunity matrices for a region, reduces them per
//! grid id and emits a hex-polygon feature layer ([`heatmap`]).
//!
//! Network and POI access go through the capability traits in [`provider`];
//! archives are published atomically by [`storage`].

pub mod config;
pub mod error;
pub mod heatmap;
pub mod loading;
pub mod model;
pub mod opportunity;
pub mod pipeline;
pub mod prelude;
pub mod projection;
pub mod provider;
pub mod routing;
pub mod storage;
pub mod tiling;

pub use config::ReachmapConfig;
pub use error::Error;
pub use model::{Mode, Profile};

/// Travel cost marking a pixel as unreachable (`2^31 - 1`).
///
/// The sentinel is load-bearing in both computation and storage: traveltime
/// windows are initialized to it, and opportunity rows only keep entries
/// strictly below it.
pub const UNREACHABLE_COST: u32 = i32::MAX as u32;

/// Artificial start nodes are allocated from the top of the signed 32-bit
/// id space, below any real network node id.
pub const ARTIFICIAL_ID_CEILING: i64 = i32::MAX as i64;
