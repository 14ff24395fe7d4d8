//! Traveltime engine: time-limited shortest-path expansion rasterized onto
//! per-start pixel windows.

pub mod dijkstra;
pub mod engine;
pub mod raster;

pub use engine::{StartTask, compute_bulk_traveltimes};
pub use raster::WindowBuffer;
