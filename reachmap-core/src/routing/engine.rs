//! Per-bulk traveltime computation: parallel expansion over sub-batches of
//! starts, gathered back into canonical order.

use h3o::CellIndex;
use log::debug;
use rayon::prelude::*;

use crate::model::{PixelExtent, RoutingGraph, TraveltimeMatrix};
use crate::routing::{WindowBuffer, dijkstra};

/// One surviving start: an artificial node with its calculation cell and
/// pixel window.
#[derive(Debug, Clone, Copy)]
pub struct StartTask {
    pub node_id: i64,
    pub calc_id: CellIndex,
    pub extent: PixelExtent,
}

/// Expands every start against the shared read-only graph and rasterizes
/// the reached costs into its window.
///
/// Starts run in parallel within sub-batches of `batch_size`, which bounds
/// peak memory to one batch of window buffers; the output arrays keep the
/// order of `starts`. A start whose node is absent from the graph keeps its
/// slot with an all-sentinel window.
pub fn compute_bulk_traveltimes(
    graph: &RoutingGraph,
    starts: &[StartTask],
    budget_s: f64,
    pixel_zoom: u8,
    batch_size: usize,
) -> TraveltimeMatrix {
    let batch_size = batch_size.max(1);
    let mut matrix = TraveltimeMatrix::default();

    for batch in starts.chunks(batch_size) {
        let buffers: Vec<Vec<u32>> = batch
            .par_iter()
            .map(|start| expand_one(graph, start, budget_s, pixel_zoom))
            .collect();

        for (start, costs) in batch.iter().zip(buffers) {
            matrix.grid_ids.push(u64::from(start.calc_id));
            matrix.north.push(start.extent.north);
            matrix.west.push(start.extent.west);
            matrix.height.push(start.extent.height);
            matrix.width.push(start.extent.width);
            matrix.travel_times.push(costs);
        }
    }

    matrix
}

fn expand_one(graph: &RoutingGraph, start: &StartTask, budget_s: f64, pixel_zoom: u8) -> Vec<u32> {
    let mut buffer = WindowBuffer::new(start.extent, pixel_zoom);

    let Some(node) = graph.node_index(start.node_id) else {
        // Snapped, but no edge in the extract references the artificial
        // node; the slot stays with an untouched window.
        debug!("start node {} not present in the routing graph", start.node_id);
        return buffer.into_costs();
    };

    dijkstra::expand_from(graph, node, budget_s, |entry_cost, edge| {
        buffer.rasterize_edge(entry_cost, edge, budget_s);
    });
    buffer.into_costs()
}
