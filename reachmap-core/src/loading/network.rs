use std::path::Path;

use geo::LineString;
use hashbrown::HashMap;
use log::info;
use serde::Deserialize;
use wkt::TryFromWkt;

use crate::Error;
use crate::model::{Edge, EdgeList};

/// One row of an edge CSV export.
///
/// Costs are in seconds, negative for a non-traversable direction;
/// `geometry` is an optional WKT `LINESTRING` in lon/lat order.
#[derive(Debug, Deserialize)]
struct EdgeRow {
    source: i64,
    target: i64,
    cost: f64,
    reverse_cost: f64,
    length_m: f64,
    source_lon: f64,
    source_lat: f64,
    target_lon: f64,
    target_lat: f64,
    #[serde(default)]
    geometry: Option<String>,
}

/// Reads a directed edge list with node coordinates from a CSV file.
///
/// # Errors
///
/// Returns `InvalidData` for unparsable rows or WKT geometry.
pub fn load_edge_list(path: &Path) -> Result<EdgeList, Error> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| Error::InvalidData(format!("cannot read edge CSV {}: {e}", path.display())))?;

    let mut edges = Vec::new();
    let mut node_coords = HashMap::new();
    for row in reader.deserialize() {
        let row: EdgeRow = row
            .map_err(|e| Error::InvalidData(format!("bad edge row in {}: {e}", path.display())))?;

        let geometry = row
            .geometry
            .as_deref()
            .filter(|wkt| !wkt.trim().is_empty())
            .map(|wkt| {
                LineString::<f64>::try_from_wkt_str(wkt)
                    .map_err(|e| Error::InvalidData(format!("bad edge geometry: {e}")))
            })
            .transpose()?;

        node_coords.insert(row.source, (row.source_lon, row.source_lat));
        node_coords.insert(row.target, (row.target_lon, row.target_lat));
        edges.push(Edge {
            source: row.source,
            target: row.target,
            cost: row.cost,
            reverse_cost: row.reverse_cost,
            length_m: row.length_m,
            geometry,
        });
    }

    info!(
        "loaded {} edges over {} nodes from {}",
        edges.len(),
        node_coords.len(),
        path.display()
    );
    Ok(EdgeList { edges, node_coords })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_edges_with_and_without_geometry() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "source,target,cost,reverse_cost,length_m,source_lon,source_lat,target_lon,target_lat,geometry"
        )
        .unwrap();
        writeln!(
            file,
            "1,2,72.0,72.0,100.0,11.500,48.100,11.5013,48.100,\"LINESTRING(11.500 48.100, 11.5013 48.100)\""
        )
        .unwrap();
        writeln!(file, "2,3,30.0,-1.0,40.0,11.5013,48.100,11.5019,48.100,").unwrap();

        let list = load_edge_list(file.path()).unwrap();
        assert_eq!(list.edges.len(), 2);
        assert_eq!(list.node_coords.len(), 3);
        assert!(list.edges[0].geometry.is_some());
        assert!(list.edges[1].geometry.is_none());
        assert_eq!(list.edges[1].reverse_cost, -1.0);
    }

    #[test]
    fn malformed_rows_are_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "source,target,cost,reverse_cost,length_m,source_lon,source_lat,target_lon,target_lat,geometry"
        )
        .unwrap();
        writeln!(file, "1,not-a-node,72.0,72.0,100.0,0,0,0,0,").unwrap();

        assert!(matches!(
            load_edge_list(file.path()),
            Err(Error::InvalidData(_))
        ));
    }
}
