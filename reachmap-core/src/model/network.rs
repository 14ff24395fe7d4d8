//! Directed routing network and its dense adjacency form.

use geo::{LineString, Point};
use hashbrown::HashMap;
use log::debug;
use petgraph::Directed;
use petgraph::graph::{Graph, NodeIndex};

/// One directed edge as delivered by the network provider.
///
/// Costs are in seconds; a negative cost marks a non-traversable direction
/// (one-way street), following the pgRouting convention of the source
/// network tables.
#[derive(Debug, Clone)]
pub struct Edge {
    pub source: i64,
    pub target: i64,
    pub cost: f64,
    pub reverse_cost: f64,
    pub length_m: f64,
    pub geometry: Option<LineString<f64>>,
}

/// Edge list covering a bounding region, plus coordinates for every node
/// referenced by at least one edge.
#[derive(Debug, Clone, Default)]
pub struct EdgeList {
    pub edges: Vec<Edge>,
    pub node_coords: HashMap<i64, (f64, f64)>,
}

impl EdgeList {
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Node of the prepared routing graph.
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Sparse id in the provider's id space.
    pub id: i64,
    pub geometry: Point<f64>,
}

/// Out-edge of the prepared routing graph, oriented in travel direction.
#[derive(Debug, Clone)]
pub struct GraphEdge {
    /// Traversal cost in seconds.
    pub cost: f64,
    pub length_m: f64,
    /// Geometry oriented source-to-target; straight line when the provider
    /// gave none.
    pub geometry: LineString<f64>,
}

/// Immutable, densely-numbered adjacency structure shared read-only across
/// expansion threads.
///
/// Reverse-cost edges are materialized as separate outgoing entries at the
/// target node, so the traversal stays a plain directed Dijkstra.
#[derive(Debug)]
pub struct RoutingGraph {
    pub graph: Graph<GraphNode, GraphEdge, Directed>,
    node_map: HashMap<i64, NodeIndex>,
}

impl RoutingGraph {
    pub fn build(edge_list: &EdgeList) -> Self {
        let mut graph = Graph::with_capacity(edge_list.node_coords.len(), edge_list.edges.len());
        let mut node_map = HashMap::with_capacity(edge_list.node_coords.len());

        for edge in &edge_list.edges {
            let source = intern_node(&mut graph, &mut node_map, &edge_list.node_coords, edge.source);
            let target = intern_node(&mut graph, &mut node_map, &edge_list.node_coords, edge.target);
            let (Some(source), Some(target)) = (source, target) else {
                debug!(
                    "dropping edge {} -> {} with unknown endpoint coordinates",
                    edge.source, edge.target
                );
                continue;
            };

            let forward_geometry = edge.geometry.clone().unwrap_or_else(|| {
                straight_line(&graph[source].geometry, &graph[target].geometry)
            });

            if edge.cost >= 0.0 {
                graph.add_edge(
                    source,
                    target,
                    GraphEdge {
                        cost: edge.cost,
                        length_m: edge.length_m,
                        geometry: forward_geometry.clone(),
                    },
                );
            }
            if edge.reverse_cost >= 0.0 {
                let mut reverse_geometry = forward_geometry;
                reverse_geometry.0.reverse();
                graph.add_edge(
                    target,
                    source,
                    GraphEdge {
                        cost: edge.reverse_cost,
                        length_m: edge.length_m,
                        geometry: reverse_geometry,
                    },
                );
            }
        }

        Self { graph, node_map }
    }

    /// Dense index of a sparse provider node id.
    pub fn node_index(&self, id: i64) -> Option<NodeIndex> {
        self.node_map.get(&id).copied()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

fn intern_node(
    graph: &mut Graph<GraphNode, GraphEdge, Directed>,
    node_map: &mut HashMap<i64, NodeIndex>,
    coords: &HashMap<i64, (f64, f64)>,
    id: i64,
) -> Option<NodeIndex> {
    if let Some(&index) = node_map.get(&id) {
        return Some(index);
    }
    let &(lon, lat) = coords.get(&id)?;
    let index = graph.add_node(GraphNode {
        id,
        geometry: Point::new(lon, lat),
    });
    node_map.insert(id, index);
    Some(index)
}

fn straight_line(a: &Point<f64>, b: &Point<f64>) -> LineString<f64> {
    LineString::from(vec![(a.x(), a.y()), (b.x(), b.y())])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge_list(edges: Vec<Edge>) -> EdgeList {
        let mut node_coords = HashMap::new();
        node_coords.insert(1, (11.50, 48.10));
        node_coords.insert(2, (11.51, 48.10));
        node_coords.insert(3, (11.52, 48.11));
        EdgeList { edges, node_coords }
    }

    #[test]
    fn reverse_cost_becomes_outgoing_edge_at_target() {
        let list = edge_list(vec![Edge {
            source: 1,
            target: 2,
            cost: 10.0,
            reverse_cost: 12.0,
            length_m: 100.0,
            geometry: None,
        }]);
        let graph = RoutingGraph::build(&list);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 2);

        let source = graph.node_index(1).unwrap();
        let target = graph.node_index(2).unwrap();
        let out_of_target: Vec<_> = graph.graph.edges(target).collect();
        assert_eq!(out_of_target.len(), 1);
        assert_eq!(petgraph::visit::EdgeRef::target(&out_of_target[0]), source);
    }

    #[test]
    fn one_way_edges_skip_blocked_direction() {
        let list = edge_list(vec![Edge {
            source: 1,
            target: 2,
            cost: 10.0,
            reverse_cost: -1.0,
            length_m: 100.0,
            geometry: None,
        }]);
        let graph = RoutingGraph::build(&list);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn unknown_endpoints_are_dropped() {
        let list = edge_list(vec![Edge {
            source: 1,
            target: 99,
            cost: 10.0,
            reverse_cost: 10.0,
            length_m: 100.0,
            geometry: None,
        }]);
        let graph = RoutingGraph::build(&list);
        assert_eq!(graph.edge_count(), 0);
    }
}
