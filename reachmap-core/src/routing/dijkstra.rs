use std::{cmp::Ordering, collections::BinaryHeap};

use hashbrown::HashMap;
use petgraph::{graph::NodeIndex, visit::EdgeRef};

use crate::model::{RoutingGraph, network::GraphEdge};

#[derive(Copy, Clone, PartialEq)]
struct State {
    cost: f64,
    node: NodeIndex,
}

impl Eq for State {}

// Implement Ord for State to use in BinaryHeap
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap by cost (reversed from standard Rust BinaryHeap)
        other.cost.total_cmp(&self.cost)
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Monotone shortest-path expansion from `start`, cut off at `budget_s`
/// accumulated seconds.
///
/// `on_edge(entry_cost, edge)` fires once per outgoing edge of every
/// settled node, with the cost accumulated up to the edge's source; the
/// caller clips the edge's contribution to the budget itself. Returns the
/// settled cost per reached node.
pub fn expand_from<F>(
    graph: &RoutingGraph,
    start: NodeIndex,
    budget_s: f64,
    mut on_edge: F,
) -> HashMap<NodeIndex, f64>
where
    F: FnMut(f64, &GraphEdge),
{
    let mut distances: HashMap<NodeIndex, f64> = HashMap::new();
    let mut heap = BinaryHeap::new();

    heap.push(State {
        cost: 0.0,
        node: start,
    });
    distances.insert(start, 0.0);

    while let Some(State { cost, node }) = heap.pop() {
        // Skip if we've found a better path
        if distances.get(&node).is_some_and(|&best| cost > best) {
            continue;
        }

        for edge in graph.graph.edges(node) {
            let weight = edge.weight();
            on_edge(cost, weight);

            let next_cost = cost + weight.cost;
            if next_cost > budget_s {
                continue;
            }
            let next = edge.target();
            match distances.entry(next) {
                hashbrown::hash_map::Entry::Vacant(entry) => {
                    entry.insert(next_cost);
                    heap.push(State {
                        cost: next_cost,
                        node: next,
                    });
                }
                hashbrown::hash_map::Entry::Occupied(mut entry) => {
                    if next_cost < *entry.get() {
                        *entry.get_mut() = next_cost;
                        heap.push(State {
                            cost: next_cost,
                            node: next,
                        });
                    }
                }
            }
        }
    }

    distances
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, EdgeList};

    fn line_graph() -> RoutingGraph {
        // 1 --10s--> 2 --20s--> 3, all bidirectional
        let mut node_coords = hashbrown::HashMap::new();
        node_coords.insert(1, (11.500, 48.100));
        node_coords.insert(2, (11.501, 48.100));
        node_coords.insert(3, (11.502, 48.100));
        RoutingGraph::build(&EdgeList {
            edges: vec![
                Edge {
                    source: 1,
                    target: 2,
                    cost: 10.0,
                    reverse_cost: 10.0,
                    length_m: 75.0,
                    geometry: None,
                },
                Edge {
                    source: 2,
                    target: 3,
                    cost: 20.0,
                    reverse_cost: 20.0,
                    length_m: 75.0,
                    geometry: None,
                },
            ],
            node_coords,
        })
    }

    #[test]
    fn costs_accumulate_along_the_path() {
        let graph = line_graph();
        let start = graph.node_index(1).unwrap();
        let distances = expand_from(&graph, start, 3600.0, |_, _| {});

        assert_eq!(distances[&graph.node_index(1).unwrap()], 0.0);
        assert_eq!(distances[&graph.node_index(2).unwrap()], 10.0);
        assert_eq!(distances[&graph.node_index(3).unwrap()], 30.0);
    }

    #[test]
    fn budget_cuts_branches() {
        let graph = line_graph();
        let start = graph.node_index(1).unwrap();
        let distances = expand_from(&graph, start, 15.0, |_, _| {});

        assert!(distances.contains_key(&graph.node_index(2).unwrap()));
        assert!(!distances.contains_key(&graph.node_index(3).unwrap()));
    }

    #[test]
    fn zero_budget_settles_only_the_start() {
        let graph = line_graph();
        let start = graph.node_index(1).unwrap();
        let mut visited_edges = 0;
        let distances = expand_from(&graph, start, 0.0, |entry, _| {
            assert_eq!(entry, 0.0);
            visited_edges += 1;
        });

        assert_eq!(distances.len(), 1);
        // The start's own out-edges are still offered for (clipped) rasterization.
        assert_eq!(visited_edges, 1);
    }
}
