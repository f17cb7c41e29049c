// src/dag/graph.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;

use crate::dag::node::NodeId;

/// Lightweight petgraph view of a plan's edges, keyed by [`NodeId`].
///
/// Edge direction is `dependency -> dependent`. The graph is only built for
/// plans that already passed cycle detection, so topological queries never
/// fail in practice.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    graph: DiGraphMap<usize, ()>,
}

impl DagGraph {
    /// Build from `(node, dependencies)` pairs.
    pub fn from_edges<'a, I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = (NodeId, &'a [NodeId])>,
    {
        let mut graph = DiGraphMap::new();
        for (node, deps) in nodes {
            graph.add_node(node.0);
            for dep in deps {
                graph.add_edge(dep.0, node.0, ());
            }
        }
        Self { graph }
    }

    /// Immediate dependents of `node` (nodes that list it as a dependency),
    /// in ordering-key order.
    pub fn dependents_of(&self, node: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .graph
            .neighbors_directed(node.0, petgraph::Direction::Outgoing)
            .map(NodeId)
            .collect();
        out.sort();
        out
    }

    /// Number of nodes reachable from `node` through dependent edges,
    /// excluding `node` itself.
    pub fn downstream_count(&self, node: NodeId) -> usize {
        if !self.graph.contains_node(node.0) {
            return 0;
        }
        let mut dfs = Dfs::new(&self.graph, node.0);
        let mut count = 0;
        while dfs.next(&self.graph).is_some() {
            count += 1;
        }
        count - 1
    }

    /// Nodes in dependency-first order, ties resolved by petgraph's
    /// traversal. Returns `None` if the graph contains a cycle.
    pub fn topological_order(&self) -> Option<Vec<NodeId>> {
        toposort(&self.graph, None)
            .ok()
            .map(|order| order.into_iter().map(NodeId).collect())
    }
}
