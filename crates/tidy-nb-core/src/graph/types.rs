//! Types for the dependency graph.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::error::{Diagnostic, UnresolvedReference};

/// Which earlier binder supplies a name when several cells bind it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProducerRule {
    /// The nearest preceding binder; a later rebind shadows earlier ones.
    #[default]
    Nearest,
    /// The first binder in reading order.
    Earliest,
}

/// A variable flowing from an earlier cell into a later one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DependencyEdge {
    pub producer: usize,
    pub consumer: usize,
    pub name: String,
}

/// The names a cell receives and exposes, both sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellWiring {
    /// Free names the cell needs (resolved or not)
    pub inputs: Vec<String>,
    /// Bindings consumed by some later cell
    pub outputs: Vec<String>,
}

/// The computed graph: one node per cell, one edge per `(producer, consumer, name)`.
///
/// Edges always point forward in reading order, so the graph is acyclic.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    pub(crate) graph: DiGraph<usize, String>,
    pub(crate) nodes: Vec<NodeIndex>,
    pub(crate) wiring: Vec<CellWiring>,
    pub(crate) unresolved: Vec<UnresolvedReference>,
}

impl DependencyGraph {
    /// Number of cells in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Wiring for the cell at `cell`. Out-of-range indices get empty wiring.
    pub fn wiring(&self, cell: usize) -> &CellWiring {
        static EMPTY: CellWiring = CellWiring {
            inputs: Vec::new(),
            outputs: Vec::new(),
        };
        self.wiring.get(cell).unwrap_or(&EMPTY)
    }

    pub fn inputs(&self, cell: usize) -> &[String] {
        &self.wiring(cell).inputs
    }

    pub fn outputs(&self, cell: usize) -> &[String] {
        &self.wiring(cell).outputs
    }

    /// All edges, grouped by consumer in reading order.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.graph
            .edge_references()
            .map(|edge| DependencyEdge {
                producer: self.graph[edge.source()],
                consumer: self.graph[edge.target()],
                name: edge.weight().clone(),
            })
            .collect()
    }

    /// The cell that supplies `name` to `consumer`, if any.
    pub fn producer_of(&self, consumer: usize, name: &str) -> Option<usize> {
        let node = *self.nodes.get(consumer)?;
        self.graph
            .edges_directed(node, Direction::Incoming)
            .find(|edge| edge.weight() == name)
            .map(|edge| self.graph[edge.source()])
    }

    /// Cells `cell` reads from, sorted and deduplicated.
    pub fn dependencies(&self, cell: usize) -> Vec<usize> {
        self.neighbors(cell, Direction::Incoming)
    }

    /// Cells that read from `cell`, sorted and deduplicated.
    pub fn dependents(&self, cell: usize) -> Vec<usize> {
        self.neighbors(cell, Direction::Outgoing)
    }

    fn neighbors(&self, cell: usize, direction: Direction) -> Vec<usize> {
        let Some(&node) = self.nodes.get(cell) else {
            return Vec::new();
        };
        let mut cells: Vec<usize> = self
            .graph
            .neighbors_directed(node, direction)
            .map(|idx| self.graph[idx])
            .collect();
        cells.sort_unstable();
        cells.dedup();
        cells
    }

    /// Topological order, preferring the lowest index among ready cells.
    ///
    /// Since every edge points forward this is exactly reading order.
    pub fn execution_order(&self) -> Vec<usize> {
        let mut pending: Vec<usize> = self
            .nodes
            .iter()
            .map(|&node| self.graph.neighbors_directed(node, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = pending
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(cell, _)| Reverse(cell))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(cell)) = ready.pop() {
            order.push(cell);
            for next in self.graph.neighbors_directed(self.nodes[cell], Direction::Outgoing) {
                let next = self.graph[next];
                pending[next] -= 1;
                if pending[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }
        order
    }

    /// Names no earlier cell binds, in reading order.
    pub fn unresolved(&self) -> &[UnresolvedReference] {
        &self.unresolved
    }

    /// Unresolved references as diagnostics.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.unresolved
            .iter()
            .cloned()
            .map(Diagnostic::Unresolved)
            .collect()
    }
}
