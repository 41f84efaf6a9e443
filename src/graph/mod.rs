//! # Graph & Partition Model
//!
//! In-memory representation of an undirected graph and of a partition of its
//! nodes into labeled parts.
//!
//! ## Key Components
//!
//! - **Graph**: immutable undirected graph over nodes `0..n`, with a
//!   normalized edge list and an adjacency list. Constructors cover the
//!   shapes this toolkit is actually run on: 2-D grids for enumeration
//!   studies, plus paths and cycles for calibration.
//!
//! - **Partition**: a total mapping from node to part label `1..=k`,
//!   validated against a graph. Derived per input record and transient.
//!
//! - **NodeSetKey**: canonical bit-set encoding of a node subset, used as
//!   the memoization key by the weighting engine. Bit `i` is set iff node
//!   `i` belongs to the set, irrespective of insertion order.

use std::collections::HashSet;

use crate::errors::TallyError;

/// An immutable undirected graph over nodes `0..num_nodes`.
///
/// Edges are stored normalized as `(min, max)` pairs with duplicates and
/// self-loops rejected at construction. A minimal adjacency structure is
/// kept rather than a full graph library since every operation in this
/// crate is a simple scan over nodes or edges.
#[derive(Debug, Clone)]
pub struct Graph {
    num_nodes: usize,
    edges: Vec<(u32, u32)>,
    adjacency: Vec<Vec<u32>>,
}

impl Graph {
    /// Builds a graph from an explicit edge list.
    ///
    /// Edges are normalized to `(min, max)` order and deduplicated. Errors
    /// on out-of-range endpoints and self-loops.
    pub fn from_edges(num_nodes: usize, edges: &[(u32, u32)]) -> Result<Self, TallyError> {
        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(edges.len());
        for &(a, b) in edges {
            if a as usize >= num_nodes || b as usize >= num_nodes {
                return Err(TallyError::InvalidInput(format!(
                    "edge ({}, {}) out of range for {} nodes",
                    a, b, num_nodes
                )));
            }
            if a == b {
                return Err(TallyError::InvalidInput(format!("self-loop on node {}", a)));
            }
            let edge = (a.min(b), a.max(b));
            if seen.insert(edge) {
                normalized.push(edge);
            }
        }
        normalized.sort_unstable();

        let mut adjacency = vec![Vec::new(); num_nodes];
        for &(a, b) in &normalized {
            adjacency[a as usize].push(b);
            adjacency[b as usize].push(a);
        }

        Ok(Graph {
            num_nodes,
            edges: normalized,
            adjacency,
        })
    }

    /// Builds a `rows x cols` 2-D lattice with row-major node numbering
    /// (node `r * cols + c`), the dual graph of a rectangular grid of
    /// districts-to-be.
    pub fn grid(rows: usize, cols: usize) -> Self {
        let mut edges = Vec::with_capacity(2 * rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                let node = (r * cols + c) as u32;
                if c + 1 < cols {
                    edges.push((node, node + 1));
                }
                if r + 1 < rows {
                    edges.push((node, node + cols as u32));
                }
            }
        }
        // Lattice edges are in-range and loop-free by construction.
        Graph::from_edges(rows * cols, &edges).unwrap()
    }

    /// Builds a path graph on `n` nodes (`0-1-2-...-(n-1)`).
    pub fn path(n: usize) -> Self {
        let edges: Vec<(u32, u32)> = (1..n as u32).map(|i| (i - 1, i)).collect();
        Graph::from_edges(n, &edges).unwrap()
    }

    /// Builds a simple cycle on `n >= 3` nodes.
    pub fn cycle(n: usize) -> Self {
        assert!(n >= 3, "a simple cycle needs at least 3 nodes");
        let mut edges: Vec<(u32, u32)> = (1..n as u32).map(|i| (i - 1, i)).collect();
        edges.push((0, n as u32 - 1));
        Graph::from_edges(n, &edges).unwrap()
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Number of (deduplicated) undirected edges.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Sorted normalized edge list.
    pub fn edges(&self) -> &[(u32, u32)] {
        &self.edges
    }

    /// Neighbors of `node`.
    pub fn neighbors(&self, node: u32) -> &[u32] {
        &self.adjacency[node as usize]
    }

    /// Degree of `node`.
    pub fn degree(&self, node: u32) -> usize {
        self.adjacency[node as usize].len()
    }
}

/// A total assignment of graph nodes to part labels `1..=num_parts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    labels: Vec<u32>,
    num_parts: u32,
}

impl Partition {
    /// Validates an assignment against a graph.
    ///
    /// The assignment must cover every node, use only labels in
    /// `1..=num_parts`, and leave no part empty.
    pub fn new(labels: Vec<u32>, num_parts: u32, graph: &Graph) -> Result<Self, TallyError> {
        if labels.len() != graph.num_nodes() {
            return Err(TallyError::InvalidInput(format!(
                "assignment covers {} nodes but graph has {}",
                labels.len(),
                graph.num_nodes()
            )));
        }
        if num_parts == 0 {
            return Err(TallyError::InvalidInput("num_parts must be positive".into()));
        }
        let mut part_seen = vec![false; num_parts as usize];
        for (node, &label) in labels.iter().enumerate() {
            if label == 0 || label > num_parts {
                return Err(TallyError::InvalidInput(format!(
                    "node {} assigned to part {} outside 1..={}",
                    node, label, num_parts
                )));
            }
            part_seen[label as usize - 1] = true;
        }
        if let Some(missing) = part_seen.iter().position(|&seen| !seen) {
            return Err(TallyError::InvalidPartition(format!(
                "part {} has no nodes",
                missing + 1
            )));
        }
        Ok(Partition { labels, num_parts })
    }

    /// Number of parts `k`.
    pub fn num_parts(&self) -> u32 {
        self.num_parts
    }

    /// Part label of `node` (1-indexed).
    pub fn label(&self, node: u32) -> u32 {
        self.labels[node as usize]
    }

    /// The full label vector.
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Number of edges whose endpoints are assigned to different parts.
    pub fn cut_edges(&self, graph: &Graph) -> u32 {
        graph
            .edges()
            .iter()
            .filter(|&&(a, b)| self.labels[a as usize] != self.labels[b as usize])
            .count() as u32
    }

    /// Nodes assigned to `part`, in ascending node order.
    pub fn part_nodes(&self, part: u32) -> Vec<u32> {
        self.labels
            .iter()
            .enumerate()
            .filter(|&(_, &label)| label == part)
            .map(|(node, _)| node as u32)
            .collect()
    }

    /// All part node-sets, indexed by `part - 1`.
    pub fn parts(&self) -> Vec<Vec<u32>> {
        let mut parts = vec![Vec::new(); self.num_parts as usize];
        for (node, &label) in self.labels.iter().enumerate() {
            parts[label as usize - 1].push(node as u32);
        }
        parts
    }
}

/// Canonical bit-set encoding of a node subset.
///
/// Bit `i` of the packed blocks is set iff node `i` belongs to the set, so
/// the encoding is bijective with set membership and independent of the
/// order nodes were listed in. Packed `u64` blocks keep the key exact for
/// graphs wider than a single machine word.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeSetKey {
    blocks: Box<[u64]>,
}

impl NodeSetKey {
    /// Encodes `nodes` as a subset of a `num_nodes`-node graph.
    pub fn from_nodes(nodes: &[u32], num_nodes: usize) -> Self {
        let mut blocks = vec![0u64; num_nodes.div_ceil(64)];
        for &node in nodes {
            debug_assert!((node as usize) < num_nodes, "node index out of graph range");
            blocks[node as usize / 64] |= 1u64 << (node % 64);
        }
        NodeSetKey {
            blocks: blocks.into_boxed_slice(),
        }
    }

    /// Number of nodes in the encoded set.
    pub fn len(&self) -> usize {
        self.blocks.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Whether the encoded set is empty.
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|&b| b == 0)
    }
}
