//! # Spanning-Tree Weighting Engine
//!
//! Computes the exact number of spanning trees of a connected induced
//! subgraph via the Matrix-Tree theorem, and aggregates per-part counts
//! into a partition weight.
//!
//! ## Method
//!
//! For a node set `S`, the engine builds the graph Laplacian of the
//! subgraph induced by `S` (degree matrix minus adjacency matrix), deletes
//! the first row and column, and LU-factors the resulting minor. The
//! spanning-tree count is the absolute value of the product of the diagonal
//! of the upper-triangular factor, rounded to the nearest integer. Which
//! row/column is deleted does not affect the result (Matrix-Tree theorem).
//!
//! The true count is always a non-negative integer; rounding absorbs the
//! bounded floating-point error of the factorization. That tolerance only
//! holds while counts stay below [`MAX_EXACT_TREE_COUNT`], so larger
//! determinants are rejected instead of silently rounded to a wrong
//! integer.
//!
//! ## Memoization
//!
//! Counts are cached per distinct node set in an explicit
//! [`TreeCountCache`] constructed once per worker and passed into every
//! call. Caches are never shared or synchronized across workers; duplicate
//! work across workers is acceptable, disagreement is impossible because
//! the computation is pure.

use nalgebra::DMatrix;
use rustc_hash::FxHashMap;

use crate::errors::TallyError;
use crate::graph::{Graph, NodeSetKey, Partition};

/// Largest spanning-tree count the f64 determinant path can certify.
///
/// Above 2^52 the gap between adjacent representable floats exceeds 0.5,
/// so round-to-nearest can no longer absorb the factorization error.
pub const MAX_EXACT_TREE_COUNT: f64 = 4_503_599_627_370_496.0; // 2^52

/// Cut-edge count and spanning-tree weight of one partition record.
///
/// `weight` is the partition weight: the product over all parts of the
/// part's spanning-tree count. It is the quantity that links this
/// enumeration tool to the forest-based samplers it validates, which draw
/// partitions proportionally to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanScore {
    /// Number of edges crossing part boundaries.
    pub cut_edges: u32,
    /// Product of per-part spanning-tree counts.
    pub weight: f64,
}

/// Hit/miss accounting for one worker's cache.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that required a fresh factorization.
    pub misses: u64,
}

/// Worker-private memoization of spanning-tree counts by node set.
///
/// Growth is unbounded for the life of the worker; callers needing bounded
/// memory must partition work across shorter-lived workers.
#[derive(Debug, Default)]
pub struct TreeCountCache {
    counts: FxHashMap<NodeSetKey, u64>,
    stats: CacheStats,
}

impl TreeCountCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        TreeCountCache::default()
    }

    /// Number of distinct node sets cached.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Hit/miss counters accumulated so far.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

/// Counts the spanning trees of the subgraph induced by `nodes`.
///
/// `nodes` must be a non-empty subset of the graph's nodes whose induced
/// subgraph is connected; a disconnected set has a singular Laplacian minor
/// and yields [`TallyError::InvalidPartition`]. A single-node set has
/// exactly one spanning tree (the empty edge set).
pub fn spanning_tree_count(
    graph: &Graph,
    nodes: &[u32],
    cache: &mut TreeCountCache,
) -> Result<u64, TallyError> {
    if nodes.is_empty() {
        return Err(TallyError::InvalidInput(
            "spanning_tree_count on an empty node set".into(),
        ));
    }
    let key = NodeSetKey::from_nodes(nodes, graph.num_nodes());
    if let Some(&count) = cache.counts.get(&key) {
        cache.stats.hits += 1;
        return Ok(count);
    }
    cache.stats.misses += 1;

    let count = if nodes.len() == 1 {
        1
    } else {
        count_by_laplacian_minor(graph, nodes)?
    };
    cache.counts.insert(key, count);
    Ok(count)
}

/// Scores one partition record: cut edges plus the partition weight.
///
/// The weight is the product of `spanning_tree_count` over all parts, so a
/// single disconnected part invalidates the whole record.
pub fn partition_weight(
    graph: &Graph,
    partition: &Partition,
    cache: &mut TreeCountCache,
) -> Result<PlanScore, TallyError> {
    let mut weight = 1.0f64;
    for part_nodes in partition.parts() {
        let count = spanning_tree_count(graph, &part_nodes, cache)?;
        weight *= count as f64;
    }
    if !weight.is_finite() {
        return Err(TallyError::Numerical(
            "partition weight overflowed f64".into(),
        ));
    }
    Ok(PlanScore {
        cut_edges: partition.cut_edges(graph),
        weight,
    })
}

/// Matrix-Tree determinant path for node sets of size >= 2.
fn count_by_laplacian_minor(graph: &Graph, nodes: &[u32]) -> Result<u64, TallyError> {
    let minor = laplacian_minor(graph, nodes);
    let lu = minor.lu();
    let u = lu.u();
    let mut det = 1.0f64;
    for i in 0..u.nrows() {
        det *= u[(i, i)];
    }
    let det = det.abs();

    if !det.is_finite() || det > MAX_EXACT_TREE_COUNT {
        return Err(TallyError::Numerical(format!(
            "determinant {:e} exceeds the exact-integer range of the f64 path",
            det
        )));
    }
    let count = det.round();
    if count == 0.0 {
        // Singular minor: the induced subgraph is disconnected.
        return Err(TallyError::InvalidPartition(format!(
            "induced subgraph on {} nodes is disconnected",
            nodes.len()
        )));
    }
    Ok(count as u64)
}

/// Induced-subgraph Laplacian restricted to `nodes`, with the first row and
/// column deleted.
fn laplacian_minor(graph: &Graph, nodes: &[u32]) -> DMatrix<f64> {
    let n = nodes.len();
    // Position of each member node within `nodes`; the first one is the
    // deleted row/column.
    let mut position = FxHashMap::default();
    for (i, &node) in nodes.iter().enumerate() {
        position.insert(node, i);
    }

    let mut minor = DMatrix::<f64>::zeros(n - 1, n - 1);
    for (i, &node) in nodes.iter().enumerate() {
        for &neighbor in graph.neighbors(node) {
            let Some(&j) = position.get(&neighbor) else {
                continue; // neighbor outside the induced subgraph
            };
            if i > 0 {
                minor[(i - 1, i - 1)] += 1.0; // degree within the subgraph
            }
            if i > 0 && j > 0 {
                minor[(i - 1, j - 1)] -= 1.0; // adjacency
            }
        }
    }
    minor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_nodes(graph: &Graph) -> Vec<u32> {
        (0..graph.num_nodes() as u32).collect()
    }

    #[test]
    fn path_has_one_spanning_tree() {
        let g = Graph::path(6);
        let mut cache = TreeCountCache::new();
        assert_eq!(spanning_tree_count(&g, &all_nodes(&g), &mut cache).unwrap(), 1);
        // Every connected sub-path is itself a tree.
        assert_eq!(spanning_tree_count(&g, &[1, 2, 3], &mut cache).unwrap(), 1);
        assert_eq!(spanning_tree_count(&g, &[4, 5], &mut cache).unwrap(), 1);
    }

    #[test]
    fn single_node_set_returns_one() {
        let g = Graph::path(3);
        let mut cache = TreeCountCache::new();
        assert_eq!(spanning_tree_count(&g, &[2], &mut cache).unwrap(), 1);
    }

    #[test]
    fn cycle_has_n_spanning_trees() {
        let mut cache = TreeCountCache::new();
        for n in 3..=12 {
            let g = Graph::cycle(n);
            let count = spanning_tree_count(&g, &all_nodes(&g), &mut cache).unwrap();
            assert_eq!(count as usize, n, "cycle on {} nodes", n);
        }
    }

    #[test]
    fn grid_3x3_has_192_spanning_trees() {
        // Known closed value for the 3x3 lattice; exercises a nontrivial
        // LU factorization.
        let g = Graph::grid(3, 3);
        let mut cache = TreeCountCache::new();
        assert_eq!(spanning_tree_count(&g, &all_nodes(&g), &mut cache).unwrap(), 192);
    }

    #[test]
    fn complete_graph_matches_cayley() {
        // K_4 has 4^2 = 16 spanning trees.
        let g = Graph::from_edges(4, &[(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]).unwrap();
        let mut cache = TreeCountCache::new();
        assert_eq!(spanning_tree_count(&g, &[0, 1, 2, 3], &mut cache).unwrap(), 16);
    }

    #[test]
    fn disconnected_set_is_an_invalid_partition() {
        let g = Graph::path(5);
        let mut cache = TreeCountCache::new();
        let result = spanning_tree_count(&g, &[0, 4], &mut cache);
        assert!(matches!(result, Err(TallyError::InvalidPartition(_))));
    }

    #[test]
    fn empty_set_is_rejected() {
        let g = Graph::path(3);
        let mut cache = TreeCountCache::new();
        let result = spanning_tree_count(&g, &[], &mut cache);
        assert!(matches!(result, Err(TallyError::InvalidInput(_))));
    }

    #[test]
    fn count_is_invariant_to_node_listing_order() {
        let g = Graph::grid(3, 3);
        let mut cache = TreeCountCache::new();
        let forward = spanning_tree_count(&g, &[0, 1, 2, 3, 4], &mut cache).unwrap();
        let mut fresh = TreeCountCache::new();
        let backward = spanning_tree_count(&g, &[4, 3, 2, 1, 0], &mut fresh).unwrap();
        assert_eq!(forward, backward);
        // Same set, same key: the second lookup in one cache is a hit.
        let again = spanning_tree_count(&g, &[2, 0, 4, 1, 3], &mut cache).unwrap();
        assert_eq!(again, forward);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn cached_count_equals_fresh_recomputation() {
        let g = Graph::cycle(7);
        let nodes: Vec<u32> = (0..7).collect();
        let mut warm = TreeCountCache::new();
        let first = spanning_tree_count(&g, &nodes, &mut warm).unwrap();
        let cached = spanning_tree_count(&g, &nodes, &mut warm).unwrap();
        let mut cold = TreeCountCache::new();
        let fresh = spanning_tree_count(&g, &nodes, &mut cold).unwrap();
        assert_eq!(first, cached);
        assert_eq!(first, fresh);
        assert_eq!(warm.len(), 1);
    }

    #[test]
    fn partition_weight_multiplies_part_counts() {
        // 2x3 grid: part {0,1,3,4} induces a 4-cycle (4 trees), part
        // {2,5} a single edge (1 tree).
        let g = Graph::grid(2, 3);
        let p = Partition::new(vec![1, 1, 2, 1, 1, 2], 2, &g).unwrap();
        let mut cache = TreeCountCache::new();
        let score = partition_weight(&g, &p, &mut cache).unwrap();
        assert_eq!(score.weight, 4.0);
        assert_eq!(score.cut_edges, 2);
    }

    #[test]
    fn partition_weight_rejects_disconnected_part() {
        let g = Graph::path(4);
        let p = Partition::new(vec![1, 2, 1, 2], 2, &g).unwrap();
        let mut cache = TreeCountCache::new();
        let result = partition_weight(&g, &p, &mut cache);
        assert!(matches!(result, Err(TallyError::InvalidPartition(_))));
    }
}
