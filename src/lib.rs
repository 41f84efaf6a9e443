//! # Treetally - Exact Validation Toolkit for Redistricting Samplers
//!
//! Treetally validates Markov-chain samplers that generate random
//! districting plans on a graph, by comparing sampled output distributions
//! against an exact, enumeration-based ground truth and against each other.
//!
//! ## Architecture
//!
//! The crate is organized into several modules:
//!
//! - **graph**: Undirected graph, partition, and canonical node-set model
//! - **spanning**: Matrix-Tree spanning-tree counts with per-worker memoization
//! - **tally**: Parallel aggregation of partition records into the exact
//!   cut-edge probability table
//! - **stats**: Weighted median, quartiles, and quantiles over compact
//!   `(value, weight)` samples
//! - **trace**: Checkpointed 1-D Wasserstein distance traces between
//!   weighted empirical distributions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use treetally::{tally_distribution, Graph};
//!
//! let graph = Graph::grid(2, 2);
//! let plans = vec![vec![1, 1, 2, 2], vec![1, 2, 1, 2]];
//! let table = tally_distribution(&graph, 2, &plans)?;
//! table.write_csv(std::io::stdout())?;
//! ```

#![forbid(unsafe_code)]

pub mod errors;
pub mod graph;
pub mod spanning;
pub mod stats;
pub mod tally;
pub mod trace;

// Re-export commonly used types
pub use errors::TallyError;
pub use graph::{Graph, NodeSetKey, Partition};
pub use spanning::{partition_weight, spanning_tree_count, PlanScore, TreeCountCache};
pub use stats::{weighted_median, weighted_median_quartiles, weighted_quantile, QuantileStyle};
pub use tally::{count_assignments, read_assignments, tally_distribution, CutEdgeRow, CutEdgeTable};
pub use trace::{
    wasserstein_distance, wasserstein_trace, wasserstein_trace_shares,
    wasserstein_trace_to_reference, DistanceTrace,
};
