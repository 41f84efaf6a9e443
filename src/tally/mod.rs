//! # Exact Distribution Aggregator
//!
//! Consumes a stream of partition records, scores each one with the
//! weighting engine, and reduces the scores into the exact cut-edge
//! probability table that sampled chains are compared against.
//!
//! ## Processing model
//!
//! Records are independent, so they are dispatched across a fixed rayon
//! pool; each worker owns a private [`TreeCountCache`] (via `map_init`) and
//! returns one `(cut_edges, weight)` pair per record. The reduction groups
//! by cut-edge count and sums weights, which is commutative and
//! associative, so completion order cannot affect the final table. Any
//! record error aborts the whole aggregation: the ground-truth table is
//! all-or-nothing.
//!
//! ## Feature gating
//!
//! Parallel scoring is behind the `parallel` feature flag (default on).
//! When disabled, records are scored sequentially with a single cache.
//!
//! ## Record format
//!
//! Plan records arrive as JSONL, one object per line with an `assignment`
//! array of 1-indexed part labels, one entry per graph node:
//!
//! ```text
//! {"assignment": [1, 1, 2, 2]}
//! ```

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::TallyError;
use crate::graph::{Graph, Partition};
use crate::spanning::{partition_weight, PlanScore, TreeCountCache};

/// One JSONL plan record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PlanRecord {
    assignment: Vec<u32>,
}

/// One row of the finalized probability table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutEdgeRow {
    /// The summary statistic: number of cut edges.
    pub cut_edges: u32,
    /// Summed partition weight over all records with this cut-edge count.
    pub tree_count: f64,
    /// Number of records with this cut-edge count.
    pub n_plans: u64,
    /// Share of total weight, as a percentage in [0, 100].
    pub probability: f64,
}

/// Exact marginal distribution of cut-edge counts, read-only once built.
///
/// Rows are sorted ascending by cut-edge count. `probability` sums to 100
/// within floating tolerance and `n_plans` sums to the input record count.
#[derive(Debug, Clone, PartialEq)]
pub struct CutEdgeTable {
    rows: Vec<CutEdgeRow>,
    total_plans: u64,
    total_weight: f64,
}

impl CutEdgeTable {
    /// Table rows, ascending by cut-edge count.
    pub fn rows(&self) -> &[CutEdgeRow] {
        &self.rows
    }

    /// Total number of input records.
    pub fn total_plans(&self) -> u64 {
        self.total_plans
    }

    /// Total summed partition weight across all records.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// The table as a weighted label distribution `(cut_edges, weight)`,
    /// for use as the fixed reference side of a distance trace.
    pub fn reference_distribution(&self) -> (Vec<f64>, Vec<f64>) {
        let labels = self.rows.iter().map(|r| r.cut_edges as f64).collect();
        let weights = self.rows.iter().map(|r| r.tree_count).collect();
        (labels, weights)
    }

    /// Writes the table as delimited text with header
    /// `cut_edges,tree_count,n_plans,probability`.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), TallyError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for row in &self.rows {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

/// Pre-pass over a record stream: total record count, for progress
/// reporting before the scoring pass. Blank lines are not records.
pub fn count_assignments<R: BufRead>(reader: R) -> Result<u64, TallyError> {
    let mut count = 0u64;
    for line in reader.lines() {
        if !line?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}

/// Reads all plan records from a JSONL stream.
///
/// A malformed line is an error, not a skip: a partially read ensemble
/// would silently bias the ground-truth table.
pub fn read_assignments<R: BufRead>(reader: R) -> Result<Vec<Vec<u32>>, TallyError> {
    let mut assignments = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: PlanRecord = serde_json::from_str(&line)?;
        assignments.push(record.assignment);
    }
    Ok(assignments)
}

/// Scores every record and reduces to the exact cut-edge distribution.
///
/// Valid only for graphs small enough for exhaustive or near-exhaustive
/// enumeration; the resulting table is the ground truth that sampled
/// chains are measured against.
pub fn tally_distribution(
    graph: &Graph,
    num_parts: u32,
    assignments: &[Vec<u32>],
) -> Result<CutEdgeTable, TallyError> {
    if assignments.is_empty() {
        return Err(TallyError::InvalidInput(
            "no partition records to tally".into(),
        ));
    }
    let scores = score_records(graph, num_parts, assignments)?;
    Ok(reduce_scores(&scores))
}

fn score_one(
    graph: &Graph,
    num_parts: u32,
    labels: &[u32],
    cache: &mut TreeCountCache,
) -> Result<PlanScore, TallyError> {
    let partition = Partition::new(labels.to_vec(), num_parts, graph)?;
    partition_weight(graph, &partition, cache)
}

#[cfg(feature = "parallel")]
fn score_records(
    graph: &Graph,
    num_parts: u32,
    assignments: &[Vec<u32>],
) -> Result<Vec<PlanScore>, TallyError> {
    assignments
        .par_iter()
        .map_init(TreeCountCache::new, |cache, labels| {
            score_one(graph, num_parts, labels, cache)
        })
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn score_records(
    graph: &Graph,
    num_parts: u32,
    assignments: &[Vec<u32>],
) -> Result<Vec<PlanScore>, TallyError> {
    let mut cache = TreeCountCache::new();
    assignments
        .iter()
        .map(|labels| score_one(graph, num_parts, labels, &mut cache))
        .collect()
}

/// Order-insensitive reduction: group by cut-edge count, sum weights.
fn reduce_scores(scores: &[PlanScore]) -> CutEdgeTable {
    let mut groups: BTreeMap<u32, (f64, u64)> = BTreeMap::new();
    for score in scores {
        let entry = groups.entry(score.cut_edges).or_insert((0.0, 0));
        entry.0 += score.weight;
        entry.1 += 1;
    }

    let total_weight: f64 = groups.values().map(|&(weight, _)| weight).sum();
    let rows = groups
        .into_iter()
        .map(|(cut_edges, (tree_count, n_plans))| CutEdgeRow {
            cut_edges,
            tree_count,
            n_plans,
            probability: 100.0 * tree_count / total_weight,
        })
        .collect();

    CutEdgeTable {
        rows,
        total_plans: scores.len() as u64,
        total_weight,
    }
}
