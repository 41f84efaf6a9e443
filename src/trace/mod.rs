//! # Streaming Distance Tracker
//!
//! Measures the 1-D earth-mover (Wasserstein) distance between two growing
//! weighted empirical distributions at fixed checkpoints, as a convergence
//! diagnostic for sampled chains.
//!
//! ## Processing model
//!
//! The two input sequences are walked in lockstep in the given order; that
//! order is the chronological order of samples from a chain, and the trace
//! characterizes convergence over chain length, not over a resort. Each
//! step adds one `(label, weight)` observation to the side's running
//! histogram accumulator. Whenever the step index is a positive multiple of
//! the resolution, the distance between the two accumulators is appended to
//! the trace, so no checkpoint ever fires at step 0.
//!
//! Three variants mirror the three chain-comparison setups:
//! two growing chains ([`wasserstein_trace`]), one growing chain against a
//! fixed reference distribution ([`wasserstein_trace_to_reference`]), and
//! two chains of per-district share vectors compared rank-by-rank
//! ([`wasserstein_trace_shares`]).

use std::collections::BTreeMap;

use crate::errors::TallyError;

/// Checkpointed distance trace: aligned `(step, distance)` sequences with
/// strictly increasing steps, ready for direct line-plotting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistanceTrace {
    /// Checkpoint step indices, each a positive multiple of the resolution.
    pub steps: Vec<u64>,
    /// Wasserstein distance at each checkpoint.
    pub distances: Vec<f64>,
}

impl DistanceTrace {
    /// Number of checkpoints recorded.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether any checkpoint fired.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Total order for f64 histogram bins.
#[derive(Debug, Clone, Copy, PartialEq)]
struct BinLabel(f64);

impl Eq for BinLabel {}

impl PartialOrd for BinLabel {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BinLabel {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Running weighted histogram over real-valued labels.
#[derive(Debug, Clone, Default)]
struct WeightedHistogram {
    bins: BTreeMap<BinLabel, f64>,
}

impl WeightedHistogram {
    fn add(&mut self, label: f64, weight: f64) {
        *self.bins.entry(BinLabel(label)).or_insert(0.0) += weight;
    }

    fn from_distribution(labels: &[f64], weights: &[f64]) -> Self {
        let mut hist = WeightedHistogram::default();
        for (&label, &weight) in labels.iter().zip(weights) {
            hist.add(label, weight);
        }
        hist
    }

    /// Bins in ascending label order.
    fn sorted_bins(&self) -> (Vec<f64>, Vec<f64>) {
        let labels = self.bins.keys().map(|b| b.0).collect();
        let weights = self.bins.values().copied().collect();
        (labels, weights)
    }

    fn total_weight(&self) -> f64 {
        self.bins.values().sum()
    }
}

/// 1-D Wasserstein (earth-mover) distance between two weighted empirical
/// distributions: the integral of the absolute difference of their
/// weighted CDFs.
///
/// `None` weights mean every observation counts once. Values need not be
/// sorted or unique.
pub fn wasserstein_distance(
    u_values: &[f64],
    v_values: &[f64],
    u_weights: Option<&[f64]>,
    v_weights: Option<&[f64]>,
) -> Result<f64, TallyError> {
    let u = side_histogram(u_values, u_weights, "first")?;
    let v = side_histogram(v_values, v_weights, "second")?;
    Ok(histogram_distance(&u, &v))
}

fn side_histogram(
    values: &[f64],
    weights: Option<&[f64]>,
    side: &str,
) -> Result<WeightedHistogram, TallyError> {
    if values.is_empty() {
        return Err(TallyError::InvalidInput(format!(
            "{} distribution is empty",
            side
        )));
    }
    let hist = match weights {
        Some(weights) => {
            if weights.len() != values.len() {
                return Err(TallyError::InvalidInput(format!(
                    "{} distribution has {} values but {} weights",
                    side,
                    values.len(),
                    weights.len()
                )));
            }
            WeightedHistogram::from_distribution(values, weights)
        }
        None => {
            let ones = vec![1.0; values.len()];
            WeightedHistogram::from_distribution(values, &ones)
        }
    };
    if hist.total_weight() <= 0.0 {
        return Err(TallyError::InvalidInput(format!(
            "{} distribution has non-positive total weight",
            side
        )));
    }
    Ok(hist)
}

/// Merge-walk over the pooled support of two sorted histograms, summing
/// `|U(x) - V(x)| * dx` between consecutive support points.
fn histogram_distance(u: &WeightedHistogram, v: &WeightedHistogram) -> f64 {
    let (u_labels, u_weights) = u.sorted_bins();
    let (v_labels, v_weights) = v.sorted_bins();
    let u_total = u.total_weight();
    let v_total = v.total_weight();

    let mut distance = 0.0;
    let mut u_cdf = 0.0;
    let mut v_cdf = 0.0;
    let mut i = 0;
    let mut j = 0;
    let mut previous: Option<f64> = None;

    while i < u_labels.len() || j < v_labels.len() {
        let x = match (u_labels.get(i), v_labels.get(j)) {
            (Some(&a), Some(&b)) => a.min(b),
            (Some(&a), None) => a,
            (None, Some(&b)) => b,
            (None, None) => unreachable!(),
        };
        if let Some(prev) = previous {
            distance += (u_cdf / u_total - v_cdf / v_total).abs() * (x - prev);
        }
        while i < u_labels.len() && u_labels[i] == x {
            u_cdf += u_weights[i];
            i += 1;
        }
        while j < v_labels.len() && v_labels[j] == x {
            v_cdf += v_weights[j];
            j += 1;
        }
        previous = Some(x);
    }
    distance
}

/// A checkpoint fires when the step index is a positive multiple of the
/// resolution, under f64 arithmetic so fractional resolutions are honored
/// exactly.
fn is_checkpoint(step: usize, resolution: f64) -> bool {
    step > 0 && (step as f64) % resolution == 0.0
}

fn validate_resolution(resolution: f64) -> Result<(), TallyError> {
    if !resolution.is_finite() || resolution <= 0.0 {
        return Err(TallyError::InvalidInput(format!(
            "resolution {} must be positive and finite",
            resolution
        )));
    }
    Ok(())
}

/// Checkpointed distance trace between two growing chains.
///
/// All four sequences must have equal length; the pairing at each step is
/// semantically meaningful and a shape mismatch is an input error, not a
/// truncation.
pub fn wasserstein_trace(
    labels1: &[f64],
    labels2: &[f64],
    weights1: &[f64],
    weights2: &[f64],
    resolution: f64,
) -> Result<DistanceTrace, TallyError> {
    validate_resolution(resolution)?;
    let n = labels1.len();
    if labels2.len() != n || weights1.len() != n || weights2.len() != n {
        return Err(TallyError::InvalidInput(format!(
            "paired sequences must have equal length, got {}/{}/{}/{}",
            labels1.len(),
            labels2.len(),
            weights1.len(),
            weights2.len()
        )));
    }

    let mut hist1 = WeightedHistogram::default();
    let mut hist2 = WeightedHistogram::default();
    let mut trace = DistanceTrace::default();
    for step in 0..n {
        hist1.add(labels1[step], weights1[step]);
        hist2.add(labels2[step], weights2[step]);
        if is_checkpoint(step, resolution) {
            trace.steps.push(step as u64);
            trace.distances.push(histogram_distance(&hist1, &hist2));
        }
    }
    Ok(trace)
}

/// Checkpointed distance trace of one growing chain against a fixed
/// reference distribution (e.g. the exact cut-edge table).
///
/// The reference accumulator is populated once and never updated.
pub fn wasserstein_trace_to_reference(
    labels: &[f64],
    weights: &[f64],
    ref_labels: &[f64],
    ref_weights: &[f64],
    resolution: f64,
) -> Result<DistanceTrace, TallyError> {
    validate_resolution(resolution)?;
    if labels.len() != weights.len() {
        return Err(TallyError::InvalidInput(format!(
            "{} labels but {} weights",
            labels.len(),
            weights.len()
        )));
    }
    let reference = side_histogram(ref_labels, Some(ref_weights), "reference")?;

    let mut hist = WeightedHistogram::default();
    let mut trace = DistanceTrace::default();
    for step in 0..labels.len() {
        hist.add(labels[step], weights[step]);
        if is_checkpoint(step, resolution) {
            trace.steps.push(step as u64);
            trace.distances.push(histogram_distance(&hist, &reference));
        }
    }
    Ok(trace)
}

/// Checkpointed distance trace between two chains of per-district share
/// vectors.
///
/// Each record's shares are sorted ascending before accumulation, so the
/// comparison is between rank-ordered share distributions rather than
/// between specific district labels. The checkpoint distance is the sum of
/// per-rank Wasserstein distances.
pub fn wasserstein_trace_shares(
    shares1: &[Vec<f64>],
    shares2: &[Vec<f64>],
    weights1: &[f64],
    weights2: &[f64],
    resolution: f64,
) -> Result<DistanceTrace, TallyError> {
    validate_resolution(resolution)?;
    let n = shares1.len();
    if shares2.len() != n || weights1.len() != n || weights2.len() != n {
        return Err(TallyError::InvalidInput(format!(
            "paired share sequences must have equal length, got {}/{}/{}/{}",
            shares1.len(),
            shares2.len(),
            weights1.len(),
            weights2.len()
        )));
    }
    let num_positions = match shares1.first() {
        Some(row) if !row.is_empty() => row.len(),
        _ => {
            return Err(TallyError::InvalidInput(
                "share records must have at least one position".into(),
            ));
        }
    };
    for row in shares1.iter().chain(shares2) {
        if row.len() != num_positions {
            return Err(TallyError::InvalidInput(format!(
                "ragged share record: expected width {}, got {}",
                num_positions,
                row.len()
            )));
        }
    }

    let mut hists1 = vec![WeightedHistogram::default(); num_positions];
    let mut hists2 = vec![WeightedHistogram::default(); num_positions];
    let mut trace = DistanceTrace::default();
    let mut sorted_row = vec![0.0; num_positions];

    for step in 0..n {
        sorted_row.copy_from_slice(&shares1[step]);
        sorted_row.sort_by(f64::total_cmp);
        for (rank, &share) in sorted_row.iter().enumerate() {
            hists1[rank].add(share, weights1[step]);
        }

        sorted_row.copy_from_slice(&shares2[step]);
        sorted_row.sort_by(f64::total_cmp);
        for (rank, &share) in sorted_row.iter().enumerate() {
            hists2[rank].add(share, weights2[step]);
        }

        if is_checkpoint(step, resolution) {
            let distance = hists1
                .iter()
                .zip(&hists2)
                .map(|(h1, h2)| histogram_distance(h1, h2))
                .sum();
            trace.steps.push(step as u64);
            trace.distances.push(distance);
        }
    }
    Ok(trace)
}
