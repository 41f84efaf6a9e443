//! # Weighted Order-Statistics
//!
//! Weighted median, quartiles, and arbitrary quantiles over a
//! `(value, weight)` sample, where a weight is the number of times its
//! value conceptually repeats (weights need not be integers for the
//! interpolated quantile variant).
//!
//! All statistics are computed directly from the compact representation in
//! O(n log n), never materializing the expanded multiset. For example, the
//! weighted median of values `[1, 2, 3, 4]` with weights `[4, 3, 2, 1]` is
//! the median of the conceptual array `[1, 1, 1, 1, 2, 2, 2, 3, 3, 4]`,
//! which is 2.
//!
//! Quartiles are the weighted medians of the below-median and above-median
//! halves, with the boundary weight corrected so a value straddling the
//! split is neither double counted nor dropped (Tukey-hinge semantics in
//! the unweighted case).

use crate::errors::TallyError;

/// Interpolation style for [`weighted_quantile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantileStyle {
    /// Interpolate against the cumulative weight distribution normalized
    /// to `[0, 1]`: the quantile is the smallest value `v` with
    /// `P(X <= v) >= q`, linearly interpolated between bracketing points.
    Empirical,
    /// Interpolate against midpoint positions rescaled to `[0, 1]`.
    /// With all-equal weights this reproduces `numpy.percentile`'s
    /// default linear interpolation.
    Percentile,
}

/// Where the weighted median falls in a sorted sample.
#[derive(Debug, Clone, Copy, PartialEq)]
struct MedianLocation {
    /// The median value itself.
    value: f64,
    /// Index into the sorted compact sample; half-integral when the median
    /// is the mean of two adjacent distinct values.
    index: f64,
    /// 0-indexed position in the conceptual expanded array,
    /// `(total_weight - 1) / 2`.
    location: f64,
}

/// Weighted median of a `(value, weight)` sample.
pub fn weighted_median(values: &[f64], weights: &[f64]) -> Result<f64, TallyError> {
    let (sorted_values, sorted_weights) = validate_and_sort(values, weights)?;
    Ok(locate_median(&sorted_values, &sorted_weights).value)
}

/// Weighted first quartile, median, and third quartile.
pub fn weighted_median_quartiles(
    values: &[f64],
    weights: &[f64],
) -> Result<(f64, f64, f64), TallyError> {
    let (sorted_values, sorted_weights) = validate_and_sort(values, weights)?;
    if sorted_values.len() == 1 {
        let v = sorted_values[0];
        return Ok((v, v, v));
    }

    let mut cumsum = Vec::with_capacity(sorted_weights.len());
    let mut running = 0.0;
    for &w in &sorted_weights {
        running += w;
        cumsum.push(running);
    }

    let median = locate_median(&sorted_values, &sorted_weights);
    let median_idx = median.index.floor() as usize;

    // Below-median sub-sample: everything strictly before the median's
    // index, plus any leftover copies of the boundary value so the split
    // point is counted exactly once overall.
    let mut below_values = sorted_values[..median_idx].to_vec();
    let mut below_weights = sorted_weights[..median_idx].to_vec();
    let below_sum: f64 = below_weights.iter().sum();
    let below_remainder = (median.location + 0.5).floor() - below_sum;
    if below_remainder > 0.0 {
        below_values.push(sorted_values[median_idx]);
        below_weights.push(below_remainder);
    }

    // Above-median sub-sample: the boundary value keeps only the copies
    // that fall past the median position.
    let boundary_leftover = cumsum[median_idx] - median.location.floor() - 1.0;
    let (above_values, above_weights) = if boundary_leftover > 0.0 {
        let mut above_weights = sorted_weights[median_idx..].to_vec();
        above_weights[0] = boundary_leftover;
        (sorted_values[median_idx..].to_vec(), above_weights)
    } else {
        (
            sorted_values[median_idx + 1..].to_vec(),
            sorted_weights[median_idx + 1..].to_vec(),
        )
    };

    let q1 = half_sample_median(&below_values, &below_weights, median.value);
    let q3 = half_sample_median(&above_values, &above_weights, median.value);
    Ok((q1, median.value, q3))
}

/// Weighted quantiles of a sample at the requested levels.
///
/// `weights = None` means all weights are 1. Set `values_sorted` only when
/// `values` (and the matching weights) are already sorted ascending by
/// value. Every level must lie in `[0, 1]`; levels outside the covered
/// range of the empirical CDF clamp to the terminal values.
pub fn weighted_quantile(
    values: &[f64],
    quantiles: &[f64],
    weights: Option<&[f64]>,
    values_sorted: bool,
    style: QuantileStyle,
) -> Result<Vec<f64>, TallyError> {
    for &q in quantiles {
        if !(0.0..=1.0).contains(&q) {
            return Err(TallyError::InvalidInput(format!(
                "quantile level {} outside [0, 1]",
                q
            )));
        }
    }
    let ones;
    let weights = match weights {
        Some(w) => w,
        None => {
            ones = vec![1.0; values.len()];
            &ones
        }
    };
    let (sorted_values, sorted_weights) = if values_sorted {
        validate_sample(values, weights)?;
        (values.to_vec(), weights.to_vec())
    } else {
        validate_and_sort(values, weights)?
    };

    if sorted_values.len() == 1 {
        return Ok(vec![sorted_values[0]; quantiles.len()]);
    }

    let total: f64 = sorted_weights.iter().sum();
    let mut positions = Vec::with_capacity(sorted_weights.len());
    let mut running = 0.0;
    match style {
        QuantileStyle::Empirical => {
            for &w in &sorted_weights {
                running += w;
                positions.push(running / total);
            }
        }
        QuantileStyle::Percentile => {
            for &w in &sorted_weights {
                positions.push(running + 0.5 * w);
                running += w;
            }
            let first = positions[0];
            let span = positions[positions.len() - 1] - first;
            for p in &mut positions {
                *p = (*p - first) / span;
            }
        }
    }

    Ok(quantiles
        .iter()
        .map(|&q| interpolate(q, &positions, &sorted_values))
        .collect())
}

/// `numpy.interp`-style piecewise-linear interpolation with clamping
/// outside the covered range.
fn interpolate(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[xs.len() - 1] {
        return ys[ys.len() - 1];
    }
    let hi = xs.partition_point(|&p| p < x);
    let lo = hi - 1;
    if xs[hi] == xs[lo] {
        return ys[lo];
    }
    let t = (x - xs[lo]) / (xs[hi] - xs[lo]);
    ys[lo] + t * (ys[hi] - ys[lo])
}

/// Median of one quartile half; an empty half collapses onto the sample
/// median (only possible for tiny samples).
fn half_sample_median(values: &[f64], weights: &[f64], sample_median: f64) -> f64 {
    if values.is_empty() {
        sample_median
    } else {
        locate_median(values, weights).value
    }
}

/// Scans cumulative-weight boundaries of a sorted sample for the bracket
/// containing the conceptual median position.
///
/// If the position lands exactly half an element short of the boundary
/// between two adjacent distinct values, the median is their mean;
/// otherwise it is the value whose weight interval contains the position.
fn locate_median(values: &[f64], weights: &[f64]) -> MedianLocation {
    let mut boundaries = Vec::with_capacity(weights.len() + 1);
    boundaries.push(0.0);
    let mut running = 0.0;
    for &w in weights {
        running += w;
        boundaries.push(running);
    }
    let location = (running - 1.0) / 2.0;

    for i in 0..weights.len().saturating_sub(1) {
        if boundaries[i] == location {
            return MedianLocation {
                value: values[i],
                index: i as f64,
                location,
            };
        }
        if boundaries[i] < location && location < boundaries[i + 1] {
            if location == boundaries[i + 1] - 0.5 {
                return MedianLocation {
                    value: (values[i] + values[i + 1]) / 2.0,
                    index: i as f64 + 0.5,
                    location,
                };
            }
            return MedianLocation {
                value: values[i],
                index: i as f64,
                location,
            };
        }
    }

    MedianLocation {
        value: values[values.len() - 1],
        index: (values.len() - 1) as f64,
        location,
    }
}

fn validate_sample(values: &[f64], weights: &[f64]) -> Result<(), TallyError> {
    if values.is_empty() {
        return Err(TallyError::InvalidInput("empty sample".into()));
    }
    if values.len() != weights.len() {
        return Err(TallyError::InvalidInput(format!(
            "{} values but {} weights",
            values.len(),
            weights.len()
        )));
    }
    let mut total = 0.0;
    for (&v, &w) in values.iter().zip(weights) {
        if !v.is_finite() || !w.is_finite() {
            return Err(TallyError::InvalidInput(
                "non-finite value or weight in sample".into(),
            ));
        }
        if w < 0.0 {
            return Err(TallyError::InvalidInput(format!("negative weight {}", w)));
        }
        total += w;
    }
    if total <= 0.0 {
        return Err(TallyError::InvalidInput(
            "total weight must be positive".into(),
        ));
    }
    Ok(())
}

fn validate_and_sort(values: &[f64], weights: &[f64]) -> Result<(Vec<f64>, Vec<f64>), TallyError> {
    validate_sample(values, weights)?;
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let sorted_values = order.iter().map(|&i| values[i]).collect();
    let sorted_weights = order.iter().map(|&i| weights[i]).collect();
    Ok((sorted_values, sorted_weights))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_case_median_is_2() {
        // Expanded: [1,1,1,1,2,2,2,3,3,4] -> median 2.
        let (q1, median, q3) =
            weighted_median_quartiles(&[1.0, 2.0, 3.0, 4.0], &[4.0, 3.0, 2.0, 1.0]).unwrap();
        assert_eq!(median, 2.0);
        // Halves: [1,1,1,1,2] -> 1 and [2,2,3,3,4] -> 3.
        assert_eq!(q1, 1.0);
        assert_eq!(q3, 3.0);
    }

    #[test]
    fn unit_weights_match_unweighted_median_and_hinges() {
        let values = [1.0, 2.0, 3.0, 4.0];
        let weights = [1.0; 4];
        let (q1, median, q3) = weighted_median_quartiles(&values, &weights).unwrap();
        assert_eq!(median, 2.5);
        assert_eq!(q1, 1.5); // median of [1, 2]
        assert_eq!(q3, 3.5); // median of [3, 4]
    }

    #[test]
    fn odd_unit_weight_sample() {
        let (q1, median, q3) =
            weighted_median_quartiles(&[5.0, 1.0, 3.0, 2.0, 4.0], &[1.0; 5]).unwrap();
        assert_eq!(median, 3.0);
        assert_eq!(q1, 1.5);
        assert_eq!(q3, 4.5);
    }

    #[test]
    fn single_element_returns_itself_everywhere() {
        let (q1, median, q3) = weighted_median_quartiles(&[7.5], &[3.0]).unwrap();
        assert_eq!((q1, median, q3), (7.5, 7.5, 7.5));
        let qs = weighted_quantile(&[7.5], &[0.0, 0.3, 1.0], Some(&[3.0]), false,
            QuantileStyle::Empirical).unwrap();
        assert_eq!(qs, vec![7.5, 7.5, 7.5]);
    }

    #[test]
    fn median_is_insensitive_to_input_order() {
        let a = weighted_median(&[1.0, 2.0, 3.0, 4.0], &[4.0, 3.0, 2.0, 1.0]).unwrap();
        let b = weighted_median(&[4.0, 1.0, 3.0, 2.0], &[1.0, 4.0, 2.0, 3.0]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn boundary_tie_at_half_integer_averages_adjacent_values() {
        // Expanded: [1,1,2,2] -> median position 1.5 on the 1|2 boundary.
        let median = weighted_median(&[1.0, 2.0], &[2.0, 2.0]).unwrap();
        assert_eq!(median, 1.5);
    }

    #[test]
    fn boundary_tie_at_quartile_split() {
        // Expanded: [1,1,2,2,3,3] -> median 2, halves [1,1,2] / [2,3,3].
        let (q1, median, q3) =
            weighted_median_quartiles(&[1.0, 2.0, 3.0], &[2.0, 2.0, 2.0]).unwrap();
        assert_eq!(median, 2.0);
        assert_eq!(q1, 1.0);
        assert_eq!(q3, 3.0);
    }

    #[test]
    fn repeated_single_value_dominates_quantiles() {
        let qs = weighted_quantile(
            &[42.0, 42.0, 42.0],
            &[0.0, 0.25, 0.5, 0.99, 1.0],
            Some(&[3.0, 1.5, 0.5]),
            false,
            QuantileStyle::Empirical,
        )
        .unwrap();
        assert!(qs.iter().all(|&q| q == 42.0));
    }

    #[test]
    fn percentile_style_matches_numpy_linear_for_unit_weights() {
        let values = [1.0, 2.0, 3.0, 4.0];
        let qs = weighted_quantile(
            &values,
            &[0.0, 0.25, 0.5, 0.75, 1.0],
            None,
            true,
            QuantileStyle::Percentile,
        )
        .unwrap();
        let expected = [1.0, 1.75, 2.5, 3.25, 4.0];
        for (got, want) in qs.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "got {}, want {}", got, want);
        }
    }

    #[test]
    fn empirical_style_tracks_cumulative_weights() {
        // Cumulative positions: 0.4, 0.7, 0.9, 1.0.
        let qs = weighted_quantile(
            &[1.0, 2.0, 3.0, 4.0],
            &[0.4, 1.0],
            Some(&[4.0, 3.0, 2.0, 1.0]),
            true,
            QuantileStyle::Empirical,
        )
        .unwrap();
        assert_eq!(qs[0], 1.0);
        assert_eq!(qs[1], 4.0);
    }

    #[test]
    fn quantile_levels_outside_unit_interval_are_rejected() {
        let result = weighted_quantile(&[1.0, 2.0], &[1.5], None, false, QuantileStyle::Empirical);
        assert!(matches!(result, Err(TallyError::InvalidInput(_))));
        let result = weighted_quantile(&[1.0, 2.0], &[-0.1], None, false, QuantileStyle::Empirical);
        assert!(matches!(result, Err(TallyError::InvalidInput(_))));
    }

    #[test]
    fn degenerate_samples_are_rejected() {
        assert!(weighted_median(&[], &[]).is_err());
        assert!(weighted_median(&[1.0, 2.0], &[1.0]).is_err());
        assert!(weighted_median(&[1.0, 2.0], &[0.0, 0.0]).is_err());
        assert!(weighted_median(&[1.0, 2.0], &[1.0, -1.0]).is_err());
        assert!(weighted_median(&[f64::NAN, 2.0], &[1.0, 1.0]).is_err());
    }
}
