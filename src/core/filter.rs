//! Outlier trimming by read length. Pairs are kept or dropped as a unit.

use crate::core::error::{LqError, Result};
use crate::core::model::{Measurement, TrimPolicy, lengths};
use crate::core::stats::{ReferenceStats, quantile_sorted, sorted_values};

/// Keeps reads with `mean - k*std <= length <= mean + k*std`.
pub fn filter_by_std_window(
    measurements: &[Measurement],
    mean_length: f64,
    std_length: f64,
    k: f64,
) -> Result<Vec<Measurement>> {
    if !k.is_finite() || k < 0.0 {
        return Err(LqError::InvalidArgument(format!(
            "std multiplier must be finite and non-negative, got {}",
            k
        )));
    }
    let lower = mean_length - k * std_length;
    let upper = mean_length + k * std_length;
    Ok(measurements
        .iter()
        .filter(|m| {
            let l = m.length as f64;
            lower <= l && l <= upper
        })
        .copied()
        .collect())
}

/// Keeps reads with `quantile(q) < length < quantile(1 - q)`.
///
/// `q = 0` keeps everything: the open window is taken over the unbounded
/// range rather than excluding the shortest and longest read. Any `q >= 0.5`
/// leaves an empty window.
pub fn filter_by_quantile_window(measurements: &[Measurement], q: f64) -> Result<Vec<Measurement>> {
    if !(0.0..=1.0).contains(&q) {
        return Err(LqError::InvalidArgument(format!(
            "quantile fraction must be within [0, 1], got {}",
            q
        )));
    }
    if q == 0.0 {
        return Ok(measurements.to_vec());
    }
    let sorted = sorted_values(&lengths(measurements));
    let (Some(lower), Some(upper)) = (quantile_sorted(&sorted, q), quantile_sorted(&sorted, 1.0 - q))
    else {
        return Ok(Vec::new());
    };
    Ok(measurements
        .iter()
        .filter(|m| {
            let l = m.length as f64;
            lower < l && l < upper
        })
        .copied()
        .collect())
}

pub fn apply_trim(
    measurements: &[Measurement],
    policy: &TrimPolicy,
    stats: &ReferenceStats,
) -> Result<Vec<Measurement>> {
    let kept = match *policy {
        TrimPolicy::StdWindow { k } => {
            filter_by_std_window(measurements, stats.mean_length, stats.std_length, k)?
        }
        TrimPolicy::Quantile { q } => filter_by_quantile_window(measurements, q)?,
    };
    log::info!(
        "trimming by {}: kept {} of {} reads",
        policy,
        kept.len(),
        measurements.len()
    );
    Ok(kept)
}
