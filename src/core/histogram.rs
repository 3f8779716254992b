//! Equal-width histograms over the filtered measurements.

use crate::core::error::{LqError, Result};
use crate::core::model::{Measurement, lengths, qualities};

/// Half-width, relative to the value, of the range given to a histogram
/// whose values are all equal.
const DEGENERATE_REL_PAD: f64 = 1e-9;

/// `bin_edges.len() == counts.len() + 1`; edges strictly increase. Every bin
/// is half-open except the last, which also holds the maximum.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    pub bin_edges: Vec<f64>,
    pub counts: Vec<u64>,
    pub weighted_counts: Option<Vec<f64>>,
}

impl Histogram {
    #[cfg(test)]
    pub fn new(values: &[f64], bins: usize) -> Result<Self> {
        Self::build(values, None, bins)
    }

    pub fn weighted(values: &[f64], weights: &[f64], bins: usize) -> Result<Self> {
        if weights.len() != values.len() {
            return Err(LqError::InvalidArgument(format!(
                "{} weights for {} values",
                weights.len(),
                values.len()
            )));
        }
        Self::build(values, Some(weights), bins)
    }

    fn build(values: &[f64], weights: Option<&[f64]>, bins: usize) -> Result<Self> {
        if bins == 0 {
            return Err(LqError::InvalidArgument(
                "histogram bin count must be at least 1".into(),
            ));
        }
        if values.is_empty() {
            return Err(LqError::InsufficientData(
                "cannot bin zero measurements".into(),
            ));
        }
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for &v in values {
            if !v.is_finite() {
                return Err(LqError::InvalidArgument(format!(
                    "non-finite value {} cannot be binned",
                    v
                )));
            }
            lo = lo.min(v);
            hi = hi.max(v);
        }
        if lo == hi {
            // ±0.5 vanishes below f64 resolution for large values
            let pad = (lo.abs() * DEGENERATE_REL_PAD).max(0.5);
            lo -= pad;
            hi += pad;
        }

        let span = hi - lo;
        let mut bin_edges: Vec<f64> = (0..bins)
            .map(|i| lo + span * i as f64 / bins as f64)
            .collect();
        bin_edges.push(hi);
        if let Some(w) = bin_edges.windows(2).find(|w| w[0] >= w[1]) {
            return Err(LqError::InvalidArgument(format!(
                "{} bins over {}..{} are narrower than f64 resolution (edge {} repeats)",
                bins, lo, hi, w[0]
            )));
        }

        let mut counts = vec![0u64; bins];
        let mut weighted = weights.map(|_| vec![0.0f64; bins]);
        for (i, &v) in values.iter().enumerate() {
            let mut idx = ((v - lo) / span * bins as f64) as usize;
            if idx >= bins {
                idx = bins - 1;
            }
            // float rounding can land a value just past its edge
            while idx > 0 && v < bin_edges[idx] {
                idx -= 1;
            }
            while idx + 1 < bins && v >= bin_edges[idx + 1] {
                idx += 1;
            }
            counts[idx] += 1;
            if let (Some(w), Some(acc)) = (weights, weighted.as_mut()) {
                acc[idx] += w[i];
            }
        }

        Ok(Self {
            bin_edges,
            counts,
            weighted_counts: weighted,
        })
    }

    pub fn range(&self) -> (f64, f64) {
        (self.bin_edges[0], self.bin_edges[self.bin_edges.len() - 1])
    }

    pub fn weighted_total(&self) -> f64 {
        self.weighted_counts
            .as_ref()
            .map(|w| w.iter().sum())
            .unwrap_or(0.0)
    }

    /// `(left, right, height)` per bin, read counts.
    pub fn count_bars(&self) -> Vec<(f64, f64, f64)> {
        self.bars(self.counts.iter().map(|&c| c as f64))
    }

    /// `(left, right, height)` per bin, summed weights. Empty when unweighted.
    pub fn weighted_bars(&self) -> Vec<(f64, f64, f64)> {
        match &self.weighted_counts {
            Some(w) => self.bars(w.iter().copied()),
            None => Vec::new(),
        }
    }

    fn bars<I: Iterator<Item = f64>>(&self, heights: I) -> Vec<(f64, f64, f64)> {
        self.bin_edges
            .windows(2)
            .zip(heights)
            .map(|(e, h)| (e[0], e[1], h))
            .collect()
    }
}

/// Length histogram; weights are the lengths themselves (bases per bin).
pub fn length_histogram(measurements: &[Measurement], bins: usize) -> Result<Histogram> {
    let l = lengths(measurements);
    Histogram::weighted(&l, &l, bins)
}

/// Quality histogram; each read contributes its length as weight.
pub fn quality_histogram(measurements: &[Measurement], bins: usize) -> Result<Histogram> {
    Histogram::weighted(&qualities(measurements), &lengths(measurements), bins)
}
