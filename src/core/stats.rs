//! Reference statistics over the unfiltered measurements.
//!
//! Every reference value can be supplied by the caller instead of derived.
//! A supplied value is used verbatim and the derivation for that field is
//! skipped entirely.

use crate::core::error::{LqError, Result};
use crate::core::model::{Measurement, NxConvention, SortOrder, total_bases};
use std::collections::BTreeMap;

/// Quality values are bucketed to 1/100 before taking the mode.
const MODE_QUAL_BUCKETS: f64 = 100.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StatOverrides {
    pub mean_length: Option<f64>,
    pub std_length: Option<f64>,
    pub n50: Option<f64>,
    pub mean_quality: Option<f64>,
    pub mode_quality: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReferenceStats {
    pub mean_length: f64,
    pub std_length: f64,
    pub n50: Option<f64>,
    pub mean_quality: Option<f64>,
    pub mode_quality: Option<f64>,
}

impl ReferenceStats {
    pub fn resolve(
        measurements: &[Measurement],
        overrides: &StatOverrides,
        convention: NxConvention,
    ) -> Result<Self> {
        if measurements.is_empty() {
            return Err(LqError::InsufficientData(
                "no measurements in input; cannot derive length or quality statistics".into(),
            ));
        }
        check_override("mean length", overrides.mean_length)?;
        check_override("length standard deviation", overrides.std_length)?;
        check_override("N50", overrides.n50)?;
        check_override("mean quality", overrides.mean_quality)?;
        check_override("mode quality", overrides.mode_quality)?;

        let mean_length = match overrides.mean_length {
            Some(v) => v,
            None => compute_mean_length(measurements)?,
        };
        let std_length = match overrides.std_length {
            Some(v) => v,
            None => compute_std_length(measurements)?,
        };
        let n50 = overrides
            .n50
            .or_else(|| compute_n50(measurements, convention));
        let mean_quality = overrides
            .mean_quality
            .or_else(|| compute_mean_quality(measurements));
        let mode_quality = overrides
            .mode_quality
            .or_else(|| compute_mode_quality(measurements));

        log::debug!(
            "reference stats: mean_len={:.2} std_len={:.2} n50={:?} mean_q={:?} mode_q={:?}",
            mean_length,
            std_length,
            n50,
            mean_quality,
            mode_quality
        );
        Ok(Self {
            mean_length,
            std_length,
            n50,
            mean_quality,
            mode_quality,
        })
    }
}

fn check_override(name: &str, v: Option<f64>) -> Result<()> {
    match v {
        Some(x) if !x.is_finite() || x < 0.0 => Err(LqError::InvalidArgument(format!(
            "{} must be a finite non-negative number, got {}",
            name, x
        ))),
        _ => Ok(()),
    }
}

pub fn compute_mean_length(measurements: &[Measurement]) -> Result<f64> {
    if measurements.is_empty() {
        return Err(LqError::InsufficientData(
            "mean length of zero reads".into(),
        ));
    }
    Ok(total_bases(measurements) as f64 / measurements.len() as f64)
}

/// Population standard deviation (ddof = 0).
pub fn compute_std_length(measurements: &[Measurement]) -> Result<f64> {
    let mean = compute_mean_length(measurements)?;
    let ss = measurements.iter().fold(0.0, |acc, m| {
        let d = m.length as f64 - mean;
        acc + d * d
    });
    Ok((ss / measurements.len() as f64).sqrt())
}

pub fn compute_n50(measurements: &[Measurement], convention: NxConvention) -> Option<f64> {
    compute_nx(measurements, 0.5, convention)
}

/// Length at which the running base total, walking the reads in the
/// convention's order, first reaches `x` of all bases.
pub fn compute_nx(measurements: &[Measurement], x: f64, convention: NxConvention) -> Option<f64> {
    if measurements.is_empty() {
        return None;
    }
    let mut sorted: Vec<u64> = measurements.iter().map(|m| m.length).collect();
    match convention.order {
        SortOrder::Descending => sorted.sort_unstable_by(|a, b| b.cmp(a)),
        SortOrder::Ascending => sorted.sort_unstable(),
    }
    let target = total_bases(measurements) as f64 * x;
    let mut cumulative = 0u128;
    for len in sorted {
        cumulative += u128::from(len);
        if convention.threshold.reached(cumulative as f64, target) {
            return Some(len as f64);
        }
    }
    None
}

pub fn compute_mean_quality(measurements: &[Measurement]) -> Option<f64> {
    if measurements.is_empty() {
        return None;
    }
    let sum: f64 = measurements.iter().map(|m| m.quality).sum();
    Some(sum / measurements.len() as f64)
}

/// Most populated quality bucket at 0.01 resolution. Ties resolve to the
/// lowest quality.
pub fn compute_mode_quality(measurements: &[Measurement]) -> Option<f64> {
    let mut counter: BTreeMap<i64, u64> = BTreeMap::new();
    for m in measurements {
        let key = (m.quality * MODE_QUAL_BUCKETS).round() as i64;
        *counter.entry(key).or_insert(0) += 1;
    }
    let mut best: Option<(i64, u64)> = None;
    for (&key, &count) in &counter {
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((key, count));
        }
    }
    best.map(|(key, _)| key as f64 / MODE_QUAL_BUCKETS)
}

/// Linear interpolation between closest ranks (numpy's default method).
/// `sorted` must be ascending.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let p = p.clamp(0.0, 1.0);
    let idx = p * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    let frac = idx - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn sorted_values(values: &[f64]) -> Vec<f64> {
    let mut s = values.to_vec();
    s.sort_by(|a, b| a.total_cmp(b));
    s
}

/// Whole-run summary of the unfiltered reads, reported alongside the figures.
#[derive(Clone, Debug)]
pub struct BasicStatistics {
    pub reads_number: usize,
    pub bases_number: u128,
    pub n10: f64,
    pub n50: f64,
    pub n90: f64,
    pub min_len: u64,
    pub max_len: u64,
    pub mean_len: f64,
    pub std_len: f64,
    pub len_quartiles: [f64; 3],
    pub mean_qual: f64,
    pub mode_qual: f64,
    pub min_qual: f64,
    pub max_qual: f64,
    pub qual_quartiles: [f64; 3],
    pub length_thresholds: Vec<ThresholdRow<u64>>,
    pub quality_thresholds: Vec<ThresholdRow<f64>>,
}

/// Reads (and their bases) strictly above `threshold`.
#[derive(Clone, Debug)]
pub struct ThresholdRow<T> {
    pub threshold: T,
    pub reads: usize,
    pub bases: u128,
}

pub const LENGTH_THRESHOLDS: [u64; 5] = [1_000, 5_000, 10_000, 20_000, 50_000];
pub const QUALITY_THRESHOLDS: [f64; 5] = [7.0, 10.0, 12.0, 15.0, 20.0];

impl BasicStatistics {
    pub fn compute(measurements: &[Measurement], convention: NxConvention) -> Result<Self> {
        if measurements.is_empty() {
            return Err(LqError::InsufficientData(
                "cannot summarise zero reads".into(),
            ));
        }
        let nx = |x: f64| compute_nx(measurements, x, convention).unwrap_or(0.0);
        let lens = sorted_values(&crate::core::model::lengths(measurements));
        let quals = sorted_values(&crate::core::model::qualities(measurements));
        let q = |s: &[f64], p: f64| quantile_sorted(s, p).unwrap_or(0.0);

        let length_thresholds = LENGTH_THRESHOLDS
            .iter()
            .map(|&t| {
                let (reads, bases) = above(measurements, |m| m.length > t);
                ThresholdRow {
                    threshold: t,
                    reads,
                    bases,
                }
            })
            .collect();
        let quality_thresholds = QUALITY_THRESHOLDS
            .iter()
            .map(|&t| {
                let (reads, bases) = above(measurements, |m| m.quality > t);
                ThresholdRow {
                    threshold: t,
                    reads,
                    bases,
                }
            })
            .collect();

        Ok(Self {
            reads_number: measurements.len(),
            bases_number: total_bases(measurements),
            n10: nx(0.1),
            n50: nx(0.5),
            n90: nx(0.9),
            min_len: lens[0] as u64,
            max_len: lens[lens.len() - 1] as u64,
            mean_len: compute_mean_length(measurements)?,
            std_len: compute_std_length(measurements)?,
            len_quartiles: [q(&lens, 0.25), q(&lens, 0.5), q(&lens, 0.75)],
            mean_qual: compute_mean_quality(measurements).unwrap_or(0.0),
            mode_qual: compute_mode_quality(measurements).unwrap_or(0.0),
            min_qual: quals[0],
            max_qual: quals[quals.len() - 1],
            qual_quartiles: [q(&quals, 0.25), q(&quals, 0.5), q(&quals, 0.75)],
            length_thresholds,
            quality_thresholds,
        })
    }
}

fn above<F>(measurements: &[Measurement], pred: F) -> (usize, u128)
where
    F: Fn(&Measurement) -> bool,
{
    measurements
        .iter()
        .filter(|m| pred(m))
        .fold((0usize, 0u128), |(n, b), m| (n + 1, b + u128::from(m.length)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Threshold;

    const TOL: f64 = 1e-9;

    fn reads(pairs: &[(u64, f64)]) -> Vec<Measurement> {
        pairs.iter().map(|&(l, q)| Measurement::new(l, q)).collect()
    }

    fn scenario() -> Vec<Measurement> {
        reads(&[(1000, 10.0), (2000, 12.0), (1500, 11.0), (5000, 9.0)])
    }

    #[test]
    fn mean_length_matches_column_mean() {
        let m = reads(&[(3, 1.0), (7, 1.0), (11, 1.0), (100, 1.0), (4, 1.0)]);
        let expected = (3 + 7 + 11 + 100 + 4) as f64 / 5.0;
        assert!((compute_mean_length(&m).unwrap() - expected).abs() < TOL);
    }

    #[test]
    fn std_is_population_std() {
        let m = reads(&[
            (2, 0.0),
            (4, 0.0),
            (4, 0.0),
            (4, 0.0),
            (5, 0.0),
            (5, 0.0),
            (7, 0.0),
            (9, 0.0),
        ]);
        assert!((compute_std_length(&m).unwrap() - 2.0).abs() < TOL);
    }

    #[test]
    fn single_read_has_zero_std() {
        let m = reads(&[(1234, 15.0)]);
        assert_eq!(compute_std_length(&m).unwrap(), 0.0);
        assert_eq!(compute_n50(&m, NxConvention::default()), Some(1234.0));
    }

    #[test]
    fn huge_lengths_do_not_overflow_base_total() {
        let len = u64::MAX / 2 + 1;
        let m = reads(&[(len, 10.0), (len, 12.0)]);
        let stats = ReferenceStats::resolve(&m, &StatOverrides::default(), NxConvention::default())
            .unwrap();
        assert_eq!(stats.mean_length, len as f64);
        assert_eq!(stats.std_length, 0.0);
        assert_eq!(stats.n50, Some(len as f64));

        let summary = BasicStatistics::compute(&m, NxConvention::default()).unwrap();
        assert_eq!(summary.bases_number, u128::from(u64::MAX) + 1);
        assert_eq!(summary.length_thresholds[0].bases, u128::from(u64::MAX) + 1);
    }

    #[test]
    fn empty_input_is_insufficient() {
        assert!(matches!(
            compute_mean_length(&[]),
            Err(LqError::InsufficientData(_))
        ));
        assert_eq!(compute_n50(&[], NxConvention::default()), None);
        assert_eq!(compute_mean_quality(&[]), None);
        assert_eq!(compute_mode_quality(&[]), None);
        assert!(matches!(
            ReferenceStats::resolve(&[], &StatOverrides::default(), NxConvention::default()),
            Err(LqError::InsufficientData(_))
        ));
    }

    #[test]
    fn n50_of_four_reads() {
        // 9500 bases, half is 4750; the 5000 read alone covers it.
        let m = scenario();
        assert_eq!(compute_n50(&m, NxConvention::default()), Some(5000.0));
        let asc = NxConvention {
            order: SortOrder::Ascending,
            threshold: Threshold::AtLeast,
        };
        // ascending cumulative: 1000, 2500, 4500, 9500
        assert_eq!(compute_n50(&m, asc), Some(5000.0));
    }

    #[test]
    fn n50_threshold_conventions_differ_on_exact_half() {
        let m = reads(&[(100, 0.0), (100, 0.0)]);
        let at_least = NxConvention::default();
        let exceeds = NxConvention {
            order: SortOrder::Descending,
            threshold: Threshold::Exceeds,
        };
        assert_eq!(compute_n50(&m, at_least), Some(100.0));
        assert_eq!(compute_n50(&m, exceeds), Some(100.0));

        let m = reads(&[(300, 0.0), (200, 0.0), (100, 0.0)]);
        // half = 300: reached exactly by the first read
        assert_eq!(compute_n50(&m, at_least), Some(300.0));
        assert_eq!(compute_n50(&m, exceeds), Some(200.0));
    }

    #[test]
    fn n50_is_largest_length_covering_half() {
        let m = reads(&[
            (120, 0.0),
            (4500, 0.0),
            (300, 0.0),
            (800, 0.0),
            (800, 0.0),
            (2200, 0.0),
            (15, 0.0),
            (9100, 0.0),
            (640, 0.0),
        ]);
        let n50 = compute_n50(&m, NxConvention::default()).unwrap();
        let half = total_bases(&m) as f64 / 2.0;
        let covered = |l: f64| -> f64 {
            m.iter()
                .filter(|r| r.length as f64 >= l)
                .map(|r| r.length as f64)
                .sum()
        };
        assert!(covered(n50) >= half);
        for r in &m {
            let l = r.length as f64;
            if l > n50 {
                assert!(covered(l) < half, "{} also covers half", l);
            }
        }
    }

    #[test]
    fn mode_quality_buckets_and_breaks_ties_low() {
        let m = reads(&[(1, 10.004), (1, 10.001), (1, 12.5), (1, 12.5), (1, 3.0)]);
        // 10.00 bucket and 12.50 bucket both hold two reads
        assert_eq!(compute_mode_quality(&m), Some(10.0));
        let m = reads(&[(1, 12.5), (1, 12.5), (1, 9.0)]);
        assert_eq!(compute_mode_quality(&m), Some(12.5));
    }

    #[test]
    fn overrides_are_used_verbatim() {
        let m = scenario();
        let o = StatOverrides {
            mean_length: Some(42.0),
            std_length: None,
            n50: Some(7.0),
            mean_quality: None,
            mode_quality: Some(30.0),
        };
        let s = ReferenceStats::resolve(&m, &o, NxConvention::default()).unwrap();
        assert_eq!(s.mean_length, 42.0);
        assert_eq!(s.n50, Some(7.0));
        assert_eq!(s.mode_quality, Some(30.0));
        assert!((s.mean_quality.unwrap() - 10.5).abs() < TOL);
        // std is still derived from the data's own mean, not the override
        assert!((s.std_length - compute_std_length(&m).unwrap()).abs() < TOL);
    }

    #[test]
    fn negative_override_rejected() {
        let o = StatOverrides {
            std_length: Some(-1.0),
            ..Default::default()
        };
        let err = ReferenceStats::resolve(&scenario(), &o, NxConvention::default()).unwrap_err();
        assert!(matches!(err, LqError::InvalidArgument(_)));
    }

    #[test]
    fn quantile_interpolates_linearly() {
        let s = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&s, 0.0), Some(1.0));
        assert_eq!(quantile_sorted(&s, 1.0), Some(4.0));
        assert!((quantile_sorted(&s, 0.5).unwrap() - 2.5).abs() < TOL);
        assert!((quantile_sorted(&s, 0.25).unwrap() - 1.75).abs() < TOL);
        assert_eq!(quantile_sorted(&[], 0.5), None);
    }

    #[test]
    fn basic_statistics_summary() {
        let m = scenario();
        let s = BasicStatistics::compute(&m, NxConvention::default()).unwrap();
        assert_eq!(s.reads_number, 4);
        assert_eq!(s.bases_number, 9500);
        assert_eq!(s.min_len, 1000);
        assert_eq!(s.max_len, 5000);
        assert_eq!(s.n50, 5000.0);
        assert_eq!(s.min_qual, 9.0);
        assert_eq!(s.max_qual, 12.0);
        // reads longer than 1k: 2000, 1500, 5000
        assert_eq!(s.length_thresholds[0].reads, 3);
        assert_eq!(s.length_thresholds[0].bases, 8500);
        // quality above 10: 12 and 11
        assert_eq!(s.quality_thresholds[1].reads, 2);
        assert_eq!(s.quality_thresholds[1].bases, 3500);
    }
}
