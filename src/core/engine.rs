use crate::core::error::{LqError, Result};
use crate::core::filter::apply_trim;
use crate::core::histogram::{Histogram, length_histogram, quality_histogram};
use crate::core::io::{TableLayout, read_table};
use crate::core::model::{
    FigureKind, Measurement, NxConvention, OutputFormat, TrimPolicy, name_from_prefix,
};
use crate::core::stats::{BasicStatistics, ReferenceStats, StatOverrides};
use crate::report::export::{ExportOutcome, Exporter};
use crate::report::figures::{self, DrawToggles, FigureOptions, PlotData};
use crate::report::summary_txt;
use std::env;
use std::path::PathBuf;
use std::time::{Duration, Instant};

pub const DEFAULT_LEN_BINS: usize = 100;
pub const DEFAULT_QUAL_BINS: usize = 100;

pub struct RunConfig {
    pub input: PathBuf,
    pub layout: TableLayout,
    pub prefix: String,
    /// Raw format names; validated before anything is read or drawn.
    pub formats: Vec<String>,
    pub name: Option<String>,
    pub overrides: StatOverrides,
    pub trim: TrimPolicy,
    pub len_bins: usize,
    pub qual_bins: usize,
    pub nx: NxConvention,
    pub draw: DrawToggles,
    pub scatter_qual_range: (f64, f64),
    pub summary: bool,
}

pub struct RunOutput {
    pub stats: ReferenceStats,
    pub total_reads: usize,
    pub kept_reads: usize,
    pub length_hist: Histogram,
    pub quality_hist: Histogram,
    pub written: Vec<PathBuf>,
}

/// Checks everything that can be checked without reading the input.
pub fn preflight(cfg: &RunConfig) -> Result<Vec<OutputFormat>> {
    let formats = OutputFormat::parse_list(&cfg.formats)?;
    if cfg.len_bins == 0 || cfg.qual_bins == 0 {
        return Err(LqError::InvalidArgument(format!(
            "bin counts must be at least 1 (length {}, quality {})",
            cfg.len_bins, cfg.qual_bins
        )));
    }
    match cfg.trim {
        TrimPolicy::Quantile { q } if !(0.0..=1.0).contains(&q) => {
            return Err(LqError::InvalidArgument(format!(
                "quantile fraction must be within [0, 1], got {}",
                q
            )));
        }
        TrimPolicy::StdWindow { k } if !k.is_finite() || k < 0.0 => {
            return Err(LqError::InvalidArgument(format!(
                "std multiplier must be finite and non-negative, got {}",
                k
            )));
        }
        _ => {}
    }
    let (lo, hi) = cfg.scatter_qual_range;
    if !(lo.is_finite() && hi.is_finite() && lo < hi) {
        return Err(LqError::InvalidArgument(format!(
            "scatter quality range must satisfy min < max, got {}..{}",
            lo, hi
        )));
    }
    if cfg.prefix.trim().is_empty() {
        return Err(LqError::InvalidArgument("output prefix is empty".into()));
    }
    Ok(formats)
}

pub fn run(cfg: &RunConfig) -> Result<RunOutput> {
    let stats = stats_enabled();
    let t_pre = Instant::now();
    preflight(cfg)?;
    log_stage(stats, "engine.preflight", t_pre);

    let t_read = Instant::now();
    let measurements = read_table(&cfg.input, &cfg.layout)?;
    log_stage(stats, "engine.read", t_read);
    log::info!(
        "read {} measurements from {}",
        measurements.len(),
        cfg.input.display()
    );
    plot(&measurements, cfg)
}

/// Stats, trimming, binning and rendering over already-loaded measurements.
pub fn plot(measurements: &[Measurement], cfg: &RunConfig) -> Result<RunOutput> {
    let stats = stats_enabled();
    let formats = preflight(cfg)?;

    let t_stats = Instant::now();
    let reference = ReferenceStats::resolve(measurements, &cfg.overrides, cfg.nx)?;
    log_stage(stats, "engine.stats", t_stats);

    let t_trim = Instant::now();
    let kept = apply_trim(measurements, &cfg.trim, &reference)?;
    log_stage(stats, "engine.trim", t_trim);
    if kept.is_empty() {
        return Err(LqError::InsufficientData(format!(
            "no reads left after trimming by {} ({} reads before)",
            cfg.trim,
            measurements.len()
        )));
    }

    let t_hist = Instant::now();
    let length_hist = length_histogram(&kept, cfg.len_bins)?;
    let quality_hist = quality_histogram(&kept, cfg.qual_bins)?;
    log_stage(stats, "engine.histograms", t_hist);

    let summary = if cfg.summary {
        Some(BasicStatistics::compute(measurements, cfg.nx)?)
    } else {
        None
    };

    let opts = FigureOptions {
        name: cfg.name.clone().or_else(|| name_from_prefix(&cfg.prefix)),
        draw: cfg.draw,
        scatter_qual_range: cfg.scatter_qual_range,
    };
    let data = PlotData {
        kept: &kept,
        length_hist: &length_hist,
        quality_hist: &quality_hist,
        stats: &reference,
    };

    let t_render = Instant::now();
    let distribution = figures::distribution_figure(&data, &opts)?;
    let merged = figures::merged_figure(&data, &opts)?;
    log_stage(stats, "engine.render", t_render);

    let t_save = Instant::now();
    let exporter = Exporter::new(&formats);
    let mut outcome = ExportOutcome::default();
    // each figure's SVG is dropped as soon as all of its formats are written
    outcome.merge(exporter.save_all(
        FigureKind::Distribution,
        &distribution,
        &cfg.prefix,
        &formats,
    ));
    drop(distribution);
    outcome.merge(exporter.save_all(FigureKind::Merged, &merged, &cfg.prefix, &formats));
    drop(merged);

    let mut summary_err = None;
    if let Some(summary) = &summary {
        let path = PathBuf::from(format!("{}__Summary.txt", cfg.prefix));
        match summary_txt::write(&path, summary, kept.len()) {
            Ok(()) => {
                log::info!("wrote {}", path.display());
                outcome.written.push(path);
            }
            Err(e) => {
                log::warn!("failed to write {}: {}", path.display(), e);
                summary_err = Some(e);
            }
        }
    }
    log_stage(stats, "engine.save", t_save);

    // figure failures take precedence; the summary error was logged above
    let written = outcome.into_result()?;
    if let Some(e) = summary_err {
        return Err(e);
    }
    Ok(RunOutput {
        stats: reference,
        total_reads: measurements.len(),
        kept_reads: kept.len(),
        length_hist,
        quality_hist,
        written,
    })
}

pub(crate) fn stats_enabled() -> bool {
    matches!(env::var("LQPLOT_STATS").as_deref(), Ok("1"))
}

pub(crate) fn log_stage(stats: bool, name: &str, t: Instant) {
    if stats {
        eprintln!("LQPLOT_STATS stage={} time={}", name, fmt_dur(t.elapsed()));
    }
}

pub(crate) fn fmt_dur(d: Duration) -> String {
    if d.as_secs_f64() < 1.0 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:.3}s", d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::figures::DEFAULT_SCATTER_QUAL_RANGE;
    use std::fs;

    fn scenario() -> Vec<Measurement> {
        [(1000, 10.0), (2000, 12.0), (1500, 11.0), (5000, 9.0)]
            .iter()
            .map(|&(l, q)| Measurement::new(l, q))
            .collect()
    }

    fn config(dir: &std::path::Path, formats: &[&str]) -> RunConfig {
        RunConfig {
            input: dir.join("stats.tsv"),
            layout: TableLayout::default(),
            prefix: dir.join("sample").to_string_lossy().into_owned(),
            formats: formats.iter().map(|s| s.to_string()).collect(),
            name: None,
            overrides: StatOverrides::default(),
            trim: TrimPolicy::Quantile { q: 0.0 },
            len_bins: 1,
            qual_bins: 1,
            nx: NxConvention::default(),
            draw: DrawToggles::default(),
            scatter_qual_range: DEFAULT_SCATTER_QUAL_RANGE,
            summary: false,
        }
    }

    fn files_in(dir: &std::path::Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn end_to_end_four_reads() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), &["png"]);
        let out = plot(&scenario(), &cfg).unwrap();

        assert_eq!(out.total_reads, 4);
        assert_eq!(out.kept_reads, 4);
        assert_eq!(out.length_hist.counts, vec![4]);
        assert_eq!(out.length_hist.weighted_total(), 9500.0);
        assert_eq!(out.quality_hist.counts, vec![4]);
        assert_eq!(out.stats.n50, Some(5000.0));
        assert_eq!(out.written.len(), 2);
        assert_eq!(
            files_in(dir.path()),
            vec![
                "sample__ReadLengthAndQualityDistribution.png".to_string(),
                "sample__ReadLengthVsQualityMerged.png".to_string(),
            ]
        );
        for p in &out.written {
            let bytes = fs::read(p).unwrap();
            assert_eq!(&bytes[..4], b"\x89PNG");
        }
    }

    #[test]
    fn unsupported_format_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), &["png", "bmp"]);
        let err = plot(&scenario(), &cfg).err().unwrap();
        assert!(matches!(err, LqError::InvalidArgument(_)));
        assert!(files_in(dir.path()).is_empty());
    }

    #[test]
    fn empty_input_fails_before_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), &["svg"]);
        let err = plot(&[], &cfg).err().unwrap();
        assert!(matches!(err, LqError::InsufficientData(_)));
        assert!(files_in(dir.path()).is_empty());
    }

    #[test]
    fn trimming_everything_is_insufficient_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), &["svg"]);
        cfg.trim = TrimPolicy::Quantile { q: 0.5 };
        let err = plot(&scenario(), &cfg).err().unwrap();
        assert!(matches!(err, LqError::InsufficientData(_)));
        assert!(files_in(dir.path()).is_empty());
    }

    #[test]
    fn single_read_with_std_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), &["svg"]);
        cfg.trim = TrimPolicy::default();
        let out = plot(&[Measurement::new(4200, 13.0)], &cfg).unwrap();
        assert_eq!(out.stats.std_length, 0.0);
        assert_eq!(out.kept_reads, 1);
        assert_eq!(out.written.len(), 2);
    }

    #[test]
    fn summary_failure_does_not_hide_figure_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), &["svg"]);
        cfg.summary = true;
        // a directory in the way makes the final rename fail
        let blocked_figure = dir.path().join("sample__ReadLengthVsQualityMerged.svg");
        fs::create_dir(&blocked_figure).unwrap();
        fs::create_dir(dir.path().join("sample__Summary.txt")).unwrap();

        match plot(&scenario(), &cfg) {
            Err(LqError::Export { failures }) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].path, blocked_figure);
            }
            Err(e) => panic!("expected export failure, got {e}"),
            Ok(_) => panic!("expected export failure"),
        }
        assert!(
            dir.path()
                .join("sample__ReadLengthAndQualityDistribution.svg")
                .is_file()
        );
    }

    #[test]
    fn summary_failure_alone_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), &["svg"]);
        cfg.summary = true;
        fs::create_dir(dir.path().join("sample__Summary.txt")).unwrap();
        assert!(matches!(plot(&scenario(), &cfg), Err(LqError::Io { .. })));
    }

    #[test]
    fn bad_quantile_rejected_in_preflight() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), &["svg"]);
        cfg.trim = TrimPolicy::Quantile { q: 1.5 };
        assert!(matches!(preflight(&cfg), Err(LqError::InvalidArgument(_))));
        cfg.trim = TrimPolicy::Quantile { q: 0.1 };
        cfg.scatter_qual_range = (40.0, 5.0);
        assert!(matches!(preflight(&cfg), Err(LqError::InvalidArgument(_))));
    }

    #[test]
    fn run_reads_table_and_writes_summary() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("stats.tsv");
        fs::write(
            &input,
            "r1\t1000\t10.0\nr2\t2000\t12.0\nr3\t1500\t11.0\nr4\t5000\t9.0\n",
        )
        .unwrap();
        let mut cfg = config(dir.path(), &["svg", "svg"]);
        cfg.summary = true;
        let out = run(&cfg).unwrap();
        assert_eq!(out.written.len(), 3);
        let summary = fs::read_to_string(dir.path().join("sample__Summary.txt")).unwrap();
        assert!(summary.contains("N50\t5000"));
        let svg = fs::read_to_string(
            dir.path()
                .join("sample__ReadLengthAndQualityDistribution.svg"),
        )
        .unwrap();
        assert!(svg.contains("sample:ReadLengthAndQualityDistribution"));
        assert!(svg.contains("N50=5000"));
        assert!(svg.contains("MeanLen=2375"));
    }
}
